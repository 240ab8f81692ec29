// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame pipeline: normalize → convert → submit → read latest
//!
//! One [`FramePipeline`] serves one camera stream. `process_frame` is called
//! on the camera's frame thread and never waits for inference: it returns the
//! latest completed detection, which usually belongs to an earlier frame.

use crate::config::PipelineConfig;
use crate::errors::{EngineError, PipelineError, PipelineResult};
use crate::inference::{DetectionResult, DetectionSession, EngineOptions, PackedImage, PoseEngine};
use crate::media::converter::FormatConverter;
use crate::media::formats::Rotation;
use crate::media::normalizer::PlaneNormalizer;
use crate::media::planes::{ChromaPlanes, PlaneView};
use std::sync::Arc;
use tracing::{info, trace};

/// Borrowed planes and metadata of one camera frame
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    pub luma: PlaneView<'a>,
    pub chroma: ChromaPlanes<'a>,
    pub width: u32,
    pub height: u32,
    /// Rotation hint passed to the engine
    pub rotation: Rotation,
    /// Frame timestamp; must not go backwards within one pipeline
    pub timestamp_ms: i64,
}

/// Owns the reusable buffers, the converter and the detection session
pub struct FramePipeline {
    normalizer: PlaneNormalizer,
    converter: FormatConverter,
    session: DetectionSession,
    frames: u64,
    shut_down: bool,
}

impl FramePipeline {
    /// Build the pipeline described by `config` around an engine
    ///
    /// Fails with [`PipelineError::EngineInit`] when the engine cannot be
    /// configured; the pipeline is unusable in that case.
    pub fn new(config: &PipelineConfig, engine: Box<dyn PoseEngine>) -> PipelineResult<Self> {
        Self::build(
            PlaneNormalizer::with_interleaved_order(config.interleaved_chroma()),
            FormatConverter::from_config(config),
            engine,
            &config.engine,
        )
    }

    /// Build a pipeline with an explicit converter
    ///
    /// Two-plane frames are assumed to carry (V, U) chroma pairs.
    pub fn with_converter(
        converter: FormatConverter,
        engine: Box<dyn PoseEngine>,
        options: &EngineOptions,
    ) -> PipelineResult<Self> {
        Self::build(PlaneNormalizer::new(), converter, engine, options)
    }

    fn build(
        normalizer: PlaneNormalizer,
        converter: FormatConverter,
        engine: Box<dyn PoseEngine>,
        options: &EngineOptions,
    ) -> PipelineResult<Self> {
        let mut session = DetectionSession::new(engine);
        session.start(options).map_err(|e| match e {
            EngineError::InitFailed(msg) => PipelineError::EngineInit(msg),
            other => PipelineError::EngineInit(other.to_string()),
        })?;

        info!(
            backend = converter.backend_name(),
            order = %converter.channel_order(),
            range = ?converter.color_range(),
            interleaved_chroma = ?normalizer.interleaved_order(),
            "Frame pipeline ready"
        );

        Ok(Self {
            normalizer,
            converter,
            session,
            frames: 0,
            shut_down: false,
        })
    }

    /// Run one frame through the pipeline
    ///
    /// Returns the most recent completed detection, not necessarily the one
    /// for this frame. On error nothing is submitted and the result slot is
    /// unchanged.
    pub fn process_frame(&mut self, input: &FrameInput<'_>) -> PipelineResult<Arc<DetectionResult>> {
        if self.shut_down {
            return Err(PipelineError::Submit(EngineError::Closed));
        }

        let canonical =
            self.normalizer
                .normalize(&input.luma, input.chroma, input.width, input.height)?;
        let packed = self
            .converter
            .convert(canonical, input.width, input.height)?;
        self.session.submit(
            PackedImage::from_frame(packed, input.rotation),
            input.timestamp_ms,
        )?;

        self.frames += 1;
        trace!(
            frame = self.frames,
            width = input.width,
            height = input.height,
            planes = input.chroma.plane_count(),
            timestamp_ms = input.timestamp_ms,
            "Frame submitted"
        );

        Ok(self.session.read_latest())
    }

    /// Latest detection without submitting a frame
    pub fn read_latest(&self) -> Arc<DetectionResult> {
        self.session.read_latest()
    }

    /// Frames submitted so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn normalizer(&self) -> &PlaneNormalizer {
        &self.normalizer
    }

    pub fn converter(&self) -> &FormatConverter {
        &self.converter
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Close the detection session and release the conversion backend
    ///
    /// Idempotent and safe before the first frame.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.session.close();
        self.converter.release();
        self.shut_down = true;
        info!(frames = self.frames, "Frame pipeline shut down");
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use crate::inference::{CompletionListener, Landmark};
    use crate::media::formats::{ChannelOrder, ColorRange};
    use std::sync::Mutex;

    /// Engine that scores synchronously inside `submit`, so tests are deterministic
    #[derive(Default)]
    struct InlineEngine {
        listener: Option<CompletionListener>,
        seen: Arc<Mutex<Vec<(i64, u32, u32, Rotation, [u8; 4])>>>,
    }

    impl PoseEngine for InlineEngine {
        fn configure(
            &mut self,
            _options: &EngineOptions,
            listener: CompletionListener,
        ) -> Result<(), EngineError> {
            self.listener = Some(listener);
            Ok(())
        }

        fn submit(&self, image: PackedImage<'_>, timestamp_ms: i64) -> Result<(), EngineError> {
            let first = [image.data[0], image.data[1], image.data[2], image.data[3]];
            self.seen.lock().unwrap().push((
                timestamp_ms,
                image.width,
                image.height,
                image.rotation,
                first,
            ));
            if let Some(listener) = &self.listener {
                listener(crate::inference::Completion {
                    timestamp_ms,
                    outcome: Ok(vec![vec![Landmark::new(timestamp_ms as f32, 0.0, 0.0)]]),
                });
            }
            Ok(())
        }

        fn close(&mut self) {
            self.listener = None;
        }

        fn is_configured(&self) -> bool {
            self.listener.is_some()
        }
    }

    struct BrokenEngine;

    impl PoseEngine for BrokenEngine {
        fn configure(
            &mut self,
            _options: &EngineOptions,
            _listener: CompletionListener,
        ) -> Result<(), EngineError> {
            Err(EngineError::InitFailed("model missing".into()))
        }

        fn submit(&self, _image: PackedImage<'_>, _timestamp_ms: i64) -> Result<(), EngineError> {
            Err(EngineError::NotConfigured)
        }

        fn close(&mut self) {}

        fn is_configured(&self) -> bool {
            false
        }
    }

    fn grey_planes(width: usize, height: usize) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
        (
            vec![128u8; width * height],
            vec![128u8; width * height / 4],
            vec![128u8; width * height / 4],
        )
    }

    fn pipeline(engine: InlineEngine) -> FramePipeline {
        FramePipeline::with_converter(
            FormatConverter::cpu(ChannelOrder::Bgra, ColorRange::Full),
            Box::new(engine),
            &EngineOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_frame_flows_to_engine() {
        let engine = InlineEngine::default();
        let seen = Arc::clone(&engine.seen);
        let mut pipeline = pipeline(engine);

        let (y, u, v) = grey_planes(4, 4);
        let input = FrameInput {
            luma: PlaneView::packed(&y, 4),
            chroma: ChromaPlanes::Separate {
                a: PlaneView::packed(&u, 2),
                b: PlaneView::packed(&v, 2),
            },
            width: 4,
            height: 4,
            rotation: Rotation::Rotate270,
            timestamp_ms: 33,
        };

        let latest = pipeline.process_frame(&input).unwrap();
        assert_eq!(latest.landmarks()[0].x, 33.0);
        assert_eq!(
            seen.lock().unwrap()[0],
            (33, 4, 4, Rotation::Rotate270, [128, 128, 128, 255])
        );
        assert_eq!(pipeline.frames(), 1);
    }

    #[test]
    fn test_invalid_frame_submits_nothing() {
        let engine = InlineEngine::default();
        let seen = Arc::clone(&engine.seen);
        let mut pipeline = pipeline(engine);

        let (y, u, v) = grey_planes(4, 4);
        let input = FrameInput {
            luma: PlaneView::packed(&y[..10], 4),
            chroma: ChromaPlanes::Separate {
                a: PlaneView::packed(&u, 2),
                b: PlaneView::packed(&v, 2),
            },
            width: 4,
            height: 4,
            rotation: Rotation::None,
            timestamp_ms: 1,
        };

        let err = pipeline.process_frame(&input).unwrap_err();
        assert_eq!(err.code(), ErrorCode::OutOfBounds);
        assert!(seen.lock().unwrap().is_empty());
        assert!(pipeline.read_latest().is_empty());
    }

    #[test]
    fn test_engine_init_failure_is_fatal() {
        let err = FramePipeline::with_converter(
            FormatConverter::cpu(ChannelOrder::Rgba, ColorRange::Limited),
            Box::new(BrokenEngine),
            &EngineOptions::default(),
        )
        .err()
        .unwrap();
        assert!(err.is_fatal());
        assert_eq!(err.code(), ErrorCode::PoseError);
    }

    #[test]
    fn test_shutdown_without_frames() {
        let mut pipeline = pipeline(InlineEngine::default());
        pipeline.shutdown();
        pipeline.shutdown();
        assert!(pipeline.is_shut_down());

        let (y, u, v) = grey_planes(2, 2);
        let input = FrameInput {
            luma: PlaneView::packed(&y, 2),
            chroma: ChromaPlanes::Separate {
                a: PlaneView::packed(&u, 1),
                b: PlaneView::packed(&v, 1),
            },
            width: 2,
            height: 2,
            rotation: Rotation::None,
            timestamp_ms: 1,
        };
        let err = pipeline.process_frame(&input).unwrap_err();
        assert_eq!(err.code(), ErrorCode::SubmitFailed);
    }
}
