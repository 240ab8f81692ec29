// SPDX-License-Identifier: GPL-3.0-only

//! Call-bridge surface
//!
//! The host app calls `detectPoseStream` once per camera frame with the raw
//! planes and their strides. The bridge fills in missing arguments, runs the
//! frame through the [`FramePipeline`] and answers with the landmarks of the
//! latest completed detection, or with an error code and message.
//!
//! The pipeline is built on the first call, so a missing model shows up as
//! the answer to that call rather than at app start. Once initialization has
//! failed every later call gets the same fatal error.

use crate::config::PipelineConfig;
use crate::constants::DETECT_METHOD;
use crate::errors::{ErrorCode, PipelineError};
use crate::inference::{Landmark, PoseEngine};
use crate::media::formats::Rotation;
use crate::media::planes::{ChromaPlanes, PlaneView};
use crate::pipeline::{FrameInput, FramePipeline};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

/// Arguments of one `detectPoseStream` call
///
/// Every field is optional on the wire; defaults are applied by
/// [`IngestRequest::frame_input`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IngestRequest {
    pub width: Option<i64>,
    pub height: Option<i64>,
    /// Degrees clockwise, any multiple of 90
    pub rotation: Option<i64>,
    #[serde(alias = "timestamp")]
    pub timestamp_ms: Option<i64>,
    /// Luma
    pub plane0: Option<Vec<u8>>,
    /// First chroma plane, or interleaved chroma when `plane2` is absent
    pub plane1: Option<Vec<u8>>,
    /// Second chroma plane
    pub plane2: Option<Vec<u8>>,
    pub stride0: Option<i64>,
    pub stride1: Option<i64>,
    pub stride2: Option<i64>,
    pub pixel_stride1: Option<i64>,
    pub pixel_stride2: Option<i64>,
}

impl IngestRequest {
    /// Borrow the planes as a pipeline frame, applying argument defaults
    ///
    /// `now_ms` stands in for a missing timestamp.
    pub fn frame_input(&self, now_ms: i64) -> Result<FrameInput<'_>, PipelineError> {
        let (Some(plane0), Some(plane1)) = (self.plane0.as_deref(), self.plane1.as_deref()) else {
            return Err(PipelineError::NoPlanes);
        };

        let width = positive("width", self.width)?;
        let height = positive("height", self.height)?;
        let stride0 = stride("stride0", self.stride0.unwrap_or(width))?;
        let stride1 = stride("stride1", self.stride1.unwrap_or(width))?;
        let stride2 = stride("stride2", self.stride2.unwrap_or(width / 2))?;
        let pixel_stride1 = stride("pixelStride1", self.pixel_stride1.unwrap_or(1))?;
        let pixel_stride2 = stride("pixelStride2", self.pixel_stride2.unwrap_or(1))?;

        let first_chroma = PlaneView::new(plane1, stride1, pixel_stride1);
        let second_chroma = self
            .plane2
            .as_deref()
            .map(|plane2| PlaneView::new(plane2, stride2, pixel_stride2));

        let rotation = self.rotation.unwrap_or(0).rem_euclid(360) as i32;
        Ok(FrameInput {
            luma: PlaneView::packed(plane0, stride0),
            chroma: ChromaPlanes::from_planes(first_chroma, second_chroma),
            width: width as u32,
            height: height as u32,
            rotation: Rotation::from_degrees(rotation),
            timestamp_ms: self.timestamp_ms.unwrap_or(now_ms),
        })
    }
}

fn positive(name: &str, value: Option<i64>) -> Result<i64, PipelineError> {
    match value {
        Some(v) if v > 0 && v <= u32::MAX as i64 => Ok(v),
        Some(v) => Err(PipelineError::InvalidArgs(format!("{} must be positive, got {}", name, v))),
        None => Err(PipelineError::InvalidArgs(format!("{} is required", name))),
    }
}

/// Largest stride a camera buffer can report (a Java `int`)
const MAX_STRIDE: i64 = i32::MAX as i64;

fn stride(name: &str, value: i64) -> Result<usize, PipelineError> {
    match value {
        0..=MAX_STRIDE => Ok(value as usize),
        _ => Err(PipelineError::InvalidArgs(format!(
            "{} must be within 0..={}, got {}",
            name, MAX_STRIDE, value
        ))),
    }
}

/// One landmark as returned to the caller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandmarkRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<&Landmark> for LandmarkRecord {
    fn from(landmark: &Landmark) -> Self {
        Self {
            x: landmark.x as f64,
            y: landmark.y as f64,
            z: landmark.z as f64,
        }
    }
}

/// Error answer: code, message and whether the bridge is unusable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeError {
    pub code: ErrorCode,
    pub message: String,
    pub fatal: bool,
}

impl From<&PipelineError> for BridgeError {
    fn from(err: &PipelineError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            fatal: err.is_fatal(),
        }
    }
}

/// One call on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeRequest {
    pub method: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// Answer to one call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BridgeResponse {
    /// Landmarks of the latest completed detection (may be empty)
    Ok(Vec<LandmarkRecord>),
    Error(BridgeError),
    /// The method name is not handled by this bridge
    NotImplemented(String),
}

enum State {
    /// Waiting for the first call
    Pending(PipelineConfig, Box<dyn PoseEngine>),
    Ready(FramePipeline),
    /// Initialization failed; holds the error repeated to every call
    Failed(PipelineError),
    Closed,
}

/// Dispatches bridge calls onto a lazily built pipeline
pub struct CallBridge {
    state: State,
}

impl CallBridge {
    pub fn new(config: PipelineConfig, engine: Box<dyn PoseEngine>) -> Self {
        Self {
            state: State::Pending(config, engine),
        }
    }

    /// Handle one call by method name
    pub fn handle_call(&mut self, method: &str, args: serde_json::Value) -> BridgeResponse {
        if method != DETECT_METHOD {
            debug!(method, "Unhandled bridge method");
            return BridgeResponse::NotImplemented(method.to_string());
        }

        let request: IngestRequest = match serde_json::from_value(args) {
            Ok(request) => request,
            Err(e) => {
                let err = PipelineError::InvalidArgs(e.to_string());
                return BridgeResponse::Error(BridgeError::from(&err));
            }
        };

        match self.detect(&request) {
            Ok(landmarks) => BridgeResponse::Ok(landmarks),
            Err(err) => {
                if err.is_fatal() {
                    error!(error = %err, "Pose detection unavailable");
                } else {
                    warn!(code = %err.code(), error = %err, "Frame rejected");
                }
                BridgeResponse::Error(BridgeError::from(&err))
            }
        }
    }

    /// Handle one JSON line `{"method": ..., "args": {...}}`
    pub fn handle_line(&mut self, line: &str) -> serde_json::Result<String> {
        let response = match serde_json::from_str::<BridgeRequest>(line) {
            Ok(request) => self.handle_call(&request.method, request.args),
            Err(e) => {
                let err = PipelineError::InvalidArgs(format!("malformed call: {}", e));
                BridgeResponse::Error(BridgeError::from(&err))
            }
        };
        serde_json::to_string(&response)
    }

    fn detect(&mut self, request: &IngestRequest) -> Result<Vec<LandmarkRecord>, PipelineError> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let input = request.frame_input(now_ms)?;
        let pipeline = self.pipeline()?;
        let latest = pipeline.process_frame(&input)?;
        Ok(latest.landmarks().iter().map(LandmarkRecord::from).collect())
    }

    /// The pipeline, building it on first use
    fn pipeline(&mut self) -> Result<&mut FramePipeline, PipelineError> {
        if matches!(self.state, State::Pending(..))
            && let State::Pending(config, engine) =
                std::mem::replace(&mut self.state, State::Closed)
        {
            self.state = match FramePipeline::new(&config, engine) {
                Ok(pipeline) => State::Ready(pipeline),
                Err(err) => State::Failed(err),
            };
        }

        match &mut self.state {
            State::Ready(pipeline) => Ok(pipeline),
            State::Failed(err) => Err(err.clone()),
            State::Closed | State::Pending(..) => Err(PipelineError::Submit(
                crate::errors::EngineError::Closed,
            )),
        }
    }

    /// Shut the pipeline down; later calls fail with `SUBMIT_FAILED`
    pub fn shutdown(&mut self) {
        if let State::Ready(mut pipeline) = std::mem::replace(&mut self.state, State::Closed) {
            pipeline.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_planes() {
        let request = IngestRequest {
            width: Some(4),
            height: Some(4),
            plane0: Some(vec![0; 16]),
            ..Default::default()
        };
        assert_eq!(request.frame_input(0).err(), Some(PipelineError::NoPlanes));
    }

    #[test]
    fn test_invalid_dimensions() {
        let request = IngestRequest {
            width: Some(0),
            height: Some(4),
            plane0: Some(vec![0; 16]),
            plane1: Some(vec![0; 8]),
            ..Default::default()
        };
        let err = request.frame_input(0).err().unwrap();
        assert_eq!(err.code(), ErrorCode::InvalidArgs);

        let request = IngestRequest {
            height: None,
            width: Some(4),
            ..request
        };
        assert_eq!(request.frame_input(0).err().unwrap().code(), ErrorCode::InvalidArgs);
    }

    #[test]
    fn test_argument_defaults() {
        let request = IngestRequest {
            width: Some(8),
            height: Some(4),
            plane0: Some(vec![0; 32]),
            plane1: Some(vec![0; 8]),
            plane2: Some(vec![0; 8]),
            ..Default::default()
        };
        let input = request.frame_input(1234).unwrap();
        assert_eq!(input.luma.row_stride, 8);
        assert_eq!(input.timestamp_ms, 1234);
        assert_eq!(input.rotation, Rotation::None);
        match input.chroma {
            ChromaPlanes::Separate { a, b } => {
                assert_eq!(a.row_stride, 8);
                assert_eq!(a.pixel_stride, 1);
                assert_eq!(b.row_stride, 4);
                assert_eq!(b.pixel_stride, 1);
            }
            ChromaPlanes::Interleaved(_) => panic!("expected separate chroma planes"),
        }
    }

    #[test]
    fn test_wire_names() {
        let request: IngestRequest = serde_json::from_value(json!({
            "width": 2,
            "height": 2,
            "rotation": -90,
            "timestampMs": 5,
            "plane0": [1, 2, 3, 4],
            "plane1": [5, 6],
            "pixelStride1": 2,
        }))
        .unwrap();
        assert_eq!(request.timestamp_ms, Some(5));
        assert_eq!(request.pixel_stride1, Some(2));

        let input = request.frame_input(0).unwrap();
        assert_eq!(input.rotation, Rotation::Rotate270);
        assert!(matches!(input.chroma, ChromaPlanes::Interleaved(_)));
    }

    #[test]
    fn test_negative_stride_rejected() {
        let request = IngestRequest {
            width: Some(2),
            height: Some(2),
            plane0: Some(vec![0; 4]),
            plane1: Some(vec![0; 2]),
            stride1: Some(-2),
            ..Default::default()
        };
        assert_eq!(request.frame_input(0).err().unwrap().code(), ErrorCode::InvalidArgs);
    }

    #[test]
    fn test_oversized_strides_rejected() {
        let request = IngestRequest {
            width: Some(2),
            height: Some(4),
            plane0: Some(vec![0; 64]),
            plane1: Some(vec![128; 4]),
            stride0: Some(6_148_914_691_236_517_206),
            ..Default::default()
        };
        assert_eq!(request.frame_input(0).err().unwrap().code(), ErrorCode::InvalidArgs);

        let request = IngestRequest {
            stride0: None,
            pixel_stride1: Some(i64::from(i32::MAX) + 1),
            ..request
        };
        assert_eq!(request.frame_input(0).err().unwrap().code(), ErrorCode::InvalidArgs);

        let request = IngestRequest {
            pixel_stride1: None,
            stride1: Some(i64::from(i32::MAX)),
            ..request
        };
        assert!(request.frame_input(0).is_ok());
    }

    #[test]
    fn test_legacy_timestamp_name() {
        let request: IngestRequest = serde_json::from_value(json!({
            "width": 2,
            "height": 2,
            "timestamp": 77,
        }))
        .unwrap();
        assert_eq!(request.timestamp_ms, Some(77));

        let request: IngestRequest =
            serde_json::from_value(json!({"timestampMs": 78})).unwrap();
        assert_eq!(request.timestamp_ms, Some(78));
    }

    #[test]
    fn test_response_shapes() {
        let ok = BridgeResponse::Ok(vec![LandmarkRecord {
            x: 0.5,
            y: 0.25,
            z: 0.0,
        }]);
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"ok": [{"x": 0.5, "y": 0.25, "z": 0.0}]})
        );

        let err = BridgeResponse::Error(BridgeError::from(&PipelineError::NoPlanes));
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"error": {"code": "NO_PLANES", "message": "Missing YUV planes", "fatal": false}})
        );
    }
}
