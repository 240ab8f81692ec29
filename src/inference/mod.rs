// SPDX-License-Identifier: GPL-3.0-only

//! Asynchronous pose inference
//!
//! The frame path submits packed images to a [`PoseEngine`] without waiting
//! for them to be scored. The engine reports each finished detection through
//! a [`CompletionListener`] on its own thread; the [`session::DetectionSession`]
//! stores successful results in a single [`result_cache::ResultSlot`], and the
//! next frame call returns whatever that slot holds at that moment.
//!
//! ```text
//! frame thread:   normalize → convert → submit ──┐        read_latest
//!                                                │             ▲
//! engine thread:                     queue → detect → on_complete ─┘
//! ```

pub mod detector;
pub mod live_stream;
pub mod result_cache;
pub mod session;

pub use detector::{LumaCentroidDetector, PoseDetector};
pub use live_stream::{EngineStats, LiveStreamEngine, StatsHandle};
pub use result_cache::ResultSlot;
pub use session::DetectionSession;

use crate::constants::{
    DEFAULT_MIN_DETECTION_CONFIDENCE, DEFAULT_MIN_PRESENCE_CONFIDENCE, DEFAULT_MODEL_FILE,
    DEFAULT_NUM_POSES, DEFAULT_QUEUE_DEPTH,
};
use crate::errors::EngineError;
use crate::media::converter::PackedFrame;
use crate::media::formats::{ChannelOrder, Rotation};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// One body landmark in normalized image coordinates
///
/// `x` and `y` are in `0.0..=1.0` relative to the image; `z` is depth relative
/// to the hips, smaller values closer to the camera.
#[repr(C)]
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, bytemuck::Pod, bytemuck::Zeroable,
)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Latest detection as handed back to the caller
///
/// Only the first detected pose is kept. A result without landmarks means
/// the engine ran and found nobody.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionResult {
    landmarks: Vec<Landmark>,
    /// Number of poses the engine reported before truncation
    pose_count: usize,
}

impl DetectionResult {
    /// Keep the first pose of an engine result
    pub fn from_poses(poses: Vec<Vec<Landmark>>) -> Self {
        let pose_count = poses.len();
        let landmarks = poses.into_iter().next().unwrap_or_default();
        Self {
            landmarks,
            pose_count,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }

    pub fn pose_count(&self) -> usize {
        self.pose_count
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }
}

/// Borrowed packed image handed to [`PoseEngine::submit`]
///
/// Valid only for the duration of the call. Engines that work asynchronously
/// must copy the pixels before returning.
#[derive(Debug, Clone, Copy)]
pub struct PackedImage<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub order: ChannelOrder,
    /// Clockwise rotation that makes the image upright
    pub rotation: Rotation,
}

impl<'a> PackedImage<'a> {
    pub fn from_frame(frame: &'a PackedFrame, rotation: Rotation) -> Self {
        Self {
            data: frame.as_bytes(),
            width: frame.width(),
            height: frame.height(),
            order: frame.channel_order(),
            rotation,
        }
    }

    /// Width and height once the rotation hint is applied
    pub fn upright_size(&self) -> (u32, u32) {
        if self.rotation.swaps_dimensions() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }

    /// Check the pixel data covers exactly `width * height` four-byte pixels
    pub fn validate(&self) -> Result<(), EngineError> {
        let expected = (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|pixels| pixels.checked_mul(4));
        match expected {
            Some(len) if len > 0 && len == self.data.len() => Ok(()),
            _ => Err(EngineError::Rejected(format!(
                "{} bytes for a {}x{} image",
                self.data.len(),
                self.width,
                self.height
            ))),
        }
    }
}

/// Owned copy of a packed image, queued inside an engine
#[derive(Debug, Clone)]
pub struct OwnedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub order: ChannelOrder,
    pub rotation: Rotation,
}

impl From<PackedImage<'_>> for OwnedImage {
    fn from(image: PackedImage<'_>) -> Self {
        Self {
            data: image.data.to_vec(),
            width: image.width,
            height: image.height,
            order: image.order,
            rotation: image.rotation,
        }
    }
}

impl OwnedImage {
    pub fn as_packed(&self) -> PackedImage<'_> {
        PackedImage {
            data: &self.data,
            width: self.width,
            height: self.height,
            order: self.order,
            rotation: self.rotation,
        }
    }
}

/// Engine options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Model bundle to load
    pub model_path: PathBuf,
    /// Maximum number of poses to detect
    pub num_poses: u32,
    /// Minimum confidence for a pose detection to count (0.0 - 1.0)
    pub min_detection_confidence: f32,
    /// Minimum confidence that a tracked pose is still present (0.0 - 1.0)
    pub min_presence_confidence: f32,
    /// Frames that may wait for the detector before new ones are dropped
    pub queue_depth: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_FILE),
            num_poses: DEFAULT_NUM_POSES,
            min_detection_confidence: DEFAULT_MIN_DETECTION_CONFIDENCE,
            min_presence_confidence: DEFAULT_MIN_PRESENCE_CONFIDENCE,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

impl EngineOptions {
    /// Check the options before an engine is started with them
    pub fn validate(&self) -> Result<(), EngineError> {
        let confidence_ok = |c: f32| (0.0..=1.0).contains(&c);
        if !confidence_ok(self.min_detection_confidence) {
            return Err(EngineError::InitFailed(format!(
                "min_detection_confidence {} is outside 0.0..=1.0",
                self.min_detection_confidence
            )));
        }
        if !confidence_ok(self.min_presence_confidence) {
            return Err(EngineError::InitFailed(format!(
                "min_presence_confidence {} is outside 0.0..=1.0",
                self.min_presence_confidence
            )));
        }
        if self.num_poses == 0 {
            return Err(EngineError::InitFailed("num_poses must be at least 1".into()));
        }
        if self.queue_depth == 0 {
            return Err(EngineError::InitFailed(
                "queue_depth must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// One finished detection, delivered from the engine's thread
#[derive(Debug, Clone)]
pub struct Completion {
    /// Timestamp the frame was submitted with
    pub timestamp_ms: i64,
    /// Detected poses, each a list of landmarks, or the engine's error
    pub outcome: Result<Vec<Vec<Landmark>>, EngineError>,
}

/// Callback invoked once per finished detection
pub type CompletionListener = Arc<dyn Fn(Completion) + Send + Sync>;

/// Live-stream inference engine
///
/// `submit` hands a frame over for asynchronous detection and returns
/// without waiting; results arrive through the listener given to
/// `configure`. Completions may arrive late, out of order, or not at all.
pub trait PoseEngine: Send {
    /// Start the engine; must be called before `submit`
    fn configure(
        &mut self,
        options: &EngineOptions,
        listener: CompletionListener,
    ) -> Result<(), EngineError>;

    /// Queue a frame for detection; must not block on detection
    fn submit(&self, image: PackedImage<'_>, timestamp_ms: i64) -> Result<(), EngineError>;

    /// Stop the engine and release its resources; idempotent
    fn close(&mut self);

    fn is_configured(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_result_keeps_first_pose() {
        let result = DetectionResult::from_poses(vec![
            vec![Landmark::new(0.1, 0.2, 0.3)],
            vec![Landmark::new(0.9, 0.9, 0.0)],
        ]);
        assert_eq!(result.landmarks(), &[Landmark::new(0.1, 0.2, 0.3)]);
        assert_eq!(result.pose_count(), 2);

        let nobody = DetectionResult::from_poses(Vec::new());
        assert!(nobody.is_empty());
        assert_eq!(nobody.pose_count(), 0);
    }

    #[test]
    fn test_options_validation() {
        assert!(EngineOptions::default().validate().is_ok());

        let bad = EngineOptions {
            min_detection_confidence: 1.5,
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(EngineError::InitFailed(_))));

        let bad = EngineOptions {
            queue_depth: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let bad = EngineOptions {
            num_poses: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_options_defaults() {
        let options = EngineOptions::default();
        assert_eq!(options.model_path, PathBuf::from("pose_landmarker.task"));
        assert_eq!(options.num_poses, 1);
        assert_eq!(options.min_detection_confidence, 0.5);
        assert_eq!(options.min_presence_confidence, 0.5);
    }

    #[test]
    fn test_landmarks_as_floats() {
        let landmarks = [Landmark::new(1.0, 2.0, 3.0), Landmark::new(4.0, 5.0, 6.0)];
        let floats: &[f32] = bytemuck::cast_slice(&landmarks);
        assert_eq!(floats, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_upright_size_follows_rotation() {
        let pixels = vec![0u8; 6 * 4 * 4];
        let mut image = PackedImage {
            data: &pixels,
            width: 6,
            height: 4,
            order: ChannelOrder::Bgra,
            rotation: Rotation::Rotate90,
        };
        assert_eq!(image.upright_size(), (4, 6));
        image.rotation = Rotation::Rotate180;
        assert_eq!(image.upright_size(), (6, 4));
        image.rotation = Rotation::Rotate270;
        assert_eq!(image.upright_size(), (4, 6));
    }

    #[test]
    fn test_image_size_validation() {
        let pixels = vec![0u8; 16];
        let image = PackedImage {
            data: &pixels,
            width: 2,
            height: 2,
            order: ChannelOrder::Rgba,
            rotation: Rotation::None,
        };
        assert!(image.validate().is_ok());

        let short = PackedImage {
            data: &pixels[..12],
            ..image
        };
        assert_eq!(
            short.validate(),
            Err(EngineError::Rejected("12 bytes for a 2x2 image".into()))
        );

        let empty = PackedImage {
            data: &[],
            width: 0,
            height: 0,
            ..image
        };
        assert!(matches!(empty.validate(), Err(EngineError::Rejected(_))));
    }

    #[test]
    fn test_owned_image_copies_pixels() {
        let pixels = vec![1u8, 2, 3, 255];
        let image = PackedImage {
            data: &pixels,
            width: 1,
            height: 1,
            order: ChannelOrder::Rgba,
            rotation: Rotation::Rotate90,
        };
        let owned = OwnedImage::from(image);
        drop(pixels);
        assert_eq!(owned.data, vec![1, 2, 3, 255]);
        assert_eq!(owned.as_packed().rotation, Rotation::Rotate90);
    }
}
