// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline-wide constants

/// Model bundle loaded by the pose engine when no path is configured
pub const DEFAULT_MODEL_FILE: &str = "pose_landmarker.task";

/// Number of poses the engine is asked to track
pub const DEFAULT_NUM_POSES: u32 = 1;

/// Minimum pose detection confidence (0.0 - 1.0)
pub const DEFAULT_MIN_DETECTION_CONFIDENCE: f32 = 0.5;

/// Minimum pose presence confidence (0.0 - 1.0)
pub const DEFAULT_MIN_PRESENCE_CONFIDENCE: f32 = 0.5;

/// Frames that may wait for the detector before new ones are dropped
pub const DEFAULT_QUEUE_DEPTH: usize = 2;

/// Method name accepted by the call bridge
pub const DETECT_METHOD: &str = "detectPoseStream";

/// Bytes per pixel in a packed frame
pub const PACKED_BYTES_PER_PIXEL: usize = 4;

/// Conversions slower than this are logged
pub const SLOW_CONVERSION_MS: u128 = 8;

/// Fixed-point BT.601 coefficients (scaled by 256)
///
/// Full range (JPEG): Y is used as-is.
/// Limited range (video): Y is offset by 16 and scaled by 255/219.
pub mod bt601 {
    pub const FULL_V_TO_R: i32 = 359; // 1.402
    pub const FULL_U_TO_G: i32 = 88; // 0.344
    pub const FULL_V_TO_G: i32 = 183; // 0.714
    pub const FULL_U_TO_B: i32 = 454; // 1.772

    pub const LIMITED_Y: i32 = 298; // 1.164
    pub const LIMITED_V_TO_R: i32 = 409; // 1.596
    pub const LIMITED_U_TO_G: i32 = 100; // 0.392
    pub const LIMITED_V_TO_G: i32 = 208; // 0.813
    pub const LIMITED_U_TO_B: i32 = 516; // 2.017

    /// Added before the final shift so results round to nearest
    pub const ROUNDING: i32 = 128;
}
