// SPDX-License-Identifier: GPL-3.0-only

//! Frame rotation hint

use serde::{Deserialize, Serialize};

/// Clockwise rotation needed to bring the frame upright
///
/// Camera sensors on phones are usually mounted at 90° or 270° relative to
/// the display. The pipeline never rotates pixels; the value travels with
/// the packed image so the engine can account for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    None,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl Rotation {
    /// Create rotation from an integer degree value (normalised to 0-360).
    ///
    /// Values that are not a multiple of 90 map to no rotation.
    pub fn from_degrees(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            90 => Rotation::Rotate90,
            180 => Rotation::Rotate180,
            270 => Rotation::Rotate270,
            _ => Rotation::None,
        }
    }

    /// Get the rotation in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            Rotation::None => 0,
            Rotation::Rotate90 => 90,
            Rotation::Rotate180 => 180,
            Rotation::Rotate270 => 270,
        }
    }

    /// Check if rotation swaps width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, Rotation::Rotate90 | Rotation::Rotate270)
    }
}

impl std::fmt::Display for Rotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}
