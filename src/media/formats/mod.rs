// SPDX-License-Identifier: GPL-3.0-only

//! Output format selection
//!
//! The packed layout handed to the inference engine is fixed per target:
//! one target consumes RGBA, another BGRA, and the two differ in whether the
//! camera delivers limited-range or full-range YUV. Both are chosen once when
//! the converter is built.

pub mod packing;
pub mod rotation;

pub use packing::{ChannelOrder, ChromaOrder, ColorRange, TargetPlatform};
pub use rotation::Rotation;
