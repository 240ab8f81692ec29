// SPDX-License-Identifier: GPL-3.0-only

//! Frame layout and colour conversion
//!
//! Camera frames arrive as YUV 4:2:0 planes with arbitrary row strides and
//! pixel strides. They flow through two stages before inference:
//!
//! # Plane Normalization
//!
//! [`normalizer::PlaneNormalizer`] strips row padding and pixel-stride gaps
//! from the borrowed [`planes::PlaneView`]s and writes one canonical
//! semi-planar buffer: tight luma followed by interleaved chroma pairs with
//! the second chroma plane first.
//!
//! # Format Conversion
//!
//! [`converter::FormatConverter`] turns the canonical buffer into packed
//! RGBA or BGRA, on the CPU or through a wgpu compute shader.
//!
//! # Modules
//!
//! - [`planes`]: Borrowed plane views and input shapes
//! - [`normalizer`]: Canonical frame and normalizer
//! - [`formats`]: Channel order, colour range, target presets, rotation
//! - [`converter`]: Packed frame and conversion backends

pub mod converter;
pub mod formats;
pub mod normalizer;
pub mod planes;

// Re-export commonly used types
pub use converter::{ColorConvertBackend, FormatConverter, PackedFrame};
pub use formats::{ChannelOrder, ChromaOrder, ColorRange, Rotation, TargetPlatform};
pub use normalizer::{CanonicalFrame, PlaneNormalizer};
pub use planes::{ChromaPlanes, PlaneView};
