// SPDX-License-Identifier: GPL-3.0-only

//! Plane normalization into the canonical semi-planar layout
//!
//! Camera HALs deliver 4:2:0 frames in several shapes: three planes with
//! separate chroma (each possibly with a pixel stride of 2 because the two
//! chroma planes alias one interleaved buffer), or two planes with chroma
//! already interleaved. Rows are usually padded. The normalizer strips all of
//! that into one tightly packed buffer:
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ luma       width × height    │
//! ├──────────────────────────────┤
//! │ chroma     width × height/2  │  B A B A ... (second plane first)
//! └──────────────────────────────┘
//! ```
//!
//! Separate chroma planes are written second-plane-first. Both platforms
//! deliver U in the first chroma plane, so those pairs are always (V, U).
//! Interleaved chroma is copied as it arrives and keeps the order the camera
//! produced, which the normalizer is told once up front. Every frame records
//! the order of its pairs for the format converter.

use crate::errors::{NormalizeError, PlaneKind};
use crate::media::formats::ChromaOrder;
use crate::media::planes::{ChromaPlanes, PlaneView};
use tracing::{debug, trace};

/// Owned, reusable semi-planar frame buffer
#[derive(Debug, Default)]
pub struct CanonicalFrame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    chroma_order: ChromaOrder,
    allocations: u64,
}

impl CanonicalFrame {
    /// Create an empty frame; storage is allocated on first use
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing canonical buffer (e.g. a frame stored on disk)
    pub fn from_bytes(data: Vec<u8>, width: u32, height: u32) -> Result<Self, NormalizeError> {
        check_dimensions(width, height)?;
        let expected = Self::buffer_len(width, height);
        if data.len() != expected {
            return Err(NormalizeError::InvalidArgs(format!(
                "canonical {}x{} frame needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }

        Ok(Self {
            data,
            width,
            height,
            chroma_order: ChromaOrder::Vu,
            allocations: 1,
        })
    }

    /// Declare the order of the chroma pairs in a wrapped buffer
    pub fn with_chroma_order(mut self, order: ChromaOrder) -> Self {
        self.chroma_order = order;
        self
    }

    /// Size in bytes of a canonical frame with the given dimensions
    pub fn buffer_len(width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        pixels + pixels / 2
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The whole buffer: luma followed by interleaved chroma
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn luma(&self) -> &[u8] {
        &self.data[..self.luma_len()]
    }

    pub fn chroma(&self) -> &[u8] {
        &self.data[self.luma_len()..]
    }

    /// Order of the samples in each chroma pair
    pub fn chroma_order(&self) -> ChromaOrder {
        self.chroma_order
    }

    /// Number of times storage has been (re)allocated
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    fn luma_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Make room for a frame of the given size
    ///
    /// Storage is only replaced when the pixel count changes; otherwise the
    /// previous allocation is overwritten in place.
    fn prepare(&mut self, width: u32, height: u32) {
        let len = Self::buffer_len(width, height);
        if self.data.len() != len {
            debug!(
                width,
                height,
                bytes = len,
                previous = self.data.len(),
                "Allocating canonical frame buffer"
            );
            self.data = vec![0u8; len];
            self.allocations += 1;
        }
        self.width = width;
        self.height = height;
    }
}

/// Converts raw camera planes into a reusable [`CanonicalFrame`]
#[derive(Debug, Default)]
pub struct PlaneNormalizer {
    frame: CanonicalFrame,
    interleaved_order: ChromaOrder,
}

impl PlaneNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizer for cameras whose interleaved chroma arrives in `order`
    pub fn with_interleaved_order(order: ChromaOrder) -> Self {
        Self {
            interleaved_order: order,
            ..Default::default()
        }
    }

    /// Chroma order assumed for two-plane input
    pub fn interleaved_order(&self) -> ChromaOrder {
        self.interleaved_order
    }

    /// The most recently normalized frame
    pub fn frame(&self) -> &CanonicalFrame {
        &self.frame
    }

    /// Normalize one frame
    ///
    /// All arguments and plane lengths are checked before anything is written,
    /// so a rejected frame leaves the previous canonical frame untouched.
    ///
    /// # Arguments
    ///
    /// * `luma` - Luma plane, pixel stride must be 1
    /// * `chroma` - Interleaved chroma plane or two separate chroma planes
    /// * `width`, `height` - Frame dimensions, both even and non-zero
    pub fn normalize(
        &mut self,
        luma: &PlaneView<'_>,
        chroma: ChromaPlanes<'_>,
        width: u32,
        height: u32,
    ) -> Result<&CanonicalFrame, NormalizeError> {
        check_dimensions(width, height)?;

        let w = width as usize;
        let h = height as usize;
        let chroma_cols = w / 2;
        let chroma_rows = h / 2;

        if luma.pixel_stride != 1 {
            return Err(NormalizeError::InvalidArgs(format!(
                "luma pixel stride must be 1, got {}",
                luma.pixel_stride
            )));
        }
        luma.check_bounds(PlaneKind::Luma, w, h)?;

        match &chroma {
            ChromaPlanes::Interleaved(plane) => {
                check_pixel_stride(PlaneKind::Chroma, plane.pixel_stride)?;
                // Interleaved rows are copied as raw bytes, both samples of each pair
                PlaneView::packed(plane.data, plane.row_stride).check_bounds(
                    PlaneKind::Chroma,
                    w,
                    chroma_rows,
                )?;
            }
            ChromaPlanes::Separate { a, b } => {
                check_pixel_stride(PlaneKind::ChromaA, a.pixel_stride)?;
                check_pixel_stride(PlaneKind::ChromaB, b.pixel_stride)?;
                a.check_bounds(PlaneKind::ChromaA, chroma_cols, chroma_rows)?;
                b.check_bounds(PlaneKind::ChromaB, chroma_cols, chroma_rows)?;
            }
        }

        self.frame.prepare(width, height);
        let (luma_dst, chroma_dst) = self.frame.data.split_at_mut(w * h);

        for (row, dst) in luma_dst.chunks_exact_mut(w).enumerate() {
            dst.copy_from_slice(luma.row(row, w));
        }

        match chroma {
            ChromaPlanes::Interleaved(plane) => {
                let plane = PlaneView::packed(plane.data, plane.row_stride);
                for (row, dst) in chroma_dst.chunks_exact_mut(w).enumerate() {
                    dst.copy_from_slice(plane.row(row, w));
                }
                self.frame.chroma_order = self.interleaved_order;
            }
            ChromaPlanes::Separate { a, b } => {
                self.frame.chroma_order = ChromaOrder::Vu;
                for (row, dst) in chroma_dst.chunks_exact_mut(w).enumerate() {
                    interleave_row(
                        dst,
                        b.row(row, chroma_cols),
                        b.pixel_stride,
                        a.row(row, chroma_cols),
                        a.pixel_stride,
                    );
                }
            }
        }

        trace!(
            width,
            height,
            planes = chroma.plane_count(),
            "Normalized frame"
        );

        Ok(&self.frame)
    }
}

/// Write `first[k]`, `second[k]` pairs into `dst`
#[inline]
fn interleave_row(
    dst: &mut [u8],
    first: &[u8],
    first_stride: usize,
    second: &[u8],
    second_stride: usize,
) {
    let firsts = first.iter().step_by(first_stride);
    let seconds = second.iter().step_by(second_stride);
    for (pair, (&f, &s)) in dst.chunks_exact_mut(2).zip(firsts.zip(seconds)) {
        pair[0] = f;
        pair[1] = s;
    }
}

fn check_dimensions(width: u32, height: u32) -> Result<(), NormalizeError> {
    if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
        return Err(NormalizeError::InvalidArgs(format!(
            "dimensions must be even and non-zero, got {}x{}",
            width, height
        )));
    }
    Ok(())
}

fn check_pixel_stride(plane: PlaneKind, pixel_stride: usize) -> Result<(), NormalizeError> {
    if !(1..=2).contains(&pixel_stride) {
        return Err(NormalizeError::InvalidArgs(format!(
            "{} pixel stride must be 1 or 2, got {}",
            plane, pixel_stride
        )));
    }
    Ok(())
}
