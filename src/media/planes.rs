// SPDX-License-Identifier: GPL-3.0-only

//! Borrowed views over raw camera planes

use crate::errors::{NormalizeError, PlaneKind};

/// A non-owning view over one plane of a camera frame
///
/// Only valid for the duration of one conversion call; the bytes belong to
/// the caller. The number of samples per row and the number of rows are not
/// stored here, they follow from the frame dimensions and the plane's role.
#[derive(Debug, Clone, Copy)]
pub struct PlaneView<'a> {
    pub data: &'a [u8],
    /// Byte distance between the starts of consecutive rows
    pub row_stride: usize,
    /// Byte distance between consecutive samples within a row
    pub pixel_stride: usize,
}

impl<'a> PlaneView<'a> {
    pub fn new(data: &'a [u8], row_stride: usize, pixel_stride: usize) -> Self {
        Self {
            data,
            row_stride,
            pixel_stride,
        }
    }

    /// A plane whose samples are adjacent bytes (pixel stride 1)
    pub fn packed(data: &'a [u8], row_stride: usize) -> Self {
        Self::new(data, row_stride, 1)
    }

    /// Bytes spanned by one row of `samples` samples, saturating at `usize::MAX`
    #[inline]
    pub fn row_span(&self, samples: usize) -> usize {
        if samples == 0 {
            0
        } else {
            (samples - 1)
                .saturating_mul(self.pixel_stride)
                .saturating_add(1)
        }
    }

    /// Minimum data length for `rows` rows of `samples` samples each
    ///
    /// The last row only needs to reach its final sample; camera HALs often
    /// hand out planes whose trailing row padding is cut off. Saturates at
    /// `usize::MAX`, which no slice can satisfy.
    pub fn required_len(&self, samples: usize, rows: usize) -> usize {
        if rows == 0 || samples == 0 {
            return 0;
        }
        self.row_stride
            .saturating_mul(rows - 1)
            .saturating_add(self.row_span(samples))
    }

    /// Check the plane can be read for the given geometry without going out of range
    pub fn check_bounds(
        &self,
        plane: PlaneKind,
        samples: usize,
        rows: usize,
    ) -> Result<(), NormalizeError> {
        let span = self.row_span(samples);
        if self.row_stride < span {
            return Err(NormalizeError::StrideTooSmall {
                plane,
                row_stride: self.row_stride,
                required: span,
            });
        }

        let required = self.required_len(samples, rows);
        if self.data.len() < required {
            return Err(NormalizeError::OutOfBounds {
                plane,
                required,
                actual: self.data.len(),
            });
        }

        Ok(())
    }

    /// Row `index`, starting at the row's first sample
    ///
    /// Callers must have passed [`check_bounds`](Self::check_bounds) first.
    #[inline]
    pub(crate) fn row(&self, index: usize, samples: usize) -> &'a [u8] {
        let start = index * self.row_stride;
        &self.data[start..start + self.row_span(samples)]
    }
}

/// Chroma input shapes accepted by the normalizer
#[derive(Debug, Clone, Copy)]
pub enum ChromaPlanes<'a> {
    /// One plane with chroma already interleaved in canonical order
    Interleaved(PlaneView<'a>),
    /// Two separate chroma planes; `a` is the first chroma plane delivered
    /// by the camera, `b` the second
    Separate { a: PlaneView<'a>, b: PlaneView<'a> },
}

impl<'a> ChromaPlanes<'a> {
    /// Select the shape from the presence of the second chroma plane
    pub fn from_planes(first: PlaneView<'a>, second: Option<PlaneView<'a>>) -> Self {
        match second {
            Some(b) => ChromaPlanes::Separate { a: first, b },
            None => ChromaPlanes::Interleaved(first),
        }
    }

    /// Number of input planes including luma
    pub fn plane_count(&self) -> usize {
        match self {
            ChromaPlanes::Interleaved(_) => 2,
            ChromaPlanes::Separate { .. } => 3,
        }
    }
}
