// SPDX-License-Identifier: GPL-3.0-only

//! Canonical frame to packed 4-channel conversion
//!
//! The converter owns a reusable [`PackedFrame`] and delegates the colour
//! transform to a [`ColorConvertBackend`]. Two backends exist:
//!
//! - [`CpuBackend`]: fixed-point BT.601 arithmetic, always available
//! - `GpuBackend`: wgpu compute shader (cargo feature `gpu`)
//!
//! Both produce the same output to within a couple of code values per channel.
//! Channel order and colour range are fixed when the converter is built.

pub mod cpu;
#[cfg(feature = "gpu")]
pub mod gpu;

pub use cpu::CpuBackend;
#[cfg(feature = "gpu")]
pub use gpu::GpuBackend;

use crate::config::{BackendKind, PipelineConfig};
use crate::constants::{PACKED_BYTES_PER_PIXEL, SLOW_CONVERSION_MS};
use crate::errors::ConvertError;
use crate::media::formats::{ChannelOrder, ColorRange};
use crate::media::normalizer::CanonicalFrame;
use std::time::Instant;
use tracing::{debug, info};

/// Colour conversion capability behind the format converter
///
/// `convert` receives a destination of exactly `width * height * 4` bytes.
/// An implementation must either fill it completely and return `Ok`, or
/// return an error without having written to it.
pub trait ColorConvertBackend: Send {
    /// Short name for logging
    fn name(&self) -> &'static str;

    /// Convert a canonical frame into packed pixels
    fn convert(
        &mut self,
        frame: &CanonicalFrame,
        order: ChannelOrder,
        range: ColorRange,
        dst: &mut [u8],
    ) -> Result<(), ConvertError>;

    /// Release device resources; called once on shutdown
    fn release(&mut self) {}
}

/// Owned, reusable 4-bytes-per-pixel frame
#[derive(Debug, Default)]
pub struct PackedFrame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    order: ChannelOrder,
    allocations: u64,
}

impl PackedFrame {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channel_order(&self) -> ChannelOrder {
        self.order
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Number of times storage has been (re)allocated
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    /// Pixel at (x, y) as stored
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * PACKED_BYTES_PER_PIXEL;
        let px = self.data.get(idx..idx + PACKED_BYTES_PER_PIXEL)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    fn buffer_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * PACKED_BYTES_PER_PIXEL
    }
}

/// Converts canonical frames into the engine's packed layout
pub struct FormatConverter {
    backend: Box<dyn ColorConvertBackend>,
    order: ChannelOrder,
    range: ColorRange,
    packed: PackedFrame,
}

impl FormatConverter {
    /// Create a converter with an explicit backend
    pub fn new(
        order: ChannelOrder,
        range: ColorRange,
        backend: Box<dyn ColorConvertBackend>,
    ) -> Self {
        info!(
            backend = backend.name(),
            %order,
            ?range,
            "Format converter ready"
        );
        Self {
            backend,
            order,
            range,
            packed: PackedFrame {
                order,
                ..Default::default()
            },
        }
    }

    /// Create a converter on the CPU backend
    pub fn cpu(order: ChannelOrder, range: ColorRange) -> Self {
        Self::new(order, range, Box::new(CpuBackend::new()))
    }

    /// Build the converter described by the configuration
    ///
    /// A GPU request falls back to the CPU backend when no usable adapter is
    /// found (or the crate was built without the `gpu` feature).
    pub fn from_config(config: &PipelineConfig) -> Self {
        let order = config.channel_order();
        let range = config.color_range();
        Self::new(order, range, select_backend(config.backend))
    }

    pub fn channel_order(&self) -> ChannelOrder {
        self.order
    }

    pub fn color_range(&self) -> ColorRange {
        self.range
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// The most recently converted frame
    pub fn packed(&self) -> &PackedFrame {
        &self.packed
    }

    /// Convert `frame` into the packed buffer
    ///
    /// On any error the packed buffer keeps its previous contents.
    pub fn convert(
        &mut self,
        frame: &CanonicalFrame,
        width: u32,
        height: u32,
    ) -> Result<&PackedFrame, ConvertError> {
        if frame.width() != width || frame.height() != height || frame.as_bytes().is_empty() {
            return Err(ConvertError::DimensionMismatch {
                frame: (frame.width(), frame.height()),
                requested: (width, height),
            });
        }

        let start = Instant::now();
        let len = PackedFrame::buffer_len(width, height);

        if self.packed.data.len() == len {
            self.backend
                .convert(frame, self.order, self.range, &mut self.packed.data)?;
        } else {
            // Convert into fresh storage so a failure keeps the old frame intact
            let mut fresh = vec![0u8; len];
            self.backend
                .convert(frame, self.order, self.range, &mut fresh)?;
            debug!(
                width,
                height,
                bytes = len,
                "Allocated packed frame buffer"
            );
            self.packed.data = fresh;
            self.packed.allocations += 1;
        }
        self.packed.width = width;
        self.packed.height = height;

        let elapsed = start.elapsed();
        if elapsed.as_millis() > SLOW_CONVERSION_MS {
            debug!(
                elapsed_ms = format!("{:.2}", elapsed.as_micros() as f64 / 1000.0),
                backend = self.backend.name(),
                width,
                height,
                "Slow packed conversion"
            );
        }

        Ok(&self.packed)
    }

    /// Release backend resources
    pub fn release(&mut self) {
        self.backend.release();
    }
}

fn select_backend(kind: BackendKind) -> Box<dyn ColorConvertBackend> {
    match kind {
        BackendKind::Cpu => Box::new(CpuBackend::new()),
        #[cfg(feature = "gpu")]
        BackendKind::Gpu => match GpuBackend::new() {
            Ok(gpu) => Box::new(gpu),
            Err(e) => {
                tracing::warn!(error = %e, "GPU backend unavailable, falling back to CPU");
                Box::new(CpuBackend::new())
            }
        },
        #[cfg(not(feature = "gpu"))]
        BackendKind::Gpu => {
            tracing::warn!("Built without the gpu feature, using CPU conversion");
            Box::new(CpuBackend::new())
        }
    }
}
