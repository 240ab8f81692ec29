// SPDX-License-Identifier: GPL-3.0-only

//! Direct-arithmetic conversion backend
//!
//! Fixed-point BT.601 with round-to-nearest, two pixels per chroma sample.
//! Chroma pairs are split according to the frame's recorded order.

use super::ColorConvertBackend;
use crate::constants::PACKED_BYTES_PER_PIXEL;
use crate::constants::bt601::*;
use crate::errors::ConvertError;
use crate::media::formats::{ChannelOrder, ChromaOrder, ColorRange};
use crate::media::normalizer::CanonicalFrame;

/// Chroma contributions shared by the two pixels of one chroma sample
#[derive(Debug, Clone, Copy)]
struct ChromaTerms {
    r: i32,
    g: i32,
    b: i32,
}

impl ChromaTerms {
    #[inline]
    fn new(v: u8, u: u8, range: ColorRange) -> Self {
        let v = v as i32 - 128;
        let u = u as i32 - 128;
        match range {
            ColorRange::Full => Self {
                r: FULL_V_TO_R * v,
                g: -FULL_U_TO_G * u - FULL_V_TO_G * v,
                b: FULL_U_TO_B * u,
            },
            ColorRange::Limited => Self {
                r: LIMITED_V_TO_R * v,
                g: -LIMITED_U_TO_G * u - LIMITED_V_TO_G * v,
                b: LIMITED_U_TO_B * u,
            },
        }
    }

    #[inline]
    fn apply(&self, y: u8, range: ColorRange) -> (u8, u8, u8) {
        let base = match range {
            ColorRange::Full => (y as i32) << 8,
            ColorRange::Limited => LIMITED_Y * (y as i32 - 16),
        };
        (
            descale(base + self.r),
            descale(base + self.g),
            descale(base + self.b),
        )
    }
}

#[inline]
fn descale(value: i32) -> u8 {
    ((value + ROUNDING) >> 8).clamp(0, 255) as u8
}

/// Converts on the calling thread; stateless
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ColorConvertBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn convert(
        &mut self,
        frame: &CanonicalFrame,
        order: ChannelOrder,
        range: ColorRange,
        dst: &mut [u8],
    ) -> Result<(), ConvertError> {
        let width = frame.width() as usize;
        let height = frame.height() as usize;
        let expected = width * height * PACKED_BYTES_PER_PIXEL;
        if dst.len() != expected {
            return Err(ConvertError::ConversionFailed(format!(
                "destination holds {} bytes, {} required",
                dst.len(),
                expected
            )));
        }

        let luma = frame.luma();
        let chroma = frame.chroma();
        let chroma_order = frame.chroma_order();
        let pixels: &mut [[u8; 4]] = bytemuck::cast_slice_mut(dst);

        for (row, (y_row, out_row)) in luma
            .chunks_exact(width)
            .zip(pixels.chunks_exact_mut(width))
            .enumerate()
        {
            let c_start = (row / 2) * width;
            let c_row = &chroma[c_start..c_start + width];
            process_row(y_row, c_row, out_row, chroma_order, order, range);
        }

        Ok(())
    }
}

#[inline]
fn process_row(
    y_row: &[u8],
    c_row: &[u8],
    out_row: &mut [[u8; 4]],
    chroma_order: ChromaOrder,
    order: ChannelOrder,
    range: ColorRange,
) {
    for ((ys, pair), out) in y_row
        .chunks_exact(2)
        .zip(c_row.chunks_exact(2))
        .zip(out_row.chunks_exact_mut(2))
    {
        let (v, u) = chroma_order.split([pair[0], pair[1]]);
        let terms = ChromaTerms::new(v, u, range);

        let (r, g, b) = terms.apply(ys[0], range);
        out[0] = order.pack(r, g, b);

        let (r, g, b) = terms.apply(ys[1], range);
        out[1] = order.pack(r, g, b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Uniform frame with every luma sample `y` and every chroma pair (v, u)
    fn uniform(width: u32, height: u32, y: u8, v: u8, u: u8) -> CanonicalFrame {
        let pixels = (width * height) as usize;
        let mut data = vec![y; pixels];
        for _ in 0..pixels / 4 {
            data.push(v);
            data.push(u);
        }
        CanonicalFrame::from_bytes(data, width, height).unwrap()
    }

    fn convert(frame: &CanonicalFrame, order: ChannelOrder, range: ColorRange) -> Vec<u8> {
        let mut dst = vec![0u8; frame.width() as usize * frame.height() as usize * 4];
        CpuBackend::new()
            .convert(frame, order, range, &mut dst)
            .unwrap();
        dst
    }

    #[test]
    fn test_full_range_neutral() {
        let out = convert(&uniform(2, 2, 128, 128, 128), ChannelOrder::Rgba, ColorRange::Full);
        assert!(out.chunks_exact(4).all(|px| px == [128, 128, 128, 255]));

        let out = convert(&uniform(2, 2, 255, 128, 128), ChannelOrder::Rgba, ColorRange::Full);
        assert!(out.chunks_exact(4).all(|px| px == [255, 255, 255, 255]));
    }

    #[test]
    fn test_limited_range_extremes() {
        let black = convert(&uniform(2, 2, 16, 128, 128), ChannelOrder::Rgba, ColorRange::Limited);
        assert_eq!(&black[..4], &[0, 0, 0, 255]);

        let white = convert(&uniform(2, 2, 235, 128, 128), ChannelOrder::Rgba, ColorRange::Limited);
        assert_eq!(&white[..4], &[255, 255, 255, 255]);

        // Below-black luma clamps instead of wrapping
        let under = convert(&uniform(2, 2, 0, 128, 128), ChannelOrder::Rgba, ColorRange::Limited);
        assert_eq!(&under[..4], &[0, 0, 0, 255]);
    }

    #[test]
    fn test_red_in_both_orders() {
        // BT.601 full-range red: Y=76, U=85, V=255
        let frame = uniform(2, 2, 76, 255, 85);

        let rgba = convert(&frame, ChannelOrder::Rgba, ColorRange::Full);
        assert!(rgba[0] >= 253, "red channel was {}", rgba[0]);
        assert!(rgba[1] <= 1 && rgba[2] <= 1);
        assert_eq!(rgba[3], 255);

        let bgra = convert(&frame, ChannelOrder::Bgra, ColorRange::Full);
        assert_eq!(&bgra[..4], &[rgba[2], rgba[1], rgba[0], 255]);
    }

    #[test]
    fn test_chroma_pair_is_v_then_u() {
        // Swapping the pair turns strong red into strong blue
        let red = convert(&uniform(2, 2, 76, 255, 85), ChannelOrder::Rgba, ColorRange::Full);
        let swapped = convert(&uniform(2, 2, 76, 85, 255), ChannelOrder::Rgba, ColorRange::Full);
        assert!(red[0] > red[2]);
        assert!(swapped[2] > swapped[0]);
    }

    #[test]
    fn test_uv_frames_read_u_first() {
        // Same red, stored NV12-style
        let pixels = 4usize;
        let mut data = vec![76u8; pixels];
        data.extend_from_slice(&[85, 255]);
        let frame = CanonicalFrame::from_bytes(data, 2, 2)
            .unwrap()
            .with_chroma_order(ChromaOrder::Uv);

        let out = convert(&frame, ChannelOrder::Rgba, ColorRange::Full);
        let expected = convert(&uniform(2, 2, 76, 255, 85), ChannelOrder::Rgba, ColorRange::Full);
        assert_eq!(out, expected);
        assert!(out[0] >= 253);
    }

    #[test]
    fn test_chroma_shared_by_2x2_block() {
        // 4x2 frame: left block neutral, right block red-ish
        let mut data = vec![100u8; 8];
        data.extend_from_slice(&[128, 128, 255, 85]);
        let frame = CanonicalFrame::from_bytes(data, 4, 2).unwrap();
        let out = convert(&frame, ChannelOrder::Rgba, ColorRange::Full);
        let px = |x: usize, y: usize| &out[(y * 4 + x) * 4..(y * 4 + x) * 4 + 4];

        assert_eq!(px(0, 0), px(1, 1));
        assert_eq!(px(2, 0), px(3, 1));
        assert_ne!(px(0, 0), px(2, 0));
        assert_eq!(px(0, 0), &[100, 100, 100, 255]);
    }

    #[test]
    fn test_wrong_destination_size() {
        let frame = uniform(2, 2, 50, 128, 128);
        let mut dst = vec![7u8; 15];
        let err = CpuBackend::new()
            .convert(&frame, ChannelOrder::Rgba, ColorRange::Full, &mut dst)
            .unwrap_err();
        assert!(matches!(err, ConvertError::ConversionFailed(_)));
        assert!(dst.iter().all(|&b| b == 7));
    }

    #[test]
    fn test_deterministic_output() {
        let data: Vec<u8> = (0..24u32).map(|i| (i * 37 % 251) as u8).collect();
        let frame = CanonicalFrame::from_bytes(data, 4, 4).unwrap();
        let a = convert(&frame, ChannelOrder::Bgra, ColorRange::Limited);
        let b = convert(&frame, ChannelOrder::Bgra, ColorRange::Limited);
        assert_eq!(a, b);
    }
}
