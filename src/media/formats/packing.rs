// SPDX-License-Identifier: GPL-3.0-only

//! Channel order and colour range of packed frames

use serde::{Deserialize, Serialize};

/// Byte order of the four channels in a packed pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    /// R G B A
    #[default]
    Rgba,
    /// B G R A
    Bgra,
}

impl ChannelOrder {
    /// Arrange an RGB triple (alpha opaque) in this order
    #[inline]
    pub fn pack(self, r: u8, g: u8, b: u8) -> [u8; 4] {
        match self {
            ChannelOrder::Rgba => [r, g, b, 255],
            ChannelOrder::Bgra => [b, g, r, 255],
        }
    }

    /// Read back (r, g, b) from a pixel packed in this order
    #[inline]
    pub fn unpack(self, px: [u8; 4]) -> (u8, u8, u8) {
        match self {
            ChannelOrder::Rgba => (px[0], px[1], px[2]),
            ChannelOrder::Bgra => (px[2], px[1], px[0]),
        }
    }

    /// Code passed to the GPU shader (0=RGBA, 1=BGRA)
    pub fn gpu_code(self) -> u32 {
        match self {
            ChannelOrder::Rgba => 0,
            ChannelOrder::Bgra => 1,
        }
    }
}

impl std::fmt::Display for ChannelOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelOrder::Rgba => write!(f, "RGBA"),
            ChannelOrder::Bgra => write!(f, "BGRA"),
        }
    }
}

/// Quantization range of the incoming luma/chroma samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorRange {
    /// Y and UV use 0-255
    #[default]
    Full,
    /// Y uses 16-235, UV 16-240 (video range)
    Limited,
}

impl ColorRange {
    /// Code passed to the GPU shader (0=full, 1=limited)
    pub fn gpu_code(self) -> u32 {
        match self {
            ColorRange::Full => 0,
            ColorRange::Limited => 1,
        }
    }
}

/// Order of the two samples in each interleaved chroma pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChromaOrder {
    /// Cr then Cb (NV21)
    #[default]
    Vu,
    /// Cb then Cr (NV12)
    Uv,
}

impl ChromaOrder {
    /// Split a stored pair into (v, u)
    #[inline]
    pub fn split(self, pair: [u8; 2]) -> (u8, u8) {
        match self {
            ChromaOrder::Vu => (pair[0], pair[1]),
            ChromaOrder::Uv => (pair[1], pair[0]),
        }
    }

    /// Code passed to the GPU shader (0=VU, 1=UV)
    pub fn gpu_code(self) -> u32 {
        match self {
            ChromaOrder::Vu => 0,
            ChromaOrder::Uv => 1,
        }
    }
}

/// Platform presets for the packed output
///
/// Android frames come from a limited-range YUV420 camera stream and the
/// engine there takes RGBA bitmaps. iOS delivers full-range bi-planar
/// (NV12) buffers and its engine build only accepts BGRA pixel buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetPlatform {
    #[default]
    Android,
    Ios,
}

impl TargetPlatform {
    /// Channel order the target's engine expects
    pub fn channel_order(self) -> ChannelOrder {
        match self {
            TargetPlatform::Android => ChannelOrder::Rgba,
            TargetPlatform::Ios => ChannelOrder::Bgra,
        }
    }

    /// Colour range the target's camera produces
    pub fn color_range(self) -> ColorRange {
        match self {
            TargetPlatform::Android => ColorRange::Limited,
            TargetPlatform::Ios => ColorRange::Full,
        }
    }

    /// Chroma order of the target's two-plane frames
    ///
    /// Three-plane frames do not depend on this: both platforms deliver U in
    /// the first chroma plane.
    pub fn interleaved_chroma(self) -> ChromaOrder {
        match self {
            TargetPlatform::Android => ChromaOrder::Vu,
            TargetPlatform::Ios => ChromaOrder::Uv,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_unpack_orders() {
        assert_eq!(ChannelOrder::Rgba.pack(1, 2, 3), [1, 2, 3, 255]);
        assert_eq!(ChannelOrder::Bgra.pack(1, 2, 3), [3, 2, 1, 255]);
        assert_eq!(ChannelOrder::Bgra.unpack([3, 2, 1, 255]), (1, 2, 3));
    }

    #[test]
    fn test_target_presets() {
        assert_eq!(TargetPlatform::Android.channel_order(), ChannelOrder::Rgba);
        assert_eq!(TargetPlatform::Android.color_range(), ColorRange::Limited);
        assert_eq!(TargetPlatform::Ios.channel_order(), ChannelOrder::Bgra);
        assert_eq!(TargetPlatform::Ios.color_range(), ColorRange::Full);
        assert_eq!(TargetPlatform::Android.interleaved_chroma(), ChromaOrder::Vu);
        assert_eq!(TargetPlatform::Ios.interleaved_chroma(), ChromaOrder::Uv);
    }

    #[test]
    fn test_chroma_split() {
        assert_eq!(ChromaOrder::Vu.split([200, 50]), (200, 50));
        assert_eq!(ChromaOrder::Uv.split([50, 200]), (200, 50));
    }
}
