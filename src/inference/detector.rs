// SPDX-License-Identifier: GPL-3.0-only

//! Synchronous pose detectors run by the live-stream engine

use super::{EngineOptions, Landmark, PackedImage};
use tracing::debug;

/// A detector scores one packed image at a time
///
/// Called from the engine's worker thread, never from the frame path.
pub trait PoseDetector: Send {
    /// Short name for logging
    fn name(&self) -> &'static str;

    /// Load models and apply options; called once before the first frame
    fn prepare(&mut self, options: &EngineOptions) -> Result<(), String>;

    /// Detect poses; each pose is a list of landmarks
    fn detect(&mut self, image: PackedImage<'_>) -> Result<Vec<Vec<Landmark>>, String>;
}

/// Model-free detector used for demos and tests
///
/// Reports a single landmark at the brightness-weighted centroid of the image
/// when the mean brightness reaches the detection confidence threshold.
#[derive(Debug, Clone)]
pub struct LumaCentroidDetector {
    min_confidence: f32,
}

impl Default for LumaCentroidDetector {
    fn default() -> Self {
        Self {
            min_confidence: crate::constants::DEFAULT_MIN_DETECTION_CONFIDENCE,
        }
    }
}

impl LumaCentroidDetector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PoseDetector for LumaCentroidDetector {
    fn name(&self) -> &'static str {
        "luma-centroid"
    }

    fn prepare(&mut self, options: &EngineOptions) -> Result<(), String> {
        debug!(
            model = %options.model_path.display(),
            "Centroid detector ignores the model path"
        );
        self.min_confidence = options.min_detection_confidence;
        Ok(())
    }

    fn detect(&mut self, image: PackedImage<'_>) -> Result<Vec<Vec<Landmark>>, String> {
        let width = image.width as usize;
        let height = image.height as usize;
        if width == 0 || height == 0 {
            return Err("empty image".into());
        }
        let expected = width * height * 4;
        if image.data.len() < expected {
            return Err(format!(
                "image holds {} bytes, {} required",
                image.data.len(),
                expected
            ));
        }

        let mut total = 0u64;
        let mut sum_x = 0u64;
        let mut sum_y = 0u64;
        for (i, px) in image.data[..expected].chunks_exact(4).enumerate() {
            let (r, g, b) = image.order.unpack([px[0], px[1], px[2], px[3]]);
            // Integer BT.601 luma
            let luma = (77 * r as u64 + 150 * g as u64 + 29 * b as u64) >> 8;
            total += luma;
            sum_x += luma * (i % width) as u64;
            sum_y += luma * (i / width) as u64;
        }

        let mean = total as f32 / (width * height) as f32 / 255.0;
        if total == 0 || mean < self.min_confidence {
            return Ok(Vec::new());
        }

        // Centre of the weighted pixel, normalized to the image
        let x = (sum_x as f32 / total as f32 + 0.5) / width as f32;
        let y = (sum_y as f32 / total as f32 + 0.5) / height as f32;
        Ok(vec![vec![Landmark::new(x, y, 0.0)]])
    }
}
