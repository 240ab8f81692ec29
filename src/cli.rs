// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! - Converting a synthetic frame to a PNG
//! - Benchmarking the full pipeline
//! - Serving the call bridge over stdin/stdout
//! - Writing a config file

use pose_stream::bridge::CallBridge;
use pose_stream::config::PipelineConfig;
use pose_stream::inference::LiveStreamEngine;
use pose_stream::media::formats::{ChromaOrder, Rotation, TargetPlatform};
use pose_stream::media::{ChromaPlanes, FormatConverter, PlaneNormalizer, PlaneView};
use pose_stream::pipeline::{FrameInput, FramePipeline};
use std::io::{BufRead, Write};
use std::path::Path;
use std::time::{Duration, Instant};

/// Plane layouts a synthetic frame can be delivered in
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SyntheticLayout {
    /// Three planes aliasing one interleaved chroma buffer (pixel stride 2), padded rows
    Android,
    /// Three planes with separate chroma (pixel stride 1), padded rows
    I420,
    /// Two planes, chroma interleaved in the config's pair order
    SemiPlanar,
}

enum SyntheticChroma {
    Aliased { vu: Vec<u8>, stride: usize },
    Planar { u: Vec<u8>, v: Vec<u8>, stride: usize },
    Interleaved { vu: Vec<u8>, stride: usize },
}

/// Test pattern: luma ramps left to right, chroma quadrants in four hues
pub struct SyntheticFrame {
    width: u32,
    height: u32,
    luma: Vec<u8>,
    luma_stride: usize,
    chroma: SyntheticChroma,
}

impl SyntheticFrame {
    /// `chroma_order` sets the pair order of the semi-planar layout; the
    /// aliased Android layout is always V/U in memory
    pub fn new(width: u32, height: u32, layout: SyntheticLayout, chroma_order: ChromaOrder) -> Self {
        let w = width as usize;
        let h = height as usize;
        let (cw, ch) = (w / 2, h / 2);

        let padding = match layout {
            SyntheticLayout::SemiPlanar => 0,
            _ => 16,
        };
        let luma_stride = w + padding;
        let mut luma = vec![0u8; luma_stride * h];
        for row in luma.chunks_exact_mut(luma_stride) {
            for (x, sample) in row[..w].iter_mut().enumerate() {
                *sample = (16 + x * 219 / w.max(2).saturating_sub(1)).min(235) as u8;
            }
        }

        let v_at = |cx: usize| if cx < cw / 2 { 200u8 } else { 90 };
        let u_at = |cy: usize| if cy < ch / 2 { 90u8 } else { 200 };

        let chroma = match layout {
            SyntheticLayout::Android | SyntheticLayout::SemiPlanar => {
                let pair_order = match layout {
                    SyntheticLayout::SemiPlanar => chroma_order,
                    _ => ChromaOrder::Vu,
                };
                let stride = w + padding;
                let mut vu = vec![0u8; stride * ch];
                for (cy, row) in vu.chunks_exact_mut(stride).enumerate() {
                    for cx in 0..cw {
                        let pair = match pair_order {
                            ChromaOrder::Vu => [v_at(cx), u_at(cy)],
                            ChromaOrder::Uv => [u_at(cy), v_at(cx)],
                        };
                        row[cx * 2..cx * 2 + 2].copy_from_slice(&pair);
                    }
                }
                if layout == SyntheticLayout::Android {
                    SyntheticChroma::Aliased { vu, stride }
                } else {
                    SyntheticChroma::Interleaved { vu, stride }
                }
            }
            SyntheticLayout::I420 => {
                let stride = cw + padding / 2;
                let mut u = vec![0u8; stride * ch];
                let mut v = vec![0u8; stride * ch];
                for cy in 0..ch {
                    for cx in 0..cw {
                        u[cy * stride + cx] = u_at(cy);
                        v[cy * stride + cx] = v_at(cx);
                    }
                }
                SyntheticChroma::Planar { u, v, stride }
            }
        };

        Self {
            width,
            height,
            luma,
            luma_stride,
            chroma,
        }
    }

    pub fn input(&self, rotation: Rotation, timestamp_ms: i64) -> FrameInput<'_> {
        let chroma = match &self.chroma {
            // The first chroma plane starts one byte into the shared buffer
            SyntheticChroma::Aliased { vu, stride } => ChromaPlanes::Separate {
                a: PlaneView::new(&vu[1..], *stride, 2),
                b: PlaneView::new(&vu[..vu.len() - 1], *stride, 2),
            },
            SyntheticChroma::Planar { u, v, stride } => ChromaPlanes::Separate {
                a: PlaneView::packed(u, *stride),
                b: PlaneView::packed(v, *stride),
            },
            SyntheticChroma::Interleaved { vu, stride } => {
                ChromaPlanes::Interleaved(PlaneView::packed(vu, *stride))
            }
        };

        FrameInput {
            luma: PlaneView::packed(&self.luma, self.luma_stride),
            chroma,
            width: self.width,
            height: self.height,
            rotation,
            timestamp_ms,
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    Ok(PipelineConfig::load_or_default(path)?)
}

/// Normalize and convert one synthetic frame and save it as PNG
pub fn convert_frame(
    width: u32,
    height: u32,
    layout: SyntheticLayout,
    target: Option<TargetPlatform>,
    config: Option<&Path>,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(config)?;
    if let Some(target) = target {
        config.target = target;
        config.channel_order = None;
        config.color_range = None;
        config.interleaved_chroma = None;
    }

    let frame = SyntheticFrame::new(width, height, layout, config.interleaved_chroma());
    let input = frame.input(Rotation::None, 0);

    let mut normalizer = PlaneNormalizer::with_interleaved_order(config.interleaved_chroma());
    let mut converter = FormatConverter::from_config(&config);

    let start = Instant::now();
    let canonical = normalizer.normalize(&input.luma, input.chroma, width, height)?;
    let packed = converter.convert(canonical, width, height)?;
    let elapsed = start.elapsed();

    // PNG wants RGBA regardless of the engine's order
    let order = packed.channel_order();
    let mut rgba = Vec::with_capacity(packed.as_bytes().len());
    for px in packed.as_bytes().chunks_exact(4) {
        let (r, g, b) = order.unpack([px[0], px[1], px[2], px[3]]);
        rgba.extend_from_slice(&[r, g, b, px[3]]);
    }
    let image = image::RgbaImage::from_raw(width, height, rgba)
        .ok_or("Failed to create image from packed frame")?;
    image.save(output)?;
    converter.release();

    println!(
        "Converted {}x{} {:?} frame ({} backend, {}, {:?} range) in {:.2} ms",
        width,
        height,
        layout,
        converter.backend_name(),
        order,
        converter.color_range(),
        elapsed.as_secs_f64() * 1000.0
    );
    println!("Saved to: {}", output.display());
    Ok(())
}

/// Push synthetic frames through the pipeline and print throughput
pub fn bench(
    frames: u32,
    width: u32,
    height: u32,
    layout: SyntheticLayout,
    config: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config)?;
    let engine = LiveStreamEngine::default();
    let stats = engine.stats_handle();
    let mut pipeline = FramePipeline::new(&config, Box::new(engine))?;

    let frame = SyntheticFrame::new(width, height, layout, config.interleaved_chroma());
    let frame_interval_ms = 33;

    println!(
        "Running {} frames of {}x{} ({:?}) through {} conversion",
        frames,
        width,
        height,
        layout,
        pipeline.converter().backend_name()
    );

    let start = Instant::now();
    let mut with_pose = 0u32;
    for i in 0..frames {
        let input = frame.input(Rotation::Rotate90, i as i64 * frame_interval_ms);
        let latest = pipeline.process_frame(&input)?;
        if !latest.is_empty() {
            with_pose += 1;
        }
    }
    let elapsed = start.elapsed();

    // Give in-flight detections a moment before reading the counters
    std::thread::sleep(Duration::from_millis(50));
    let stats = stats.snapshot();
    pipeline.shutdown();

    let fps = frames as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    println!("Frames:         {}", frames);
    println!("Elapsed:        {:.1} ms", elapsed.as_secs_f64() * 1000.0);
    println!("Throughput:     {:.1} fps", fps);
    println!("With landmarks: {}", with_pose);
    println!(
        "Engine:         {} submitted, {} dropped, {} completed, {} failed",
        stats.submitted, stats.dropped, stats.completed, stats.failed
    );
    Ok(())
}

/// Serve bridge calls, one JSON object per line
pub fn serve_bridge(config: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config)?;
    let mut bridge = CallBridge::new(config, Box::new(LiveStreamEngine::default()));

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = bridge.handle_line(&line)?;
        writeln!(out, "{}", response)?;
        out.flush()?;
    }

    bridge.shutdown();
    Ok(())
}

/// Write a config for `target` to `output`, or to the default location
pub fn write_config(
    target: TargetPlatform,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = match output {
        Some(path) => path.to_path_buf(),
        None => PipelineConfig::require_default_path()?,
    };
    PipelineConfig::for_target(target).save(&path)?;
    println!("Wrote {:?} config to: {}", target, path.display());
    Ok(())
}
