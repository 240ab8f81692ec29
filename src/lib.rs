// SPDX-License-Identifier: GPL-3.0-only

//! Pose Stream - camera frames in, live pose landmarks out
//!
//! This library turns raw YUV 4:2:0 camera planes into the packed pixel
//! buffer a pose inference engine consumes, and caches the engine's latest
//! asynchronous result for the synchronous per-frame caller.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`media`]: Plane normalization and RGBA/BGRA conversion
//! - [`inference`]: Engine abstraction, live-stream engine and result cache
//! - [`pipeline`]: Per-frame normalize → convert → submit → read latest
//! - [`bridge`]: Call-bridge argument handling and responses
//! - [`config`]: Pipeline configuration handling
//!
//! # Example
//!
//! ```no_run
//! use pose_stream::config::PipelineConfig;
//! use pose_stream::inference::LiveStreamEngine;
//! use pose_stream::media::{ChromaPlanes, PlaneView, Rotation};
//! use pose_stream::pipeline::{FrameInput, FramePipeline};
//!
//! let config = PipelineConfig::default();
//! let mut pipeline = FramePipeline::new(&config, Box::new(LiveStreamEngine::default()))?;
//!
//! let (y, u, v) = (vec![0u8; 16], vec![128u8; 4], vec![128u8; 4]);
//! let input = FrameInput {
//!     luma: PlaneView::packed(&y, 4),
//!     chroma: ChromaPlanes::Separate {
//!         a: PlaneView::packed(&u, 2),
//!         b: PlaneView::packed(&v, 2),
//!     },
//!     width: 4,
//!     height: 4,
//!     rotation: Rotation::None,
//!     timestamp_ms: 0,
//! };
//! let latest = pipeline.process_frame(&input)?;
//! println!("{} landmarks", latest.landmarks().len());
//! # Ok::<(), pose_stream::errors::PipelineError>(())
//! ```

pub mod bridge;
pub mod config;
pub mod constants;
pub mod errors;
pub mod inference;
pub mod media;
pub mod pipeline;

// Re-export commonly used types
pub use bridge::CallBridge;
pub use config::PipelineConfig;
pub use errors::{ErrorCode, PipelineError, PipelineResult};
pub use pipeline::{FrameInput, FramePipeline};
