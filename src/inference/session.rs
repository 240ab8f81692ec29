// SPDX-License-Identifier: GPL-3.0-only

//! Detection session: engine plus latest-result slot

use super::result_cache::ResultSlot;
use super::{
    Completion, CompletionListener, DetectionResult, EngineOptions, PackedImage, PoseEngine,
};
use crate::errors::EngineError;
use std::sync::Arc;
use tracing::{info, warn};

/// Owns the inference engine and the slot its completions are written to
///
/// `submit` never waits for detection; `read_latest` returns whatever
/// finished most recently, which is usually the result of an earlier frame.
pub struct DetectionSession {
    engine: Box<dyn PoseEngine>,
    slot: Arc<ResultSlot>,
    closed: bool,
}

impl DetectionSession {
    pub fn new(engine: Box<dyn PoseEngine>) -> Self {
        Self {
            engine,
            slot: Arc::new(ResultSlot::new()),
            closed: false,
        }
    }

    /// Configure the engine with a listener that feeds the result slot
    pub fn start(&mut self, options: &EngineOptions) -> Result<(), EngineError> {
        let slot = Arc::clone(&self.slot);
        let listener: CompletionListener = Arc::new(move |completion| {
            Self::on_complete(&slot, completion);
        });
        self.engine.configure(options, listener)?;
        self.closed = false;
        info!(
            model = %options.model_path.display(),
            "Detection session started"
        );
        Ok(())
    }

    /// Hand a packed frame to the engine without waiting for the result
    ///
    /// The slot is left untouched on failure.
    pub fn submit(&self, image: PackedImage<'_>, timestamp_ms: i64) -> Result<(), EngineError> {
        if self.closed {
            return Err(EngineError::Closed);
        }
        if !self.engine.is_configured() {
            return Err(EngineError::NotConfigured);
        }
        self.engine.submit(image, timestamp_ms)
    }

    /// Completion handler: successful detections replace the slot, even when
    /// they found no pose; failures are only logged.
    pub fn on_complete(slot: &ResultSlot, completion: Completion) {
        match completion.outcome {
            Ok(poses) => {
                slot.store(DetectionResult::from_poses(poses), completion.timestamp_ms);
            }
            Err(e) => {
                warn!(
                    error = %e,
                    timestamp_ms = completion.timestamp_ms,
                    "Pose detection failed"
                );
            }
        }
    }

    /// Most recent completed result, empty before the first completion
    pub fn read_latest(&self) -> Arc<DetectionResult> {
        self.slot.read_latest()
    }

    /// Shared handle to the result slot
    pub fn slot(&self) -> Arc<ResultSlot> {
        Arc::clone(&self.slot)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Release the engine session; idempotent
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.engine.close();
        self.closed = true;
        info!("Detection session closed");
    }
}
