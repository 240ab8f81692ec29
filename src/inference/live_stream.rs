// SPDX-License-Identifier: GPL-3.0-only

//! Live-stream engine running a [`PoseDetector`] on its own tokio runtime
//!
//! Frames are copied into a bounded queue and scored one at a time on a
//! blocking worker. When the queue is full the newest frame is dropped
//! instead of blocking the camera thread: for a live preview a late result is
//! worth less than a fresh one.

use super::detector::{LumaCentroidDetector, PoseDetector};
use super::{Completion, CompletionListener, EngineOptions, OwnedImage, PackedImage, PoseEngine};
use crate::errors::EngineError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, trace, warn};

/// How long `close` waits for an in-flight detection
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Frame counters of a live-stream engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Frames accepted into the queue
    pub submitted: u64,
    /// Frames dropped because the queue was full
    pub dropped: u64,
    /// Detections that produced a result
    pub completed: u64,
    /// Detections that failed
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    dropped: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> EngineStats {
        EngineStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Shared read access to an engine's counters, usable after the engine has
/// been moved into a pipeline
#[derive(Debug, Clone)]
pub struct StatsHandle(Arc<Counters>);

impl StatsHandle {
    pub fn snapshot(&self) -> EngineStats {
        self.0.snapshot()
    }
}

struct Job {
    image: OwnedImage,
    timestamp_ms: i64,
}

type SharedDetector = Arc<Mutex<Box<dyn PoseDetector>>>;

/// Asynchronous engine with live-stream back-pressure
pub struct LiveStreamEngine {
    detector: SharedDetector,
    detector_name: &'static str,
    runtime: Option<tokio::runtime::Runtime>,
    sender: Option<mpsc::Sender<Job>>,
    last_timestamp: Mutex<Option<i64>>,
    counters: Arc<Counters>,
    closed: bool,
}

impl Default for LiveStreamEngine {
    fn default() -> Self {
        Self::new(Box::new(LumaCentroidDetector::new()))
    }
}

impl LiveStreamEngine {
    pub fn new(detector: Box<dyn PoseDetector>) -> Self {
        let detector_name = detector.name();
        Self {
            detector: Arc::new(Mutex::new(detector)),
            detector_name,
            runtime: None,
            sender: None,
            last_timestamp: Mutex::new(None),
            counters: Arc::new(Counters::default()),
            closed: false,
        }
    }

    pub fn stats(&self) -> EngineStats {
        self.counters.snapshot()
    }

    pub fn stats_handle(&self) -> StatsHandle {
        StatsHandle(Arc::clone(&self.counters))
    }

    fn start(
        &mut self,
        options: &EngineOptions,
        listener: CompletionListener,
    ) -> Result<(), EngineError> {
        lock_detector(&self.detector)
            .prepare(options)
            .map_err(EngineError::InitFailed)?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(1)
            .thread_name("pose-inference")
            .enable_all()
            .build()
            .map_err(|e| EngineError::InitFailed(format!("Failed to start runtime: {}", e)))?;

        let (sender, receiver) = mpsc::channel(options.queue_depth);
        runtime.spawn(run_worker(
            receiver,
            Arc::clone(&self.detector),
            listener,
            Arc::clone(&self.counters),
        ));

        self.runtime = Some(runtime);
        self.sender = Some(sender);
        self.closed = false;
        *self
            .last_timestamp
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        Ok(())
    }
}

impl PoseEngine for LiveStreamEngine {
    fn configure(
        &mut self,
        options: &EngineOptions,
        listener: CompletionListener,
    ) -> Result<(), EngineError> {
        options.validate()?;
        if self.is_configured() {
            debug!("Reconfiguring live-stream engine");
            self.close();
        }

        self.start(options, listener)?;
        info!(
            detector = self.detector_name,
            num_poses = options.num_poses,
            min_detection_confidence = options.min_detection_confidence,
            min_presence_confidence = options.min_presence_confidence,
            queue_depth = options.queue_depth,
            "Live-stream engine configured"
        );
        Ok(())
    }

    fn submit(&self, image: PackedImage<'_>, timestamp_ms: i64) -> Result<(), EngineError> {
        let Some(sender) = self.sender.as_ref() else {
            return Err(if self.closed {
                EngineError::Closed
            } else {
                EngineError::NotConfigured
            });
        };
        image.validate()?;

        let mut last = self
            .last_timestamp
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(last_ms) = *last
            && timestamp_ms < last_ms
        {
            return Err(EngineError::TimestampRegression {
                last_ms,
                timestamp_ms,
            });
        }

        // Reserve first so the pixels are only copied when there is room
        match sender.try_reserve() {
            Ok(permit) => {
                permit.send(Job {
                    image: OwnedImage::from(image),
                    timestamp_ms,
                });
                *last = Some(timestamp_ms);
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                let (upright_width, upright_height) = image.upright_size();
                trace!(
                    timestamp_ms,
                    upright_width,
                    upright_height,
                    rotation = %image.rotation,
                    "Frame queued"
                );
                Ok(())
            }
            Err(TrySendError::Full(())) => {
                let dropped = self.counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                trace!(timestamp_ms, dropped, "Detector busy, dropping frame");
                Ok(())
            }
            Err(TrySendError::Closed(())) => Err(EngineError::Closed),
        }
    }

    fn close(&mut self) {
        // Dropping the sender ends the worker loop
        let had_sender = self.sender.take().is_some();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(CLOSE_TIMEOUT);
        }
        if had_sender {
            let stats = self.stats();
            info!(
                submitted = stats.submitted,
                dropped = stats.dropped,
                completed = stats.completed,
                failed = stats.failed,
                "Live-stream engine closed"
            );
        }
        self.closed = true;
    }

    fn is_configured(&self) -> bool {
        self.sender.is_some()
    }
}

impl Drop for LiveStreamEngine {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<Job>,
    detector: SharedDetector,
    listener: CompletionListener,
    counters: Arc<Counters>,
) {
    debug!("Pose inference worker started");

    while let Some(job) = receiver.recv().await {
        let timestamp_ms = job.timestamp_ms;
        let detector = Arc::clone(&detector);
        let joined = tokio::task::spawn_blocking(move || {
            lock_detector(&detector).detect(job.image.as_packed())
        })
        .await;

        let outcome = match joined {
            Ok(Ok(poses)) => {
                counters.completed.fetch_add(1, Ordering::Relaxed);
                Ok(poses)
            }
            Ok(Err(msg)) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                Err(EngineError::Detection(msg))
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, timestamp_ms, "Detector task aborted");
                Err(EngineError::Detection(format!("detector task aborted: {}", e)))
            }
        };

        listener(Completion {
            timestamp_ms,
            outcome,
        });
    }

    debug!("Pose inference worker stopped");
}

fn lock_detector(detector: &SharedDetector) -> std::sync::MutexGuard<'_, Box<dyn PoseDetector>> {
    detector
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
