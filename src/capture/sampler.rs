//! Background sampler that snapshots a session's surface at a fixed cadence.

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, trace, warn};

use super::frames::{FrameStore, frame_path};
use crate::engine::Session;

/// Samples a visual surface into a [`FrameStore`] until cancelled
pub struct CaptureLoop {
    surface: Arc<dyn Session>,
    frame_dir: PathBuf,
    token: CancellationToken,
    interval: Duration,
}

impl CaptureLoop {
    pub fn new(
        surface: Arc<dyn Session>,
        frame_dir: impl Into<PathBuf>,
        token: CancellationToken,
        interval: Duration,
    ) -> Self {
        Self {
            surface,
            frame_dir: frame_dir.into(),
            token,
            interval,
        }
    }

    /// Start sampling on a background task.
    ///
    /// Dropping the returned handle cancels the loop without waiting for it.
    pub fn spawn(self) -> CaptureHandle {
        let guard = self.token.clone().drop_guard();
        let task = tokio::spawn(self.run());
        CaptureHandle { guard, task }
    }

    async fn run(self) -> FrameStore {
        let mut store = FrameStore::new();
        debug!(
            session = %self.surface.id(),
            interval_ms = self.interval.as_millis() as u64,
            "capture loop started"
        );

        while !self.token.is_cancelled() {
            let path = frame_path(&self.frame_dir, store.next_index());
            match self.surface.capture_frame(&path).await {
                Ok(()) => {
                    let frame = store.append(path, Utc::now());
                    trace!(index = frame.index, "frame captured");
                }
                Err(e) => {
                    warn!(index = store.next_index(), error = %e, "frame capture failed");
                    store.skip();
                }
            }

            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        debug!(frames = store.len(), "capture loop stopped");
        store
    }
}

/// Handle to a running [`CaptureLoop`]
pub struct CaptureHandle {
    guard: DropGuard,
    task: JoinHandle<FrameStore>,
}

impl CaptureHandle {
    /// Signal the loop to stop and wait for it to terminate.
    ///
    /// The returned store is final: nothing appends to it afterwards.
    pub async fn stop(self) -> FrameStore {
        let token = self.guard.disarm();
        token.cancel();
        debug!("capture stop signalled");
        match self.task.await {
            Ok(store) => store,
            Err(e) => {
                error!(error = %e, "capture loop terminated abnormally");
                FrameStore::new()
            }
        }
    }
}
