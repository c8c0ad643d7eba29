//! Artifact rendering for finished runs.
//!
//! Turns the final frame store into a timelapse GIF and the classified
//! outcome into a PDF report. Both writers are best-effort: a failure is
//! logged and the corresponding reference is left unset.

pub mod canvas;
pub mod pdf;
pub mod report;
pub mod timelapse;

pub use canvas::Canvas;
pub use report::{ReportDocument, write_report};
pub use timelapse::{FRAME_DELAY_MS, MIN_TIMELAPSE_FRAMES, TimelapseInfo, render_timelapse};

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::capture::FrameStore;

/// Result type for artifact rendering
pub type ArtifactResult<T> = Result<T, ArtifactError>;

/// Error types for artifact rendering
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Image decoding or encoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The rendering task died
    #[error("Render task failed: {0}")]
    Task(String),
}

/// References to artifacts that were written successfully
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedArtifacts {
    pub gif_ref: Option<PathBuf>,
    pub pdf_ref: Option<PathBuf>,
}

/// Renders the timelapse and report of one run
#[derive(Debug, Clone)]
pub struct ArtifactPipeline {
    timelapse_path: PathBuf,
    report_path: PathBuf,
}

impl ArtifactPipeline {
    pub fn new(timelapse_path: impl Into<PathBuf>, report_path: impl Into<PathBuf>) -> Self {
        Self {
            timelapse_path: timelapse_path.into(),
            report_path: report_path.into(),
        }
    }

    /// Render both artifacts on blocking threads. Never fails.
    pub async fn render(&self, frames: &FrameStore, report: ReportDocument) -> RenderedArtifacts {
        let gif_ref = self.render_timelapse(frames).await;
        let pdf_ref = self.render_report(report).await;
        RenderedArtifacts { gif_ref, pdf_ref }
    }

    async fn render_timelapse(&self, frames: &FrameStore) -> Option<PathBuf> {
        let paths: Vec<PathBuf> = frames.image_paths().into_iter().map(Path::to_path_buf).collect();
        let output = self.timelapse_path.clone();
        let task = tokio::task::spawn_blocking(move || render_timelapse(&paths, &output));

        match flatten(task.await) {
            Ok(Some(info)) => {
                info!(
                    path = %self.timelapse_path.display(),
                    frames = info.frames,
                    width = info.width,
                    height = info.height,
                    "timelapse written"
                );
                Some(self.timelapse_path.clone())
            }
            Ok(None) => {
                info!(captured = frames.len(), "not enough frames for a timelapse");
                None
            }
            Err(e) => {
                warn!(error = %e, "timelapse rendering failed");
                None
            }
        }
    }

    async fn render_report(&self, report: ReportDocument) -> Option<PathBuf> {
        let output = self.report_path.clone();
        let task = tokio::task::spawn_blocking(move || write_report(&report, &output));

        match flatten(task.await) {
            Ok(()) => {
                info!(path = %self.report_path.display(), "report written");
                Some(self.report_path.clone())
            }
            Err(e) => {
                warn!(error = %e, "report rendering failed");
                None
            }
        }
    }
}

fn flatten<T>(joined: Result<ArtifactResult<T>, tokio::task::JoinError>) -> ArtifactResult<T> {
    joined.map_err(|e| ArtifactError::Task(e.to_string()))?
}
