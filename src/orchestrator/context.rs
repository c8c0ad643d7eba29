//! Run-scoped directory layout.
//!
//! Every run gets its own directory under the artifact root:
//!
//! ```text
//! <artifact_root>/run_20260101_120000_123/
//!     .run.json
//!     frames/frame_00000.png ...
//!     timelapse.gif
//!     report.pdf
//!     result.json
//! ```
//!
//! Directories are created exclusively, so a run never reuses another
//! run's directory even when two runs start within the same millisecond.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio_util::sync::CancellationToken;

/// Attempts at finding a free run directory before giving up
const MAX_ID_ATTEMPTS: usize = 100;

/// State owned by one orchestrator invocation
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Timestamp-derived run identifier
    pub run_id: String,
    /// Root directory for this run
    pub dir: PathBuf,
    /// Directory the capture loop writes frames into
    pub frame_dir: PathBuf,
    /// Where the timelapse is written
    pub timelapse_path: PathBuf,
    /// Where the report is written
    pub report_path: PathBuf,
    /// Tells the capture loop to stop
    pub token: CancellationToken,
}

impl RunContext {
    /// Create a fresh run directory under `artifact_root`
    pub async fn create(artifact_root: &Path) -> io::Result<Self> {
        fs::create_dir_all(artifact_root).await?;

        let base = generate_run_id();
        let (run_id, dir) = claim_run_dir(artifact_root, &base).await?;
        let frame_dir = dir.join("frames");
        fs::create_dir(&frame_dir).await?;

        let metadata = serde_json::json!({
            "id": run_id,
            "created": chrono::Utc::now().to_rfc3339(),
        });
        fs::write(dir.join(".run.json"), serde_json::to_string_pretty(&metadata)?).await?;

        Ok(Self {
            timelapse_path: dir.join("timelapse.gif"),
            report_path: dir.join("report.pdf"),
            frame_dir,
            run_id,
            dir,
            token: CancellationToken::new(),
        })
    }

    /// Path of the JSON summary written after rendering
    pub fn result_path(&self) -> PathBuf {
        self.dir.join("result.json")
    }
}

async fn claim_run_dir(artifact_root: &Path, base: &str) -> io::Result<(String, PathBuf)> {
    for attempt in 0..MAX_ID_ATTEMPTS {
        let id = if attempt == 0 {
            base.to_string()
        } else {
            format!("{}_{}", base, attempt)
        };
        let dir = artifact_root.join(&id);
        match fs::create_dir(&dir).await {
            Ok(()) => return Ok((id, dir)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free run directory for {} under {}", base, artifact_root.display()),
    ))
}

/// Generate a run id from the current time
fn generate_run_id() -> String {
    format!("run_{}", chrono::Utc::now().format("%Y%m%d_%H%M%S_%3f"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_lays_out_run_dir() {
        let root = tempfile::tempdir().unwrap();
        let ctx = RunContext::create(root.path()).await.unwrap();

        assert!(ctx.run_id.starts_with("run_"));
        assert!(ctx.dir.starts_with(root.path()));
        assert!(ctx.frame_dir.is_dir());
        assert!(ctx.dir.join(".run.json").is_file());
        assert!(ctx.timelapse_path.ends_with("timelapse.gif"));
        assert!(ctx.report_path.ends_with("report.pdf"));
        assert!(!ctx.token.is_cancelled());
    }

    #[tokio::test]
    async fn test_run_dirs_are_never_reused() {
        let root = tempfile::tempdir().unwrap();
        let first = RunContext::create(root.path()).await.unwrap();
        let second = RunContext::create(root.path()).await.unwrap();
        assert_ne!(first.dir, second.dir);
    }

    #[tokio::test]
    async fn test_claim_run_dir_appends_suffix() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("run_x")).unwrap();
        let (id, dir) = claim_run_dir(root.path(), "run_x").await.unwrap();
        assert_eq!(id, "run_x_1");
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn test_create_under_a_file_fails() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("not_a_dir");
        std::fs::write(&file, b"x").unwrap();
        assert!(RunContext::create(&file.join("runs")).await.is_err());
    }
}
