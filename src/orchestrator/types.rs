use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::engine::EngineError;

/// Outcome status reported by the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Success,
    #[default]
    Fail,
    Unknown,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Success => "success",
            TestStatus::Fail => "fail",
            TestStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One action the agent reports having taken
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub action: String,
    pub description: String,
}

/// The agent's self-reported outcome, normalized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredResult {
    /// Steps in the order they were taken
    pub steps: Vec<Step>,

    /// Final summary text
    pub final_text: String,

    /// Overall status
    pub status: TestStatus,
}

/// Final text used when the agent produced nothing parseable
pub const NO_RESULT_TEXT: &str = "No result";

impl StructuredResult {
    /// The deterministic record used for missing or malformed outcomes
    pub fn no_result() -> Self {
        Self {
            steps: Vec::new(),
            final_text: NO_RESULT_TEXT.to_string(),
            status: TestStatus::Fail,
        }
    }
}

impl Default for StructuredResult {
    fn default() -> Self {
        Self::no_result()
    }
}

/// Result of one orchestrated run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Run identifier (also the artifact subdirectory name)
    pub run_id: String,

    /// Final text, or the agent error when the agent failed
    pub text: String,

    /// Test status, `fail` unless the agent reported otherwise
    pub status: TestStatus,

    /// Steps the agent reported
    pub steps: Vec<Step>,

    /// Number of frames captured
    pub frame_count: usize,

    /// Timelapse path, set only if it was written
    pub gif_ref: Option<PathBuf>,

    /// Report path, set only if it was written
    pub pdf_ref: Option<PathBuf>,
}

impl RunResult {
    /// Build the payload exposed to the HTTP layer.
    ///
    /// Artifact paths under `artifact_root` become URLs under `public_prefix`.
    pub fn to_response(&self, artifact_root: &Path, public_prefix: &str) -> RunResponse {
        RunResponse {
            status: ResponseStatus::Success,
            result: self.text.clone(),
            test_status: self.status,
            gif_url: self
                .gif_ref
                .as_deref()
                .map(|p| artifact_url(p, artifact_root, public_prefix)),
            pdf_url: self
                .pdf_ref
                .as_deref()
                .map(|p| artifact_url(p, artifact_root, public_prefix)),
        }
    }
}

/// Whether the request itself was served
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// JSON payload for a single run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResponse {
    pub status: ResponseStatus,
    pub result: String,
    pub test_status: TestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gif_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
}

impl RunResponse {
    /// Payload for a run that could not be carried out
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            result: message.into(),
            test_status: TestStatus::Fail,
            gif_url: None,
            pdf_url: None,
        }
    }
}

/// Errors that terminate a run before it reaches `Done`
#[derive(Debug, Error)]
pub enum RunError {
    /// The run directory could not be prepared
    #[error("Failed to prepare run directory: {0}")]
    Setup(#[from] std::io::Error),

    /// The automation session could not be acquired
    #[error("Failed to launch automation session: {0}")]
    Launch(#[source] EngineError),

    /// The supervising task died
    #[error("Run supervisor failed: {0}")]
    Aborted(String),
}

/// Map an artifact path to its public URL
pub fn artifact_url(path: &Path, artifact_root: &Path, public_prefix: &str) -> String {
    let relative = path.strip_prefix(artifact_root).unwrap_or(path);
    let relative: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .filter(|c| c != "/")
        .collect();
    format!("{}/{}", public_prefix.trim_end_matches('/'), relative.join("/"))
}
