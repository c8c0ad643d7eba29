// Capability interfaces over the external automation engine

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Error types for session lifecycle and capture
#[derive(Debug, Error)]
pub enum EngineError {
    /// The automation session could not be acquired
    #[error("Launch error: {0}")]
    Launch(String),

    /// A single frame capture failed
    #[error("Capture error: {0}")]
    Capture(String),

    /// The session could not be released cleanly
    #[error("Close error: {0}")]
    Close(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Errors surfaced by an agent invocation
#[derive(Debug, Error)]
pub enum AgentError {
    /// The agent reported a failure
    #[error("Agent failed: {0}")]
    Failed(String),

    /// The agent process exited unsuccessfully
    #[error("Agent exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },

    /// The orchestrator-side timeout elapsed
    #[error("Agent timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),

    /// The agent future panicked
    #[error("Agent panicked: {0}")]
    Panicked(String),

    /// The caller gave up on the run while the agent was working
    #[error("Run cancelled before the agent finished")]
    Cancelled,

    /// I/O error talking to the agent
    #[error("Agent I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Unparsed output of one agent execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOutcome {
    /// Everything the agent reported, typically JSON possibly surrounded by log lines
    pub output: String,
}

impl RawOutcome {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.output
    }
}

/// A live automation session whose visual surface can be sampled.
///
/// A session is shared between the capture loop and the agent for the
/// duration of one run, so every method takes `&self`.
#[async_trait]
pub trait Session: Send + Sync {
    /// Identifier used in logs and passed to the agent
    fn id(&self) -> &str;

    /// Write one snapshot of the visual surface as a PNG at `path`
    async fn capture_frame(&self, path: &Path) -> EngineResult<()>;

    /// Release the session. Called exactly once per run.
    async fn close(&self) -> EngineResult<()>;
}

/// Source of automation sessions
#[async_trait]
pub trait AutomationEngine: Send + Sync {
    /// Acquire a fresh session
    async fn launch_session(&self) -> EngineResult<Arc<dyn Session>>;
}

/// The external automation agent, treated as an opaque long-running task
#[async_trait]
pub trait Agent: Send + Sync {
    /// Execute a natural-language task against the session
    async fn run(&self, task: &str, session: &dyn Session) -> Result<RawOutcome, AgentError>;
}
