//! Process-backed automation engine.
//!
//! The browser, the screenshot tool and the agent are all external
//! programs:
//! - `CommandEngine` optionally spawns a browser launcher that lives as
//!   long as the session, and captures frames with a screenshot command
//!   whose `{path}` argument is replaced by the frame path
//! - `CommandAgent` spawns the agent, writes the task to its stdin and
//!   returns its stdout as the raw outcome

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::types::{
    Agent, AgentError, AutomationEngine, EngineError, EngineResult, RawOutcome, Session,
};
use crate::config::CommandSettings;

/// Placeholder replaced with the frame path in screenshot arguments
pub const PATH_PLACEHOLDER: &str = "{path}";

/// Environment variable carrying the session id into the agent process
pub const SESSION_ID_ENV: &str = "BROWSER_VISION_SESSION_ID";

/// Bytes of stderr kept in error messages
const STDERR_TAIL_BYTES: usize = 2000;

/// Engine that launches sessions as external processes
#[derive(Debug, Clone)]
pub struct CommandEngine {
    /// Browser launcher, kept alive until the session closes
    pub browser: Option<Vec<String>>,
    /// Screenshot program and arguments
    pub screenshot: Vec<String>,
}

impl CommandEngine {
    pub fn new(screenshot: Vec<String>) -> Self {
        Self {
            browser: None,
            screenshot,
        }
    }

    /// Build from configured command lines
    pub fn from_settings(settings: &CommandSettings) -> Self {
        Self {
            browser: settings.browser.clone(),
            screenshot: settings.screenshot.clone(),
        }
    }
}

#[async_trait]
impl AutomationEngine for CommandEngine {
    async fn launch_session(&self) -> EngineResult<Arc<dyn Session>> {
        if self.screenshot.is_empty() {
            return Err(EngineError::Launch("screenshot command is empty".to_string()));
        }

        let browser = match &self.browser {
            Some(argv) => {
                let (program, args) = argv
                    .split_first()
                    .ok_or_else(|| EngineError::Launch("browser command is empty".to_string()))?;
                let child = Command::new(program)
                    .args(args)
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .kill_on_drop(true)
                    .spawn()
                    .map_err(|e| EngineError::Launch(format!("Failed to spawn '{}': {}", program, e)))?;
                info!(program = %program, pid = ?child.id(), "browser launched");
                Some(child)
            }
            None => None,
        };

        let id = match browser.as_ref().and_then(Child::id) {
            Some(pid) => format!("browser-{}", pid),
            None => format!("session-{}", chrono::Utc::now().format("%Y%m%d_%H%M%S_%3f")),
        };

        Ok(Arc::new(CommandSession {
            id,
            screenshot: self.screenshot.clone(),
            browser: Mutex::new(browser),
        }))
    }
}

/// A session whose surface is sampled by running a screenshot command
#[derive(Debug)]
pub struct CommandSession {
    id: String,
    screenshot: Vec<String>,
    browser: Mutex<Option<Child>>,
}

#[async_trait]
impl Session for CommandSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn capture_frame(&self, path: &Path) -> EngineResult<()> {
        let argv = substitute_path(&self.screenshot, path);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| EngineError::Capture("screenshot command is empty".to_string()))?;

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| EngineError::Capture(format!("Failed to run '{}': {}", program, e)))?;

        if !output.status.success() {
            return Err(EngineError::Capture(format!(
                "'{}' exited with {}: {}",
                program,
                output.status,
                stderr_tail(&output.stderr)
            )));
        }
        if !path.exists() {
            return Err(EngineError::Capture(format!(
                "'{}' did not write {}",
                program,
                path.display()
            )));
        }
        Ok(())
    }

    async fn close(&self) -> EngineResult<()> {
        let Some(mut child) = self.browser.lock().await.take() else {
            return Ok(());
        };
        if let Ok(Some(status)) = child.try_wait() {
            debug!(session = %self.id, %status, "browser already exited");
            return Ok(());
        }
        child
            .start_kill()
            .map_err(|e| EngineError::Close(format!("Failed to stop browser: {}", e)))?;
        let status = child
            .wait()
            .await
            .map_err(|e| EngineError::Close(format!("Failed to reap browser: {}", e)))?;
        debug!(session = %self.id, %status, "browser stopped");
        Ok(())
    }
}

/// Agent implemented by an external program
#[derive(Debug, Clone)]
pub struct CommandAgent {
    argv: Vec<String>,
}

impl CommandAgent {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

#[async_trait]
impl Agent for CommandAgent {
    async fn run(&self, task: &str, session: &dyn Session) -> Result<RawOutcome, AgentError> {
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| AgentError::Failed("agent command is empty".to_string()))?;

        let mut child = Command::new(program)
            .args(args)
            .env(SESSION_ID_ENV, session.id())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        debug!(program = %program, pid = ?child.id(), "agent started");

        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(task.as_bytes()).await?;
                stdin.shutdown().await?;
            }
            Ok::<_, std::io::Error>(())
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output?;
        if let Err(e) = fed {
            // The agent may legitimately stop reading early
            warn!(error = %e, "failed to deliver full task to agent");
        }

        if !output.status.success() {
            return Err(AgentError::Exit {
                status: output.status.to_string(),
                stderr: stderr_tail(&output.stderr),
            });
        }
        Ok(RawOutcome::new(String::from_utf8_lossy(&output.stdout)))
    }
}

fn substitute_path(template: &[String], path: &Path) -> Vec<String> {
    let path = path.to_string_lossy();
    template
        .iter()
        .map(|arg| arg.replace(PATH_PLACEHOLDER, &path))
        .collect()
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_TAIL_BYTES {
        return text.to_string();
    }
    let mut start = text.len() - STDERR_TAIL_BYTES;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}
