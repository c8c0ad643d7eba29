//! Synthetic automation engine for testing and demos.
//!
//! `MockEngine` hands out `MockSession`s whose visual surface is a
//! [`Canvas`] showing the frame counter, and `ScriptedAgent` replays
//! predetermined outcomes. Sessions keep a timestamped event log so
//! teardown ordering can be checked after a run.

use async_trait::async_trait;
use rand::Rng;
use std::collections::VecDeque;
use std::ops::Range;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::types::{
    Agent, AgentError, AutomationEngine, EngineError, EngineResult, RawOutcome, Session,
};
use crate::artifacts::Canvas;

/// Lifecycle events recorded by a [`MockSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    CaptureStarted,
    CaptureFinished,
    Closed,
}

/// Configuration shared by every session a [`MockEngine`] launches
#[derive(Debug, Clone)]
pub struct MockEngineConfig {
    /// Surface width in pixels
    pub width: u32,
    /// Surface height in pixels
    pub height: u32,
    /// Per-capture latency range in milliseconds (uniformly jittered)
    pub capture_latency_ms: Range<u64>,
    /// Every n-th capture (1-based) fails when set
    pub fail_every_nth_capture: Option<usize>,
    /// Launch fails with this message when set
    pub launch_failure: Option<String>,
}

impl Default for MockEngineConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 200,
            capture_latency_ms: 0..1,
            fail_every_nth_capture: None,
            launch_failure: None,
        }
    }
}

/// Engine producing synthetic sessions
#[derive(Debug, Default)]
pub struct MockEngine {
    config: MockEngineConfig,
    sessions: Mutex<Vec<Arc<MockSession>>>,
}

impl MockEngine {
    pub fn new(config: MockEngineConfig) -> Self {
        Self {
            config,
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// Engine whose launches always fail
    pub fn failing_launch(message: impl Into<String>) -> Self {
        Self::new(MockEngineConfig {
            launch_failure: Some(message.into()),
            ..Default::default()
        })
    }

    /// All sessions launched so far, oldest first
    pub fn sessions(&self) -> Vec<Arc<MockSession>> {
        lock(&self.sessions).clone()
    }
}

#[async_trait]
impl AutomationEngine for MockEngine {
    async fn launch_session(&self) -> EngineResult<Arc<dyn Session>> {
        if let Some(message) = &self.config.launch_failure {
            return Err(EngineError::Launch(message.clone()));
        }
        let mut sessions = lock(&self.sessions);
        let session = Arc::new(MockSession::new(
            format!("mock-{}", sessions.len()),
            self.config.clone(),
        ));
        sessions.push(Arc::clone(&session));
        Ok(session)
    }
}

/// A synthetic session rendering its capture counter onto a canvas
#[derive(Debug)]
pub struct MockSession {
    id: String,
    config: MockEngineConfig,
    captures: AtomicUsize,
    closed: AtomicBool,
    events: Mutex<Vec<(SessionEvent, Instant)>>,
}

impl MockSession {
    fn new(id: String, config: MockEngineConfig) -> Self {
        Self {
            id,
            config,
            captures: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Timestamped lifecycle events in the order they happened
    pub fn events(&self) -> Vec<(SessionEvent, Instant)> {
        lock(&self.events).clone()
    }

    /// Number of capture attempts, including failed ones
    pub fn capture_attempts(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }

    /// Number of times `close` was called
    pub fn close_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|(event, _)| *event == SessionEvent::Closed)
            .count()
    }

    fn record(&self, event: SessionEvent) {
        lock(&self.events).push((event, Instant::now()));
    }

    fn render(&self, frame: usize) -> Canvas {
        let shade = (frame * 37 % 200) as u8;
        let mut canvas = Canvas::with_color(self.config.width, self.config.height, [32, 32, 48]);
        canvas.draw_rect(0, 0, self.config.width, 16, [shade, 96, 160]);
        canvas.draw_text(4, 4, &self.id, [255, 255, 255], [shade, 96, 160]);
        canvas.draw_text(4, 24, &format!("frame {}", frame), [255, 255, 255], [32, 32, 48]);
        canvas
    }
}

#[async_trait]
impl Session for MockSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn capture_frame(&self, path: &Path) -> EngineResult<()> {
        self.record(SessionEvent::CaptureStarted);
        let attempt = self.captures.fetch_add(1, Ordering::SeqCst) + 1;

        let latency = &self.config.capture_latency_ms;
        let millis = if latency.is_empty() {
            latency.start
        } else {
            rand::thread_rng().gen_range(latency.clone())
        };
        if millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }

        let result = if self.closed.load(Ordering::SeqCst) {
            Err(EngineError::Capture(format!("session {} is closed", self.id)))
        } else if self
            .config
            .fail_every_nth_capture
            .is_some_and(|n| n > 0 && attempt % n == 0)
        {
            Err(EngineError::Capture(format!("simulated failure on capture {}", attempt)))
        } else {
            let png = self.render(attempt).to_png()?;
            tokio::fs::write(path, png).await.map_err(EngineError::from)
        };

        self.record(SessionEvent::CaptureFinished);
        result
    }

    async fn close(&self) -> EngineResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.record(SessionEvent::Closed);
        Ok(())
    }
}

/// One scripted agent reply
#[derive(Debug, Clone)]
pub enum AgentScript {
    /// Return this output after the delay
    Reply { output: String, delay: Duration },
    /// Fail with this message after the delay
    Fail { message: String, delay: Duration },
    /// Panic inside the agent future
    Panic(String),
}

/// Agent replaying scripted replies, one per invocation
#[derive(Debug, Default)]
pub struct ScriptedAgent {
    script: Mutex<VecDeque<AgentScript>>,
    tasks: Mutex<Vec<String>>,
}

impl ScriptedAgent {
    pub fn new(script: impl IntoIterator<Item = AgentScript>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Agent that replies once with `output` after `delay`
    pub fn replying(output: impl Into<String>, delay: Duration) -> Self {
        Self::new([AgentScript::Reply {
            output: output.into(),
            delay,
        }])
    }

    /// Agent that fails once with `message` after `delay`
    pub fn failing(message: impl Into<String>, delay: Duration) -> Self {
        Self::new([AgentScript::Fail {
            message: message.into(),
            delay,
        }])
    }

    /// Tasks received so far, in call order
    pub fn tasks(&self) -> Vec<String> {
        lock(&self.tasks).clone()
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    async fn run(&self, task: &str, _session: &dyn Session) -> Result<RawOutcome, AgentError> {
        lock(&self.tasks).push(task.to_string());
        // An exhausted script behaves like an agent that printed nothing
        let next = lock(&self.script).pop_front();
        match next {
            None => Ok(RawOutcome::default()),
            Some(AgentScript::Reply { output, delay }) => {
                tokio::time::sleep(delay).await;
                Ok(RawOutcome::new(output))
            }
            Some(AgentScript::Fail { message, delay }) => {
                tokio::time::sleep(delay).await;
                Err(AgentError::Failed(message))
            }
            Some(AgentScript::Panic(message)) => panic!("{}", message),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
