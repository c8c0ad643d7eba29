use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::engine::{Agent, AgentError, RawOutcome, Session};

/// Invokes the external agent with a composed task.
///
/// No retries happen here; retry behaviour, if any, is part of the task
/// text the agent receives.
#[derive(Clone)]
pub struct AgentRunner {
    agent: Arc<dyn Agent>,
    timeout: Option<Duration>,
}

impl AgentRunner {
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self {
            agent,
            timeout: None,
        }
    }

    /// Bound the agent's execution time from the orchestrator side
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the agent to completion.
    ///
    /// Agent errors are returned unchanged. A panic inside the agent is
    /// reported as [`AgentError::Panicked`] and an elapsed timeout as
    /// [`AgentError::Timeout`].
    #[instrument(skip_all, fields(session = %session.id(), task_len = task.len()))]
    pub async fn execute(&self, task: &str, session: &dyn Session) -> Result<RawOutcome, AgentError> {
        let run = AssertUnwindSafe(self.agent.run(task, session)).catch_unwind();
        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| AgentError::Timeout(limit))?,
            None => run.await,
        };
        let outcome = outcome.unwrap_or_else(|payload| Err(AgentError::Panicked(panic_message(&*payload))));
        debug!(ok = outcome.is_ok(), "agent finished");
        outcome
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::{AgentScript, MockEngine, ScriptedAgent};
    use crate::engine::AutomationEngine;

    #[tokio::test]
    async fn test_execute_passes_output_through() {
        let session = MockEngine::default().launch_session().await.unwrap();
        let runner = AgentRunner::new(Arc::new(ScriptedAgent::replying("out", Duration::ZERO)));
        let raw = runner.execute("task", session.as_ref()).await.unwrap();
        assert_eq!(raw.as_str(), "out");
    }

    #[tokio::test]
    async fn test_execute_propagates_agent_error() {
        let session = MockEngine::default().launch_session().await.unwrap();
        let runner = AgentRunner::new(Arc::new(ScriptedAgent::failing("bad login", Duration::ZERO)));
        let err = runner.execute("task", session.as_ref()).await.unwrap_err();
        assert_eq!(err.to_string(), "Agent failed: bad login");
    }

    #[tokio::test]
    async fn test_execute_converts_panic() {
        let session = MockEngine::default().launch_session().await.unwrap();
        let agent = ScriptedAgent::new([AgentScript::Panic("kaboom".to_string())]);
        let runner = AgentRunner::new(Arc::new(agent));
        let err = runner.execute("task", session.as_ref()).await.unwrap_err();
        assert!(matches!(err, AgentError::Panicked(msg) if msg == "kaboom"));
    }

    #[tokio::test]
    async fn test_execute_times_out() {
        let session = MockEngine::default().launch_session().await.unwrap();
        let runner = AgentRunner::new(Arc::new(ScriptedAgent::replying("late", Duration::from_secs(5))))
            .with_timeout(Some(Duration::from_millis(20)));
        let err = runner.execute("task", session.as_ref()).await.unwrap_err();
        assert!(matches!(err, AgentError::Timeout(d) if d == Duration::from_millis(20)));
    }
}
