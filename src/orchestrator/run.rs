//! Single-run supervision.
//!
//! ```text
//! Idle -> Launching -> Running (capture || agent) -> Stopping -> Rendering -> Done
//!             |
//!             +-> Failed
//! ```
//!
//! Stopping always runs once the session exists, whatever the agent did:
//! the capture token is cancelled, the capture loop is awaited, and only
//! then is the session closed. Rendering errors never fail a run.
//!
//! The run is supervised on its own task. A caller that drops the `run`
//! future cancels the agent but still gets a full teardown.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, error, info, instrument, warn};

use super::agent::AgentRunner;
use super::classify::classify;
use super::context::RunContext;
use super::types::{RunError, RunResult};
use crate::artifacts::{ArtifactPipeline, ReportDocument};
use crate::capture::CaptureLoop;
use crate::config::RunSettings;
use crate::engine::{Agent, AgentError, AutomationEngine, Session};

/// Supervises one run end-to-end
#[derive(Clone)]
pub struct RunOrchestrator {
    engine: Arc<dyn AutomationEngine>,
    runner: AgentRunner,
    settings: RunSettings,
}

impl RunOrchestrator {
    pub fn new(engine: Arc<dyn AutomationEngine>, agent: Arc<dyn Agent>, settings: RunSettings) -> Self {
        let runner = AgentRunner::new(agent).with_timeout(settings.agent_timeout);
        Self {
            engine,
            runner,
            settings,
        }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Execute `task` and return the run's result.
    ///
    /// Only launch, setup and supervisor failures are returned as errors;
    /// every run that gets a session ends with a `RunResult`.
    #[instrument(skip_all, fields(run_id = tracing::field::Empty))]
    pub async fn run(&self, task: &str) -> Result<RunResult, RunError> {
        let abandoned = CancellationToken::new();
        let guard = abandoned.clone().drop_guard();

        let supervisor = self.clone();
        let task = task.to_owned();
        let handle = tokio::spawn(
            async move { supervisor.supervise(&task, abandoned).await }.in_current_span(),
        );

        let joined = handle.await;
        guard.disarm();
        joined.map_err(|e| {
            error!(error = %e, "run supervisor terminated abnormally");
            RunError::Aborted(e.to_string())
        })?
    }

    async fn supervise(&self, task: &str, abandoned: CancellationToken) -> Result<RunResult, RunError> {
        // Launching
        info!("launching automation session");
        let session = self.engine.launch_session().await.map_err(|e| {
            error!(error = %e, "launch failed");
            RunError::Launch(e)
        })?;
        let ctx = match RunContext::create(&self.settings.artifact_dir).await {
            Ok(ctx) => ctx,
            Err(e) => {
                error!(error = %e, "failed to prepare run directory");
                close_session(session.as_ref()).await;
                return Err(RunError::Setup(e));
            }
        };
        Span::current().record("run_id", ctx.run_id.as_str());

        // Running
        info!(session = %session.id(), dir = %ctx.dir.display(), "capture and agent running");
        let capture = CaptureLoop::new(
            Arc::clone(&session),
            &ctx.frame_dir,
            ctx.token.clone(),
            self.settings.capture_interval,
        )
        .spawn();
        let outcome = tokio::select! {
            biased;
            _ = abandoned.cancelled() => {
                warn!("caller dropped the run, tearing down");
                Err(AgentError::Cancelled)
            }
            outcome = self.runner.execute(task, session.as_ref()) => outcome,
        };

        // Stopping
        let frames = capture.stop().await;
        close_session(session.as_ref()).await;
        info!(frames = frames.len(), agent_ok = outcome.is_ok(), "session stopped");

        // Rendering
        let (structured, text) = match &outcome {
            Ok(raw) => {
                let structured = classify(Some(raw));
                let text = structured.final_text.clone();
                (structured, text)
            }
            Err(e) => {
                warn!(error = %e, "agent failed");
                (classify(None), e.to_string())
            }
        };
        let report = ReportDocument::new(&ctx.run_id, &structured, &text);
        let artifacts = ArtifactPipeline::new(&ctx.timelapse_path, &ctx.report_path)
            .render(&frames, report)
            .await;

        // Done
        let result = RunResult {
            run_id: ctx.run_id.clone(),
            text,
            status: structured.status,
            steps: structured.steps,
            frame_count: frames.len(),
            gif_ref: artifacts.gif_ref,
            pdf_ref: artifacts.pdf_ref,
        };
        write_summary(&ctx, &result).await;
        info!(status = %result.status, "run complete");
        Ok(result)
    }
}

async fn close_session(session: &dyn Session) {
    if let Err(e) = session.close().await {
        warn!(error = %e, "session did not close cleanly");
    }
}

async fn write_summary(ctx: &RunContext, result: &RunResult) {
    let written = match serde_json::to_vec_pretty(result) {
        Ok(json) => tokio::fs::write(ctx.result_path(), json).await.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    if let Err(e) = written {
        warn!(error = %e, "failed to write run summary");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::{MockEngine, ScriptedAgent};
    use crate::orchestrator::TestStatus;
    use std::time::Duration;

    fn settings(root: &std::path::Path) -> RunSettings {
        RunSettings::defaults()
            .artifact_dir(root)
            .capture_interval(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_launch_failure_is_terminal() {
        let root = tempfile::tempdir().unwrap();
        let agent = Arc::new(ScriptedAgent::replying("{}", Duration::ZERO));
        let orchestrator = RunOrchestrator::new(
            Arc::new(MockEngine::failing_launch("no display")),
            agent.clone(),
            settings(root.path()),
        );

        let err = orchestrator.run("task").await.unwrap_err();
        assert!(matches!(err, RunError::Launch(_)));
        assert!(agent.tasks().is_empty());
        assert!(std::fs::read_dir(root.path()).unwrap().next().is_none(), "orphan run dir");
    }

    #[tokio::test]
    async fn test_setup_failure_closes_session() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("blocker");
        std::fs::write(&blocker, b"file").unwrap();
        let engine = Arc::new(MockEngine::default());
        let agent = Arc::new(ScriptedAgent::replying("{}", Duration::ZERO));
        let orchestrator = RunOrchestrator::new(
            engine.clone(),
            agent.clone(),
            settings(&blocker.join("runs")),
        );

        let err = orchestrator.run("task").await.unwrap_err();
        assert!(matches!(err, RunError::Setup(_)));
        assert!(agent.tasks().is_empty());
        assert_eq!(engine.sessions()[0].close_count(), 1);
    }

    #[tokio::test]
    async fn test_summary_written_next_to_artifacts() {
        let root = tempfile::tempdir().unwrap();
        let output = r#"{"steps":[],"final_text":"ok","status":"success"}"#;
        let orchestrator = RunOrchestrator::new(
            Arc::new(MockEngine::default()),
            Arc::new(ScriptedAgent::replying(output, Duration::from_millis(50))),
            settings(root.path()),
        );

        let result = orchestrator.run("task").await.unwrap();
        assert_eq!(result.status, TestStatus::Success);

        let summary = root.path().join(&result.run_id).join("result.json");
        let saved: RunResult = serde_json::from_slice(&std::fs::read(summary).unwrap()).unwrap();
        assert_eq!(saved, result);
    }
}
