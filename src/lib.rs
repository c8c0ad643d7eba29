//! Browser Vision - visually recorded browser-automation test runs.
//!
//! This crate provides:
//! - A run orchestrator that drives an external agent against an automation
//!   session while a capture loop samples the session's visual surface
//! - Timelapse GIF and PDF report rendering for finished runs
//! - Lenient classification of agent output into a structured outcome
//! - Sequential batch execution of stored test cases with aggregate stats
//! - A mock engine and scripted agent for testing
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use browser_vision::config::RunSettings;
//! use browser_vision::engine::{MockEngine, ScriptedAgent};
//! use browser_vision::orchestrator::RunOrchestrator;
//!
//! # async fn demo() -> Result<(), browser_vision::orchestrator::RunError> {
//! let agent = ScriptedAgent::replying(
//!     r#"{"steps":[],"final_text":"ok","status":"success"}"#,
//!     Duration::from_secs(2),
//! );
//! let orchestrator = RunOrchestrator::new(
//!     Arc::new(MockEngine::default()),
//!     Arc::new(agent),
//!     RunSettings::defaults().artifact_dir("/tmp/runs"),
//! );
//! let result = orchestrator.run("Open the dashboard").await?;
//! println!("{} ({} frames)", result.status, result.frame_count);
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
pub mod batch;
pub mod capture;
pub mod config;
pub mod engine;
pub mod logging;
pub mod orchestrator;

// Re-export orchestration types
pub use orchestrator::{
    AgentRunner, RunError, RunOrchestrator, RunResponse, RunResult, StructuredResult, TestStatus,
    classify,
};

// Re-export batch types
pub use batch::{
    BatchCoordinator, BatchItemResult, BatchResponse, BatchResult, Datastore, JsonDatastore,
};

// Re-export engine capabilities
pub use engine::{Agent, AgentError, AutomationEngine, EngineError, RawOutcome, Session};

// Re-export capture types
pub use capture::{CaptureLoop, Frame, FrameStore};

// Re-export artifact rendering
pub use artifacts::{ArtifactPipeline, RenderedArtifacts, ReportDocument, render_timelapse};
