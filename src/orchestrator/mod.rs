pub mod agent;
pub mod classify;
pub mod context;
pub mod run;
pub mod types;

pub use agent::AgentRunner;
pub use classify::{classify, parse_structured};
pub use context::RunContext;
pub use run::RunOrchestrator;
pub use types::{
    NO_RESULT_TEXT, ResponseStatus, RunError, RunResponse, RunResult, Step, StructuredResult,
    TestStatus, artifact_url,
};
