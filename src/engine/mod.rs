pub mod command;
pub mod mock;
pub mod types;

pub use command::{CommandAgent, CommandEngine, CommandSession};
pub use mock::{AgentScript, MockEngine, MockEngineConfig, MockSession, ScriptedAgent, SessionEvent};
pub use types::{Agent, AgentError, AutomationEngine, EngineError, EngineResult, RawOutcome, Session};
