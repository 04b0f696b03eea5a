pub mod conversation;
pub mod loop_;
pub mod orchestrator;

pub use conversation::{Checkpoint, DEFAULT_SYSTEM_PROMPT, Transcript};
pub use loop_::{AgentOptions, run};
pub use orchestrator::{DEFAULT_MAX_TOOL_ROUNDS, Orchestrator, TurnOutcome, TurnState};
