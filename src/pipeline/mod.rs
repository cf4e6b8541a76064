pub mod orchestrator;
pub mod state;

pub use orchestrator::{ExecutionReport, OrchestratorOptions, RunOrchestrator};
pub use state::RunRegistry;
