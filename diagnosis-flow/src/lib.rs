pub mod agent;
pub mod aggregate;
pub mod config;
pub mod context;
pub mod error;
#[cfg(feature = "rig")]
pub mod llm;
pub mod orchestrator;
pub mod parse;
pub mod predictor;
pub mod role;
pub mod runner;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use agent::DiagnosticAgent;
pub use aggregate::aggregate;
pub use config::OrchestratorConfig;
pub use context::{Conversation, EMPTY_CONVERSATION};
pub use error::{DiagnosisError, Result};
#[cfg(feature = "rig")]
pub use llm::RigPredictor;
pub use orchestrator::{ExecutionResult, ExecutionStatus, Orchestrator};
pub use predictor::{Fields, Predictor, Signature};
pub use role::{AgentRole, instruction_for};
pub use runner::DiagnosisRunner;
pub use storage::{
    DiagnosisSession, InMemorySessionStorage, PendingQuestion, SessionPhase, SessionStorage,
};
pub use types::{
    AgentResponse, FinalOutput, Question, Questions, RankedDisease, ResponseKind, Termination,
    UserInput,
};
