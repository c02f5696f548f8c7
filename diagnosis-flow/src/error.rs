use std::time::Duration;

use thiserror::Error;

use crate::role::AgentRole;

pub type Result<T> = std::result::Result<T, DiagnosisError>;

#[derive(Debug, Error)]
pub enum DiagnosisError {
    #[error("Unknown agent role: {0}")]
    UnknownRole(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Prediction failed for {role}: {reason}")]
    PredictionFailed { role: AgentRole, reason: String },

    #[error("Prediction for {role} timed out after {after:?}")]
    PredictionTimeout { role: AgentRole, after: Duration },

    #[error("Malformed {field} from {role}: {reason}")]
    MalformedOutput {
        role: AgentRole,
        field: &'static str,
        reason: String,
    },

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session already finished: {0}")]
    SessionFinished(String),

    #[error("Session {session_id} was aborted: {reason}")]
    SessionAborted { session_id: String, reason: String },

    #[error("Session still in progress: {0}")]
    SessionInProgress(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Diagnosis unavailable for session {session_id}: {source}")]
    DiagnosisUnavailable {
        session_id: String,
        #[source]
        source: Box<DiagnosisError>,
    },
}

impl DiagnosisError {
    pub(crate) fn malformed(role: AgentRole, field: &'static str, reason: impl Into<String>) -> Self {
        DiagnosisError::MalformedOutput {
            role,
            field,
            reason: reason.into(),
        }
    }
}
