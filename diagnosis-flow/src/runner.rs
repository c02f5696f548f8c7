//! DiagnosisRunner – loads a session, executes exactly **one** orchestrator step, and persists the
//! updated session back to storage.
//!
//! Use it when callers need to observe a session between steps (polling its phase or status
//! message from storage). When nothing needs to watch progress, [`Orchestrator::run`] drives a
//! session to completion in memory.
//!
//! ```rust,ignore
//! let runner = DiagnosisRunner::new(orchestrator, storage);
//! let session_id = runner.start(input).await?;
//! let output = runner.run_to_completion(&session_id).await?;
//! ```

use std::sync::Arc;

use tracing::info;

use crate::{
    error::{DiagnosisError, Result},
    orchestrator::{ExecutionResult, ExecutionStatus, Orchestrator},
    storage::SessionStorage,
    types::{FinalOutput, UserInput},
};

/// Load → execute → save around the orchestrator.
#[derive(Clone)]
pub struct DiagnosisRunner {
    orchestrator: Arc<Orchestrator>,
    storage: Arc<dyn SessionStorage>,
}

impl DiagnosisRunner {
    pub fn new(orchestrator: Arc<Orchestrator>, storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            orchestrator,
            storage,
        }
    }

    /// Create and store a session for `input`, returning its id.
    pub async fn start(&self, input: UserInput) -> Result<String> {
        let session = self.orchestrator.create_session(input)?;
        let session_id = session.id.clone();
        self.storage.save(session).await?;
        Ok(session_id)
    }

    /// Execute **exactly one** step for `session_id` and persist the updated session.
    ///
    /// An aborted session is saved before the error is returned so its
    /// failure reason stays observable.
    pub async fn run(&self, session_id: &str) -> Result<ExecutionResult> {
        let mut session = self
            .storage
            .get(session_id)
            .await?
            .ok_or_else(|| DiagnosisError::SessionNotFound(session_id.to_string()))?;

        let result = self.orchestrator.execute_session(&mut session).await;

        self.storage.save(session).await?;

        result
    }

    /// Step the session until it finishes, then aggregate it.
    pub async fn run_to_completion(&self, session_id: &str) -> Result<FinalOutput> {
        loop {
            let result = self.run(session_id).await?;
            info!(
                session_id = %session_id,
                phase = result.phase.name(),
                calls = result.calls,
                "Runner step finished"
            );
            if result.status == ExecutionStatus::Completed {
                break;
            }
        }
        self.output(session_id).await
    }

    /// Final output of a finished session.
    pub async fn output(&self, session_id: &str) -> Result<FinalOutput> {
        let session = self
            .storage
            .get(session_id)
            .await?
            .ok_or_else(|| DiagnosisError::SessionNotFound(session_id.to_string()))?;
        self.orchestrator.finalize(&session)
    }
}
