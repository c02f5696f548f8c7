use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::context::Conversation;
use crate::error::Result;
use crate::role::AgentRole;
use crate::types::{AgentResponse, Termination, UserInput};

/// Where a session stands in the round protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SessionPhase {
    /// Handler contextualizes the case before the first round.
    Intake,
    AwaitingInitialResponses,
    RoutingQuestions,
    Converged,
    IterationCapReached,
    Aborted { reason: String },
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionPhase::Converged | SessionPhase::IterationCapReached | SessionPhase::Aborted { .. }
        )
    }

    pub fn termination(&self) -> Option<Termination> {
        match self {
            SessionPhase::Converged => Some(Termination::Converged),
            SessionPhase::IterationCapReached => Some(Termination::IterationCapReached),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionPhase::Intake => "intake",
            SessionPhase::AwaitingInitialResponses => "awaiting_initial_responses",
            SessionPhase::RoutingQuestions => "routing_questions",
            SessionPhase::Converged => "converged",
            SessionPhase::IterationCapReached => "iteration_cap_reached",
            SessionPhase::Aborted { .. } => "aborted",
        }
    }
}

/// A question raised during the initial responses that has not been answered yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingQuestion {
    pub from: AgentRole,
    pub to: AgentRole,
    pub text: String,
}

impl PendingQuestion {
    /// Question text as handed to the addressee, labelled with its asker.
    pub fn labelled(&self) -> String {
        format!("From {}: {}", self.from, self.text)
    }
}

/// State of one diagnostic session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisSession {
    pub id: String,
    pub input: UserInput,
    pub phase: SessionPhase,
    /// Current round, 1-based; 0 before the first round starts.
    pub round: usize,
    pub conversation: Conversation,
    /// Every agent response in call order.
    pub responses: Vec<AgentResponse>,
    /// Unanswered questions, oldest first.
    pub pending: Vec<PendingQuestion>,
    /// Prediction calls issued so far.
    pub calls: usize,
    pub status_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DiagnosisSession {
    /// A fresh session waiting for its first round. The patient profile, if
    /// any, opens the conversation.
    pub fn new(input: UserInput) -> Result<Self> {
        input.validate()?;

        let mut conversation = Conversation::new();
        if let Some(profile) = input.profile() {
            conversation.append(profile);
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            input,
            phase: SessionPhase::AwaitingInitialResponses,
            round: 0,
            conversation,
            responses: Vec::new(),
            pending: Vec::new(),
            calls: 0,
            status_message: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }
}

/// Trait for storing and retrieving sessions
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn save(&self, session: DiagnosisSession) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<DiagnosisSession>>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// In-memory implementation of SessionStorage
pub struct InMemorySessionStorage {
    sessions: Arc<DashMap<String, DiagnosisSession>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemorySessionStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn save(&self, session: DiagnosisSession) -> Result<()> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<DiagnosisSession>> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_seeds_profile_into_conversation() {
        let session = DiagnosisSession::new(UserInput::new(["ataxia"]).with_age(9)).unwrap();
        assert_eq!(session.phase, SessionPhase::AwaitingInitialResponses);
        assert_eq!(session.round, 0);
        assert_eq!(session.conversation.entries(), ["Patient profile: age 9"]);
    }

    #[test]
    fn new_session_rejects_invalid_input() {
        assert!(DiagnosisSession::new(UserInput::new(Vec::<String>::new())).is_err());
    }

    #[test]
    fn terminal_phases() {
        assert!(SessionPhase::Converged.is_terminal());
        assert!(SessionPhase::IterationCapReached.is_terminal());
        assert!(SessionPhase::Aborted { reason: "x".into() }.is_terminal());
        assert!(!SessionPhase::RoutingQuestions.is_terminal());
        assert_eq!(SessionPhase::Aborted { reason: "x".into() }.termination(), None);
    }

    #[tokio::test]
    async fn in_memory_storage_round_trips_sessions() {
        let storage = InMemorySessionStorage::new();
        let session = DiagnosisSession::new(UserInput::new(["fever"])).unwrap();
        let id = session.id.clone();

        storage.save(session).await.unwrap();
        assert!(storage.get(&id).await.unwrap().is_some());

        storage.delete(&id).await.unwrap();
        assert!(storage.get(&id).await.unwrap().is_none());
    }
}
