use serde::{Deserialize, Serialize};

use crate::error::{DiagnosisError, Result};
use crate::role::AgentRole;

/// Patient data submitted once per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInput {
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub medical_history: Option<String>,
}

impl UserInput {
    pub fn new<I, S>(symptoms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            symptoms: symptoms.into_iter().map(Into::into).collect(),
            age: None,
            gender: None,
            medical_history: None,
        }
    }

    pub fn with_age(mut self, age: u32) -> Self {
        self.age = Some(age);
        self
    }

    pub fn with_gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = Some(gender.into());
        self
    }

    pub fn with_medical_history(mut self, history: impl Into<String>) -> Self {
        self.medical_history = Some(history.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.symptoms.is_empty() {
            return Err(DiagnosisError::InvalidInput(
                "at least one symptom is required".to_string(),
            ));
        }
        if let Some(index) = self.symptoms.iter().position(|s| s.trim().is_empty()) {
            return Err(DiagnosisError::InvalidInput(format!(
                "symptom #{} is blank",
                index + 1
            )));
        }
        Ok(())
    }

    /// Patient details besides the symptoms, or `None` when nothing was given.
    pub fn profile(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(age) = self.age {
            parts.push(format!("age {age}"));
        }
        if let Some(gender) = self.gender.as_deref().map(str::trim).filter(|g| !g.is_empty()) {
            parts.push(format!("gender {gender}"));
        }
        if let Some(history) = self
            .medical_history
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
        {
            parts.push(format!("medical history: {history}"));
        }
        if parts.is_empty() {
            None
        } else {
            Some(format!("Patient profile: {}", parts.join("; ")))
        }
    }
}

/// A question one agent addresses to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub to: AgentRole,
    pub text: String,
}

/// Outbound questions in the order the agent emitted them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Questions(Vec<Question>);

impl Questions {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, to: AgentRole, text: impl Into<String>) {
        self.0.push(Question {
            to,
            text: text.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.0.iter()
    }
}

impl FromIterator<(AgentRole, String)> for Questions {
    fn from_iter<T: IntoIterator<Item = (AgentRole, String)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(to, text)| Question { to, text })
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    /// Opinion produced by the single-turn predictor.
    Initial,
    /// Answer to a routed question; never carries questions.
    Reply,
}

/// One agent's structured output for one prediction call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub agent_type: AgentRole,
    pub kind: ResponseKind,
    pub round: usize,
    pub response: String,
    pub confidence: f64,
    pub diseases: Vec<String>,
    pub questions: Questions,
    /// The question this response answers, for replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
}

impl AgentResponse {
    pub fn is_reply(&self) -> bool {
        matches!(self.kind, ResponseKind::Reply)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Every question raised was answered, or none were asked.
    Converged,
    /// The round cap was hit with questions still unanswered.
    IterationCapReached,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedDisease {
    pub name: String,
    pub score: f64,
    /// Agents whose standing opinion names the disease.
    pub mentions: usize,
}

/// Ranked differential diagnosis for a finished session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalOutput {
    pub top_diseases: Vec<String>,
    pub confidence_summary: String,
    pub agent_responses: Vec<AgentResponse>,
    pub ranked: Vec<RankedDisease>,
    pub termination: Termination,
    pub rounds: usize,
}
