use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DiagnosisError, Result};
use crate::role::AgentRole;

pub const DEFAULT_MAX_ITERATIONS: usize = 2;
pub const DEFAULT_TOP_K_DISEASES: usize = 3;
pub const DEFAULT_PREDICTION_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings the orchestrator is constructed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Agents invoked every round, in this order.
    pub specialized_agents: Vec<AgentRole>,
    /// Upper bound on rounds per session.
    pub max_iterations: usize,
    /// Number of diseases kept in the final ranking.
    pub top_k_diseases: usize,
    /// Bound on each individual prediction call.
    pub prediction_timeout: Duration,
    /// Let the handler contextualize the case before the first round.
    pub handler_intake: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            specialized_agents: AgentRole::SPECIALISTS.to_vec(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            top_k_diseases: DEFAULT_TOP_K_DISEASES,
            prediction_timeout: DEFAULT_PREDICTION_TIMEOUT,
            handler_intake: false,
        }
    }
}

impl OrchestratorConfig {
    pub fn with_agents(mut self, agents: impl Into<Vec<AgentRole>>) -> Self {
        self.specialized_agents = agents.into();
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k_diseases = top_k;
        self
    }

    pub fn with_prediction_timeout(mut self, timeout: Duration) -> Self {
        self.prediction_timeout = timeout;
        self
    }

    pub fn with_handler_intake(mut self, enabled: bool) -> Self {
        self.handler_intake = enabled;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.specialized_agents.is_empty() {
            return Err(DiagnosisError::InvalidConfig(
                "at least one specialized agent is required".to_string(),
            ));
        }
        if self.specialized_agents.contains(&AgentRole::Handler) {
            return Err(DiagnosisError::InvalidConfig(
                "the handler cannot act as a specialized agent".to_string(),
            ));
        }
        for (i, role) in self.specialized_agents.iter().enumerate() {
            if self.specialized_agents[..i].contains(role) {
                return Err(DiagnosisError::InvalidConfig(format!(
                    "specialized agent {role} is listed twice"
                )));
            }
        }
        if self.max_iterations == 0 {
            return Err(DiagnosisError::InvalidConfig(
                "max_iterations must be positive".to_string(),
            ));
        }
        if self.top_k_diseases == 0 {
            return Err(DiagnosisError::InvalidConfig(
                "top_k_diseases must be positive".to_string(),
            ));
        }
        if self.prediction_timeout.is_zero() {
            return Err(DiagnosisError::InvalidConfig(
                "prediction_timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Most prediction calls a session can issue under this configuration.
    ///
    /// Every agent is initiated once, then each round routes at most one
    /// reply per agent. The optional intake adds one call.
    pub fn max_calls(&self) -> usize {
        let agents = self.specialized_agents.len();
        let intake = usize::from(self.handler_intake);
        intake + agents + agents * self.max_iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = OrchestratorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.specialized_agents, AgentRole::SPECIALISTS.to_vec());
        assert_eq!(config.max_iterations, 2);
        assert_eq!(config.top_k_diseases, 3);
        assert_eq!(config.max_calls(), 9);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let cases = [
            OrchestratorConfig::default().with_agents(Vec::new()),
            OrchestratorConfig::default().with_agents(vec![AgentRole::Handler]),
            OrchestratorConfig::default()
                .with_agents(vec![AgentRole::Clinician, AgentRole::Clinician]),
            OrchestratorConfig::default().with_max_iterations(0),
            OrchestratorConfig::default().with_top_k(0),
            OrchestratorConfig::default().with_prediction_timeout(Duration::ZERO),
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(DiagnosisError::InvalidConfig(_))),
                "{config:?} should be rejected"
            );
        }
    }

    #[test]
    fn intake_adds_one_call_to_the_bound() {
        let config = OrchestratorConfig::default()
            .with_agents(vec![AgentRole::Geneticist])
            .with_max_iterations(3)
            .with_handler_intake(true);
        assert_eq!(config.max_calls(), 5);
    }
}
