use std::str::FromStr;
use std::time::Duration;

use diagnosis_flow::{AgentRole, DiagnosisError, OrchestratorConfig, Result, llm::DEFAULT_MODEL};

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub orchestrator: OrchestratorConfig,
    pub api_key: String,
    pub model: String,
}

impl Settings {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup. Unset or blank keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = OrchestratorConfig::default();

        let specialized_agents = match get("SPECIALIZED_AGENTS") {
            Some(list) => parse_agents(&list)?,
            None => defaults.specialized_agents.clone(),
        };
        let max_iterations = parse_or("MAX_ITERATIONS", get("MAX_ITERATIONS"), defaults.max_iterations)?;
        let top_k = parse_or("TOP_K_DISEASES", get("TOP_K_DISEASES"), defaults.top_k_diseases)?;
        let timeout_secs = parse_or(
            "PREDICTION_TIMEOUT_SECS",
            get("PREDICTION_TIMEOUT_SECS"),
            defaults.prediction_timeout.as_secs(),
        )?;
        let handler_intake = match get("HANDLER_INTAKE") {
            Some(value) => parse_bool("HANDLER_INTAKE", &value)?,
            None => defaults.handler_intake,
        };

        let orchestrator = OrchestratorConfig::default()
            .with_agents(specialized_agents)
            .with_max_iterations(max_iterations)
            .with_top_k(top_k)
            .with_prediction_timeout(Duration::from_secs(timeout_secs))
            .with_handler_intake(handler_intake);
        orchestrator.validate()?;

        let api_key = get("OPENROUTER_API_KEY").ok_or_else(|| {
            DiagnosisError::InvalidConfig("OPENROUTER_API_KEY is required".to_string())
        })?;
        let model = get("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Ok(Self {
            orchestrator,
            api_key,
            model,
        })
    }
}

fn parse_agents(list: &str) -> Result<Vec<AgentRole>> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            name.parse::<AgentRole>().map_err(|e| {
                DiagnosisError::InvalidConfig(format!("SPECIALIZED_AGENTS: {e}"))
            })
        })
        .collect()
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|_| DiagnosisError::InvalidConfig(format!("{key} must be a number, got {raw:?}"))),
        None => Ok(default),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(DiagnosisError::InvalidConfig(format!(
            "{key} must be true or false, got {value:?}"
        ))),
    }
}
