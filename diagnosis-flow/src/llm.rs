//! [`Predictor`] backed by an LLM through `rig` (OpenRouter provider).
//!
//! Each call builds a one-shot agent whose preamble describes the signature's
//! fields and asks for a single JSON object carrying the output fields.

use async_trait::async_trait;
use rig::{client::CompletionClient, completion::Prompt, providers::openrouter};
use serde_json::Value;
use tracing::debug;

use crate::error::{DiagnosisError, Result};
use crate::predictor::{Fields, Predictor, Signature, fields};
use crate::role::AgentRole;

pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

pub struct RigPredictor {
    client: openrouter::Client,
    model: String,
}

impl RigPredictor {
    pub fn new(api_key: &str, model: impl Into<String>) -> Self {
        Self {
            client: openrouter::Client::new(api_key),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn preamble(signature: &Signature) -> String {
    let mut text = format!(
        "You complete the `{}` task. You receive these inputs:\n",
        signature.name
    );
    for field in signature.inputs {
        text.push_str(&format!("- {}: {}\n", field.name, field.description));
    }
    text.push_str("\nFollow the role-specific instruction you are given. Respond **only** with a JSON object with exactly these keys:\n");
    for field in signature.outputs {
        text.push_str(&format!("- \"{}\": {}\n", field.name, field.description));
    }
    text.push_str("\nUse a number for the confidence and a JSON array of strings for the diseases. Do not mix text and JSON.");
    text
}

fn prompt(inputs: &Fields) -> String {
    inputs
        .iter()
        .map(|(name, value)| match value {
            Value::String(text) => format!("{name}:\n{text}"),
            other => format!("{name}:\n{other}"),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Pull the JSON object out of a model reply, tolerating code fences and
/// surrounding prose.
fn extract_object(raw: &str) -> std::result::Result<Fields, String> {
    let cleaned = raw.trim();
    let cleaned = cleaned
        .strip_prefix("```json")
        .or_else(|| cleaned.strip_prefix("```"))
        .unwrap_or(cleaned);
    let cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned).trim();

    let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) else {
        return Err(format!("no JSON object in reply: {raw}"));
    };
    if end < start {
        return Err(format!("no JSON object in reply: {raw}"));
    }

    match serde_json::from_str::<Value>(&cleaned[start..=end]) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected a JSON object, got {other}")),
        Err(e) => Err(format!("invalid JSON ({e}) in reply: {raw}")),
    }
}

#[async_trait]
impl Predictor for RigPredictor {
    async fn predict(&self, signature: &Signature, inputs: Fields) -> Result<Fields> {
        let role: AgentRole = inputs
            .get(fields::AGENT_TYPE)
            .and_then(Value::as_str)
            .ok_or_else(|| DiagnosisError::InvalidInput("agent_type input is missing".to_string()))?
            .parse()?;

        let agent = self
            .client
            .agent(&self.model)
            .preamble(&preamble(signature))
            .build();

        let raw = agent
            .prompt(prompt(&inputs).as_str())
            .await
            .map_err(|e| DiagnosisError::PredictionFailed {
                role,
                reason: e.to_string(),
            })?;
        debug!(role = %role, signature = signature.name, raw = %raw, "LLM reply");

        extract_object(&raw).map_err(|reason| DiagnosisError::MalformedOutput {
            role,
            field: "prediction",
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preamble_lists_output_keys() {
        let text = preamble(&Signature::AGENT_REPLY);
        assert!(text.contains("`AgentReply`"));
        assert!(text.contains("- \"reply\":"));
        assert!(!text.contains("\"questions\""));
    }

    #[test]
    fn prompt_renders_inputs_in_order() {
        let mut inputs = Fields::new();
        inputs.insert("agent_type".into(), Value::from("clinician"));
        inputs.insert("symptoms".into(), Value::from("fever, rash"));
        assert_eq!(prompt(&inputs), "agent_type:\nclinician\n\nsymptoms:\nfever, rash");
    }

    #[test]
    fn object_is_extracted_from_fenced_reply() {
        let raw = "```json\n{\"reply\": \"yes\", \"confidence\": 0.4, \"diseases\": []}\n```";
        let map = extract_object(raw).unwrap();
        assert_eq!(map["reply"], Value::from("yes"));
    }

    #[test]
    fn object_is_extracted_from_prose() {
        let raw = "Here is my answer: {\"response\": \"ok\"} Hope this helps.";
        assert!(extract_object(raw).unwrap().contains_key("response"));
    }

    #[test]
    fn reply_without_object_is_rejected() {
        assert!(extract_object("I cannot answer that").is_err());
        assert!(extract_object("[1, 2]").is_err());
    }
}
