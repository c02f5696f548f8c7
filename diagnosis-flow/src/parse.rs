//! Validation of raw prediction output.
//!
//! Everything the prediction capability returns passes through here before it
//! becomes an [`AgentResponse`](crate::types::AgentResponse). Recoverable
//! oddities are coerced with a warning; anything that would otherwise need a
//! fabricated value is a [`DiagnosisError::MalformedOutput`].

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::error::{DiagnosisError, Result};
use crate::predictor::{Fields, fields};
use crate::role::AgentRole;
use crate::types::Questions;

/// Disease count each role is asked to stay within.
pub const DISEASES_PER_RESPONSE: usize = 3;

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([-+]?(?:\d+(?:\.\d+)?|\.\d+))\s*(%)?").expect("Invalid regex"));

static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*•]+|\d+[.)]|\(\d+\))\s*").expect("Invalid regex"));

static TRAILING_SCORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*[(\[]\s*(?:confidence\s*[:=]?\s*)?[-+]?(?:\d+(?:\.\d+)?|\.\d+)\s*%?\s*[)\]]\s*$")
        .expect("Invalid regex")
});

const NOTHING: [&str; 6] = ["", "none", "n/a", "na", "{}", "[]"];

fn is_nothing(text: &str) -> bool {
    let text = text.trim().trim_end_matches('.').to_ascii_lowercase();
    NOTHING.contains(&text.as_str())
}

/// Free-text field that must be present and non-blank.
pub fn parse_text(role: AgentRole, field: &'static str, outputs: &Fields) -> Result<String> {
    match outputs.get(field) {
        Some(Value::String(text)) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        Some(Value::String(_)) => Err(DiagnosisError::malformed(role, field, "text is empty")),
        Some(Value::Null) | None => Err(DiagnosisError::malformed(role, field, "field is missing")),
        Some(other) => Err(DiagnosisError::malformed(
            role,
            field,
            format!("expected text, got {other}"),
        )),
    }
}

/// Confidence as a number within 0.0..=1.0.
///
/// Accepts numbers and numeric text (a `%` suffix divides by 100). Values out
/// of range are clamped.
pub fn parse_confidence(role: AgentRole, outputs: &Fields) -> Result<f64> {
    let raw = match outputs.get(fields::CONFIDENCE) {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => NUMBER.captures(text).and_then(|caps| {
            let value = caps[1].parse::<f64>().ok()?;
            Some(if caps.get(2).is_some() { value / 100.0 } else { value })
        }),
        Some(Value::Null) | None => {
            return Err(DiagnosisError::malformed(
                role,
                fields::CONFIDENCE,
                "field is missing",
            ));
        }
        Some(_) => None,
    };

    let value = raw.filter(|v| v.is_finite()).ok_or_else(|| {
        DiagnosisError::malformed(
            role,
            fields::CONFIDENCE,
            format!(
                "not a number: {}",
                outputs.get(fields::CONFIDENCE).map(Value::to_string).unwrap_or_default()
            ),
        )
    })?;

    if !(0.0..=1.0).contains(&value) {
        let clamped = value.clamp(0.0, 1.0);
        warn!(role = %role, raw = value, clamped, "Confidence out of range, clamping");
        return Ok(clamped);
    }
    Ok(value)
}

fn clean_disease(entry: &str) -> Option<String> {
    let without_marker = LIST_MARKER.replace(entry, "");
    let without_score = TRAILING_SCORE.replace(&without_marker, "");
    let name = without_score
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .trim_end_matches(['.', ',', ';'])
        .trim();
    if is_nothing(name) {
        None
    } else {
        Some(name.to_string())
    }
}

fn split_disease_text(text: &str) -> Vec<&str> {
    if text.contains('\n') {
        text.lines().collect()
    } else if text.contains(';') {
        text.split(';').collect()
    } else {
        text.split(',').collect()
    }
}

fn disease_entry(role: AgentRole, value: &Value) -> Result<Option<String>> {
    match value {
        Value::String(text) => Ok(clean_disease(text)),
        Value::Object(map) => {
            let name = ["name", "disease"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str));
            match name {
                Some(name) => Ok(clean_disease(name)),
                None => Err(DiagnosisError::malformed(
                    role,
                    fields::DISEASES,
                    format!("entry without a name: {value}"),
                )),
            }
        }
        other => Err(DiagnosisError::malformed(
            role,
            fields::DISEASES,
            format!("unexpected entry: {other}"),
        )),
    }
}

/// Ordered list of disease names.
pub fn parse_diseases(role: AgentRole, outputs: &Fields) -> Result<Vec<String>> {
    let diseases = match outputs.get(fields::DISEASES) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| disease_entry(role, item))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect::<Vec<_>>(),
        Some(Value::String(text)) if text.trim_start().starts_with('[') => {
            let items: Vec<Value> = serde_json::from_str(text.trim()).map_err(|e| {
                DiagnosisError::malformed(role, fields::DISEASES, format!("invalid list: {e}"))
            })?;
            items
                .iter()
                .map(|item| disease_entry(role, item))
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .flatten()
                .collect()
        }
        Some(Value::String(text)) => split_disease_text(text)
            .into_iter()
            .filter_map(clean_disease)
            .collect(),
        Some(Value::Null) | None => {
            return Err(DiagnosisError::malformed(
                role,
                fields::DISEASES,
                "field is missing",
            ));
        }
        Some(other) => {
            return Err(DiagnosisError::malformed(
                role,
                fields::DISEASES,
                format!("expected a list, got {other}"),
            ));
        }
    };

    if diseases.is_empty() {
        warn!(role = %role, "Agent proposed no diseases");
    } else if diseases.len() > DISEASES_PER_RESPONSE {
        warn!(
            role = %role,
            count = diseases.len(),
            "Agent proposed more diseases than requested"
        );
    }
    Ok(diseases)
}

fn question_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        _ => return None,
    };
    if is_nothing(&text) { None } else { Some(text) }
}

fn raw_questions(value: &Value) -> Vec<(String, Option<String>)> {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| (key.clone(), question_text(value)))
            .collect(),
        Value::Array(items) => items
            .iter()
            .flat_map(|item| match item {
                Value::Object(map) => {
                    let to = ["to", "addressee", "role", "agent"]
                        .iter()
                        .find_map(|key| map.get(*key).and_then(Value::as_str));
                    let text = ["question", "text"]
                        .iter()
                        .find_map(|key| map.get(*key))
                        .and_then(question_text);
                    match to {
                        Some(to) => vec![(to.to_string(), text)],
                        None => map
                            .iter()
                            .map(|(key, value)| (key.clone(), question_text(value)))
                            .collect(),
                    }
                }
                Value::String(line) => raw_questions(&Value::String(line.clone())),
                _ => Vec::new(),
            })
            .collect(),
        Value::String(text) if is_nothing(text) => Vec::new(),
        Value::String(text) if text.trim_start().starts_with('{') => {
            match serde_json::from_str::<Value>(text.trim()) {
                Ok(parsed @ Value::Object(_)) => raw_questions(&parsed),
                _ => {
                    warn!(raw = %text, "Unparseable question mapping, ignoring");
                    Vec::new()
                }
            }
        }
        Value::String(text) => text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| {
                let line = LIST_MARKER.replace(line, "");
                match line.split_once(':') {
                    Some((to, question)) => Some((
                        to.trim().to_string(),
                        question_text(&Value::String(question.to_string())),
                    )),
                    None => {
                        warn!(line = %line, "Question without addressee, ignoring");
                        None
                    }
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Outbound questions of `asker`, limited to the session's other specialists.
///
/// Targets that cannot be resolved are dropped rather than failing the call.
pub fn parse_questions(asker: AgentRole, outputs: &Fields, addressees: &[AgentRole]) -> Questions {
    let Some(value) = outputs.get(fields::QUESTIONS).filter(|v| !v.is_null()) else {
        return Questions::new();
    };

    raw_questions(value)
        .into_iter()
        .filter_map(|(to, text)| {
            let text = text?;
            let role = match to.parse::<AgentRole>() {
                Ok(role) => role,
                Err(_) => {
                    warn!(asker = %asker, addressee = %to, "Dropping question for unknown role");
                    return None;
                }
            };
            if role == asker {
                warn!(asker = %asker, "Dropping question addressed to the asking agent");
                return None;
            }
            if !addressees.contains(&role) {
                warn!(asker = %asker, addressee = %role, "Dropping question for role outside the session");
                return None;
            }
            Some((role, text))
        })
        .collect()
}
