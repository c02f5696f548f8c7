use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error};

use crate::error::{DiagnosisError, Result};
use crate::parse;
use crate::predictor::{Fields, Predictor, Signature, fields};
use crate::role::AgentRole;
use crate::types::{AgentResponse, Questions, ResponseKind};

/// Issues single-turn and reply predictions on behalf of any agent role.
///
/// Every call is exactly one request to the [`Predictor`], bounded by the
/// configured timeout. There are no retries and nothing is cached.
#[derive(Clone)]
pub struct DiagnosticAgent {
    predictor: Arc<dyn Predictor>,
    timeout: Duration,
    addressees: Vec<AgentRole>,
}

impl DiagnosticAgent {
    /// `addressees` are the roles questions may be routed to; anything else
    /// an agent asks for is dropped while parsing.
    pub fn new(predictor: Arc<dyn Predictor>, timeout: Duration, addressees: Vec<AgentRole>) -> Self {
        Self {
            predictor,
            timeout,
            addressees,
        }
    }

    /// Single-turn prediction: the agent's opinion and its questions for peers.
    pub async fn initiate(
        &self,
        role: AgentRole,
        symptoms: &[String],
        context: &str,
        round: usize,
    ) -> Result<AgentResponse> {
        let mut inputs = Fields::new();
        inputs.insert(fields::AGENT_TYPE.into(), Value::from(role.as_str()));
        inputs.insert(fields::SYMPTOMS.into(), Value::from(symptoms.join(", ")));
        inputs.insert(fields::CONTEXT.into(), Value::from(context));
        inputs.insert(fields::INSTRUCTION.into(), Value::from(role.instruction()));

        let outputs = self.call(role, &Signature::AGENT_RESPONSE, inputs).await?;

        Ok(AgentResponse {
            agent_type: role,
            kind: ResponseKind::Initial,
            round,
            response: parse::parse_text(role, fields::RESPONSE, &outputs)?,
            confidence: parse::parse_confidence(role, &outputs)?,
            diseases: parse::parse_diseases(role, &outputs)?,
            questions: parse::parse_questions(role, &outputs, &self.addressees),
            question: None,
        })
    }

    /// Reply prediction: the agent's answer to one question. Always question-free.
    pub async fn reply(
        &self,
        role: AgentRole,
        symptoms: &[String],
        question: &str,
        context: &str,
        round: usize,
    ) -> Result<AgentResponse> {
        let mut inputs = Fields::new();
        inputs.insert(fields::AGENT_TYPE.into(), Value::from(role.as_str()));
        inputs.insert(fields::SYMPTOMS.into(), Value::from(symptoms.join(", ")));
        inputs.insert(fields::QUESTION.into(), Value::from(question));
        inputs.insert(fields::CONTEXT.into(), Value::from(context));
        inputs.insert(fields::INSTRUCTION.into(), Value::from(role.instruction()));

        let outputs = self.call(role, &Signature::AGENT_REPLY, inputs).await?;

        Ok(AgentResponse {
            agent_type: role,
            kind: ResponseKind::Reply,
            round,
            response: parse::parse_text(role, fields::REPLY, &outputs)?,
            confidence: parse::parse_confidence(role, &outputs)?,
            diseases: parse::parse_diseases(role, &outputs)?,
            questions: Questions::new(),
            question: Some(question.to_string()),
        })
    }

    async fn call(&self, role: AgentRole, signature: &Signature, inputs: Fields) -> Result<Fields> {
        debug!(role = %role, signature = signature.name, "Issuing prediction");
        match tokio::time::timeout(self.timeout, self.predictor.predict(signature, inputs)).await {
            Ok(Ok(outputs)) => Ok(outputs),
            Ok(Err(e)) => {
                error!(role = %role, signature = signature.name, error = %e, "Prediction failed");
                Err(e)
            }
            Err(_) => {
                error!(role = %role, signature = signature.name, "Prediction timed out");
                Err(DiagnosisError::PredictionTimeout {
                    role,
                    after: self.timeout,
                })
            }
        }
    }
}
