use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;

/// Named values exchanged with the prediction capability, in insertion order.
pub type Fields = Map<String, Value>;

pub mod fields {
    pub const AGENT_TYPE: &str = "agent_type";
    pub const SYMPTOMS: &str = "symptoms";
    pub const CONTEXT: &str = "context";
    pub const INSTRUCTION: &str = "instruction";
    pub const QUESTION: &str = "question";
    pub const RESPONSE: &str = "response";
    pub const REPLY: &str = "reply";
    pub const CONFIDENCE: &str = "confidence";
    pub const DISEASES: &str = "diseases";
    pub const QUESTIONS: &str = "questions";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub description: &'static str,
}

const fn field(name: &'static str, description: &'static str) -> FieldSpec {
    FieldSpec { name, description }
}

/// Field contract of one kind of prediction request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub name: &'static str,
    pub inputs: &'static [FieldSpec],
    pub outputs: &'static [FieldSpec],
}

impl Signature {
    /// Opinion of an agent on the case, optionally with questions for peers.
    pub const AGENT_RESPONSE: Signature = Signature {
        name: "AgentResponse",
        inputs: &[
            field(fields::AGENT_TYPE, "Type of agent"),
            field(fields::SYMPTOMS, "Patient symptoms"),
            field(fields::CONTEXT, "Previous conversation"),
            field(fields::INSTRUCTION, "Role-specific instruction for the agent"),
        ],
        outputs: &[
            field(fields::RESPONSE, "Agent's analysis of the case"),
            field(fields::CONFIDENCE, "Confidence score between 0 and 1"),
            field(fields::DISEASES, "List of candidate disease names, most likely first"),
            field(
                fields::QUESTIONS,
                "Questions for other agents as an object keyed by the addressee \
                 (geneticist, radiologist or clinician), empty when there are none",
            ),
        ],
    };

    /// Answer of an agent to a question from a peer. Has no questions output.
    pub const AGENT_REPLY: Signature = Signature {
        name: "AgentReply",
        inputs: &[
            field(fields::AGENT_TYPE, "Type of agent"),
            field(fields::SYMPTOMS, "Patient symptoms"),
            field(fields::QUESTION, "Question from another agent"),
            field(fields::CONTEXT, "Previous conversation"),
            field(fields::INSTRUCTION, "Role-specific instruction for the agent"),
        ],
        outputs: &[
            field(fields::REPLY, "Agent's reply to the question"),
            field(fields::CONFIDENCE, "Confidence score between 0 and 1"),
            field(fields::DISEASES, "Updated list of candidate disease names"),
        ],
    };

    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|f| f.name == name)
    }
}

/// The external prediction capability.
///
/// Receives the named input fields of a [`Signature`] and returns its named
/// output fields. Values are validated by the caller, not by implementations.
#[async_trait]
pub trait Predictor: Send + Sync {
    async fn predict(&self, signature: &Signature, inputs: Fields) -> Result<Fields>;
}
