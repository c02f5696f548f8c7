use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DiagnosisError, Result};

const HANDLER_INSTRUCTION: &str = r#"You are the Handler Agent and you prepare the case for the specialists.
- Take the patient's reported symptoms as given.
- Restate and contextualize them in precise medical language.
- Point out anything in the history that resembles previously seen cases.
- Produce a structured overview the specialists can build on, including which specialty should look at what.
- Do not propose diagnoses yourself; your job is preparation, not judgement.
"#;

const GENETICIST_INSTRUCTION: &str = r#"You are a Geneticist focused on rare hereditary and genetic disorders.
- Read the symptoms from a genetic point of view.
- Propose at most 3 rare genetic diseases, most likely first, with a confidence score between 0 and 1.
- Give a short justification for every candidate.
- When something is unclear or missing, ask short, specific questions to the Radiologist or the Clinician.
- Use the answers you receive to refine your hypotheses in later rounds.
"#;

const RADIOLOGIST_INSTRUCTION: &str = r#"You are a Radiologist who interprets imaging findings in rare diseases.
- Read the symptoms from an imaging point of view and propose at most 3 rare diseases with characteristic imaging patterns.
- Attach a confidence score between 0 and 1 and a brief justification to each candidate.
- Ask targeted questions to the Geneticist or the Clinician when imaging data or more context is needed.
- Complement the team by naming imaging patterns that point towards rare conditions.
"#;

const CLINICIAN_INSTRUCTION: &str = r#"You are a Clinician who integrates every specialty into a working diagnosis.
- Look at the symptoms as a whole and propose at most 3 rare diseases with a confidence score between 0 and 1.
- Explain your reasoning from clinical signs, symptoms and what the other agents have contributed.
- When critical information is missing, ask clarifying questions to the Geneticist or the Radiologist.
- Lead the team towards a coherent diagnostic picture.
"#;

/// The closed set of agent roles taking part in a diagnostic session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Handler,
    Geneticist,
    Radiologist,
    Clinician,
}

impl AgentRole {
    pub const ALL: [AgentRole; 4] = [
        AgentRole::Handler,
        AgentRole::Geneticist,
        AgentRole::Radiologist,
        AgentRole::Clinician,
    ];

    /// Roles that propose diseases, in their default invocation order.
    pub const SPECIALISTS: [AgentRole; 3] = [
        AgentRole::Geneticist,
        AgentRole::Radiologist,
        AgentRole::Clinician,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Handler => "handler",
            AgentRole::Geneticist => "geneticist",
            AgentRole::Radiologist => "radiologist",
            AgentRole::Clinician => "clinician",
        }
    }

    /// Fixed instruction text for this role.
    pub fn instruction(&self) -> &'static str {
        match self {
            AgentRole::Handler => HANDLER_INSTRUCTION,
            AgentRole::Geneticist => GENETICIST_INSTRUCTION,
            AgentRole::Radiologist => RADIOLOGIST_INSTRUCTION,
            AgentRole::Clinician => CLINICIAN_INSTRUCTION,
        }
    }

    pub fn is_specialist(&self) -> bool {
        !matches!(self, AgentRole::Handler)
    }
}

/// Looks up the instruction for a role given by name.
///
/// Unrecognized names fail with [`DiagnosisError::UnknownRole`]; there is no
/// empty-instruction fallback.
pub fn instruction_for(role: &str) -> Result<&'static str> {
    role.parse::<AgentRole>().map(|role| role.instruction())
}

impl FromStr for AgentRole {
    type Err = DiagnosisError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        AgentRole::ALL
            .into_iter()
            .find(|role| role.as_str() == normalized)
            .ok_or_else(|| DiagnosisError::UnknownRole(s.to_string()))
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
