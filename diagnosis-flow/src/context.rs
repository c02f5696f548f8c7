use serde::{Deserialize, Serialize};

use crate::types::AgentResponse;

/// Rendered context for a session that has no entries yet.
pub const EMPTY_CONVERSATION: &str = "No previous conversation";

/// Append-only conversation shared by every agent call in a session.
///
/// Only the orchestrator extends it, always between prediction calls. Agents
/// see a rendered snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    entries: Vec<String>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: impl Into<String>) {
        self.entries.push(entry.into());
    }

    /// Append an agent response in the form later prompts receive it.
    pub fn append_response(&mut self, response: &AgentResponse) {
        self.append(describe_response(response));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn render(&self) -> String {
        if self.entries.is_empty() {
            EMPTY_CONVERSATION.to_string()
        } else {
            self.entries.join("\n\n")
        }
    }
}

fn describe_response(response: &AgentResponse) -> String {
    let mut text = match &response.question {
        Some(question) if response.is_reply() => format!(
            "[Round {}] {} answered \"{}\" (confidence {:.2}):\n{}",
            response.round,
            response.agent_type,
            question,
            response.confidence,
            response.response.trim()
        ),
        _ => format!(
            "[Round {}] {} (confidence {:.2}):\n{}",
            response.round,
            response.agent_type,
            response.confidence,
            response.response.trim()
        ),
    };

    if !response.diseases.is_empty() {
        text.push_str("\nCandidate diseases: ");
        text.push_str(&response.diseases.join(", "));
    }
    for question in response.questions.iter() {
        text.push_str(&format!("\nQuestion for {}: {}", question.to, question.text));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::AgentRole;
    use crate::types::{Questions, ResponseKind};

    fn response(kind: ResponseKind, question: Option<&str>) -> AgentResponse {
        let mut questions = Questions::new();
        if kind == ResponseKind::Initial {
            questions.push(AgentRole::Radiologist, "Any skeletal survey?");
        }
        AgentResponse {
            agent_type: AgentRole::Geneticist,
            kind,
            round: 1,
            response: " Looks connective-tissue related. ".to_string(),
            confidence: 0.7,
            diseases: vec!["Marfan syndrome".to_string(), "Ehlers-Danlos syndrome".to_string()],
            questions,
            question: question.map(str::to_string),
        }
    }

    #[test]
    fn empty_conversation_renders_sentinel() {
        let conversation = Conversation::new();
        assert!(conversation.is_empty());
        assert_eq!(conversation.render(), EMPTY_CONVERSATION);
    }

    #[test]
    fn entries_accumulate_in_order() {
        let mut conversation = Conversation::new();
        conversation.append("Patient profile: age 12");
        conversation.append_response(&response(ResponseKind::Initial, None));

        assert_eq!(conversation.len(), 2);
        let rendered = conversation.render();
        assert!(rendered.starts_with("Patient profile: age 12\n\n[Round 1] geneticist (confidence 0.70):"));
        assert!(rendered.contains("Candidate diseases: Marfan syndrome, Ehlers-Danlos syndrome"));
        assert!(rendered.contains("Question for radiologist: Any skeletal survey?"));
    }

    #[test]
    fn replies_name_the_question() {
        let mut conversation = Conversation::new();
        conversation.append_response(&response(ResponseKind::Reply, Some("Lens dislocation?")));
        assert!(conversation.render().contains("geneticist answered \"Lens dislocation?\""));
    }
}
