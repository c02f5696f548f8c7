//! Confidence-weighted merge of the agents' standing disease lists.
//!
//! Each specialist's standing opinion starts at its latest initial response
//! and takes in the replies it gave afterwards; anything it said before that
//! is superseded. Within its standing opinion an agent backs a disease once,
//! at the confidence of the latest response naming it. A disease scores the
//! sum over the agents backing it.
//!
//! Names are compared case-insensitively and keep the spelling they were first
//! mentioned with. Equal scores keep first-mention order.

use std::collections::HashMap;

use crate::role::AgentRole;
use crate::types::{AgentResponse, FinalOutput, RankedDisease, Termination};

/// Derive the final ranked output from a finished session's response log.
pub fn aggregate(
    responses: &[AgentResponse],
    top_k: usize,
    termination: Termination,
    rounds: usize,
) -> FinalOutput {
    let mut ranked = rank(responses);
    let proposed = ranked.len();
    ranked.truncate(top_k);

    FinalOutput {
        top_diseases: ranked.iter().map(|d| d.name.clone()).collect(),
        confidence_summary: confidence_summary(&ranked, proposed, responses),
        agent_responses: responses.to_vec(),
        ranked,
        termination,
        rounds,
    }
}

/// Every proposed disease, highest score first.
pub fn rank(responses: &[AgentResponse]) -> Vec<RankedDisease> {
    let standing = standing_opinions(responses);

    let mut ranked: Vec<RankedDisease> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    // (agent, disease slot, confidence), latest response wins
    let mut backing: Vec<(AgentRole, usize, f64)> = Vec::new();

    for response in standing {
        for disease in &response.diseases {
            let key = disease.trim().to_lowercase();
            if key.is_empty() {
                continue;
            }
            let slot = *index.entry(key).or_insert_with(|| {
                ranked.push(RankedDisease {
                    name: disease.trim().to_string(),
                    score: 0.0,
                    mentions: 0,
                });
                ranked.len() - 1
            });
            match backing
                .iter_mut()
                .find(|(agent, s, _)| *agent == response.agent_type && *s == slot)
            {
                Some(entry) => entry.2 = response.confidence,
                None => backing.push((response.agent_type, slot, response.confidence)),
            }
        }
    }

    for (_, slot, confidence) in backing {
        ranked[slot].score += confidence;
        ranked[slot].mentions += 1;
    }

    // stable sort keeps first-mention order among equal scores
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}

/// Specialist responses that make up each agent's standing opinion, in log order.
fn standing_opinions(responses: &[AgentResponse]) -> Vec<&AgentResponse> {
    let mut latest_initial: HashMap<AgentRole, usize> = HashMap::new();
    for (i, response) in responses.iter().enumerate() {
        if response.agent_type.is_specialist() && !response.is_reply() {
            latest_initial.insert(response.agent_type, i);
        }
    }

    responses
        .iter()
        .enumerate()
        .filter(|(i, response)| {
            response.agent_type.is_specialist()
                && latest_initial
                    .get(&response.agent_type)
                    .is_none_or(|start| i >= start)
        })
        .map(|(_, response)| response)
        .collect()
}

/// Human-readable description of how the kept scores are spread.
pub fn confidence_summary(
    kept: &[RankedDisease],
    proposed: usize,
    responses: &[AgentResponse],
) -> String {
    let opinions: Vec<f64> = responses
        .iter()
        .filter(|r| r.agent_type.is_specialist())
        .map(|r| r.confidence)
        .collect();
    let mean = if opinions.is_empty() {
        None
    } else {
        Some(opinions.iter().sum::<f64>() / opinions.len() as f64)
    };
    let mean_text = match mean {
        Some(mean) => format!(
            "Mean agent confidence {:.2} across {} responses.",
            mean,
            opinions.len()
        ),
        None => "No specialist responses were recorded.".to_string(),
    };

    let Some(leader) = kept.first() else {
        return format!("No candidate diseases were proposed. {mean_text}");
    };

    let mut summary = format!(
        "Leading candidate: {} (score {:.2}, backed by {} agent{}).",
        leader.name,
        leader.score,
        leader.mentions,
        if leader.mentions == 1 { "" } else { "s" }
    );

    if let Some(last) = kept.last().filter(|_| kept.len() > 1) {
        let total: f64 = kept.iter().map(|d| d.score).sum();
        let share = if total > 0.0 { leader.score / total } else { 0.0 };
        summary.push_str(&format!(
            " Kept {} of {} proposed candidates with scores from {:.2} to {:.2}; the leader holds {:.0}% of the kept score.",
            kept.len(),
            proposed,
            last.score,
            leader.score,
            share * 100.0
        ));
    } else {
        summary.push_str(&format!(
            " Kept 1 of {} proposed candidate{}.",
            proposed,
            if proposed == 1 { "" } else { "s" }
        ));
    }

    summary.push(' ');
    summary.push_str(&mean_text);
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::AgentRole;
    use crate::types::{Questions, ResponseKind};

    fn response(role: AgentRole, confidence: f64, diseases: &[&str]) -> AgentResponse {
        AgentResponse {
            agent_type: role,
            kind: ResponseKind::Initial,
            round: 1,
            response: "analysis".to_string(),
            confidence,
            diseases: diseases.iter().map(|d| d.to_string()).collect(),
            questions: Questions::new(),
            question: None,
        }
    }

    fn in_round(mut response: AgentResponse, round: usize) -> AgentResponse {
        response.round = round;
        response
    }

    fn reply(role: AgentRole, confidence: f64, diseases: &[&str]) -> AgentResponse {
        AgentResponse {
            kind: ResponseKind::Reply,
            question: Some("From clinician: Anything else?".to_string()),
            ..response(role, confidence, diseases)
        }
    }

    fn names(ranked: &[RankedDisease]) -> Vec<&str> {
        ranked.iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn scores_sum_confidences_across_agents() {
        let log = vec![
            response(AgentRole::Geneticist, 0.6, &["Marfan syndrome", "Homocystinuria"]),
            response(AgentRole::Radiologist, 0.5, &["marfan syndrome ", "Loeys-Dietz syndrome"]),
            response(AgentRole::Clinician, 0.9, &["Loeys-Dietz syndrome"]),
        ];
        let ranked = rank(&log);
        assert_eq!(
            names(&ranked),
            vec!["Loeys-Dietz syndrome", "Marfan syndrome", "Homocystinuria"]
        );
        assert!((ranked[0].score - 1.4).abs() < 1e-9);
        assert!((ranked[1].score - 1.1).abs() < 1e-9);
        assert_eq!(ranked[1].mentions, 2);
    }

    #[test]
    fn ties_keep_first_mention_order() {
        let log = vec![
            response(AgentRole::Geneticist, 0.5, &["B disease", "A disease"]),
            response(AgentRole::Clinician, 0.5, &["C disease"]),
        ];
        assert_eq!(names(&rank(&log)), vec!["B disease", "A disease", "C disease"]);
    }

    #[test]
    fn handler_opinions_are_ignored() {
        let log = vec![
            response(AgentRole::Handler, 1.0, &["Handler guess"]),
            response(AgentRole::Clinician, 0.2, &["Fabry disease"]),
        ];
        assert_eq!(names(&rank(&log)), vec!["Fabry disease"]);
    }

    #[test]
    fn duplicate_names_in_one_response_count_once() {
        let log = vec![response(AgentRole::Geneticist, 0.4, &["Fabry disease", "FABRY DISEASE"])];
        let ranked = rank(&log);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].mentions, 1);
    }

    #[test]
    fn top_k_truncates_only_when_enough_candidates() {
        let log = vec![
            response(AgentRole::Geneticist, 0.9, &["A", "B"]),
            response(AgentRole::Clinician, 0.1, &["C", "D"]),
        ];
        let output = aggregate(&log, 3, Termination::Converged, 1);
        assert_eq!(output.top_diseases, vec!["A", "B", "C"]);
        assert_eq!(aggregate(&log, 10, Termination::Converged, 1).top_diseases.len(), 4);
    }

    #[test]
    fn later_initial_opinion_supersedes_earlier_one() {
        let log = vec![
            in_round(response(AgentRole::Geneticist, 0.9, &["A disease"]), 1),
            in_round(response(AgentRole::Clinician, 0.7, &["C disease"]), 1),
            in_round(response(AgentRole::Geneticist, 0.6, &["B disease"]), 2),
            in_round(response(AgentRole::Clinician, 0.7, &["C disease"]), 2),
        ];
        let ranked = rank(&log);
        assert_eq!(names(&ranked), vec!["C disease", "B disease"]);
        // repeating an opinion does not add weight
        assert!((ranked[0].score - 0.7).abs() < 1e-9);
        assert_eq!(ranked[0].mentions, 1);
    }

    #[test]
    fn replies_update_the_standing_opinion() {
        let log = vec![
            response(AgentRole::Geneticist, 0.4, &["Marfan syndrome", "Homocystinuria"]),
            response(AgentRole::Radiologist, 0.5, &["Marfan syndrome"]),
            reply(AgentRole::Geneticist, 0.8, &["Homocystinuria"]),
        ];
        let ranked = rank(&log);
        assert_eq!(names(&ranked), vec!["Marfan syndrome", "Homocystinuria"]);
        assert!((ranked[0].score - 0.9).abs() < 1e-9);
        assert!((ranked[1].score - 0.8).abs() < 1e-9);
        assert_eq!(ranked[1].mentions, 1);
    }

    #[test]
    fn ranking_is_a_pure_function_of_the_log() {
        let log = vec![
            response(AgentRole::Geneticist, 0.3, &["A", "B"]),
            response(AgentRole::Radiologist, 0.3, &["B", "A"]),
        ];
        assert_eq!(rank(&log), rank(&log));
    }

    #[test]
    fn summary_describes_spread() {
        let log = vec![
            response(AgentRole::Geneticist, 0.8, &["Marfan syndrome", "Homocystinuria"]),
            response(AgentRole::Clinician, 0.4, &["Marfan syndrome"]),
        ];
        let kept = rank(&log);
        let summary = confidence_summary(&kept, 2, &log);
        assert!(summary.starts_with("Leading candidate: Marfan syndrome (score 1.20, backed by 2 agents)."));
        assert!(summary.contains("scores from 0.80 to 1.20"));
        assert!(summary.contains("Mean agent confidence 0.60 across 2 responses."));
    }

    #[test]
    fn aggregate_twice_yields_the_same_output() {
        let log = vec![
            response(AgentRole::Geneticist, 0.7, &["Fabry disease", "Gaucher disease"]),
            response(AgentRole::Radiologist, 0.5, &["Pompe disease", "Fabry disease"]),
            response(AgentRole::Clinician, 0.6, &["Niemann-Pick disease"]),
        ];
        let first = aggregate(&log, 3, Termination::Converged, 1);
        let second = aggregate(&log, 3, Termination::Converged, 1);
        assert_eq!(first, second);
        assert_eq!(first.top_diseases.len(), 3);
        assert_eq!(first.top_diseases[0], "Fabry disease");
        assert_eq!(first.agent_responses, log);
        assert!(first.confidence_summary.contains("Kept 3 of 4 proposed candidates"));
    }

    #[test]
    fn summary_without_candidates_says_so() {
        let log = vec![response(AgentRole::Clinician, 0.1, &[])];
        let summary = confidence_summary(&[], 0, &log);
        assert!(summary.starts_with("No candidate diseases were proposed."));
    }
}
