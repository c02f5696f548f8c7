use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::{
    agent::DiagnosticAgent,
    aggregate::aggregate,
    config::OrchestratorConfig,
    error::{DiagnosisError, Result},
    predictor::Predictor,
    role::AgentRole,
    storage::{DiagnosisSession, PendingQuestion, SessionPhase},
    types::{AgentResponse, FinalOutput, UserInput},
};

/// Outcome of one orchestrator step
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Phase the session moved to.
    pub phase: SessionPhase,
    pub status: ExecutionStatus,
    /// Prediction calls issued by this step.
    pub calls: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// More steps are needed before the session can be aggregated
    InProgress,
    /// Session reached a terminal phase
    Completed,
}

/// Drives diagnostic sessions through the round protocol.
///
/// Round 1 initiates every specialized agent once in configured order, each
/// seeing the conversation as extended by the agents before it. Their
/// questions are queued in agent order, then in the order each agent emitted
/// them. Every round routes one batch from the queue: the oldest question for
/// each addressee, so no agent replies twice in a round. An empty queue
/// converges the session. Questions still queued after round `max_iterations`
/// are dropped and the session stops at the cap.
///
/// A session therefore issues at most `agents + agents * max_iterations`
/// predictions, plus one for the optional intake.
pub struct Orchestrator {
    config: OrchestratorConfig,
    agent: DiagnosticAgent,
}

impl Orchestrator {
    pub fn new(predictor: Arc<dyn Predictor>, config: OrchestratorConfig) -> Result<Self> {
        config.validate()?;
        let agent = DiagnosticAgent::new(
            predictor,
            config.prediction_timeout,
            config.specialized_agents.clone(),
        );
        Ok(Self { config, agent })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Create a session for `input`, starting with the intake when enabled.
    pub fn create_session(&self, input: UserInput) -> Result<DiagnosisSession> {
        let mut session = DiagnosisSession::new(input)?;
        if self.config.handler_intake {
            session.phase = SessionPhase::Intake;
        }
        info!(
            session_id = %session.id,
            symptoms = session.input.symptoms.len(),
            phase = session.phase.name(),
            "Created diagnosis session"
        );
        Ok(session)
    }

    /// Run a fresh session to completion and aggregate it.
    pub async fn run(&self, input: UserInput) -> Result<FinalOutput> {
        let mut session = self.create_session(input)?;
        while !session.is_finished() {
            self.execute_session(&mut session).await?;
        }
        self.finalize(&session)
    }

    /// Advance the session by exactly one phase transition.
    ///
    /// Any failed prediction aborts the session and is reported as
    /// [`DiagnosisError::DiagnosisUnavailable`].
    pub async fn execute_session(&self, session: &mut DiagnosisSession) -> Result<ExecutionResult> {
        let calls_before = session.calls;
        let step = match session.phase {
            SessionPhase::Intake => self.run_intake(session).await,
            SessionPhase::AwaitingInitialResponses => self.run_initial_responses(session).await,
            SessionPhase::RoutingQuestions => self.route_questions(session).await,
            SessionPhase::Converged
            | SessionPhase::IterationCapReached
            | SessionPhase::Aborted { .. } => {
                return Err(DiagnosisError::SessionFinished(session.id.clone()));
            }
        };
        session.updated_at = Utc::now();

        if let Err(e) = step {
            error!(
                session_id = %session.id,
                round = session.round,
                phase = session.phase.name(),
                error = %e,
                "Aborting diagnosis session"
            );
            session.phase = SessionPhase::Aborted {
                reason: e.to_string(),
            };
            session.pending.clear();
            session.status_message = Some(format!("Diagnosis unavailable: {e}"));
            return Err(DiagnosisError::DiagnosisUnavailable {
                session_id: session.id.clone(),
                source: Box::new(e),
            });
        }

        let status = if session.is_finished() {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::InProgress
        };
        info!(
            session_id = %session.id,
            round = session.round,
            phase = session.phase.name(),
            calls = session.calls,
            "Diagnosis step completed"
        );

        Ok(ExecutionResult {
            phase: session.phase.clone(),
            status,
            calls: session.calls - calls_before,
        })
    }

    /// Aggregate a finished session into its ranked output.
    pub fn finalize(&self, session: &DiagnosisSession) -> Result<FinalOutput> {
        match (&session.phase, session.phase.termination()) {
            (_, Some(termination)) => Ok(aggregate(
                &session.responses,
                self.config.top_k_diseases,
                termination,
                session.round,
            )),
            (SessionPhase::Aborted { reason }, None) => Err(DiagnosisError::SessionAborted {
                session_id: session.id.clone(),
                reason: reason.clone(),
            }),
            _ => Err(DiagnosisError::SessionInProgress(session.id.clone())),
        }
    }

    async fn run_intake(&self, session: &mut DiagnosisSession) -> Result<()> {
        let response = self
            .agent
            .initiate(
                AgentRole::Handler,
                &session.input.symptoms,
                &session.conversation.render(),
                session.round,
            )
            .await;
        session.calls += 1;
        let response = response?;
        if !response.questions.is_empty() {
            warn!(session_id = %session.id, "Handler questions are not routed");
        }
        record(session, response);

        session.phase = SessionPhase::AwaitingInitialResponses;
        session.status_message = Some("Case prepared by the handler".to_string());
        Ok(())
    }

    async fn run_initial_responses(&self, session: &mut DiagnosisSession) -> Result<()> {
        session.round = 1;
        let first = session.responses.len();

        for role in &self.config.specialized_agents {
            let response = self
                .agent
                .initiate(
                    *role,
                    &session.input.symptoms,
                    &session.conversation.render(),
                    session.round,
                )
                .await;
            session.calls += 1;
            record(session, response?);
        }

        session.pending = collect_questions(&session.responses[first..]);
        if session.pending.is_empty() {
            session.phase = SessionPhase::Converged;
            session.status_message =
                Some(format!("Agents converged without questions in round {}", session.round));
        } else {
            session.phase = SessionPhase::RoutingQuestions;
            session.status_message = Some(format!(
                "Routing {} question(s) raised in round {}",
                session.pending.len(),
                session.round
            ));
        }
        Ok(())
    }

    async fn route_questions(&self, session: &mut DiagnosisSession) -> Result<()> {
        let batch = next_batch(&mut session.pending);

        for question in &batch {
            info!(
                session_id = %session.id,
                round = session.round,
                from = %question.from,
                to = %question.to,
                "Routing question"
            );
            let response = self
                .agent
                .reply(
                    question.to,
                    &session.input.symptoms,
                    &question.labelled(),
                    &session.conversation.render(),
                    session.round,
                )
                .await;
            session.calls += 1;
            record(session, response?);
        }

        if session.pending.is_empty() {
            session.phase = SessionPhase::Converged;
            session.status_message = Some(format!(
                "All questions answered in round {}",
                session.round
            ));
        } else if session.round >= self.config.max_iterations {
            warn!(
                session_id = %session.id,
                round = session.round,
                dropped = session.pending.len(),
                "Iteration cap reached with questions outstanding"
            );
            session.phase = SessionPhase::IterationCapReached;
            session.status_message = Some(format!(
                "Stopped after {} round(s) with {} question(s) unanswered",
                session.round,
                session.pending.len()
            ));
        } else {
            session.round += 1;
            session.status_message = Some(format!(
                "Answered {} question(s), {} left for round {}",
                batch.len(),
                session.pending.len(),
                session.round
            ));
        }
        Ok(())
    }
}

fn record(session: &mut DiagnosisSession, response: AgentResponse) {
    session.conversation.append_response(&response);
    session.responses.push(response);
}

/// Questions raised by the initial responses, in agent order and then in the
/// order each agent emitted them.
fn collect_questions(responses: &[AgentResponse]) -> Vec<PendingQuestion> {
    responses
        .iter()
        .flat_map(|response| {
            response.questions.iter().map(|question| PendingQuestion {
                from: response.agent_type,
                to: question.to,
                text: question.text.clone(),
            })
        })
        .collect()
}

/// Take the oldest queued question for each addressee, keeping queue order.
fn next_batch(pending: &mut Vec<PendingQuestion>) -> Vec<PendingQuestion> {
    let mut batch: Vec<PendingQuestion> = Vec::new();
    let mut rest = Vec::with_capacity(pending.len());
    for question in pending.drain(..) {
        if batch.iter().any(|q| q.to == question.to) {
            rest.push(question);
        } else {
            batch.push(question);
        }
    }
    *pending = rest;
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Questions, ResponseKind};

    fn asking(role: AgentRole, questions: &[(AgentRole, &str)]) -> AgentResponse {
        AgentResponse {
            agent_type: role,
            kind: ResponseKind::Initial,
            round: 1,
            response: "analysis".to_string(),
            confidence: 0.5,
            diseases: Vec::new(),
            questions: questions
                .iter()
                .map(|(to, text)| (*to, text.to_string()))
                .collect::<Questions>(),
            question: None,
        }
    }

    fn route(question: &PendingQuestion) -> (AgentRole, AgentRole, &str) {
        (question.from, question.to, question.text.as_str())
    }

    #[test]
    fn questions_queue_in_agent_then_emission_order() {
        let round = vec![
            asking(
                AgentRole::Geneticist,
                &[
                    (AgentRole::Clinician, "Family history?"),
                    (AgentRole::Radiologist, "Skeletal findings?"),
                ],
            ),
            asking(AgentRole::Radiologist, &[(AgentRole::Clinician, "Prior imaging?")]),
            asking(AgentRole::Clinician, &[]),
        ];

        let pending = collect_questions(&round);
        let routes: Vec<_> = pending.iter().map(route).collect();
        assert_eq!(
            routes,
            vec![
                (AgentRole::Geneticist, AgentRole::Clinician, "Family history?"),
                (AgentRole::Geneticist, AgentRole::Radiologist, "Skeletal findings?"),
                (AgentRole::Radiologist, AgentRole::Clinician, "Prior imaging?"),
            ]
        );
        assert_eq!(pending[2].labelled(), "From radiologist: Prior imaging?");
    }

    #[test]
    fn batch_answers_each_addressee_once() {
        let round = vec![
            asking(
                AgentRole::Geneticist,
                &[
                    (AgentRole::Clinician, "Family history?"),
                    (AgentRole::Radiologist, "Skeletal findings?"),
                ],
            ),
            asking(AgentRole::Radiologist, &[(AgentRole::Clinician, "Prior imaging?")]),
        ];
        let mut pending = collect_questions(&round);

        let first = next_batch(&mut pending);
        assert_eq!(
            first.iter().map(route).collect::<Vec<_>>(),
            vec![
                (AgentRole::Geneticist, AgentRole::Clinician, "Family history?"),
                (AgentRole::Geneticist, AgentRole::Radiologist, "Skeletal findings?"),
            ]
        );
        assert_eq!(pending.len(), 1);

        let second = next_batch(&mut pending);
        assert_eq!(
            second.iter().map(route).collect::<Vec<_>>(),
            vec![(AgentRole::Radiologist, AgentRole::Clinician, "Prior imaging?")]
        );
        assert!(pending.is_empty());
        assert!(next_batch(&mut pending).is_empty());
    }

    #[test]
    fn round_without_questions_has_nothing_pending() {
        let round = vec![asking(AgentRole::Geneticist, &[]), asking(AgentRole::Clinician, &[])];
        assert!(collect_questions(&round).is_empty());
    }
}
