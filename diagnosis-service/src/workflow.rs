use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use diagnosis_flow::{
    DiagnosisRunner, FinalOutput, InMemorySessionStorage, Orchestrator, Predictor, RigPredictor,
    UserInput,
};
use tracing::info;

use crate::settings::Settings;

/// Runner backed by the OpenRouter predictor described by `settings`.
pub fn build_runner(settings: &Settings) -> anyhow::Result<DiagnosisRunner> {
    let predictor = RigPredictor::new(&settings.api_key, settings.model.clone());
    info!(model = predictor.model(), "Using OpenRouter predictor");
    runner_with(Arc::new(predictor), settings)
}

pub(crate) fn runner_with(
    predictor: Arc<dyn Predictor>,
    settings: &Settings,
) -> anyhow::Result<DiagnosisRunner> {
    let orchestrator = Orchestrator::new(predictor, settings.orchestrator.clone())
        .context("invalid orchestrator configuration")?;
    Ok(DiagnosisRunner::new(
        Arc::new(orchestrator),
        Arc::new(InMemorySessionStorage::new()),
    ))
}

/// Read a `UserInput` JSON document from `path`, or from stdin when absent.
pub fn read_input(path: Option<&Path>) -> anyhow::Result<UserInput> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("failed to read stdin")?;
            raw
        }
    };
    let input: UserInput = serde_json::from_str(&raw).context("input is not a valid UserInput")?;
    input.validate()?;
    Ok(input)
}

/// Run one diagnostic session to completion.
pub async fn run_diagnosis(runner: &DiagnosisRunner, input: UserInput) -> anyhow::Result<FinalOutput> {
    let session_id = runner.start(input).await?;
    info!(session_id = %session_id, "Diagnosis session started");

    let output = runner.run_to_completion(&session_id).await?;
    info!(
        session_id = %session_id,
        rounds = output.rounds,
        termination = ?output.termination,
        top_diseases = ?output.top_diseases,
        "Diagnosis session finished"
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use diagnosis_flow::{DiagnosisError, Fields, OrchestratorConfig, Signature, Termination};
    use serde_json::json;
    use std::io::Write;

    struct FixedPredictor;

    #[async_trait]
    impl Predictor for FixedPredictor {
        async fn predict(&self, signature: &Signature, _inputs: Fields) -> diagnosis_flow::Result<Fields> {
            let text_key = if signature.has_output("reply") { "reply" } else { "response" };
            let mut outputs = Fields::new();
            outputs.insert(text_key.to_string(), json!("Findings fit a connective tissue disorder"));
            outputs.insert("confidence".to_string(), json!("80%"));
            outputs.insert("diseases".to_string(), json!("1. Marfan syndrome\n2. Ehlers-Danlos syndrome"));
            outputs.insert("questions".to_string(), json!("none"));
            Ok(outputs)
        }
    }

    fn settings() -> Settings {
        Settings {
            orchestrator: OrchestratorConfig::default().with_top_k(1),
            api_key: "sk-test".to_string(),
            model: "test-model".to_string(),
        }
    }

    #[tokio::test]
    async fn runs_a_session_from_a_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"symptoms": ["tall stature", "lens dislocation"], "age": 19}}"#
        )
        .unwrap();

        let input = read_input(Some(file.path())).unwrap();
        assert_eq!(input.age, Some(19));

        let runner = runner_with(Arc::new(FixedPredictor), &settings()).unwrap();
        let output = run_diagnosis(&runner, input).await.unwrap();

        assert_eq!(output.termination, Termination::Converged);
        assert_eq!(output.top_diseases, vec!["Marfan syndrome"]);
        assert!((output.ranked[0].score - 2.4).abs() < 1e-9);
    }

    #[test]
    fn input_without_symptoms_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"symptoms": []}}"#).unwrap();

        let err = read_input(Some(file.path())).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DiagnosisError>(),
            Some(DiagnosisError::InvalidInput(_))
        ));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = read_input(Some(Path::new("/nonexistent/case.json"))).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
