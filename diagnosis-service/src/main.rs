use std::path::PathBuf;

use diagnosis_service::{Settings, build_runner, init_tracing, read_input, run_diagnosis};
use tracing::error;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;
    init_tracing();

    let path = std::env::args().nth(1).map(PathBuf::from);
    let input = read_input(path.as_deref())?;
    let runner = build_runner(&settings)?;

    match run_diagnosis(&runner, input).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Diagnosis unavailable");
            Err(e)
        }
    }
}
