pub mod settings;
pub mod telemetry;
pub mod workflow;

pub use settings::Settings;
pub use telemetry::init_tracing;
pub use workflow::{build_runner, read_input, run_diagnosis};
