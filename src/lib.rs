pub mod client;
pub mod config;
pub mod connector;
pub mod payload;
pub mod ramp;
pub mod simulator;
pub mod socketio;
pub mod stats;
pub mod timer;
pub mod transport;
pub mod types;

pub use config::{ConfigError, RunConfig, SimulatorConfig};
pub use load_test::LoadTestExecutor;
pub use stats::Metrics;
pub use types::RunSummary;
