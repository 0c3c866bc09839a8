use anyhow::{Context, Result};
use log::info;
use swarm_loadgen::transport::SocketIoConnector;
use swarm_loadgen::{LoadTestExecutor, RunConfig};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("🚀 Swarm load generator starting...");

    // Fail before any connection is attempted
    let config = RunConfig::from_env().context("invalid load configuration")?;

    info!("📡 Target endpoint {}", config.server_url);

    let executor = LoadTestExecutor::new(config, SocketIoConnector);
    let summary = executor.execute().await?;

    info!("[LOAD] DONE");
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
