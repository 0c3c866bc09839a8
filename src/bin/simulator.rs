use anyhow::{Context, Result};
use log::info;
use swarm_loadgen::simulator::{self, AmqpPublisher};
use swarm_loadgen::SimulatorConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = SimulatorConfig::from_env().context("invalid simulator configuration")?;

    info!("📡 Connecting to AMQP broker at {}", config.amqp_url);
    let publisher = AmqpPublisher::connect(&config.amqp_url, &config.channel).await?;
    info!("✅ Connected, publishing to exchange {}", config.channel);

    tokio::select! {
        _ = simulator::run(&publisher, &config) => {}
        _ = tokio::signal::ctrl_c() => info!("🛑 Simulator stopped"),
    }

    Ok(())
}
