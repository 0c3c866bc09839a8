use crate::config::SimulatorConfig;
use crate::types::TelemetryPayload;
use anyhow::Result;
use chrono::Utc;
use lapin::{
    options::*, types::FieldTable, BasicProperties, Channel, Connection, ConnectionProperties,
    ExchangeKind,
};
use log::{error, info};
use rand::Rng;
use std::future::Future;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

pub const SENSOR_READING_MAX: u32 = 50_000;

/// Destination for serialized telemetry.
pub trait Publish: Send + Sync {
    fn publish(&self, body: Vec<u8>) -> impl Future<Output = Result<()>> + Send;
}

/// Publishes onto a fanout exchange so every bound queue sees each message.
pub struct AmqpPublisher {
    _connection: Connection,
    channel: Channel,
    exchange: String,
}

impl AmqpPublisher {
    pub async fn connect(url: &str, exchange: &str) -> Result<Self> {
        let connection = Connection::connect(url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        channel
            .exchange_declare(
                exchange,
                ExchangeKind::Fanout,
                ExchangeDeclareOptions::default(),
                FieldTable::default(),
            )
            .await?;

        Ok(Self {
            _connection: connection,
            channel,
            exchange: exchange.to_string(),
        })
    }
}

impl Publish for AmqpPublisher {
    async fn publish(&self, body: Vec<u8>) -> Result<()> {
        self.channel
            .basic_publish(
                &self.exchange,
                "",
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default(),
            )
            .await?;
        Ok(())
    }
}

pub fn build_payload(
    device_id: u32,
    ts: i64,
    sensor_code_max: u32,
    rng: &mut impl Rng,
) -> TelemetryPayload {
    TelemetryPayload {
        company_id: 1,
        device_id,
        equipment_id: device_id,
        ts,
        msg_id: format!("{device_id}-{ts}"),
        value: (1..=sensor_code_max)
            .map(|code| (code, rng.random_range(0..SENSOR_READING_MAX)))
            .collect(),
    }
}

/// Publishes one message per device. Stops at the first failure; the next
/// period starts a fresh round.
pub async fn publish_round<P: Publish>(publisher: &P, config: &SimulatorConfig) -> Result<usize> {
    let bodies = {
        let mut rng = rand::rng();
        let ts = Utc::now().timestamp_millis();
        (1..=config.device_count)
            .map(|device_id| {
                serde_json::to_vec(&build_payload(device_id, ts, config.sensor_code_max, &mut rng))
            })
            .collect::<serde_json::Result<Vec<_>>>()?
    };

    let mut published = 0;
    for body in bodies {
        publisher.publish(body).await?;
        published += 1;
    }
    Ok(published)
}

/// Publishes a round every `config.period`, forever. Failures are logged and
/// never break the cadence.
pub async fn run<P: Publish>(publisher: &P, config: &SimulatorConfig) {
    info!(
        "[SIM] start channel={} period={}ms devices={} sensorCodes={} perSecondMessages={}",
        config.channel,
        config.period.as_millis(),
        config.device_count,
        config.sensor_code_max,
        config.messages_per_second()
    );

    let mut ticker = interval_at(Instant::now() + config.period, config.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if let Err(e) = publish_round(publisher, config).await {
            error!("[SIM] publish error: {:#}", e);
        }
    }
}
