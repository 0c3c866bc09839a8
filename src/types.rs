use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Notifications a streaming connection reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected,
    ConnectError(String),
    Event { name: String, payload: Value },
    Disconnected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Failed,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(rename = "runId")]
    pub run_id: Uuid,
    pub connected: u64,
    #[serde(rename = "connectFail")]
    pub connect_fail: u64,
    #[serde(rename = "eventsTotal")]
    pub events_total: u64,
    #[serde(rename = "latencyCount")]
    pub latency_count: u64,
    #[serde(rename = "avgLagMs")]
    pub avg_lag_ms: Option<i64>,
    #[serde(rename = "maxLagMs")]
    pub max_lag_ms: i64,
    #[serde(rename = "tsMiss")]
    pub ts_miss: u64,
    #[serde(rename = "clientsCreated")]
    pub clients_created: usize,
    #[serde(rename = "elapsedSeconds")]
    pub elapsed_seconds: f64,
}

/// Synthetic device reading published by the traffic simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryPayload {
    #[serde(rename = "companyId")]
    pub company_id: u32,
    #[serde(rename = "deviceId")]
    pub device_id: u32,
    #[serde(rename = "equipmentId")]
    pub equipment_id: u32,
    pub ts: i64,
    #[serde(rename = "msgId")]
    pub msg_id: String,
    /// Sensor code → reading.
    pub value: BTreeMap<u32, u32>,
}
