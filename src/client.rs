use crate::config::{RunConfig, SubscriptionSet};
use crate::connector::{ClientHandle, ConnectOptions, Connector};
use crate::stats::Metrics;
use crate::timer::PeriodicTask;
use crate::types::{ClientEvent, ConnectionState};
use chrono::Utc;
use log::{debug, info, warn};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval_at, timeout, Instant};

pub const KEEPALIVE_EVENT: &str = "ping";

/// State touched by both the event pump and the owner at shutdown.
#[derive(Debug)]
struct Shared {
    connection: ConnectionState,
    keepalive: PeriodicTask,
    subscribe_ack: PeriodicTask,
}

struct Pump<H> {
    index: usize,
    subscription: SubscriptionSet,
    subscribe_event: String,
    ping_interval: Option<Duration>,
    ack_timeout: Duration,
    handle: H,
    shared: Arc<Mutex<Shared>>,
    metrics: Arc<Metrics>,
}

/// One subscriber in the swarm.
///
/// Owns its connection handle, its keepalive timer and the task pumping its
/// inbound events into [`Metrics`]. All three are released by
/// [`SimulatedClient::shutdown`].
pub struct SimulatedClient<H: ClientHandle> {
    index: usize,
    subscription: SubscriptionSet,
    handle: H,
    shared: Arc<Mutex<Shared>>,
    pump: PeriodicTask,
    closed: bool,
}

impl<H: ClientHandle> SimulatedClient<H> {
    pub fn spawn<C>(index: usize, config: &RunConfig, connector: &C, metrics: Arc<Metrics>) -> Self
    where
        C: Connector<Handle = H>,
    {
        let subscription = config.subscription_for(index).clone();
        let (handle, events) = connector.connect(ConnectOptions {
            url: config.server_url.clone(),
            cookie: config.cookie.clone(),
            connect_timeout: config.connect_timeout,
            reconnect: config.reconnect,
        });

        let shared = Arc::new(Mutex::new(Shared {
            connection: ConnectionState::Connecting,
            keepalive: PeriodicTask::idle(),
            subscribe_ack: PeriodicTask::idle(),
        }));

        let pump = Pump {
            index,
            subscription: subscription.clone(),
            subscribe_event: config.subscribe_event.clone(),
            ping_interval: config.ping_interval,
            ack_timeout: config.ack_timeout,
            handle: handle.clone(),
            shared: shared.clone(),
            metrics,
        };

        Self {
            index,
            subscription,
            handle,
            shared,
            pump: PeriodicTask::new(tokio::spawn(pump.run(events))),
            closed: false,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn subscription(&self) -> &SubscriptionSet {
        &self.subscription
    }

    pub async fn state(&self) -> ConnectionState {
        self.shared.lock().await.connection
    }

    pub async fn keepalive_active(&self) -> bool {
        self.shared.lock().await.keepalive.is_active()
    }

    /// Stops the event pump, cancels timers and closes the connection.
    /// Once this returns the client records nothing more into [`Metrics`].
    /// Returns `false` when the client was already shut down.
    pub async fn shutdown(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        self.pump.stop().await;

        {
            let mut shared = self.shared.lock().await;
            shared.keepalive.cancel();
            shared.subscribe_ack.cancel();
            shared.connection = ConnectionState::Closed;
        }

        self.handle.close();
        true
    }
}

impl<H: ClientHandle> Pump<H> {
    async fn run(self, mut events: mpsc::Receiver<ClientEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                ClientEvent::Event { payload, .. } => {
                    self.metrics
                        .record_event(&payload, Utc::now().timestamp_millis());
                }
                ClientEvent::Connected => self.on_connect().await,
                ClientEvent::ConnectError(reason) => {
                    self.metrics.record_connect_failure();
                    warn!("[connect_error] #{} {}", self.index, reason);
                    self.shared.lock().await.connection = ConnectionState::Failed;
                }
                ClientEvent::Disconnected(reason) => {
                    debug!("[disconnect] #{} {}", self.index, reason);
                    let mut shared = self.shared.lock().await;
                    shared.keepalive.cancel();
                    shared.connection = ConnectionState::Closed;
                }
            }
        }
    }

    async fn on_connect(&self) {
        self.metrics.record_connect();
        let subscription = Value::Array(self.subscription.clone());
        info!("[subscribing] #{} {}", self.index, subscription);

        let ack = self
            .handle
            .emit_with_ack(&self.subscribe_event, subscription.clone());
        let (index, ack_timeout) = (self.index, self.ack_timeout);
        let ack_wait = tokio::spawn(async move {
            match timeout(ack_timeout, ack).await {
                Ok(Ok(Value::Null)) => {}
                Ok(Ok(reply)) => info!("[subscribe ack] {} {}", subscription, reply),
                Ok(Err(_)) => warn!("[subscribe ack] #{} connection dropped before ack", index),
                Err(_) => warn!("[subscribe ack] #{} no ack within {:?}", index, ack_timeout),
            }
        });

        let mut shared = self.shared.lock().await;
        shared.connection = ConnectionState::Connected;
        shared.subscribe_ack = PeriodicTask::new(ack_wait);
        if let Some(period) = self.ping_interval {
            if !shared.keepalive.is_active() {
                shared.keepalive = start_keepalive(self.handle.clone(), period);
            }
        }
    }
}

fn start_keepalive<H: ClientHandle>(handle: H, period: Duration) -> PeriodicTask {
    PeriodicTask::new(tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        loop {
            ticker.tick().await;
            if handle.is_connected() {
                handle.emit(KEEPALIVE_EVENT, json!({ "t": Utc::now().timestamp_millis() }));
            }
        }
    }))
}
