#![allow(dead_code)]

use chrono::Utc;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use swarm_loadgen::config::{ReconnectPolicy, RunConfig};
use swarm_loadgen::connector::{ClientHandle, ConnectOptions, Connector};
use swarm_loadgen::types::ClientEvent;
use tokio::sync::{mpsc, oneshot};

pub fn run_config(clients: usize, ramp_per_sec: usize, run_secs: u64) -> RunConfig {
    RunConfig {
        server_url: "http://mock.invalid:5005".to_string(),
        subscribe_event: "widget:subscribe".to_string(),
        clients,
        ramp_per_sec,
        run_duration: Duration::from_secs(run_secs),
        ping_interval: None,
        subscription_sets: vec![vec![json!(1), json!(2), json!(5)]],
        cookie: None,
        connect_timeout: Duration::from_secs(5),
        reconnect: ReconnectPolicy {
            attempts: 3,
            delay: Duration::from_secs(1),
        },
        ack_timeout: Duration::from_secs(5),
    }
}

/// What a mock connection does as soon as it is opened.
#[derive(Debug, Clone)]
pub enum Script {
    /// Connect, then emit one event per lag with `ts = now - lag`.
    Connect { lags_ms: Vec<i64> },
    /// Connect, then keep emitting fresh events every `every` until the
    /// client stops listening.
    Stream { every: Duration },
    /// Report a connect error and never connect.
    Refuse,
}

/// How a mock connection answers `emit_with_ack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckMode {
    Reply,
    /// Drops the ack sender, as a connection lost before the server answered.
    Drop,
    /// Keeps the sender alive and never answers.
    Silent,
}

#[derive(Clone)]
pub struct MockHandle {
    connected: Arc<AtomicBool>,
    events: mpsc::Sender<ClientEvent>,
    ack: AckMode,
    unanswered: Arc<Mutex<Vec<oneshot::Sender<Value>>>>,
    pub closes: Arc<AtomicUsize>,
    pub emitted: Arc<Mutex<Vec<(String, Value)>>>,
}

impl MockHandle {
    pub fn emitted_named(&self, name: &str) -> Vec<Value> {
        self.emitted
            .lock()
            .unwrap()
            .iter()
            .filter(|(event, _)| event == name)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// Simulates the server dropping the connection.
    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.events
            .try_send(ClientEvent::Disconnected("transport close".to_string()))
            .unwrap();
    }

    /// Simulates the transport getting the session back after a drop.
    pub fn reconnect(&self) {
        self.connected.store(true, Ordering::SeqCst);
        self.events.try_send(ClientEvent::Connected).unwrap();
    }
}

fn widget_update(lag_ms: i64) -> ClientEvent {
    ClientEvent::Event {
        name: "widget:update".to_string(),
        payload: json!({ "ts": Utc::now().timestamp_millis() - lag_ms, "deviceId": 1 }),
    }
}

impl ClientHandle for MockHandle {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn emit(&self, event: &str, payload: Value) {
        if self.is_connected() {
            self.emitted.lock().unwrap().push((event.to_string(), payload));
        }
    }

    fn emit_with_ack(&self, event: &str, payload: Value) -> oneshot::Receiver<Value> {
        self.emitted.lock().unwrap().push((event.to_string(), payload));
        let (tx, rx) = oneshot::channel();
        match self.ack {
            AckMode::Reply => {
                let _ = tx.send(json!({ "ok": true }));
            }
            AckMode::Drop => drop(tx),
            AckMode::Silent => self.unanswered.lock().unwrap().push(tx),
        }
        rx
    }

    fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct MockConnector {
    script: Script,
    ack: AckMode,
    pub handles: Arc<Mutex<Vec<MockHandle>>>,
    pub options: Arc<Mutex<Vec<ConnectOptions>>>,
}

impl MockConnector {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            ack: AckMode::Reply,
            handles: Arc::default(),
            options: Arc::default(),
        }
    }

    pub fn with_ack(mut self, ack: AckMode) -> Self {
        self.ack = ack;
        self
    }

    pub fn connects(&self) -> usize {
        self.handles.lock().unwrap().len()
    }

    pub fn handle(&self, index: usize) -> MockHandle {
        self.handles.lock().unwrap()[index].clone()
    }

    pub fn all_handles(&self) -> Vec<MockHandle> {
        self.handles.lock().unwrap().clone()
    }
}

impl Connector for MockConnector {
    type Handle = MockHandle;

    fn connect(&self, options: ConnectOptions) -> (MockHandle, mpsc::Receiver<ClientEvent>) {
        let (tx, rx) = mpsc::channel(64);
        let handle = MockHandle {
            connected: Arc::new(AtomicBool::new(false)),
            events: tx.clone(),
            ack: self.ack,
            unanswered: Arc::default(),
            closes: Arc::default(),
            emitted: Arc::default(),
        };

        match &self.script {
            Script::Connect { lags_ms } => {
                handle.connected.store(true, Ordering::SeqCst);
                tx.try_send(ClientEvent::Connected).unwrap();
                for lag in lags_ms {
                    tx.try_send(widget_update(*lag)).unwrap();
                }
            }
            Script::Stream { every } => {
                handle.connected.store(true, Ordering::SeqCst);
                tx.try_send(ClientEvent::Connected).unwrap();
                let (tx, every) = (tx.clone(), *every);
                tokio::spawn(async move {
                    loop {
                        tokio::time::sleep(every).await;
                        if tx.send(widget_update(3)).await.is_err() {
                            break;
                        }
                    }
                });
            }
            Script::Refuse => {
                tx.try_send(ClientEvent::ConnectError("connection refused".to_string()))
                    .unwrap();
            }
        }

        self.options.lock().unwrap().push(options);
        self.handles.lock().unwrap().push(handle.clone());
        (handle, rx)
    }
}
