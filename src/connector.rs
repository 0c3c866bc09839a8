use crate::config::ReconnectPolicy;
use crate::types::ClientEvent;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Everything a connector needs to open one subscriber connection.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub url: String,
    pub cookie: Option<String>,
    pub connect_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

/// Opens streaming connections. `connect` must not block: the connection is
/// driven in the background and reports progress on the returned channel.
/// The channel is bounded so a slow consumer pushes back on the socket reader.
pub trait Connector: Send + Sync + 'static {
    type Handle: ClientHandle;

    fn connect(&self, options: ConnectOptions) -> (Self::Handle, mpsc::Receiver<ClientEvent>);
}

/// Sending side of one streaming connection.
pub trait ClientHandle: Clone + Send + Sync + 'static {
    fn is_connected(&self) -> bool;

    /// Fire-and-forget send. Dropped silently while disconnected.
    fn emit(&self, event: &str, payload: Value);

    /// Send and wait for the peer's acknowledgement. The receiver errors if
    /// the connection goes away before an ack arrives.
    fn emit_with_ack(&self, event: &str, payload: Value) -> oneshot::Receiver<Value>;

    fn close(&self);
}
