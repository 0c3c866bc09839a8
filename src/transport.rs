use crate::connector::{ClientHandle, ConnectOptions, Connector};
use crate::socketio::{CodecError, Packet};
use crate::types::ClientEvent;
use futures::{SinkExt, StreamExt};
use log::debug;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, InvalidHeaderValue, COOKIE};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

const EVENT_BUFFER: usize = 1024;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("unsupported endpoint url {0:?}")]
    Url(String),
    #[error(transparent)]
    WebSocket(#[from] tungstenite::Error),
    #[error("invalid cookie header: {0}")]
    Header(#[from] InvalidHeaderValue),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("connection rejected: {0}")]
    Rejected(String),
    #[error("connection closed during handshake")]
    Closed,
    #[error("timeout")]
    Timeout,
}

enum Command {
    Emit {
        event: String,
        payload: Value,
        ack: Option<oneshot::Sender<Value>>,
    },
    Close,
}

enum SessionEnd {
    ClosedByClient,
    ServerDisconnect,
    Lost(String),
}

/// Socket.IO v4 client over the WebSocket transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketIoConnector;

#[derive(Debug, Clone)]
pub struct SocketIoHandle {
    commands: mpsc::UnboundedSender<Command>,
    connected: Arc<AtomicBool>,
}

impl Connector for SocketIoConnector {
    type Handle = SocketIoHandle;

    fn connect(&self, options: ConnectOptions) -> (SocketIoHandle, mpsc::Receiver<ClientEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let connected = Arc::new(AtomicBool::new(false));

        tokio::spawn(drive(options, command_rx, event_tx, connected.clone()));

        (
            SocketIoHandle {
                commands: command_tx,
                connected,
            },
            event_rx,
        )
    }
}

impl ClientHandle for SocketIoHandle {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn emit(&self, event: &str, payload: Value) {
        if self.is_connected() {
            let _ = self.commands.send(Command::Emit {
                event: event.to_string(),
                payload,
                ack: None,
            });
        }
    }

    fn emit_with_ack(&self, event: &str, payload: Value) -> oneshot::Receiver<Value> {
        let (tx, rx) = oneshot::channel();
        let _ = self.commands.send(Command::Emit {
            event: event.to_string(),
            payload,
            ack: Some(tx),
        });
        rx
    }

    fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }
}

/// Rewrites `http(s)://host[:port]/...` into the Engine.IO WebSocket endpoint.
pub fn engine_url(server_url: &str) -> Result<String, TransportError> {
    let (scheme, rest) = server_url
        .split_once("://")
        .ok_or_else(|| TransportError::Url(server_url.to_string()))?;

    let ws_scheme = match scheme {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        _ => return Err(TransportError::Url(server_url.to_string())),
    };

    let authority = rest.split(['/', '?']).next().unwrap_or_default();
    if authority.is_empty() {
        return Err(TransportError::Url(server_url.to_string()));
    }

    Ok(format!(
        "{ws_scheme}://{authority}/socket.io/?EIO=4&transport=websocket"
    ))
}

/// Connection lifecycle: connect, serve the session, retry within the
/// reconnect budget. The budget is restored after every successful connect.
async fn drive(
    options: ConnectOptions,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::Sender<ClientEvent>,
    connected: Arc<AtomicBool>,
) {
    let mut retries_used = 0u32;

    loop {
        let attempt = tokio::select! {
            result = timeout(options.connect_timeout, handshake(&options)) => result,
            _ = until_closed(&mut commands) => return,
        };

        match attempt {
            Ok(Ok(ws)) => {
                retries_used = 0;
                connected.store(true, Ordering::Release);
                let _ = events.send(ClientEvent::Connected).await;

                let end = session(ws, &mut commands, &events).await;
                connected.store(false, Ordering::Release);

                match end {
                    SessionEnd::ClosedByClient => {
                        let _ = events
                            .send(ClientEvent::Disconnected("io client disconnect".to_string()))
                            .await;
                        return;
                    }
                    SessionEnd::ServerDisconnect => {
                        let _ = events
                            .send(ClientEvent::Disconnected("io server disconnect".to_string()))
                            .await;
                        return;
                    }
                    SessionEnd::Lost(reason) => {
                        let _ = events.send(ClientEvent::Disconnected(reason)).await;
                    }
                }
            }
            Ok(Err(e)) => {
                let _ = events.send(ClientEvent::ConnectError(e.to_string())).await;
            }
            Err(_) => {
                let _ = events
                    .send(ClientEvent::ConnectError(TransportError::Timeout.to_string()))
                    .await;
            }
        }

        if events.is_closed() || retries_used >= options.reconnect.attempts {
            debug!("giving up on {} after {} reconnect attempts", options.url, retries_used);
            return;
        }
        retries_used += 1;

        tokio::select! {
            _ = sleep(options.reconnect.delay) => {}
            _ = until_closed(&mut commands) => return,
        }
    }
}

/// Resolves once the owner asks to close; emits queued while disconnected
/// are dropped.
async fn until_closed(commands: &mut mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = commands.recv().await {
        if let Command::Close = command {
            return;
        }
    }
}

async fn handshake(options: &ConnectOptions) -> Result<WsStream, TransportError> {
    let mut request = engine_url(&options.url)?.into_client_request()?;
    if let Some(cookie) = &options.cookie {
        request
            .headers_mut()
            .insert(COOKIE, HeaderValue::from_str(cookie)?);
    }

    let (mut ws, _) = connect_async(request).await?;

    loop {
        match next_packet(&mut ws).await? {
            Packet::Open(_) => break,
            Packet::Ping => ws.send(Message::Text(Packet::Pong.encode())).await?,
            _ => {}
        }
    }

    ws.send(Message::Text(Packet::Connect(None).encode())).await?;

    loop {
        match next_packet(&mut ws).await? {
            Packet::Connect(_) => return Ok(ws),
            Packet::ConnectError(body) => return Err(TransportError::Rejected(body.to_string())),
            Packet::Ping => ws.send(Message::Text(Packet::Pong.encode())).await?,
            _ => {}
        }
    }
}

async fn next_packet(ws: &mut WsStream) -> Result<Packet, TransportError> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return Ok(Packet::decode(&text)?),
            Some(Ok(Message::Close(_))) | None => return Err(TransportError::Closed),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

async fn session(
    ws: WsStream,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    events: &mpsc::Sender<ClientEvent>,
) -> SessionEnd {
    let (mut sink, mut stream) = ws.split();
    let mut pending_acks: HashMap<u64, oneshot::Sender<Value>> = HashMap::new();
    let mut next_ack_id = 0u64;

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Emit { event, payload, ack }) => {
                    let id = ack.map(|tx| {
                        let id = next_ack_id;
                        next_ack_id += 1;
                        pending_acks.insert(id, tx);
                        id
                    });
                    let frame = Packet::event(&event, payload, id).encode();
                    if let Err(e) = sink.send(Message::Text(frame)).await {
                        return SessionEnd::Lost(format!("transport error: {e}"));
                    }
                }
                Some(Command::Close) | None => {
                    let _ = sink.send(Message::Text(Packet::Disconnect.encode())).await;
                    let _ = sink.close().await;
                    return SessionEnd::ClosedByClient;
                }
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => match Packet::decode(&text) {
                    Ok(Packet::Ping) => {
                        if let Err(e) = sink.send(Message::Text(Packet::Pong.encode())).await {
                            return SessionEnd::Lost(format!("transport error: {e}"));
                        }
                    }
                    Ok(Packet::Event { name, payload, .. }) => {
                        if events.send(ClientEvent::Event { name, payload }).await.is_err() {
                            let _ = sink.close().await;
                            return SessionEnd::ClosedByClient;
                        }
                    }
                    Ok(Packet::Ack { id, payload }) => {
                        if let Some(tx) = pending_acks.remove(&id) {
                            let _ = tx.send(payload);
                        }
                    }
                    Ok(Packet::Disconnect) => return SessionEnd::ServerDisconnect,
                    Ok(Packet::Close) => return SessionEnd::Lost("transport close".to_string()),
                    Ok(_) => {}
                    Err(e) => debug!("dropping undecodable frame: {e}"),
                },
                Some(Ok(Message::Close(_))) | None => {
                    return SessionEnd::Lost("transport close".to_string());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return SessionEnd::Lost(format!("transport error: {e}")),
            }
        }
    }
}
