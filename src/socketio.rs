//! Text framing for Socket.IO v4 over the Engine.IO WebSocket transport.
//!
//! Only the default namespace and non-binary packets are supported, which is
//! all a subscriber swarm needs.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    #[error("empty frame")]
    Empty,
    #[error("unknown packet type {0:?}")]
    UnknownType(String),
    #[error("binary packets are not supported")]
    Binary,
    #[error("malformed packet body: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Engine.IO handshake carrying `sid`, `pingInterval`, ...
    Open(Value),
    Close,
    Ping,
    Pong,
    Noop,
    Connect(Option<Value>),
    Disconnect,
    /// An event; `payload` is the first argument after the name.
    Event {
        id: Option<u64>,
        name: String,
        payload: Value,
    },
    Ack {
        id: u64,
        payload: Value,
    },
    ConnectError(Value),
}

impl Packet {
    pub fn event(name: &str, payload: Value, id: Option<u64>) -> Self {
        Packet::Event {
            id,
            name: name.to_string(),
            payload,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Packet::Open(body) => format!("0{body}"),
            Packet::Close => "1".to_string(),
            Packet::Ping => "2".to_string(),
            Packet::Pong => "3".to_string(),
            Packet::Noop => "6".to_string(),
            Packet::Connect(None) => "40".to_string(),
            Packet::Connect(Some(auth)) => format!("40{auth}"),
            Packet::Disconnect => "41".to_string(),
            Packet::Event { id, name, payload } => {
                let args = Value::Array(vec![Value::String(name.clone()), payload.clone()]);
                match id {
                    Some(id) => format!("42{id}{args}"),
                    None => format!("42{args}"),
                }
            }
            Packet::Ack { id, payload } => format!("43{id}{}", Value::Array(vec![payload.clone()])),
            Packet::ConnectError(body) => format!("44{body}"),
        }
    }

    pub fn decode(frame: &str) -> Result<Self, CodecError> {
        let mut chars = frame.chars();
        let engine_type = chars.next().ok_or(CodecError::Empty)?;
        let rest = chars.as_str();

        match engine_type {
            '0' => Ok(Packet::Open(parse_json(rest)?)),
            '1' => Ok(Packet::Close),
            '2' => Ok(Packet::Ping),
            '3' => Ok(Packet::Pong),
            '6' => Ok(Packet::Noop),
            '4' => decode_message(rest),
            other => Err(CodecError::UnknownType(other.to_string())),
        }
    }
}

fn decode_message(body: &str) -> Result<Packet, CodecError> {
    let mut chars = body.chars();
    let socket_type = chars.next().ok_or(CodecError::Empty)?;
    let rest = skip_namespace(chars.as_str());

    match socket_type {
        '0' if rest.is_empty() => Ok(Packet::Connect(None)),
        '0' => Ok(Packet::Connect(Some(parse_json(rest)?))),
        '1' => Ok(Packet::Disconnect),
        '2' => {
            let (id, rest) = split_ack_id(rest);
            let mut args = parse_args(rest)?.into_iter();
            let name = match args.next() {
                Some(Value::String(name)) => name,
                other => return Err(CodecError::Malformed(format!("event name {other:?}"))),
            };
            Ok(Packet::Event {
                id,
                name,
                payload: args.next().unwrap_or(Value::Null),
            })
        }
        '3' => {
            let (id, rest) = split_ack_id(rest);
            let id = id.ok_or_else(|| CodecError::Malformed("ack without id".to_string()))?;
            Ok(Packet::Ack {
                id,
                payload: parse_args(rest)?.into_iter().next().unwrap_or(Value::Null),
            })
        }
        '4' => Ok(Packet::ConnectError(parse_json(rest)?)),
        '5' | '6' => Err(CodecError::Binary),
        other => Err(CodecError::UnknownType(format!("4{other}"))),
    }
}

/// Drops a `/namespace,` prefix; the harness only talks to the default one.
fn skip_namespace(body: &str) -> &str {
    if body.starts_with('/') {
        body.split_once(',').map_or("", |(_, rest)| rest)
    } else {
        body
    }
}

fn split_ack_id(body: &str) -> (Option<u64>, &str) {
    let digits = body.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return (None, body);
    }
    let (id, rest) = body.split_at(digits);
    (id.parse().ok(), rest)
}

fn parse_args(body: &str) -> Result<Vec<Value>, CodecError> {
    match parse_json(body)? {
        Value::Array(args) => Ok(args),
        other => Err(CodecError::Malformed(format!("expected argument array, got {other}"))),
    }
}

fn parse_json(body: &str) -> Result<Value, CodecError> {
    serde_json::from_str(body).map_err(|e| CodecError::Malformed(e.to_string()))
}
