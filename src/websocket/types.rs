//! WebSocket message and error types
//!
//! Framework-native message/error types over axum's `ws` module, so the
//! rest of the crate (and users) never touch the transport library
//! directly.

use axum::extract::ws;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for socket operations
pub type SocketResult<T> = Result<T, SocketError>;

/// A WebSocket frame as seen by application code
#[derive(Debug, Clone, PartialEq)]
pub enum SocketMessage {
    /// Text frame
    Text(String),
    /// Binary frame
    Binary(Vec<u8>),
    /// Ping frame (answered automatically by the transport)
    Ping(Vec<u8>),
    /// Pong frame
    Pong(Vec<u8>),
    /// Close frame
    Close(Option<CloseFrame>),
}

/// Close code and reason
#[derive(Debug, Clone, PartialEq)]
pub struct CloseFrame {
    pub code: u16,
    pub reason: String,
}

impl SocketMessage {
    pub fn text<T: Into<String>>(content: T) -> Self {
        Self::Text(content.into())
    }

    pub fn binary<T: Into<Vec<u8>>>(data: T) -> Self {
        Self::Binary(data.into())
    }

    pub fn is_close(&self) -> bool {
        matches!(self, Self::Close(_))
    }

    pub fn is_control(&self) -> bool {
        matches!(self, Self::Ping(_) | Self::Pong(_) | Self::Close(_))
    }

    /// Text content, when this is a text frame
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<ws::Message> for SocketMessage {
    fn from(msg: ws::Message) -> Self {
        match msg {
            ws::Message::Text(text) => Self::Text(text),
            ws::Message::Binary(data) => Self::Binary(data),
            ws::Message::Ping(data) => Self::Ping(data),
            ws::Message::Pong(data) => Self::Pong(data),
            ws::Message::Close(frame) => Self::Close(frame.map(|f| CloseFrame {
                code: f.code,
                reason: f.reason.into_owned(),
            })),
        }
    }
}

impl From<SocketMessage> for ws::Message {
    fn from(msg: SocketMessage) -> Self {
        match msg {
            SocketMessage::Text(text) => ws::Message::Text(text),
            SocketMessage::Binary(data) => ws::Message::Binary(data),
            SocketMessage::Ping(data) => ws::Message::Ping(data),
            SocketMessage::Pong(data) => ws::Message::Pong(data),
            SocketMessage::Close(frame) => ws::Message::Close(frame.map(|f| ws::CloseFrame {
                code: f.code,
                reason: f.reason.into(),
            })),
        }
    }
}

/// Envelope for typed events: a JSON object with exactly the keys
/// `type` and `data`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub event: String,
    pub data: serde_json::Value,
}

impl EventEnvelope {
    pub fn new<E: Into<String>>(event: E, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Serialize into a text frame
    pub fn into_message(self) -> SocketResult<SocketMessage> {
        Ok(SocketMessage::Text(serde_json::to_string(&self)?))
    }
}

/// Errors raised by socket operations
#[derive(Error, Debug)]
pub enum SocketError {
    /// Any operation on a disposed connection
    #[error("cannot add events to closed socket")]
    Closed,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Upgrade-time protocol limits
#[derive(Debug, Clone, Copy)]
pub struct SocketConfig {
    /// Maximum message size in bytes
    pub max_message_size: Option<usize>,
    /// Maximum frame size in bytes
    pub max_frame_size: Option<usize>,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            max_message_size: Some(64 * 1024 * 1024),
            max_frame_size: Some(16 * 1024 * 1024),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_round_trip() {
        let envelope = EventEnvelope::new("greet", json!("hi"));
        let message = envelope.clone().into_message().unwrap();
        let text = message.as_text().unwrap();
        assert_eq!(
            serde_json::from_str::<EventEnvelope>(text).unwrap(),
            envelope
        );
    }

    #[test]
    fn envelope_rejects_extra_keys() {
        let result =
            serde_json::from_str::<EventEnvelope>(r#"{"type":"a","data":1,"extra":true}"#);
        assert!(result.is_err());
    }

    #[test]
    fn envelope_requires_both_keys() {
        assert!(serde_json::from_str::<EventEnvelope>(r#"{"type":"a"}"#).is_err());
        assert!(serde_json::from_str::<EventEnvelope>(r#"{"data":1}"#).is_err());
    }

    #[test]
    fn close_detection() {
        assert!(SocketMessage::Close(None).is_close());
        assert!(!SocketMessage::text("bye").is_close());
    }
}
