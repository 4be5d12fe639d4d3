//! Protocol message definitions
//!
//! Defines the JSON frames exchanged between browser clients and the relay.
//! Every frame carries a snake_case `type` discriminator.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::relay::ConnectionId;

/// Maximum room identifier length in bytes
pub const MAX_ROOM_ID_LENGTH: usize = 256;

/// Maximum caption text length (16KB)
pub const MAX_CAPTION_LENGTH: usize = 16 * 1024;

/// Literal signal target that fans out to the sender's room
pub const BROADCAST_TARGET: &str = "broadcast";

// ============================================================================
// Error Types
// ============================================================================

/// Protocol-related errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

// ============================================================================
// Client Messages
// ============================================================================

/// Where a `signal` frame should be delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalTarget {
    /// Every other member of the sender's room
    Broadcast,
    /// One specific connection, named by its id text
    Peer(String),
}

impl SignalTarget {
    /// Resolve a peer target to a connection id
    ///
    /// Returns `None` for broadcast targets and for text that is not a
    /// well-formed connection id.
    pub fn peer_id(&self) -> Option<ConnectionId> {
        match self {
            SignalTarget::Broadcast => None,
            SignalTarget::Peer(raw) => raw.parse().ok(),
        }
    }
}

impl Serialize for SignalTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SignalTarget::Broadcast => serializer.serialize_str(BROADCAST_TARGET),
            SignalTarget::Peer(id) => serializer.serialize_str(id),
        }
    }
}

impl<'de> Deserialize<'de> for SignalTarget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == BROADCAST_TARGET {
            Ok(SignalTarget::Broadcast)
        } else {
            Ok(SignalTarget::Peer(raw))
        }
    }
}

/// Messages sent from a browser client to the relay
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Enter a room, creating it if nobody is in it yet
    Join {
        #[serde(rename = "roomId")]
        room_id: String,
    },

    /// Caption text for the other members of a room
    Caption {
        #[serde(rename = "roomId")]
        room_id: String,
        text: String,
        /// Client-supplied display timestamp, passed through verbatim
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },

    /// WebRTC negotiation payload (offer, answer or ICE candidate)
    Signal {
        target: SignalTarget,
        /// Opaque to the relay; forwarded without inspection
        signal: Value,
    },
}

impl ClientMessage {
    /// Parse and validate a client frame from JSON text
    pub fn from_json(json: &str) -> ProtocolResult<Self> {
        let message: Self = serde_json::from_str(json)?;
        message.validate()?;
        Ok(message)
    }

    /// Validate message contents
    pub fn validate(&self) -> ProtocolResult<()> {
        match self {
            ClientMessage::Join { room_id } => validate_room_id(room_id),

            ClientMessage::Caption { room_id, text, .. } => {
                validate_room_id(room_id)?;
                if text.len() > MAX_CAPTION_LENGTH {
                    return Err(ProtocolError::ValidationError(format!(
                        "caption text exceeds maximum length of {} bytes",
                        MAX_CAPTION_LENGTH
                    )));
                }
                Ok(())
            }

            ClientMessage::Signal { signal, .. } => {
                if !signal.is_object() {
                    return Err(ProtocolError::ValidationError(
                        "signal payload must be a JSON object".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Create a Join message
    pub fn join(room_id: impl Into<String>) -> Self {
        ClientMessage::Join {
            room_id: room_id.into(),
        }
    }

    /// Create a Caption message without a timestamp
    pub fn caption(room_id: impl Into<String>, text: impl Into<String>) -> Self {
        ClientMessage::Caption {
            room_id: room_id.into(),
            text: text.into(),
            timestamp: None,
        }
    }

    /// Create a Signal message
    pub fn signal(target: SignalTarget, signal: Value) -> Self {
        ClientMessage::Signal { target, signal }
    }

    /// Frame type name, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Join { .. } => "join",
            ClientMessage::Caption { .. } => "caption",
            ClientMessage::Signal { .. } => "signal",
        }
    }
}

fn validate_room_id(room_id: &str) -> ProtocolResult<()> {
    if room_id.is_empty() {
        return Err(ProtocolError::ValidationError(
            "roomId cannot be empty".to_string(),
        ));
    }
    if room_id.len() > MAX_ROOM_ID_LENGTH {
        return Err(ProtocolError::ValidationError(format!(
            "roomId exceeds maximum length of {} bytes",
            MAX_ROOM_ID_LENGTH
        )));
    }
    Ok(())
}

// ============================================================================
// Server Messages
// ============================================================================

/// Messages sent from the relay to browser clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A peer joined the recipient's room
    UserConnected {
        #[serde(rename = "userId")]
        user_id: ConnectionId,
    },

    /// A peer left the recipient's room
    UserDisconnected {
        #[serde(rename = "userId")]
        user_id: ConnectionId,
    },

    /// Caption relayed from a peer
    Caption {
        text: String,
        timestamp: String,
        sender: ConnectionId,
    },

    /// Negotiation payload relayed from a peer
    Signal { signal: Value, sender: ConnectionId },
}

impl ServerMessage {
    /// Create a UserConnected message
    pub fn user_connected(user_id: ConnectionId) -> Self {
        ServerMessage::UserConnected { user_id }
    }

    /// Create a UserDisconnected message
    pub fn user_disconnected(user_id: ConnectionId) -> Self {
        ServerMessage::UserDisconnected { user_id }
    }

    /// Create a Caption message, stamping the current time when the
    /// sender supplied none
    pub fn caption(text: String, timestamp: Option<String>, sender: ConnectionId) -> Self {
        ServerMessage::Caption {
            text,
            timestamp: timestamp.unwrap_or_else(server_timestamp),
            sender,
        }
    }

    /// Create a Signal message
    pub fn signal(signal: Value, sender: ConnectionId) -> Self {
        ServerMessage::Signal { signal, sender }
    }

    /// Serialize to JSON text
    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Frame type name, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::UserConnected { .. } => "user_connected",
            ServerMessage::UserDisconnected { .. } => "user_disconnected",
            ServerMessage::Caption { .. } => "caption",
            ServerMessage::Signal { .. } => "signal",
        }
    }
}

/// Current UTC time as RFC 3339 with millisecond precision
fn server_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // -------------------------------------------------------------------------
    // Client Message Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_join() {
        let msg = ClientMessage::from_json(r#"{"type":"join","roomId":"x"}"#).unwrap();
        assert_eq!(msg, ClientMessage::join("x"));
    }

    #[test]
    fn test_parse_caption_with_timestamp() {
        let msg = ClientMessage::from_json(
            r#"{"type":"caption","roomId":"x","text":"Hello","timestamp":"10:42"}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::Caption {
                room_id,
                text,
                timestamp,
            } => {
                assert_eq!(room_id, "x");
                assert_eq!(text, "Hello");
                assert_eq!(timestamp.as_deref(), Some("10:42"));
            }
            other => panic!("Expected Caption, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_caption_without_timestamp() {
        let msg =
            ClientMessage::from_json(r#"{"type":"caption","roomId":"x","text":"Hi"}"#).unwrap();
        assert_eq!(msg, ClientMessage::caption("x", "Hi"));
    }

    #[test]
    fn test_parse_broadcast_signal() {
        let msg = ClientMessage::from_json(
            r#"{"type":"signal","target":"broadcast","signal":{"candidate":"c1"}}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::Signal { target, signal } => {
                assert_eq!(target, SignalTarget::Broadcast);
                assert_eq!(signal["candidate"], "c1");
            }
            other => panic!("Expected Signal, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_peer_signal() {
        let id = ConnectionId::new();
        let frame = json!({
            "type": "signal",
            "target": id.to_string(),
            "signal": {"type": "offer", "sdp": "v=0"}
        });
        let msg = ClientMessage::from_json(&frame.to_string()).unwrap();
        match msg {
            ClientMessage::Signal { target, .. } => {
                assert_eq!(target, SignalTarget::Peer(id.to_string()));
                assert_eq!(target.peer_id(), Some(id));
            }
            other => panic!("Expected Signal, got {:?}", other),
        }
    }

    #[test]
    fn test_peer_target_with_garbage_id() {
        let target = SignalTarget::Peer("not-a-connection".to_string());
        assert_eq!(target.peer_id(), None);
        assert_eq!(SignalTarget::Broadcast.peer_id(), None);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result = ClientMessage::from_json(r#"{"type":"leave","roomId":"x"}"#);
        assert!(matches!(result, Err(ProtocolError::SerializationError(_))));
    }

    #[test]
    fn test_missing_type_rejected() {
        let result = ClientMessage::from_json(r#"{"roomId":"x"}"#);
        assert!(matches!(result, Err(ProtocolError::SerializationError(_))));
    }

    #[test]
    fn test_not_json_rejected() {
        assert!(ClientMessage::from_json("hello there").is_err());
        assert!(ClientMessage::from_json("").is_err());
        assert!(ClientMessage::from_json("[1,2,3]").is_err());
    }

    #[test]
    fn test_signal_missing_payload_rejected() {
        let result = ClientMessage::from_json(r#"{"type":"signal","target":"broadcast"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_signal_payload_must_be_object() {
        let result =
            ClientMessage::from_json(r#"{"type":"signal","target":"broadcast","signal":"x"}"#);
        assert!(matches!(result, Err(ProtocolError::ValidationError(_))));
    }

    #[test]
    fn test_empty_room_id_rejected() {
        let result = ClientMessage::from_json(r#"{"type":"join","roomId":""}"#);
        assert!(matches!(result, Err(ProtocolError::ValidationError(_))));
    }

    #[test]
    fn test_long_room_id_rejected() {
        let msg = ClientMessage::join("r".repeat(MAX_ROOM_ID_LENGTH + 1));
        assert!(msg.validate().is_err());

        let msg = ClientMessage::join("r".repeat(MAX_ROOM_ID_LENGTH));
        assert!(msg.validate().is_ok());
    }

    #[test]
    fn test_long_caption_rejected() {
        let msg = ClientMessage::caption("x", "a".repeat(MAX_CAPTION_LENGTH + 1));
        assert!(matches!(
            msg.validate(),
            Err(ProtocolError::ValidationError(_))
        ));
    }

    // -------------------------------------------------------------------------
    // Server Message Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_user_connected_serialization() {
        let id = ConnectionId::new();
        let json = ServerMessage::user_connected(id).to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value, json!({"type": "user_connected", "userId": id.to_string()}));
    }

    #[test]
    fn test_user_disconnected_serialization() {
        let id = ConnectionId::new();
        let json = ServerMessage::user_disconnected(id).to_json().unwrap();
        assert!(json.contains("\"type\":\"user_disconnected\""));
        assert!(json.contains(&format!("\"userId\":\"{}\"", id)));
    }

    #[test]
    fn test_caption_keeps_client_timestamp() {
        let sender = ConnectionId::new();
        let msg = ServerMessage::caption("Hello".into(), Some("10:42".into()), sender);
        let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "caption");
        assert_eq!(value["text"], "Hello");
        assert_eq!(value["timestamp"], "10:42");
        assert_eq!(value["sender"], sender.to_string());
    }

    #[test]
    fn test_caption_stamps_server_time() {
        let msg = ServerMessage::caption("Hello".into(), None, ConnectionId::new());
        let ServerMessage::Caption { timestamp, .. } = msg else {
            panic!("Expected Caption");
        };
        assert!(timestamp.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&timestamp).is_ok());
    }

    #[test]
    fn test_signal_payload_forwarded_verbatim() {
        let sender = ConnectionId::new();
        let payload = json!({"candidate": "candidate:1 1 udp 2122260223", "sdpMLineIndex": 0});
        let msg = ServerMessage::signal(payload.clone(), sender);
        let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "signal");
        assert_eq!(value["signal"], payload);
        assert_eq!(value["sender"], sender.to_string());
    }
}
