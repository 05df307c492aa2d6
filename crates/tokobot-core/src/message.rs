use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An incoming chat message from the messaging client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub id: Uuid,
    /// Platform-specific user ID (phone number for WhatsApp).
    pub sender_id: String,
    /// Human-readable sender name.
    pub sender_name: Option<String>,
    /// Message text content.
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Platform-specific target for routing the reply (e.g. a WhatsApp JID).
    #[serde(default)]
    pub reply_target: Option<String>,
}

/// An outgoing chat message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub text: String,
    #[serde(default)]
    pub reply_target: Option<String>,
}

impl OutgoingMessage {
    /// Build a reply addressed to the sender of `incoming`.
    pub fn reply_to(incoming: &IncomingMessage, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reply_target: incoming.reply_target.clone(),
        }
    }
}

/// Lifecycle events emitted by the automation client, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A new pairing code is ready to be scanned. Replaces any previous code.
    PairingCode(String),
    /// The phone confirmed the pairing; the connection is not usable yet.
    Authenticated,
    /// The client is connected and can send/receive.
    Ready,
    /// The connection dropped; the session itself is still valid.
    Disconnected(String),
    /// The session was rejected or revoked and must not be reused.
    AuthFailure(String),
}

/// Opaque serialized session state. Never interpreted outside the client that produced it.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionBlob(Vec<u8>);

impl SessionBlob {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for SessionBlob {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

// Session contents are credentials; keep them out of logs.
impl std::fmt::Debug for SessionBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionBlob({} bytes)", self.0.len())
    }
}

/// Proof of a successful relay: the code that was actually sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivered {
    pub code: String,
    /// Upstream message ID, when the API returns one.
    pub message_id: Option<i64>,
}
