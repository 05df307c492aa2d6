use crate::{
    error::{RelayError, StoreError, TokoError},
    message::{ClientEvent, Delivered, OutgoingMessage, SessionBlob},
};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// AI Provider trait: answers free-form questions.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Send a prompt to the model and return its text answer.
    async fn complete(&self, prompt: &str) -> Result<String, TokoError>;

    /// Check if the provider is configured and reachable.
    async fn is_available(&self) -> bool;
}

/// Durable storage for one opaque session blob per client identity.
///
/// `extract` returning `None` is the normal "never paired" outcome.
/// `save` overwrites and `delete` of a missing record succeeds.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, identity: &str, blob: &SessionBlob) -> Result<(), StoreError>;

    async fn extract(&self, identity: &str) -> Result<Option<SessionBlob>, StoreError>;

    async fn delete(&self, identity: &str) -> Result<(), StoreError>;

    async fn exists(&self, identity: &str) -> Result<bool, StoreError> {
        Ok(self.extract(identity).await?.is_some())
    }
}

/// The messaging-client automation layer (WhatsApp Web in production).
///
/// The client performs the protocol work; it reports lifecycle progress
/// through the `events` channel handed to `initialize`.
#[async_trait]
pub trait AutomationClient: Send + Sync {
    /// Human-readable client name.
    fn name(&self) -> &str;

    /// Launch the client, resuming from `session` when one is given.
    async fn initialize(
        &self,
        session: Option<SessionBlob>,
        events: mpsc::Sender<ClientEvent>,
    ) -> Result<(), TokoError>;

    /// Serialize the current session so it can be persisted.
    async fn snapshot(&self) -> Result<SessionBlob, TokoError>;

    /// Send a chat message.
    async fn send(&self, message: OutgoingMessage) -> Result<(), TokoError>;

    /// Tear the client down. Safe to call when not running.
    async fn shutdown(&self) -> Result<(), TokoError>;
}

/// Operator-facing channel that receives pairing codes.
#[async_trait]
pub trait NotificationRelay: Send + Sync {
    /// Whether every setting needed for delivery is present.
    fn is_configured(&self) -> bool;

    /// Deliver `code` to the operator.
    async fn deliver(&self, code: &str) -> Result<Delivered, RelayError>;
}
