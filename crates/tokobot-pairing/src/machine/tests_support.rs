//! Fakes shared by the state-machine and relay tests.

use super::PairingMachine;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokobot_core::{
    error::{RelayError, StoreError, TokoError},
    message::{ClientEvent, Delivered, OutgoingMessage, SessionBlob},
    traits::{AutomationClient, NotificationRelay, SessionStore},
};

/// Automation client that records calls and never talks to a network.
#[derive(Default)]
pub(crate) struct ScriptedClient {
    /// Session handed to each `initialize` call.
    pub inits: Mutex<Vec<Option<SessionBlob>>>,
    pub snapshots: AtomicUsize,
    pub shutdowns: AtomicUsize,
    pub fail_init: AtomicBool,
    /// Bytes returned by `snapshot`.
    pub blob: Mutex<Vec<u8>>,
}

impl ScriptedClient {
    pub fn with_blob(bytes: &[u8]) -> Self {
        let client = Self::default();
        *client.blob.lock().unwrap() = bytes.to_vec();
        client
    }

    pub fn init_count(&self) -> usize {
        self.inits.lock().unwrap().len()
    }

    pub fn last_init(&self) -> Option<Option<SessionBlob>> {
        self.inits.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl AutomationClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn initialize(
        &self,
        session: Option<SessionBlob>,
        _events: mpsc::Sender<ClientEvent>,
    ) -> Result<(), TokoError> {
        self.inits.lock().unwrap().push(session);
        if self.fail_init.load(Ordering::SeqCst) {
            return Err(TokoError::Channel("browser failed to launch".into()));
        }
        Ok(())
    }

    async fn snapshot(&self) -> Result<SessionBlob, TokoError> {
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        Ok(SessionBlob::new(self.blob.lock().unwrap().clone()))
    }

    async fn send(&self, _message: OutgoingMessage) -> Result<(), TokoError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), TokoError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Store wrapper that counts successful saves and remembers the last blob.
pub(crate) struct CountingStore<S> {
    pub inner: S,
    pub saves: AtomicUsize,
    pub last_saved: Mutex<Option<SessionBlob>>,
}

impl<S> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            saves: AtomicUsize::new(0),
            last_saved: Mutex::new(None),
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: SessionStore> SessionStore for CountingStore<S> {
    async fn save(&self, identity: &str, blob: &SessionBlob) -> Result<(), StoreError> {
        self.inner.save(identity, blob).await?;
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.last_saved.lock().unwrap() = Some(blob.clone());
        Ok(())
    }

    async fn extract(&self, identity: &str) -> Result<Option<SessionBlob>, StoreError> {
        self.inner.extract(identity).await
    }

    async fn delete(&self, identity: &str) -> Result<(), StoreError> {
        self.inner.delete(identity).await
    }
}

/// Relay that records delivered codes; optionally unconfigured or hanging.
#[derive(Default)]
pub(crate) struct RecordingRelay {
    pub(crate) sent: Mutex<Vec<String>>,
    pub unconfigured: bool,
    pub hang: bool,
}

impl RecordingRelay {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationRelay for RecordingRelay {
    fn is_configured(&self) -> bool {
        !self.unconfigured
    }

    async fn deliver(&self, code: &str) -> Result<Delivered, RelayError> {
        if self.unconfigured {
            return Err(RelayError::NotConfigured("telegram.chat_id"));
        }
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.sent.lock().unwrap().push(code.to_string());
        Ok(Delivered {
            code: code.to_string(),
            message_id: Some(1),
        })
    }
}

pub(crate) const IDENTITY: &str = "tokobot";

/// Machine over `client` and `store` with the shared test identity.
pub(crate) fn machine_with<S: SessionStore + 'static>(
    client: ScriptedClient,
    store: S,
) -> (Arc<PairingMachine>, Arc<ScriptedClient>) {
    let client = Arc::new(client);
    let machine = PairingMachine::new(IDENTITY, client.clone(), Arc::new(store));
    (Arc::new(machine), client)
}

/// Like [`machine_with`], keeping a handle on the store.
pub(crate) fn machine_over<S: SessionStore + 'static>(
    client: ScriptedClient,
    store: Arc<S>,
) -> (Arc<PairingMachine>, Arc<ScriptedClient>) {
    let client = Arc::new(client);
    let machine = PairingMachine::new(IDENTITY, client.clone(), store);
    (Arc::new(machine), client)
}
