//! Fakes for the binary's tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokobot_core::{
    error::{RelayError, TokoError},
    message::{ClientEvent, Delivered, OutgoingMessage, SessionBlob},
    traits::{AutomationClient, NotificationRelay, SessionStore},
};
use tokobot_pairing::PairingMachine;

pub const IDENTITY: &str = "tokobot-test";

#[derive(Default)]
pub struct FakeClient {
    snapshots: AtomicUsize,
    pub fail_init: AtomicBool,
    pub outbox: Mutex<Vec<OutgoingMessage>>,
}

impl FakeClient {
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AutomationClient for FakeClient {
    fn name(&self) -> &str {
        "fake"
    }

    async fn initialize(
        &self,
        _session: Option<SessionBlob>,
        _events: mpsc::Sender<ClientEvent>,
    ) -> Result<(), TokoError> {
        if self.fail_init.load(Ordering::SeqCst) {
            return Err(TokoError::Channel("websocket handshake failed".into()));
        }
        Ok(())
    }

    async fn snapshot(&self) -> Result<SessionBlob, TokoError> {
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        Ok(SessionBlob::new(b"fake-session".to_vec()))
    }

    async fn send(&self, message: OutgoingMessage) -> Result<(), TokoError> {
        self.outbox.lock().unwrap().push(message);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), TokoError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingRelay {
    sent: Mutex<Vec<String>>,
    unconfigured: bool,
    failing: bool,
}

impl RecordingRelay {
    pub fn unconfigured() -> Self {
        Self {
            unconfigured: true,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

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
        if self.failing {
            return Err(RelayError::DeliveryFailed {
                status: Some(403),
                message: "Forbidden: bot was blocked by the user".into(),
            });
        }
        self.sent.lock().unwrap().push(code.to_string());
        Ok(Delivered {
            code: code.to_string(),
            message_id: Some(7),
        })
    }
}

/// Machine over a [`FakeClient`] and `store`.
pub fn machine<S: SessionStore + 'static>(store: S) -> (Arc<PairingMachine>, Arc<FakeClient>) {
    let client = Arc::new(FakeClient::default());
    let machine = PairingMachine::new(IDENTITY, client.clone(), Arc::new(store));
    (Arc::new(machine), client)
}
