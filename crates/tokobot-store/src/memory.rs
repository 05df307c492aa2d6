//! Process-local session store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokobot_core::{error::StoreError, message::SessionBlob, traits::SessionStore};

/// In-memory session store. Contents are lost when the process exits.
///
/// Clones share the same map. `set_available(false)` makes every call fail
/// with `StoreError::Unavailable`, which tests use to simulate an outage.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<Mutex<HashMap<String, SessionBlob>>>,
    offline: Arc<AtomicBool>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.offline.store(!available, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, identity: &str, blob: &SessionBlob) -> Result<(), StoreError> {
        self.check()?;
        self.sessions
            .lock()
            .await
            .insert(identity.to_string(), blob.clone());
        Ok(())
    }

    async fn extract(&self, identity: &str) -> Result<Option<SessionBlob>, StoreError> {
        self.check()?;
        Ok(self.sessions.lock().await.get(identity).cloned())
    }

    async fn delete(&self, identity: &str) -> Result<(), StoreError> {
        self.check()?;
        self.sessions.lock().await.remove(identity);
        Ok(())
    }
}
