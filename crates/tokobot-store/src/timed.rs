//! Timeout wrapper for session stores.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokobot_core::{error::StoreError, message::SessionBlob, traits::SessionStore};
use tracing::warn;

/// Bounds every call to the inner store; an elapsed call becomes `Unavailable`.
pub struct TimedStore<S> {
    inner: S,
    timeout: Duration,
}

impl<S: SessionStore> TimedStore<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn bounded<T: Send>(
        &self,
        op: &str,
        fut: impl Future<Output = Result<T, StoreError>> + Send,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!("session store {op} timed out after {:?}", self.timeout);
                Err(StoreError::Unavailable(format!(
                    "{op} timed out after {}s",
                    self.timeout.as_secs_f32()
                )))
            }
        }
    }
}

#[async_trait]
impl<S: SessionStore> SessionStore for TimedStore<S> {
    async fn save(&self, identity: &str, blob: &SessionBlob) -> Result<(), StoreError> {
        self.bounded("save", self.inner.save(identity, blob)).await
    }

    async fn extract(&self, identity: &str) -> Result<Option<SessionBlob>, StoreError> {
        self.bounded("extract", self.inner.extract(identity)).await
    }

    async fn delete(&self, identity: &str) -> Result<(), StoreError> {
        self.bounded("delete", self.inner.delete(identity)).await
    }

    async fn exists(&self, identity: &str) -> Result<bool, StoreError> {
        self.bounded("exists", self.inner.exists(identity)).await
    }
}
