//! The pairing state machine.
//!
//! State is published through a `watch` channel so reads never wait on a
//! transition. Transitions (`start`, client events, `checkpoint`, `logout`)
//! are serialized by one async mutex and applied in arrival order.

#[cfg(test)]
pub(crate) mod tests_support;

use crate::state::{DisconnectKind, PairingState, Phase, Status, StatusSnapshot};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokobot_core::{
    error::TokoError,
    message::ClientEvent,
    traits::{AutomationClient, SessionStore},
};
use tracing::{debug, error, info, warn};

/// Capacity of the client event channel.
const EVENT_BUFFER: usize = 64;

/// Result of a `start()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The client was launched. `resumed` is true when a stored session was handed to it.
    Started { resumed: bool },
    /// A client is already running in the given status; nothing was done.
    AlreadyActive(Status),
}

/// Single authority over [`PairingState`].
pub struct PairingMachine {
    identity: String,
    client: Arc<dyn AutomationClient>,
    store: Arc<dyn SessionStore>,
    state: watch::Sender<PairingState>,
    gate: Mutex<()>,
    events_tx: mpsc::Sender<ClientEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<ClientEvent>>>,
}

impl PairingMachine {
    /// Create a machine in `Idle` for `identity`.
    pub fn new(
        identity: impl Into<String>,
        client: Arc<dyn AutomationClient>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let identity = identity.into();
        let (state, _) = watch::channel(PairingState::new(identity.clone()));
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        Self {
            identity,
            client,
            store,
            state,
            gate: Mutex::new(()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Current `(status, pairing_code)`. No side effects.
    pub fn current_status(&self) -> StatusSnapshot {
        self.state.borrow().snapshot()
    }

    pub fn status(&self) -> Status {
        self.state.borrow().status()
    }

    /// Full copy of the state record.
    pub fn state(&self) -> PairingState {
        self.state.borrow().clone()
    }

    /// Observe every state change.
    pub fn subscribe(&self) -> watch::Receiver<PairingState> {
        self.state.subscribe()
    }

    /// Sender the automation client reports lifecycle events into.
    pub fn events(&self) -> mpsc::Sender<ClientEvent> {
        self.events_tx.clone()
    }

    /// Consume client events in order until the channel closes.
    ///
    /// Only the first call gets the receiver; later calls return immediately.
    pub async fn run_events(self: Arc<Self>) {
        let Some(mut rx) = self.events_rx.lock().await.take() else {
            warn!("pairing event loop already running");
            return;
        };
        while let Some(event) = rx.recv().await {
            self.apply(event).await;
        }
        info!("pairing event loop stopped");
    }

    /// Launch the client unless one is already active.
    ///
    /// Resumes from the stored session when one exists. A store failure
    /// leaves the state untouched and is returned to the caller.
    pub async fn start(&self) -> Result<StartOutcome, TokoError> {
        let _gate = self.gate.lock().await;

        let current = self.status();
        if current.is_active() {
            info!("start ignored: client already {current}");
            return Ok(StartOutcome::AlreadyActive(current));
        }

        let purge_pending = self.state.borrow().purge_pending;
        let session = if purge_pending {
            self.store.delete(&self.identity).await?;
            self.state.send_modify(|s| s.purge_pending = false);
            info!("erased session rejected earlier for {}", self.identity);
            None
        } else {
            self.store.extract(&self.identity).await?
        };
        let resumed = session.is_some();

        self.state.send_modify(|s| s.phase = Phase::Connecting);
        info!(
            "starting {} client for {} ({})",
            self.client.name(),
            self.identity,
            if resumed {
                "resuming stored session"
            } else {
                "fresh pairing"
            }
        );

        if let Err(e) = self.client.initialize(session, self.events()).await {
            error!("{} client failed to initialize: {e}", self.client.name());
            self.state.send_modify(|s| {
                s.disconnect(DisconnectKind::InitFailed, format!("initialization failed: {e}"))
            });
            return Err(e);
        }

        Ok(StartOutcome::Started { resumed })
    }

    /// Apply one client lifecycle event.
    pub async fn apply(&self, event: ClientEvent) {
        let _gate = self.gate.lock().await;
        let current = self.status();

        match event {
            ClientEvent::PairingCode(code) => match current {
                Status::Connecting | Status::AwaitingScan => {
                    info!("pairing code issued (scan to link)");
                    debug!("pairing code: {code}");
                    self.state
                        .send_modify(|s| s.phase = Phase::AwaitingScan { code });
                }
                _ => debug!("ignoring pairing code received while {current}"),
            },
            ClientEvent::Authenticated => {
                info!("client authenticated, waiting for ready (status: {current})");
            }
            ClientEvent::Ready => {
                let reconnect = matches!(
                    self.state.borrow().phase,
                    Phase::Disconnected(ref d) if d.kind == DisconnectKind::Network
                );
                match current {
                    Status::Connecting | Status::AwaitingScan => {}
                    Status::Disconnected if reconnect => {
                        info!("client reconnected on its own");
                    }
                    _ => {
                        debug!("ignoring ready received while {current}");
                        return;
                    }
                }
                self.state.send_modify(|s| {
                    s.phase = Phase::Ready;
                    s.last_disconnect = None;
                });
                info!("client ready");
                if let Err(e) = self.persist_snapshot("ready").await {
                    error!("failed to save session after ready: {e}");
                }
            }
            ClientEvent::Disconnected(reason) => {
                // Only a live connection can drop. A close that follows an auth
                // failure or logout keeps that disconnect kind.
                if !current.is_active() {
                    debug!("ignoring disconnect received while {current}: {reason}");
                    return;
                }
                warn!("client disconnected: {reason}");
                self.state
                    .send_modify(|s| s.disconnect(DisconnectKind::Network, reason));
            }
            ClientEvent::AuthFailure(reason) => {
                warn!("client authentication failed: {reason}");
                let purge_pending = match self.store.delete(&self.identity).await {
                    Ok(()) => {
                        info!("erased rejected session for {}", self.identity);
                        false
                    }
                    Err(e) => {
                        error!("failed to erase rejected session, will retry on next start: {e}");
                        true
                    }
                };
                self.state.send_modify(|s| {
                    s.purge_pending = purge_pending;
                    s.disconnect(DisconnectKind::AuthFailure, reason);
                });
            }
        }
    }

    /// Re-save the session while ready. Returns whether a save happened.
    pub async fn checkpoint(&self) -> Result<bool, TokoError> {
        let _gate = self.gate.lock().await;
        if self.status() != Status::Ready {
            debug!("checkpoint skipped: client {}", self.status());
            return Ok(false);
        }
        self.persist_snapshot("backup").await?;
        Ok(true)
    }

    /// Stop the client and erase the stored session.
    ///
    /// The state becomes `Disconnected` even when the erase fails; the
    /// erase is then retried by the next `start()`.
    pub async fn logout(&self) -> Result<(), TokoError> {
        let _gate = self.gate.lock().await;

        if let Err(e) = self.client.shutdown().await {
            warn!("{} client shutdown failed: {e}", self.client.name());
        }

        let erased = self.store.delete(&self.identity).await;
        self.state.send_modify(|s| {
            s.purge_pending = erased.is_err();
            s.disconnect(DisconnectKind::Logout, "logged out");
        });

        match erased {
            Ok(()) => {
                info!("logged out and erased session for {}", self.identity);
                Ok(())
            }
            Err(e) => {
                error!("logout could not erase session: {e}");
                Err(e.into())
            }
        }
    }

    async fn persist_snapshot(&self, why: &str) -> Result<(), TokoError> {
        let blob = self.client.snapshot().await?;
        self.store.save(&self.identity, &blob).await?;
        info!("session saved ({why}, {} bytes)", blob.len());
        Ok(())
    }
}
