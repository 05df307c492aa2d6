//! Gateway: the event loop connecting the WhatsApp client, pairing machine,
//! catalog, provider and HTTP API.
//!
//! Runs the pairing event loop, the pairing-code auto-relay, periodic session
//! checkpoints and the API server as background tasks, then answers inbound
//! messages until ctrl-c.

mod replies;
mod tasks;

pub use replies::reply_for;

use crate::api::{self, ApiState};
use crate::catalog::Catalog;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokobot_core::{
    config::Config,
    message::{IncomingMessage, OutgoingMessage},
    traits::{AutomationClient, NotificationRelay, Provider, SessionStore},
};
use tokobot_pairing::{PairingMachine, StartOutcome};
use tracing::{error, info, warn};

/// Upper bound on one relay delivery.
const RELAY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Gateway {
    machine: Arc<PairingMachine>,
    client: Arc<dyn AutomationClient>,
    store: Arc<dyn SessionStore>,
    provider: Arc<dyn Provider>,
    relay: Arc<dyn NotificationRelay>,
    catalog: Arc<Catalog>,
    config: Config,
}

impl Gateway {
    pub fn new(
        machine: Arc<PairingMachine>,
        client: Arc<dyn AutomationClient>,
        store: Arc<dyn SessionStore>,
        provider: Arc<dyn Provider>,
        relay: Arc<dyn NotificationRelay>,
        catalog: Catalog,
        config: Config,
    ) -> Self {
        Self {
            machine,
            client,
            store,
            provider,
            relay,
            catalog: Arc::new(catalog),
            config,
        }
    }

    /// Run until ctrl-c or until the inbox closes.
    pub async fn run(self, mut inbox: mpsc::Receiver<IncomingMessage>) -> anyhow::Result<()> {
        info!(
            "{} gateway running | client: {} | provider: {} | relay: {} | products: {}",
            self.config.bot.name,
            self.client.name(),
            self.provider.name(),
            if self.relay.is_configured() {
                "telegram"
            } else {
                "disabled"
            },
            self.catalog.len(),
        );

        let handles: Vec<JoinHandle<()>> = vec![
            tokio::spawn(self.machine.clone().run_events()),
            tokio::spawn(tasks::auto_relay(
                self.machine.clone(),
                self.relay.clone(),
                RELAY_TIMEOUT,
            )),
            tokio::spawn(tasks::checkpoint_loop(
                self.machine.clone(),
                self.config.session.backup_interval(),
            )),
            self.spawn_api(),
        ];

        self.resume_on_boot().await;

        loop {
            tokio::select! {
                incoming = inbox.recv() => {
                    let Some(incoming) = incoming else {
                        warn!("inbox closed, stopping gateway");
                        break;
                    };
                    self.dispatch(incoming);
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.shutdown(&handles).await;
        Ok(())
    }

    fn spawn_api(&self) -> JoinHandle<()> {
        let state = ApiState {
            machine: self.machine.clone(),
            relay: self.relay.clone(),
            relay_timeout: RELAY_TIMEOUT,
        };
        let api_config = self.config.api.clone();
        tokio::spawn(async move {
            if let Err(e) = api::serve(api_config, state).await {
                error!("API server stopped: {e}");
            }
        })
    }

    /// Reconnect without waiting for `/start` when a session was saved earlier.
    async fn resume_on_boot(&self) {
        let identity = self.machine.identity();
        match self.store.exists(identity).await {
            Ok(true) => match self.machine.start().await {
                Ok(StartOutcome::Started { .. }) => {
                    info!("resuming saved session for {identity}")
                }
                Ok(StartOutcome::AlreadyActive(status)) => {
                    info!("client already {status} at boot")
                }
                Err(e) => warn!("could not resume saved session: {e}"),
            },
            Ok(false) => info!("no saved session for {identity}; call /start to pair"),
            Err(e) => warn!("session store unreachable at boot: {e}"),
        }
    }

    fn dispatch(&self, incoming: IncomingMessage) {
        let client = self.client.clone();
        let provider = self.provider.clone();
        let catalog = self.catalog.clone();
        tokio::spawn(async move {
            answer(incoming, client.as_ref(), catalog.as_ref(), provider.as_ref()).await;
        });
    }

    async fn shutdown(&self, handles: &[JoinHandle<()>]) {
        info!("Shutting down...");
        match self.machine.checkpoint().await {
            Ok(true) => info!("final session checkpoint saved"),
            Ok(false) => {}
            Err(e) => warn!("final session checkpoint failed: {e}"),
        }
        if let Err(e) = self.client.shutdown().await {
            warn!("failed to stop {} client: {e}", self.client.name());
        }
        for h in handles {
            h.abort();
        }
        info!("Shutdown complete.");
    }
}

/// Compute and send the reply to one inbound message.
async fn answer(
    incoming: IncomingMessage,
    client: &dyn AutomationClient,
    catalog: &Catalog,
    provider: &dyn Provider,
) {
    info!(
        "message from {} ({})",
        incoming.sender_id,
        incoming.sender_name.as_deref().unwrap_or("unknown")
    );
    let reply = reply_for(&incoming.text, catalog, provider).await;
    if let Err(e) = client.send(OutgoingMessage::reply_to(&incoming, reply)).await {
        error!("failed to reply to {}: {e}", incoming.sender_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Product;
    use crate::testing::FakeClient;
    use async_trait::async_trait;
    use chrono::Utc;
    use tokobot_core::error::TokoError;
    use uuid::Uuid;

    struct FixedProvider;

    #[async_trait]
    impl Provider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _prompt: &str) -> Result<String, TokoError> {
            Ok("Toko buka jam 9 pagi.".into())
        }

        async fn is_available(&self) -> bool {
            true
        }
    }

    fn incoming(text: &str) -> IncomingMessage {
        IncomingMessage {
            id: Uuid::new_v4(),
            sender_id: "6281234567890".into(),
            sender_name: Some("Budi".into()),
            text: text.into(),
            timestamp: Utc::now(),
            reply_target: Some("6281234567890@s.whatsapp.net".into()),
        }
    }

    #[tokio::test]
    async fn test_answer_replies_to_sender_chat() {
        let client = FakeClient::default();
        let catalog = Catalog::new(vec![Product {
            name: "Topi".into(),
            price: 50_000,
            stock: 7,
            description: String::new(),
        }]);

        answer(incoming("!produk topi"), &client, &catalog, &FixedProvider).await;
        answer(incoming("jam buka?"), &client, &catalog, &FixedProvider).await;

        let outbox = client.outbox.lock().unwrap();
        assert_eq!(outbox.len(), 2);
        assert!(outbox[0].text.contains("*Topi*"));
        assert_eq!(outbox[1].text, "Toko buka jam 9 pagi.");
        assert_eq!(
            outbox[1].reply_target.as_deref(),
            Some("6281234567890@s.whatsapp.net")
        );
    }
}
