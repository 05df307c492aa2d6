//! `AutomationClient` implementation for WhatsApp.

use super::backend::ImageBackend;
use super::send::{retry_send, sanitize_for_whatsapp, split_message, MAX_MESSAGE_LEN};
use super::WhatsAppClient;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokobot_core::{
    error::TokoError,
    message::{ClientEvent, OutgoingMessage, SessionBlob},
    traits::AutomationClient,
};
use tracing::{info, warn};
use wacore_binary::jid::Jid;

#[async_trait]
impl AutomationClient for WhatsAppClient {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn initialize(
        &self,
        session: Option<SessionBlob>,
        events: mpsc::Sender<ClientEvent>,
    ) -> Result<(), TokoError> {
        let mut running = self.running.lock().await;
        if let Some(old) = running.take() {
            info!("replacing previous WhatsApp bot");
            old.task.abort();
        }

        let backend = match session {
            Some(blob) => match ImageBackend::from_blob(&blob) {
                Ok(backend) => backend,
                Err(e) => {
                    // An unreadable session can never authenticate.
                    let reason = format!("stored session unusable: {e}");
                    if events.send(ClientEvent::AuthFailure(reason.clone())).await.is_err() {
                        warn!("pairing event channel closed");
                    }
                    return Err(TokoError::Channel(reason));
                }
            },
            None => ImageBackend::new(),
        };

        *running = Some(self.build_and_run(Arc::new(backend), events).await?);
        Ok(())
    }

    async fn snapshot(&self) -> Result<SessionBlob, TokoError> {
        let running = self.running.lock().await;
        let running = running
            .as_ref()
            .ok_or_else(|| TokoError::Channel("whatsapp client not running".into()))?;
        running.backend.to_blob().await.map_err(TokoError::Channel)
    }

    async fn send(&self, message: OutgoingMessage) -> Result<(), TokoError> {
        let target = message
            .reply_target
            .as_deref()
            .ok_or_else(|| TokoError::Channel("no reply_target on outgoing message".into()))?;
        let jid: Jid = target
            .parse()
            .map_err(|e| TokoError::Channel(format!("invalid whatsapp JID '{target}': {e}")))?;

        let client = self
            .running
            .lock()
            .await
            .as_ref()
            .map(|r| r.client.clone())
            .ok_or_else(|| TokoError::Channel("whatsapp client not running".into()))?;

        let text = sanitize_for_whatsapp(&message.text);
        for chunk in split_message(&text, MAX_MESSAGE_LEN) {
            let msg = waproto::whatsapp::Message {
                conversation: Some(chunk.to_string()),
                ..Default::default()
            };
            let id = retry_send(&client, &jid, msg).await?;
            self.sent_ids.lock().await.insert(id);
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), TokoError> {
        if let Some(running) = self.running.lock().await.take() {
            running.task.abort();
            info!("WhatsApp client stopped");
        }
        Ok(())
    }
}
