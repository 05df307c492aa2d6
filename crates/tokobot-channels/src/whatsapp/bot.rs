//! Bot lifecycle: building over a backend and mapping protocol events.

use super::backend::ImageBackend;
use super::events::handle_whatsapp_message;
use super::qr::generate_qr_terminal;
use super::{Running, WhatsAppClient};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokobot_core::{error::TokoError, message::ClientEvent};
use tracing::{debug, info, warn};
use wacore::types::events::Event;
use whatsapp_rust::bot::Bot;
use whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory;
use whatsapp_rust_ureq_http_client::UreqHttpClient;

/// Lifecycle event reported to the state machine for a protocol event.
pub(super) fn lifecycle_event(event: &Event) -> Option<ClientEvent> {
    match event {
        Event::PairingQrCode { code, .. } => Some(ClientEvent::PairingCode(code.clone())),
        Event::PairSuccess(_) => Some(ClientEvent::Authenticated),
        Event::Connected(_) => Some(ClientEvent::Ready),
        Event::Disconnected(_) => Some(ClientEvent::Disconnected("connection lost".into())),
        Event::LoggedOut(_) => Some(ClientEvent::AuthFailure("logged out".into())),
        _ => None,
    }
}

impl WhatsAppClient {
    /// Build a bot over `backend` and run it in the background.
    pub(super) async fn build_and_run(
        &self,
        backend: Arc<ImageBackend>,
        events: mpsc::Sender<ClientEvent>,
    ) -> Result<Running, TokoError> {
        let allowed = Arc::new(self.config.allowed_users.clone());
        let inbox = self.inbox.clone();
        let sent_ids = self.sent_ids.clone();
        let print_qr = self.print_qr;

        let mut bot = Bot::builder()
            .with_backend(backend.clone())
            .with_transport_factory(TokioWebSocketTransportFactory::new())
            .with_http_client(UreqHttpClient::new())
            .with_device_props(
                Some(self.config.device_name.clone()),
                None,
                Some(waproto::whatsapp::device_props::PlatformType::Desktop),
            )
            .on_event(move |event, _client| {
                let events = events.clone();
                let allowed = allowed.clone();
                let inbox = inbox.clone();
                let sent_ids = sent_ids.clone();
                async move {
                    if let Some(lifecycle) = lifecycle_event(&event) {
                        if let ClientEvent::PairingCode(ref code) = lifecycle {
                            info!("WhatsApp pairing code generated (scan to link)");
                            debug!("pairing code: {code}");
                            if print_qr {
                                match generate_qr_terminal(code) {
                                    Ok(qr) => println!("\nScan with WhatsApp > Linked devices:\n\n{qr}"),
                                    Err(e) => warn!("could not render terminal QR: {e}"),
                                }
                            }
                        }
                        if events.send(lifecycle).await.is_err() {
                            warn!("pairing event channel closed");
                        }
                        return;
                    }
                    if let Event::Message(msg, info) = event {
                        handle_whatsapp_message(*msg, info, &inbox, &allowed, &sent_ids).await;
                    }
                }
            })
            .build()
            .await
            .map_err(|e| TokoError::Channel(format!("whatsapp bot build failed: {e}")))?;

        let client = bot.client();
        let task = bot
            .run()
            .await
            .map_err(|e| TokoError::Channel(format!("whatsapp bot run failed: {e}")))?;

        info!("WhatsApp bot running");
        Ok(Running {
            backend,
            client,
            task,
        })
    }
}
