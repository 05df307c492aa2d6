//! WhatsApp automation client over `whatsapp-rust`.
//!
//! Speaks the WhatsApp Web protocol directly (Noise handshake + Signal
//! encryption). Protocol state is kept in memory by [`backend::ImageBackend`]
//! and handed out as a [`SessionBlob`](tokobot_core::message::SessionBlob)
//! for the session store to persist.

mod backend;
mod bot;
mod client;
mod events;
mod qr;
mod send;

#[cfg(test)]
mod tests;

pub use backend::ImageBackend;
pub use qr::{generate_qr_image, generate_qr_terminal};

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokobot_core::{config::WhatsAppConfig, message::IncomingMessage};

/// One running bot and what it was built over.
pub(super) struct Running {
    pub backend: Arc<ImageBackend>,
    pub client: Arc<whatsapp_rust::client::Client>,
    pub task: JoinHandle<()>,
}

/// WhatsApp client driven by the pairing state machine.
pub struct WhatsAppClient {
    pub(super) config: WhatsAppConfig,
    /// Where accepted inbound messages go.
    pub(super) inbox: mpsc::Sender<IncomingMessage>,
    pub(super) running: Mutex<Option<Running>>,
    /// Ids of messages we sent, to drop their echoes.
    pub(super) sent_ids: Arc<Mutex<HashSet<String>>>,
    /// Print each pairing code as a terminal QR.
    pub(super) print_qr: bool,
}

impl WhatsAppClient {
    /// Create a client that forwards accepted messages to `inbox`.
    pub fn new(config: WhatsAppConfig, inbox: mpsc::Sender<IncomingMessage>) -> Self {
        Self {
            config,
            inbox,
            running: Mutex::new(None),
            sent_ids: Arc::new(Mutex::new(HashSet::new())),
            print_qr: true,
        }
    }

    /// Disable printing pairing QRs on stdout.
    pub fn quiet(mut self) -> Self {
        self.print_qr = false;
        self
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }
}
