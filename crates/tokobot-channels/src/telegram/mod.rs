//! Telegram relay for pairing codes.
//!
//! Sends the QR of the current pairing code through the Bot API
//! `sendPhoto` method, with the raw code in the caption.
//! Docs: <https://core.telegram.org/bots/api#sendphoto>

mod types;


use crate::whatsapp::generate_qr_image;
use async_trait::async_trait;
use tokobot_core::{
    config::TelegramConfig, error::RelayError, message::Delivered, traits::NotificationRelay,
};
use tracing::{info, warn};
use types::{TgResponse, TgSentMessage};

/// Relays pairing codes to one Telegram chat.
pub struct TelegramRelay {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramRelay {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// `(bot_token, chat_id)`, or the first missing setting.
    fn target(&self) -> Result<(&str, &str), RelayError> {
        let token = self
            .config
            .bot_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(RelayError::NotConfigured("telegram.bot_token"))?;
        let chat = self
            .config
            .chat_id
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or(RelayError::NotConfigured("telegram.chat_id"))?;
        Ok((token, chat))
    }

    fn caption(code: &str) -> String {
        format!(
            "Scan this QR in WhatsApp > Linked devices to connect the shop bot.\n\nPairing code:\n{code}"
        )
    }

    async fn send_photo(
        &self,
        token: &str,
        chat_id: &str,
        image: Vec<u8>,
        caption: String,
    ) -> Result<Option<i64>, RelayError> {
        let url = format!(
            "{}/bot{token}/sendPhoto",
            self.config.api_url.trim_end_matches('/')
        );

        let part = reqwest::multipart::Part::bytes(image)
            .file_name("pairing.png")
            .mime_str("image/png")
            .map_err(|e| failed(None, format!("mime error: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption)
            .part("photo", part);

        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            // The URL carries the bot token; keep it out of the error.
            .map_err(|e| failed(None, format!("telegram sendPhoto failed: {}", e.without_url())))?;

        let status = resp.status();
        let body: Option<TgResponse<TgSentMessage>> = resp.json().await.ok();

        match body {
            Some(TgResponse { ok: true, result, .. }) if status.is_success() => {
                Ok(result.map(|m| m.message_id))
            }
            Some(TgResponse { description, .. }) => Err(failed(
                Some(status.as_u16()),
                description.unwrap_or_else(|| "telegram rejected the photo".into()),
            )),
            None => Err(failed(
                Some(status.as_u16()),
                format!("unexpected telegram response ({status})"),
            )),
        }
    }
}

fn failed(status: Option<u16>, message: String) -> RelayError {
    RelayError::DeliveryFailed { status, message }
}

#[async_trait]
impl NotificationRelay for TelegramRelay {
    fn is_configured(&self) -> bool {
        self.target().is_ok()
    }

    async fn deliver(&self, code: &str) -> Result<Delivered, RelayError> {
        let (token, chat_id) = self.target()?;
        let png = generate_qr_image(code).map_err(|e| failed(None, e.to_string()))?;

        match self.send_photo(token, chat_id, png, Self::caption(code)).await {
            Ok(message_id) => {
                info!("pairing QR sent to telegram chat {chat_id}");
                Ok(Delivered {
                    code: code.to_string(),
                    message_id,
                })
            }
            Err(e) => {
                warn!("telegram relay failed: {e}");
                Err(e)
            }
        }
    }
}
