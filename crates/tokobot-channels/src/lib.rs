//! # tokobot-channels
//!
//! Messaging integrations: the WhatsApp automation client and the Telegram
//! relay that forwards pairing codes to the operator.

pub mod telegram;
pub mod whatsapp;

pub use telegram::TelegramRelay;
pub use whatsapp::{generate_qr_image, generate_qr_terminal, WhatsAppClient};
