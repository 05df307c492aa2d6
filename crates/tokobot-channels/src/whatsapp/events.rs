//! Inbound message filtering and conversion.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokobot_core::message::IncomingMessage;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The routing facts of one inbound message.
#[derive(Debug, Clone)]
pub(super) struct Envelope {
    pub id: String,
    /// Chat JID the reply goes to.
    pub chat: String,
    /// Sender phone number (JID user part).
    pub sender: String,
    pub push_name: String,
    pub is_group: bool,
    pub is_from_me: bool,
}

impl Envelope {
    pub fn from_info(info: &wacore::types::message::MessageInfo) -> Self {
        Self {
            id: info.id.clone(),
            chat: info.source.chat.to_string(),
            sender: info.source.sender.user.clone(),
            push_name: info.push_name.clone(),
            is_group: info.source.is_group,
            is_from_me: info.source.is_from_me,
        }
    }
}

/// Text body of `msg`, looking through device-sent, ephemeral and view-once wrappers.
pub(super) fn message_text(msg: &waproto::whatsapp::Message) -> String {
    let inner = msg
        .device_sent_message
        .as_ref()
        .and_then(|d| d.message.as_deref())
        .or_else(|| {
            msg.ephemeral_message
                .as_ref()
                .and_then(|e| e.message.as_deref())
        })
        .or_else(|| {
            msg.view_once_message
                .as_ref()
                .and_then(|v| v.message.as_deref())
        })
        .unwrap_or(msg);

    inner
        .conversation
        .as_deref()
        .or_else(|| {
            inner
                .extended_text_message
                .as_ref()
                .and_then(|e| e.text.as_deref())
        })
        .unwrap_or("")
        .trim()
        .to_string()
}

/// Decide whether a message reaches the gateway.
///
/// Drops group traffic, anything we sent ourselves (including echoes of
/// ids in `sent_ids`, which are consumed), senders outside a non-empty
/// `allowed` list and messages without text.
pub(super) fn accept(
    env: Envelope,
    text: String,
    allowed: &[String],
    sent_ids: &mut HashSet<String>,
) -> Option<IncomingMessage> {
    if env.is_group {
        debug!("WA filtered: group message in {}", env.chat);
        return None;
    }
    if sent_ids.remove(&env.id) {
        debug!("WA filtered: own echo {}", env.id);
        return None;
    }
    if env.is_from_me {
        return None;
    }
    if !allowed.is_empty() && !allowed.contains(&env.sender) {
        warn!("ignoring whatsapp message from unlisted {}", env.sender);
        return None;
    }
    if text.is_empty() {
        debug!("WA filtered: no text in {}", env.id);
        return None;
    }

    let sender_name = if env.push_name.is_empty() {
        None
    } else {
        Some(env.push_name)
    };

    Some(IncomingMessage {
        id: Uuid::new_v4(),
        sender_id: env.sender,
        sender_name,
        text,
        timestamp: chrono::Utc::now(),
        reply_target: Some(env.chat),
    })
}

/// Filter one `Event::Message` and forward it to `inbox`.
pub(super) async fn handle_whatsapp_message(
    msg: waproto::whatsapp::Message,
    info: wacore::types::message::MessageInfo,
    inbox: &mpsc::Sender<IncomingMessage>,
    allowed: &[String],
    sent_ids: &Arc<Mutex<HashSet<String>>>,
) {
    let env = Envelope::from_info(&info);
    let text = message_text(&msg);
    let Some(incoming) = accept(env, text, allowed, &mut *sent_ids.lock().await) else {
        return;
    };

    if inbox.send(incoming).await.is_err() {
        info!("whatsapp inbox receiver dropped");
    }
}
