//! Outbound text: formatting, chunking and retry.

use std::time::Duration;
use tokobot_core::error::TokoError;
use tracing::{error, warn};
use wacore_binary::jid::Jid;
use whatsapp_rust::client::Client;

/// Backoff between send attempts.
pub(super) const RETRY_DELAYS_MS: [u64; 3] = [500, 1000, 2000];

/// WhatsApp rejects longer text bodies.
pub(super) const MAX_MESSAGE_LEN: usize = 4096;

/// Send one message, retrying with [`RETRY_DELAYS_MS`]. Returns the message id.
pub(super) async fn retry_send(
    client: &Client,
    jid: &Jid,
    msg: waproto::whatsapp::Message,
) -> Result<String, TokoError> {
    let attempts = RETRY_DELAYS_MS.len();
    let mut last_err = String::new();

    for (i, delay_ms) in RETRY_DELAYS_MS.iter().enumerate() {
        match client.send_message(jid.clone(), msg.clone()).await {
            Ok(id) => return Ok(id),
            Err(e) => {
                last_err = e.to_string();
                if i + 1 < attempts {
                    warn!(
                        "whatsapp send {}/{attempts} failed: {e}, retrying in {delay_ms}ms",
                        i + 1
                    );
                    tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                } else {
                    error!("whatsapp send {}/{attempts} failed: {e}, giving up", i + 1);
                }
            }
        }
    }

    Err(TokoError::Channel(format!(
        "whatsapp send failed after {attempts} attempts: {last_err}"
    )))
}

/// Rewrite Markdown into WhatsApp's own markup.
///
/// Headers become bold uppercase, `**bold**` becomes `*bold*`, links become
/// `text (url)`, table rows become `- a | b` bullets and rules are dropped.
pub(super) fn sanitize_for_whatsapp(text: &str) -> String {
    let mut out = String::with_capacity(text.len());

    for line in text.lines() {
        let trimmed = line.trim();

        if trimmed.matches('-').count() >= 3 && trimmed.chars().all(|c| c == '-' || c == ' ') {
            continue;
        }

        if let Some(header) = strip_header(trimmed) {
            out.push('*');
            out.push_str(&header.trim().to_uppercase());
            out.push_str("*\n");
            continue;
        }

        if trimmed.len() >= 2 && trimmed.starts_with('|') && trimmed.ends_with('|') {
            let inner = &trimmed[1..trimmed.len() - 1];
            if inner.chars().all(|c| matches!(c, '-' | '|' | ' ' | ':')) {
                continue;
            }
            let cols: Vec<&str> = inner.split('|').map(str::trim).collect();
            out.push_str("- ");
            out.push_str(&cols.join(" | "));
            out.push('\n');
            continue;
        }

        let mut line = rewrite_links(line);
        rewrite_bold(&mut line);
        out.push_str(&line);
        out.push('\n');
    }

    if !text.ends_with('\n') && out.ends_with('\n') {
        out.pop();
    }
    out
}

fn strip_header(line: &str) -> Option<&str> {
    ["### ", "## ", "# "]
        .iter()
        .find_map(|prefix| line.strip_prefix(prefix))
}

/// `[text](url)` -> `text (url)`
fn rewrite_links(line: &str) -> String {
    let mut result = line.to_string();
    let mut from = 0;
    while let Some(open) = result[from..].find('[').map(|i| i + from) {
        let Some(mid) = result[open..].find("](").map(|i| i + open) else {
            break;
        };
        let Some(close) = result[mid + 2..].find(')').map(|i| i + mid + 2) else {
            break;
        };
        let replacement = format!("{} ({})", &result[open + 1..mid], &result[mid + 2..close]);
        result.replace_range(open..=close, &replacement);
        from = open + replacement.len();
    }
    result
}

/// `**bold**` -> `*bold*`
fn rewrite_bold(line: &mut String) {
    while let Some(start) = line.find("**") {
        let Some(end) = line[start + 2..].find("**").map(|i| i + start + 2) else {
            break;
        };
        let inner = line[start + 2..end].to_string();
        line.replace_range(start..end + 2, &format!("*{inner}*"));
    }
}

/// Split `text` into chunks of at most `max_len` bytes, preferring newlines.
pub(super) fn split_message(text: &str, max_len: usize) -> Vec<&str> {
    if text.len() <= max_len {
        return vec![text];
    }

    let mut chunks = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        if rest.len() <= max_len {
            chunks.push(rest);
            break;
        }
        let mut cut = max_len;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        let end = rest[..cut].rfind('\n').map(|i| i + 1).unwrap_or(cut);
        chunks.push(&rest[..end]);
        rest = &rest[end..];
    }
    chunks
}
