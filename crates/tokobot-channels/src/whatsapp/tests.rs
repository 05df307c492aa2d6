use super::events::{accept, message_text, Envelope};
use super::qr::{generate_qr_image, generate_qr_terminal};
use super::send::{sanitize_for_whatsapp, split_message, MAX_MESSAGE_LEN, RETRY_DELAYS_MS};
use super::WhatsAppClient;
use std::collections::HashSet;
use tokio::sync::mpsc;
use tokobot_core::config::WhatsAppConfig;
use tokobot_core::message::{ClientEvent, SessionBlob};
use tokobot_core::traits::AutomationClient;
use wacore_binary::jid::{Jid, JidExt};

fn envelope(sender: &str) -> Envelope {
    Envelope {
        id: "3EB0A1".into(),
        chat: format!("{sender}@s.whatsapp.net"),
        sender: sender.into(),
        push_name: "Budi".into(),
        is_group: false,
        is_from_me: false,
    }
}

fn text_message(text: &str) -> waproto::whatsapp::Message {
    waproto::whatsapp::Message {
        conversation: Some(text.to_string()),
        ..Default::default()
    }
}

#[test]
fn test_accept_direct_customer_message() {
    let incoming = accept(envelope("628111"), "!produk kopi".into(), &[], &mut HashSet::new())
        .expect("message should pass");
    assert_eq!(incoming.sender_id, "628111");
    assert_eq!(incoming.sender_name.as_deref(), Some("Budi"));
    assert_eq!(incoming.text, "!produk kopi");
    assert_eq!(
        incoming.reply_target.as_deref(),
        Some("628111@s.whatsapp.net")
    );
}

#[test]
fn test_accept_drops_groups_and_own_messages() {
    let mut group = envelope("628111");
    group.is_group = true;
    assert!(accept(group, "hi".into(), &[], &mut HashSet::new()).is_none());

    let mut mine = envelope("628111");
    mine.is_from_me = true;
    assert!(accept(mine, "hi".into(), &[], &mut HashSet::new()).is_none());
}

#[test]
fn test_accept_consumes_echo_id() {
    let mut sent = HashSet::from(["3EB0A1".to_string()]);
    assert!(accept(envelope("628111"), "hi".into(), &[], &mut sent).is_none());
    assert!(sent.is_empty());
    assert!(accept(envelope("628111"), "hi".into(), &[], &mut sent).is_some());
}

#[test]
fn test_accept_allow_list_and_empty_text() {
    let allowed = vec!["628222".to_string()];
    assert!(accept(envelope("628111"), "hi".into(), &allowed, &mut HashSet::new()).is_none());
    assert!(accept(envelope("628222"), "hi".into(), &allowed, &mut HashSet::new()).is_some());
    assert!(accept(envelope("628222"), String::new(), &allowed, &mut HashSet::new()).is_none());
}

#[test]
fn test_accept_without_push_name() {
    let mut env = envelope("628111");
    env.push_name.clear();
    let incoming = accept(env, "hi".into(), &[], &mut HashSet::new()).unwrap();
    assert_eq!(incoming.sender_name, None);
}

#[test]
fn test_message_text_unwraps_and_trims() {
    assert_eq!(message_text(&text_message("  halo  ")), "halo");

    let wrapped = waproto::whatsapp::Message {
        ephemeral_message: Some(Box::new(waproto::whatsapp::message::FutureProofMessage {
            message: Some(Box::new(text_message("inner"))),
            ..Default::default()
        })),
        ..Default::default()
    };
    assert_eq!(message_text(&wrapped), "inner");
    assert_eq!(message_text(&waproto::whatsapp::Message::default()), "");
}

#[test]
fn test_jid_group_detection() {
    let group: Jid = "120363001234567890@g.us".parse().unwrap();
    assert!(group.is_group());
    let personal: Jid = "628111222333@s.whatsapp.net".parse().unwrap();
    assert!(!personal.is_group());
}

#[test]
fn test_split_short_message() {
    assert_eq!(split_message("hello", MAX_MESSAGE_LEN), vec!["hello"]);
}

#[test]
fn test_split_prefers_newlines() {
    let text = "baris\n".repeat(1500);
    let chunks = split_message(&text, MAX_MESSAGE_LEN);
    assert!(chunks.len() >= 2);
    assert!(chunks.iter().all(|c| c.len() <= MAX_MESSAGE_LEN));
    assert!(chunks[0].ends_with('\n'));
    assert_eq!(chunks.concat(), text);
}

#[test]
fn test_split_respects_char_boundaries() {
    let text = "é".repeat(3000);
    let chunks = split_message(&text, MAX_MESSAGE_LEN);
    assert!(chunks.iter().all(|c| c.len() <= MAX_MESSAGE_LEN));
    assert_eq!(chunks.concat(), text);
}

#[test]
fn test_sanitize_headers_and_bold() {
    assert_eq!(sanitize_for_whatsapp("## Daftar Produk"), "*DAFTAR PRODUK*");
    assert_eq!(
        sanitize_for_whatsapp("harga **spesial** hari ini"),
        "harga *spesial* hari ini"
    );
}

#[test]
fn test_sanitize_links_rules_and_tables() {
    assert_eq!(
        sanitize_for_whatsapp("lihat [katalog](https://toko.id) ya"),
        "lihat katalog (https://toko.id) ya"
    );
    let table = "| Nama | Harga |\n|---|---|\n| Kopi | 25000 |\n---\nselesai";
    assert_eq!(
        sanitize_for_whatsapp(table),
        "- Nama | Harga\n- Kopi | 25000\nselesai"
    );
}

#[test]
fn test_sanitize_keeps_trailing_newline_state() {
    assert_eq!(sanitize_for_whatsapp("a\n"), "a\n");
    assert_eq!(sanitize_for_whatsapp("a"), "a");
}

#[test]
fn test_retry_schedule() {
    assert_eq!(RETRY_DELAYS_MS, [500, 1000, 2000]);
}

#[test]
fn test_generate_qr_image_is_png() {
    let png = generate_qr_image("2@ABC123,key,adv").unwrap();
    assert_eq!(&png[..4], &[0x89, 0x50, 0x4E, 0x47]);
}

#[test]
fn test_generate_qr_terminal_uses_half_blocks() {
    let qr = generate_qr_terminal("2@ABC123,key,adv").unwrap();
    let lines: Vec<&str> = qr.lines().collect();
    assert!(!lines.is_empty());
    assert!(lines.iter().all(|l| l.chars().count() == lines[0].chars().count()));
    assert!(qr.contains('█') || qr.contains('▀') || qr.contains('▄'));
}

#[tokio::test]
async fn test_snapshot_before_initialize_fails() {
    let (inbox, _rx) = mpsc::channel(1);
    let client = WhatsAppClient::new(WhatsAppConfig::default(), inbox).quiet();
    assert!(client.snapshot().await.is_err());
    assert!(!client.is_running().await);
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unreadable_session_reports_auth_failure() {
    let (inbox, _rx) = mpsc::channel(1);
    let client = WhatsAppClient::new(WhatsAppConfig::default(), inbox).quiet();
    let (events, mut events_rx) = mpsc::channel(4);

    let err = client
        .initialize(Some(SessionBlob::new(vec![1, 2, 3])), events)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("stored session unusable"));
    assert!(matches!(
        events_rx.recv().await,
        Some(ClientEvent::AuthFailure(_))
    ));
    assert!(!client.is_running().await);
}
