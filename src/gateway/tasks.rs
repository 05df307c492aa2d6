//! Background tasks around the pairing machine.

use std::sync::Arc;
use std::time::Duration;
use tokobot_core::traits::NotificationRelay;
use tokobot_pairing::{relay_pairing_code, PairingMachine};
use tracing::{debug, info, warn};

/// Relay every new pairing code to the operator once.
///
/// Returns when the machine is dropped. Does nothing when the relay is not
/// configured; `POST /relay` still reports that case to the caller.
pub async fn auto_relay(
    machine: Arc<PairingMachine>,
    relay: Arc<dyn NotificationRelay>,
    timeout: Duration,
) {
    if !relay.is_configured() {
        info!("auto-relay disabled: telegram relay not configured");
        return;
    }

    let mut state = machine.subscribe();
    let mut last_relayed: Option<String> = None;
    loop {
        let code = state.borrow_and_update().pairing_code().map(str::to_string);
        if let Some(code) = code {
            if last_relayed.as_deref() != Some(code.as_str()) {
                match relay_pairing_code(&machine, relay.as_ref(), timeout).await {
                    Ok(delivered) => last_relayed = Some(delivered.code),
                    Err(e) => {
                        warn!("auto-relay failed: {e}");
                        last_relayed = Some(code);
                    }
                }
            }
        }
        if state.changed().await.is_err() {
            break;
        }
    }
    debug!("auto-relay stopped");
}

/// Re-save the session every `every` while ready.
pub async fn checkpoint_loop(machine: Arc<PairingMachine>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        match machine.checkpoint().await {
            Ok(true) => debug!("session checkpoint saved"),
            Ok(false) => {}
            Err(e) => warn!("session checkpoint failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{machine, RecordingRelay};
    use tokobot_core::message::ClientEvent;
    use tokobot_store::MemorySessionStore;

    async fn wait_for_sent(relay: &RecordingRelay, n: usize) {
        for _ in 0..200 {
            if relay.sent().len() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("relay saw {:?}, wanted {n} codes", relay.sent());
    }

    #[tokio::test]
    async fn test_auto_relay_sends_each_new_code_once() {
        let (machine, _client) = machine(MemorySessionStore::new());
        let relay = Arc::new(RecordingRelay::default());
        let task = tokio::spawn(auto_relay(
            machine.clone(),
            relay.clone(),
            Duration::from_secs(5),
        ));

        machine.start().await.unwrap();
        machine.apply(ClientEvent::PairingCode("ABC123".into())).await;
        wait_for_sent(&relay, 1).await;

        // Unrelated changes do not resend.
        machine.apply(ClientEvent::Authenticated).await;
        machine.apply(ClientEvent::PairingCode("XYZ999".into())).await;
        wait_for_sent(&relay, 2).await;

        machine.apply(ClientEvent::Ready).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(relay.sent(), vec!["ABC123".to_string(), "XYZ999".to_string()]);
        task.abort();
    }

    #[tokio::test]
    async fn test_auto_relay_exits_when_unconfigured() {
        let (machine, _client) = machine(MemorySessionStore::new());
        let relay = Arc::new(RecordingRelay::unconfigured());
        tokio::time::timeout(
            Duration::from_secs(1),
            auto_relay(machine, relay, Duration::from_secs(5)),
        )
        .await
        .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_checkpoint_loop_saves_while_ready() {
        let store = MemorySessionStore::new();
        let (machine, client) = machine(store.clone());
        machine.start().await.unwrap();
        machine.apply(ClientEvent::Ready).await;
        let after_ready = client.snapshot_count();

        let task = tokio::spawn(checkpoint_loop(machine.clone(), Duration::from_secs(60)));
        tokio::time::sleep(Duration::from_secs(185)).await;
        assert_eq!(client.snapshot_count() - after_ready, 3);
        task.abort();
    }
}
