//! Relaying the current pairing code to the operator.

use crate::PairingMachine;
use std::time::Duration;
use tokobot_core::{error::RelayError, message::Delivered, traits::NotificationRelay};
use tracing::{info, warn};

/// Send the code that is current *now* through `relay`.
///
/// The state is only read. If the code rotates while the delivery is in
/// flight, the returned [`Delivered`] still names the code that was sent.
pub async fn relay_pairing_code(
    machine: &PairingMachine,
    relay: &dyn NotificationRelay,
    timeout: Duration,
) -> Result<Delivered, RelayError> {
    let code = machine
        .current_status()
        .pairing_code
        .ok_or(RelayError::NoCodeAvailable)?;

    if !relay.is_configured() {
        warn!("pairing code not relayed: relay is not configured");
    }

    let delivered = tokio::time::timeout(timeout, relay.deliver(&code))
        .await
        .map_err(|_| RelayError::DeliveryFailed {
            status: None,
            message: format!("timed out after {}s", timeout.as_secs_f32()),
        })??;

    info!("pairing code relayed to operator");
    Ok(delivered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::tests_support::{machine_with, RecordingRelay, ScriptedClient};
    use tokobot_core::message::ClientEvent;
    use tokobot_store::MemorySessionStore;

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn test_fresh_process_scenario_relays_code() {
        let store = MemorySessionStore::new();
        let (machine, _client) = machine_with(ScriptedClient::default(), store);

        machine.start().await.unwrap();
        machine
            .apply(ClientEvent::PairingCode("ABC123".into()))
            .await;

        let relay = RecordingRelay::default();
        let delivered = relay_pairing_code(&machine, &relay, TIMEOUT).await.unwrap();
        assert_eq!(delivered.code, "ABC123");
        assert_eq!(relay.sent(), vec!["ABC123".to_string()]);

        let unconfigured = RecordingRelay {
            unconfigured: true,
            ..Default::default()
        };
        let err = relay_pairing_code(&machine, &unconfigured, TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_no_code_when_not_awaiting_scan() {
        let (machine, _client) = machine_with(ScriptedClient::default(), MemorySessionStore::new());
        let relay = RecordingRelay::default();

        let err = relay_pairing_code(&machine, &relay, TIMEOUT).await.unwrap_err();
        assert_eq!(err, RelayError::NoCodeAvailable);

        machine.start().await.unwrap();
        machine.apply(ClientEvent::PairingCode("C1".into())).await;
        machine.apply(ClientEvent::Ready).await;
        let err = relay_pairing_code(&machine, &relay, TIMEOUT).await.unwrap_err();
        assert_eq!(err, RelayError::NoCodeAvailable);
        assert!(relay.sent().is_empty());
    }

    #[tokio::test]
    async fn test_relay_does_not_mutate_state() {
        let (machine, _client) = machine_with(ScriptedClient::default(), MemorySessionStore::new());
        machine.start().await.unwrap();
        machine.apply(ClientEvent::PairingCode("C1".into())).await;
        let before = machine.current_status();

        relay_pairing_code(&machine, &RecordingRelay::default(), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(machine.current_status(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_relay_times_out_as_delivery_failed() {
        let (machine, _client) = machine_with(ScriptedClient::default(), MemorySessionStore::new());
        machine.start().await.unwrap();
        machine.apply(ClientEvent::PairingCode("C1".into())).await;

        let relay = RecordingRelay {
            hang: true,
            ..Default::default()
        };
        let err = relay_pairing_code(&machine, &relay, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, RelayError::DeliveryFailed { status: None, .. }));
    }
}
