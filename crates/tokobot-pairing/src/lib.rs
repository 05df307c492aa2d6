//! # tokobot-pairing
//!
//! The pairing-session state machine: sole owner of the client lifecycle
//! status and the current pairing code, plus the relay helper that reads
//! the code at call time.

mod machine;
mod relay;
mod state;

pub use machine::{PairingMachine, StartOutcome};
pub use relay::relay_pairing_code;
pub use state::{Disconnect, DisconnectKind, PairingState, Status, StatusSnapshot};
