//! Pairing state record and its read-only views.

use serde::Serialize;

/// Client lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Idle,
    Connecting,
    AwaitingScan,
    Ready,
    Disconnected,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::AwaitingScan => "awaiting_scan",
            Self::Ready => "ready",
            Self::Disconnected => "disconnected",
        }
    }

    /// A client is running or starting; `start()` must not launch another.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::AwaitingScan | Self::Ready)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the client last stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectKind {
    /// Connection dropped; the stored session is still valid.
    Network,
    /// The session was rejected; it has been (or will be) erased.
    AuthFailure,
    /// Explicit logout.
    Logout,
    /// The client failed to launch.
    InitFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Disconnect {
    pub kind: DisconnectKind,
    pub reason: String,
}

/// The pairing code only exists inside `AwaitingScan`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Phase {
    Idle,
    Connecting,
    AwaitingScan { code: String },
    Ready,
    Disconnected(Disconnect),
}

/// The process-wide pairing state. Mutated only by [`crate::PairingMachine`].
#[derive(Debug, Clone)]
pub struct PairingState {
    pub(crate) phase: Phase,
    pub(crate) client_identity: String,
    pub(crate) last_disconnect: Option<Disconnect>,
    /// An auth-failure delete did not reach the store; erase before the next resume.
    pub(crate) purge_pending: bool,
}

impl PairingState {
    pub(crate) fn new(client_identity: String) -> Self {
        Self {
            phase: Phase::Idle,
            client_identity,
            last_disconnect: None,
            purge_pending: false,
        }
    }

    pub fn status(&self) -> Status {
        match self.phase {
            Phase::Idle => Status::Idle,
            Phase::Connecting => Status::Connecting,
            Phase::AwaitingScan { .. } => Status::AwaitingScan,
            Phase::Ready => Status::Ready,
            Phase::Disconnected(_) => Status::Disconnected,
        }
    }

    pub fn pairing_code(&self) -> Option<&str> {
        match &self.phase {
            Phase::AwaitingScan { code } => Some(code),
            _ => None,
        }
    }

    pub fn client_identity(&self) -> &str {
        &self.client_identity
    }

    pub fn last_disconnect(&self) -> Option<&Disconnect> {
        self.last_disconnect.as_ref()
    }

    pub fn purge_pending(&self) -> bool {
        self.purge_pending
    }

    pub(crate) fn disconnect(&mut self, kind: DisconnectKind, reason: impl Into<String>) {
        let d = Disconnect {
            kind,
            reason: reason.into(),
        };
        self.last_disconnect = Some(d.clone());
        self.phase = Phase::Disconnected(d);
    }

    pub(crate) fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            status: self.status(),
            pairing_code: self.pairing_code().map(str::to_string),
        }
    }
}

/// `(status, pairing_code)` at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub status: Status,
    pub pairing_code: Option<String>,
}
