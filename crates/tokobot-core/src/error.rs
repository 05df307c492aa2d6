use thiserror::Error;

/// Top-level error type for tokobot.
#[derive(Debug, Error)]
pub enum TokoError {
    /// Missing or malformed configuration. Fatal at startup.
    #[error("config error: {0}")]
    Config(String),

    /// Session store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Pairing-code relay failure.
    #[error(transparent)]
    Relay(#[from] RelayError),

    /// Error from the messaging client.
    #[error("channel error: {0}")]
    Channel(String),

    /// Error from an AI provider.
    #[error("provider error: {0}")]
    Provider(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TokoError {
    /// Stable machine-readable code for HTTP bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::Store(e) => e.code(),
            Self::Relay(e) => e.code(),
            Self::Channel(_) => "channel_error",
            Self::Provider(_) => "provider_error",
            Self::Io(_) => "io_error",
            Self::Serialization(_) => "serialization_error",
        }
    }
}

/// Session store failure. Always retryable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be reached, failed the query, or timed out.
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "store_unavailable",
        }
    }
}

/// Failure delivering a pairing code to the operator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// A required relay setting (named) is missing.
    #[error("relay not configured: {0} is not set")]
    NotConfigured(&'static str),

    /// The upstream API rejected the request or could not be reached.
    #[error("relay delivery failed{}: {message}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
    DeliveryFailed {
        status: Option<u16>,
        message: String,
    },

    /// There is no pairing code to relay (client is not awaiting a scan).
    #[error("no pairing code available")]
    NoCodeAvailable,
}

impl RelayError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotConfigured(_) => "not_configured",
            Self::DeliveryFailed { .. } => "delivery_failed",
            Self::NoCodeAvailable => "no_code_available",
        }
    }
}
