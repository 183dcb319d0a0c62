use std::io;

/// Custom error type for gitlab_irc_notify operations
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Malformed {event} payload: {source}")]
    MalformedPayload {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unrecognized event type: {0}")]
    UnrecognizedEventType(String),

    #[error("Missing required header: {0}")]
    MissingRequiredHeader(&'static str),

    #[error("Render failure: {0}")]
    RenderFailure(String),

    #[error("Delivery to '{channel}' failed: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IRC connection failed: {0}")]
    IrcConnection(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParseError(#[from] toml::de::Error),
}

/// Helper type for Results that use NotifyError
pub type Result<T> = std::result::Result<T, NotifyError>;
