//! Error types, one enum per concern.
//!
//! None of these are fatal to a running feed except [`ConfigError`] and
//! [`LogError`], which can only occur at start-up.

use std::path::PathBuf;

/// Failure to turn a raw frame into a [`Message`](crate::message::Message).
///
/// Decode errors are per-message: the payload is logged and dropped, the
/// connection stays up.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The payload is not valid JSON or does not match the wire schema.
    #[error("malformed message payload: {0}")]
    Json(#[from] serde_json::Error),

    /// A binary frame did not contain UTF-8 text.
    #[error("binary frame is not valid UTF-8")]
    NotUtf8,

    /// A super chat arrived without a positive price.
    #[error("superchat from {user:?} has no positive price")]
    MissingPrice {
        /// Sender of the offending message.
        user: String,
    },

    /// A price was negative or not a finite number.
    #[error("invalid price {0}")]
    InvalidPrice(f64),

    /// The timestamp could not be interpreted.
    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),
}

/// Failure of the streaming connection.
///
/// Every variant leads to the same recovery: disconnect, back off, retry.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Opening the connection failed.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        /// Endpoint that was dialed.
        endpoint: String,
        /// Underlying websocket error.
        #[source]
        source: Box<tungstenite::Error>,
    },

    /// The established connection failed while reading.
    #[error("connection error: {0}")]
    Socket(#[from] tungstenite::Error),

    /// Socket-level I/O failure outside the websocket protocol.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the connection.
    #[error("connection closed by peer")]
    Closed,
}

/// Failure to set up file logging.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The log file or its directory could not be created.
    #[error("cannot open log file: {0}")]
    Io(#[from] std::io::Error),

    /// A global subscriber is already installed.
    #[error("logging is already initialized: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}

/// Invalid or unreadable configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`FeedConfig`](crate::config::FeedConfig).
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that was parsed.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: Box<toml::de::Error>,
    },

    /// A value is out of range or inconsistent with another value.
    #[error("invalid config: {0}")]
    Invalid(String),
}
