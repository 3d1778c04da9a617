//! Error types shared across the engine.
//!
//! None of these escape the public engine operations: they are logged at the
//! boundary where a failure is recovered (defaults, skipped channel, `false`).

use std::io;

use thiserror::Error;

/// Failure reading or writing the persistent key/value store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io: {0}")]
    Io(#[from] io::Error),
    #[error("storage encoding: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Failure handing a payload to an outbound channel (email, WhatsApp, push).
#[derive(Debug, Error)]
#[error("{channel} channel: {reason}")]
pub struct ChannelError {
    pub channel: &'static str,
    pub reason: String,
}

impl ChannelError {
    pub fn new(channel: &'static str, reason: impl Into<String>) -> Self {
        Self {
            channel,
            reason: reason.into(),
        }
    }
}

/// Failure reported by the host notification platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("notifications are not supported on this platform")]
    Unsupported,
    #[error("platform notification error: {0}")]
    Host(String),
}

/// Rejected `HH:MM` wall-clock value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid clock time {0:?}, expected HH:MM")]
pub struct ClockParseError(pub String);

/// Failure loading or saving the engine configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io: {0}")]
    Io(#[from] io::Error),
    #[error("config encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}
