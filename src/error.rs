use std::time::Duration;

use thiserror::Error;

/// Top-level error type for the driftkit library.
#[derive(Error, Debug)]
pub enum DriftError {
    /// Transport level failure (DNS, connection refused, TLS).
    #[error("network: {0}")]
    Network(String),
    /// The operation did not settle before its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    /// Unexpected HTTP status code.
    #[error("http status {0}")]
    Http(u16),
    /// Malformed response or invalid measurement.
    #[error("protocol: {0}")]
    Protocol(String),
    /// Invalid configuration or catalog file.
    #[error("config: {0}")]
    Config(String),
    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Other error cases.
    #[error("other: {0}")]
    Other(String),
}

impl From<reqwest::Error> for DriftError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not carry the configured deadline in its error
            DriftError::Timeout(Duration::ZERO)
        } else if let Some(status) = err.status() {
            DriftError::Http(status.as_u16())
        } else if err.is_decode() {
            DriftError::Protocol(err.to_string())
        } else {
            DriftError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DriftError {
    fn from(err: serde_json::Error) -> Self {
        DriftError::Protocol(err.to_string())
    }
}

impl From<toml::de::Error> for DriftError {
    fn from(err: toml::de::Error) -> Self {
        DriftError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DriftError {
    fn from(err: toml::ser::Error) -> Self {
        DriftError::Config(err.to_string())
    }
}
