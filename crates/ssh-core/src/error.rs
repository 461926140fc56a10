use thiserror::Error;

use crate::endpoint::Endpoint;

/// Errors that can occur in SSH core operations
#[derive(Error, Debug)]
pub enum SshCoreError {
    /// Invalid port number
    #[error("port must be a valid number between 0-65535: {0}")]
    InvalidPort(String),

    /// Invalid `host:port` specification
    #[error("invalid endpoint {spec}: {message}")]
    InvalidEndpoint { spec: String, message: String },

    /// Private key material could not be decoded
    #[error("failed to parse private key: {0}")]
    KeyParse(String),

    /// The remote end refused (or failed) to open a logical channel
    #[error("channel open to {target} failed: {reason}")]
    ChannelOpen { target: String, reason: String },

    /// The transport session has been closed locally or by the peer
    #[error("transport session is closed")]
    TransportClosed,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// SSH protocol error
    #[error("SSH protocol error: {0}")]
    Ssh(#[from] russh::Error),
}

/// Result type alias for SSH core operations
pub type SshResult<T> = Result<T, SshCoreError>;

impl SshCoreError {
    /// Create an invalid endpoint error
    pub fn invalid_endpoint(spec: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            spec: spec.into(),
            message: message.into(),
        }
    }

    /// Create a key parse error
    pub fn key_parse(message: impl Into<String>) -> Self {
        Self::KeyParse(message.into())
    }

    /// Create a channel open error for `target`
    pub fn channel_open(target: &Endpoint, reason: impl std::fmt::Display) -> Self {
        Self::ChannelOpen {
            target: target.to_string(),
            reason: reason.to_string(),
        }
    }
}
