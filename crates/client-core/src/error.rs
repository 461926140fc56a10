use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in client-core operations
#[derive(Error, Debug)]
pub enum ClientError {
    /// The private key file could not be read
    #[error("failed to read private key {}: {source}", path.display())]
    KeyRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The private key could not be decoded
    #[error("failed to parse private key: {0}")]
    KeyParse(String),

    /// The remote could not be reached or the handshake failed
    #[error("failed to connect to {address}: {reason}")]
    Connect { address: String, reason: String },

    /// Authentication failed
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The remote refused to open a logical channel
    #[error("channel open to {target} failed: {reason}")]
    ChannelOpen { target: String, reason: String },

    /// The transport session has been closed
    #[error("transport session is closed")]
    TransportClosed,

    /// SSH error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Result type alias for client-core operations
pub type ClientResult<T> = Result<T, ClientError>;

impl From<ssh_core::SshCoreError> for ClientError {
    fn from(err: ssh_core::SshCoreError) -> Self {
        use ssh_core::SshCoreError;

        match err {
            SshCoreError::KeyParse(message) => ClientError::KeyParse(message),
            SshCoreError::ChannelOpen { target, reason } => ClientError::ChannelOpen { target, reason },
            SshCoreError::TransportClosed => ClientError::TransportClosed,
            SshCoreError::Ssh(err) => ClientError::Ssh(err),
            SshCoreError::Io(err) => ClientError::Io(err),
            other => ClientError::Other(other.to_string()),
        }
    }
}
