//! Error types for vmprereq
//!
//! All error types use thiserror for clean error handling.
//! SECURITY: Error messages MUST NOT contain passwords or sensitive data.

use crate::models::HostId;
use std::time::Duration;

/// Top-level error type for engine operations
#[derive(Debug, thiserror::Error)]
pub enum PrereqError {
    #[error("Host {0} not found")]
    NotFound(HostId),

    #[error("Credential error: {0}")]
    Credential(CredentialError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unknown check '{0}'")]
    UnknownCheck(String),

    #[error("Check '{0}' has no remediation")]
    NoRemediation(String),
}

impl From<CredentialError> for PrereqError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::NotFound(id) => PrereqError::NotFound(id),
            other => PrereqError::Credential(other),
        }
    }
}

/// Errors from the remote session transport
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("SSH connect to {endpoint} failed: {reason}")]
    Connection { endpoint: String, reason: String },

    #[error("SSH handshake failed: {0}")]
    Handshake(String),

    #[error("SSH authentication failed for user '{username}': {reason}")]
    Authentication { username: String, reason: String },

    #[error("SSH channel error: {0}")]
    Channel(String),

    /// Non-zero exit with no stdout; carries stderr or a generic message
    #[error("{0}")]
    CommandFailed(String),

    #[error("SSH operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("SSH worker task failed: {0}")]
    Task(String),
}

/// Errors from credential resolution
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Host {0} not found")]
    NotFound(HostId),

    #[error("Invalid sealed secret: {0}")]
    InvalidFormat(String),

    #[error("Failed to decrypt stored secret")]
    Decrypt,

    #[error("Failed to seal secret")]
    Encrypt,

    #[error("Encryption key unavailable: {0}")]
    Key(String),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),
}

/// Errors loading the host inventory
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Host {0} is listed more than once")]
    DuplicateHost(HostId),

    #[error("Invalid inventory: {0}")]
    Invalid(String),
}
