//! Domain model types for host credentials
//!
//! SECURITY: Credential types implement Drop to clear sensitive data and never
//! reveal secrets through `Debug`.

use crate::constants::DEFAULT_SSH_PORT;
use crate::utils::CredentialError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a managed host, as assigned by the host inventory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(pub u64);

impl HostId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for HostId {
    fn from(value: u64) -> Self {
        HostId(value)
    }
}

/// SSH login name
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Username(String);

impl Username {
    /// Create a new username after validation
    pub fn new(username: impl Into<String>) -> Result<Self, CredentialError> {
        let username = username.into();
        let trimmed = username.trim();

        if trimmed.is_empty() {
            return Err(CredentialError::InvalidUsername(
                "Username cannot be empty".to_string(),
            ));
        }

        if trimmed.len() > 256 {
            return Err(CredentialError::InvalidUsername(
                "Username exceeds maximum length (256)".to_string(),
            ));
        }

        Ok(Username(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for Username {
    type Error = CredentialError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Username::new(value)
    }
}

/// Secret that zeros memory on drop
///
/// SECURITY: This type never implements Display or Debug in a way that reveals the secret.
pub struct SecureString(String);

impl Clone for SecureString {
    fn clone(&self) -> Self {
        SecureString(self.0.clone())
    }
}

impl SecureString {
    pub fn new(secret: impl Into<String>) -> Self {
        SecureString(secret.into())
    }

    /// Borrow the plaintext.
    ///
    /// Use this sparingly and only when handing the secret to the transport.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Drop for SecureString {
    fn drop(&mut self) {
        // SAFETY: We own this String and are zeroing it before drop
        unsafe {
            let bytes = self.0.as_bytes_mut();
            for byte in bytes {
                std::ptr::write_volatile(byte, 0);
            }
        }
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureString(*** {} bytes ***)", self.0.len())
    }
}

/// Connection parameters for one host, with the secret already decrypted.
///
/// A fresh snapshot is resolved for every remote call and dropped afterwards;
/// nothing caches it.
#[derive(Clone)]
pub struct HostCredential {
    address: String,
    port: u16,
    username: Username,
    secret: SecureString,
    passphrase: Option<SecureString>,
}

impl HostCredential {
    pub fn new(
        address: impl Into<String>,
        port: u16,
        username: Username,
        secret: SecureString,
    ) -> Self {
        let port = if port == 0 { DEFAULT_SSH_PORT } else { port };
        HostCredential {
            address: address.into().trim().to_string(),
            port,
            username,
            secret,
            passphrase: None,
        }
    }

    pub fn with_passphrase(mut self, passphrase: Option<SecureString>) -> Self {
        self.passphrase = passphrase.filter(|p| !p.is_empty());
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &Username {
        &self.username
    }

    pub fn secret(&self) -> &SecureString {
        &self.secret
    }

    pub fn passphrase(&self) -> Option<&SecureString> {
        self.passphrase.as_ref()
    }

    /// `address:port`, for logs and error messages
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

impl fmt::Debug for HostCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostCredential")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("username", &self.username.as_str())
            .field("secret", &self.secret)
            .field("has_passphrase", &self.passphrase.is_some())
            .finish()
    }
}
