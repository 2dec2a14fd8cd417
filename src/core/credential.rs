//! Credential resolution and sealed secrets
//!
//! The engine only ever sees [`HostCredential`]s with plaintext secrets, fetched
//! fresh through a [`CredentialResolver`] for every operation. [`HostRegistry`]
//! is the in-process resolver: it keeps host records with sealed secrets and
//! opens them on demand with a key supplied by a [`KeyProvider`].
//!
//! Sealed format: AES-256-GCM with a random 16-byte IV, stored as
//! `hex(iv):hex(auth_tag):hex(ciphertext)`.

use crate::constants::DEFAULT_SSH_PORT;
use crate::models::{HostCredential, HostId, SecureString, Username};
use crate::utils::CredentialError;
use aes_gcm::aead::consts::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::AesGcm;
use async_trait::async_trait;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// AES-256-GCM with a 16-byte nonce
type SealCipher = AesGcm<Aes256, U16>;

const IV_LEN: usize = 16;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Source of host connection parameters
///
/// # Security
/// - Secrets returned here are plaintext; callers MUST NOT log or cache them
///   beyond a single operation
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Connection parameters for `host`, secrets already opened.
    ///
    /// Fails with [`CredentialError::NotFound`] for an unknown host.
    async fn resolve_credential(&self, host: HostId) -> Result<HostCredential, CredentialError>;

    /// Display name for `host`, falling back to its address.
    async fn resolve_host_label(&self, host: HostId) -> Result<String, CredentialError>;
}

/// Supplies the 256-bit key used to seal and open stored secrets
pub trait KeyProvider: Send + Sync {
    fn key(&self) -> Result<[u8; KEY_LEN], CredentialError>;
}

/// A key held in memory, zeroed on drop
pub struct StaticKey([u8; KEY_LEN]);

impl StaticKey {
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a key written as 64 hex characters
    pub fn from_hex(encoded: &str) -> Result<Self, CredentialError> {
        let bytes = hex::decode(encoded.trim())
            .map_err(|e| CredentialError::Key(format!("key is not valid hex: {}", e)))?;
        let bytes: [u8; KEY_LEN] = bytes.try_into().map_err(|v: Vec<u8>| {
            CredentialError::Key(format!("expected {} key bytes, got {}", KEY_LEN, v.len()))
        })?;
        Ok(Self(bytes))
    }
}

impl KeyProvider for StaticKey {
    fn key(&self) -> Result<[u8; KEY_LEN], CredentialError> {
        Ok(self.0)
    }
}

impl Drop for StaticKey {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl fmt::Debug for StaticKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticKey(***)")
    }
}

/// Seal `plaintext` as `iv:tag:ciphertext` (hex)
pub fn seal_secret(plaintext: &str, key: &[u8; KEY_LEN]) -> Result<String, CredentialError> {
    let cipher = SealCipher::new_from_slice(key).map_err(|_| CredentialError::Encrypt)?;

    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);

    let mut sealed = cipher
        .encrypt(GenericArray::from_slice(&iv), plaintext.as_bytes())
        .map_err(|_| CredentialError::Encrypt)?;
    let tag = sealed.split_off(sealed.len() - TAG_LEN);

    Ok(format!(
        "{}:{}:{}",
        hex::encode(iv),
        hex::encode(tag),
        hex::encode(sealed)
    ))
}

/// Open a value produced by [`seal_secret`].
///
/// An empty input opens to an empty secret.
pub fn open_secret(sealed: &str, key: &[u8; KEY_LEN]) -> Result<SecureString, CredentialError> {
    let sealed = sealed.trim();
    if sealed.is_empty() {
        return Ok(SecureString::new(String::new()));
    }

    let mut parts = sealed.split(':');
    let (Some(iv), Some(tag), Some(ciphertext), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(CredentialError::InvalidFormat(
            "expected iv:tag:ciphertext".to_string(),
        ));
    };

    let decode = |field: &str, value: &str| {
        hex::decode(value)
            .map_err(|e| CredentialError::InvalidFormat(format!("{} is not valid hex: {}", field, e)))
    };
    let iv = decode("iv", iv)?;
    let tag = decode("tag", tag)?;
    let mut payload = decode("ciphertext", ciphertext)?;

    if iv.len() != IV_LEN {
        return Err(CredentialError::InvalidFormat(format!(
            "iv must be {} bytes, got {}",
            IV_LEN,
            iv.len()
        )));
    }
    if tag.len() != TAG_LEN {
        return Err(CredentialError::InvalidFormat(format!(
            "tag must be {} bytes, got {}",
            TAG_LEN,
            tag.len()
        )));
    }
    payload.extend_from_slice(&tag);

    let cipher = SealCipher::new_from_slice(key).map_err(|_| CredentialError::Decrypt)?;
    let plaintext = cipher
        .decrypt(GenericArray::from_slice(&iv), payload.as_slice())
        .map_err(|_| CredentialError::Decrypt)?;

    String::from_utf8(plaintext)
        .map(SecureString::new)
        .map_err(|_| CredentialError::Decrypt)
}

fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}

/// A managed host as stored by the inventory
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostRecord {
    pub id: HostId,
    #[serde(default)]
    pub name: Option<String>,
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    /// Sealed password
    #[serde(default)]
    pub password: String,
    /// Sealed key passphrase
    #[serde(default)]
    pub passphrase: Option<String>,
}

impl fmt::Debug for HostRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("has_passphrase", &self.passphrase.is_some())
            .finish()
    }
}

impl HostRecord {
    /// Display label: the name when set, otherwise the address
    pub fn label(&self) -> String {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(self.address.trim())
            .to_string()
    }
}

/// In-memory [`CredentialResolver`] over sealed host records
pub struct HostRegistry<K: KeyProvider> {
    keys: K,
    hosts: BTreeMap<HostId, HostRecord>,
}

impl<K: KeyProvider> HostRegistry<K> {
    pub fn new(keys: K) -> Self {
        Self {
            keys,
            hosts: BTreeMap::new(),
        }
    }

    pub fn with_hosts(keys: K, records: impl IntoIterator<Item = HostRecord>) -> Self {
        let mut registry = Self::new(keys);
        for record in records {
            registry.insert(record);
        }
        registry
    }

    /// Add or replace a record, returning the previous one for that id
    pub fn insert(&mut self, record: HostRecord) -> Option<HostRecord> {
        self.hosts.insert(record.id, record)
    }

    pub fn get(&self, host: HostId) -> Option<&HostRecord> {
        self.hosts.get(&host)
    }

    pub fn host_ids(&self) -> Vec<HostId> {
        self.hosts.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    fn record(&self, host: HostId) -> Result<&HostRecord, CredentialError> {
        self.hosts.get(&host).ok_or(CredentialError::NotFound(host))
    }
}

#[async_trait]
impl<K: KeyProvider> CredentialResolver for HostRegistry<K> {
    async fn resolve_credential(&self, host: HostId) -> Result<HostCredential, CredentialError> {
        let record = self.record(host)?;
        let key = self.keys.key()?;

        let username = Username::new(record.username.clone())?;
        let secret = open_secret(&record.password, &key)?;
        let passphrase = record
            .passphrase
            .as_deref()
            .map(|p| open_secret(p, &key))
            .transpose()?;

        Ok(HostCredential::new(record.address.clone(), record.port, username, secret)
            .with_passphrase(passphrase))
    }

    async fn resolve_host_label(&self, host: HostId) -> Result<String, CredentialError> {
        self.record(host).map(HostRecord::label)
    }
}
