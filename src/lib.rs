//! vmprereq - OS prerequisite validation and remediation over SSH
//!
//! Core library exposing the engine, its result model and the SSH transport.

// Public modules
pub mod config;
pub mod constants;
pub mod core;
pub mod logger;
pub mod models;
pub mod normalize;
pub mod utils;

// Transport implementations
pub mod platform;

// Re-export commonly used types
pub use crate::core::{
    BatchResult, CheckKey, CheckStatus, CredentialResolver, HostRecord, HostRegistry,
    OverallStatus, PrereqCheckResult, PrereqEngine, PrereqOptions, RemediationPaths,
    RemoteExecutor, SetupStep, StaticKey, ValidationResult,
};
pub use models::{HostCredential, HostId, SecureString, Username};
pub use platform::{SessionConfig, SshExecutor};
pub use utils::{CredentialError, PrereqError, SessionError};
