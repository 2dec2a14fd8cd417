//! # Utilities Module
//!
//! Cross-cutting concerns shared by `core` and `platform`.
//!
//! Error types are defined here to avoid circular dependencies between the
//! `core` and `platform` modules. The taxonomy follows how failures surface to
//! callers:
//!
//! - [`SessionError`]: transport failures (connect, auth, exec, timeout). Checks
//!   turn these into `status = error` verdicts instead of propagating them.
//! - [`CredentialError`]: host lookup and secret decryption.
//! - [`PrereqError`]: what engine operations return (not found, invalid request,
//!   or a transport failure from a remediation step).
//! - [`ConfigError`]: inventory loading for the binary.
//!
//! Nothing here retries: a failed attempt is surfaced once and the caller
//! decides whether to re-invoke.

pub mod errors;

pub use errors::{ConfigError, CredentialError, PrereqError, SessionError};
