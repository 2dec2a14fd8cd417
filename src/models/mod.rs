//! # Domain Models
//!
//! Host identifiers and the credential snapshot handed to the SSH transport.
//!
//! ## Security Design
//!
//! The [`SecureString`] type provides memory-safe credential handling:
//! - Secret data is zeroed on drop to prevent leakage via swap/core dumps
//! - Never exposed in `Debug` or `Display` implementations
//!
//! A [`HostCredential`] is resolved fresh for every remote call and never
//! cached, so a rotated password takes effect on the next check.

pub mod credentials;

pub use credentials::{HostCredential, HostId, SecureString, Username};
