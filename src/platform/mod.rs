//! Platform-specific implementations
//!
//! The only transport is SSH to Linux targets; everything in `core` talks to it
//! through the `RemoteExecutor` trait.

pub mod ssh;

pub use ssh::{SessionConfig, SshExecutor};
