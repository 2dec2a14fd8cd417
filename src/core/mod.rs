//! Core business logic (transport-agnostic)
//!
//! CRITICAL: This module MUST NOT import `platform` code. Everything remote goes
//! through the `RemoteExecutor` and `CredentialResolver` traits.

pub mod checks;
pub mod credential;
pub mod engine;
pub mod options;
pub mod remediation;
pub mod results;
pub mod session;

// Scripted executor and resolver (tests only)
#[cfg(test)]
pub mod mock_session;

pub use checks::{CheckDescriptor, CheckKey, REGISTRY};
pub use credential::{
    open_secret, seal_secret, CredentialResolver, HostRecord, HostRegistry, KeyProvider,
    StaticKey,
};
pub use engine::PrereqEngine;
pub use options::PrereqOptions;
pub use remediation::{RemediationPaths, SetupStep};
pub use results::{
    BatchError, BatchResult, CheckResponse, CheckStatus, HealthCounts, HealthSummary,
    OverallStatus, PrereqCheckResult, SetupOutcome, SetupReport, ValidateAndFixResult,
    ValidationBrief, ValidationResult,
};
pub use session::{CommandOutput, RemoteExecutor};
