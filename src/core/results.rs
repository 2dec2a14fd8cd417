//! Result and response shapes produced by checks, remediations and aggregation.
//!
//! Field names serialize in camelCase to match what the HTTP layer returns.

use super::checks::CheckKey;
use super::remediation::SetupStep;
use crate::models::HostId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Verdict of a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CheckStatus {
    /// Every threshold satisfied
    Pass,
    /// Session succeeded but a threshold is unmet or the output was unparsable
    Fail,
    /// The session itself failed before a verdict could be formed
    Error,
}

/// Aggregate status of a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OverallStatus {
    Pass,
    Partial,
    Fail,
}

impl OverallStatus {
    /// `pass` when every validation passes, `fail` when none do, else `partial`.
    pub fn from_validations(validations: &[ValidationResult]) -> Self {
        let passed = validations
            .iter()
            .filter(|v| v.status == CheckStatus::Pass)
            .count();

        if passed == validations.len() {
            OverallStatus::Pass
        } else if passed > 0 {
            OverallStatus::Partial
        } else {
            OverallStatus::Fail
        }
    }
}

/// Outcome of one check against one host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub key: CheckKey,
    pub label: String,
    pub status: CheckStatus,
    pub message: String,
    /// Evidence: raw output, parsed values, per-threshold booleans
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

impl ValidationResult {
    pub fn new(key: CheckKey, status: CheckStatus, message: impl Into<String>, details: Value) -> Self {
        Self {
            key,
            label: key.label().to_string(),
            status,
            message: message.into(),
            details,
        }
    }

    pub fn pass(key: CheckKey, message: impl Into<String>, details: Value) -> Self {
        Self::new(key, CheckStatus::Pass, message, details)
    }

    pub fn fail(key: CheckKey, message: impl Into<String>, details: Value) -> Self {
        Self::new(key, CheckStatus::Fail, message, details)
    }

    /// Transport failure: no details, the message carries the failure text
    pub fn error(key: CheckKey, message: impl Into<String>) -> Self {
        Self::new(key, CheckStatus::Error, message, Value::Null)
    }

    pub fn is_pass(&self) -> bool {
        self.status == CheckStatus::Pass
    }
}

/// All checks for one host.
///
/// `overall_status` is derived from `validations` on construction and on every
/// mutation; there is no setter for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrereqCheckResult {
    host_id: HostId,
    host_label: String,
    timestamp: DateTime<Utc>,
    validations: Vec<ValidationResult>,
    overall_status: OverallStatus,
}

impl PrereqCheckResult {
    pub fn new(host_id: HostId, host_label: impl Into<String>, validations: Vec<ValidationResult>) -> Self {
        let overall_status = OverallStatus::from_validations(&validations);
        Self {
            host_id,
            host_label: host_label.into(),
            timestamp: Utc::now(),
            validations,
            overall_status,
        }
    }

    pub fn host_id(&self) -> HostId {
        self.host_id
    }

    pub fn host_label(&self) -> &str {
        &self.host_label
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn validations(&self) -> &[ValidationResult] {
        &self.validations
    }

    pub fn validation(&self, key: CheckKey) -> Option<&ValidationResult> {
        self.validations.iter().find(|v| v.key == key)
    }

    pub fn overall_status(&self) -> OverallStatus {
        self.overall_status
    }

    /// Replace the validation with the same key (or append it) and re-derive the status.
    pub fn upsert_validation(&mut self, validation: ValidationResult) {
        match self.validations.iter_mut().find(|v| v.key == validation.key) {
            Some(existing) => *existing = validation,
            None => self.validations.push(validation),
        }
        self.overall_status = OverallStatus::from_validations(&self.validations);
    }

    /// Keys whose check ended in `fail` (not `error`), in registration order
    pub fn failed_keys(&self) -> Vec<CheckKey> {
        self.validations
            .iter()
            .filter(|v| v.status == CheckStatus::Fail)
            .map(|v| v.key)
            .collect()
    }

    pub fn count(&self, status: CheckStatus) -> usize {
        self.validations.iter().filter(|v| v.status == status).count()
    }
}

/// Response for a single check
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub success: bool,
    pub host_id: HostId,
    pub host_label: String,
    pub timestamp: DateTime<Utc>,
    pub validation: ValidationResult,
}

/// A host whose validation call itself failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchError {
    pub host_id: HostId,
    pub error_message: String,
}

/// Fleet validation outcome.
///
/// Every requested host lands in exactly one of `results` or `errors`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<PrereqCheckResult>,
    pub errors: Vec<BatchError>,
}

impl BatchResult {
    pub fn from_parts(results: Vec<PrereqCheckResult>, errors: Vec<BatchError>) -> Self {
        Self {
            total: results.len() + errors.len(),
            successful: results.len(),
            failed: errors.len(),
            results,
            errors,
        }
    }
}

/// Outcome of one remediation step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum SetupOutcome {
    Completed { output: String },
    Failed { error: String },
}

impl SetupOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, SetupOutcome::Completed { .. })
    }
}

/// Step → outcome, for `setup_all` and `validate_and_fix`
pub type SetupReport = BTreeMap<SetupStep, SetupOutcome>;

/// `validate_and_fix` response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateAndFixResult {
    pub initial: PrereqCheckResult,
    pub setup_results: SetupReport,
    #[serde(rename = "final")]
    pub final_result: PrereqCheckResult,
    /// True when at least one remediation step was attempted
    pub fixes_attempted: bool,
}

/// Per-status counts in a health summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthCounts {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
}

/// A validation without its details
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationBrief {
    pub key: CheckKey,
    pub label: String,
    pub status: CheckStatus,
    pub message: String,
}

/// Compact health view of a host
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSummary {
    pub host_id: HostId,
    pub host_label: String,
    pub timestamp: DateTime<Utc>,
    pub overall_status: OverallStatus,
    /// Percentage of passing checks, rounded
    pub health_score: u8,
    pub summary: HealthCounts,
    pub validations: Vec<ValidationBrief>,
}

impl From<&PrereqCheckResult> for HealthSummary {
    fn from(result: &PrereqCheckResult) -> Self {
        let summary = HealthCounts {
            total: result.validations().len(),
            passed: result.count(CheckStatus::Pass),
            failed: result.count(CheckStatus::Fail),
            errors: result.count(CheckStatus::Error),
        };
        let health_score = if summary.total == 0 {
            0
        } else {
            ((summary.passed as f64 / summary.total as f64) * 100.0).round() as u8
        };

        Self {
            host_id: result.host_id(),
            host_label: result.host_label().to_string(),
            timestamp: result.timestamp(),
            overall_status: result.overall_status(),
            health_score,
            summary,
            validations: result
                .validations()
                .iter()
                .map(|v| ValidationBrief {
                    key: v.key,
                    label: v.label.clone(),
                    status: v.status,
                    message: v.message.clone(),
                })
                .collect(),
        }
    }
}
