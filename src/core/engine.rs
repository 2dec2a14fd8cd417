//! Validation and remediation engine
//!
//! [`PrereqEngine`] ties a [`CredentialResolver`] to a [`RemoteExecutor`] and
//! exposes the per-host and per-fleet operations. Failure containment:
//!
//! - a transport failure inside one check becomes that check's `error` verdict
//! - a host whose validation cannot start (unknown id, bad secret) becomes a
//!   batch `errors` entry
//! - a failed setup step is recorded in the report and the next step still runs
//!
//! Only malformed requests (bad options, empty batch) fail before remote work.

use super::checks::CheckKey;
use super::credential::CredentialResolver;
use super::options::PrereqOptions;
use super::remediation::{RemediationPaths, SetupStep};
use super::results::{
    BatchError, BatchResult, CheckResponse, CheckStatus, HealthSummary, OverallStatus,
    PrereqCheckResult, SetupOutcome, SetupReport, ValidateAndFixResult, ValidationResult,
};
use super::session::RemoteExecutor;
use crate::logger::{log_debug, log_error, log_info, log_warn};
use crate::models::{HostCredential, HostId};
use crate::normalize::{normalize_account_name, shell_quote};
use crate::utils::{PrereqError, SessionError};
use futures::future::join_all;

/// Prerequisite validation and remediation against remote hosts
pub struct PrereqEngine<R, E> {
    resolver: R,
    executor: E,
    paths: RemediationPaths,
}

impl<R: CredentialResolver, E: RemoteExecutor> PrereqEngine<R, E> {
    pub fn new(resolver: R, executor: E) -> Self {
        Self {
            resolver,
            executor,
            paths: RemediationPaths::default(),
        }
    }

    pub fn with_remediation_paths(mut self, paths: RemediationPaths) -> Self {
        self.paths = paths;
        self
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn remediation_paths(&self) -> &RemediationPaths {
        &self.paths
    }

    /// Label and fresh credential for `host`
    async fn resolve(&self, host: HostId) -> Result<(String, HostCredential), PrereqError> {
        let label = self.resolver.resolve_host_label(host).await?;
        let credential = self.resolver.resolve_credential(host).await?;
        Ok((label, credential))
    }

    /// Run one check; never fails.
    async fn run_check(
        &self,
        key: CheckKey,
        credential: &HostCredential,
        opts: &PrereqOptions,
    ) -> ValidationResult {
        let descriptor = key.descriptor();
        let command = (descriptor.command)(opts, &self.paths);

        match self.executor.execute(credential, &command).await {
            Ok(output) => {
                let result = (descriptor.parse)(&output, opts);
                log_debug(&format!(
                    "check {}: {:?} on {}",
                    key,
                    result.status,
                    credential.endpoint()
                ));
                result
            }
            Err(e) => {
                log_warn(&format!(
                    "check {}: ERROR on {}: {}",
                    key,
                    credential.endpoint(),
                    e
                ));
                ValidationResult::error(key, e.to_string())
            }
        }
    }

    /// Run one setup script. The script is never logged: it may carry a password.
    async fn run_step(
        &self,
        step: SetupStep,
        credential: &HostCredential,
        opts: &PrereqOptions,
    ) -> Result<String, SessionError> {
        log_info(&format!("setup {}: START on {}", step, credential.endpoint()));
        let script = step.script(opts, &self.paths);

        let result = self.executor.execute(credential, &script).await;
        match &result {
            Ok(_) => log_info(&format!("setup {}: OK on {}", step, credential.endpoint())),
            Err(e) => log_error(&format!(
                "setup {}: FAILED on {}: {}",
                step,
                credential.endpoint(),
                e
            )),
        }
        result
    }

    /// Run every check concurrently against `host`.
    ///
    /// Validations come back in [`CheckKey::ALL`] order whatever order the
    /// checks finish in.
    pub async fn validate_all(
        &self,
        host: HostId,
        options: &PrereqOptions,
    ) -> Result<PrereqCheckResult, PrereqError> {
        let opts = options.normalized()?;
        let (label, credential) = self.resolve(host).await?;
        log_info(&format!("validate_all: START host {} '{}'", host, label));

        let validations = join_all(
            CheckKey::ALL
                .iter()
                .map(|key| self.run_check(*key, &credential, &opts)),
        )
        .await;

        let result = PrereqCheckResult::new(host, label, validations);
        log_info(&format!(
            "validate_all: DONE host {} '{}' -> {:?}",
            host,
            result.host_label(),
            result.overall_status()
        ));
        Ok(result)
    }

    /// Run a single check
    pub async fn validate_one(
        &self,
        host: HostId,
        key: CheckKey,
        options: &PrereqOptions,
    ) -> Result<CheckResponse, PrereqError> {
        let opts = options.normalized()?;
        let (label, credential) = self.resolve(host).await?;
        log_info(&format!("validate_one: {} on host {} '{}'", key, host, label));

        let validation = self.run_check(key, &credential, &opts).await;
        Ok(CheckResponse {
            success: validation.status == CheckStatus::Pass,
            host_id: host,
            host_label: label,
            timestamp: chrono::Utc::now(),
            validation,
        })
    }

    /// Run one setup step and return its output; failures propagate.
    pub async fn run_setup(
        &self,
        host: HostId,
        step: SetupStep,
        options: &PrereqOptions,
    ) -> Result<String, PrereqError> {
        let opts = options.normalized()?;
        let credential = self.resolver.resolve_credential(host).await?;
        Ok(self.run_step(step, &credential, &opts).await?)
    }

    /// Ensure the group and user exist, set the password and membership
    pub async fn setup_user_group(
        &self,
        host: HostId,
        options: &PrereqOptions,
    ) -> Result<String, PrereqError> {
        self.run_setup(host, SetupStep::UserGroup, options).await
    }

    /// Write the resource-limit block for the application user
    pub async fn setup_ulimit(
        &self,
        host: HostId,
        options: &PrereqOptions,
    ) -> Result<String, PrereqError> {
        self.run_setup(host, SetupStep::Ulimit, options).await
    }

    /// Write and apply the kernel parameter block
    pub async fn setup_sysctl(
        &self,
        host: HostId,
        options: &PrereqOptions,
    ) -> Result<String, PrereqError> {
        self.run_setup(host, SetupStep::Sysctl, options).await
    }

    /// Run the setup step registered for `key`.
    ///
    /// Diagnostic-only checks fail with [`PrereqError::NoRemediation`] before
    /// any remote work.
    pub async fn fix_check(
        &self,
        host: HostId,
        key: CheckKey,
        options: &PrereqOptions,
    ) -> Result<String, PrereqError> {
        let step = key
            .descriptor()
            .remediation
            .ok_or_else(|| PrereqError::NoRemediation(key.to_string()))?;
        self.run_setup(host, step, options).await
    }

    async fn run_steps(
        &self,
        steps: &[SetupStep],
        credential: &HostCredential,
        opts: &PrereqOptions,
    ) -> SetupReport {
        let mut report = SetupReport::new();
        for step in steps {
            let outcome = match self.run_step(*step, credential, opts).await {
                Ok(output) => SetupOutcome::Completed { output },
                Err(e) => SetupOutcome::Failed {
                    error: e.to_string(),
                },
            };
            report.insert(*step, outcome);
        }
        report
    }

    /// Best-effort remediation: user/group, then ulimit, then sysctl when
    /// `include_sysctl` is set. Each step runs even if an earlier one failed.
    pub async fn setup_all(
        &self,
        host: HostId,
        options: &PrereqOptions,
    ) -> Result<SetupReport, PrereqError> {
        let opts = options.normalized()?;
        let credential = self.resolver.resolve_credential(host).await?;

        let mut steps = vec![SetupStep::UserGroup, SetupStep::Ulimit];
        if opts.include_sysctl {
            steps.push(SetupStep::Sysctl);
        }
        Ok(self.run_steps(&steps, &credential, &opts).await)
    }

    /// Validate, remediate every failed check that has a setup step (when
    /// `auto_fix` is set), validate again.
    ///
    /// Checks in `error` are not remediated: their transport already failed.
    pub async fn validate_and_fix(
        &self,
        host: HostId,
        options: &PrereqOptions,
    ) -> Result<ValidateAndFixResult, PrereqError> {
        let opts = options.normalized()?;
        let initial = self.validate_all(host, &opts).await?;

        let mut steps: Vec<SetupStep> = Vec::new();
        if opts.auto_fix && initial.overall_status() != OverallStatus::Pass {
            for key in initial.failed_keys() {
                if let Some(step) = key.descriptor().remediation {
                    if !steps.contains(&step) {
                        steps.push(step);
                    }
                }
            }
        }

        if steps.is_empty() {
            log_info(&format!(
                "validate_and_fix: nothing to remediate on host {} '{}'",
                host,
                initial.host_label()
            ));
            return Ok(ValidateAndFixResult {
                final_result: initial.clone(),
                initial,
                setup_results: SetupReport::new(),
                fixes_attempted: false,
            });
        }

        let credential = self.resolver.resolve_credential(host).await?;
        let setup_results = self.run_steps(&steps, &credential, &opts).await;
        let final_result = self.validate_all(host, &opts).await?;

        Ok(ValidateAndFixResult {
            initial,
            setup_results,
            final_result,
            fixes_attempted: true,
        })
    }

    /// Validate many hosts concurrently.
    ///
    /// Every id lands in `results` or `errors`; no host aborts the batch.
    pub async fn validate_batch(
        &self,
        hosts: &[HostId],
        options: &PrereqOptions,
    ) -> Result<BatchResult, PrereqError> {
        if hosts.is_empty() {
            return Err(PrereqError::InvalidRequest(
                "host id list cannot be empty".to_string(),
            ));
        }
        let opts = options.normalized()?;
        log_info(&format!("validate_batch: START {} hosts", hosts.len()));

        let outcomes = join_all(hosts.iter().map(|host| {
            let opts = &opts;
            async move { (*host, self.validate_all(*host, opts).await) }
        }))
        .await;

        let mut results = Vec::new();
        let mut errors = Vec::new();
        for (host, outcome) in outcomes {
            match outcome {
                Ok(result) => results.push(result),
                Err(e) => {
                    log_warn(&format!("validate_batch: host {} FAILED: {}", host, e));
                    errors.push(BatchError {
                        host_id: host,
                        error_message: e.to_string(),
                    });
                }
            }
        }

        let batch = BatchResult::from_parts(results, errors);
        log_info(&format!(
            "validate_batch: DONE {} ok, {} failed",
            batch.successful, batch.failed
        ));
        Ok(batch)
    }

    /// Pass/fail counts and a score for `host` under default options
    pub async fn health_summary(&self, host: HostId) -> Result<HealthSummary, PrereqError> {
        let result = self.validate_all(host, &PrereqOptions::default()).await?;
        Ok(HealthSummary::from(&result))
    }

    /// True when `passwd -S` reports a usable password for `username`.
    ///
    /// Transport failures are logged and read as `false`.
    pub async fn verify_user_password(
        &self,
        host: HostId,
        username: &str,
    ) -> Result<bool, PrereqError> {
        let username =
            normalize_account_name("username", username).map_err(PrereqError::InvalidRequest)?;
        let credential = self.resolver.resolve_credential(host).await?;
        let command = format!("sudo -n passwd -S {}", shell_quote(&username));

        match self.executor.execute(&credential, &command).await {
            Ok(output) => Ok(output.contains(&format!("{} P", username))),
            Err(e) => {
                log_warn(&format!(
                    "verify_user_password: host {} FAILED: {}",
                    host, e
                ));
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mock_session::*;

    fn engine(executor: MockExecutor) -> PrereqEngine<MockHosts, MockExecutor> {
        let hosts = MockHosts::new()
            .with_host(1, Some("db01"))
            .with_host(2, None)
            .with_host(3, Some("app03"));
        PrereqEngine::new(hosts, executor)
    }

    fn opts() -> PrereqOptions {
        PrereqOptions::default()
    }

    #[tokio::test]
    async fn test_validate_all_healthy_host_passes() {
        let engine = engine(MockExecutor::healthy());
        let result = engine.validate_all(HostId(1), &opts()).await.unwrap();

        assert_eq!(result.overall_status(), OverallStatus::Pass);
        assert_eq!(result.host_label(), "db01");
        let keys: Vec<CheckKey> = result.validations().iter().map(|v| v.key).collect();
        assert_eq!(keys, CheckKey::ALL.to_vec());
        assert_eq!(engine.executor().calls().len(), 7);
    }

    #[tokio::test]
    async fn test_auth_failure_in_one_check_is_isolated() {
        let executor = MockExecutor::healthy().fail(ROUTE_SYSCTL, "Authentication failed");
        let engine = engine(executor);
        let result = engine.validate_all(HostId(1), &opts()).await.unwrap();

        let sysctl = result.validation(CheckKey::Sysctl).unwrap();
        assert_eq!(sysctl.status, CheckStatus::Error);
        assert!(sysctl.message.contains("Authentication failed"));
        assert!(sysctl.details.is_null());
        assert_eq!(result.count(CheckStatus::Pass), 6);
        assert_eq!(result.overall_status(), OverallStatus::Partial);
    }

    #[tokio::test]
    async fn test_every_check_failing_is_overall_fail() {
        let mut executor = MockExecutor::healthy();
        for route in [
            ROUTE_USER_GROUP,
            ROUTE_ULIMIT,
            ROUTE_SECURITY_LIMITS,
            ROUTE_SYSCTL,
            ROUTE_JVM,
            ROUTE_THREAD_POOL,
            ROUTE_GC,
        ] {
            executor = executor.fail(route, "Connection refused");
        }
        let result = engine(executor)
            .validate_all(HostId(1), &opts())
            .await
            .unwrap();
        assert_eq!(result.overall_status(), OverallStatus::Fail);
        assert_eq!(result.count(CheckStatus::Error), 7);
    }

    #[tokio::test]
    async fn test_unknown_host_is_not_found_before_any_command() {
        let engine = engine(MockExecutor::healthy());
        let err = engine.validate_all(HostId(99), &opts()).await.unwrap_err();
        assert!(matches!(err, PrereqError::NotFound(HostId(99))));
        assert!(engine.executor().calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_options_rejected_before_remote_work() {
        let engine = engine(MockExecutor::healthy());
        let bad = opts().with_username("x; reboot");
        let err = engine.validate_all(HostId(1), &bad).await.unwrap_err();
        assert!(matches!(err, PrereqError::InvalidRequest(_)));
        assert!(engine.executor().calls().is_empty());
    }

    #[tokio::test]
    async fn test_label_falls_back_to_address() {
        let engine = engine(MockExecutor::healthy());
        let result = engine.validate_all(HostId(2), &opts()).await.unwrap();
        assert_eq!(result.host_label(), "10.0.0.2");
    }

    #[tokio::test]
    async fn test_validate_one_runs_a_single_command() {
        let engine = engine(MockExecutor::healthy().respond(ROUTE_JVM, "java version \"1.8.0_311\"\n---JAVA_HOME---\n/usr/java\n"));
        let response = engine
            .validate_one(HostId(3), CheckKey::Jvm, &opts())
            .await
            .unwrap();

        assert!(!response.success);
        assert_eq!(response.host_label, "app03");
        assert_eq!(response.validation.status, CheckStatus::Fail);
        assert_eq!(engine.executor().calls(), vec![ROUTE_JVM]);
    }

    #[tokio::test]
    async fn test_setup_failure_propagates_from_single_step() {
        let engine = engine(MockExecutor::healthy().fail(ROUTE_SETUP_ULIMIT, "sudo: a password is required"));
        let err = engine.setup_ulimit(HostId(1), &opts()).await.unwrap_err();
        assert!(matches!(err, PrereqError::Session(_)));

        let output = engine.setup_sysctl(HostId(1), &opts()).await.unwrap();
        assert!(output.contains("Current sysctl settings"));
    }

    #[tokio::test]
    async fn test_fix_check_uses_registry_mapping() {
        let engine = engine(MockExecutor::healthy());
        engine
            .fix_check(HostId(1), CheckKey::SecurityLimits, &opts())
            .await
            .unwrap();
        assert_eq!(engine.executor().calls(), vec![ROUTE_SETUP_ULIMIT]);

        let err = engine
            .fix_check(HostId(1), CheckKey::GarbageCollector, &opts())
            .await
            .unwrap_err();
        assert!(matches!(err, PrereqError::NoRemediation(ref key) if key == "garbageCollector"));
        assert_eq!(engine.executor().calls().len(), 1);
    }

    #[tokio::test]
    async fn test_setup_all_continues_after_a_failed_step() {
        let engine = engine(
            MockExecutor::healthy().fail(ROUTE_SETUP_USER_GROUP, "useradd: Permission denied"),
        );
        let report = engine.setup_all(HostId(1), &opts()).await.unwrap();

        assert_eq!(report.len(), 2);
        assert!(matches!(
            &report[&SetupStep::UserGroup],
            SetupOutcome::Failed { error } if error.contains("Permission denied")
        ));
        assert!(report[&SetupStep::Ulimit].is_completed());
        assert_eq!(engine.executor().count(ROUTE_SETUP_SYSCTL), 0);
    }

    #[tokio::test]
    async fn test_setup_all_includes_sysctl_on_request() {
        let engine = engine(MockExecutor::healthy());
        let mut options = opts();
        options.include_sysctl = true;
        let report = engine.setup_all(HostId(1), &options).await.unwrap();

        let steps: Vec<SetupStep> = report.keys().copied().collect();
        assert_eq!(steps, SetupStep::ALL.to_vec());
        assert_eq!(
            engine.executor().calls(),
            vec![ROUTE_SETUP_USER_GROUP, ROUTE_SETUP_ULIMIT, ROUTE_SETUP_SYSCTL]
        );
    }

    #[tokio::test]
    async fn test_validate_and_fix_on_passing_host_does_nothing() {
        let engine = engine(MockExecutor::healthy());
        let result = engine
            .validate_and_fix(HostId(1), &opts().with_auto_fix(true))
            .await
            .unwrap();

        assert!(!result.fixes_attempted);
        assert!(result.setup_results.is_empty());
        assert_eq!(result.initial, result.final_result);
        assert_eq!(engine.executor().setup_calls(), 0);
        assert_eq!(engine.executor().calls().len(), 7);
    }

    #[tokio::test]
    async fn test_validate_and_fix_without_auto_fix_only_reports() {
        let engine = engine(MockExecutor::healthy().respond(ROUTE_ULIMIT, "1024\n1024\n8192\n"));
        let result = engine.validate_and_fix(HostId(1), &opts()).await.unwrap();

        assert_eq!(result.initial.overall_status(), OverallStatus::Partial);
        assert!(!result.fixes_attempted);
        assert_eq!(engine.executor().setup_calls(), 0);
    }

    #[tokio::test]
    async fn test_validate_and_fix_remediates_mapped_failures_once() {
        let executor = MockExecutor::healthy()
            .respond(ROUTE_ULIMIT, "1024\n1024\n8192\n")
            .respond(ROUTE_SECURITY_LIMITS, "# empty\n---DIVIDER---\ntotal 0\n")
            .respond(ROUTE_SYSCTL, "vm.max_map_count = 65530\nfs.file-max = 500000\nnet.core.somaxconn = 4096\n")
            .respond(ROUTE_JVM, "sh: java: not found\n---JAVA_HOME---\n\n")
            .after_setup(ROUTE_SETUP_ULIMIT, ROUTE_ULIMIT, HEALTHY_ULIMIT)
            .after_setup(ROUTE_SETUP_ULIMIT, ROUTE_SECURITY_LIMITS, HEALTHY_SECURITY_LIMITS)
            .after_setup(ROUTE_SETUP_SYSCTL, ROUTE_SYSCTL, HEALTHY_SYSCTL);
        let engine = engine(executor);

        let result = engine
            .validate_and_fix(HostId(1), &opts().with_auto_fix(true))
            .await
            .unwrap();

        assert!(result.fixes_attempted);
        let steps: Vec<SetupStep> = result.setup_results.keys().copied().collect();
        assert_eq!(steps, vec![SetupStep::Ulimit, SetupStep::Sysctl]);
        assert_eq!(engine.executor().count(ROUTE_SETUP_ULIMIT), 1);
        assert_eq!(engine.executor().count(ROUTE_SETUP_USER_GROUP), 0);

        assert_eq!(result.initial.count(CheckStatus::Fail), 4);
        assert_eq!(result.final_result.failed_keys(), vec![CheckKey::Jvm]);
        assert_eq!(result.final_result.overall_status(), OverallStatus::Partial);
    }

    #[tokio::test]
    async fn test_validate_and_fix_records_failed_step_and_still_revalidates() {
        let executor = MockExecutor::healthy()
            .respond(ROUTE_USER_GROUP, "id: 'wmuser': no such user\n")
            .respond(ROUTE_SYSCTL, "")
            .fail(ROUTE_SETUP_USER_GROUP, "groupadd: Permission denied")
            .after_setup(ROUTE_SETUP_SYSCTL, ROUTE_SYSCTL, HEALTHY_SYSCTL);
        let engine = engine(executor);

        let result = engine
            .validate_and_fix(HostId(1), &opts().with_auto_fix(true))
            .await
            .unwrap();

        assert!(!result.setup_results[&SetupStep::UserGroup].is_completed());
        assert!(result.setup_results[&SetupStep::Sysctl].is_completed());
        assert_eq!(result.final_result.failed_keys(), vec![CheckKey::UserGroup]);
    }

    #[tokio::test]
    async fn test_errors_are_not_remediated() {
        let engine = engine(MockExecutor::healthy().fail(ROUTE_ULIMIT, "timeout"));
        let result = engine
            .validate_and_fix(HostId(1), &opts().with_auto_fix(true))
            .await
            .unwrap();
        assert!(!result.fixes_attempted);
        assert_eq!(engine.executor().setup_calls(), 0);
    }

    #[tokio::test]
    async fn test_batch_partitions_unknown_hosts_into_errors() {
        let engine = engine(MockExecutor::healthy().fail(ROUTE_GC, "Connection reset"));
        let ids = [HostId(1), HostId(42), HostId(3)];
        let batch = engine.validate_batch(&ids, &opts()).await.unwrap();

        assert_eq!(batch.total, 3);
        assert_eq!(batch.successful, 2);
        assert_eq!(batch.failed, 1);
        assert_eq!(batch.errors[0].host_id, HostId(42));
        assert_eq!(batch.errors[0].error_message, "Host 42 not found");
        for result in &batch.results {
            assert_eq!(result.overall_status(), OverallStatus::Partial);
        }
        let mut seen: Vec<HostId> = batch.results.iter().map(|r| r.host_id()).collect();
        seen.extend(batch.errors.iter().map(|e| e.host_id));
        seen.sort();
        assert_eq!(seen, vec![HostId(1), HostId(3), HostId(42)]);
    }

    #[tokio::test]
    async fn test_empty_batch_is_invalid() {
        let engine = engine(MockExecutor::healthy());
        let err = engine.validate_batch(&[], &opts()).await.unwrap_err();
        assert!(matches!(err, PrereqError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_health_summary_score() {
        let engine = engine(
            MockExecutor::healthy()
                .respond(ROUTE_GC, "No JVM process found\n")
                .fail(ROUTE_JVM, "Connection reset"),
        );
        let health = engine.health_summary(HostId(3)).await.unwrap();
        assert_eq!(health.summary.passed, 5);
        assert_eq!(health.summary.failed, 1);
        assert_eq!(health.summary.errors, 1);
        assert_eq!(health.health_score, 71);
        assert_eq!(health.overall_status, OverallStatus::Partial);
    }

    #[tokio::test]
    async fn test_verify_user_password() {
        let set = engine(MockExecutor::healthy());
        assert!(set.verify_user_password(HostId(1), "wmuser").await.unwrap());

        let locked = engine(MockExecutor::healthy().respond(
            ROUTE_PASSWD,
            "wmuser L 2024-01-01 0 99999 7 -1 (Password locked.)\n",
        ));
        assert!(!locked.verify_user_password(HostId(1), "wmuser").await.unwrap());

        let unreachable = engine(MockExecutor::healthy().fail(ROUTE_PASSWD, "timeout"));
        assert!(!unreachable.verify_user_password(HostId(1), "wmuser").await.unwrap());
        assert!(matches!(
            unreachable.verify_user_password(HostId(7), "wmuser").await,
            Err(PrereqError::NotFound(_))
        ));
        assert!(matches!(
            unreachable.verify_user_password(HostId(1), "bad name").await,
            Err(PrereqError::InvalidRequest(_))
        ));
    }
}
