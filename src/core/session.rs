//! Remote command execution abstraction
//!
//! This trait allows testing without real servers by supporting mock implementations.
//! The SSH implementation lives in `src/platform/ssh.rs`.

use crate::models::HostCredential;
use crate::utils::SessionError;

/// Raw result of one remote command, before the resolution policy is applied
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code reported when the channel closed
    pub exit_code: i32,
}

impl CommandOutput {
    /// Resolve the captured streams into the caller-visible outcome.
    ///
    /// A non-zero exit only fails the call when stdout is empty: diagnostic
    /// commands (`grep`, `id`, `getent`) routinely exit non-zero while still
    /// printing what the parser needs.
    pub fn into_result(self) -> Result<String, SessionError> {
        if self.exit_code != 0 && self.stdout.trim().is_empty() {
            let stderr = self.stderr.trim();
            return Err(SessionError::CommandFailed(if stderr.is_empty() {
                format!("command failed with code {}", self.exit_code)
            } else {
                stderr.to_string()
            }));
        }

        Ok(self.stdout)
    }
}

/// One-shot remote command execution
///
/// Every call opens its own session, runs exactly one command string and closes
/// the session on every exit path. Multi-step work is composed into a single
/// shell script by the caller. Implementations never retry.
#[async_trait::async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run `command` on the host described by `credential` and return its stdout.
    ///
    /// SECURITY: `command` may embed a password (user setup); implementations
    /// must not log it.
    async fn execute(
        &self,
        credential: &HostCredential,
        command: &str,
    ) -> Result<String, SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(stdout: &str, stderr: &str, exit_code: i32) -> CommandOutput {
        CommandOutput {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit_code,
        }
    }

    #[test]
    fn test_zero_exit_returns_stdout() {
        let result = output("uid=1001(wmuser)\n", "", 0).into_result();
        assert_eq!(result.unwrap(), "uid=1001(wmuser)\n");
    }

    #[test]
    fn test_nonzero_exit_with_stdout_still_succeeds() {
        let result = output("id: 'wmuser': no such user\n", "", 1).into_result();
        assert!(result.unwrap().contains("no such user"));
    }

    #[test]
    fn test_nonzero_exit_without_stdout_uses_stderr() {
        let err = output("", "sudo: a password is required\n", 1)
            .into_result()
            .unwrap_err();
        assert_eq!(err.to_string(), "sudo: a password is required");
    }

    #[test]
    fn test_nonzero_exit_without_any_output_reports_code() {
        let err = output("  \n", "", 127).into_result().unwrap_err();
        assert_eq!(err.to_string(), "command failed with code 127");
    }

    #[test]
    fn test_zero_exit_with_empty_stdout_is_ok() {
        assert_eq!(output("", "warning", 0).into_result().unwrap(), "");
    }
}
