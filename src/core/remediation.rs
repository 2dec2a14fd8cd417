//! Remediation scripts
//!
//! Each setup step is one POSIX `sh` script sent through a single
//! [`RemoteExecutor`](super::session::RemoteExecutor) call. Scripts own a
//! tagged block in the files they touch:
//!
//! ```text
//! # BEGIN vmprereq <block>
//! ...
//! # END vmprereq <block>
//! ```
//!
//! and delete that block before appending it again, so running a step any
//! number of times leaves exactly one copy behind.
//!
//! All values reaching a script have been through [`PrereqOptions::normalized`]
//! and are shell-quoted on top of that.

use super::options::PrereqOptions;
use crate::constants::{
    BLOCK_MARKER, DEFAULT_LIMITS_CONF, DEFAULT_SYSCTL_CONF, SYSCTL_ENTRIES, SYSCTL_PARAMS,
    ULIMIT_ENTRIES,
};
use crate::normalize::{regex_escape_account, shell_quote};
use crate::utils::PrereqError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A remediation operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SetupStep {
    UserGroup,
    Ulimit,
    Sysctl,
}

impl SetupStep {
    pub const ALL: [SetupStep; 3] = [SetupStep::UserGroup, SetupStep::Ulimit, SetupStep::Sysctl];

    pub fn as_str(&self) -> &'static str {
        match self {
            SetupStep::UserGroup => "userGroup",
            SetupStep::Ulimit => "ulimit",
            SetupStep::Sysctl => "sysctl",
        }
    }

    /// Full script for this step
    pub fn script(&self, opts: &PrereqOptions, paths: &RemediationPaths) -> String {
        match self {
            SetupStep::UserGroup => user_group_script(opts, paths),
            SetupStep::Ulimit => ulimit_script(&opts.username, paths),
            SetupStep::Sysctl => sysctl_script(paths),
        }
    }
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SetupStep {
    type Err = PrereqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();

        SetupStep::ALL
            .iter()
            .copied()
            .find(|step| step.as_str().to_ascii_lowercase() == folded)
            .ok_or_else(|| PrereqError::InvalidRequest(format!("unknown setup step '{}'", s.trim())))
    }
}

/// Where remediation scripts write, and how they elevate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemediationPaths {
    /// PAM limits file rewritten by the ulimit step
    pub limits_conf: String,
    /// Kernel parameter file rewritten by the sysctl step
    pub sysctl_conf: String,
    /// Prefix privileged commands with `sudo -n`
    pub use_sudo: bool,
    /// Program invoked as `<sysctl_command> -p <file>`; operator configuration,
    /// inserted verbatim
    pub sysctl_command: String,
}

impl Default for RemediationPaths {
    fn default() -> Self {
        Self {
            limits_conf: DEFAULT_LIMITS_CONF.to_string(),
            sysctl_conf: DEFAULT_SYSCTL_CONF.to_string(),
            use_sudo: true,
            sysctl_command: "sysctl".to_string(),
        }
    }
}

impl RemediationPaths {
    fn sudo(&self) -> &'static str {
        if self.use_sudo {
            "sudo -n "
        } else {
            ""
        }
    }
}

fn begin_marker(block: &str) -> String {
    format!("# BEGIN {} {}", BLOCK_MARKER, block)
}

fn end_marker(block: &str) -> String {
    format!("# END {} {}", BLOCK_MARKER, block)
}

/// `printf` invocation emitting each line of `lines`, quoted
fn printf_lines(lines: &[String]) -> String {
    let quoted: Vec<String> = lines.iter().map(|l| shell_quote(l)).collect();
    format!("printf '%s\\n' {}", quoted.join(" "))
}

/// Create the group and user if absent, set the password, ensure membership.
///
/// The script embeds the password and must never be logged.
pub fn user_group_script(opts: &PrereqOptions, paths: &RemediationPaths) -> String {
    let sudo = paths.sudo();
    let user = shell_quote(&opts.username);
    let group = shell_quote(&opts.group);
    let credentials = shell_quote(&format!("{}:{}", opts.username, opts.password));

    [
        "set -e".to_string(),
        format!("{sudo}groupadd -f {group}"),
        format!(
            "id -u {user} >/dev/null 2>&1 || {sudo}useradd -m -g {group} -s /bin/bash {user} || echo \"User already exists\""
        ),
        format!("printf '%s\\n' {credentials} | {sudo}chpasswd"),
        format!("{sudo}usermod -aG {group} {user}"),
        format!("id {user}"),
    ]
    .join("\n")
}

/// Back up the limits file, drop any previous block and stray lines for the
/// user, append the threshold block, print the user's lines.
pub fn ulimit_script(username: &str, paths: &RemediationPaths) -> String {
    let sudo = paths.sudo();
    let block = format!("limits {}", username);
    let pattern = regex_escape_account(username);

    let mut lines = vec![begin_marker(&block)];
    lines.extend(
        ULIMIT_ENTRIES
            .iter()
            .map(|(kind, item, value)| format!("{} {} {} {}", username, kind, item, value)),
    );
    lines.push(end_marker(&block));

    [
        "set -e".to_string(),
        format!("F={}", shell_quote(&paths.limits_conf)),
        format!("if [ -f \"$F\" ]; then {sudo}cp \"$F\" \"$F.{BLOCK_MARKER}.bak\"; fi"),
        format!("{sudo}touch \"$F\""),
        format!(
            "{sudo}sed -i -e '/^# BEGIN {m} limits {p}$/,/^# END {m} limits {p}$/d' -e '/^{p}[[:space:]]/d' \"$F\"",
            m = BLOCK_MARKER,
            p = pattern
        ),
        format!("{} | {sudo}tee -a \"$F\" >/dev/null", printf_lines(&lines)),
        format!("echo \"Current limits for {}:\"", username),
        format!("grep -E '^{}[[:space:]]' \"$F\"", pattern),
    ]
    .join("\n")
}

/// Back up the sysctl file, replace the tagged block, apply it and print the
/// resulting values.
pub fn sysctl_script(paths: &RemediationPaths) -> String {
    let sudo = paths.sudo();

    let mut lines = vec![begin_marker("sysctl")];
    lines.extend(
        SYSCTL_ENTRIES
            .iter()
            .map(|(name, value)| format!("{} = {}", name, value)),
    );
    lines.push(end_marker("sysctl"));

    [
        "set -e".to_string(),
        format!("F={}", shell_quote(&paths.sysctl_conf)),
        format!("if [ -f \"$F\" ]; then {sudo}cp \"$F\" \"$F.{BLOCK_MARKER}.bak\"; fi"),
        format!("{sudo}touch \"$F\""),
        format!(
            "{sudo}sed -i '/^# BEGIN {m} sysctl$/,/^# END {m} sysctl$/d' \"$F\"",
            m = BLOCK_MARKER
        ),
        format!("{} | {sudo}tee -a \"$F\" >/dev/null", printf_lines(&lines)),
        format!("{sudo}{} -p \"$F\" >/dev/null", paths.sysctl_command),
        "echo \"Current sysctl settings:\"".to_string(),
        format!("{} {}", paths.sysctl_command, SYSCTL_PARAMS.join(" ")),
    ]
    .join("\n")
}
