//! Prerequisite checks
//!
//! Each check is a diagnostic command plus a parser that turns the command's
//! stdout into a [`ValidationResult`]. Commands are pure functions of the
//! (already normalised) options and the remediation targets; parsers never fail, and anything they cannot
//! read becomes a zero or `false` that fails its threshold.
//!
//! The table in [`REGISTRY`] is the single place that ties a [`CheckKey`] to
//! its command, parser and optional remediation step.

use super::options::PrereqOptions;
use super::remediation::{RemediationPaths, SetupStep};
use super::results::ValidationResult;
use crate::constants::{
    DEFAULT_LIMITS_DIR, JVM_MIN_MAJOR_VERSION, MODERN_GC_FLAGS,
    SYSCTL_FILE_MAX_MIN, SYSCTL_MAX_MAP_COUNT_MIN, SYSCTL_PARAMS, SYSCTL_SOMAXCONN_MIN,
    ULIMIT_NOFILE_MIN, ULIMIT_NPROC_MIN, ULIMIT_STACK_KB_MIN,
};
use crate::normalize::shell_quote;
use crate::utils::PrereqError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

const LIMITS_DIVIDER: &str = "---DIVIDER---";
const JAVA_HOME_DIVIDER: &str = "---JAVA_HOME---";
const NO_THREAD_POOL: &str = "No thread pool config found";
const NO_JVM_PROCESS: &str = "No JVM process found";

/// Stable identifier of a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CheckKey {
    UserGroup,
    Ulimit,
    SecurityLimits,
    Sysctl,
    Jvm,
    ThreadPool,
    GarbageCollector,
}

impl CheckKey {
    /// Registration order; `validate_all` reports validations in this order
    pub const ALL: [CheckKey; 7] = [
        CheckKey::UserGroup,
        CheckKey::Ulimit,
        CheckKey::SecurityLimits,
        CheckKey::Sysctl,
        CheckKey::Jvm,
        CheckKey::ThreadPool,
        CheckKey::GarbageCollector,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKey::UserGroup => "userGroup",
            CheckKey::Ulimit => "ulimit",
            CheckKey::SecurityLimits => "securityLimits",
            CheckKey::Sysctl => "sysctl",
            CheckKey::Jvm => "jvm",
            CheckKey::ThreadPool => "threadPool",
            CheckKey::GarbageCollector => "garbageCollector",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CheckKey::UserGroup => "User & Group Setup",
            CheckKey::Ulimit => "Ulimit Configuration",
            CheckKey::SecurityLimits => "Security Limits",
            CheckKey::Sysctl => "Sysctl Configuration",
            CheckKey::Jvm => "JVM Installation",
            CheckKey::ThreadPool => "Thread Pool Settings",
            CheckKey::GarbageCollector => "Garbage Collector Config",
        }
    }

    /// Registry entry for this key
    pub fn descriptor(&self) -> &'static CheckDescriptor {
        &REGISTRY[*self as usize]
    }
}

impl fmt::Display for CheckKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckKey {
    type Err = PrereqError;

    /// Accepts the camelCase key as well as kebab-case and snake_case spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();

        CheckKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str().to_ascii_lowercase() == folded)
            .ok_or_else(|| PrereqError::UnknownCheck(s.trim().to_string()))
    }
}

/// One row of the check table
pub struct CheckDescriptor {
    pub key: CheckKey,
    /// Setup step that can repair a failed verdict, if any
    pub remediation: Option<SetupStep>,
    pub command: fn(&PrereqOptions, &RemediationPaths) -> String,
    pub parse: fn(&str, &PrereqOptions) -> ValidationResult,
}

impl fmt::Debug for CheckDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckDescriptor")
            .field("key", &self.key)
            .field("remediation", &self.remediation)
            .finish()
    }
}

/// Indexed by `CheckKey as usize`; order must match [`CheckKey::ALL`].
pub static REGISTRY: [CheckDescriptor; 7] = [
    CheckDescriptor {
        key: CheckKey::UserGroup,
        remediation: Some(SetupStep::UserGroup),
        command: user_group_command,
        parse: parse_user_group,
    },
    CheckDescriptor {
        key: CheckKey::Ulimit,
        remediation: Some(SetupStep::Ulimit),
        command: ulimit_command,
        parse: parse_ulimit,
    },
    CheckDescriptor {
        key: CheckKey::SecurityLimits,
        remediation: Some(SetupStep::Ulimit),
        command: security_limits_command,
        parse: parse_security_limits,
    },
    CheckDescriptor {
        key: CheckKey::Sysctl,
        remediation: Some(SetupStep::Sysctl),
        command: sysctl_command,
        parse: parse_sysctl,
    },
    CheckDescriptor {
        key: CheckKey::Jvm,
        remediation: None,
        command: jvm_command,
        parse: parse_jvm,
    },
    CheckDescriptor {
        key: CheckKey::ThreadPool,
        remediation: None,
        command: thread_pool_command,
        parse: parse_thread_pool,
    },
    CheckDescriptor {
        key: CheckKey::GarbageCollector,
        remediation: None,
        command: garbage_collector_command,
        parse: parse_garbage_collector,
    },
];

// ============================================================================
// userGroup
// ============================================================================

fn user_group_command(opts: &PrereqOptions, _paths: &RemediationPaths) -> String {
    format!(
        "id {} 2>&1; getent group {} 2>&1",
        shell_quote(&opts.username),
        shell_quote(&opts.group)
    )
}

fn parse_user_group(output: &str, opts: &PrereqOptions) -> ValidationResult {
    let user_tag = format!("({})", opts.username);
    let group_tag = format!("({})", opts.group);
    let group_prefix = format!("{}:", opts.group);

    let id_line = output
        .lines()
        .find(|line| line.contains("uid=") && line.contains(&user_tag));
    let user_exists = id_line.is_some();
    let group_exists = output
        .lines()
        .any(|line| line.trim_start().starts_with(&group_prefix));
    let user_in_group = id_line
        .and_then(|line| line.split_once("groups="))
        .map(|(_, groups)| groups.split(',').any(|g| g.trim().ends_with(&group_tag)))
        .unwrap_or(false);

    if user_exists && group_exists && user_in_group {
        ValidationResult::pass(
            CheckKey::UserGroup,
            format!(
                "User '{}' exists and is in group '{}'",
                opts.username, opts.group
            ),
            json!({ "output": output.trim() }),
        )
    } else {
        ValidationResult::fail(
            CheckKey::UserGroup,
            "User or group configuration incomplete",
            json!({
                "userExists": user_exists,
                "groupExists": group_exists,
                "userInGroup": user_in_group,
                "output": output.trim(),
            }),
        )
    }
}

// ============================================================================
// ulimit
// ============================================================================

/// stderr stays off stdout so sudo warnings cannot displace the values.
fn ulimit_command(opts: &PrereqOptions, _paths: &RemediationPaths) -> String {
    format!(
        "sudo -n -u {} sh -c 'ulimit -n; ulimit -u; ulimit -s'",
        shell_quote(&opts.username)
    )
}

/// Parse one `ulimit` value. `unlimited` satisfies any threshold; anything
/// else unreadable is 0.
fn parse_limit(raw: Option<&str>) -> u64 {
    match raw.map(str::trim) {
        Some("unlimited") => u64::MAX,
        Some(value) => value.parse().unwrap_or(0),
        None => 0,
    }
}

fn limit_value(value: u64) -> Value {
    if value == u64::MAX {
        json!("unlimited")
    } else {
        json!(value)
    }
}

fn is_limit_value(line: &str) -> bool {
    line == "unlimited" || (!line.is_empty() && line.chars().all(|c| c.is_ascii_digit()))
}

/// The last three value lines are `-n`, `-u`, `-s`; anything else on stdout
/// (login banners, sudo warnings) is skipped.
fn parse_ulimit(output: &str, _opts: &PrereqOptions) -> ValidationResult {
    let values: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|l| is_limit_value(l))
        .collect();
    let mut values = values[values.len().saturating_sub(3)..].iter().copied();
    let nofile = parse_limit(values.next());
    let nproc = parse_limit(values.next());
    let stack = parse_limit(values.next());

    let nofile_ok = nofile >= ULIMIT_NOFILE_MIN;
    let nproc_ok = nproc >= ULIMIT_NPROC_MIN;
    let stack_ok = stack >= ULIMIT_STACK_KB_MIN;
    let details = json!({
        "nofile": limit_value(nofile),
        "nproc": limit_value(nproc),
        "stack": limit_value(stack),
        "checks": { "nofile": nofile_ok, "nproc": nproc_ok, "stack": stack_ok },
    });

    if nofile_ok && nproc_ok && stack_ok {
        ValidationResult::pass(CheckKey::Ulimit, "All ulimit settings are adequate", details)
    } else {
        ValidationResult::fail(
            CheckKey::Ulimit,
            "Some ulimit settings are below threshold",
            details,
        )
    }
}

// ============================================================================
// securityLimits
// ============================================================================

/// Reads the same limits file the ulimit step rewrites.
fn security_limits_command(_opts: &PrereqOptions, paths: &RemediationPaths) -> String {
    format!(
        "cat {} 2>&1; echo \"{}\"; ls -la {} 2>&1",
        shell_quote(&paths.limits_conf),
        LIMITS_DIVIDER,
        DEFAULT_LIMITS_DIR
    )
}

/// True for an `ls -la` row naming something other than `.`/`..`
fn is_listing_entry(line: &str) -> bool {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 9 {
        return false;
    }
    let is_mode = fields[0].len() >= 10
        && fields[0]
            .chars()
            .next()
            .map(|c| "-dlcbps".contains(c))
            .unwrap_or(false);
    let has_link_count = fields[1].parse::<u64>().is_ok();
    let name = fields[fields.len() - 1];
    is_mode && has_link_count && name != "." && name != ".."
}

fn parse_security_limits(output: &str, _opts: &PrereqOptions) -> ValidationResult {
    let (conf, listing) = output.split_once(LIMITS_DIVIDER).unwrap_or((output, ""));

    let has_limits_conf = conf
        .lines()
        .map(str::trim)
        .filter(|l| !l.starts_with('#'))
        .any(|l| l.contains("nofile") || l.contains("nproc"));
    let drop_in_files = listing.lines().filter(|l| is_listing_entry(l)).count();
    let has_limits_dir = drop_in_files > 0;

    let details = json!({
        "hasLimitsConf": has_limits_conf,
        "hasLimitsDir": has_limits_dir,
        "dropInFiles": drop_in_files,
    });

    if has_limits_conf || has_limits_dir {
        ValidationResult::pass(CheckKey::SecurityLimits, "Security limits configured", details)
    } else {
        ValidationResult::fail(
            CheckKey::SecurityLimits,
            "Security limits not configured",
            details,
        )
    }
}

// ============================================================================
// sysctl
// ============================================================================

fn sysctl_command(_opts: &PrereqOptions, _paths: &RemediationPaths) -> String {
    format!("sysctl {} 2>&1", SYSCTL_PARAMS.join(" "))
}

/// Value of `name = value` in sysctl output, if present
fn sysctl_value<'a>(output: &'a str, name: &str) -> Option<&'a str> {
    output.lines().find_map(|line| {
        let (key, value) = line.split_once('=')?;
        (key.trim() == name).then(|| value.trim())
    })
}

fn parse_sysctl(output: &str, _opts: &PrereqOptions) -> ValidationResult {
    let numeric = |name: &str| {
        sysctl_value(output, name)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
    };
    let max_map_count = numeric("vm.max_map_count");
    let file_max = numeric("fs.file-max");
    let somaxconn = numeric("net.core.somaxconn");
    let port_range = sysctl_value(output, "net.ipv4.ip_local_port_range")
        .map(|v| v.split_whitespace().collect::<Vec<_>>().join(" "));

    let map_ok = max_map_count >= SYSCTL_MAX_MAP_COUNT_MIN;
    let file_ok = file_max >= SYSCTL_FILE_MAX_MIN;
    let conn_ok = somaxconn >= SYSCTL_SOMAXCONN_MIN;
    let details = json!({
        "params": {
            "vm.max_map_count": max_map_count,
            "fs.file-max": file_max,
            "net.core.somaxconn": somaxconn,
            "net.ipv4.ip_local_port_range": port_range,
        },
        "checks": {
            "vm.max_map_count": map_ok,
            "fs.file-max": file_ok,
            "net.core.somaxconn": conn_ok,
        },
    });

    if map_ok && file_ok && conn_ok {
        ValidationResult::pass(
            CheckKey::Sysctl,
            "All sysctl parameters are adequate",
            details,
        )
    } else {
        ValidationResult::fail(
            CheckKey::Sysctl,
            "Some sysctl parameters need tuning",
            details,
        )
    }
}

// ============================================================================
// jvm
// ============================================================================

fn jvm_command(_opts: &PrereqOptions, _paths: &RemediationPaths) -> String {
    format!(
        "java -version 2>&1; echo \"{}\"; echo \"$JAVA_HOME\"",
        JAVA_HOME_DIVIDER
    )
}

/// Major version from `java -version` output: `"1.8.0_311"` → 8, `"17.0.1"` → 17.
fn java_major_version(output: &str) -> u32 {
    let Some((_, rest)) = output.split_once("version \"") else {
        return 0;
    };
    let version = rest.split('"').next().unwrap_or("");
    let mut parts = version.split(|c: char| !c.is_ascii_digit());
    let first: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);

    if first == 1 {
        parts.next().and_then(|p| p.parse().ok()).unwrap_or(0)
    } else {
        first
    }
}

fn parse_jvm(output: &str, _opts: &PrereqOptions) -> ValidationResult {
    let (version_part, home_part) = output.split_once(JAVA_HOME_DIVIDER).unwrap_or((output, ""));
    let major_version = java_major_version(version_part);
    let java_home = home_part.trim();
    let has_java_home = !java_home.is_empty();
    let valid_version = major_version >= JVM_MIN_MAJOR_VERSION;

    let details = json!({
        "majorVersion": major_version,
        "hasJavaHome": has_java_home,
        "javaHome": java_home,
        "output": version_part.trim(),
    });

    if valid_version && has_java_home {
        ValidationResult::pass(
            CheckKey::Jvm,
            format!("Java {} installed", major_version),
            details,
        )
    } else {
        ValidationResult::fail(
            CheckKey::Jvm,
            format!(
                "Java installation not found or has an outdated version (<{})",
                JVM_MIN_MAJOR_VERSION
            ),
            details,
        )
    }
}

// ============================================================================
// threadPool
// ============================================================================

fn thread_pool_command(opts: &PrereqOptions, _paths: &RemediationPaths) -> String {
    format!(
        "grep -E 'thread|pool' {} 2>/dev/null || echo \"{}\"",
        shell_quote(&opts.config_path),
        NO_THREAD_POOL
    )
}

fn parse_thread_pool(output: &str, opts: &PrereqOptions) -> ValidationResult {
    let has_thread_config = output
        .lines()
        .map(str::trim)
        .filter(|l| !l.starts_with('#') && *l != NO_THREAD_POOL)
        .any(|l| l.to_ascii_lowercase().contains("thread"));

    let details = json!({ "configPath": opts.config_path, "output": output.trim() });

    if has_thread_config {
        ValidationResult::pass(CheckKey::ThreadPool, "Thread pool configured", details)
    } else {
        ValidationResult::fail(CheckKey::ThreadPool, "Thread pool not configured", details)
    }
}

// ============================================================================
// garbageCollector
// ============================================================================

fn garbage_collector_command(_opts: &PrereqOptions, _paths: &RemediationPaths) -> String {
    format!("ps -eo args | grep '[j]ava' || echo \"{}\"", NO_JVM_PROCESS)
}

fn parse_garbage_collector(output: &str, _opts: &PrereqOptions) -> ValidationResult {
    let jvm_lines: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && *l != NO_JVM_PROCESS)
        .collect();

    let line_has_gc = |l: &str| MODERN_GC_FLAGS.iter().any(|flag| l.contains(flag));
    let line_has_heap = |l: &str| l.contains("-Xms") && l.contains("-Xmx");

    let has_gc = jvm_lines.iter().any(|l| line_has_gc(l));
    let has_heap = jvm_lines.iter().any(|l| line_has_heap(l));
    let configured = jvm_lines.iter().any(|l| line_has_gc(l) && line_has_heap(l));

    let details = json!({
        "jvmProcesses": jvm_lines.len(),
        "hasGC": has_gc,
        "hasHeap": has_heap,
        "output": output.trim(),
    });

    if configured {
        ValidationResult::pass(CheckKey::GarbageCollector, "GC properly configured", details)
    } else if jvm_lines.is_empty() {
        ValidationResult::fail(CheckKey::GarbageCollector, NO_JVM_PROCESS, details)
    } else {
        ValidationResult::fail(CheckKey::GarbageCollector, "GC configuration missing", details)
    }
}
