//! # Prerequisite Thresholds and Defaults
//!
//! Every threshold a check compares against, and every default a remediation
//! script writes, lives here so the check table and the setup scripts can never
//! drift apart.
//!
//! ```rust
//! use vmprereq::constants::*;
//!
//! assert!(ULIMIT_NOFILE_MIN <= 10_240);
//! ```

// ============================================================================
// Resource limits (ulimit / limits.conf)
// ============================================================================

/// Minimum open file descriptors (`ulimit -n`) for the application user
pub const ULIMIT_NOFILE_MIN: u64 = 10_240;

/// Minimum user processes (`ulimit -u`)
pub const ULIMIT_NPROC_MIN: u64 = 2_047;

/// Minimum stack size in KB (`ulimit -s`)
pub const ULIMIT_STACK_KB_MIN: u64 = 8_192;

/// Soft/hard pairs written by the ulimit remediation.
///
/// Every soft value meets the matching `ULIMIT_*_MIN` threshold.
pub const ULIMIT_ENTRIES: &[(&str, &str, u64)] = &[
    ("soft", "nofile", 10_240),
    ("hard", "nofile", 65_536),
    ("soft", "nproc", 2_047),
    ("hard", "nproc", 16_384),
    ("soft", "stack", 10_240),
    ("hard", "stack", 32_768),
];

// ============================================================================
// Kernel parameters (sysctl)
// ============================================================================

/// Minimum `vm.max_map_count`
pub const SYSCTL_MAX_MAP_COUNT_MIN: u64 = 262_144;

/// Minimum `fs.file-max`
pub const SYSCTL_FILE_MAX_MIN: u64 = 500_000;

/// Minimum `net.core.somaxconn`
pub const SYSCTL_SOMAXCONN_MIN: u64 = 1_024;

/// Parameters queried by the sysctl check, in output order
pub const SYSCTL_PARAMS: &[&str] = &[
    "vm.max_map_count",
    "fs.file-max",
    "net.core.somaxconn",
    "net.ipv4.ip_local_port_range",
];

/// Block written by the sysctl remediation
pub const SYSCTL_ENTRIES: &[(&str, &str)] = &[
    ("vm.max_map_count", "262144"),
    ("fs.file-max", "500000"),
    ("net.core.somaxconn", "1024"),
    ("net.ipv4.ip_local_port_range", "1024 65535"),
];

// ============================================================================
// JVM
// ============================================================================

/// Lowest accepted Java major version
pub const JVM_MIN_MAJOR_VERSION: u32 = 11;

/// JVM flags that count as a modern garbage collector
pub const MODERN_GC_FLAGS: &[&str] = &["UseG1GC", "UseZGC", "UseShenandoahGC"];

// ============================================================================
// Defaults for per-call options
// ============================================================================

/// Application account checked and created when the caller does not name one
pub const DEFAULT_APP_USER: &str = "wmuser";

/// Application group checked and created when the caller does not name one
pub const DEFAULT_APP_GROUP: &str = "wmuser";

/// Initial password set by the user/group remediation.
///
/// Operators are expected to rotate it; pass an explicit password to avoid it.
pub const DEFAULT_APP_PASSWORD: &str = "wmuser123";

/// Properties file scanned by the thread-pool check
pub const DEFAULT_THREAD_POOL_CONFIG: &str = "/opt/app/config/application.properties";

/// PAM limits file read by checks and rewritten by the ulimit remediation
pub const DEFAULT_LIMITS_CONF: &str = "/etc/security/limits.conf";

/// Drop-in directory inspected by the security-limits check
pub const DEFAULT_LIMITS_DIR: &str = "/etc/security/limits.d/";

/// Kernel parameter file rewritten by the sysctl remediation
pub const DEFAULT_SYSCTL_CONF: &str = "/etc/sysctl.conf";

/// Marker prefix for blocks owned by this tool in remote config files
pub const BLOCK_MARKER: &str = "vmprereq";

// ============================================================================
// SSH transport
// ============================================================================

/// Default SSH port when a host record does not carry one
pub const DEFAULT_SSH_PORT: u16 = 22;

/// TCP connect + handshake budget (seconds)
pub const SSH_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Budget for a single remote command (seconds).
///
/// Remediation scripts run `useradd`/`sysctl -p` and can be slow on busy hosts.
pub const SSH_COMMAND_TIMEOUT_SECS: u64 = 120;

/// Host-key algorithms offered during the handshake.
///
/// `ssh-rsa` (RSA/SHA-1) stays in the list: older distributions only present
/// that key type and would otherwise fail every check with a transport error.
pub const SSH_HOST_KEY_ALGORITHMS: &str =
    "rsa-sha2-512,rsa-sha2-256,ssh-rsa,ecdsa-sha2-nistp256,ssh-ed25519";

// ============================================================================
// Input validation
// ============================================================================

/// Maximum length of a Linux account or group name
pub const MAX_ACCOUNT_NAME_LENGTH: usize = 32;

/// Maximum length of a remote config path
pub const MAX_CONFIG_PATH_LENGTH: usize = 4096;
