//! Logging facade over `tracing`.
//!
//! `VMPREREQ_LOG` takes an `EnvFilter` directive (default `vmprereq=info`) and
//! `VMPREREQ_LOG_JSON=1` switches to JSON lines. Everything goes to stderr so
//! command output on stdout stays machine-readable.
//!
//! SECURITY: never pass passwords, passphrases, key material or remediation
//! scripts (which may embed a password) to these functions.

use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "vmprereq=info";

static INIT: OnceLock<()> = OnceLock::new();

/// Install the global subscriber. Safe to call more than once.
pub fn init_logger() {
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_env("VMPREREQ_LOG")
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let json = std::env::var("VMPREREQ_LOG_JSON")
            .map(|v| v == "1")
            .unwrap_or(false);

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr);

        let result = if json {
            builder.json().try_init()
        } else {
            builder.try_init()
        };

        // A host application may already own the global subscriber.
        if let Err(e) = result {
            eprintln!("[vmprereq] logger not installed: {}", e);
        }
    });
}

pub fn log_debug(message: &str) {
    tracing::debug!(target: "vmprereq", "{}", message);
}

pub fn log_info(message: &str) {
    tracing::info!(target: "vmprereq", "{}", message);
}

pub fn log_warn(message: &str) {
    tracing::warn!(target: "vmprereq", "{}", message);
}

pub fn log_error(message: &str) {
    tracing::error!(target: "vmprereq", "{}", message);
}
