//! Input normalisation for values that end up inside remote shell commands.
//!
//! Account names, group names and config paths are interpolated into scripts
//! that run as root on the target host. Each one passes through here before
//! any session is opened, so a malformed request is rejected up front.

use crate::constants::{MAX_ACCOUNT_NAME_LENGTH, MAX_CONFIG_PATH_LENGTH};

/// Normalise a Linux user or group name.
///
/// Trims whitespace and accepts `[a-z_][a-z0-9_.-]*` up to 32 characters.
/// `kind` names the field in the error message ("username", "group").
pub fn normalize_account_name(kind: &str, raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(format!("{} cannot be empty", kind));
    }

    if trimmed.len() > MAX_ACCOUNT_NAME_LENGTH {
        return Err(format!(
            "{} '{}' exceeds {} characters",
            kind, trimmed, MAX_ACCOUNT_NAME_LENGTH
        ));
    }

    let mut chars = trimmed.chars();
    let first_ok = chars
        .next()
        .map(|c| c.is_ascii_lowercase() || c == '_')
        .unwrap_or(false);
    if !first_ok {
        return Err(format!(
            "{} '{}' must start with a lowercase letter or '_'",
            kind, trimmed
        ));
    }

    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-' | '.')) {
        return Err(format!(
            "{} '{}' contains invalid characters (allowed: a-z, 0-9, '_', '-', '.')",
            kind, trimmed
        ));
    }

    Ok(trimmed.to_string())
}

/// Normalise a remote config file path.
///
/// Must be absolute and limited to characters that need no shell quoting.
pub fn normalize_config_path(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("Config path cannot be empty".to_string());
    }

    if !trimmed.starts_with('/') {
        return Err(format!("Config path '{}' must be absolute", trimmed));
    }

    if trimmed.len() > MAX_CONFIG_PATH_LENGTH {
        return Err(format!(
            "Config path exceeds {} characters",
            MAX_CONFIG_PATH_LENGTH
        ));
    }

    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | '+' | '@'))
    {
        return Err(format!(
            "Config path '{}' contains invalid characters",
            trimmed
        ));
    }

    Ok(trimmed.to_string())
}

/// Quote a value for interpolation into a POSIX `sh` command line.
pub fn shell_quote(value: &str) -> String {
    shell_escape::unix::escape(value.into()).into_owned()
}

/// Escape an already-normalised account name for use inside a `sed` regex.
pub fn regex_escape_account(name: &str) -> String {
    name.replace('.', "\\.")
}
