//! Per-call options for checks and remediations

use crate::constants::{
    DEFAULT_APP_GROUP, DEFAULT_APP_PASSWORD, DEFAULT_APP_USER, DEFAULT_THREAD_POOL_CONFIG,
};
use crate::normalize::{normalize_account_name, normalize_config_path};
use crate::utils::PrereqError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Options accepted by every engine operation.
///
/// All fields are optional on the wire; missing ones take the defaults from
/// [`crate::constants`].
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PrereqOptions {
    /// Application account checked by userGroup/ulimit and created by setup
    pub username: String,
    /// Application group
    pub group: String,
    /// Password set by the user/group remediation
    #[serde(skip_serializing)]
    pub password: String,
    /// Properties file scanned by the thread-pool check
    pub config_path: String,
    /// Remediate failed checks in `validate_and_fix`
    pub auto_fix: bool,
    /// Also run the sysctl remediation in `setup_all`
    pub include_sysctl: bool,
}

impl Default for PrereqOptions {
    fn default() -> Self {
        Self {
            username: DEFAULT_APP_USER.to_string(),
            group: DEFAULT_APP_GROUP.to_string(),
            password: DEFAULT_APP_PASSWORD.to_string(),
            config_path: DEFAULT_THREAD_POOL_CONFIG.to_string(),
            auto_fix: false,
            include_sysctl: false,
        }
    }
}

impl PrereqOptions {
    /// Validate every field that is interpolated into a remote command.
    ///
    /// Blank fields fall back to their defaults before validation.
    pub fn normalized(&self) -> Result<Self, PrereqError> {
        let defaults = Self::default();
        let pick = |value: &str, fallback: String| {
            if value.trim().is_empty() {
                fallback
            } else {
                value.to_string()
            }
        };

        let username = normalize_account_name("username", &pick(&self.username, defaults.username))
            .map_err(PrereqError::InvalidRequest)?;
        let group = normalize_account_name("group", &pick(&self.group, defaults.group))
            .map_err(PrereqError::InvalidRequest)?;
        let config_path = normalize_config_path(&pick(&self.config_path, defaults.config_path))
            .map_err(PrereqError::InvalidRequest)?;
        let password = if self.password.is_empty() {
            defaults.password
        } else {
            self.password.clone()
        };
        if password.contains('\n') || password.contains('\0') {
            return Err(PrereqError::InvalidRequest(
                "password cannot contain newlines or NUL bytes".to_string(),
            ));
        }

        Ok(Self {
            username,
            group,
            password,
            config_path,
            auto_fix: self.auto_fix,
            include_sysctl: self.include_sysctl,
        })
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_config_path(mut self, path: impl Into<String>) -> Self {
        self.config_path = path.into();
        self
    }

    pub fn with_auto_fix(mut self, auto_fix: bool) -> Self {
        self.auto_fix = auto_fix;
        self
    }
}

impl fmt::Debug for PrereqOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrereqOptions")
            .field("username", &self.username)
            .field("group", &self.group)
            .field("password", &"***")
            .field("config_path", &self.config_path)
            .field("auto_fix", &self.auto_fix)
            .field("include_sysctl", &self.include_sysctl)
            .finish()
    }
}
