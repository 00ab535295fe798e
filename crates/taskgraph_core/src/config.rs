//! Runtime configuration.
//!
//! # Responsibility
//! - Describe database, logging and service policy settings.
//! - Load them from `TASKGRAPH_*` environment variables.
//!
//! # Invariants
//! - Unset variables fall back to defaults; set-but-invalid values are
//!   errors, never silently ignored.

use crate::logging::default_log_level;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "TASKGRAPH_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "TASKGRAPH_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "TASKGRAPH_LOG_DIR";
pub const ENV_DUPLICATE_POLICY: &str = "TASKGRAPH_DUPLICATE_POLICY";

const DEFAULT_DB_FILE: &str = "taskgraph.sqlite3";

/// What task creation does when a same-named task of the same type already
/// exists in the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Create silently.
    Allow,
    /// Create and log a warning.
    #[default]
    Warn,
    /// Refuse with `DuplicateTask`.
    Reject,
}

impl DuplicatePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "allow" => Some(Self::Allow),
            "warn" => Some(Self::Warn),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Warn => "warn",
            Self::Reject => "reject",
        }
    }
}

/// Policy knobs for `TaskService`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServiceConfig {
    pub duplicate_policy: DuplicatePolicy,
}

/// Process-level configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub database_path: PathBuf,
    pub log_level: String,
    /// `None` disables file logging.
    pub log_dir: Option<PathBuf>,
    pub service: ServiceConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DB_FILE),
            log_level: default_log_level().to_string(),
            log_dir: None,
            service: ServiceConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Loads configuration from process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = non_blank(lookup(ENV_DB_PATH)) {
            config.database_path = PathBuf::from(path);
        }
        if let Some(level) = non_blank(lookup(ENV_LOG_LEVEL)) {
            config.log_level = level;
        }
        if let Some(dir) = non_blank(lookup(ENV_LOG_DIR)) {
            let dir = PathBuf::from(dir);
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid {
                    key: ENV_LOG_DIR,
                    value: dir.display().to_string(),
                    reason: "must be an absolute path",
                });
            }
            config.log_dir = Some(dir);
        }
        if let Some(policy) = non_blank(lookup(ENV_DUPLICATE_POLICY)) {
            config.service.duplicate_policy =
                DuplicatePolicy::parse(&policy).ok_or(ConfigError::Invalid {
                    key: ENV_DUPLICATE_POLICY,
                    value: policy,
                    reason: "expected allow|warn|reject",
                })?;
        }
        Ok(config)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid { key, value, reason } => {
                write!(f, "invalid {key}=`{value}`: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}
