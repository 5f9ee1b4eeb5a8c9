//! Runtime configuration for storage, session and paging behavior.
//!
//! # Responsibility
//! - Hold typed settings with working defaults for every section.
//! - Load and validate settings from JSON documents.
//!
//! # Invariants
//! - `paging.default_size` is within `1..=paging.max_size`.
//! - `paging.default_sort` parses as a sort expression.

use crate::logging::{default_log_level, parse_level};
use crate::page::Sort;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default page size used when a request does not specify one.
pub const DEFAULT_PAGE_SIZE: u32 = 12;
/// Default page size for member DTO listings.
pub const DEFAULT_DTO_PAGE_SIZE: u32 = 5;
/// Upper bound for any requested page size.
pub const MAX_PAGE_SIZE: u32 = 2000;
/// Default ordering for list endpoints.
pub const DEFAULT_SORT: &str = "username,desc";

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Configuration load/validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file `{path}`: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub paging: PagingConfig,
}

impl CoreConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_level(&self.logging.level).map_err(|err| ConfigError::Invalid(err.to_string()))?;

        let paging = &self.paging;
        if paging.max_size == 0 {
            return Err(ConfigError::Invalid(
                "paging.max_size must be greater than zero".to_string(),
            ));
        }
        for (field, size) in [
            ("default_size", paging.default_size),
            ("dto_default_size", paging.dto_default_size),
        ] {
            if size == 0 || size > paging.max_size {
                return Err(ConfigError::Invalid(format!(
                    "paging.{field} must be within 1..={}, got {size}",
                    paging.max_size
                )));
            }
        }
        Sort::parse(&paging.default_sort)
            .map_err(|err| ConfigError::Invalid(format!("paging.default_sort: {err}")))?;
        Ok(())
    }
}

/// Logging bootstrap settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute directory for rolling log files. `None` leaves logging off.
    pub dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: None,
        }
    }
}

/// Connection settings applied at open time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout_ms: u64,
    pub foreign_keys: bool,
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            foreign_keys: true,
        }
    }
}

/// When managed entity changes are written to the database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushMode {
    /// Flush before every statement and on commit.
    #[default]
    Auto,
    /// Flush only on commit or explicit `Session::flush`.
    Commit,
}

/// Unit-of-work behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub flush_mode: FlushMode,
    /// Clear the identity map after set-based updates so later reads see
    /// the new column values.
    pub clear_after_bulk_update: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            flush_mode: FlushMode::Auto,
            clear_after_bulk_update: true,
        }
    }
}

/// Page request defaults and limits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PagingConfig {
    pub default_size: u32,
    pub dto_default_size: u32,
    pub max_size: u32,
    pub default_sort: String,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_size: DEFAULT_PAGE_SIZE,
            dto_default_size: DEFAULT_DTO_PAGE_SIZE,
            max_size: MAX_PAGE_SIZE,
            default_sort: DEFAULT_SORT.to_string(),
        }
    }
}
