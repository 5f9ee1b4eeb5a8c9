//! Process-wide logger setup.
//!
//! Diagnostic lines follow `event=<name> module=<area> status=<ok|error|start>`
//! followed by `key=value` pairs. The file backend rotates at 10 MiB and
//! keeps five files.
//!
//! # Invariants
//! - One logger per process; repeating `init_logging` with the same target
//!   is a no-op, a different target is rejected.
//! - Setup never panics.

use crate::config::LoggingConfig;
use flexi_logger::{
    Cleanup, Criterion, FileSpec, FlexiLoggerError, LogSpecification, Logger, LoggerHandle,
    Naming, WriteMode,
};
use log::{error, info, LevelFilter};
use once_cell::sync::OnceCell;
use std::fmt::{Display, Formatter};
use std::panic::PanicHookInfo;
use std::path::{Path, PathBuf};
use thiserror::Error;

const LOG_BASENAME: &str = "roster";
const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;
const KEEP_FILES: usize = 5;
const PANIC_PREVIEW_CHARS: usize = 160;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

struct ActiveLogger {
    target: LogTarget,
    _handle: LoggerHandle,
}

/// Where and how verbosely the process logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTarget {
    pub level: LevelFilter,
    pub dir: PathBuf,
}

impl LogTarget {
    /// Validates a level name and an absolute log directory.
    pub fn parse(level: &str, dir: &str) -> Result<Self, LoggingError> {
        let level = parse_level(level)?;
        let dir = dir.trim();
        if dir.is_empty() || !Path::new(dir).is_absolute() {
            return Err(LoggingError::RelativeDir(dir.to_string()));
        }
        Ok(Self {
            level,
            dir: PathBuf::from(dir),
        })
    }
}

impl Display for LogTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "level={} dir={}", self.level, self.dir.display())
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("unsupported log level `{0}`; expected off|error|warn|info|debug|trace")]
    UnsupportedLevel(String),
    #[error("log directory must be an absolute path, got `{0}`")]
    RelativeDir(String),
    #[error("logger already active with {active}; refusing {requested}")]
    AlreadyActive { active: String, requested: String },
    #[error(transparent)]
    Backend(#[from] FlexiLoggerError),
}

/// Starts the rolling file logger once per process.
///
/// # Errors
/// - Unknown `level`, empty or relative `log_dir`, a logger already running
///   with another target, or a backend start failure.
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), LoggingError> {
    let requested = LogTarget::parse(level, log_dir)?;
    let active = ACTIVE.get_or_try_init(|| start(requested.clone()))?;
    if active.target != requested {
        return Err(LoggingError::AlreadyActive {
            active: active.target.to_string(),
            requested: requested.to_string(),
        });
    }
    Ok(())
}

/// Starts logging from a config section. Returns `false` without touching
/// the logger when no directory is configured.
pub fn init_logging_from_config(config: &LoggingConfig) -> Result<bool, LoggingError> {
    let Some(dir) = config.dir.as_deref() else {
        return Ok(false);
    };
    init_logging(&config.level, dir)?;
    Ok(true)
}

pub fn logging_status() -> Option<LogTarget> {
    ACTIVE.get().map(|active| active.target.clone())
}

/// `debug` in debug builds, `info` otherwise.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

pub(crate) fn parse_level(level: &str) -> Result<LevelFilter, LoggingError> {
    let level = level.trim();
    if level.eq_ignore_ascii_case("warning") {
        return Ok(LevelFilter::Warn);
    }
    level
        .parse()
        .map_err(|_| LoggingError::UnsupportedLevel(level.to_string()))
}

/// Single-line, length-capped copy of `value` for a log field.
pub(crate) fn log_preview(value: &str, max_chars: usize) -> String {
    let mut preview = String::with_capacity(value.len().min(max_chars) + 3);
    for (index, ch) in value.chars().enumerate() {
        if index == max_chars {
            preview.push_str("...");
            break;
        }
        preview.push(if ch.is_control() { ' ' } else { ch });
    }
    preview
}

fn start(target: LogTarget) -> Result<ActiveLogger, LoggingError> {
    let handle = Logger::with(LogSpecification::builder().default(target.level).build())
        .log_to_file(
            FileSpec::default()
                .directory(target.dir.clone())
                .basename(LOG_BASENAME),
        )
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()?;

    PANIC_HOOK.get_or_init(install_panic_hook);
    info!(
        "event=logging_init module=logging status=ok os={} version={} {}",
        std::env::consts::OS,
        env!("CARGO_PKG_VERSION"),
        target
    );
    Ok(ActiveLogger {
        target,
        _handle: handle,
    })
}

fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map_or_else(|| "unknown".to_string(), |loc| format!("{}:{}", loc.file(), loc.line()));
        error!(
            "event=panic module=logging status=error location={location} payload={}",
            log_preview(&panic_payload(info), PANIC_PREVIEW_CHARS)
        );
        previous(info);
    }));
}

fn panic_payload(info: &PanicHookInfo<'_>) -> String {
    let payload = info.payload();
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "<non-string payload>".to_string())
}

#[cfg(test)]
mod tests {
    use super::{
        init_logging, init_logging_from_config, log_preview, logging_status, parse_level,
        LogTarget, LoggingError,
    };
    use crate::config::LoggingConfig;
    use log::LevelFilter;

    #[test]
    fn level_names_are_case_insensitive() {
        assert_eq!(parse_level("INFO").unwrap(), LevelFilter::Info);
        assert_eq!(parse_level(" warning ").unwrap(), LevelFilter::Warn);
        assert!(matches!(
            parse_level("loud"),
            Err(LoggingError::UnsupportedLevel(level)) if level == "loud"
        ));
    }

    #[test]
    fn target_requires_absolute_directory() {
        for dir in ["logs/dev", "  "] {
            assert!(
                matches!(LogTarget::parse("info", dir), Err(LoggingError::RelativeDir(_))),
                "{dir:?} should be rejected"
            );
        }
    }

    #[test]
    fn preview_flattens_control_characters_and_caps_length() {
        assert_eq!(log_preview("a\nb\tc", 10), "a b c");
        assert_eq!(log_preview("abcdefgh", 3), "abc...");
        assert_eq!(log_preview("abc", 3), "abc");
    }

    #[test]
    fn config_without_dir_is_a_no_op() {
        assert!(!init_logging_from_config(&LoggingConfig::default()).unwrap());
    }

    #[test]
    fn second_init_must_match_the_active_target() {
        let dir = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let dir_str = dir.path().to_str().unwrap();
        let other_str = other.path().to_str().unwrap();

        init_logging("info", dir_str).unwrap();
        init_logging("INFO", dir_str).unwrap();
        assert!(matches!(
            init_logging("debug", dir_str),
            Err(LoggingError::AlreadyActive { .. })
        ));
        assert!(matches!(
            init_logging("info", other_str),
            Err(LoggingError::AlreadyActive { .. })
        ));

        let active = logging_status().unwrap();
        assert_eq!(active.level, LevelFilter::Info);
        assert_eq!(active.dir, dir.path());
    }
}
