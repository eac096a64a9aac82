use crate::errors::StoreError;
use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};

/// Log target for the mutation audit trail.
pub const AUDIT_TARGET: &str = "horus_store::audit";

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;

/// Initializes logging from a log4rs YAML file.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn init_path(path: &Path) -> Result<(), StoreError> {
    log4rs::init_file(path, log4rs::config::Deserializers::default())
        .map_err(|e| StoreError::Config(format!("log config {}: {e}", path.display())))
}

#[must_use]
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(base: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, StoreError> {
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", base.join(format!("{stem}.{{}}.log")).display()), keep)
        .map_err(|e| StoreError::Config(e.to_string()))?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{stem}.log")), Box::new(policy))
        .map_err(|e| StoreError::Io(e.to_string()))
}

/// Builds the process logging config: `app.log` for everything and
/// `audit.log` for the audit target, both size-rolled.
///
/// # Errors
/// Returns an error if the directory or the appenders cannot be created.
pub fn build_config(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<u32>,
) -> Result<Config, StoreError> {
    let base = dir
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    std::fs::create_dir_all(&base).map_err(|e| StoreError::Io(e.to_string()))?;
    let keep = retention.unwrap_or(7);
    let lvl = parse_level(level.unwrap_or("info"));
    Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(&base, "app", keep)?)))
        .appender(Appender::builder().build("audit", Box::new(rolling(&base, "audit", keep)?)))
        .logger(Logger::builder().appender("audit").additive(false).build(AUDIT_TARGET, lvl))
        .build(Root::builder().appender("app").build(lvl))
        .map_err(|e| StoreError::Config(e.to_string()))
}

/// Configures logging for the process. Returns `false` when a logger was
/// already installed, in which case the existing configuration is kept.
///
/// # Errors
/// Returns an error if the configuration cannot be built.
pub fn configure_logging(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<u32>,
) -> Result<bool, StoreError> {
    let config = build_config(dir, level, retention)?;
    match log4rs::init_config(config) {
        Ok(_) => Ok(true),
        Err(e) => {
            log::debug!("logging already initialized, keeping it: {e}");
            Ok(false)
        }
    }
}

/// Configures logging from `HORUS_LOG_DIR`, `HORUS_LOG_LEVEL` and
/// `HORUS_LOG_RETENTION`.
///
/// # Errors
/// See [`configure_logging`].
pub fn configure_from_env() -> Result<bool, StoreError> {
    let dir = std::env::var("HORUS_LOG_DIR").ok().map(PathBuf::from);
    let level = std::env::var("HORUS_LOG_LEVEL").ok();
    let retention = std::env::var("HORUS_LOG_RETENTION").ok().and_then(|s| s.parse::<u32>().ok());
    configure_logging(dir.as_deref(), level.as_deref(), retention)
}

/// Records one mutating store call on the audit target as a JSON line.
pub fn audit(op: &str, namespace: &str, id: Option<&str>) {
    let line = serde_json::json!({ "op": op, "ns": namespace, "id": id });
    log::info!(target: AUDIT_TARGET, "{line}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_parse_case_insensitively() {
        assert_eq!(parse_level("DEBUG"), LevelFilter::Debug);
        assert_eq!(parse_level("warn"), LevelFilter::Warn);
        assert_eq!(parse_level("bogus"), LevelFilter::Info);
    }

    #[test]
    fn build_config_creates_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        build_config(Some(&logs), Some("debug"), Some(3)).unwrap();
        assert!(logs.is_dir());
    }

    #[test]
    fn second_configuration_keeps_the_first() {
        let dir = tempfile::tempdir().unwrap();
        configure_logging(Some(dir.path()), Some("info"), Some(1)).unwrap();
        let other = dir.path().join("other");
        assert!(!configure_logging(Some(&other), Some("debug"), Some(1)).unwrap());
    }
}
