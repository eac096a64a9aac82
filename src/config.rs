//! Service configuration loaded from TOML.
//!
//! Precedence: explicit path > `HORUS_CONFIG` > `./horus.toml` >
//! `<config dir>/horus/store.toml` > defaults. Environment overrides are
//! applied on top of whichever file was loaded.

use crate::errors::StoreError;
use crate::types::Namespace;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_PORT: u16 = 27017;
pub const DEFAULT_MAX_POOL_SIZE: u32 = 20;
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
    pub database: DatabaseConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "horus".into(),
            log_level: "info".into(),
            log_dir: None,
            database: DatabaseConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub collection: String,
    pub max_pool_size: u32,
    pub timeout_ms: u64,
    pub options: ServerOptions,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: DEFAULT_PORT,
            name: "horus".into(),
            collection: "crumbs".into(),
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            options: ServerOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerOptions {
    pub strict: bool,
    pub deprecation_errors: bool,
}

impl DatabaseConfig {
    /// Connection string handed to a network driver.
    #[must_use]
    pub fn uri(&self) -> String {
        format!("mongodb://{}:{}/?maxPoolSize={}&w=majority", self.host, self.port, self.max_pool_size)
    }

    #[must_use]
    pub fn namespace(&self) -> Namespace {
        Namespace::new(&self.name, &self.collection)
    }

    /// # Errors
    /// Returns `StoreError::Config` for empty coordinates or a zero pool size.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.host.trim().is_empty() {
            return Err(StoreError::Config("database.host must not be empty".into()));
        }
        if self.name.trim().is_empty() || self.collection.trim().is_empty() {
            return Err(StoreError::Config("database.name and database.collection are required".into()));
        }
        if self.max_pool_size == 0 {
            return Err(StoreError::Config("database.max_pool_size must be at least 1".into()));
        }
        Ok(())
    }
}

impl ServiceConfig {
    /// # Errors
    /// Returns `StoreError::Config` if the text is not a valid config.
    pub fn from_toml(s: &str) -> Result<Self, StoreError> {
        toml::from_str(s).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn read(path: &Path) -> Result<Self, StoreError> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml(&s)
    }

    /// Resolves the config file, applies env overrides and validates.
    ///
    /// # Errors
    /// Returns an error if a located file is unreadable or invalid, or if the
    /// final config fails validation.
    pub fn load(explicit: Option<&Path>) -> Result<Self, StoreError> {
        let mut cfg = match candidate_paths(explicit).into_iter().find(|p| p.exists()) {
            Some(p) => {
                log::debug!("loading config from {}", p.display());
                Self::read(&p)?
            }
            None => {
                if let Some(p) = explicit {
                    return Err(StoreError::Config(format!("config file not found: {}", p.display())));
                }
                Self::default()
            }
        };
        cfg.apply_env(|k| std::env::var(k).ok())?;
        cfg.database.validate()?;
        Ok(cfg)
    }

    /// Applies `HORUS_*` overrides read through `get`.
    ///
    /// # Errors
    /// Returns `StoreError::Config` if `HORUS_DB_PORT` is not a port number.
    pub fn apply_env<F>(&mut self, get: F) -> Result<(), StoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = get("HORUS_DB_HOST") {
            self.database.host = v;
        }
        if let Some(v) = get("HORUS_DB_PORT") {
            self.database.port =
                v.parse().map_err(|_| StoreError::Config(format!("HORUS_DB_PORT: invalid port '{v}'")))?;
        }
        if let Some(v) = get("HORUS_DB_NAME") {
            self.database.name = v;
        }
        if let Some(v) = get("HORUS_DB_COLLECTION") {
            self.database.collection = v;
        }
        if let Some(v) = get("HORUS_LOG_LEVEL") {
            self.log_level = v;
        }
        Ok(())
    }
}

fn candidate_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
    if let Some(p) = explicit {
        return vec![p.to_path_buf()];
    }
    let mut paths = Vec::new();
    if let Ok(p) = std::env::var("HORUS_CONFIG") {
        paths.push(PathBuf::from(p));
    }
    if let Ok(cur) = std::env::current_dir() {
        paths.push(cur.join("horus.toml"));
    }
    if let Some(dir) = dirs_next::config_dir() {
        paths.push(dir.join("horus").join("store.toml"));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg = ServiceConfig::from_toml(
            r#"
name = "crumbdb"
[database]
host = "mongo"
collection = "crumbs"
"#,
        )
        .unwrap();
        assert_eq!(cfg.name, "crumbdb");
        assert_eq!(cfg.database.port, DEFAULT_PORT);
        assert_eq!(cfg.database.uri(), "mongodb://mongo:27017/?maxPoolSize=20&w=majority");
        assert_eq!(cfg.database.namespace(), Namespace::new("horus", "crumbs"));
    }

    #[test]
    fn env_overrides_win() {
        let env: HashMap<&str, &str> = [("HORUS_DB_PORT", "28000"), ("HORUS_DB_NAME", "social")].into();
        let mut cfg = ServiceConfig::default();
        cfg.apply_env(|k| env.get(k).map(|v| (*v).to_string())).unwrap();
        assert_eq!(cfg.database.port, 28000);
        assert_eq!(cfg.database.name, "social");
    }

    #[test]
    fn bad_port_override_is_rejected() {
        let mut cfg = ServiceConfig::default();
        let err = cfg.apply_env(|k| (k == "HORUS_DB_PORT").then(|| "http".to_string()));
        assert!(matches!(err, Err(StoreError::Config(_))));
    }

    #[test]
    fn validate_rejects_empty_collection() {
        let mut db = DatabaseConfig::default();
        db.collection.clear();
        assert!(db.validate().is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(ServiceConfig::load(Some(&missing)).is_err());
    }
}
