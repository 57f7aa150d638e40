//! Engine configuration.
//!
//! Resolution order, later wins:
//! 1. built-in defaults (paths from `dirs`)
//! 2. JSON config file (`~/.config/imessage-audit/config.json` or `--config`)
//! 3. `IMESSAGE_AUDIT_*` environment variables
//! 4. CLI flags (applied by the caller)
//!
//! CHANGELOG:
//! - 10/17/2026 - Validate batch_size from the config file
//! - 10/16/2026 - Initial config layer (replaces IMESSAGE_CONTACTS_PATH lookup)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::db::connection::default_chat_db_path;
use crate::error::{EngineError, Result};
use crate::import::DEFAULT_BATCH_SIZE;

pub const ENV_SOURCE: &str = "IMESSAGE_AUDIT_SOURCE";
pub const ENV_STORE: &str = "IMESSAGE_AUDIT_STORE";
pub const ENV_CONTACTS: &str = "IMESSAGE_AUDIT_CONTACTS";
pub const ENV_BATCH_SIZE: &str = "IMESSAGE_AUDIT_BATCH_SIZE";

const APP_DIR: &str = "imessage-audit";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Source chat.db (ignored when `backup_dir` is set).
    pub source: PathBuf,
    /// iPhone backup folder to import from instead of `source`.
    pub backup_dir: Option<PathBuf>,
    /// Audit store database.
    pub store: PathBuf,
    /// Contacts JSON; missing file means no contacts.
    pub contacts: PathBuf,
    pub batch_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let data = app_data_dir();
        Self {
            source: default_chat_db_path(),
            backup_dir: None,
            store: data.join("audit.db"),
            contacts: data.join("contacts.json"),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Default config file location.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.json")
}

impl EngineConfig {
    /// Defaults, then the config file (explicit path must exist), then env.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = default_config_path();
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        if config.batch_size == 0 {
            return Err(EngineError::Config(format!(
                "batch_size in {:?} must be a positive integer",
                path
            )));
        }
        tracing::debug!(path = ?path, "loaded config file");
        Ok(config)
    }

    /// Apply `IMESSAGE_AUDIT_*` overrides from any variable source.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty(ENV_SOURCE) {
            self.source = PathBuf::from(v);
        }
        if let Some(v) = non_empty(ENV_STORE) {
            self.store = PathBuf::from(v);
        }
        if let Some(v) = non_empty(ENV_CONTACTS) {
            self.contacts = PathBuf::from(v);
        }
        if let Some(v) = non_empty(ENV_BATCH_SIZE) {
            self.batch_size = parse_batch_size(&v)?;
        }
        Ok(())
    }
}

pub fn parse_batch_size(raw: &str) -> Result<usize> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(EngineError::Config(format!(
            "batch size must be a positive integer, got {:?}",
            raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.source.ends_with("Library/Messages/chat.db"));
        assert!(config.store.ends_with("imessage-audit/audit.db"));
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert!(config.backup_dir.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_STORE, "/tmp/audit.db"),
            (ENV_BATCH_SIZE, "64"),
            (ENV_SOURCE, "  "),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        let source_before = config.source.clone();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.store, PathBuf::from("/tmp/audit.db"));
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.source, source_before);
    }

    #[test]
    fn test_bad_batch_size() {
        let mut config = EngineConfig::default();
        let err = config
            .apply_env(|k| (k == ENV_BATCH_SIZE).then(|| "0".to_string()))
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
        assert!(parse_batch_size("abc").is_err());
        assert_eq!(parse_batch_size(" 10 ").unwrap(), 10);
    }

    #[test]
    fn test_partial_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"store": "/data/audit.db", "batch_size": 50}"#).unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.store, PathBuf::from("/data/audit.db"));
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.source, EngineConfig::default().source);
    }

    #[test]
    fn test_zero_batch_size_in_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"batch_size": 0}"#).unwrap();

        assert!(matches!(
            EngineConfig::from_file(&path),
            Err(EngineError::Config(_))
        ));
        assert!(EngineConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(EngineConfig::load(Some(&dir.path().join("nope.json"))).is_err());
    }
}
