//! Library error type.
//!
//! Decode problems never show up here; they degrade to placeholders inside
//! `blob::extract`. Only failures to read the source or write the audit store
//! propagate to callers.
//!
//! CHANGELOG:
//! - 10/16/2026 - Initial error taxonomy

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Cannot open message source at {path:?}: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Backup at {0:?} is encrypted; decrypt it with its passphrase before importing")]
    EncryptedBackup(PathBuf),

    #[error("No SMS database found in backup at {0:?}")]
    BackupNotFound(PathBuf),

    #[error("Backup manifest unreadable: {0}")]
    BackupManifest(#[from] plist::Error),

    #[error("Database error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialisation error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
