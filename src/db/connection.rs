//! Opening source message stores.
//!
//! Two sources are supported: the live `~/Library/Messages/chat.db` and the
//! `sms.db` inside an unencrypted iPhone backup folder.
//!
//! CHANGELOG:
//! - 10/16/2026 - Added iPhone backup discovery with encryption check
//! - 01/10/2026 - Initial stub

use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};

/// Backup file name of `HomeDomain-Library/SMS/sms.db` (SHA-1 of the domain path).
pub const SMS_DB_BACKUP_HASH: &str = "3d0d7e5fb2ce288813306e4d4636395e047a3d28";

/// Default Messages.db path.
pub fn default_chat_db_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Library")
        .join("Messages")
        .join("chat.db")
}

/// Where Finder / iTunes keep device backups.
pub fn default_backup_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Library")
        .join("Application Support")
        .join("MobileSync")
        .join("Backup")
}

/// Open a source store read-only.
pub fn open_source(path: &Path) -> Result<Connection> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .and_then(|conn| {
        // Fails here rather than mid-import when the file is not a database
        // or Full Disk Access is missing.
        conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))?;
        Ok(conn)
    })
    .map_err(|source| EngineError::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    })
}

/// Check if we have access to a source store.
pub fn check_access(path: &Path) -> bool {
    open_source(path).is_ok()
}

/// Whether `Manifest.plist` marks the backup as encrypted.
///
/// A backup without a manifest is treated as unencrypted.
pub fn backup_is_encrypted(backup_dir: &Path) -> Result<bool> {
    let manifest = backup_dir.join("Manifest.plist");
    if !manifest.exists() {
        return Ok(false);
    }
    let value = plist::Value::from_file(&manifest)?;
    Ok(value
        .as_dictionary()
        .and_then(|d| d.get("IsEncrypted"))
        .and_then(plist::Value::as_boolean)
        .unwrap_or(false))
}

/// Find the SMS database inside an iPhone backup folder.
///
/// Encrypted backups are refused; their files cannot be read without the
/// backup passphrase.
pub fn locate_backup_sms_db(backup_dir: &Path) -> Result<PathBuf> {
    if backup_is_encrypted(backup_dir)? {
        return Err(EngineError::EncryptedBackup(backup_dir.to_path_buf()));
    }

    let candidates = [
        backup_dir.join(&SMS_DB_BACKUP_HASH[..2]).join(SMS_DB_BACKUP_HASH),
        backup_dir.join(SMS_DB_BACKUP_HASH),
    ];
    candidates
        .into_iter()
        .find(|p| p.is_file())
        .ok_or_else(|| EngineError::BackupNotFound(backup_dir.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use plist::{Dictionary, Value};

    fn write_manifest(dir: &Path, encrypted: bool) {
        let mut d = Dictionary::new();
        d.insert("IsEncrypted".into(), Value::Boolean(encrypted));
        Value::Dictionary(d).to_file_xml(dir.join("Manifest.plist")).unwrap();
    }

    #[test]
    fn test_default_chat_db_path() {
        let path = default_chat_db_path();
        assert!(path.ends_with("Library/Messages/chat.db"));
    }

    #[test]
    fn test_locates_modern_layout() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), false);
        let nested = dir.path().join("3d");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join(SMS_DB_BACKUP_HASH), b"").unwrap();

        let found = locate_backup_sms_db(dir.path()).unwrap();
        assert_eq!(found, nested.join(SMS_DB_BACKUP_HASH));
    }

    #[test]
    fn test_locates_flat_layout_without_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SMS_DB_BACKUP_HASH), b"").unwrap();
        assert!(locate_backup_sms_db(dir.path()).is_ok());
    }

    #[test]
    fn test_encrypted_backup_refused() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), true);
        std::fs::write(dir.path().join(SMS_DB_BACKUP_HASH), b"").unwrap();
        assert!(matches!(
            locate_backup_sms_db(dir.path()),
            Err(EngineError::EncryptedBackup(_))
        ));
    }

    #[test]
    fn test_missing_sms_db() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), false);
        assert!(matches!(
            locate_backup_sms_db(dir.path()),
            Err(EngineError::BackupNotFound(_))
        ));
    }

    #[test]
    fn test_open_source_rejects_non_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.db");
        std::fs::write(&path, b"definitely not sqlite, just some bytes padding it out").unwrap();
        assert!(matches!(
            open_source(&path),
            Err(EngineError::SourceUnavailable { .. })
        ));
        assert!(!check_access(&path));
    }
}
