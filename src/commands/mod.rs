//! Command implementations.
//!
//! CHANGELOG:
//! - 10/16/2026 - Replaced reading/messaging/rag commands with import, threads, decode, stats
//! - 01/10/2026 - Initial module structure

pub mod decode;
pub mod import;
pub mod stats;
pub mod threads;

use anyhow::{Context, Result};

use crate::config::EngineConfig;
use crate::contacts::ContactsManager;
use crate::db::store::AuditStore;

/// Open the audit store named by the config.
pub(crate) fn open_store(config: &EngineConfig) -> Result<AuditStore> {
    AuditStore::open(&config.store)
        .with_context(|| format!("Failed to open audit store at {:?}", config.store))
}

/// Load contacts, or an empty directory when the file does not exist.
pub(crate) fn load_contacts(config: &EngineConfig) -> Result<ContactsManager> {
    if !config.contacts.exists() {
        tracing::debug!(path = ?config.contacts, "no contacts file, threads stay unassigned");
        return Ok(ContactsManager::empty());
    }
    ContactsManager::load(&config.contacts)
        .with_context(|| format!("Failed to load contacts from {:?}", config.contacts))
}
