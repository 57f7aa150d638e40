//! imessage-audit library
//!
//! Message import and identity resolution for iMessage/SMS stores: decodes
//! message bodies, keeps stable ids across re-imports, and merges threads per
//! contact for display.
//!
//! CHANGELOG:
//! - 10/16/2026 - Import engine modules (blob, identity, import, threads, config)
//! - 01/10/2026 - Initial library structure

// Core modules
pub mod blob;
pub mod config;
pub mod contacts;
pub mod db;
pub mod error;
pub mod identity;
pub mod import;
pub mod records;
pub mod threads;

// CLI support
pub mod commands;
pub mod output;

pub use blob::{extract, extract_message, DisplayText};
pub use error::{EngineError, Result};
pub use identity::{resolve_external_id, ExternalIdentifier, IdSource};
pub use threads::{merge, ContactDirectory, MergedThread};
