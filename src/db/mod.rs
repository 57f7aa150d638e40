//! SQLite access: the source Messages store (read-only) and the audit store.
//!
//! CHANGELOG:
//! - 10/16/2026 - Added source snapshot reader and audit store
//! - 01/10/2026 - Initial module structure

pub mod connection;
pub mod queries;
pub mod source;
pub mod store;
