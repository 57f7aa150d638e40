//! Shared fixtures: a throwaway chat.db with just the tables the importer reads.

#![allow(dead_code)]

use rusqlite::{params, Connection};
use std::path::Path;

pub const SCHEMA: &str = r#"
    CREATE TABLE handle (ROWID INTEGER PRIMARY KEY, id TEXT NOT NULL, service TEXT);
    CREATE TABLE chat (
        ROWID INTEGER PRIMARY KEY, chat_identifier TEXT, display_name TEXT, service_name TEXT, style INTEGER
    );
    CREATE TABLE message (
        ROWID INTEGER PRIMARY KEY, guid TEXT, text TEXT, attributedBody BLOB,
        handle_id INTEGER DEFAULT 0, service TEXT, date INTEGER, is_from_me INTEGER DEFAULT 0
    );
    CREATE TABLE chat_message_join (chat_id INTEGER, message_id INTEGER);
    CREATE TABLE chat_handle_join (chat_id INTEGER, handle_id INTEGER);
    CREATE TABLE attachment (
        ROWID INTEGER PRIMARY KEY, filename TEXT, transfer_name TEXT, mime_type TEXT, total_bytes INTEGER
    );
    CREATE TABLE message_attachment_join (message_id INTEGER, attachment_id INTEGER);
"#;

/// 2025-01-01T00:00:00Z as a Cocoa nanosecond date.
pub const JAN_1_2025_NS: i64 = 757_382_400_000_000_000;
pub const MINUTE_NS: i64 = 60_000_000_000;

pub fn fixture_bytes(name: &str) -> Vec<u8> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read(&path).unwrap_or_else(|e| panic!("fixture {:?}: {}", path, e))
}

/// Builder for a source store on disk.
pub struct SourceDb {
    pub conn: Connection,
}

impl SourceDb {
    pub fn create(path: &Path) -> Self {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        Self { conn }
    }

    pub fn handle(&self, rowid: i64, id: &str, service: &str) -> &Self {
        self.conn
            .execute("INSERT INTO handle VALUES (?1, ?2, ?3)", params![rowid, id, service])
            .unwrap();
        self
    }

    /// `chat.style` is 43 for more than one handle, 45 otherwise.
    pub fn chat(&self, rowid: i64, identifier: &str, name: Option<&str>, service: &str, handles: &[i64]) -> &Self {
        let style = if handles.len() > 1 { 43 } else { 45 };
        self.conn
            .execute(
                "INSERT INTO chat VALUES (?1, ?2, ?3, ?4, ?5)",
                params![rowid, identifier, name, service, style],
            )
            .unwrap();
        for h in handles {
            self.conn
                .execute("INSERT INTO chat_handle_join VALUES (?1, ?2)", params![rowid, h])
                .unwrap();
        }
        self
    }

    #[allow(clippy::too_many_arguments)]
    pub fn message(
        &self,
        rowid: i64,
        guid: Option<&str>,
        chat: i64,
        handle: i64,
        service: &str,
        minute: i64,
        text: Option<&str>,
        body: Option<&[u8]>,
    ) -> &Self {
        self.conn
            .execute(
                "INSERT INTO message VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0)",
                params![rowid, guid, text, body, handle, service, JAN_1_2025_NS + minute * MINUTE_NS],
            )
            .unwrap();
        self.conn
            .execute("INSERT INTO chat_message_join VALUES (?1, ?2)", params![chat, rowid])
            .unwrap();
        self
    }

    pub fn attachment(&self, rowid: i64, message: i64, filename: &str, mime: &str) -> &Self {
        self.conn
            .execute(
                "INSERT INTO attachment VALUES (?1, ?2, NULL, ?3, 1024)",
                params![rowid, filename, mime],
            )
            .unwrap();
        self.conn
            .execute(
                "INSERT INTO message_attachment_join VALUES (?1, ?2)",
                params![message, rowid],
            )
            .unwrap();
        self
    }
}
