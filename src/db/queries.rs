//! SQL for the source Messages store and the audit store.
//!
//! CHANGELOG:
//! - 10/17/2026 - Sticky group flag; overflow-safe Cocoa date check
//! - 10/16/2026 - Replaced per-command queries with full-snapshot source queries
//! - 10/16/2026 - Added audit store schema and upserts
//! - 01/10/2026 - Initial stub with query constants

// ============================================================================
// Source store (chat.db / backup sms.db)
// ============================================================================

/// Every message with its counterpart handle and owning chat.
///
/// Sent messages in one-to-one chats carry `handle_id = 0`; the counterpart
/// then comes from the chat's first participant, then the chat identifier.
pub const SOURCE_MESSAGES: &str = r#"
SELECT
    m.ROWID,
    m.guid,
    m.text,
    m.attributedBody,
    m.is_from_me,
    m.date,
    COALESCE(m.service, c.service_name) AS service,
    COALESCE(
        h.id,
        (SELECT h2.id FROM chat_handle_join chj
         JOIN handle h2 ON chj.handle_id = h2.ROWID
         WHERE chj.chat_id = c.ROWID
         ORDER BY h2.ROWID LIMIT 1),
        c.chat_identifier,
        ''
    ) AS handle,
    c.chat_identifier
FROM message m
LEFT JOIN handle h ON m.handle_id = h.ROWID
LEFT JOIN chat_message_join cmj ON m.ROWID = cmj.message_id
LEFT JOIN chat c ON cmj.chat_id = c.ROWID
GROUP BY m.ROWID
ORDER BY m.date ASC, m.ROWID ASC
"#;

/// All chats.
pub const SOURCE_CHATS: &str = r#"
SELECT
    c.ROWID,
    c.chat_identifier,
    c.display_name,
    c.service_name,
    c.style
FROM chat c
WHERE c.chat_identifier IS NOT NULL
ORDER BY c.ROWID
"#;

/// Counterpart handles of one chat.
pub const SOURCE_CHAT_PARTICIPANTS: &str = r#"
SELECT h.id
FROM chat_handle_join chj
JOIN handle h ON chj.handle_id = h.ROWID
WHERE chj.chat_id = ?1
ORDER BY h.ROWID
"#;

/// Attachments with the local ROWID of their owning message.
pub const SOURCE_ATTACHMENTS: &str = r#"
SELECT
    maj.message_id,
    COALESCE(a.filename, a.transfer_name) AS filename,
    a.mime_type,
    COALESCE(a.total_bytes, 0) AS total_bytes
FROM message_attachment_join maj
JOIN attachment a ON maj.attachment_id = a.ROWID
WHERE COALESCE(a.filename, a.transfer_name) IS NOT NULL
ORDER BY maj.message_id, a.ROWID
"#;

// ============================================================================
// Audit store
// ============================================================================

pub const STORE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    row_id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id TEXT NOT NULL UNIQUE,
    id_source TEXT NOT NULL,
    source_local_id INTEGER,
    channel TEXT NOT NULL,
    handle TEXT NOT NULL,
    chat_identifier TEXT NOT NULL,
    timestamp_ms INTEGER NOT NULL,
    is_from_me INTEGER NOT NULL,
    body_kind TEXT NOT NULL,
    text TEXT,
    import_run TEXT NOT NULL,
    updated_at_ms INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_messages_chat ON messages(chat_identifier, timestamp_ms);

CREATE TABLE IF NOT EXISTS attachments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    message_external_id TEXT NOT NULL,
    message_row_id INTEGER NOT NULL,
    filename TEXT NOT NULL,
    mime_type TEXT,
    total_bytes INTEGER NOT NULL DEFAULT 0,
    UNIQUE(message_external_id, filename)
);

CREATE TABLE IF NOT EXISTS threads (
    chat_identifier TEXT PRIMARY KEY,
    display_name TEXT,
    service TEXT,
    is_group INTEGER NOT NULL,
    updated_at_ms INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS thread_participants (
    chat_identifier TEXT NOT NULL,
    handle TEXT NOT NULL,
    PRIMARY KEY (chat_identifier, handle)
);

CREATE TABLE IF NOT EXISTS import_metrics (
    name TEXT PRIMARY KEY,
    value INTEGER NOT NULL DEFAULT 0,
    updated_at_ms INTEGER NOT NULL
);
"#;

pub const STORE_FIND_MESSAGE: &str = r#"
SELECT row_id, import_run FROM messages WHERE external_id = ?1
"#;

pub const STORE_UPSERT_MESSAGE: &str = r#"
INSERT INTO messages (
    external_id,
    id_source,
    source_local_id,
    channel,
    handle,
    chat_identifier,
    timestamp_ms,
    is_from_me,
    body_kind,
    text,
    import_run,
    updated_at_ms
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
ON CONFLICT(external_id) DO UPDATE SET
    id_source = excluded.id_source,
    source_local_id = excluded.source_local_id,
    channel = excluded.channel,
    handle = excluded.handle,
    chat_identifier = excluded.chat_identifier,
    timestamp_ms = excluded.timestamp_ms,
    is_from_me = excluded.is_from_me,
    body_kind = excluded.body_kind,
    text = excluded.text,
    import_run = excluded.import_run,
    updated_at_ms = excluded.updated_at_ms
RETURNING row_id
"#;

pub const STORE_FIND_ATTACHMENT: &str = r#"
SELECT id, message_row_id FROM attachments
WHERE message_external_id = ?1 AND filename = ?2
"#;

pub const STORE_INSERT_ATTACHMENT: &str = r#"
INSERT INTO attachments (message_external_id, message_row_id, filename, mime_type, total_bytes)
VALUES (?1, ?2, ?3, ?4, ?5)
"#;

pub const STORE_UPDATE_ATTACHMENT: &str = r#"
UPDATE attachments
SET message_row_id = ?2, mime_type = COALESCE(?3, mime_type), total_bytes = ?4
WHERE id = ?1
"#;

pub const STORE_UPSERT_THREAD: &str = r#"
INSERT INTO threads (chat_identifier, display_name, service, is_group, updated_at_ms)
VALUES (?1, ?2, ?3, ?4, ?5)
ON CONFLICT(chat_identifier) DO UPDATE SET
    display_name = COALESCE(excluded.display_name, threads.display_name),
    service = COALESCE(excluded.service, threads.service),
    is_group = MAX(threads.is_group, excluded.is_group),
    updated_at_ms = excluded.updated_at_ms
"#;

pub const STORE_INSERT_PARTICIPANT: &str = r#"
INSERT OR IGNORE INTO thread_participants (chat_identifier, handle) VALUES (?1, ?2)
"#;

/// Every chat that has messages, with whatever thread metadata exists.
pub const STORE_THREADS: &str = r#"
SELECT
    m.chat_identifier,
    t.display_name,
    t.is_group
FROM messages m
LEFT JOIN threads t ON t.chat_identifier = m.chat_identifier
GROUP BY m.chat_identifier
ORDER BY m.chat_identifier
"#;

pub const STORE_THREAD_PARTICIPANTS: &str = r#"
SELECT handle FROM thread_participants WHERE chat_identifier = ?1 ORDER BY handle
"#;

pub const STORE_THREAD_MESSAGES: &str = r#"
SELECT external_id, timestamp_ms, is_from_me, handle, channel, body_kind, text
FROM messages
WHERE chat_identifier = ?1
ORDER BY timestamp_ms, external_id
"#;

pub const STORE_BUMP_METRIC: &str = r#"
INSERT INTO import_metrics (name, value, updated_at_ms) VALUES (?1, ?2, ?3)
ON CONFLICT(name) DO UPDATE SET
    value = import_metrics.value + excluded.value,
    updated_at_ms = excluded.updated_at_ms
"#;

pub const STORE_METRICS: &str = r#"
SELECT name, value FROM import_metrics ORDER BY name
"#;

// ============================================================================
// Timestamps
// ============================================================================

/// Cocoa epoch offset (2001-01-01 in Unix time).
pub const COCOA_EPOCH_OFFSET: i64 = 978_307_200;

/// Above this magnitude a Cocoa date is in nanoseconds, below it in seconds.
///
/// Seconds-based dates stay below 1e11 until the year 5000; nanosecond dates
/// pass it within two minutes of the epoch.
const NANOSECOND_THRESHOLD: i64 = 100_000_000_000;

/// Convert a Cocoa date (ns since 2001 on modern stores, seconds on legacy
/// backups) to Unix milliseconds.
pub fn cocoa_to_unix_ms(cocoa: i64) -> i64 {
    if cocoa.unsigned_abs() > NANOSECOND_THRESHOLD.unsigned_abs() {
        cocoa / 1_000_000 + COCOA_EPOCH_OFFSET * 1000
    } else {
        (cocoa + COCOA_EPOCH_OFFSET) * 1000
    }
}

/// Render Unix milliseconds as RFC 3339 (UTC).
pub fn unix_ms_to_iso(unix_ms: i64) -> Option<String> {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(unix_ms).map(|dt| dt.to_rfc3339())
}

/// Current Unix time in milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cocoa_nanoseconds() {
        // 2025-01-01 00:00:00 UTC in Cocoa time
        let cocoa = 757_382_400_000_000_000i64;
        assert_eq!(cocoa_to_unix_ms(cocoa), 1_735_689_600_000);
    }

    #[test]
    fn test_cocoa_legacy_seconds() {
        assert_eq!(cocoa_to_unix_ms(757_382_400), 1_735_689_600_000);
        assert_eq!(cocoa_to_unix_ms(0), COCOA_EPOCH_OFFSET * 1000);
    }

    #[test]
    fn test_cocoa_extremes_do_not_overflow() {
        assert_eq!(
            cocoa_to_unix_ms(i64::MIN),
            i64::MIN / 1_000_000 + COCOA_EPOCH_OFFSET * 1000
        );
        assert_eq!(
            cocoa_to_unix_ms(i64::MAX),
            i64::MAX / 1_000_000 + COCOA_EPOCH_OFFSET * 1000
        );
        assert_eq!(cocoa_to_unix_ms(-757_382_400), (COCOA_EPOCH_OFFSET - 757_382_400) * 1000);
    }

    #[test]
    fn test_iso_rendering() {
        let iso = unix_ms_to_iso(1_735_689_600_000).unwrap();
        assert!(iso.starts_with("2025-01-01T00:00:00"));
    }
}
