//! Reading a full snapshot of a source Messages store.
//!
//! CHANGELOG:
//! - 10/16/2026 - Initial snapshot reader (messages, chats, attachments)

use rusqlite::{params, Connection};

use super::queries;
use crate::error::Result;
use crate::records::{Channel, ChatRecord, RawMessageRecord, SourceAttachment};

/// Everything an import run needs from the source store.
#[derive(Debug, Default, Clone)]
pub struct SourceSnapshot {
    pub chats: Vec<ChatRecord>,
    pub messages: Vec<RawMessageRecord>,
    pub attachments: Vec<SourceAttachment>,
}

/// Read chats, messages and attachments in one pass.
pub fn read_snapshot(conn: &Connection) -> Result<SourceSnapshot> {
    let snapshot = SourceSnapshot {
        chats: read_chats(conn)?,
        messages: read_messages(conn)?,
        attachments: read_attachments(conn)?,
    };
    tracing::info!(
        chats = snapshot.chats.len(),
        messages = snapshot.messages.len(),
        attachments = snapshot.attachments.len(),
        "read source snapshot"
    );
    Ok(snapshot)
}

pub fn read_messages(conn: &Connection) -> Result<Vec<RawMessageRecord>> {
    let mut stmt = conn.prepare(queries::SOURCE_MESSAGES)?;
    let rows = stmt.query_map([], |row| {
        let handle: String = row.get(7)?;
        let service: Option<String> = row.get(6)?;
        Ok(RawMessageRecord {
            local_id: row.get(0)?,
            guid: row.get(1)?,
            text: row.get(2)?,
            body: row.get(3)?,
            is_from_me: row.get::<_, Option<i64>>(4)?.unwrap_or(0) != 0,
            timestamp_ms: queries::cocoa_to_unix_ms(row.get::<_, Option<i64>>(5)?.unwrap_or(0)),
            channel: Channel::from_service(service.as_deref(), &handle),
            handle,
            chat_identifier: row.get(8)?,
        })
    })?;

    let mut messages = Vec::new();
    for row in rows {
        messages.push(row?);
    }
    Ok(messages)
}

pub fn read_chats(conn: &Connection) -> Result<Vec<ChatRecord>> {
    let mut chats = {
        let mut stmt = conn.prepare(queries::SOURCE_CHATS)?;
        let rows = stmt.query_map([], |row| {
            Ok(ChatRecord {
                local_id: row.get(0)?,
                chat_identifier: row.get(1)?,
                display_name: row
                    .get::<_, Option<String>>(2)?
                    .filter(|name| !name.trim().is_empty()),
                service: row.get(3)?,
                style: row.get(4)?,
                participants: Vec::new(),
            })
        })?;
        let chats = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        chats
    };

    let mut stmt = conn.prepare(queries::SOURCE_CHAT_PARTICIPANTS)?;
    for chat in &mut chats {
        let handles = stmt.query_map(params![chat.local_id], |row| row.get::<_, String>(0))?;
        chat.participants = handles.collect::<rusqlite::Result<Vec<_>>>()?;
    }
    Ok(chats)
}

pub fn read_attachments(conn: &Connection) -> Result<Vec<SourceAttachment>> {
    let mut stmt = conn.prepare(queries::SOURCE_ATTACHMENTS)?;
    let rows = stmt.query_map([], |row| {
        Ok(SourceAttachment {
            message_local_id: row.get(0)?,
            filename: row.get(1)?,
            mime_type: row.get(2)?,
            total_bytes: row.get(3)?,
        })
    })?;
    let attachments = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(attachments)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal chat.db schema: only the tables and columns the reader touches.
    const FIXTURE_SCHEMA: &str = r#"
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

    fn fixture() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(FIXTURE_SCHEMA).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO handle VALUES (1, '+14155551234', 'SMS');
            INSERT INTO handle VALUES (2, 'madison@icloud.com', 'iMessage');
            INSERT INTO handle VALUES (3, '+14155550000', 'iMessage');
            INSERT INTO chat VALUES (1, '+14155551234', '', 'SMS', 45);
            INSERT INTO chat VALUES (2, 'chat123456', 'Closing team', 'iMessage', 43);
            INSERT INTO chat_handle_join VALUES (1, 1);
            INSERT INTO chat_handle_join VALUES (2, 2);
            INSERT INTO chat_handle_join VALUES (2, 3);
            INSERT INTO message VALUES (10, 'G-10', 'Hi there', NULL, 1, 'SMS', 757382400000000000, 0);
            INSERT INTO message VALUES (11, 'G-11', 'Reply', NULL, 0, 'SMS', 757382460000000000, 1);
            INSERT INTO message VALUES (12, 'G-12', 'Group hello', NULL, 2, 'iMessage', 757382400, 0);
            INSERT INTO chat_message_join VALUES (1, 10);
            INSERT INTO chat_message_join VALUES (1, 11);
            INSERT INTO chat_message_join VALUES (2, 12);
            INSERT INTO attachment VALUES (1, '~/Library/Messages/Attachments/a/IMG_0001.HEIC', NULL, 'image/heic', 2048);
            INSERT INTO attachment VALUES (2, NULL, 'contract.pdf', 'application/pdf', NULL);
            INSERT INTO message_attachment_join VALUES (10, 1);
            INSERT INTO message_attachment_join VALUES (12, 2);
            "#,
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_reads_messages() {
        let conn = fixture();
        let messages = read_messages(&conn).unwrap();
        assert_eq!(messages.len(), 3);

        let first = messages.iter().find(|m| m.local_id == 10).unwrap();
        assert_eq!(first.handle, "+14155551234");
        assert_eq!(first.channel, Channel::Sms);
        assert_eq!(first.timestamp_ms, 1_735_689_600_000);
        assert_eq!(first.chat_identifier.as_deref(), Some("+14155551234"));
    }

    #[test]
    fn test_sent_message_takes_chat_participant() {
        let conn = fixture();
        let messages = read_messages(&conn).unwrap();
        let sent = messages.iter().find(|m| m.local_id == 11).unwrap();
        assert!(sent.is_from_me);
        assert_eq!(sent.handle, "+14155551234");
    }

    #[test]
    fn test_legacy_seconds_and_email_channel() {
        let conn = fixture();
        let messages = read_messages(&conn).unwrap();
        let group = messages.iter().find(|m| m.local_id == 12).unwrap();
        assert_eq!(group.timestamp_ms, 1_735_689_600_000);
        assert_eq!(group.channel, Channel::ImessageEmail);
    }

    #[test]
    fn test_reads_chats_with_participants() {
        let conn = fixture();
        let chats = read_chats(&conn).unwrap();
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[0].display_name, None);
        assert!(!chats[0].is_group());
        assert_eq!(chats[1].display_name.as_deref(), Some("Closing team"));
        assert!(chats[1].is_group());
    }

    #[test]
    fn test_group_style_survives_members_leaving() {
        let conn = fixture();
        conn.execute_batch(
            r#"
            INSERT INTO chat VALUES (3, 'chat777001', 'Appraisal', 'iMessage', 43);
            INSERT INTO chat_handle_join VALUES (3, 3);
            "#,
        )
        .unwrap();
        let chats = read_chats(&conn).unwrap();
        let appraisal = chats.iter().find(|c| c.local_id == 3).unwrap();
        assert_eq!(appraisal.participants.len(), 1);
        assert_eq!(appraisal.style, Some(43));
        assert!(appraisal.is_group());
    }

    #[test]
    fn test_reads_attachments() {
        let conn = fixture();
        let attachments = read_attachments(&conn).unwrap();
        assert_eq!(attachments.len(), 2);
        assert_eq!(attachments[1].filename, "contract.pdf");
        assert_eq!(attachments[1].total_bytes, 0);
    }
}
