//! Audit store: the destination SQLite database.
//!
//! All access goes through one `Mutex<Connection>`, so every write (and every
//! find-then-update sequence) is serialized. Rows are keyed by external
//! identifier and only ever inserted or updated by an import.
//!
//! CHANGELOG:
//! - 10/16/2026 - Initial store (messages, attachments, threads, metrics)

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::queries;
use crate::blob::DisplayText;
use crate::error::{EngineError, Result};
use crate::identity::{ExternalIdentifier, IdSource};
use crate::records::{AttachmentRecord, Channel, ChatRecord};
use crate::threads::{RawThread, ThreadMessage};

/// A decoded message ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub external_id: ExternalIdentifier,
    pub id_source: IdSource,
    pub source_local_id: i64,
    pub channel: Channel,
    pub handle: String,
    pub chat_identifier: String,
    pub timestamp_ms: i64,
    pub is_from_me: bool,
    pub text: DisplayText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertAction {
    Inserted,
    /// Row existed from an earlier run.
    Updated,
    /// Row was already written by this same run; last writer wins.
    Overwritten,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpsertOutcome {
    pub row_id: i64,
    pub action: UpsertAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LinkOutcome {
    Inserted,
    Repaired { stale_row_id: i64 },
    Unchanged,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub messages: i64,
    pub attachments: i64,
    pub threads: i64,
}

pub struct AuditStore {
    conn: Mutex<Connection>,
}

impl AuditStore {
    /// Open (creating if needed) a store on disk and migrate its schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn migrate(conn: &Connection) -> Result<()> {
        conn.execute_batch(queries::STORE_SCHEMA)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| EngineError::LockPoisoned)
    }

    // ========================================================================
    // Messages
    // ========================================================================

    /// Insert or update a message by external identifier.
    pub fn upsert_message(&self, run_id: &str, message: &StoredMessage) -> Result<UpsertOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let existing: Option<(i64, String)> = tx
            .query_row(
                queries::STORE_FIND_MESSAGE,
                params![message.external_id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let action = match existing {
            None => UpsertAction::Inserted,
            Some((_, ref previous_run)) if previous_run == run_id => UpsertAction::Overwritten,
            Some(_) => UpsertAction::Updated,
        };

        let id_source = match message.id_source {
            IdSource::Native => "native",
            IdSource::FallbackHash => "fallback_hash",
        };

        let row_id: i64 = tx.query_row(
            queries::STORE_UPSERT_MESSAGE,
            params![
                message.external_id.as_str(),
                id_source,
                message.source_local_id,
                message.channel.as_str(),
                &message.handle,
                &message.chat_identifier,
                message.timestamp_ms,
                message.is_from_me,
                message.text.kind(),
                message.text.text(),
                run_id,
                queries::now_ms(),
            ],
            |row| row.get(0),
        )?;
        tx.commit()?;

        if action == UpsertAction::Overwritten {
            tracing::warn!(
                external_id = %message.external_id,
                row_id,
                "message written twice in one import run, keeping the last write"
            );
        }

        Ok(UpsertOutcome { row_id, action })
    }

    /// Current row id of a message, if stored.
    pub fn message_row_id(&self, external_id: &str) -> Result<Option<i64>> {
        let conn = self.lock()?;
        let row_id = conn
            .query_row(queries::STORE_FIND_MESSAGE, params![external_id], |row| row.get(0))
            .optional()?;
        Ok(row_id)
    }

    /// Delete a message row. Attachment rows are left in place and get
    /// re-linked by the next import.
    pub fn delete_message_row(&self, external_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let n = conn.execute("DELETE FROM messages WHERE external_id = ?1", params![external_id])?;
        Ok(n > 0)
    }

    // ========================================================================
    // Attachments
    // ========================================================================

    /// Link an attachment to its message, repairing a stale local link.
    ///
    /// Found by `(message_external_id, filename)`. Runs under the store lock in
    /// one transaction, so concurrent callers never create duplicates.
    pub fn link_attachment(&self, attachment: &AttachmentRecord, message_row_id: i64) -> Result<LinkOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let existing: Option<(i64, i64)> = tx
            .query_row(
                queries::STORE_FIND_ATTACHMENT,
                params![&attachment.message_external_id, &attachment.filename],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let outcome = match existing {
            None => {
                tx.execute(
                    queries::STORE_INSERT_ATTACHMENT,
                    params![
                        &attachment.message_external_id,
                        message_row_id,
                        &attachment.filename,
                        &attachment.mime_type,
                        attachment.total_bytes,
                    ],
                )?;
                LinkOutcome::Inserted
            }
            Some((_, linked)) if linked == message_row_id => LinkOutcome::Unchanged,
            Some((id, stale_row_id)) => {
                tx.execute(
                    queries::STORE_UPDATE_ATTACHMENT,
                    params![id, message_row_id, &attachment.mime_type, attachment.total_bytes],
                )?;
                tracing::debug!(
                    external_id = %attachment.message_external_id,
                    filename = %attachment.filename,
                    stale_row_id,
                    message_row_id,
                    "repaired attachment link"
                );
                LinkOutcome::Repaired { stale_row_id }
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    /// Attachments of a message, as `(filename, message_row_id)`.
    pub fn attachments_for(&self, external_id: &str) -> Result<Vec<(String, i64)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT filename, message_row_id FROM attachments
             WHERE message_external_id = ?1 ORDER BY filename",
        )?;
        let rows = stmt.query_map(params![external_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let attachments = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(attachments)
    }

    // ========================================================================
    // Threads
    // ========================================================================

    /// Record chat metadata and participants, keyed by chat identifier.
    pub fn upsert_thread(&self, chat: &ChatRecord) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            queries::STORE_UPSERT_THREAD,
            params![
                &chat.chat_identifier,
                &chat.display_name,
                &chat.service,
                chat.is_group(),
                queries::now_ms(),
            ],
        )?;
        for handle in &chat.participants {
            tx.execute(queries::STORE_INSERT_PARTICIPANT, params![&chat.chat_identifier, handle])?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Every stored chat with its messages, in chat identifier order.
    ///
    /// Chats without a thread row (messages imported without chat metadata)
    /// take their participants from the message handles.
    pub fn load_threads(&self) -> Result<Vec<RawThread>> {
        let conn = self.lock()?;

        let heads: Vec<(String, Option<String>, Option<bool>)> = {
            let mut stmt = conn.prepare(queries::STORE_THREADS)?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
            let heads = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            heads
        };

        let mut participants_stmt = conn.prepare(queries::STORE_THREAD_PARTICIPANTS)?;
        let mut messages_stmt = conn.prepare(queries::STORE_THREAD_MESSAGES)?;

        let mut threads = Vec::with_capacity(heads.len());
        for (chat_identifier, display_name, is_group) in heads {
            let mut participants = participants_stmt
                .query_map(params![&chat_identifier], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let messages = messages_stmt
                .query_map(params![&chat_identifier], |row| {
                    let channel: String = row.get(4)?;
                    let kind: String = row.get(5)?;
                    let text: Option<String> = row.get(6)?;
                    Ok(ThreadMessage {
                        external_id: row.get(0)?,
                        timestamp_ms: row.get(1)?,
                        is_from_me: row.get(2)?,
                        handle: row.get(3)?,
                        channel: Channel::parse(&channel).unwrap_or(Channel::Sms),
                        text: display_text(&kind, text),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            if participants.is_empty() {
                for m in &messages {
                    if !participants.contains(&m.handle) {
                        participants.push(m.handle.clone());
                    }
                }
            }

            threads.push(RawThread {
                chat_identifier,
                display_name,
                is_group: is_group.unwrap_or(participants.len() > 1),
                participants,
                messages,
            });
        }
        Ok(threads)
    }

    // ========================================================================
    // Metrics
    // ========================================================================

    /// Add `delta` to a named counter.
    pub fn bump_metric(&self, name: &str, delta: i64) -> Result<()> {
        if delta == 0 {
            return Ok(());
        }
        let conn = self.lock()?;
        conn.execute(queries::STORE_BUMP_METRIC, params![name, delta, queries::now_ms()])?;
        Ok(())
    }

    pub fn metrics(&self) -> Result<BTreeMap<String, i64>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(queries::STORE_METRICS)?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        let metrics = rows.collect::<rusqlite::Result<BTreeMap<_, _>>>()?;
        Ok(metrics)
    }

    pub fn counts(&self) -> Result<StoreCounts> {
        let conn = self.lock()?;
        let count = |sql: &str| conn.query_row(sql, [], |row| row.get::<_, i64>(0));
        Ok(StoreCounts {
            messages: count("SELECT COUNT(*) FROM messages")?,
            attachments: count("SELECT COUNT(*) FROM attachments")?,
            threads: count("SELECT COUNT(DISTINCT chat_identifier) FROM messages")?,
        })
    }
}

fn display_text(kind: &str, text: Option<String>) -> DisplayText {
    match (kind, text) {
        ("text", Some(text)) => DisplayText::Text(text),
        ("reaction_or_system", _) => DisplayText::ReactionOrSystem,
        _ => DisplayText::UnableToParse,
    }
}
