//! Import runs: source snapshot in, audit store rows out.
//!
//! Each batch is decoded in parallel (decoding is pure), then written one
//! message at a time through the store's lock. Cancellation is checked between
//! per-message steps; whatever was committed before it stays committed, and a
//! later run picks up where this one stopped because every write is an upsert.
//!
//! CHANGELOG:
//! - 10/17/2026 - Progress callback
//! - 10/16/2026 - Initial import pipeline with lease, cancellation and report

use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::blob::{extract_message, DisplayText};
use crate::db::source::SourceSnapshot;
use crate::db::store::{AuditStore, LinkOutcome, StoredMessage, UpsertAction};
use crate::error::Result;
use crate::identity::handle::canonical_handle;
use crate::identity::{resolve_with_text, ExternalIdentifier, IdSource};
use crate::records::{AttachmentRecord, RawMessageRecord};

pub const DEFAULT_BATCH_SIZE: usize = 500;

// Persisted counter names in `import_metrics`.
pub const METRIC_RUNS: &str = "runs";
pub const METRIC_IDENTITY_COLLISIONS: &str = "identity_collisions";
pub const METRIC_WRITE_CONFLICTS: &str = "write_conflicts";
pub const METRIC_UNABLE_TO_PARSE: &str = "unable_to_parse";
pub const METRIC_ATTACHMENTS_REPAIRED: &str = "attachments_repaired";

// ============================================================================
// Run-once guard
// ============================================================================

/// Allows at most one import at a time within the owning session.
///
/// The session belongs to whoever drives imports (CLI invocation, app
/// window); the engine only ever sees the lease.
#[derive(Debug, Default, Clone)]
pub struct ImportSession {
    active: Arc<AtomicBool>,
}

impl ImportSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lease, or `None` while another run holds it.
    pub fn try_acquire(&self) -> Option<ImportLease> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(ImportLease {
            run_id: Uuid::new_v4().to_string(),
            active: Arc::clone(&self.active),
        })
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Proof that the holder may run an import. Released on drop.
#[derive(Debug)]
pub struct ImportLease {
    run_id: String,
    active: Arc<AtomicBool>,
}

impl ImportLease {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

impl Drop for ImportLease {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

/// Cooperative cancellation, shared with whoever may stop the run.
#[derive(Debug, Default, Clone)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub run_id: String,
    pub seen: usize,
    pub inserted: usize,
    pub updated: usize,
    pub overwritten: usize,
    pub text: usize,
    pub reaction_or_system: usize,
    pub unable_to_parse: usize,
    pub attachments_inserted: usize,
    pub attachments_repaired: usize,
    pub attachments_unchanged: usize,
    pub attachments_orphaned: usize,
    pub identity_collisions: usize,
    pub write_conflicts: usize,
    pub cancelled: bool,
}

impl ImportReport {
    fn count_text(&mut self, text: &DisplayText) {
        match text {
            DisplayText::Text(_) => self.text += 1,
            DisplayText::ReactionOrSystem => self.reaction_or_system += 1,
            DisplayText::UnableToParse => self.unable_to_parse += 1,
        }
    }
}

// ============================================================================
// Importer
// ============================================================================

/// Message decoded and resolved, waiting for its write.
struct Prepared {
    local_id: i64,
    message: StoredMessage,
}

fn prepare(record: &RawMessageRecord) -> Prepared {
    let text = extract_message(record.text.as_deref(), record.body.as_deref());
    let resolved = resolve_with_text(record, text.text());
    let chat_identifier = record
        .chat_identifier
        .clone()
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| canonical_handle(&record.handle));

    Prepared {
        local_id: record.local_id,
        message: StoredMessage {
            external_id: resolved.id,
            id_source: resolved.source,
            source_local_id: record.local_id,
            channel: record.channel,
            handle: record.handle.clone(),
            chat_identifier,
            timestamp_ms: record.timestamp_ms,
            is_from_me: record.is_from_me,
            text,
        },
    }
}

pub struct Importer<'a> {
    store: &'a AuditStore,
    batch_size: usize,
    progress: Option<Box<dyn Fn(&ImportReport) + 'a>>,
}

impl<'a> Importer<'a> {
    pub fn new(store: &'a AuditStore) -> Self {
        Self {
            store,
            batch_size: DEFAULT_BATCH_SIZE,
            progress: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Called with the running report after every message write.
    pub fn with_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(&ImportReport) + 'a,
    {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Import a snapshot. Only store failures are returned as errors.
    pub fn run(&self, lease: &ImportLease, snapshot: &SourceSnapshot, cancel: &CancelFlag) -> Result<ImportReport> {
        let run_id = lease.run_id();
        let mut report = ImportReport {
            run_id: run_id.to_string(),
            ..Default::default()
        };
        tracing::info!(
            run_id,
            messages = snapshot.messages.len(),
            batch_size = self.batch_size,
            "import started"
        );

        for chat in &snapshot.chats {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            self.store.upsert_thread(chat)?;
        }

        // local id -> (external id, audit row id) for attachment linking
        let mut written: HashMap<i64, (ExternalIdentifier, i64)> = HashMap::new();
        // fallback id -> local id that produced it in this run
        let mut fallback_owners: HashMap<ExternalIdentifier, i64> = HashMap::new();

        'batches: for (index, batch) in snapshot.messages.chunks(self.batch_size).enumerate() {
            if report.cancelled || cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let prepared: Vec<Prepared> = batch.par_iter().map(prepare).collect();

            for p in prepared {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    break 'batches;
                }
                report.seen += 1;
                report.count_text(&p.message.text);

                if p.message.id_source == IdSource::FallbackHash {
                    match fallback_owners.get(&p.message.external_id) {
                        Some(&owner) if owner != p.local_id => {
                            report.identity_collisions += 1;
                            tracing::warn!(
                                external_id = %p.message.external_id,
                                first_local_id = owner,
                                local_id = p.local_id,
                                "fallback identifier collision, last writer wins"
                            );
                        }
                        Some(_) => {}
                        None => {
                            fallback_owners.insert(p.message.external_id.clone(), p.local_id);
                        }
                    }
                }

                let outcome = self.store.upsert_message(run_id, &p.message)?;
                match outcome.action {
                    UpsertAction::Inserted => report.inserted += 1,
                    UpsertAction::Updated => report.updated += 1,
                    UpsertAction::Overwritten => {
                        report.overwritten += 1;
                        report.write_conflicts += 1;
                    }
                }
                written.insert(p.local_id, (p.message.external_id, outcome.row_id));
                if let Some(progress) = &self.progress {
                    progress(&report);
                }
            }

            tracing::debug!(run_id, batch = index, seen = report.seen, "batch written");
        }

        if !report.cancelled {
            self.link_attachments(snapshot, &written, cancel, &mut report)?;
        }

        self.persist_metrics(&report)?;

        if report.cancelled {
            tracing::warn!(run_id, seen = report.seen, "import cancelled");
        } else {
            tracing::info!(
                run_id,
                inserted = report.inserted,
                updated = report.updated,
                unable_to_parse = report.unable_to_parse,
                identity_collisions = report.identity_collisions,
                "import finished"
            );
        }
        Ok(report)
    }

    fn link_attachments(
        &self,
        snapshot: &SourceSnapshot,
        written: &HashMap<i64, (ExternalIdentifier, i64)>,
        cancel: &CancelFlag,
        report: &mut ImportReport,
    ) -> Result<()> {
        for source in &snapshot.attachments {
            if cancel.is_cancelled() {
                report.cancelled = true;
                return Ok(());
            }

            let (external_id, row_id) = match written.get(&source.message_local_id) {
                Some(entry) => entry,
                None => {
                    report.attachments_orphaned += 1;
                    tracing::debug!(
                        message_local_id = source.message_local_id,
                        filename = %source.filename,
                        "attachment without imported message"
                    );
                    continue;
                }
            };

            let record = AttachmentRecord {
                message_external_id: external_id.as_str().to_string(),
                filename: source.filename.clone(),
                mime_type: source.mime_type.clone(),
                total_bytes: source.total_bytes,
            };
            match self.store.link_attachment(&record, *row_id)? {
                LinkOutcome::Inserted => report.attachments_inserted += 1,
                LinkOutcome::Repaired { .. } => report.attachments_repaired += 1,
                LinkOutcome::Unchanged => report.attachments_unchanged += 1,
            }
        }
        Ok(())
    }

    fn persist_metrics(&self, report: &ImportReport) -> Result<()> {
        self.store.bump_metric(METRIC_RUNS, 1)?;
        self.store
            .bump_metric(METRIC_IDENTITY_COLLISIONS, report.identity_collisions as i64)?;
        self.store
            .bump_metric(METRIC_WRITE_CONFLICTS, report.write_conflicts as i64)?;
        self.store
            .bump_metric(METRIC_UNABLE_TO_PARSE, report.unable_to_parse as i64)?;
        self.store
            .bump_metric(METRIC_ATTACHMENTS_REPAIRED, report.attachments_repaired as i64)?;
        Ok(())
    }
}
