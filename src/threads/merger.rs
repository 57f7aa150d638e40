//! Display-time merging of one-to-one threads that belong to the same person.
//!
//! A contact who texts over SMS from a phone, over iMessage from the same phone
//! and over iMessage from an iCloud address ends up in three chats. [`merge`]
//! folds those into one [`MergedThread`]. Group chats are never merged. Nothing
//! here touches storage; the result is rebuilt on every call.
//!
//! CHANGELOG:
//! - 10/16/2026 - Initial merger (assigned contact, phone, handle keys)

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use super::{ContactDirectory, RawThread, ThreadMessage};
use crate::identity::handle::{classify_handle, HandleKind};

/// What a merged thread is grouped by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ThreadKey {
    /// Handle assigned to a contact by the directory.
    Assigned(String),
    /// Unassigned phone number, canonical form.
    Phone(String),
    /// Unassigned email or other handle, canonical form.
    Handle(String),
    /// Group chat, by chat identifier. Never shared between threads.
    Group(String),
}

/// Display-only aggregate of one or more stored threads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedThread {
    pub key: ThreadKey,
    pub display_name: String,
    /// Canonical counterpart handles.
    pub handles: Vec<String>,
    pub chat_identifiers: Vec<String>,
    pub is_group: bool,
    /// Ordered by `(timestamp_ms, external_id)`, no duplicate ids.
    pub messages: Vec<ThreadMessage>,
}

impl MergedThread {
    pub fn last_timestamp_ms(&self) -> Option<i64> {
        self.messages.last().map(|m| m.timestamp_ms)
    }
}

#[derive(Default)]
struct Pending {
    contact_name: Option<String>,
    chat_name: Option<String>,
    handles: Vec<String>,
    chat_identifiers: Vec<String>,
    messages: Vec<ThreadMessage>,
}

/// Merge one-to-one threads per contact; pass group chats through.
pub fn merge<D: ContactDirectory + ?Sized>(threads: &[RawThread], contacts: &D) -> Vec<MergedThread> {
    let mut out = Vec::new();
    let mut pending: BTreeMap<ThreadKey, Pending> = BTreeMap::new();

    for thread in threads {
        let handle = match thread.counterpart() {
            Some(h) => h,
            None => {
                out.push(group_thread(thread));
                continue;
            }
        };

        let contact = contacts.contact_for(&handle);
        let key = match (&contact, classify_handle(&handle)) {
            (Some(c), _) => ThreadKey::Assigned(c.id.clone()),
            (None, HandleKind::Phone) => ThreadKey::Phone(handle.clone()),
            (None, _) => ThreadKey::Handle(handle.clone()),
        };

        let entry = pending.entry(key).or_default();
        if entry.contact_name.is_none() {
            entry.contact_name = contact.map(|c| c.name);
        }
        if entry.chat_name.is_none() {
            entry.chat_name = thread.display_name.clone().filter(|n| !n.trim().is_empty());
        }
        if !entry.handles.contains(&handle) {
            entry.handles.push(handle);
        }
        entry.chat_identifiers.push(thread.chat_identifier.clone());
        entry.messages.extend(thread.messages.iter().cloned());
    }

    for (key, p) in pending {
        let display_name = p
            .contact_name
            .or(p.chat_name)
            .or_else(|| p.handles.first().cloned())
            .unwrap_or_default();
        out.push(MergedThread {
            key,
            display_name,
            handles: p.handles,
            chat_identifiers: p.chat_identifiers,
            is_group: false,
            messages: ordered_unique(p.messages),
        });
    }

    out.sort_by(|a, b| {
        b.last_timestamp_ms()
            .cmp(&a.last_timestamp_ms())
            .then_with(|| a.key.cmp(&b.key))
    });
    out
}

fn group_thread(thread: &RawThread) -> MergedThread {
    let display_name = thread
        .display_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| thread.participants.join(", "));
    MergedThread {
        key: ThreadKey::Group(thread.chat_identifier.clone()),
        display_name,
        handles: thread.participants.clone(),
        chat_identifiers: vec![thread.chat_identifier.clone()],
        is_group: true,
        messages: thread.messages.clone(),
    }
}

fn ordered_unique(messages: Vec<ThreadMessage>) -> Vec<ThreadMessage> {
    let mut seen = HashSet::new();
    let mut unique: Vec<ThreadMessage> = messages
        .into_iter()
        .filter(|m| seen.insert(m.external_id.clone()))
        .collect();
    unique.sort_by(|a, b| {
        a.timestamp_ms
            .cmp(&b.timestamp_ms)
            .then_with(|| a.external_id.cmp(&b.external_id))
    });
    unique
}
