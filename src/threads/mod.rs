//! Conversation threads as stored, and the contact seam used to merge them.
//!
//! CHANGELOG:
//! - 10/17/2026 - Multi-participant threads count as groups whatever the flag
//! - 10/16/2026 - Initial thread types and ContactDirectory trait

pub mod merger;

use serde::Serialize;

use crate::blob::DisplayText;
use crate::identity::handle::canonical_handle;
use crate::records::Channel;

pub use merger::{merge, MergedThread, ThreadKey};

/// A stored message as shown inside a thread.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadMessage {
    pub external_id: String,
    pub timestamp_ms: i64,
    pub is_from_me: bool,
    pub handle: String,
    pub channel: Channel,
    pub text: DisplayText,
}

/// One chat from the audit store, unmerged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawThread {
    pub chat_identifier: String,
    pub display_name: Option<String>,
    /// Counterpart handles, excluding the device owner.
    pub participants: Vec<String>,
    pub is_group: bool,
    pub messages: Vec<ThreadMessage>,
}

impl RawThread {
    /// Flagged as a group, or more than one counterpart listed.
    pub fn is_group_chat(&self) -> bool {
        self.is_group || self.participants.len() > 1
    }

    /// The single counterpart of a one-to-one thread, canonicalized.
    /// `None` for group chats.
    pub fn counterpart(&self) -> Option<String> {
        if self.is_group_chat() {
            return None;
        }
        let raw = self
            .participants
            .first()
            .map(String::as_str)
            .or_else(|| self.messages.first().map(|m| m.handle.as_str()))
            .unwrap_or(self.chat_identifier.as_str());
        Some(canonical_handle(raw))
    }

    pub fn last_timestamp_ms(&self) -> Option<i64> {
        self.messages.iter().map(|m| m.timestamp_ms).max()
    }
}

/// Who a handle belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ContactRef {
    pub id: String,
    pub name: String,
}

/// Handle to contact lookup, owned by the surrounding application.
pub trait ContactDirectory {
    fn contact_for(&self, handle: &str) -> Option<ContactRef>;
}

/// Directory that knows nobody.
pub struct NoContacts;

impl ContactDirectory for NoContacts {
    fn contact_for(&self, _handle: &str) -> Option<ContactRef> {
        None
    }
}

impl<T: ContactDirectory + ?Sized> ContactDirectory for &T {
    fn contact_for(&self, handle: &str) -> Option<ContactRef> {
        (**self).contact_for(handle)
    }
}
