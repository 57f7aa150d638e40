//! Stable external identifiers for messages.
//!
//! Source ROWIDs change between backups, restores and iCloud syncs, so they
//! are never used as identity. A message is identified by its native GUID when
//! the source has one, and by a content hash otherwise.
//!
//! CHANGELOG:
//! - 10/16/2026 - Initial identity resolution (native GUID, sha256 fallback)

pub mod handle;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::blob::extract_message;
use crate::records::RawMessageRecord;

/// Prefix marking a hash-derived identifier.
pub const FALLBACK_PREFIX: &str = "sha256:";

/// Separator between hashed fields; cannot occur in sanitized text.
const FIELD_SEPARATOR: &[u8] = b"\x1f";

/// Identifier that survives re-imports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalIdentifier(String);

impl ExternalIdentifier {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_fallback(&self) -> bool {
        self.0.starts_with(FALLBACK_PREFIX)
    }
}

impl std::fmt::Display for ExternalIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ExternalIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Which path produced an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdSource {
    Native,
    FallbackHash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedId {
    pub id: ExternalIdentifier,
    pub source: IdSource,
}

/// Resolve the external identifier of a source record.
///
/// The native GUID is used verbatim when it is non-empty after trimming.
/// Otherwise the id is a hash of the record's stable fields.
pub fn resolve_external_id(record: &RawMessageRecord) -> ResolvedId {
    let display = extract_message(record.text.as_deref(), record.body.as_deref());
    resolve_with_text(record, display.text())
}

/// Same as [`resolve_external_id`] for callers that already decoded the body.
pub fn resolve_with_text(record: &RawMessageRecord, sanitized_text: Option<&str>) -> ResolvedId {
    if let Some(guid) = record.guid.as_deref().map(str::trim).filter(|g| !g.is_empty()) {
        return ResolvedId {
            id: ExternalIdentifier::new(guid),
            source: IdSource::Native,
        };
    }

    ResolvedId {
        id: fallback_id(
            record.channel.as_str(),
            &record.handle,
            record.timestamp_ms,
            sanitized_text,
        ),
        source: IdSource::FallbackHash,
    }
}

/// `sha256:<hex>` over `(channel, canonical handle, timestamp, text)`.
pub fn fallback_id(
    channel: &str,
    handle: &str,
    timestamp_ms: i64,
    sanitized_text: Option<&str>,
) -> ExternalIdentifier {
    let mut hasher = Sha256::new();
    hasher.update(channel.as_bytes());
    hasher.update(FIELD_SEPARATOR);
    hasher.update(handle::canonical_handle(handle).as_bytes());
    hasher.update(FIELD_SEPARATOR);
    hasher.update(timestamp_ms.to_string().as_bytes());
    hasher.update(FIELD_SEPARATOR);
    hasher.update(sanitized_text.unwrap_or("").as_bytes());
    ExternalIdentifier(format!("{}{}", FALLBACK_PREFIX, hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Channel;

    fn record(guid: Option<&str>, local_id: i64) -> RawMessageRecord {
        RawMessageRecord {
            local_id,
            guid: guid.map(str::to_string),
            handle: "+1 (415) 555-1234".into(),
            chat_identifier: Some("+14155551234".into()),
            timestamp_ms: 1_700_000_000_000,
            channel: Channel::Sms,
            is_from_me: false,
            text: Some("Can we see the house Saturday?".into()),
            body: None,
        }
    }

    #[test]
    fn test_native_guid_verbatim() {
        let resolved = resolve_external_id(&record(Some("5E8F0A2C-1111-2222-3333-444455556666"), 7));
        assert_eq!(resolved.source, IdSource::Native);
        assert_eq!(resolved.id.as_str(), "5E8F0A2C-1111-2222-3333-444455556666");
        assert!(!resolved.id.is_fallback());
    }

    #[test]
    fn test_blank_guid_falls_back() {
        let resolved = resolve_external_id(&record(Some("   "), 7));
        assert_eq!(resolved.source, IdSource::FallbackHash);
        assert!(resolved.id.is_fallback());
        assert_eq!(resolved.id.as_str().len(), FALLBACK_PREFIX.len() + 64);
    }

    #[test]
    fn test_fallback_ignores_local_id() {
        let a = resolve_external_id(&record(None, 7));
        let b = resolve_external_id(&record(None, 9001));
        assert_eq!(a, b);
    }

    #[test]
    fn test_fallback_uses_canonical_handle() {
        let a = record(None, 1);
        let mut b = record(None, 2);
        b.handle = "tel:4155551234".into();
        assert_eq!(resolve_external_id(&a).id, resolve_external_id(&b).id);
    }

    #[test]
    fn test_fallback_distinguishes_fields() {
        let base = resolve_external_id(&record(None, 1)).id;

        let mut other = record(None, 1);
        other.timestamp_ms += 1;
        assert_ne!(resolve_external_id(&other).id, base);

        let mut other = record(None, 1);
        other.channel = Channel::ImessageChat;
        assert_ne!(resolve_external_id(&other).id, base);

        let mut other = record(None, 1);
        other.text = Some("Can we see the house Sunday?".into());
        assert_ne!(resolve_external_id(&other).id, base);
    }

    #[test]
    fn test_fallback_text_is_sanitized() {
        let a = record(None, 1);
        let mut b = record(None, 1);
        b.text = Some("  Can we see the house Saturday?\u{FFFC} ".into());
        assert_eq!(resolve_external_id(&a).id, resolve_external_id(&b).id);
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = ExternalIdentifier::new("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }
}
