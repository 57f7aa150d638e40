//! Magic-byte classification of encoded message bodies.
//!
//! Exactly two formats are recognised, each by a fixed prefix:
//! - keyed archive: `bplist00`
//! - legacy typedstream: version byte 4, then the length-prefixed `streamtyped` tag
//!
//! Nothing past the prefix is looked at.
//!
//! CHANGELOG:
//! - 10/16/2026 - Replaced substring search for "bplist" with exact prefix match

use serde::Serialize;

/// Magic prefix of a binary property list (keyed archive container).
pub const BINARY_ARCHIVE_MAGIC: &[u8; 8] = b"bplist00";

/// Magic prefix of a typedstream: version 4, then `streamtyped` (11 bytes).
pub const LEGACY_STREAM_MAGIC: &[u8; 13] = b"\x04\x0bstreamtyped";

/// Encoding of a message body, decided once from its first bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodedFormat {
    BinaryArchive,
    LegacyStream,
    Unknown,
}

impl DecodedFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecodedFormat::BinaryArchive => "binary_archive",
            DecodedFormat::LegacyStream => "legacy_stream",
            DecodedFormat::Unknown => "unknown",
        }
    }
}

/// Classify a body by its magic prefix.
pub fn classify(bytes: &[u8]) -> DecodedFormat {
    if bytes.starts_with(BINARY_ARCHIVE_MAGIC) {
        DecodedFormat::BinaryArchive
    } else if bytes.starts_with(LEGACY_STREAM_MAGIC) {
        DecodedFormat::LegacyStream
    } else {
        DecodedFormat::Unknown
    }
}
