//! Message body decoding.
//!
//! `attributedBody` blobs come in two encodings. [`extract`] classifies a blob
//! once by its magic prefix, hands it to exactly one decoder, and runs the
//! result through [`sanitize::sanitize`]. It never fails: anything that cannot
//! be decoded becomes [`DisplayText::UnableToParse`].
//!
//! CHANGELOG:
//! - 10/16/2026 - Split blob_parser into sniffer / keyed_archive / typedstream / sanitize
//! - 10/16/2026 - Added DisplayText placeholders and plain-text precedence

pub mod keyed_archive;
pub mod sanitize;
pub mod sniffer;
pub mod typedstream;

use serde::Serialize;
use thiserror::Error;

pub use sniffer::{classify, DecodedFormat};

/// Shown for rows without a body (tapbacks, renames, member changes).
pub const REACTION_OR_SYSTEM_PLACEHOLDER: &str = "[Reaction or system message]";

/// Shown when a body exists but could not be decoded.
pub const UNABLE_TO_PARSE_PLACEHOLDER: &str = "[Unable to parse message]";

/// Bytes of an unknown blob echoed into the warning log.
const LOG_PREFIX_LEN: usize = 16;

/// Why a decoder gave up. Internal to decoding; callers only ever see `None`.
#[derive(Debug, Error, PartialEq)]
pub enum DecodeFailure {
    #[error("container parse failed: {0}")]
    Container(String),

    #[error("bad stream header: {0}")]
    BadHeader(&'static str),

    #[error("malformed structure: {0}")]
    Structure(&'static str),

    #[error("object has no class")]
    MissingClass,

    #[error("missing field {0}")]
    MissingField(&'static str),

    #[error("unexpected class {0}")]
    UnexpectedClass(String),

    #[error("reference {index} out of range (table has {len} entries)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("reference cycle through object {0}")]
    Cycle(usize),

    #[error("unexpected tag byte 0x{0:02x}")]
    UnexpectedTag(u8),

    #[error("unsupported type code '{0}'")]
    UnsupportedType(char),

    #[error("unsupported string encoding {0}")]
    UnsupportedEncoding(i64),

    #[error("declared length {declared} exceeds available {available}")]
    LengthMismatch { declared: usize, available: usize },

    #[error("input ended early")]
    Truncated,

    #[error("invalid UTF-8")]
    InvalidUtf8,

    #[error("invalid UTF-16")]
    InvalidUtf16,
}

/// What a message shows once decoding is done.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum DisplayText {
    Text(String),
    ReactionOrSystem,
    UnableToParse,
}

impl DisplayText {
    /// Text as it should appear to a user, placeholders included.
    pub fn as_display(&self) -> &str {
        match self {
            DisplayText::Text(text) => text,
            DisplayText::ReactionOrSystem => REACTION_OR_SYSTEM_PLACEHOLDER,
            DisplayText::UnableToParse => UNABLE_TO_PARSE_PLACEHOLDER,
        }
    }

    /// Decoded text, `None` for either placeholder.
    pub fn text(&self) -> Option<&str> {
        match self {
            DisplayText::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            DisplayText::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Stable tag stored alongside the message row.
    pub fn kind(&self) -> &'static str {
        match self {
            DisplayText::Text(_) => "text",
            DisplayText::ReactionOrSystem => "reaction_or_system",
            DisplayText::UnableToParse => "unable_to_parse",
        }
    }
}

impl std::fmt::Display for DisplayText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_display())
    }
}

/// Decode an encoded body into display text.
///
/// Empty or absent bodies are reactions/system rows. Otherwise the format is
/// decided once and only that decoder runs.
pub fn extract(body: Option<&[u8]>) -> DisplayText {
    let bytes = match body {
        Some(b) if !b.is_empty() => b,
        _ => return DisplayText::ReactionOrSystem,
    };

    let decoded = match classify(bytes) {
        DecodedFormat::BinaryArchive => keyed_archive::decode(bytes),
        DecodedFormat::LegacyStream => typedstream::decode(bytes),
        DecodedFormat::Unknown => {
            let prefix = &bytes[..bytes.len().min(LOG_PREFIX_LEN)];
            tracing::warn!(
                len = bytes.len(),
                prefix = %hex::encode(prefix),
                "unknown message body format"
            );
            return DisplayText::UnableToParse;
        }
    };

    match decoded.as_deref().and_then(sanitize::sanitize) {
        Some(text) => DisplayText::Text(text),
        None => DisplayText::UnableToParse,
    }
}

/// Display text for a source row.
///
/// The plain `text` column wins when it survives sanitizing; the encoded body
/// is only consulted otherwise.
pub fn extract_message(plain_text: Option<&str>, body: Option<&[u8]>) -> DisplayText {
    if let Some(text) = plain_text.and_then(sanitize::sanitize) {
        return DisplayText::Text(text);
    }
    extract(body)
}
