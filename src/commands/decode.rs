//! Decode command: run a single message body through the decoders.
//!
//! Useful for checking a blob pulled out of chat.db by hand, e.g.
//! `sqlite3 chat.db "SELECT hex(attributedBody) FROM message WHERE ROWID=42"`.
//!
//! CHANGELOG:
//! - 10/16/2026 - Initial decode command with failure diagnostics

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::blob::{self, classify, keyed_archive, typedstream, DecodedFormat, DisplayText};
use crate::output::OutputControls;

#[derive(Debug, Serialize)]
struct DecodeResult {
    bytes: usize,
    format: DecodedFormat,
    display: DisplayText,
    /// Why the decoder gave up, when it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<String>,
}

/// Read raw bytes, or hex text when `hex` is set (whitespace ignored).
fn read_body(path: &Path, hex: bool) -> Result<Vec<u8>> {
    let raw = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    if !hex {
        return Ok(raw);
    }
    let text: String = String::from_utf8(raw)
        .context("Hex input is not text")?
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    hex::decode(text.trim_start_matches("0x")).context("Invalid hex input")
}

fn diagnose(bytes: &[u8]) -> DecodeResult {
    let format = classify(bytes);
    let failure = match format {
        DecodedFormat::BinaryArchive => keyed_archive::try_decode(bytes).err().map(|e| e.to_string()),
        DecodedFormat::LegacyStream => typedstream::try_decode(bytes).err().map(|e| e.to_string()),
        DecodedFormat::Unknown if bytes.is_empty() => None,
        DecodedFormat::Unknown => Some("unrecognised magic prefix".to_string()),
    };
    DecodeResult {
        bytes: bytes.len(),
        format,
        display: blob::extract(Some(bytes)),
        failure,
    }
}

pub fn run(path: &Path, hex: bool, output: &OutputControls) -> Result<()> {
    let bytes = read_body(path, hex)?;
    let result = diagnose(&bytes);

    if output.json {
        output.print(&result);
        return Ok(());
    }

    println!("Format: {} ({} bytes)", result.format.as_str(), result.bytes);
    println!("Result: {}", result.display.kind());
    if let Some(reason) = &result.failure {
        println!("Reason: {}", reason);
    }
    println!("{}", "-".repeat(50));
    println!("{}", output.clip(result.display.as_display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("body.hex");
        std::fs::write(&path, "62 70 6c 69\n73 74 30 30").unwrap();
        assert_eq!(read_body(&path, true).unwrap(), b"bplist00".to_vec());
    }

    #[test]
    fn test_bad_hex() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("body.hex");
        std::fs::write(&path, "zz").unwrap();
        assert!(read_body(&path, true).is_err());
    }

    #[test]
    fn test_diagnose_reports_reason() {
        let result = diagnose(b"bplist00garbage");
        assert_eq!(result.format, DecodedFormat::BinaryArchive);
        assert_eq!(result.display, DisplayText::UnableToParse);
        assert!(result.failure.is_some());

        let result = diagnose(b"");
        assert_eq!(result.display, DisplayText::ReactionOrSystem);
        assert!(result.failure.is_none());
    }

    #[test]
    fn test_diagnose_success_has_no_reason() {
        let blob = typedstream::tests::attributed_body("NSAttributedString", "NSString", "Hi");
        let result = diagnose(&blob);
        assert_eq!(result.format, DecodedFormat::LegacyStream);
        assert_eq!(result.display, DisplayText::Text("Hi".into()));
        assert!(result.failure.is_none());
    }
}
