//! Golden message bodies captured as files, decoded through the public API.

mod common;

use imessage_audit::blob::{
    classify, keyed_archive, typedstream, DecodedFormat, REACTION_OR_SYSTEM_PLACEHOLDER,
    UNABLE_TO_PARSE_PLACEHOLDER,
};
use imessage_audit::{extract, extract_message, DisplayText};

#[test]
fn test_legacy_stream_fixture() {
    let bytes = common::fixture_bytes("typedstream_hello.bin");
    assert_eq!(classify(&bytes), DecodedFormat::LegacyStream);
    assert_eq!(extract(Some(&bytes)), DisplayText::Text("Hello".into()));
}

#[test]
fn test_binary_archive_fixture() {
    let bytes = common::fixture_bytes("keyed_archive_inspection.bplist");
    assert_eq!(classify(&bytes), DecodedFormat::BinaryArchive);
    assert_eq!(
        extract(Some(&bytes)),
        DisplayText::Text("Inspection moved to Friday 9am".into())
    );
}

#[test]
fn test_every_prefix_of_legacy_fixture_fails_cleanly() {
    let bytes = common::fixture_bytes("typedstream_hello.bin");
    for end in 0..bytes.len() {
        assert_eq!(typedstream::decode(&bytes[..end]), None, "prefix of {} bytes", end);
    }
}

#[test]
fn test_every_prefix_of_archive_fixture_fails_cleanly() {
    let bytes = common::fixture_bytes("keyed_archive_inspection.bplist");
    for end in 0..bytes.len() {
        assert_eq!(keyed_archive::decode(&bytes[..end]), None, "prefix of {} bytes", end);
    }
}

#[test]
fn test_truncated_body_is_unable_to_parse() {
    let bytes = common::fixture_bytes("typedstream_hello.bin");
    let cut = &bytes[..bytes.len() / 2];
    assert_eq!(extract(Some(cut)), DisplayText::UnableToParse);
    assert_eq!(DisplayText::UnableToParse.as_display(), UNABLE_TO_PARSE_PLACEHOLDER);
}

#[test]
fn test_missing_body_is_reaction_or_system() {
    assert_eq!(extract(None), DisplayText::ReactionOrSystem);
    assert_eq!(extract(Some(&[])), DisplayText::ReactionOrSystem);
    assert_eq!(
        DisplayText::ReactionOrSystem.as_display(),
        REACTION_OR_SYSTEM_PLACEHOLDER
    );
}

#[test]
fn test_unknown_format_is_unable_to_parse() {
    assert_eq!(
        extract(Some(b"XXXXXXXXXXXXXXXXXXXXXXXX")),
        DisplayText::UnableToParse
    );
}

#[test]
fn test_plain_text_column_wins_over_body() {
    let bytes = common::fixture_bytes("typedstream_hello.bin");
    assert_eq!(
        extract_message(Some("Typed \u{FFFC} text"), Some(&bytes)),
        DisplayText::Text("Typed  text".into())
    );
    assert_eq!(
        extract_message(Some("   "), Some(&bytes)),
        DisplayText::Text("Hello".into())
    );
}
