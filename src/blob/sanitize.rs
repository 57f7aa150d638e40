//! Final gate between decoder output and storage.
//!
//! Every piece of message text that gets persisted passes through [`sanitize`],
//! including the plain `text` column read from the source store.

/// Shortest accepted body, in chars.
pub const MIN_LEN: usize = 1;

/// Upper bound (exclusive) on body length, in chars.
pub const MAX_LEN: usize = 65_536;

/// Placeholder characters Messages leaves in decoded bodies.
///
/// U+FFFC marks where an attachment sits inline. NUL is not one of them; it
/// is rejected as a control character.
const SENTINELS: [char; 2] = ['\u{FFFC}', '\u{FFFD}'];

/// Strip sentinels, trim, and bound-check decoded text.
///
/// Returns `None` when nothing usable remains, when control characters other
/// than tab/newline/carriage return survive, or when the result is outside
/// `[MIN_LEN, MAX_LEN)`. Text is never truncated to fit.
pub fn sanitize(text: &str) -> Option<String> {
    let stripped: String = text.chars().filter(|c| !SENTINELS.contains(c)).collect();
    let trimmed = stripped.trim();

    if trimmed.chars().any(is_binary_control) {
        return None;
    }

    let len = trimmed.chars().count();
    if len < MIN_LEN || len >= MAX_LEN {
        return None;
    }

    Some(trimmed.to_string())
}

fn is_binary_control(c: char) -> bool {
    c.is_control() && !matches!(c, '\t' | '\n' | '\r')
}
