//! Post-processing: deterministic cleanup of generated text.
//!
//! Models are told not to echo category tags or list bullets, and they do it
//! anyway. Every outcome (success or fallback) goes through the same rules so
//! the assembler always receives plain, tagged lines:
//!
//! 1. Normalise line endings (CRLF → LF)
//! 2. Split into lines, trim, drop blanks
//! 3. Strip a leading `[tag]` the model may have echoed back
//! 4. Strip a leading list bullet (`-`, `*`, `•`, `1.`, `2)`)
//! 5. Re-annotate each surviving line with its category
//!
//! Rules 3 and 4 are applied until the line stops changing, so
//! [`normalize_line`] is idempotent.

use crate::model::{Category, TaggedLine};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_LEADING_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\[[^\[\]]*\]\s*").unwrap());

static RE_LEADING_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*•]|\d{1,3}[.)])\s+").unwrap());

/// Anything outside letters, digits, accented Latin letters, whitespace and
/// `- . , ; : ! ? ( ) %`.
static RE_DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9À-ÖØ-öø-ÿ\s\-.,;:!?()%]").unwrap());

/// Strip echoed tags and bullets from one line and trim it.
pub fn normalize_line(line: &str) -> String {
    let mut current = line.trim().to_string();
    loop {
        let without_tag = RE_LEADING_TAG.replace(&current, "");
        let without_bullet = RE_LEADING_BULLET.replace(&without_tag, "");
        let next = without_bullet.trim().to_string();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Turn generated (or fallback) text into tagged lines for `category`.
pub fn postprocess_outcome(category: Category, text: &str) -> Vec<TaggedLine> {
    normalise_line_endings(text)
        .lines()
        .map(normalize_line)
        .filter(|line| !line.is_empty())
        .map(|line| TaggedLine::new(category, line))
        .collect()
}

/// Drop every character outside the allowed class.
///
/// Identity for lines that only contain allowed characters.
pub fn sanitize_line(line: &str) -> String {
    RE_DISALLOWED.replace_all(line, "").into_owned()
}

/// Join tagged lines into the `[tag] content` stream.
pub fn to_content_stream(lines: &[TaggedLine]) -> String {
    lines
        .iter()
        .map(TaggedLine::annotate)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse a `[tag] content` stream back into tagged lines.
///
/// Lines without a canonical tag are skipped.
pub fn parse_content_stream(stream: &str) -> Vec<TaggedLine> {
    stream.lines().filter_map(TaggedLine::parse).collect()
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}
