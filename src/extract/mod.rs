//! Early extraction of a single string field from a JSON document that is
//! still being streamed.
//!
//! This is a latency optimization only. It never reports a value it cannot
//! fully parse, and it reports at most one value per extractor.

use crate::validate::cleanup::clean_speakable;

/// Scrapes `"<anchor>": "<value>"` out of an in-progress text segment.
#[derive(Debug, Clone)]
pub struct PartialExtractor {
    needle: String,
    anchor: String,
    emitted: bool,
}

impl PartialExtractor {
    pub fn new(anchor: impl Into<String>) -> Self {
        let anchor = anchor.into();
        Self {
            needle: format!("\"{anchor}\""),
            anchor,
            emitted: false,
        }
    }

    pub fn anchor(&self) -> &str {
        &self.anchor
    }

    /// Whether the value has already been emitted.
    pub fn has_emitted(&self) -> bool {
        self.emitted
    }

    /// Inspect the text accumulated so far. Returns the anchor's value the
    /// first time it is complete, and `None` on every other call.
    pub fn observe(&mut self, accumulated: &str) -> Option<String> {
        if self.emitted {
            return None;
        }
        let value = extract_string_value(accumulated, &self.needle)?;
        let value = clean_speakable(&value);
        if value.is_empty() {
            return None;
        }
        self.emitted = true;
        Some(value)
    }
}

fn extract_string_value(text: &str, needle: &str) -> Option<String> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find(needle) {
        let after_key = search_from + offset + needle.len();
        if let Some(value) = string_after_colon(&text[after_key..]) {
            return Some(value);
        }
        search_from = after_key;
    }
    None
}

/// Parse `: "…"` at the start of `rest`, but only once the literal is closed.
fn string_after_colon(rest: &str) -> Option<String> {
    let rest = rest.trim_start();
    let rest = rest.strip_prefix(':')?.trim_start();
    if !rest.starts_with('"') {
        return None;
    }
    let end = closing_quote(rest)?;
    serde_json::from_str::<String>(&rest[..=end]).ok()
}

/// Byte index of the unescaped quote closing the literal that opens `literal`.
fn closing_quote(literal: &str) -> Option<usize> {
    let mut escaped = false;
    for (idx, ch) in literal.char_indices().skip(1) {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '"' => return Some(idx),
            _ => {}
        }
    }
    None
}
