//! Lenient JSON document recovery for model output.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

static TRAILING_COMMA: OnceLock<Regex> = OnceLock::new();

/// How the document was recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseSource {
    /// The whole string parsed as an object.
    Direct,
    /// A balanced `{…}` fragment inside the string parsed as an object.
    Fragment,
    /// Nothing usable; the document is treated as an empty object.
    Absent,
}

/// Recover a JSON object from untrusted text. Never fails.
pub fn parse_document(text: &str) -> (Map<String, Value>, ParseSource) {
    let unfenced = strip_code_fences(text);
    if let Some(object) = parse_object(unfenced) {
        return (object, ParseSource::Direct);
    }

    let mut fragments = balanced_fragments(text);
    fragments.sort_by_key(|fragment| std::cmp::Reverse(fragment.len()));
    for fragment in fragments {
        if let Some(object) = parse_object(fragment) {
            return (object, ParseSource::Fragment);
        }
    }

    (Map::new(), ParseSource::Absent)
}

fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }
    let parsed = serde_json::from_str::<Value>(candidate)
        .ok()
        .or_else(|| serde_json::from_str::<Value>(&strip_trailing_commas(candidate)).ok())
        .or_else(|| serde_json::from_str::<Value>(&fix_json_issues(candidate)).ok())?;
    match parsed {
        Value::Object(object) => Some(object),
        _ => None,
    }
}

/// Strip markdown code fences from a response.
pub(crate) fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let without_opening = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_opening
        .strip_suffix("```")
        .unwrap_or(without_opening)
        .trim()
}

/// All top-level balanced `{…}` fragments, ignoring braces inside strings.
///
/// String state is only tracked inside a fragment; quotes in the surrounding
/// prose are not JSON.
fn balanced_fragments(text: &str) -> Vec<&str> {
    let mut fragments = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;
    let mut start_idx = None;

    for (idx, ch) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        if in_string {
            match ch {
                '\\' => escape_next = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start_idx = Some(idx);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(start) = start_idx.take() {
                        fragments.push(&text[start..=idx]);
                    }
                }
            }
            _ => {}
        }
    }

    fragments
}

fn strip_trailing_commas(json: &str) -> String {
    let trailing_comma = TRAILING_COMMA.get_or_init(|| {
        Regex::new(r",\s*([}\]])").expect("trailing comma regex must compile")
    });
    trailing_comma.replace_all(json, "$1").into_owned()
}

/// Repair the usual model JSON slips: smart-quoted strings and trailing
/// commas.
fn fix_json_issues(json: &str) -> String {
    strip_trailing_commas(&normalize_smart_quotes(json))
}

/// Turn smart double quotes used as string delimiters into plain ones.
///
/// Smart quotes inside a plain-quoted string are content and stay as they
/// are; a plain quote inside a smart-quoted string gets escaped.
fn normalize_smart_quotes(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut open: Option<char> = None;
    let mut escape_next = false;

    for ch in json.chars() {
        if escape_next {
            escape_next = false;
            out.push(ch);
            continue;
        }
        match (open, ch) {
            (None, '"') => {
                open = Some('"');
                out.push('"');
            }
            (None, '\u{201C}' | '\u{201D}') => {
                open = Some('\u{201C}');
                out.push('"');
            }
            (Some(_), '\\') => {
                escape_next = true;
                out.push(ch);
            }
            (Some('"'), '"') | (Some('\u{201C}'), '\u{201C}' | '\u{201D}') => {
                open = None;
                out.push('"');
            }
            (Some('\u{201C}'), '"') => out.push_str("\\\""),
            _ => out.push(ch),
        }
    }
    out
}
