//! Independent per-field readers. Each returns `None` on any violation so the
//! caller can substitute that field's own fallback.

use std::ops::RangeInclusive;
use std::str::FromStr;

use serde_json::{Map, Value};

pub type Object = Map<String, Value>;

/// A string member, verbatim.
pub fn string(doc: &Object, key: &str) -> Option<String> {
    doc.get(key)?.as_str().map(str::to_string)
}

/// A string member parsed into an enum (surrounding whitespace ignored).
pub fn enumeration<T: FromStr>(doc: &Object, key: &str) -> Option<T> {
    doc.get(key)?.as_str()?.trim().parse().ok()
}

/// A finite number inside `range`.
pub fn number_in(doc: &Object, key: &str, range: RangeInclusive<f64>) -> Option<f64> {
    let value = doc.get(key)?.as_f64()?;
    (value.is_finite() && range.contains(&value)).then_some(value)
}

/// An array of strings. Non-string and blank items are dropped; at most `max` kept.
pub fn string_list(doc: &Object, key: &str, max: usize) -> Option<Vec<String>> {
    let items = doc.get(key)?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .take(max)
            .map(str::to_string)
            .collect(),
    )
}

/// A nested object member.
pub fn object<'a>(doc: &'a Object, key: &str) -> Option<&'a Object> {
    doc.get(key)?.as_object()
}
