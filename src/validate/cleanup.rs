//! Speech-safe text cleanup for user-facing strings.

use std::sync::OnceLock;

use regex::{Captures, Regex};

static LIST_MARKER: OnceLock<Regex> = OnceLock::new();
static INLINE_ENUM: OnceLock<Regex> = OnceLock::new();
static WHITESPACE: OnceLock<Regex> = OnceLock::new();
static SPACE_BEFORE_PUNCT: OnceLock<Regex> = OnceLock::new();
static REPEATED_STOP: OnceLock<Regex> = OnceLock::new();

fn list_marker() -> &'static Regex {
    LIST_MARKER.get_or_init(|| {
        Regex::new(r"^\s*(?:[-+]|\d{1,2}[.)]|\(\d{1,2}\))\s+").expect("cleanup regex must compile")
    })
}

fn inline_enum() -> &'static Regex {
    INLINE_ENUM.get_or_init(|| {
        Regex::new(r"\s*(?:\(\d{1,2}\)|\b\d{1,2}\))\s+").expect("cleanup regex must compile")
    })
}

fn whitespace() -> &'static Regex {
    WHITESPACE.get_or_init(|| {
        Regex::new(r"\s+").expect("cleanup regex must compile")
    })
}

fn space_before_punct() -> &'static Regex {
    SPACE_BEFORE_PUNCT.get_or_init(|| {
        Regex::new(r"\s+([.,;:!?])").expect("cleanup regex must compile")
    })
}

fn repeated_stop() -> &'static Regex {
    REPEATED_STOP.get_or_init(|| {
        Regex::new(r"([.!?:;,])\.+").expect("cleanup regex must compile")
    })
}

fn is_decorative(ch: char) -> bool {
    matches!(ch, '*' | '#' | '`' | '~' | '|' | '•' | '·' | '…' | '\u{200D}' | '\u{FE0F}')
        || matches!(ch as u32,
            0x2190..=0x21FF // arrows
            | 0x2300..=0x23FF // misc technical
            | 0x25A0..=0x25FF // geometric shapes
            | 0x2600..=0x27BF // misc symbols, dingbats
            | 0x2B00..=0x2BFF
            | 0x1F000..=0x1FAFF // emoji
        )
}

fn ends_sentence(text: &str) -> bool {
    text.trim_end()
        .chars()
        .last()
        .map_or(true, |ch| matches!(ch, '.' | '!' | '?' | ':' | ';' | ','))
}

/// Strip decorative symbols and list markup so the string can be spoken.
pub fn clean_speakable(input: &str) -> String {
    let stripped: String = input.chars().filter(|ch| !is_decorative(*ch)).collect();

    let mut joined = String::new();
    for line in stripped.lines() {
        let line = list_marker().replace(line, "");
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !joined.is_empty() {
            joined.push_str(if ends_sentence(&joined) { " " } else { ". " });
        }
        joined.push_str(line);
    }

    let source = joined.clone();
    let enumerated = inline_enum().replace_all(&joined, |caps: &Captures<'_>| {
        let start = caps.get(0).map_or(0, |m| m.start());
        if ends_sentence(&source[..start]) {
            " ".to_string()
        } else {
            ". ".to_string()
        }
    });

    let collapsed = whitespace().replace_all(&enumerated, " ");
    let tightened = space_before_punct().replace_all(&collapsed, "$1");
    let tightened = repeated_stop().replace_all(&tightened, "$1");
    tightened.trim().to_string()
}
