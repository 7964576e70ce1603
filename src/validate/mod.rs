//! Result validator: turns the final text segment into an [`Assessment`]
//! that is always fully typed.
//!
//! Every field is read and defaulted on its own, so a bad value in one field
//! never disturbs its siblings. Speech cleanup runs last on every user-facing
//! string.

pub mod cleanup;
pub mod fields;
pub mod parse;

use crate::types::{Assessment, FollowUp, Severity, Timeframe};

pub use cleanup::clean_speakable;
pub use parse::{parse_document, ParseSource};

/// Upper bound on list lengths kept from model output.
pub const MAX_LIST_ITEMS: usize = 8;

/// Which fields fell back to their defaults, and how the document was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub source: ParseSource,
    pub defaulted: Vec<&'static str>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.source != ParseSource::Absent && self.defaulted.is_empty()
    }
}

/// Validate untrusted model text into an assessment.
pub fn validate_assessment(text: &str) -> Assessment {
    validate_with_report(text).0
}

/// Validate and report which fields were defaulted.
pub fn validate_with_report(text: &str) -> (Assessment, ValidationReport) {
    let (doc, source) = parse_document(text);
    let mut defaulted = Vec::new();

    let severity: Severity = or_fallback(
        &mut defaulted,
        "severity",
        fields::enumeration(&doc, "severity"),
        Assessment::DEFAULT_SEVERITY,
    );
    let confidence = or_fallback(
        &mut defaulted,
        "confidence",
        fields::number_in(&doc, "confidence", 0.0..=1.0),
        Assessment::DEFAULT_CONFIDENCE,
    );
    let summary = or_default_with(&mut defaulted, "summary", fields::string(&doc, "summary"));
    let go_to = or_default_with(&mut defaulted, "go_to", fields::string(&doc, "go_to"));
    let recommendations = or_default_with(
        &mut defaulted,
        "recommendations",
        fields::string_list(&doc, "recommendations", MAX_LIST_ITEMS),
    );
    let mut red_flags = or_default_with(
        &mut defaulted,
        "red_flags",
        fields::string_list(&doc, "red_flags", MAX_LIST_ITEMS),
    );
    if !severity.is_elevated() && !red_flags.is_empty() {
        tracing::debug!(
            %severity,
            dropped = red_flags.len(),
            "clearing red flags below high severity"
        );
        red_flags.clear();
    }
    let follow_up = validate_follow_up(fields::object(&doc, "follow_up"), &mut defaulted);

    let assessment = Assessment {
        severity,
        confidence,
        summary: clean_speakable(&summary),
        go_to: clean_speakable(&go_to),
        recommendations: clean_list(recommendations),
        red_flags: clean_list(red_flags),
        follow_up: FollowUp {
            note: clean_speakable(&follow_up.note),
            ..follow_up
        },
    };

    if !defaulted.is_empty() || source == ParseSource::Absent {
        tracing::debug!(?source, ?defaulted, "assessment fields defaulted");
    }

    (assessment, ValidationReport { source, defaulted })
}

fn validate_follow_up(
    doc: Option<&fields::Object>,
    defaulted: &mut Vec<&'static str>,
) -> FollowUp {
    let Some(doc) = doc else {
        defaulted.push("follow_up");
        return FollowUp::default();
    };
    let fallback = FollowUp::default();
    let timeframe = fields::enumeration::<Timeframe>(doc, "timeframe").unwrap_or_else(|| {
        defaulted.push("follow_up.timeframe");
        fallback.timeframe
    });
    let note = fields::string(doc, "note").unwrap_or_else(|| {
        defaulted.push("follow_up.note");
        fallback.note
    });
    FollowUp { timeframe, note }
}

fn or_fallback<T>(
    defaulted: &mut Vec<&'static str>,
    name: &'static str,
    value: Option<T>,
    fallback: T,
) -> T {
    value.unwrap_or_else(|| {
        defaulted.push(name);
        fallback
    })
}

fn or_default_with<T: Default>(
    defaulted: &mut Vec<&'static str>,
    name: &'static str,
    value: Option<T>,
) -> T {
    value.unwrap_or_else(|| {
        defaulted.push(name);
        T::default()
    })
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .iter()
        .map(|item| clean_speakable(item))
        .filter(|item| !item.is_empty())
        .collect()
}
