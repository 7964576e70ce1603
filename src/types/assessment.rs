//! The validated structured result of an orchestration.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Severity classifier of an assessment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Severity {
    Low,
    Moderate,
    High,
    Urgent,
}

impl Severity {
    /// The two highest levels, under which `red_flags` is meaningful.
    pub fn is_elevated(self) -> bool {
        matches!(self, Self::High | Self::Urgent)
    }
}

/// How soon the follow-up should happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Timeframe {
    Immediately,
    Today,
    ThisWeek,
    Routine,
}

/// Nested follow-up block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUp {
    pub timeframe: Timeframe,
    pub note: String,
}

impl Default for FollowUp {
    fn default() -> Self {
        Self {
            timeframe: Timeframe::Routine,
            note: String::new(),
        }
    }
}

/// Fully typed final result. Every field always holds a valid value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub severity: Severity,
    pub confidence: f64,
    pub summary: String,
    pub go_to: String,
    pub recommendations: Vec<String>,
    pub red_flags: Vec<String>,
    pub follow_up: FollowUp,
}

impl Assessment {
    pub const DEFAULT_SEVERITY: Severity = Severity::Moderate;
    pub const DEFAULT_CONFIDENCE: f64 = 0.5;
}

impl Default for Assessment {
    fn default() -> Self {
        Self {
            severity: Self::DEFAULT_SEVERITY,
            confidence: Self::DEFAULT_CONFIDENCE,
            summary: String::new(),
            go_to: String::new(),
            recommendations: Vec::new(),
            red_flags: Vec::new(),
            follow_up: FollowUp::default(),
        }
    }
}
