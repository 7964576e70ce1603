//! Generation settings passed through to the backend.

use bon::Builder;
use serde::{Deserialize, Serialize};

/// Settings controlling a single model round.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, Default, PartialEq)]
pub struct GenerationSettings {
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    /// Token budget for extended reasoning; `None` disables it.
    pub reasoning_budget_tokens: Option<u32>,
    pub stop_sequences: Option<Vec<String>>,
}
