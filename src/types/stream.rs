//! Low-level signals emitted by a backend round stream.

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use super::segment::SegmentKind;
use super::usage::Usage;
use crate::error::ToolstreamError;

/// Stream of signals for a single round.
pub type SignalStream = BoxStream<'static, Result<StreamSignal, ToolstreamError>>;

/// Opening header of a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SegmentHeader {
    Reasoning,
    Text,
    ToolInvocation { id: String, name: String },
}

impl SegmentHeader {
    pub fn kind(&self) -> SegmentKind {
        match self {
            Self::Reasoning => SegmentKind::Reasoning,
            Self::Text => SegmentKind::Text,
            Self::ToolInvocation { .. } => SegmentKind::ToolInvocation,
        }
    }
}

/// Why the backend says a round ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    Other(String),
}

impl StopReason {
    pub fn from_wire(reason: &str) -> Self {
        match reason {
            "end_turn" => Self::EndTurn,
            "tool_use" => Self::ToolUse,
            "max_tokens" => Self::MaxTokens,
            "stop_sequence" => Self::StopSequence,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A single low-level signal from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamSignal {
    SegmentStart {
        header: SegmentHeader,
    },
    SegmentDelta {
        kind: SegmentKind,
        fragment: String,
    },
    SegmentEnd {
        kind: SegmentKind,
    },
    RoundEnd {
        stop_reason: StopReason,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },
}

impl StreamSignal {
    pub fn start(header: SegmentHeader) -> Self {
        Self::SegmentStart { header }
    }

    pub fn delta(kind: SegmentKind, fragment: impl Into<String>) -> Self {
        Self::SegmentDelta {
            kind,
            fragment: fragment.into(),
        }
    }

    pub fn end(kind: SegmentKind) -> Self {
        Self::SegmentEnd { kind }
    }

    pub fn round_end(stop_reason: StopReason) -> Self {
        Self::RoundEnd {
            stop_reason,
            usage: None,
        }
    }
}
