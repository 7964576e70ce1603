//! Content segments produced by one model round.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::message::OperationRequest;

/// Kind of a content segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SegmentKind {
    Reasoning,
    Text,
    ToolInvocation,
}

/// One closed, immutable unit of model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentSegment {
    Reasoning { text: String },
    Text { text: String },
    ToolInvocation(OperationRequest),
}

impl ContentSegment {
    pub fn kind(&self) -> SegmentKind {
        match self {
            Self::Reasoning { .. } => SegmentKind::Reasoning,
            Self::Text { .. } => SegmentKind::Text,
            Self::ToolInvocation(_) => SegmentKind::ToolInvocation,
        }
    }

    /// The operation request, if this is a tool invocation.
    pub fn as_request(&self) -> Option<&OperationRequest> {
        match self {
            Self::ToolInvocation(request) => Some(request),
            _ => None,
        }
    }
}

/// Concatenate the text segments of a round.
pub fn joined_text(segments: &[ContentSegment]) -> String {
    segments
        .iter()
        .filter_map(|segment| match segment {
            ContentSegment::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("")
}

/// Collect the operation requests of a round, in segment order.
pub fn requests_of(segments: &[ContentSegment]) -> Vec<OperationRequest> {
    segments
        .iter()
        .filter_map(ContentSegment::as_request)
        .cloned()
        .collect()
}
