//! Segment decoder: turns low-level round signals into closed content segments.
//!
//! The decoder is a plain state machine with no I/O. Upstream framing bugs are
//! logged and dropped here so they never reach the round controller.

use crate::types::{
    ContentSegment, OperationRequest, SegmentHeader, SegmentKind, StopReason, StreamSignal, Usage,
};

/// How a round ended, as far as the round controller is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// At least one tool invocation closed this round.
    ToolRequested,
    /// No further operations requested.
    Complete,
}

/// Everything a finished round produced.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRound {
    pub segments: Vec<ContentSegment>,
    pub outcome: RoundOutcome,
    pub stop_reason: StopReason,
    pub usage: Option<Usage>,
}

impl DecodedRound {
    pub fn requests(&self) -> Vec<OperationRequest> {
        crate::types::requests_of(&self.segments)
    }

    pub fn text(&self) -> String {
        crate::types::joined_text(&self.segments)
    }
}

/// Output of feeding one signal to the decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum DecoderOutput {
    /// A fragment appended to the open segment.
    Delta { kind: SegmentKind, fragment: String },
    /// The round ended.
    RoundComplete(DecodedRound),
}

#[derive(Debug)]
struct OpenSegment {
    header: SegmentHeader,
    buffer: String,
}

impl OpenSegment {
    fn close(self) -> ContentSegment {
        match self.header {
            SegmentHeader::Reasoning => ContentSegment::Reasoning { text: self.buffer },
            SegmentHeader::Text => ContentSegment::Text { text: self.buffer },
            SegmentHeader::ToolInvocation { id, name } => {
                ContentSegment::ToolInvocation(OperationRequest {
                    id,
                    name,
                    args: parse_tool_args(&self.buffer),
                })
            }
        }
    }
}

fn parse_tool_args(raw: &str) -> serde_json::Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return serde_json::json!({});
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

/// Incremental decoder for one round.
#[derive(Debug, Default)]
pub struct SegmentDecoder {
    open: Option<OpenSegment>,
    closed: Vec<ContentSegment>,
    finished: bool,
    violations: usize,
}

impl SegmentDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Protocol violations dropped so far.
    pub fn violations(&self) -> usize {
        self.violations
    }

    /// Kind of the currently open segment.
    pub fn open_kind(&self) -> Option<SegmentKind> {
        self.open.as_ref().map(|segment| segment.header.kind())
    }

    /// Accumulated text of the open segment.
    pub fn open_buffer(&self) -> Option<&str> {
        self.open.as_ref().map(|segment| segment.buffer.as_str())
    }

    /// Whether round-end has been seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed one signal.
    pub fn feed(&mut self, signal: StreamSignal) -> Option<DecoderOutput> {
        if self.finished {
            self.violation("signal after round end", None);
            return None;
        }
        match signal {
            StreamSignal::SegmentStart { header } => {
                if let Some(open) = self.open.take() {
                    self.violation(
                        "segment start while another segment is open",
                        Some(open.header.kind()),
                    );
                    self.push_closed(open.close());
                }
                self.open = Some(OpenSegment {
                    header,
                    buffer: String::new(),
                });
                None
            }
            StreamSignal::SegmentDelta { kind, fragment } => {
                let Some(open) = self.open.as_mut() else {
                    self.violation("delta with no open segment", Some(kind));
                    return None;
                };
                if open.header.kind() != kind {
                    self.violation("delta for a segment kind that is not open", Some(kind));
                    return None;
                }
                open.buffer.push_str(&fragment);
                Some(DecoderOutput::Delta { kind, fragment })
            }
            StreamSignal::SegmentEnd { kind } => {
                match self.open.take() {
                    Some(open) if open.header.kind() == kind => {
                        self.push_closed(open.close());
                    }
                    Some(open) => {
                        self.open = Some(open);
                        self.violation("segment end for a kind that is not open", Some(kind));
                    }
                    None => self.violation("segment end with no open segment", Some(kind)),
                }
                None
            }
            StreamSignal::RoundEnd { stop_reason, usage } => {
                if let Some(open) = self.open.take() {
                    self.violation("round end while a segment is open", Some(open.header.kind()));
                    self.push_closed(open.close());
                }
                self.finished = true;
                let segments = std::mem::take(&mut self.closed);
                let outcome = classify(&segments, &stop_reason);
                Some(DecoderOutput::RoundComplete(DecodedRound {
                    segments,
                    outcome,
                    stop_reason,
                    usage,
                }))
            }
        }
    }

    fn push_closed(&mut self, segment: ContentSegment) {
        if let ContentSegment::ToolInvocation(request) = &segment {
            let repeated = self.closed.iter().any(|closed| {
                matches!(closed, ContentSegment::ToolInvocation(seen) if seen.id == request.id)
            });
            if repeated {
                tracing::warn!(
                    id = %request.id,
                    name = %request.name,
                    "repeated tool invocation id"
                );
                self.violation("tool invocation id already used this round", None);
                return;
            }
        }
        self.closed.push(segment);
    }

    fn violation(&mut self, what: &'static str, kind: Option<SegmentKind>) {
        self.violations += 1;
        tracing::warn!(violation = what, kind = ?kind, "dropping malformed stream signal");
    }
}

fn classify(segments: &[ContentSegment], stop_reason: &StopReason) -> RoundOutcome {
    let requested = segments
        .iter()
        .any(|segment| matches!(segment, ContentSegment::ToolInvocation(_)));
    if requested != (*stop_reason == StopReason::ToolUse) {
        tracing::debug!(
            ?stop_reason,
            requested,
            "stop reason disagrees with closed segments; using segments"
        );
    }
    if requested {
        RoundOutcome::ToolRequested
    } else {
        RoundOutcome::Complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tool_header(id: &str, name: &str) -> SegmentHeader {
        SegmentHeader::ToolInvocation {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    fn finish(decoder: &mut SegmentDecoder, reason: StopReason) -> DecodedRound {
        match decoder.feed(StreamSignal::round_end(reason)) {
            Some(DecoderOutput::RoundComplete(round)) => round,
            other => panic!("expected round completion, got {other:?}"),
        }
    }

    #[test]
    fn decodes_reasoning_text_and_tool_segments_in_order() {
        let mut decoder = SegmentDecoder::new();
        decoder.feed(StreamSignal::start(SegmentHeader::Reasoning));
        let out = decoder.feed(StreamSignal::delta(SegmentKind::Reasoning, "think"));
        assert_eq!(
            out,
            Some(DecoderOutput::Delta {
                kind: SegmentKind::Reasoning,
                fragment: "think".to_string()
            })
        );
        decoder.feed(StreamSignal::end(SegmentKind::Reasoning));
        decoder.feed(StreamSignal::start(SegmentHeader::Text));
        decoder.feed(StreamSignal::delta(SegmentKind::Text, "Hel"));
        decoder.feed(StreamSignal::delta(SegmentKind::Text, "lo"));
        decoder.feed(StreamSignal::end(SegmentKind::Text));
        decoder.feed(StreamSignal::start(tool_header("t1", "lookup")));
        decoder.feed(StreamSignal::delta(SegmentKind::ToolInvocation, "{\"q\":"));
        decoder.feed(StreamSignal::delta(SegmentKind::ToolInvocation, "\"x\"}"));
        decoder.feed(StreamSignal::end(SegmentKind::ToolInvocation));

        let round = finish(&mut decoder, StopReason::ToolUse);
        assert_eq!(round.outcome, RoundOutcome::ToolRequested);
        assert_eq!(
            round.segments,
            vec![
                ContentSegment::Reasoning {
                    text: "think".to_string()
                },
                ContentSegment::Text {
                    text: "Hello".to_string()
                },
                ContentSegment::ToolInvocation(OperationRequest::new(
                    "t1",
                    "lookup",
                    serde_json::json!({"q": "x"})
                )),
            ]
        );
        assert_eq!(decoder.violations(), 0);
    }

    #[test]
    fn delta_without_open_segment_is_dropped() {
        let mut decoder = SegmentDecoder::new();
        assert_eq!(decoder.feed(StreamSignal::delta(SegmentKind::Text, "stray")), None);
        let round = finish(&mut decoder, StopReason::EndTurn);
        assert!(round.segments.is_empty());
        assert_eq!(round.outcome, RoundOutcome::Complete);
        assert_eq!(decoder.violations(), 1);
    }

    #[test]
    fn delta_for_mismatched_kind_is_dropped() {
        let mut decoder = SegmentDecoder::new();
        decoder.feed(StreamSignal::start(SegmentHeader::Text));
        decoder.feed(StreamSignal::delta(SegmentKind::Text, "kept"));
        assert_eq!(
            decoder.feed(StreamSignal::delta(SegmentKind::Reasoning, "dropped")),
            None
        );
        decoder.feed(StreamSignal::end(SegmentKind::Text));
        let round = finish(&mut decoder, StopReason::EndTurn);
        assert_eq!(round.text(), "kept");
        assert_eq!(decoder.violations(), 1);
    }

    #[test]
    fn mismatched_end_keeps_segment_open() {
        let mut decoder = SegmentDecoder::new();
        decoder.feed(StreamSignal::start(SegmentHeader::Text));
        decoder.feed(StreamSignal::end(SegmentKind::Reasoning));
        assert_eq!(decoder.open_kind(), Some(SegmentKind::Text));
        decoder.feed(StreamSignal::delta(SegmentKind::Text, "still open"));
        decoder.feed(StreamSignal::end(SegmentKind::Text));
        let round = finish(&mut decoder, StopReason::EndTurn);
        assert_eq!(round.text(), "still open");
    }

    #[test]
    fn overlapping_start_closes_previous_segment() {
        let mut decoder = SegmentDecoder::new();
        decoder.feed(StreamSignal::start(SegmentHeader::Text));
        decoder.feed(StreamSignal::delta(SegmentKind::Text, "first"));
        decoder.feed(StreamSignal::start(SegmentHeader::Reasoning));
        decoder.feed(StreamSignal::delta(SegmentKind::Reasoning, "second"));
        let round = finish(&mut decoder, StopReason::EndTurn);
        assert_eq!(round.segments.len(), 2);
        assert_eq!(round.text(), "first");
        assert_eq!(decoder.violations(), 2);
    }

    #[test]
    fn classification_follows_closed_tool_segments() {
        let mut decoder = SegmentDecoder::new();
        decoder.feed(StreamSignal::start(SegmentHeader::Text));
        decoder.feed(StreamSignal::end(SegmentKind::Text));
        let round = finish(&mut decoder, StopReason::ToolUse);
        assert_eq!(round.outcome, RoundOutcome::Complete);

        let mut decoder = SegmentDecoder::new();
        decoder.feed(StreamSignal::start(tool_header("t1", "lookup")));
        decoder.feed(StreamSignal::end(SegmentKind::ToolInvocation));
        let round = finish(&mut decoder, StopReason::EndTurn);
        assert_eq!(round.outcome, RoundOutcome::ToolRequested);
        assert_eq!(round.requests()[0].args, serde_json::json!({}));
    }

    #[test]
    fn unparsable_tool_args_are_kept_as_string() {
        let mut decoder = SegmentDecoder::new();
        decoder.feed(StreamSignal::start(tool_header("t1", "lookup")));
        decoder.feed(StreamSignal::delta(SegmentKind::ToolInvocation, "{\"q\":"));
        decoder.feed(StreamSignal::end(SegmentKind::ToolInvocation));
        let round = finish(&mut decoder, StopReason::ToolUse);
        assert_eq!(
            round.requests()[0].args,
            serde_json::Value::String("{\"q\":".to_string())
        );
    }

    #[test]
    fn signals_after_round_end_are_ignored() {
        let mut decoder = SegmentDecoder::new();
        finish(&mut decoder, StopReason::EndTurn);
        assert!(decoder.is_finished());
        assert_eq!(decoder.feed(StreamSignal::start(SegmentHeader::Text)), None);
        assert_eq!(decoder.violations(), 1);
    }

    #[test]
    fn repeated_tool_invocation_id_is_dropped() {
        let mut decoder = SegmentDecoder::new();
        for args in ["{\"n\":1}", "{\"n\":2}"] {
            decoder.feed(StreamSignal::start(tool_header("t1", "lookup")));
            decoder.feed(StreamSignal::delta(SegmentKind::ToolInvocation, args));
            decoder.feed(StreamSignal::end(SegmentKind::ToolInvocation));
        }
        decoder.feed(StreamSignal::start(tool_header("t2", "lookup")));
        decoder.feed(StreamSignal::end(SegmentKind::ToolInvocation));

        let round = finish(&mut decoder, StopReason::ToolUse);
        let requests = round.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].id, "t1");
        assert_eq!(requests[0].args, serde_json::json!({"n": 1}));
        assert_eq!(requests[1].id, "t2");
        assert_eq!(decoder.violations(), 1);
    }
}
