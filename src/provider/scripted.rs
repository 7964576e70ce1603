//! In-memory transport that replays canned rounds.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::Value;

use crate::error::ToolstreamError;
use crate::types::{SegmentHeader, SegmentKind, SignalStream, StopReason, StreamSignal};

use super::{RoundRequest, RoundStreamProvider};

/// One scripted call to [`RoundStreamProvider::open_round_stream`].
#[derive(Debug)]
pub enum ScriptedRound {
    /// Replay these items, then end the stream.
    Signals(Vec<Result<StreamSignal, ToolstreamError>>),
    /// Fail to open the stream at all.
    OpenError(ToolstreamError),
    /// Replay these signals, then stay silent forever.
    Stall(Vec<StreamSignal>),
}

impl ScriptedRound {
    /// A round that streams `text` as a single Text segment in `chunk`-byte
    /// pieces and ends normally.
    pub fn text(text: &str, chunk: usize) -> Self {
        let mut signals = vec![Ok(StreamSignal::start(SegmentHeader::Text))];
        signals.extend(
            chunks(text, chunk.max(1))
                .into_iter()
                .map(|piece| Ok(StreamSignal::delta(SegmentKind::Text, piece))),
        );
        signals.push(Ok(StreamSignal::end(SegmentKind::Text)));
        signals.push(Ok(StreamSignal::round_end(StopReason::EndTurn)));
        Self::Signals(signals)
    }

    /// A round that requests each `(id, name, args)` operation in order.
    pub fn tool_calls<'a>(calls: impl IntoIterator<Item = (&'a str, &'a str, Value)>) -> Self {
        let mut signals = Vec::new();
        for (id, name, args) in calls {
            signals.push(Ok(StreamSignal::start(SegmentHeader::ToolInvocation {
                id: id.to_string(),
                name: name.to_string(),
            })));
            signals.push(Ok(StreamSignal::delta(
                SegmentKind::ToolInvocation,
                args.to_string(),
            )));
            signals.push(Ok(StreamSignal::end(SegmentKind::ToolInvocation)));
        }
        signals.push(Ok(StreamSignal::round_end(StopReason::ToolUse)));
        Self::Signals(signals)
    }

    /// Prefix a reasoning segment to a signal round.
    pub fn with_reasoning(self, reasoning: &str) -> Self {
        match self {
            Self::Signals(signals) => {
                let mut prefixed = vec![
                    Ok(StreamSignal::start(SegmentHeader::Reasoning)),
                    Ok(StreamSignal::delta(SegmentKind::Reasoning, reasoning)),
                    Ok(StreamSignal::end(SegmentKind::Reasoning)),
                ];
                prefixed.extend(signals);
                Self::Signals(prefixed)
            }
            other => other,
        }
    }
}

/// Split on char boundaries into pieces of at most `size` bytes (or one char).
fn chunks(text: &str, size: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if !current.is_empty() && current.len() + ch.len_utf8() > size {
            pieces.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Replays [`ScriptedRound`]s in order and records every request it sees.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    rounds: Mutex<VecDeque<ScriptedRound>>,
    requests: Mutex<Vec<RoundRequest>>,
}

impl ScriptedProvider {
    pub fn new(rounds: impl IntoIterator<Item = ScriptedRound>) -> Self {
        Self {
            rounds: Mutex::new(rounds.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far, in call order.
    pub fn requests(&self) -> Vec<RoundRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn calls(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Scripted rounds not yet consumed.
    pub fn remaining(&self) -> usize {
        self.rounds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl RoundStreamProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn open_round_stream(
        &self,
        request: &RoundRequest,
    ) -> Result<SignalStream, ToolstreamError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let round = self
            .rounds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| ToolstreamError::InvalidState("script exhausted".to_string()))?;

        match round {
            ScriptedRound::Signals(items) => Ok(stream::iter(items).boxed()),
            ScriptedRound::OpenError(error) => Err(error),
            ScriptedRound::Stall(signals) => Ok(stream::iter(signals.into_iter().map(Ok))
                .chain(stream::pending())
                .boxed()),
        }
    }
}
