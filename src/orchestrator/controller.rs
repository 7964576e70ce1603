//! Round controller: stream a round, dispatch what it asks for, resume.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use strum::Display;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use super::dispatch::ToolDispatcher;
use super::events::{EventEmitter, OrchestratorEventPayload};
use super::state::RoundState;
use crate::decoder::{DecodedRound, DecoderOutput, RoundOutcome, SegmentDecoder};
use crate::error::ToolstreamError;
use crate::extract::PartialExtractor;
use crate::provider::{RoundRequest, RoundStreamProvider};
use crate::telemetry::TelemetryAggregator;
use crate::tools::CapabilityCatalog;
use crate::types::{ContentSegment, GenerationSettings, SegmentKind, Turn};
use crate::util::timeout::with_timeout;

/// Where the controller is in the round cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    Streaming,
    Dispatching,
    Resuming,
    Done,
}

/// Per-attempt limits.
#[derive(Debug, Clone)]
pub struct ControllerLimits {
    pub max_rounds: u32,
    pub stream_open_timeout: Duration,
    pub stream_idle_timeout: Duration,
    pub extraction_anchor: Option<String>,
}

/// What a finished attempt hands to the validator.
#[derive(Debug, Clone)]
pub struct ControllerOutput {
    /// Concatenated text segments of the last round that produced text.
    pub final_text: String,
    /// The final model turn, without unanswered operation requests.
    pub final_turn: Turn,
    pub rounds: u32,
    pub round_cap_reached: bool,
    pub state: RoundState,
}

/// Drives one attempt from the initial history to a final round.
pub struct RoundController<'a> {
    pub(crate) provider: &'a dyn RoundStreamProvider,
    pub(crate) dispatcher: &'a ToolDispatcher,
    pub(crate) emitter: &'a EventEmitter,
    pub(crate) telemetry: &'a TelemetryAggregator,
    pub(crate) catalog: Arc<CapabilityCatalog>,
    pub(crate) system: Option<String>,
    pub(crate) settings: GenerationSettings,
    pub(crate) limits: ControllerLimits,
}

impl RoundController<'_> {
    /// Run rounds until one ends without requesting operations or the round
    /// cap is hit.
    pub async fn run(
        &self,
        history: Vec<Turn>,
        cancel: &CancellationToken,
    ) -> Result<ControllerOutput, ToolstreamError> {
        let mut state = RoundState::new(history);
        let mut round = 0u32;
        // Text of the most recent round that produced any.
        let mut last_text = String::new();

        loop {
            round += 1;
            tracing::debug!(round, phase = %Phase::Streaming, "round started");
            let decoded = self.stream_round(round, &state, cancel).await?;
            let text = decoded.text();
            if !text.trim().is_empty() {
                last_text = text;
            }

            if decoded.outcome == RoundOutcome::Complete {
                return self.finish(state, decoded, last_text, round, false);
            }

            if round >= self.limits.max_rounds {
                tracing::warn!(
                    round,
                    max_rounds = self.limits.max_rounds,
                    pending = decoded.requests().len(),
                    "round cap reached with operations still requested"
                );
                self.telemetry.record_round_cap();
                self.emitter
                    .emit(OrchestratorEventPayload::RoundCapReached { rounds: round });
                return self.finish(state, decoded, last_text, round, true);
            }

            tracing::debug!(round, phase = %Phase::Dispatching, "dispatching operations");
            let requests = decoded.requests();
            for request in &requests {
                self.emitter.emit(OrchestratorEventPayload::OperationRequested {
                    round,
                    request: request.clone(),
                });
            }

            let results = self.dispatcher.dispatch(&requests, cancel).await?;
            for result in &results {
                self.telemetry.record_operation(&result.name, result.is_error());
                self.emitter.emit(OrchestratorEventPayload::OperationResolved {
                    round,
                    result: result.clone(),
                });
            }

            tracing::debug!(round, phase = %Phase::Resuming, results = results.len(), "resuming");
            state.push_model(decoded.segments)?;
            state.push_operation_results(results)?;
        }
    }

    fn finish(
        &self,
        mut state: RoundState,
        decoded: DecodedRound,
        final_text: String,
        rounds: u32,
        round_cap_reached: bool,
    ) -> Result<ControllerOutput, ToolstreamError> {
        let segments: Vec<ContentSegment> = decoded
            .segments
            .into_iter()
            .filter(|segment| segment.kind() != SegmentKind::ToolInvocation)
            .collect();
        state.push_model(segments.clone())?;
        tracing::debug!(rounds, phase = %Phase::Done, round_cap_reached, "attempt finished");

        Ok(ControllerOutput {
            final_text,
            final_turn: Turn::Model { segments },
            rounds,
            round_cap_reached,
            state,
        })
    }

    async fn stream_round(
        &self,
        round: u32,
        state: &RoundState,
        cancel: &CancellationToken,
    ) -> Result<DecodedRound, ToolstreamError> {
        let request = RoundRequest {
            system: self.system.clone(),
            turns: state.turns().to_vec(),
            catalog: Arc::clone(&self.catalog),
            settings: self.settings.clone(),
        };

        let open = with_timeout(
            self.limits.stream_open_timeout,
            self.provider.open_round_stream(&request),
        );
        let mut stream = tokio::select! {
            _ = cancel.cancelled() => return Err(ToolstreamError::Canceled),
            opened = open => opened?,
        };

        let mut decoder = SegmentDecoder::new();
        let mut extractor = self.limits.extraction_anchor.as_deref().map(PartialExtractor::new);
        let idle_timeout = self.limits.stream_idle_timeout;
        let idle_sleep = time::sleep(idle_timeout);
        tokio::pin!(idle_sleep);

        loop {
            let signal = tokio::select! {
                _ = cancel.cancelled() => return Err(ToolstreamError::Canceled),
                _ = &mut idle_sleep => {
                    return Err(ToolstreamError::Timeout(idle_timeout.as_millis() as u64));
                }
                next = stream.next() => match next {
                    Some(item) => item?,
                    None => {
                        return Err(ToolstreamError::Stream(
                            "stream ended before the round ended".to_string(),
                        ));
                    }
                },
            };
            idle_sleep.as_mut().reset(Instant::now() + idle_timeout);

            match decoder.feed(signal) {
                Some(DecoderOutput::Delta { kind, fragment }) => {
                    self.forward_delta(round, kind, fragment);
                    if kind != SegmentKind::Text {
                        continue;
                    }
                    let (Some(extractor), Some(accumulated)) =
                        (extractor.as_mut(), decoder.open_buffer())
                    else {
                        continue;
                    };
                    if let Some(value) = extractor.observe(accumulated) {
                        tracing::debug!(round, anchor = extractor.anchor(), "early extraction");
                        self.telemetry.record_early_extraction();
                        self.emitter.emit(OrchestratorEventPayload::EarlyExtraction {
                            round,
                            anchor: extractor.anchor().to_string(),
                            value,
                        });
                    }
                }
                Some(DecoderOutput::RoundComplete(decoded)) => {
                    self.telemetry
                        .record_round(decoder.violations(), decoded.usage.as_ref());
                    tracing::debug!(
                        round,
                        outcome = ?decoded.outcome,
                        stop_reason = ?decoded.stop_reason,
                        segments = decoded.segments.len(),
                        violations = decoder.violations(),
                        "round complete"
                    );
                    return Ok(decoded);
                }
                None => {}
            }
        }
    }

    fn forward_delta(&self, round: u32, kind: SegmentKind, text: String) {
        let payload = match kind {
            SegmentKind::Reasoning => OrchestratorEventPayload::ReasoningDelta { round, text },
            SegmentKind::Text => OrchestratorEventPayload::TextDelta { round, text },
            SegmentKind::ToolInvocation => return,
        };
        self.emitter.emit(payload);
    }
}
