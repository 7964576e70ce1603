//! Caller-facing orchestration events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Assessment, OperationRequest, OperationResult};

/// Concrete event payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorEventPayload {
    AttemptStarted {
        attempt: u32,
    },
    ReasoningDelta {
        round: u32,
        text: String,
    },
    TextDelta {
        round: u32,
        text: String,
    },
    OperationRequested {
        round: u32,
        request: OperationRequest,
    },
    OperationResolved {
        round: u32,
        result: OperationResult,
    },
    /// Best-effort value scraped from the still-streaming text. Emitted at
    /// most once per round.
    EarlyExtraction {
        round: u32,
        anchor: String,
        value: String,
    },
    /// The model asked for more operations after the last allowed round;
    /// the result is built from that round's text.
    RoundCapReached {
        rounds: u32,
    },
    RetryScheduled {
        attempt: u32,
        delay_ms: u64,
        error: String,
    },
    FinalResult {
        result: Assessment,
        rounds: u32,
        attempts: u32,
        round_cap_reached: bool,
    },
    FatalError {
        error: String,
        attempts: u32,
    },
    Canceled {
        attempts: u32,
    },
}

/// Envelope for orchestration events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorEvent {
    pub invocation_id: Uuid,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: OrchestratorEventPayload,
}

/// Callback receiving events in emission order.
pub type EventSink = Arc<dyn Fn(OrchestratorEvent) + Send + Sync>;

pub(crate) struct EventEmitter {
    invocation_id: Uuid,
    seq: AtomicU64,
    sink: Option<EventSink>,
}

impl EventEmitter {
    pub(crate) fn new(invocation_id: Uuid, sink: Option<EventSink>) -> Self {
        Self {
            invocation_id,
            seq: AtomicU64::new(1),
            sink,
        }
    }

    pub(crate) fn invocation_id(&self) -> Uuid {
        self.invocation_id
    }

    pub(crate) fn emit(&self, payload: OrchestratorEventPayload) {
        let Some(sink) = &self.sink else {
            return;
        };
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        (sink)(OrchestratorEvent {
            invocation_id: self.invocation_id,
            seq,
            timestamp: Utc::now(),
            payload,
        });
    }
}
