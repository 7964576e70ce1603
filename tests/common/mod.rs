//! Shared test helpers: tools, event capture, fast configs.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use toolstream::config::OrchestratorConfig;
use toolstream::error::ToolstreamError;
use toolstream::orchestrator::{EventSink, OrchestratorEvent, OrchestratorEventPayload};
use toolstream::tools::{AgentTool, ToolParameters, ToolRegistry};
use toolstream::util::retry::RetryPolicy;

/// Registry with `lookupA` (echoes its args) and `lookupB` (always fails).
pub fn lookup_registry() -> ToolRegistry {
    ToolRegistry::new()
        .register(Arc::new(AgentTool::new(
            "lookupA",
            "Look up A",
            ToolParameters::empty(),
            |args, _ctx| async move { Ok(json!({"found": args.raw().clone()})) },
        )))
        .register(Arc::new(AgentTool::new(
            "lookupB",
            "Look up B",
            ToolParameters::empty(),
            |_args, _ctx| async move {
                Err(ToolstreamError::ToolExecution {
                    tool_name: "lookupB".into(),
                    message: "backend unavailable".into(),
                })
            },
        )))
}

/// Config with millisecond retry delays.
pub fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        retry: RetryPolicy {
            max_attempts: 4,
            delays: vec![Duration::from_millis(10)],
        },
        ..OrchestratorConfig::default()
    }
}

/// Collects every event pushed to its sink.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<OrchestratorEvent>>>,
}

impl EventLog {
    pub fn sink(&self) -> EventSink {
        let events = Arc::clone(&self.events);
        Arc::new(move |event| events.lock().unwrap().push(event))
    }

    pub fn payloads(&self) -> Vec<OrchestratorEventPayload> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|event| event.payload.clone())
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&OrchestratorEventPayload) -> bool) -> usize {
        self.payloads().iter().filter(|p| pred(p)).count()
    }

    pub fn seqs(&self) -> Vec<u64> {
        self.events.lock().unwrap().iter().map(|e| e.seq).collect()
    }
}

/// A complete assessment document.
pub fn assessment_json() -> String {
    json!({
        "severity": "high",
        "confidence": 0.8,
        "summary": "Possible sprain.",
        "go_to": "Urgent care",
        "recommendations": ["Rest", "Ice the ankle"],
        "red_flags": ["Numbness"],
        "follow_up": {"timeframe": "today", "note": "Call if swelling grows."}
    })
    .to_string()
}
