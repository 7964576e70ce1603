//! The orchestrator: retry shell around the round controller.
//!
//! One invocation runs on one task. Each attempt starts again from the
//! original history; a transient failure anywhere in an attempt discards the
//! whole attempt.

pub mod controller;
pub mod dispatch;
pub mod events;
pub mod outcome;
pub mod state;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::OrchestratorConfig;
use crate::error::ToolstreamError;
use crate::provider::RoundStreamProvider;
use crate::session::SessionStore;
use crate::telemetry::TelemetryAggregator;
use crate::tools::{CapabilityCatalog, OperationExecutor};
use crate::types::{GenerationSettings, Turn};
use crate::validate::validate_with_report;

pub use controller::{ControllerLimits, ControllerOutput, Phase, RoundController};
pub use dispatch::ToolDispatcher;
pub use events::{EventSink, OrchestratorEvent, OrchestratorEventPayload};
pub use outcome::{CompletedRun, OrchestrationOutcome};
pub use state::RoundState;

use events::EventEmitter;

/// Input for one invocation.
#[derive(Clone)]
pub struct OrchestrationRequest {
    pub invocation_id: Uuid,
    /// The new user input for this invocation.
    pub input: String,
    /// Turns placed before `input` (after any stored session turns).
    pub history: Vec<Turn>,
    pub session_id: Option<String>,
    /// Overrides the settings derived from the orchestrator config.
    pub settings: Option<GenerationSettings>,
    pub event_sink: Option<EventSink>,
}

impl OrchestrationRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            invocation_id: Uuid::new_v4(),
            input: input.into(),
            history: Vec::new(),
            session_id: None,
            settings: None,
            event_sink: None,
        }
    }

    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_event_sink(mut self, sink: EventSink) -> Self {
        self.event_sink = Some(sink);
        self
    }
}

/// Handle to an invocation running on its own task.
pub struct OrchestrationHandle {
    invocation_id: Uuid,
    cancel: CancellationToken,
    task: JoinHandle<OrchestrationOutcome>,
    events: Option<UnboundedReceiverStream<OrchestratorEvent>>,
}

impl OrchestrationHandle {
    pub fn invocation_id(&self) -> Uuid {
        self.invocation_id
    }

    /// Request cancellation. The task finishes with `Canceled`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Take the event stream. Returns `None` after the first call.
    pub fn take_events(&mut self) -> Option<UnboundedReceiverStream<OrchestratorEvent>> {
        self.events.take()
    }

    pub async fn wait(self) -> OrchestrationOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => OrchestrationOutcome::Canceled { attempts: 0 },
            Err(e) => OrchestrationOutcome::Failed {
                error: ToolstreamError::InvalidState(format!("orchestration task failed: {e}")),
                attempts: 0,
            },
        }
    }
}

/// Streaming tool-use orchestrator.
#[derive(Clone)]
pub struct Orchestrator {
    provider: Arc<dyn RoundStreamProvider>,
    executor: Arc<dyn OperationExecutor>,
    catalog: Arc<CapabilityCatalog>,
    config: OrchestratorConfig,
    telemetry: TelemetryAggregator,
    sessions: Option<Arc<dyn SessionStore>>,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn RoundStreamProvider>,
        executor: Arc<dyn OperationExecutor>,
        catalog: Arc<CapabilityCatalog>,
    ) -> Self {
        Self {
            provider,
            executor,
            catalog,
            config: OrchestratorConfig::default(),
            telemetry: TelemetryAggregator::new(),
            sessions: None,
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_telemetry(mut self, telemetry: TelemetryAggregator) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(store);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn telemetry(&self) -> &TelemetryAggregator {
        &self.telemetry
    }

    /// Run one invocation to completion on the current task.
    pub async fn run(
        &self,
        request: OrchestrationRequest,
        cancel: CancellationToken,
    ) -> OrchestrationOutcome {
        let span = tracing::info_span!(
            "orchestrate",
            invocation_id = %request.invocation_id,
            provider = self.provider.provider_name()
        );
        self.run_inner(request, cancel).instrument(span).await
    }

    /// Run one invocation on a new task.
    pub fn spawn(&self, request: OrchestrationRequest) -> OrchestrationHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let caller_sink = request.event_sink.clone();
        let sink: EventSink = Arc::new(move |event: OrchestratorEvent| {
            if let Some(caller_sink) = &caller_sink {
                caller_sink(event.clone());
            }
            let _ = tx.send(event);
        });

        let invocation_id = request.invocation_id;
        let cancel = CancellationToken::new();
        let orchestrator = self.clone();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            orchestrator
                .run(request.with_event_sink(sink), task_cancel)
                .await
        });

        OrchestrationHandle {
            invocation_id,
            cancel,
            task,
            events: Some(UnboundedReceiverStream::new(rx)),
        }
    }

    async fn run_inner(
        &self,
        request: OrchestrationRequest,
        cancel: CancellationToken,
    ) -> OrchestrationOutcome {
        let emitter = EventEmitter::new(request.invocation_id, request.event_sink.clone());
        self.telemetry.record_invocation();
        tracing::info!(session = ?request.session_id, "orchestration started");

        let mut history = match self.load_session(request.session_id.as_deref()).await {
            Ok(turns) => turns,
            Err(error) => return self.fail(&emitter, error, 0),
        };
        history.extend(request.history);
        let user_turn = Turn::user(request.input);
        history.push(user_turn.clone());

        let dispatcher = ToolDispatcher::new(
            Arc::clone(&self.executor),
            Arc::clone(&self.catalog),
            self.config.operation_timeout(),
        )
        .with_invocation_id(emitter.invocation_id());
        let controller = RoundController {
            provider: self.provider.as_ref(),
            dispatcher: &dispatcher,
            emitter: &emitter,
            telemetry: &self.telemetry,
            catalog: Arc::clone(&self.catalog),
            system: self.config.system_prompt.clone(),
            settings: request
                .settings
                .unwrap_or_else(|| self.config.generation_settings()),
            limits: ControllerLimits {
                max_rounds: self.config.max_rounds,
                stream_open_timeout: self.config.stream_open_timeout(),
                stream_idle_timeout: self.config.stream_idle_timeout(),
                extraction_anchor: self.config.extraction_anchor.clone(),
            },
        };

        let attempts = AtomicU32::new(0);
        let result = self
            .config
            .retry
            .execute(
                &cancel,
                |notice| {
                    self.telemetry.record_retry();
                    emitter.emit(OrchestratorEventPayload::RetryScheduled {
                        attempt: notice.attempt,
                        delay_ms: notice.delay.as_millis() as u64,
                        error: notice.error.to_string(),
                    });
                },
                |attempt| {
                    attempts.store(attempt, Ordering::Relaxed);
                    self.telemetry.record_attempt();
                    emitter.emit(OrchestratorEventPayload::AttemptStarted { attempt });
                    tracing::debug!(attempt, "attempt started");
                    controller.run(history.clone(), &cancel)
                },
            )
            .await;
        let attempts = attempts.into_inner();

        let output = match result {
            Ok(output) => output,
            Err(ToolstreamError::Canceled) => {
                tracing::info!(attempts, "orchestration canceled");
                self.telemetry.record_canceled();
                emitter.emit(OrchestratorEventPayload::Canceled { attempts });
                return OrchestrationOutcome::Canceled { attempts };
            }
            Err(error) => return self.fail(&emitter, error, attempts),
        };

        let (result, report) = validate_with_report(&output.final_text);

        if let (Some(store), Some(session_id)) = (&self.sessions, request.session_id.as_deref()) {
            let turns = vec![user_turn, output.final_turn.clone()];
            if let Err(e) = store.append(session_id, turns).await {
                tracing::warn!(
                    session = session_id,
                    error = %e,
                    "failed to persist session turns"
                );
            }
        }

        tracing::info!(
            attempts,
            rounds = output.rounds,
            round_cap_reached = output.round_cap_reached,
            severity = %result.severity,
            "orchestration completed"
        );
        self.telemetry.record_completed();
        emitter.emit(OrchestratorEventPayload::FinalResult {
            result: result.clone(),
            rounds: output.rounds,
            attempts,
            round_cap_reached: output.round_cap_reached,
        });

        OrchestrationOutcome::Completed(CompletedRun {
            result,
            report,
            final_text: output.final_text,
            rounds: output.rounds,
            attempts,
            round_cap_reached: output.round_cap_reached,
        })
    }

    async fn load_session(&self, session_id: Option<&str>) -> Result<Vec<Turn>, ToolstreamError> {
        match (&self.sessions, session_id) {
            (Some(store), Some(id)) => store.load(id).await,
            _ => Ok(Vec::new()),
        }
    }

    fn fail(
        &self,
        emitter: &EventEmitter,
        error: ToolstreamError,
        attempts: u32,
    ) -> OrchestrationOutcome {
        tracing::error!(
            attempts,
            error = %error,
            category = ?error.category(),
            suggestion = ?error.recovery_suggestion(),
            "orchestration failed"
        );
        self.telemetry.record_failed();
        emitter.emit(OrchestratorEventPayload::FatalError {
            error: error.to_string(),
            attempts,
        });
        OrchestrationOutcome::Failed { error, attempts }
    }
}
