//! Concurrent execution of one batch of operation requests.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::ToolstreamError;
use crate::tools::{CapabilityCatalog, OperationExecutor, ToolArguments, ToolExecutionContext};
use crate::types::{OperationError, OperationErrorKind, OperationRequest, OperationResult};

/// Fans a batch out to the executor and joins the results.
///
/// Every request runs in its own task. Whatever happens inside one of them
/// (error, panic, timeout, rejected by the catalog) becomes that request's
/// error result and leaves its siblings alone.
#[derive(Clone)]
pub struct ToolDispatcher {
    executor: Arc<dyn OperationExecutor>,
    catalog: Arc<CapabilityCatalog>,
    operation_timeout: Duration,
    invocation_id: Option<Uuid>,
}

impl ToolDispatcher {
    pub fn new(
        executor: Arc<dyn OperationExecutor>,
        catalog: Arc<CapabilityCatalog>,
        operation_timeout: Duration,
    ) -> Self {
        Self {
            executor,
            catalog,
            operation_timeout,
            invocation_id: None,
        }
    }

    pub fn with_invocation_id(mut self, invocation_id: Uuid) -> Self {
        self.invocation_id = Some(invocation_id);
        self
    }

    /// Run `requests` concurrently. Results come back in request order.
    ///
    /// Fails only with [`ToolstreamError::Canceled`]; in-flight operations
    /// are aborted in that case.
    pub async fn dispatch(
        &self,
        requests: &[OperationRequest],
        cancel: &CancellationToken,
    ) -> Result<Vec<OperationResult>, ToolstreamError> {
        if cancel.is_cancelled() {
            return Err(ToolstreamError::Canceled);
        }

        let handles: Vec<_> = requests
            .iter()
            .map(|request| tokio::spawn(self.run_one(request.clone())))
            .collect();
        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();

        let joined = tokio::select! {
            _ = cancel.cancelled() => {
                for abort in &aborts {
                    abort.abort();
                }
                tracing::debug!(in_flight = aborts.len(), "dispatch canceled");
                return Err(ToolstreamError::Canceled);
            }
            joined = join_all(handles) => joined,
        };

        Ok(requests
            .iter()
            .zip(joined)
            .map(|(request, joined)| match joined {
                Ok(result) => result,
                Err(e) => {
                    let kind = if e.is_panic() {
                        OperationErrorKind::Panicked
                    } else {
                        OperationErrorKind::Failed
                    };
                    tracing::warn!(
                        operation = %request.name,
                        id = %request.id,
                        error = %e,
                        "operation task died"
                    );
                    OperationResult::error(request, OperationError::new(kind, e.to_string()))
                }
            })
            .collect())
    }

    fn run_one(
        &self,
        request: OperationRequest,
    ) -> impl std::future::Future<Output = OperationResult> + Send + 'static {
        let executor = Arc::clone(&self.executor);
        let catalog = Arc::clone(&self.catalog);
        let timeout = self.operation_timeout;
        let ctx = ToolExecutionContext {
            operation_id: request.id.clone(),
            invocation_id: self.invocation_id,
            budget: timeout,
        };

        async move {
            if let Err(error) = catalog.check(&request) {
                tracing::warn!(
                    operation = %request.name,
                    id = %request.id,
                    kind = %error.kind,
                    "operation rejected"
                );
                return OperationResult::error(&request, error);
            }

            let args = ToolArguments::new(request.args.clone());
            tracing::debug!(operation = %request.name, id = %request.id, "operation started");
            let execution = executor.execute(&request.name, &args, &ctx);
            match tokio::time::timeout(timeout, execution).await {
                Ok(Ok(payload)) => OperationResult::payload(&request, payload),
                Ok(Err(e)) => {
                    tracing::warn!(
                        operation = %request.name,
                        id = %request.id,
                        error = %e,
                        "operation failed"
                    );
                    OperationResult::error(
                        &request,
                        OperationError::new(OperationErrorKind::Failed, e.to_string()),
                    )
                }
                Err(_) => {
                    tracing::warn!(
                        operation = %request.name,
                        id = %request.id,
                        timeout_ms = timeout.as_millis() as u64,
                        "operation timed out"
                    );
                    OperationResult::error(
                        &request,
                        OperationError::new(
                            OperationErrorKind::TimedOut,
                            format!("operation timed out after {}ms", timeout.as_millis()),
                        ),
                    )
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{AgentTool, ToolParameters, ToolRegistry};
    use crate::types::OperationOutcome;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn registry() -> ToolRegistry {
        ToolRegistry::new()
            .register(Arc::new(AgentTool::new(
                "echo",
                "Echo the input",
                ToolParameters::empty(),
                |args, _ctx| async move { Ok(args.raw().clone()) },
            )))
            .register(Arc::new(AgentTool::new(
                "boom",
                "Always panics",
                ToolParameters::empty(),
                |_args, _ctx| async move {
                    if true {
                        panic!("kaboom");
                    }
                    Ok(json!(null))
                },
            )))
            .register(Arc::new(AgentTool::new(
                "context",
                "Report the execution context",
                ToolParameters::empty(),
                |_args, ctx| async move {
                    Ok(json!({"id": ctx.operation_id, "budget_ms": ctx.budget.as_millis() as u64}))
                },
            )))
            .register(Arc::new(AgentTool::new(
                "sleepy",
                "Never finishes in time",
                ToolParameters::empty(),
                |_args, _ctx| async move {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(json!(null))
                },
            )))
    }

    fn dispatcher() -> ToolDispatcher {
        let registry = registry();
        let catalog = Arc::new(registry.catalog());
        ToolDispatcher::new(Arc::new(registry), catalog, Duration::from_secs(5))
    }

    fn kind_of(result: &OperationResult) -> Option<OperationErrorKind> {
        match &result.outcome {
            OperationOutcome::Error(e) => Some(e.kind),
            OperationOutcome::Payload(_) => None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failures_stay_inside_their_own_result() {
        let requests = vec![
            OperationRequest::new("1", "echo", json!({"v": 1})),
            OperationRequest::new("2", "boom", json!({})),
            OperationRequest::new("3", "sleepy", json!({})),
            OperationRequest::new("4", "missing", json!({})),
        ];
        let results = dispatcher()
            .dispatch(&requests, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            results.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            vec!["1", "2", "3", "4"]
        );
        assert_eq!(results[0].outcome, OperationOutcome::Payload(json!({"v": 1})));
        assert_eq!(kind_of(&results[1]), Some(OperationErrorKind::Panicked));
        assert_eq!(kind_of(&results[2]), Some(OperationErrorKind::TimedOut));
        assert_eq!(kind_of(&results[3]), Some(OperationErrorKind::UnknownOperation));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_the_batch() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });
        let err = dispatcher()
            .dispatch(&[OperationRequest::new("1", "sleepy", json!({}))], &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolstreamError::Canceled));
    }

    #[tokio::test]
    async fn tools_see_their_id_and_time_budget() {
        let results = dispatcher()
            .dispatch(
                &[OperationRequest::new("op-7", "context", json!({}))],
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(
            results[0].outcome,
            OperationOutcome::Payload(json!({"id": "op-7", "budget_ms": 5000}))
        );
    }

    #[tokio::test]
    async fn empty_batch_yields_no_results() {
        let results = dispatcher()
            .dispatch(&[], &CancellationToken::new())
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
