//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::ToolstreamError;

/// Wrap a fallible future with a timeout. Elapsing maps to
/// [`ToolstreamError::Timeout`], which the retry shell treats as transient.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, ToolstreamError>>,
) -> Result<T, ToolstreamError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(ToolstreamError::Timeout(duration.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn elapsed_future_becomes_timeout_error() {
        let result: Result<(), _> = with_timeout(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(ToolstreamError::Timeout(50))));
    }

    #[tokio::test]
    async fn inner_error_passes_through() {
        let result: Result<(), _> = with_timeout(Duration::from_secs(1), async {
            Err(ToolstreamError::Authentication("no".into()))
        })
        .await;
        assert!(matches!(result, Err(ToolstreamError::Authentication(_))));
    }
}
