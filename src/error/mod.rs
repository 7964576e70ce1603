//! Error types for toolstream.

pub mod unified;

pub use unified::{BackendErrorKind, ErrorCategory, RecoverySuggestion};

use thiserror::Error;

/// Primary error type for all orchestration operations.
#[derive(Error, Debug)]
pub enum ToolstreamError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Backend error ({kind}): {message}")]
    Backend {
        kind: BackendErrorKind,
        message: String,
    },

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Canceled")]
    Canceled,
}

impl ToolstreamError {
    /// Create an API error from an HTTP status and body.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a backend error reported inside an open stream.
    pub fn backend(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self::Backend {
            kind,
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::RateLimited { .. } => ErrorCategory::Overloaded,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Stream(_) => ErrorCategory::Network,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 | 529 => ErrorCategory::Overloaded,
                500 | 502..=504 => ErrorCategory::Unavailable,
                _ => ErrorCategory::Request,
            },
            Self::Backend { kind, .. } => match kind {
                BackendErrorKind::Overloaded => ErrorCategory::Overloaded,
                BackendErrorKind::Api => ErrorCategory::Unavailable,
                BackendErrorKind::Authentication | BackendErrorKind::Permission => {
                    ErrorCategory::Authentication
                }
                BackendErrorKind::InvalidRequest | BackendErrorKind::Other => {
                    ErrorCategory::Request
                }
            },
            Self::ToolExecution { .. } => ErrorCategory::ToolExecution,
            Self::Canceled => ErrorCategory::Canceled,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Whether the retry shell may start a fresh attempt after this error.
    ///
    /// The transient set is closed: overload, unavailable/gateway responses,
    /// connection failures and timeouts. Everything else is fatal.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Overloaded
                | ErrorCategory::Unavailable
                | ErrorCategory::Network
                | ErrorCategory::Timeout
        )
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Authentication => RecoverySuggestion::CheckCredentials,
            ErrorCategory::Overloaded
            | ErrorCategory::Unavailable
            | ErrorCategory::Network => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Timeout => RecoverySuggestion::IncreaseTimeout,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::Request | ErrorCategory::Serialization => {
                RecoverySuggestion::FixRequest
            }
            ErrorCategory::ToolExecution => RecoverySuggestion::CheckToolImplementation,
            ErrorCategory::Canceled | ErrorCategory::Unknown => RecoverySuggestion::None,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ToolstreamError>;
