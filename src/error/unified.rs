//! Error classification and recovery.

use serde::{Deserialize, Serialize};
use strum::Display;

/// Error type reported by the backend inside an already-open stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BackendErrorKind {
    Overloaded,
    Api,
    Authentication,
    Permission,
    InvalidRequest,
    Other,
}

impl BackendErrorKind {
    /// Map a wire error type (e.g. `overloaded_error`) to a kind.
    pub fn from_wire(error_type: &str) -> Self {
        match error_type {
            "overloaded_error" => Self::Overloaded,
            "api_error" => Self::Api,
            "authentication_error" => Self::Authentication,
            "permission_error" => Self::Permission,
            "invalid_request_error" | "not_found_error" | "request_too_large" => {
                Self::InvalidRequest
            }
            _ => Self::Other,
        }
    }
}

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    Overloaded,
    Unavailable,
    Network,
    Timeout,
    Request,
    Configuration,
    Serialization,
    ToolExecution,
    Canceled,
    Unknown,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    RetryWithBackoff,
    CheckCredentials,
    CheckConfiguration,
    IncreaseTimeout,
    FixRequest,
    CheckToolImplementation,
    None,
}
