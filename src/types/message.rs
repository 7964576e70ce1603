//! Conversation turns and operation request/result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::segment::ContentSegment;

/// A side-effect operation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRequest {
    pub id: String,
    pub name: String,
    pub args: serde_json::Value,
}

impl OperationRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }
}

/// Why an operation did not produce a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OperationErrorKind {
    Failed,
    Panicked,
    TimedOut,
    UnknownOperation,
    InvalidArguments,
}

/// Structured error payload fed back to the model in place of a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationError {
    pub kind: OperationErrorKind,
    pub message: String,
}

impl OperationError {
    pub fn new(kind: OperationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Payload or error of a resolved operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationOutcome {
    Payload(serde_json::Value),
    Error(OperationError),
}

/// The resolved result of one operation request, correlated by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub outcome: OperationOutcome,
}

impl OperationResult {
    pub fn payload(request: &OperationRequest, payload: serde_json::Value) -> Self {
        Self {
            id: request.id.clone(),
            name: request.name.clone(),
            outcome: OperationOutcome::Payload(payload),
        }
    }

    pub fn error(request: &OperationRequest, error: OperationError) -> Self {
        Self {
            id: request.id.clone(),
            name: request.name.clone(),
            outcome: OperationOutcome::Error(error),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, OperationOutcome::Error(_))
    }

    /// JSON body handed back to the model.
    pub fn content(&self) -> serde_json::Value {
        match &self.outcome {
            OperationOutcome::Payload(value) => value.clone(),
            OperationOutcome::Error(error) => serde_json::json!({
                "error": error.message,
                "kind": error.kind,
            }),
        }
    }
}

/// One entry of the orchestration history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    User {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
    },
    Model {
        segments: Vec<ContentSegment>,
    },
    OperationResults {
        results: Vec<OperationResult>,
    },
}

impl Turn {
    /// Create a user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self::User {
            text: text.into(),
            timestamp: Some(Utc::now()),
        }
    }

    /// Create a model turn holding a single text segment.
    pub fn model_text(text: impl Into<String>) -> Self {
        Self::Model {
            segments: vec![ContentSegment::Text { text: text.into() }],
        }
    }
}
