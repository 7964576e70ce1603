//! The capability catalog: the fixed set of operations offered to the model.
//!
//! A catalog is built once and shared read-only (behind an `Arc`) by every
//! concurrent invocation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{OperationError, OperationErrorKind, OperationRequest};

/// Operation definition sent to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Immutable name → definition map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilityCatalog {
    definitions: BTreeMap<String, ToolDefinition>,
}

impl CapabilityCatalog {
    pub fn new(definitions: impl IntoIterator<Item = ToolDefinition>) -> Self {
        Self {
            definitions: definitions
                .into_iter()
                .map(|definition| (definition.name.clone(), definition))
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.definitions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Definitions in name order.
    pub fn definitions(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.definitions.values()
    }

    /// Check a request against the catalog before it is executed.
    pub fn check(&self, request: &OperationRequest) -> Result<(), OperationError> {
        let Some(definition) = self.get(&request.name) else {
            return Err(OperationError::new(
                OperationErrorKind::UnknownOperation,
                format!("Operation '{}' is not in the capability catalog", request.name),
            ));
        };
        check_arguments(&request.args, &definition.parameters).map_err(|message| {
            OperationError::new(
                OperationErrorKind::InvalidArguments,
                format!("Argument validation failed: {message}"),
            )
        })
    }
}

/// Top-level schema check: object shape, required members, member types.
fn check_arguments(args: &Value, schema: &Value) -> Result<(), String> {
    if schema.get("type").and_then(Value::as_str) == Some("object") && !args.is_object() {
        return Err(format!("expected object arguments, got {}", type_name(args)));
    }
    let Some(members) = args.as_object() else {
        return Ok(());
    };

    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str);
    for field in required {
        if !members.contains_key(field) {
            return Err(format!("missing required field '{field}'"));
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };
    for (key, value) in members {
        let expected = properties
            .get(key)
            .and_then(|property| property.get("type"))
            .and_then(Value::as_str);
        if let Some(expected) = expected {
            if !matches_type(value, expected) {
                return Err(format!(
                    "field '{key}' expected type '{expected}', got {}",
                    type_name(value)
                ));
            }
        }
    }
    Ok(())
}

fn matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolParameters;
    use serde_json::json;

    fn catalog() -> CapabilityCatalog {
        CapabilityCatalog::new([ToolDefinition {
            name: "lookup".to_string(),
            description: "Look something up".to_string(),
            parameters: ToolParameters::object()
                .string("query", "what to look up", true)
                .number("limit", "max results", false)
                .build()
                .schema,
        }])
    }

    #[test]
    fn unknown_operation_is_rejected() {
        let err = catalog()
            .check(&OperationRequest::new("1", "missing", json!({})))
            .unwrap_err();
        assert_eq!(err.kind, OperationErrorKind::UnknownOperation);
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let err = catalog()
            .check(&OperationRequest::new("1", "lookup", json!({ "limit": 3 })))
            .unwrap_err();
        assert_eq!(err.kind, OperationErrorKind::InvalidArguments);
        assert!(err.message.contains("missing required field 'query'"));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let err = catalog()
            .check(&OperationRequest::new("1", "lookup", json!({ "query": "x", "limit": "3" })))
            .unwrap_err();
        assert!(err.message.contains("field 'limit' expected type 'number'"));
    }

    #[test]
    fn unparsed_string_arguments_are_rejected() {
        let err = catalog()
            .check(&OperationRequest::new("1", "lookup", json!("{\"query\":")))
            .unwrap_err();
        assert!(err.message.contains("expected object arguments, got string"));
    }

    #[test]
    fn valid_request_passes() {
        assert!(catalog()
            .check(&OperationRequest::new("1", "lookup", json!({ "query": "x", "limit": 2 })))
            .is_ok());
    }
}
