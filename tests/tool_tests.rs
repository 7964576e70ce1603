//! Tests for the tool surface: schemas, arguments, registry execution.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde::Deserialize;
use serde_json::json;

use toolstream::error::ToolstreamError;
use toolstream::tools::*;
use toolstream::types::{OperationErrorKind, OperationRequest};

fn weather_tool() -> AgentTool {
    AgentTool::new(
        "weather",
        "Current weather for a city",
        ToolParameters::object()
            .string("city", "City name", true)
            .string_enum("unit", "Temperature unit", &["c", "f"], false)
            .build(),
        |args, ctx| async move {
            let city = args.get_str("city")?;
            Ok(json!({"city": city, "served": ctx.operation_id}))
        },
    )
}

#[test]
fn parameter_builder_marks_required_members() {
    let params = ToolParameters::object()
        .string("query", "Search query", true)
        .number("limit", "Max results", false)
        .boolean("verbose", "Verbose output", false)
        .build();

    assert_eq!(params.schema["properties"]["limit"]["type"], "number");
    assert_eq!(params.schema["required"], json!(["query"]));
}

#[test]
fn arguments_give_typed_access() {
    let args = ToolArguments::new(json!({"name": "Ada", "age": 36, "ok": true, "ratio": 0.5}));
    assert_eq!(args.get_str("name").unwrap(), "Ada");
    assert_eq!(args.get_i64("age").unwrap(), 36);
    assert!(args.get_bool("ok").unwrap());
    assert_eq!(args.get_f64("ratio").unwrap(), 0.5);
    assert_eq!(args.get_str_opt("missing"), None);

    let err = args.get_str("missing").unwrap_err();
    assert!(matches!(err, ToolstreamError::InvalidArgument(_)));
}

#[test]
fn unparsed_argument_text_is_deserialized_once_more() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct Query {
        q: String,
    }

    let args = ToolArguments::new(json!(" {\"q\": \"fever\"} "));
    assert_eq!(args.deserialize::<Query>().unwrap(), Query { q: "fever".into() });

    let broken = ToolArguments::new(json!("{\"q\": "));
    assert!(broken.deserialize::<Query>().is_err());
}

#[tokio::test]
async fn registry_runs_registered_tools_and_rejects_unknown_names() {
    let registry = ToolRegistry::with_tools([Arc::new(weather_tool()) as Arc<dyn Tool>]);
    assert_eq!(registry.names(), vec!["weather"]);

    let ctx = ToolExecutionContext {
        operation_id: "op-1".into(),
        ..Default::default()
    };
    let value = registry
        .execute("weather", &ToolArguments::new(json!({"city": "Lima"})), &ctx)
        .await
        .unwrap();
    assert_eq!(value, json!({"city": "Lima", "served": "op-1"}));

    let err = registry
        .execute("forecast", &ToolArguments::new(json!({})), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, ToolstreamError::ToolExecution { .. }));
}

#[test]
fn tool_definition_is_the_catalog_entry() {
    let tool = weather_tool();
    assert_eq!(tool.name(), "weather");
    assert_eq!(tool.definition().parameters["required"], json!(["city"]));

    let catalog = ToolRegistry::new().register(Arc::new(weather_tool())).catalog();
    assert_eq!(catalog.get("weather"), Some(tool.definition()));
}

#[test]
fn registry_catalog_checks_requests() {
    let registry = ToolRegistry::new().register(Arc::new(weather_tool()));
    let catalog = registry.catalog();
    assert_eq!(catalog.len(), 1);

    let ok = OperationRequest::new("t1", "weather", json!({"city": "Oslo", "unit": "c"}));
    assert!(catalog.check(&ok).is_ok());

    let missing = OperationRequest::new("t2", "weather", json!({"unit": "c"}));
    assert_eq!(
        catalog.check(&missing).unwrap_err().kind,
        OperationErrorKind::InvalidArguments
    );

    let unknown = OperationRequest::new("t3", "forecast", json!({}));
    assert_eq!(
        catalog.check(&unknown).unwrap_err().kind,
        OperationErrorKind::UnknownOperation
    );
}
