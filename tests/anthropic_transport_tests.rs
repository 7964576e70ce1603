//! Anthropic transport tests against a mock Messages endpoint.

#![cfg(feature = "anthropic")]

mod common;

use std::sync::Arc;

use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use toolstream::config::AnthropicConfig;
use toolstream::error::{BackendErrorKind, ToolstreamError};
use toolstream::orchestrator::{OrchestrationRequest, Orchestrator};
use toolstream::provider::{AnthropicProvider, RoundRequest, RoundStreamProvider};
use toolstream::tools::CapabilityCatalog;
use toolstream::types::{
    GenerationSettings, SegmentHeader, SegmentKind, Severity, StopReason, StreamSignal, Turn,
};

use common::{fast_config, lookup_registry};

fn sse(events: &[serde_json::Value]) -> String {
    events
        .iter()
        .map(|event| {
            let name = event["type"].as_str().unwrap_or("message");
            format!("event: {name}\ndata: {event}\n\n")
        })
        .collect()
}

fn text_round(text: &str) -> String {
    sse(&[
        json!({"type": "message_start", "message": {"usage": {"input_tokens": 5, "output_tokens": 1}}}),
        json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
        json!({"type": "ping"}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": text}}),
        json!({"type": "content_block_stop", "index": 0}),
        json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}, "usage": {"output_tokens": 9}}),
        json!({"type": "message_stop"}),
    ])
}

fn provider(server: &MockServer) -> AnthropicProvider {
    AnthropicProvider::new(AnthropicConfig::new("test-key").with_base_url(server.uri()))
}

fn round_request() -> RoundRequest {
    RoundRequest {
        system: None,
        turns: vec![Turn::user("hello")],
        catalog: Arc::new(CapabilityCatalog::empty()),
        settings: GenerationSettings::default(),
    }
}

fn event_stream(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

#[tokio::test]
async fn streams_signals_from_sse_events() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(event_stream(text_round("Hi there")))
        .expect(1)
        .mount(&server)
        .await;

    let stream = provider(&server)
        .open_round_stream(&round_request())
        .await
        .unwrap();
    let signals: Vec<StreamSignal> = stream.map(|s| s.unwrap()).collect().await;

    assert_eq!(signals.len(), 4);
    assert_eq!(signals[0], StreamSignal::start(SegmentHeader::Text));
    assert_eq!(signals[1], StreamSignal::delta(SegmentKind::Text, "Hi there"));
    assert_eq!(signals[2], StreamSignal::end(SegmentKind::Text));
    match &signals[3] {
        StreamSignal::RoundEnd {
            stop_reason,
            usage: Some(usage),
        } => {
            assert_eq!(*stop_reason, StopReason::EndTurn);
            assert_eq!(usage.input_tokens, 5);
            assert_eq!(usage.output_tokens, 9);
        }
        other => panic!("expected round end, got {other:?}"),
    }
}

#[tokio::test]
async fn overloaded_status_is_transient_and_bad_request_is_not() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(529).set_body_json(json!({
            "type": "error",
            "error": {"type": "overloaded_error", "message": "Overloaded"}
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "type": "error",
            "error": {"type": "invalid_request_error", "message": "max_tokens too large"}
        })))
        .mount(&server)
        .await;

    let provider = provider(&server);
    let overloaded = provider
        .open_round_stream(&round_request())
        .await
        .err()
        .unwrap();
    assert!(matches!(overloaded, ToolstreamError::Api { status: 529, .. }));
    assert!(overloaded.is_transient());

    let bad = provider
        .open_round_stream(&round_request())
        .await
        .err()
        .unwrap();
    assert_eq!(bad.to_string(), "API error (status 400): max_tokens too large");
    assert!(!bad.is_transient());
}

#[tokio::test]
async fn mid_stream_error_event_ends_the_stream() {
    let server = MockServer::start().await;
    let body = sse(&[
        json!({"type": "message_start", "message": {"usage": {"input_tokens": 5}}}),
        json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
        json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "late"}}),
    ]);
    Mock::given(method("POST"))
        .respond_with(event_stream(body))
        .mount(&server)
        .await;

    let items: Vec<_> = provider(&server)
        .open_round_stream(&round_request())
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(items.len(), 2);
    match &items[1] {
        Err(ToolstreamError::Backend { kind, .. }) => {
            assert_eq!(*kind, BackendErrorKind::Overloaded)
        }
        other => panic!("expected backend error, got {other:?}"),
    }
}

#[tokio::test]
async fn orchestrates_a_tool_round_over_http() {
    let server = MockServer::start().await;
    let tool_round = sse(&[
        json!({"type": "message_start", "message": {"usage": {"input_tokens": 20}}}),
        json!({"type": "content_block_start", "index": 0, "content_block": {"type": "tool_use", "id": "toolu_1", "name": "lookupA", "input": {}}}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "input_json_delta", "partial_json": "{\"city\": "}}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "input_json_delta", "partial_json": "\"Oslo\"}"}}),
        json!({"type": "content_block_stop", "index": 0}),
        json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"}, "usage": {"output_tokens": 12}}),
        json!({"type": "message_stop"}),
    ]);
    let final_round = text_round(r#"{"severity": "urgent", "go_to": "Oslo ER"}"#);

    Mock::given(method("POST"))
        .respond_with(event_stream(tool_round))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(event_stream(final_round))
        .mount(&server)
        .await;

    let registry = lookup_registry();
    let catalog = Arc::new(registry.catalog());
    let orchestrator = Orchestrator::new(Arc::new(provider(&server)), Arc::new(registry), catalog)
        .with_config(fast_config());

    let run = orchestrator
        .run(OrchestrationRequest::new("chest pain"), CancellationToken::new())
        .await
        .into_result()
        .unwrap();
    assert_eq!(run.rounds, 2);
    assert_eq!(run.result.severity, Severity::Urgent);
    assert_eq!(run.result.go_to, "Oslo ER");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let body: serde_json::Value = requests[1].body_json().unwrap();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1]["content"][0]["input"], json!({"city": "Oslo"}));
    assert_eq!(messages[2]["content"][0]["tool_use_id"], "toolu_1");
    assert_eq!(body["tools"].as_array().unwrap().len(), 2);
}
