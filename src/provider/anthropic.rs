//! Anthropic Messages API stream transport.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::AnthropicConfig;
use crate::error::{BackendErrorKind, ToolstreamError};
use crate::types::{
    ContentSegment, SegmentHeader, SegmentKind, SignalStream, StopReason, StreamSignal, Turn,
    Usage,
};

use super::http::{
    anthropic_headers, parse_sse_data, shared_client, status_to_error, SseLineBuffer,
};
use super::{RoundRequest, RoundStreamProvider};

const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Beta flag needed for reasoning blocks interleaved with tool use.
const INTERLEAVED_THINKING: &str = "interleaved-thinking-2025-05-14";

pub struct AnthropicProvider {
    config: AnthropicConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicConfig) -> Self {
        Self { config }
    }

    /// Build from `ANTHROPIC_API_KEY` / `ANTHROPIC_BASE_URL`.
    pub fn from_env() -> Result<Self, ToolstreamError> {
        AnthropicConfig::from_env().map(Self::new)
    }

    fn build_request_body(&self, request: &RoundRequest) -> Value {
        let settings = &request.settings;
        let thinking_budget = settings.reasoning_budget_tokens;

        let max_tokens = match thinking_budget {
            Some(budget) => settings
                .max_tokens
                .unwrap_or(DEFAULT_MAX_TOKENS)
                .max(budget + DEFAULT_MAX_TOKENS),
            None => settings.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        };

        let mut body = json!({
            "model": settings.model.as_deref().unwrap_or(&self.config.model),
            "messages": build_messages(&request.turns),
            "max_tokens": max_tokens,
            "stream": true,
        });

        let Some(obj) = body.as_object_mut() else {
            return body;
        };

        if let Some(system) = request.system.as_deref().filter(|s| !s.is_empty()) {
            obj.insert("system".into(), system.into());
        }
        match thinking_budget {
            Some(budget) => {
                obj.insert(
                    "thinking".into(),
                    json!({"type": "enabled", "budget_tokens": budget}),
                );
            }
            // Temperature is rejected while thinking is enabled.
            None => {
                if let Some(temp) = settings.temperature {
                    obj.insert("temperature".into(), temp.into());
                }
            }
        }
        if let Some(ref stops) = settings.stop_sequences {
            obj.insert("stop_sequences".into(), json!(stops));
        }

        if !request.catalog.is_empty() {
            let tools: Vec<Value> = request
                .catalog
                .definitions()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.parameters,
                    })
                })
                .collect();
            obj.insert("tools".into(), tools.into());
        }

        body
    }
}

/// Map turns to Messages API entries. Reasoning segments carry no signature
/// here, so they are left out of the replayed history.
fn build_messages(turns: &[Turn]) -> Vec<Value> {
    let mut messages = Vec::with_capacity(turns.len());
    for turn in turns {
        match turn {
            Turn::User { text, .. } => {
                messages.push(json!({"role": "user", "content": text}));
            }
            Turn::Model { segments } => {
                let content: Vec<Value> = segments
                    .iter()
                    .filter_map(|segment| match segment {
                        ContentSegment::Text { text } if !text.is_empty() => {
                            Some(json!({"type": "text", "text": text}))
                        }
                        ContentSegment::ToolInvocation(request) => Some(json!({
                            "type": "tool_use",
                            "id": request.id,
                            "name": request.name,
                            "input": request.args,
                        })),
                        _ => None,
                    })
                    .collect();
                if !content.is_empty() {
                    messages.push(json!({"role": "assistant", "content": content}));
                }
            }
            Turn::OperationResults { results } => {
                let content: Vec<Value> = results
                    .iter()
                    .map(|result| {
                        json!({
                            "type": "tool_result",
                            "tool_use_id": result.id,
                            "content": result.content().to_string(),
                            "is_error": result.is_error(),
                        })
                    })
                    .collect();
                messages.push(json!({"role": "user", "content": content}));
            }
        }
    }
    messages
}

/// Translates decoded SSE events into stream signals.
#[derive(Debug, Default)]
pub(crate) struct SignalTranslator {
    open: Option<SegmentKind>,
    stop_reason: Option<StopReason>,
    usage: Usage,
    saw_usage: bool,
}

impl SignalTranslator {
    pub(crate) fn translate(
        &mut self,
        event: &Value,
    ) -> Vec<Result<StreamSignal, ToolstreamError>> {
        let event_type = event.get("type").and_then(Value::as_str).unwrap_or("");
        match event_type {
            "message_start" => {
                if let Some(usage) = event.get("message").and_then(|m| m.get("usage")) {
                    self.record_usage(usage);
                }
                Vec::new()
            }
            "content_block_start" => {
                let Some(block) = event.get("content_block") else {
                    return Vec::new();
                };
                let header = match block.get("type").and_then(Value::as_str) {
                    Some("text") => SegmentHeader::Text,
                    Some("thinking") | Some("redacted_thinking") => SegmentHeader::Reasoning,
                    Some("tool_use") => SegmentHeader::ToolInvocation {
                        id: str_field(block, "id"),
                        name: str_field(block, "name"),
                    },
                    other => {
                        debug!(block_type = ?other, "ignoring unknown content block");
                        return Vec::new();
                    }
                };
                let kind = header.kind();
                self.open = Some(kind);
                let mut signals = vec![Ok(StreamSignal::start(header))];
                if let Some(text) = block.get("text").and_then(Value::as_str) {
                    if !text.is_empty() {
                        signals.push(Ok(StreamSignal::delta(kind, text)));
                    }
                }
                signals
            }
            "content_block_delta" => {
                let Some(delta) = event.get("delta") else {
                    return Vec::new();
                };
                let (kind, field) = match delta.get("type").and_then(Value::as_str) {
                    Some("text_delta") => (SegmentKind::Text, "text"),
                    Some("thinking_delta") => (SegmentKind::Reasoning, "thinking"),
                    Some("input_json_delta") => (SegmentKind::ToolInvocation, "partial_json"),
                    _ => return Vec::new(),
                };
                match delta.get(field).and_then(Value::as_str) {
                    Some(fragment) if !fragment.is_empty() => {
                        vec![Ok(StreamSignal::delta(kind, fragment))]
                    }
                    _ => Vec::new(),
                }
            }
            "content_block_stop" => match self.open.take() {
                Some(kind) => vec![Ok(StreamSignal::end(kind))],
                None => Vec::new(),
            },
            "message_delta" => {
                if let Some(reason) = event
                    .get("delta")
                    .and_then(|d| d.get("stop_reason"))
                    .and_then(Value::as_str)
                {
                    self.stop_reason = Some(StopReason::from_wire(reason));
                }
                if let Some(usage) = event.get("usage") {
                    self.record_usage(usage);
                }
                Vec::new()
            }
            "message_stop" => {
                let usage = self.saw_usage.then(|| self.usage.clone());
                vec![Ok(StreamSignal::RoundEnd {
                    stop_reason: self.stop_reason.take().unwrap_or(StopReason::EndTurn),
                    usage,
                })]
            }
            "error" => {
                let error = event.get("error");
                let kind = error
                    .and_then(|e| e.get("type"))
                    .and_then(Value::as_str)
                    .map(BackendErrorKind::from_wire)
                    .unwrap_or(BackendErrorKind::Other);
                let message = error
                    .and_then(|e| e.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or("stream error");
                vec![Err(ToolstreamError::backend(kind, message))]
            }
            _ => Vec::new(),
        }
    }

    fn record_usage(&mut self, usage: &Value) {
        let field = |name: &str| usage.get(name).and_then(Value::as_u64).map(|v| v as u32);
        if let Some(input) = field("input_tokens") {
            self.usage.input_tokens = input;
            self.saw_usage = true;
        }
        if let Some(output) = field("output_tokens") {
            self.usage.output_tokens = output;
            self.saw_usage = true;
        }
        if let Some(read) = field("cache_read_input_tokens") {
            self.usage.cache_read_tokens = Some(read);
        }
        if let Some(created) = field("cache_creation_input_tokens") {
            self.usage.cache_creation_tokens = Some(created);
        }
    }
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl RoundStreamProvider for AnthropicProvider {
    fn provider_name(&self) -> &str {
        "anthropic"
    }

    async fn open_round_stream(
        &self,
        request: &RoundRequest,
    ) -> Result<SignalStream, ToolstreamError> {
        let body = self.build_request_body(request);
        let url = format!("{}/messages", self.config.base_url.trim_end_matches('/'));
        let beta = request
            .settings
            .reasoning_budget_tokens
            .map(|_| INTERLEAVED_THINKING);

        debug!(model = %body["model"], turns = request.turns.len(), "Anthropic open_round_stream");

        let resp = shared_client()
            .post(&url)
            .headers(anthropic_headers(&self.config.api_key, API_VERSION, beta))
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let byte_stream = resp.bytes_stream();

        let stream = async_stream::stream! {
            let mut lines = SseLineBuffer::default();
            let mut translator = SignalTranslator::default();
            futures::pin_mut!(byte_stream);

            'read: while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(ToolstreamError::Network(e));
                        break;
                    }
                };

                for line in lines.push(&chunk) {
                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }
                    let Some(data) = parse_sse_data(&line) else {
                        continue;
                    };
                    let event = match serde_json::from_str::<Value>(data) {
                        Ok(event) => event,
                        Err(e) => {
                            debug!(error = %e, "skipping undecodable SSE payload");
                            continue;
                        }
                    };
                    for signal in translator.translate(&event) {
                        let fatal = signal.is_err();
                        yield signal;
                        if fatal {
                            break 'read;
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
