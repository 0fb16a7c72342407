//! ClaudeApiProvider - Anthropic Messages API implementation of
//! `GenerationProvider`.
//!
//! Structured output is obtained by forcing a single tool call: the tool's
//! input schema is the requested schema and the tool input is the result.
//! Streaming reads the `input_json_delta` fragments of that tool call.
//! Key priority: secret.json > `ANTHROPIC_API_KEY`.

use crate::sse::{SseDecoder, SseFrame};
use async_trait::async_trait;
use futures::{Stream, StreamExt, stream};
use reqwest::{Client, StatusCode, header::HeaderValue};
use saga_core::config::{GenerationConfig, SecretConfig};
use saga_core::generation::{GenerationProvider, GenerationStream, StreamEvent, StructuredRequest};
use saga_core::{Result, SagaError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt::Display;
use std::time::Duration;

const BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Provider that talks to the Claude HTTP API.
#[derive(Clone)]
pub struct ClaudeApiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl ClaudeApiProvider {
    /// Creates a provider with the given key and model.
    ///
    /// # Errors
    ///
    /// Returns `SagaError::Configuration` if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| SagaError::configuration(format!("Failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: BASE_URL.to_string(),
        })
    }

    /// Resolves credentials and model from configuration.
    ///
    /// Priority:
    /// 1. `anthropic.api_key` in secret.json
    /// 2. `env_api_key` (the caller passes `ANTHROPIC_API_KEY`)
    ///
    /// The model comes from `anthropic.model_name` when set, otherwise from
    /// `[generation] model`.
    ///
    /// # Errors
    ///
    /// Returns `SagaError::Configuration` when no key is available.
    pub fn from_config(
        secrets: &SecretConfig,
        generation: &GenerationConfig,
        env_api_key: Option<String>,
    ) -> Result<Self> {
        let configured = secrets
            .anthropic
            .as_ref()
            .filter(|anthropic| !anthropic.api_key.trim().is_empty());

        let api_key = match (configured, env_api_key) {
            (Some(anthropic), _) => anthropic.api_key.clone(),
            (None, Some(key)) if !key.trim().is_empty() => key,
            _ => {
                return Err(SagaError::configuration(
                    "ANTHROPIC_API_KEY not found in secret.json or environment variables",
                ));
            }
        };
        let model = configured
            .and_then(|anthropic| anthropic.model_name.clone())
            .unwrap_or_else(|| generation.model.clone());

        Self::new(
            api_key,
            model,
            Duration::from_secs(generation.request_timeout_secs),
        )
    }

    /// Overrides the endpoint (used for proxies and tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, request: StructuredRequest, stream: bool) -> CreateMessageRequest {
        CreateMessageRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            system: Some(request.system).filter(|system| !system.trim().is_empty()),
            messages: vec![Message {
                role: "user",
                content: vec![ContentBlock::Text {
                    text: request.prompt,
                }],
            }],
            tool_choice: ToolChoice {
                r#type: "tool",
                name: request.tool_name.clone(),
            },
            tools: vec![Tool {
                name: request.tool_name,
                description: request.tool_description,
                input_schema: request.schema,
            }],
            stream,
        }
    }

    async fn send_request(&self, body: &CreateMessageRequest) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|err| SagaError::upstream(format!("Claude API request failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read Claude error body".to_string());
            return Err(map_http_error(status, body_text, retry_after));
        }

        Ok(response)
    }
}

#[async_trait]
impl GenerationProvider for ClaudeApiProvider {
    async fn generate_structured(&self, request: StructuredRequest) -> Result<Value> {
        let tool_name = request.tool_name.clone();
        let body = self.build_request(request, false);
        let response = self.send_request(&body).await?;

        let parsed: CreateMessageResponse = response
            .json()
            .await
            .map_err(|err| SagaError::upstream(format!("Failed to parse Claude response: {err}")))?;

        extract_tool_input(parsed, &tool_name)
    }

    async fn stream_structured(&self, request: StructuredRequest) -> Result<GenerationStream> {
        let body = self.build_request(request, true);
        let response = self.send_request(&body).await?;
        tracing::debug!("[ClaudeApiProvider] stream opened (model: {})", self.model);
        Ok(tool_input_stream(Box::pin(response.bytes_stream())))
    }
}

// ============================================================================
// Streaming
// ============================================================================

struct ToolStreamState<S> {
    body: S,
    sse: SseDecoder,
    queue: VecDeque<Result<StreamEvent>>,
    /// Index of the tool_use content block
    tool_block: Option<usize>,
    accumulated: String,
    completed: bool,
    body_done: bool,
}

impl<S> ToolStreamState<S> {
    fn handle_frame(&mut self, frame: SseFrame) {
        if self.completed {
            return;
        }
        let event: StreamPayload = match serde_json::from_str(&frame.data) {
            Ok(event) => event,
            Err(err) => {
                tracing::debug!("[ClaudeApiProvider] skipping unparseable event: {}", err);
                return;
            }
        };

        match event {
            StreamPayload::ContentBlockStart {
                index,
                content_block: BlockStart::ToolUse,
            } => self.tool_block = Some(index),
            StreamPayload::ContentBlockDelta {
                index,
                delta: BlockDelta::InputJson { partial_json },
            } if self.tool_block.is_none_or(|tool| tool == index) => {
                if !partial_json.is_empty() {
                    self.accumulated.push_str(&partial_json);
                    self.queue.push_back(Ok(StreamEvent::Delta(partial_json)));
                }
            }
            StreamPayload::MessageStop => self.complete(),
            StreamPayload::Error { error } => {
                self.completed = true;
                self.queue
                    .push_back(Err(SagaError::upstream(format!("Claude stream error: {}", error.message))));
            }
            _ => {}
        }
    }

    fn complete(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        let result = if self.accumulated.trim().is_empty() {
            None
        } else {
            serde_json::from_str::<Value>(&self.accumulated)
                .inspect_err(|err| {
                    tracing::warn!("[ClaudeApiProvider] tool input did not parse: {}", err)
                })
                .ok()
        };
        self.queue.push_back(Ok(StreamEvent::Completed(result)));
    }
}

/// Turns a raw Messages API SSE body into a `GenerationStream`.
///
/// Emits one `Delta` per non-empty `input_json_delta`, then one `Completed`
/// on `message_stop` or at end of body, whichever comes first.
pub fn tool_input_stream<S, B, E>(body: S) -> GenerationStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = ToolStreamState {
        body,
        sse: SseDecoder::new(),
        queue: VecDeque::new(),
        tool_block: None,
        accumulated: String::new(),
        completed: false,
        body_done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.queue.pop_front() {
                return Some((item, state));
            }
            if state.body_done {
                return None;
            }
            match state.body.next().await {
                Some(Ok(bytes)) => {
                    for frame in state.sse.push(bytes.as_ref()) {
                        state.handle_frame(frame);
                    }
                }
                Some(Err(err)) => {
                    state.body_done = true;
                    if !state.completed {
                        state.completed = true;
                        state
                            .queue
                            .push_back(Err(SagaError::upstream(format!("Claude stream interrupted: {err}"))));
                    }
                }
                None => {
                    state.body_done = true;
                    if let Some(frame) = state.sse.finish() {
                        state.handle_frame(frame);
                    }
                    state.complete();
                }
            }
        }
    })
    .boxed()
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct CreateMessageRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
    tools: Vec<Tool>,
    tool_choice: ToolChoice,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
}

#[derive(Serialize)]
struct Tool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Serialize)]
struct ToolChoice {
    r#type: &'static str,
    name: String,
}

#[derive(Deserialize)]
struct CreateMessageResponse {
    content: Vec<ContentBlockResponse>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlockResponse {
    ToolUse { name: String, input: Value },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamPayload {
    ContentBlockStart {
        index: usize,
        content_block: BlockStart,
    },
    ContentBlockDelta {
        index: usize,
        delta: BlockDelta,
    },
    MessageStop,
    Error {
        error: ErrorBody,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockStart {
    ToolUse,
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum BlockDelta {
    #[serde(rename = "input_json_delta")]
    InputJson { partial_json: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn extract_tool_input(response: CreateMessageResponse, tool_name: &str) -> Result<Value> {
    response
        .content
        .into_iter()
        .find_map(|block| match block {
            ContentBlockResponse::ToolUse { name, input } if name == tool_name => Some(input),
            _ => None,
        })
        .ok_or_else(|| SagaError::upstream("Claude API returned no tool use in the response content"))
}

fn map_http_error(status: StatusCode, body: String, retry_after: Option<Duration>) -> SagaError {
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or(body);

    let is_retryable = matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    );
    if is_retryable {
        tracing::warn!(
            "[ClaudeApiProvider] transient {} (retry after: {:?})",
            status.as_u16(),
            retry_after
        );
    }

    SagaError::upstream(format!("Claude API returned {}: {}", status.as_u16(), message))
}

fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let value = header?.to_str().ok()?;
    value.parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use saga_core::config::AnthropicConfig;

    fn sse(events: &[&str]) -> Vec<std::result::Result<Vec<u8>, String>> {
        events
            .iter()
            .map(|data| Ok(format!("event: x\ndata: {data}\n\n").into_bytes()))
            .collect()
    }

    async fn collect(chunks: Vec<std::result::Result<Vec<u8>, String>>) -> Vec<Result<StreamEvent>> {
        tool_input_stream(stream::iter(chunks)).collect().await
    }

    #[tokio::test]
    async fn test_stream_yields_deltas_then_completed() {
        let events = collect(sse(&[
            r#"{"type":"message_start","message":{}}"#,
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"tool_use","id":"t","name":"narrate_turn","input":{}}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{\"headline\": \"W"}}"#,
            r#"{"type":"ping"}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"ar\"}"}}"#,
            r#"{"type":"content_block_stop","index":0}"#,
            r#"{"type":"message_stop"}"#,
        ]))
        .await;

        let events: Vec<StreamEvent> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(
            events,
            vec![
                StreamEvent::Delta("{\"headline\": \"W".into()),
                StreamEvent::Delta("ar\"}".into()),
                StreamEvent::Completed(Some(serde_json::json!({"headline": "War"}))),
            ]
        );
    }

    #[tokio::test]
    async fn test_truncated_stream_completes_with_none() {
        let events = collect(sse(&[
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"tool_use","id":"t","name":"n","input":{}}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{\"headline\": \"W"}}"#,
        ]))
        .await;
        assert!(matches!(
            events.last(),
            Some(Ok(StreamEvent::Completed(None)))
        ));
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let mut chunks = sse(&[
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{"}}"#,
        ]);
        chunks.push(Err("connection reset".into()));
        let events = collect(chunks).await;
        assert_eq!(events.len(), 2);
        assert!(events[1].as_ref().unwrap_err().is_upstream());
    }

    #[tokio::test]
    async fn test_error_event_is_upstream_failure() {
        let events = collect(sse(&[
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        ]))
        .await;
        assert_eq!(events.len(), 1);
        let err = events[0].as_ref().unwrap_err();
        assert!(err.to_string().contains("Overloaded"));
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        let err = ClaudeApiProvider::from_config(&SecretConfig::default(), &GenerationConfig::default(), None)
            .err()
            .unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_secret_file_takes_priority() {
        let secrets = SecretConfig {
            anthropic: Some(AnthropicConfig {
                api_key: "from-file".into(),
                model_name: Some("claude-custom".into()),
            }),
        };
        let provider =
            ClaudeApiProvider::from_config(&secrets, &GenerationConfig::default(), Some("from-env".into()))
                .unwrap();
        assert_eq!(provider.api_key, "from-file");
        assert_eq!(provider.model(), "claude-custom");

        let provider =
            ClaudeApiProvider::from_config(&SecretConfig::default(), &GenerationConfig::default(), Some("from-env".into()))
                .unwrap();
        assert_eq!(provider.api_key, "from-env");
        assert_eq!(provider.model(), "claude-haiku-4-5");
    }

    #[test]
    fn test_request_forces_tool_call() {
        let provider = ClaudeApiProvider::new("k", "m", Duration::from_secs(5)).unwrap();
        let body = provider.build_request(
            StructuredRequest {
                system: String::new(),
                prompt: "p".into(),
                tool_name: "take_action".into(),
                tool_description: "d".into(),
                schema: serde_json::json!({"type": "object"}),
                max_tokens: 500,
            },
            false,
        );
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["tool_choice"], serde_json::json!({"type": "tool", "name": "take_action"}));
        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
        assert!(json.get("system").is_none());
        assert!(json.get("stream").is_none());
    }

    #[test]
    fn test_http_error_message_extracted() {
        let err = map_http_error(
            StatusCode::BAD_REQUEST,
            r#"{"type":"error","error":{"type":"invalid_request_error","message":"bad schema"}}"#.into(),
            None,
        );
        assert_eq!(err.to_string(), "Upstream generation error: Claude API returned 400: bad schema");
    }
}
