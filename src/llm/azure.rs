//! Azure OpenAI chat completion adapter.
//!
//! Streams chat completions from an Azure OpenAI deployment over SSE and
//! normalizes the chunks into plain text fragments. Authentication uses the
//! `api-key` header; the deployment name takes the place of a model id.

use std::collections::VecDeque;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tracing::debug;

use crate::error::{CarelineError, Result};
use crate::llm::sse::SseDecoder;
use crate::llm::{ChatCompletion, ChatMessage, CompletionStream, RequestOptions};

/// API version sent with every request.
const DEFAULT_API_VERSION: &str = "2024-06-01";

/// Configuration for [`AzureChatClient`].
#[derive(Debug, Clone)]
pub struct AzureChatConfig {
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`.
    pub endpoint: String,
    /// Deployment name of the chat model.
    pub deployment: String,
    /// API version query parameter.
    pub api_version: String,
    /// API key for the `api-key` header.
    pub api_key: String,
}

impl AzureChatConfig {
    /// Create a config with the default API version.
    pub fn new(
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            deployment: deployment.into(),
            api_version: DEFAULT_API_VERSION.to_owned(),
            api_key: api_key.into(),
        }
    }

    /// Override the API version.
    #[must_use]
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// The chat completions URL for this deployment.
    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment,
            self.api_version,
        )
    }
}

/// Streaming chat client for an Azure OpenAI deployment.
pub struct AzureChatClient {
    config: AzureChatConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for AzureChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureChatClient")
            .field("endpoint", &self.config.endpoint)
            .field("deployment", &self.config.deployment)
            .field("api_version", &self.config.api_version)
            .finish()
    }
}

impl AzureChatClient {
    /// Create a new client with the given configuration.
    #[must_use]
    pub fn new(config: AzureChatConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Build the JSON request body.
    fn build_body(&self, messages: &[ChatMessage], options: &RequestOptions) -> serde_json::Value {
        let mut body = serde_json::json!({
            "messages": messages,
            "stream": true,
        });
        if let Some(obj) = body.as_object_mut() {
            if let Some(max_tokens) = options.max_tokens {
                obj.insert("max_tokens".into(), serde_json::json!(max_tokens));
            }
            if let Some(temperature) = options.temperature {
                obj.insert("temperature".into(), serde_json::json!(temperature));
            }
        }
        body
    }
}

#[async_trait]
impl ChatCompletion for AzureChatClient {
    fn name(&self) -> &str {
        "azure-openai"
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &RequestOptions,
    ) -> Result<CompletionStream> {
        let url = self.config.completions_url();
        let body = self.build_body(messages, options);

        debug!(
            deployment = %self.config.deployment,
            messages = messages.len(),
            "requesting chat completion"
        );

        let response = self
            .client
            .post(&url)
            .header("api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CarelineError::Generation(format!("chat request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(CarelineError::Generation(format!(
                "chat endpoint returned {}: {}",
                status.as_u16(),
                error_message(&body_text),
            )));
        }

        Ok(Box::pin(fragment_stream(response.bytes_stream())))
    }
}

/// Extract the text delta from one streamed completion chunk, if any.
fn delta_text(data: &str) -> Option<String> {
    let parsed: serde_json::Value = serde_json::from_str(data).ok()?;
    let text = parsed
        .get("choices")?
        .as_array()?
        .first()?
        .get("delta")?
        .get("content")?
        .as_str()?;
    if text.is_empty() {
        None
    } else {
        Some(text.to_owned())
    }
}

/// Extract a readable message from a provider error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_owned())
}

/// State threaded through the fragment stream.
struct StreamState<B> {
    bytes: B,
    decoder: SseDecoder,
    ready: VecDeque<String>,
    done: bool,
}

/// Turn an SSE byte stream into a stream of text fragments.
///
/// The stream ends at the `[DONE]` sentinel or when the body is exhausted;
/// a transport error mid-body surfaces as one final `Err` item.
fn fragment_stream(
    bytes: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
) -> impl Stream<Item = Result<String>> + Send {
    let state = StreamState {
        bytes: Box::pin(bytes) as Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
        decoder: SseDecoder::new(),
        ready: VecDeque::new(),
        done: false,
    };

    futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(text) = state.ready.pop_front() {
                return Some((Ok(text), state));
            }
            if state.done {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    for frame in state.decoder.feed(&chunk) {
                        if frame.is_done() {
                            state.done = true;
                            break;
                        }
                        if let Some(text) = delta_text(&frame.data) {
                            state.ready.push_back(text);
                        }
                    }
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((
                        Err(CarelineError::Generation(format!("stream aborted: {e}"))),
                        state,
                    ));
                }
                None => {
                    if let Some(frame) = state.decoder.finish()
                        && !frame.is_done()
                        && let Some(text) = delta_text(&frame.data)
                    {
                        state.ready.push_back(text);
                    }
                    state.done = true;
                }
            }
        }
    })
}
