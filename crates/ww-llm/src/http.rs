//! Concrete, feature-gated adapter speaking an OpenAI-compatible
//! chat-completions streaming API. The engine never depends on this module
//! directly — only on `LlmClient` — so swapping vendors means swapping the
//! `endpoints` passed to `HttpLlmClient::new`, not touching call sites.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::cancel::CancelToken;
use crate::client::{GenerationOptions, LlmClient, LlmError, ResponseFormat, TokenStream};

/// One upstream chat-completions endpoint: base URL and bearer token.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

/// Retry/backoff policy applied across the endpoint list before a call is
/// given up as `LlmError::Upstream`.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub initial_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 200,
        }
    }
}

/// HTTP-backed `LlmClient`. Tries `endpoints` in order on each attempt,
/// so the first entry is the primary vendor and the rest are fallbacks.
pub struct HttpLlmClient {
    http: reqwest::Client,
    endpoints: Vec<Endpoint>,
    retry: RetryConfig,
}

impl HttpLlmClient {
    pub fn new(endpoints: Vec<Endpoint>, retry: RetryConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoints,
            retry,
        }
    }

    async fn try_endpoint(
        &self,
        endpoint: &Endpoint,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<reqwest::Response, LlmError> {
        let body = ChatRequest {
            model: endpoint.model.clone(),
            stream: true,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stop: options.stop.clone(),
            response_format: match options.response_format {
                ResponseFormat::JsonOptions => Some(ResponseFormatBody {
                    kind: "json_object".into(),
                }),
                ResponseFormat::Free => None,
            },
            messages: {
                let mut messages = Vec::new();
                if let Some(system) = &options.system {
                    messages.push(ChatMessage {
                        role: "system".into(),
                        content: system.clone(),
                    });
                }
                messages.push(ChatMessage {
                    role: "user".into(),
                    content: prompt.to_string(),
                });
                messages
            },
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", endpoint.base_url))
            .bearer_auth(&endpoint.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Upstream(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }
        if !response.status().is_success() {
            return Err(LlmError::Upstream(format!("status {}", response.status())));
        }
        Ok(response)
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn generate(
        &self,
        prompt: String,
        options: GenerationOptions,
        mut cancel: CancelToken,
    ) -> Result<TokenStream, LlmError> {
        if cancel.is_canceled() {
            return Err(LlmError::Canceled);
        }

        let mut last_err = LlmError::Upstream("no endpoints configured".into());
        let mut backoff = self.retry.initial_backoff_ms;
        let mut response = None;
        'attempts: for attempt in 0..self.retry.max_attempts {
            for endpoint in &self.endpoints {
                match self.try_endpoint(endpoint, &prompt, &options).await {
                    Ok(resp) => {
                        response = Some(resp);
                        break 'attempts;
                    }
                    Err(LlmError::RateLimited) => {
                        last_err = LlmError::RateLimited;
                    }
                    Err(err) => {
                        log::warn!("[llm] endpoint {} failed: {err}", endpoint.base_url);
                        last_err = err;
                    }
                }
            }
            if attempt + 1 < self.retry.max_attempts {
                tokio::time::sleep(std::time::Duration::from_millis(backoff)).await;
                backoff *= 2;
            }
        }
        let Some(response) = response else {
            return Err(last_err);
        };

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            let mut bytes_stream = response.bytes_stream();
            let mut buffer = String::new();
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.canceled() => {
                        let _ = tx.send(Err(LlmError::Canceled)).await;
                        return;
                    }
                    chunk = bytes_stream.next() => {
                        let Some(chunk) = chunk else { return };
                        let Ok(chunk) = chunk else {
                            let _ = tx.send(Err(LlmError::Upstream("stream read failed".into()))).await;
                            return;
                        };
                        buffer.push_str(&String::from_utf8_lossy(&chunk));
                        while let Some(pos) = buffer.find("\n\n") {
                            let frame: String = buffer.drain(..pos + 2).collect();
                            for line in frame.lines() {
                                let Some(data) = line.strip_prefix("data: ") else { continue };
                                if data == "[DONE]" {
                                    return;
                                }
                                if let Ok(parsed) = serde_json::from_str::<ChatStreamChunk>(data) {
                                    if let Some(choice) = parsed.choices.into_iter().next() {
                                        if let Some(delta) = choice.delta.content {
                                            if tx.send(Ok(delta)).await.is_err() {
                                                return;
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        });
        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormatBody {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    stream: bool,
    temperature: f32,
    max_tokens: u32,
    stop: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormatBody>,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatStreamChunk {
    choices: Vec<ChatStreamChoice>,
}

#[derive(Deserialize)]
struct ChatStreamChoice {
    delta: ChatStreamDelta,
}

#[derive(Deserialize)]
struct ChatStreamDelta {
    content: Option<String>,
}
