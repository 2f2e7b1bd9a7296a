use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;

/// How the model should format its response. `JsonOptions` is used whenever
/// a caller needs a structured decision (vote, night action) rather than
/// free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseFormat {
    Free,
    JsonOptions,
}

/// Generation parameters recognized by every adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    pub stop: Vec<String>,
    pub system: Option<String>,
    pub response_format: ResponseFormat,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            max_tokens: 512,
            stop: Vec::new(),
            system: None,
            response_format: ResponseFormat::Free,
        }
    }
}

/// Why a stream ended without producing a complete message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    Timeout,
    RateLimited,
    Upstream(String),
    Canceled,
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            LlmError::Timeout => write!(f, "generation timed out"),
            LlmError::RateLimited => write!(f, "rate limited by upstream"),
            LlmError::Upstream(msg) => write!(f, "upstream error: {msg}"),
            LlmError::Canceled => write!(f, "generation canceled"),
        }
    }
}

impl std::error::Error for LlmError {}

/// A stream of text chunks, each of which may itself fail partway through
/// (e.g. the connection drops mid-stream).
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Vendor-agnostic streaming text generation capability. `ww-agent` and
/// `ww-narrator` depend only on this trait, never on a concrete vendor SDK.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(
        &self,
        prompt: String,
        options: GenerationOptions,
        cancel: CancelToken,
    ) -> Result<TokenStream, LlmError>;
}
