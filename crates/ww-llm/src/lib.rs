//! Vendor-agnostic streaming text-generation capability: "given a prompt and
//! options, yield a sequence of text chunks until completion or
//! cancellation."

mod cancel;
mod client;
mod fake;
#[cfg(feature = "http")]
mod http;

pub use cancel::{cancel_pair, CancelToken, Canceler};
pub use client::{GenerationOptions, LlmClient, LlmError, ResponseFormat, TokenStream};
pub use fake::FakeLlmClient;
#[cfg(feature = "http")]
pub use http::{Endpoint, HttpLlmClient, RetryConfig};
