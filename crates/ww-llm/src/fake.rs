use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::cancel::CancelToken;
use crate::client::{GenerationOptions, LlmClient, LlmError, TokenStream};

/// Deterministic `LlmClient` used by every test and end-to-end scenario.
/// Responses are either scripted (pushed ahead of time, consumed FIFO) or,
/// once the script is exhausted, a short placeholder line — so a test can
/// pin exact output while still exercising the full streaming path.
pub struct FakeLlmClient {
    scripted: Mutex<VecDeque<String>>,
}

impl Default for FakeLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeLlmClient {
    pub fn new() -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
        }
    }

    /// Queues a full response to be returned by the next `generate` call.
    pub fn push_response(&self, text: impl Into<String>) {
        self.scripted.lock().expect("fake llm mutex poisoned").push_back(text.into());
    }

    fn next_text(&self) -> String {
        let mut queue = self.scripted.lock().expect("fake llm mutex poisoned");
        queue.pop_front().unwrap_or_else(|| {
            let n: u32 = rand::thread_rng().gen_range(0..1000);
            format!("(the fake model has nothing scripted; filler #{n})")
        })
    }
}

#[async_trait]
impl LlmClient for FakeLlmClient {
    async fn generate(
        &self,
        _prompt: String,
        _options: GenerationOptions,
        mut cancel: CancelToken,
    ) -> Result<TokenStream, LlmError> {
        if cancel.is_canceled() {
            return Err(LlmError::Canceled);
        }
        let text = self.next_text();
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            for word in text.split_inclusive(' ') {
                tokio::select! {
                    biased;
                    _ = cancel.canceled() => {
                        let _ = tx.send(Err(LlmError::Canceled)).await;
                        return;
                    }
                    _ = tokio::task::yield_now() => {}
                }
                if tx.send(Ok(word.to_string())).await.is_err() {
                    return;
                }
            }
        });
        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn scripted_response_is_returned_in_chunks() {
        let client = FakeLlmClient::new();
        client.push_response("hello world");
        let (_canceler, token) = crate::cancel::cancel_pair();
        let mut stream = client
            .generate("prompt".into(), GenerationOptions::default(), token)
            .await
            .unwrap();
        let mut joined = String::new();
        while let Some(chunk) = stream.next().await {
            joined.push_str(&chunk.unwrap());
        }
        assert_eq!(joined, "hello world");
    }

    #[tokio::test]
    async fn canceled_token_rejects_generation_up_front() {
        let client = FakeLlmClient::new();
        let (canceler, token) = crate::cancel::cancel_pair();
        canceler.cancel();
        let result = client
            .generate("prompt".into(), GenerationOptions::default(), token)
            .await;
        assert_eq!(result.unwrap_err(), LlmError::Canceled);
    }
}
