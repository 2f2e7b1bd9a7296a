use tokio::sync::watch;

/// The canceling half of a cancel pair. Dropping it without calling
/// `cancel()` leaves the paired `CancelToken` live forever (it only resolves
/// on an explicit cancel or when the generation completes naturally).
#[derive(Clone)]
pub struct Canceler(watch::Sender<bool>);

impl Canceler {
    pub fn cancel(&self) {
        let _ = self.0.send(true);
    }
}

/// A cooperative cancellation signal threaded through `LlmClient::generate`.
/// Adapters must check this at least once per chunk so that cancellation
/// stops upstream token consumption within the ≤250ms budget.
#[derive(Clone)]
pub struct CancelToken(watch::Receiver<bool>);

impl CancelToken {
    pub fn is_canceled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once canceled. Safe to poll concurrently with generation.
    pub async fn canceled(&mut self) {
        loop {
            if *self.0.borrow() {
                return;
            }
            if self.0.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Creates a linked `(Canceler, CancelToken)` pair for a single generation
/// call.
pub fn cancel_pair() -> (Canceler, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (Canceler(tx), CancelToken(rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_resolves_the_token() {
        let (canceler, mut token) = cancel_pair();
        assert!(!token.is_canceled());
        canceler.cancel();
        token.canceled().await;
        assert!(token.is_canceled());
    }
}
