//! Out-of-band run control for a game's scheduler loop: stop and pause,
//! each a `tokio::sync::watch<bool>` pair in the same shape as
//! `ww_llm::cancel`'s `Canceler`/`CancelToken`. The handle half is held by
//! `GameRoom`; the signal half is threaded through the scheduler loop.

use tokio::sync::watch;

/// The stopping half. Calling `stop` more than once is harmless.
#[derive(Clone)]
pub struct StopHandle(watch::Sender<bool>);

impl StopHandle {
    pub fn stop(&self) {
        let _ = self.0.send(true);
    }
}

/// Observed cooperatively by the scheduler loop between phases.
#[derive(Clone)]
pub struct StopSignal(watch::Receiver<bool>);

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self.0.borrow()
    }
}

pub fn stop_pair() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle(tx), StopSignal(rx))
}

/// The pausing half.
#[derive(Clone)]
pub struct PauseHandle(watch::Sender<bool>);

impl PauseHandle {
    pub fn pause(&self) {
        let _ = self.0.send(true);
    }
    pub fn resume(&self) {
        let _ = self.0.send(false);
    }
}

/// Observed before every new prompt issuance (human broker request or AI
/// generation call). In-flight generations are never preempted — pause only
/// suspends the *next* one, matching the best-effort pause contract.
#[derive(Clone)]
pub struct PauseSignal(watch::Receiver<bool>);

impl PauseSignal {
    pub fn is_paused(&self) -> bool {
        *self.0.borrow()
    }

    /// Blocks while paused; returns immediately otherwise.
    pub async fn wait_while_paused(&mut self) {
        while *self.0.borrow() {
            if self.0.changed().await.is_err() {
                return;
            }
        }
    }
}

pub fn pause_pair() -> (PauseHandle, PauseSignal) {
    let (tx, rx) = watch::channel(false);
    (PauseHandle(tx), PauseSignal(rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pause_then_resume_releases_the_wait() {
        let (handle, mut signal) = pause_pair();
        handle.pause();
        assert!(signal.is_paused());
        let mut waiter = signal.clone();
        let task = tokio::spawn(async move {
            waiter.wait_while_paused().await;
        });
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert!(!task.is_finished());
        handle.resume();
        task.await.unwrap();
    }

    #[test]
    fn stop_signal_observes_stop() {
        let (handle, signal) = stop_pair();
        assert!(!signal.is_stopped());
        handle.stop();
        assert!(signal.is_stopped());
    }
}
