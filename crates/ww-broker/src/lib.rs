//! Issues a human-input request with a deadline; delivers the client's
//! result or synthesizes an AI takeover. The Phase Scheduler never
//! special-cases human vs AI at the call site — takeover is just the
//! timeout branch here.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use ww_bus::{Event, EventBus};
use ww_core::{Position, ID};
use ww_roles::ActionKind;
use ww_state::{ActionPayload, Game};

/// Rejected submissions never touch game state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    InvalidSubmission { reason: String },
}

impl std::fmt::Display for BrokerError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            BrokerError::InvalidSubmission { reason } => write!(f, "invalid submission: {reason}"),
        }
    }
}

impl std::error::Error for BrokerError {}

/// Result of a `request_human_input` call.
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerOutcome {
    Submitted(ActionPayload),
    TimedOut,
    Canceled,
}

#[derive(PartialEq, Eq, Hash, Clone)]
struct PendingKey {
    game_id: ID<Game>,
    seat: Position,
    action_kind: ActionKindKey,
}

// ActionKind doesn't derive Hash/Eq upstream beyond PartialEq+Eq+Hash — it
// does (see ww-roles), but wrapping keeps this module independent of that
// detail changing.
#[derive(PartialEq, Eq, Hash, Clone, Copy)]
struct ActionKindKey(ActionKind);

/// Issues time-bounded human-input requests and synthesizes AI takeover on
/// timeout. One instance is shared across every game in the process.
pub struct PromptBroker<B: EventBus> {
    bus: std::sync::Arc<B>,
    pending: Mutex<HashMap<PendingKey, oneshot::Sender<ActionPayload>>>,
}

impl<B: EventBus> PromptBroker<B> {
    pub fn new(bus: std::sync::Arc<B>) -> Self {
        Self {
            bus,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Requests input from `seat` for `action_kind`, honoring `deadline`.
    /// Returns `Submitted` if the client answers in time, `TimedOut` after
    /// emitting `ai_takeover` (the caller then invokes the AI Agent Runner),
    /// or `Canceled` if `cancel` is called first (seat died / game ended).
    pub async fn request_human_input(
        &self,
        game_id: ID<Game>,
        seat: Position,
        action_kind: ActionKind,
        deadline: DateTime<Utc>,
    ) -> BrokerOutcome {
        self.bus.publish(
            game_id,
            Event::WaitingForHuman {
                seat,
                action_kind,
                deadline,
            },
        );

        let key = PendingKey {
            game_id,
            seat,
            action_kind: ActionKindKey(action_kind),
        };
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().expect("broker mutex poisoned");
            pending.insert(key.clone(), tx);
        }

        let remaining = (deadline - Utc::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);

        let outcome = tokio::select! {
            biased;
            result = rx => match result {
                Ok(payload) => BrokerOutcome::Submitted(payload),
                Err(_) => BrokerOutcome::Canceled,
            },
            _ = tokio::time::sleep(remaining) => {
                log::info!("[broker {game_id}] seat {seat} timed out on {action_kind}");
                self.bus.publish(game_id, Event::AiTakeover { seat, action_kind });
                BrokerOutcome::TimedOut
            }
        };

        self.pending
            .lock()
            .expect("broker mutex poisoned")
            .remove(&key);
        outcome
    }

    /// Delivers a client submission to the matching pending request, if any.
    /// The first accepted submission wins; a duplicate (the pending entry
    /// having already been removed by resolution) is rejected.
    pub fn submit(
        &self,
        game_id: ID<Game>,
        seat: Position,
        action_kind: ActionKind,
        payload: ActionPayload,
    ) -> Result<(), BrokerError> {
        let key = PendingKey {
            game_id,
            seat,
            action_kind: ActionKindKey(action_kind),
        };
        let sender = self
            .pending
            .lock()
            .expect("broker mutex poisoned")
            .remove(&key);
        match sender {
            Some(sender) => sender.send(payload).map_err(|_| BrokerError::InvalidSubmission {
                reason: "request was already resolved".into(),
            }),
            None => Err(BrokerError::InvalidSubmission {
                reason: "no pending request for this seat/action".into(),
            }),
        }
    }

    /// Cancels one pending request (seat died) without resolving it; the
    /// awaiting `request_human_input` call observes `Canceled`.
    pub fn cancel(&self, game_id: ID<Game>, seat: Position, action_kind: ActionKind) {
        let key = PendingKey {
            game_id,
            seat,
            action_kind: ActionKindKey(action_kind),
        };
        self.pending.lock().expect("broker mutex poisoned").remove(&key);
    }

    /// Cancels every pending request for a game (game ended / stopped).
    pub fn cancel_all(&self, game_id: ID<Game>) {
        self.pending
            .lock()
            .expect("broker mutex poisoned")
            .retain(|key, _| key.game_id != game_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ww_bus::InMemoryEventBus;
    use ww_state::VoteChoice;

    #[tokio::test]
    async fn submission_before_deadline_resolves_submitted() {
        let bus = std::sync::Arc::new(InMemoryEventBus::new());
        let broker = std::sync::Arc::new(PromptBroker::new(bus));
        let game_id = ID::default();
        let deadline = Utc::now() + chrono::Duration::seconds(5);

        let broker2 = broker.clone();
        let handle = tokio::spawn(async move {
            broker2
                .request_human_input(game_id, 1, ActionKind::Speech, deadline)
                .await
        });

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        broker
            .submit(game_id, 1, ActionKind::Speech, ActionPayload::Speech("hi".into()))
            .unwrap();

        let outcome = handle.await.unwrap();
        assert_eq!(outcome, BrokerOutcome::Submitted(ActionPayload::Speech("hi".into())));
    }

    #[tokio::test]
    async fn missed_deadline_times_out() {
        let bus = std::sync::Arc::new(InMemoryEventBus::new());
        let broker = PromptBroker::new(bus);
        let game_id = ID::default();
        let deadline = Utc::now() + chrono::Duration::milliseconds(10);
        let outcome = broker
            .request_human_input(game_id, 2, ActionKind::Vote, deadline)
            .await;
        assert_eq!(outcome, BrokerOutcome::TimedOut);
    }

    #[tokio::test]
    async fn cancel_resolves_canceled() {
        let bus = std::sync::Arc::new(InMemoryEventBus::new());
        let broker = std::sync::Arc::new(PromptBroker::new(bus));
        let game_id = ID::default();
        let deadline = Utc::now() + chrono::Duration::seconds(5);

        let broker2 = broker.clone();
        let handle = tokio::spawn(async move {
            broker2
                .request_human_input(game_id, 3, ActionKind::WolfKill, deadline)
                .await
        });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        broker.cancel(game_id, 3, ActionKind::WolfKill);
        assert_eq!(handle.await.unwrap(), BrokerOutcome::Canceled);
    }

    #[tokio::test]
    async fn duplicate_submission_is_rejected() {
        let bus = std::sync::Arc::new(InMemoryEventBus::new());
        let broker = std::sync::Arc::new(PromptBroker::new(bus));
        let game_id = ID::default();
        let deadline = Utc::now() + chrono::Duration::seconds(5);

        let broker2 = broker.clone();
        let handle = tokio::spawn(async move {
            broker2
                .request_human_input(game_id, 4, ActionKind::Vote, deadline)
                .await
        });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        broker
            .submit(game_id, 4, ActionKind::Vote, ActionPayload::Vote(VoteChoice::Abstain))
            .unwrap();
        let second = broker.submit(game_id, 4, ActionKind::Vote, ActionPayload::Vote(VoteChoice::Abstain));
        assert!(second.is_err());
        handle.await.unwrap();
    }
}
