use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use ww_core::{Position, ID};
use ww_roles::Team;
use ww_state::Game;

use crate::event::Event;

/// Per-subscriber channel depth. A publish that would exceed this instead
/// drops the subscriber, per the bus's backpressure contract.
const SUBSCRIBER_CHANNEL_DEPTH: usize = 256;

/// A live subscription: a `Stream<Item = Event>` already filtered to what
/// this subscriber may see.
pub struct Subscription {
    pub stream: ReceiverStream<Event>,
}

/// Room-scoped pub/sub for client-visible events, with per-connection
/// backpressure. The engine only depends on this trait, never on a concrete
/// transport.
pub trait EventBus: Send + Sync {
    /// Registers a new subscriber for `game_id`. `seat`/`team` identify the
    /// subscriber's own stake in the game, if any, for private-event
    /// routing; `None` means a spectator with no seat.
    fn subscribe(&self, game_id: ID<Game>, seat: Option<Position>, team: Option<Team>) -> Subscription;

    /// Publishes `event` to every current subscriber of `game_id` whose
    /// visibility permits it. Never blocks: a subscriber that can't keep up
    /// is dropped.
    fn publish(&self, game_id: ID<Game>, event: Event);
}

struct Subscriber {
    seat: Option<Position>,
    team: Option<Team>,
    sender: mpsc::Sender<Event>,
}

#[derive(Default)]
struct Room {
    subscribers: Vec<Subscriber>,
}

/// In-process `EventBus` implementation: one bounded `mpsc` channel per
/// subscriber. Suitable for a single-process deployment; a networked
/// transport would implement the same trait.
#[derive(Default)]
pub struct InMemoryEventBus {
    rooms: Mutex<HashMap<ID<Game>, Room>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventBus for InMemoryEventBus {
    fn subscribe(&self, game_id: ID<Game>, seat: Option<Position>, team: Option<Team>) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_DEPTH);
        let mut rooms = self.rooms.lock().expect("bus mutex poisoned");
        rooms
            .entry(game_id)
            .or_default()
            .subscribers
            .push(Subscriber {
                seat,
                team,
                sender: tx,
            });
        Subscription {
            stream: ReceiverStream::new(rx),
        }
    }

    fn publish(&self, game_id: ID<Game>, event: Event) {
        let visibility = event.visibility();
        let mut rooms = self.rooms.lock().expect("bus mutex poisoned");
        let Some(room) = rooms.get_mut(&game_id) else {
            return;
        };
        room.subscribers.retain(|sub| {
            if !visibility.visible_to(sub.seat, sub.team) {
                return true;
            }
            match sub.sender.try_send(event.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    log::warn!(
                        "[bus {game_id}] BUS_OVERFLOW dropping slow subscriber seat={:?}",
                        sub.seat
                    );
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn public_event_reaches_every_subscriber() {
        let bus = InMemoryEventBus::new();
        let game_id = ID::default();
        let mut a = bus.subscribe(game_id, Some(1), None);
        let mut b = bus.subscribe(game_id, None, None);
        bus.publish(game_id, Event::PlayerDied { seat: 1, cause: ww_state::DeathCause::VotedOut });
        use futures::StreamExt;
        assert!(a.stream.next().await.is_some());
        assert!(b.stream.next().await.is_some());
    }

    #[tokio::test]
    async fn private_event_only_reaches_matching_seat() {
        let bus = InMemoryEventBus::new();
        let game_id = ID::default();
        let mut owner = bus.subscribe(game_id, Some(4), None);
        let mut other = bus.subscribe(game_id, Some(5), None);
        bus.publish(
            game_id,
            Event::NightActionResult {
                seat: 4,
                payload: "NOT_WEREWOLF".into(),
            },
        );
        use futures::StreamExt;
        assert!(owner.stream.next().await.is_some());
        drop(owner);

        // the non-matching subscriber's channel received nothing; publish a
        // public event afterward and confirm it's the *first* thing `other`
        // observes.
        bus.publish(game_id, Event::SpectatorMode { seat: 5 });
        assert!(matches!(
            other.stream.next().await,
            Some(Event::SpectatorMode { seat: 5 })
        ));
    }
}
