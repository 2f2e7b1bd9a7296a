//! Room-scoped pub/sub for client-visible events, with per-connection
//! backpressure and visibility-enforced private routing.

mod bus;
mod event;
mod visibility;

pub use bus::{EventBus, InMemoryEventBus, Subscription};
pub use event::{Event, NarrationKind, VoteCandidate};
pub use visibility::Visibility;
