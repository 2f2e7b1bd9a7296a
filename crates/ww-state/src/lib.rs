//! The authoritative in-memory game state: seats, roles, alive/dead, witch
//! potions, votes, and phase cursor — plus the visibility-filtered snapshot
//! views every other component reads instead of touching `Game` directly.

mod action;
mod error;
mod game;
mod seat;
mod snapshot;

pub use action::ActionPayload;
pub use error::StateError;
pub use game::{Game, Phase, VoteChoice, VoteOutcome, WitchState, Winner};
pub use seat::{DeathCause, ParticipantKind, Seat};
pub use snapshot::{PublicSeatView, PublicSnapshot, RevealSeatView, RevealSnapshot, SeatSnapshot};
