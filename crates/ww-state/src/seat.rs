use serde::{Deserialize, Serialize};
use ww_core::Position;
use ww_roles::Role;

/// Whether a seat is occupied by the single human observer or by an AI
/// agent. Exactly one seat is `Human` per game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticipantKind {
    Human,
    Ai,
}

/// Why a seat died. `None` while the seat is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeathCause {
    KilledByWolf,
    Poisoned,
    VotedOut,
    ShotByHunter,
}

impl std::fmt::Display for DeathCause {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            DeathCause::KilledByWolf => "killed by the werewolves",
            DeathCause::Poisoned => "poisoned",
            DeathCause::VotedOut => "voted out",
            DeathCause::ShotByHunter => "shot by the hunter",
        };
        write!(f, "{s}")
    }
}

/// A fixed position at the table, occupied by one participant for the whole
/// game. `role` is assigned once at game start and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    seat_number: Position,
    participant_kind: ParticipantKind,
    display_name: String,
    role: Role,
    alive: bool,
    death_cause: Option<DeathCause>,
    death_day: Option<u32>,
}

impl Seat {
    pub fn new(
        seat_number: Position,
        participant_kind: ParticipantKind,
        display_name: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            seat_number,
            participant_kind,
            display_name: display_name.into(),
            role,
            alive: true,
            death_cause: None,
            death_day: None,
        }
    }

    pub fn seat_number(&self) -> Position {
        self.seat_number
    }
    pub fn participant_kind(&self) -> ParticipantKind {
        self.participant_kind
    }
    pub fn display_name(&self) -> &str {
        &self.display_name
    }
    pub fn role(&self) -> Role {
        self.role
    }
    pub fn alive(&self) -> bool {
        self.alive
    }
    pub fn death_cause(&self) -> Option<DeathCause> {
        self.death_cause
    }
    pub fn death_day(&self) -> Option<u32> {
        self.death_day
    }

    /// Marks this seat dead. Once dead, a seat never becomes alive again —
    /// callers must not call this twice on the same seat.
    pub(crate) fn kill(&mut self, cause: DeathCause, day: u32) {
        debug_assert!(self.alive, "killing an already-dead seat");
        self.alive = false;
        self.death_cause = Some(cause);
        self.death_day = Some(day);
    }
}

impl std::fmt::Display for Seat {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "#{} {} ({})",
            self.seat_number,
            self.display_name,
            if self.alive { "alive" } else { "dead" }
        )
    }
}
