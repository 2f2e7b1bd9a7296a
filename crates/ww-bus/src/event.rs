use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ww_core::Position;
use ww_roles::{ActionKind, Team};
use ww_state::{DeathCause, Phase, RevealSnapshot, VoteChoice};

use crate::visibility::Visibility;

/// Which narration moment a `host_announcement_start` event corresponds to.
/// Matches the fixed set of triggers the Host Narrator recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NarrationKind {
    NightStart,
    NightResolution,
    DayStart,
    VoteResult,
    GameEnd,
    Fallback,
}

impl std::fmt::Display for NarrationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            NarrationKind::NightStart => "night_start",
            NarrationKind::NightResolution => "night_resolution",
            NarrationKind::DayStart => "day_start",
            NarrationKind::VoteResult => "vote_result",
            NarrationKind::GameEnd => "game_end",
            NarrationKind::Fallback => "fallback",
        };
        write!(f, "{s}")
    }
}

/// A vote candidate offered to a seat during `DAY_VOTE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteCandidate {
    Seat(Position),
    Abstain,
}

/// Every client-visible event the engine may emit, per the event bus
/// contract. `Event::visibility` determines routing; private events are
/// dropped by the bus for subscribers that don't match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    PhaseChanged {
        day: u32,
        phase: Phase,
    },
    HostAnnouncementStart {
        kind: NarrationKind,
    },
    HostAnnouncementChunk {
        delta: String,
        accumulated: String,
    },
    HostAnnouncementEnd {
        full_text: String,
    },
    SeatSpeechStart {
        seat: Position,
    },
    SeatSpeechChunk {
        seat: Position,
        delta: String,
    },
    SeatSpeechEnd {
        seat: Position,
        full_text: String,
    },
    WaitingForHuman {
        seat: Position,
        action_kind: ActionKind,
        deadline: DateTime<Utc>,
    },
    AiTakeover {
        seat: Position,
        action_kind: ActionKind,
    },
    VoteOptions {
        seat: Position,
        candidates: Vec<VoteCandidate>,
        deadline: DateTime<Utc>,
    },
    HumanVoteComplete {
        voter: Position,
        choice: VoteChoice,
    },
    /// Private: routed only to the acting seat.
    NightActionResult {
        seat: Position,
        payload: String,
    },
    PlayerDied {
        seat: Position,
        cause: DeathCause,
    },
    GameEnded {
        winner: Option<Team>,
        reveal: RevealSnapshot,
    },
    /// Sent when a human's seat dies; that client should switch to a
    /// read-only view.
    SpectatorMode {
        seat: Position,
    },
}

impl Event {
    /// Routing visibility for this event, per the event bus contract.
    pub fn visibility(&self) -> Visibility {
        match self {
            Event::NightActionResult { seat, .. } => Visibility::SeatPrivate(*seat),
            Event::SpectatorMode { seat } => Visibility::SeatPrivate(*seat),
            _ => Visibility::Public,
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Event::PhaseChanged { day, phase } => write!(f, "phase_changed day={day} phase={phase}"),
            Event::HostAnnouncementStart { kind } => write!(f, "host_announcement_start {kind}"),
            Event::HostAnnouncementChunk { .. } => write!(f, "host_announcement_chunk"),
            Event::HostAnnouncementEnd { .. } => write!(f, "host_announcement_end"),
            Event::SeatSpeechStart { seat } => write!(f, "seat_speech_start seat={seat}"),
            Event::SeatSpeechChunk { seat, .. } => write!(f, "seat_speech_chunk seat={seat}"),
            Event::SeatSpeechEnd { seat, .. } => write!(f, "seat_speech_end seat={seat}"),
            Event::WaitingForHuman { seat, action_kind, .. } => {
                write!(f, "waiting_for_human seat={seat} action={action_kind}")
            }
            Event::AiTakeover { seat, action_kind } => {
                write!(f, "ai_takeover seat={seat} action={action_kind}")
            }
            Event::VoteOptions { seat, .. } => write!(f, "vote_options seat={seat}"),
            Event::HumanVoteComplete { voter, .. } => write!(f, "human_vote_complete voter={voter}"),
            Event::NightActionResult { seat, .. } => write!(f, "night_action_result seat={seat}"),
            Event::PlayerDied { seat, cause } => write!(f, "player_died seat={seat} cause={cause}"),
            Event::GameEnded { winner, .. } => write!(f, "game_ended winner={winner:?}"),
            Event::SpectatorMode { seat } => write!(f, "spectator_mode seat={seat}"),
        }
    }
}
