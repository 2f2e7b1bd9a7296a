use serde::{Deserialize, Serialize};
use ww_core::{Position, Unique, ID};
use ww_roles::{Role, Team};

use crate::error::StateError;
use crate::game::{Game, Phase, Winner};
use crate::seat::{DeathCause, ParticipantKind};

/// A seat as seen by any subscriber: role is `None` while the seat is alive
/// and the game hasn't ended, since role is secret until death or game end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicSeatView {
    pub seat_number: Position,
    pub participant_kind: ParticipantKind,
    pub display_name: String,
    pub alive: bool,
    pub role: Option<Role>,
    pub death_cause: Option<DeathCause>,
    pub death_day: Option<u32>,
}

/// Immutable, visibility-filtered view of game state handed to the bus, the
/// narrator, and any subscriber with no private stake in the game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicSnapshot {
    pub game_id: ID<Game>,
    pub room_code: String,
    pub day_number: u32,
    pub phase: Phase,
    pub speech_cursor: Option<Position>,
    pub winner: Winner,
    pub paused: bool,
    pub seats: Vec<PublicSeatView>,
}

/// The view supplied to a single seat's occupant (human or AI): the public
/// snapshot, plus that seat's own role, plus — only if the viewer is a
/// werewolf — the seat numbers of its living teammates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatSnapshot {
    pub public: PublicSnapshot,
    pub viewer_seat: Position,
    pub viewer_role: Role,
    pub werewolf_teammates: Vec<Position>,
}

/// Full-information view: every seat's role, visible once a seat has died
/// or the game has ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealSeatView {
    pub seat_number: Position,
    pub display_name: String,
    pub role: Role,
    pub alive: bool,
    pub death_cause: Option<DeathCause>,
    pub death_day: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealSnapshot {
    pub game_id: ID<Game>,
    pub room_code: String,
    pub day_number: u32,
    pub winner: Winner,
    pub seats: Vec<RevealSeatView>,
}

impl Game {
    /// A snapshot safe to show to any subscriber with no private stake in
    /// the game: living seats never reveal their role.
    pub fn public_snapshot(&self) -> PublicSnapshot {
        let game_over = self.phase() == Phase::Ended;
        PublicSnapshot {
            game_id: self.id(),
            room_code: self.room_code().to_string(),
            day_number: self.day_number(),
            phase: self.phase(),
            speech_cursor: self.speech_cursor(),
            winner: self.winner(),
            paused: self.paused(),
            seats: self
                .seats()
                .iter()
                .map(|s| PublicSeatView {
                    seat_number: s.seat_number(),
                    participant_kind: s.participant_kind(),
                    display_name: s.display_name().to_string(),
                    alive: s.alive(),
                    role: (!s.alive() || game_over).then_some(s.role()),
                    death_cause: s.death_cause(),
                    death_day: s.death_day(),
                })
                .collect(),
        }
    }

    /// The role-scoped view supplied to `viewer_seat`'s occupant: the public
    /// snapshot plus the viewer's own role, plus werewolf teammates if the
    /// viewer is on the werewolf team.
    pub fn seat_snapshot(&self, viewer_seat: Position) -> Result<SeatSnapshot, StateError> {
        let viewer = self.seat(viewer_seat)?;
        let viewer_role = viewer.role();
        let werewolf_teammates = if viewer_role.team() == Team::Werewolf {
            self.seats()
                .iter()
                .filter(|s| s.role().team() == Team::Werewolf && s.seat_number() != viewer_seat)
                .map(|s| s.seat_number())
                .collect()
        } else {
            Vec::new()
        };
        Ok(SeatSnapshot {
            public: self.public_snapshot(),
            viewer_seat,
            viewer_role,
            werewolf_teammates,
        })
    }

    /// Full-information view, used after death or game end (and for audit
    /// replay to reconnecting subscribers who already saw the reveal).
    pub fn reveal_snapshot(&self) -> RevealSnapshot {
        RevealSnapshot {
            game_id: self.id(),
            room_code: self.room_code().to_string(),
            day_number: self.day_number(),
            winner: self.winner(),
            seats: self
                .seats()
                .iter()
                .map(|s| RevealSeatView {
                    seat_number: s.seat_number(),
                    display_name: s.display_name().to_string(),
                    role: s.role(),
                    alive: s.alive(),
                    death_cause: s.death_cause(),
                    death_day: s.death_day(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seat::Seat;

    fn standard_seats() -> Vec<Seat> {
        let roles = ww_roles::RoleCatalog.standard_composition();
        roles
            .into_iter()
            .enumerate()
            .map(|(i, role)| {
                Seat::new(i + 1, ParticipantKind::Ai, format!("Seat {}", i + 1), role)
            })
            .collect()
    }

    #[test]
    fn public_snapshot_hides_living_roles() {
        let game = Game::new("ABC123", standard_seats()).unwrap();
        let snap = game.public_snapshot();
        assert!(snap.seats.iter().all(|s| s.role.is_none()));
    }

    #[test]
    fn public_snapshot_reveals_dead_roles() {
        let mut game = Game::new("ABC123", standard_seats()).unwrap();
        let victim = game.seats()[0].seat_number();
        game.eliminate_seat(victim).unwrap();
        let snap = game.public_snapshot();
        let dead = snap.seats.iter().find(|s| s.seat_number == victim).unwrap();
        assert!(dead.role.is_some());
    }

    #[test]
    fn werewolf_viewer_sees_teammates() {
        let game = Game::new("ABC123", standard_seats()).unwrap();
        let wolf_seat = game
            .seats()
            .iter()
            .find(|s| s.role() == ww_roles::Role::Werewolf)
            .unwrap()
            .seat_number();
        let snap = game.seat_snapshot(wolf_seat).unwrap();
        assert_eq!(snap.werewolf_teammates.len(), 2);
    }

    #[test]
    fn villager_viewer_sees_no_teammates() {
        let game = Game::new("ABC123", standard_seats()).unwrap();
        let villager_seat = game
            .seats()
            .iter()
            .find(|s| s.role() == ww_roles::Role::Villager)
            .unwrap()
            .seat_number();
        let snap = game.seat_snapshot(villager_seat).unwrap();
        assert!(snap.werewolf_teammates.is_empty());
    }
}
