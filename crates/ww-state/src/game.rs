use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ww_core::{Position, Unique, ID};
use ww_roles::{Role, Team};

use crate::error::StateError;
use crate::seat::{DeathCause, ParticipantKind, Seat};

/// A named segment of the day/night state machine, each with its own
/// allowed actions and deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    NightWolf,
    NightSeer,
    NightWitch,
    NightHunter,
    DayAnnounce,
    DaySpeech,
    DayVote,
    DayLastWords,
    Resolve,
    Ended,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            Phase::NightWolf => "NIGHT_WOLF",
            Phase::NightSeer => "NIGHT_SEER",
            Phase::NightWitch => "NIGHT_WITCH",
            Phase::NightHunter => "NIGHT_HUNTER",
            Phase::DayAnnounce => "DAY_ANNOUNCE",
            Phase::DaySpeech => "DAY_SPEECH",
            Phase::DayVote => "DAY_VOTE",
            Phase::DayLastWords => "DAY_LAST_WORDS",
            Phase::Resolve => "RESOLVE",
            Phase::Ended => "ENDED",
        };
        write!(f, "{s}")
    }
}

/// A seat's vote during `DAY_VOTE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteChoice {
    Target(Position),
    Abstain,
}

/// Result of tallying a `DAY_VOTE` round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Eliminate(Position),
    Tie,
}

/// The witch's once-per-game potions. Neither flag regenerates once spent.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WitchState {
    has_antidote: bool,
    has_poison: bool,
}

impl WitchState {
    pub fn fresh() -> Self {
        Self {
            has_antidote: true,
            has_poison: true,
        }
    }
    pub fn has_antidote(&self) -> bool {
        self.has_antidote
    }
    pub fn has_poison(&self) -> bool {
        self.has_poison
    }
}

/// Winner of the game: `None` while undecided (or when a game was canceled
/// without a decided winner).
pub type Winner = Option<Team>;

/// The authoritative per-game state. Every field listed in the data model is
/// represented; mutation happens only through the methods below, each of
/// which asserts the invariants it owns. The sole intended caller of the
/// mutators is the phase scheduler — `Game` itself does not enforce that at
/// the type level, matching the "single logical writer" discipline described
/// for the rest of the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    game_id: ID<Game>,
    room_code: String,
    seats: Vec<Seat>,
    day_number: u32,
    phase: Phase,
    speech_cursor: Option<Position>,
    pending_deaths: BTreeMap<Position, DeathCause>,
    witch_state: WitchState,
    last_night_kill: Option<Position>,
    votes: BTreeMap<Position, VoteChoice>,
    hunter_pending: Option<Position>,
    winner: Winner,
    paused: bool,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl Unique<Game> for Game {
    fn id(&self) -> ID<Game> {
        self.game_id
    }
}

impl Game {
    /// Creates a new game with the given seats, validating the fixed-
    /// composition and seat-numbering invariants from the data model.
    pub fn new(room_code: impl Into<String>, seats: Vec<Seat>) -> Result<Self, StateError> {
        if seats.len() != ww_core::SEAT_COUNT {
            return Err(StateError::WrongSeatCount { found: seats.len() });
        }
        let mut seen = std::collections::BTreeSet::new();
        for seat in &seats {
            if !seen.insert(seat.seat_number()) {
                return Err(StateError::DuplicateSeatNumber {
                    seat: seat.seat_number(),
                });
            }
        }
        let catalog = ww_roles::RoleCatalog;
        let mut expected = catalog.standard_composition();
        let mut actual: Vec<Role> = seats.iter().map(|s| s.role()).collect();
        expected.sort_by_key(role_rank);
        actual.sort_by_key(role_rank);
        if expected != actual {
            return Err(StateError::WrongRoleComposition);
        }

        Ok(Self {
            game_id: ID::default(),
            room_code: room_code.into(),
            seats,
            day_number: 1,
            phase: Phase::NightWolf,
            speech_cursor: None,
            pending_deaths: BTreeMap::new(),
            witch_state: WitchState::fresh(),
            last_night_kill: None,
            votes: BTreeMap::new(),
            hunter_pending: None,
            winner: None,
            paused: false,
            started_at: None,
            ended_at: None,
        })
    }

    // -- read accessors --------------------------------------------------

    pub fn room_code(&self) -> &str {
        &self.room_code
    }
    pub fn seats(&self) -> &[Seat] {
        &self.seats
    }
    pub fn day_number(&self) -> u32 {
        self.day_number
    }
    pub fn phase(&self) -> Phase {
        self.phase
    }
    pub fn speech_cursor(&self) -> Option<Position> {
        self.speech_cursor
    }
    pub fn witch_state(&self) -> WitchState {
        self.witch_state
    }
    pub fn last_night_kill(&self) -> Option<Position> {
        self.last_night_kill
    }
    pub fn votes(&self) -> &BTreeMap<Position, VoteChoice> {
        &self.votes
    }
    pub fn hunter_pending(&self) -> Option<Position> {
        self.hunter_pending
    }
    pub fn winner(&self) -> Winner {
        self.winner
    }
    pub fn paused(&self) -> bool {
        self.paused
    }
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }
    pub fn pending_deaths(&self) -> impl Iterator<Item = (Position, DeathCause)> + '_ {
        self.pending_deaths.iter().map(|(&s, &c)| (s, c))
    }

    pub fn seat(&self, seat: Position) -> Result<&Seat, StateError> {
        self.seats
            .iter()
            .find(|s| s.seat_number() == seat)
            .ok_or(StateError::SeatNotFound { seat })
    }

    fn seat_mut(&mut self, seat: Position) -> Result<&mut Seat, StateError> {
        self.seats
            .iter_mut()
            .find(|s| s.seat_number() == seat)
            .ok_or(StateError::SeatNotFound { seat })
    }

    pub fn is_alive(&self, seat: Position) -> Result<bool, StateError> {
        Ok(self.seat(seat)?.alive())
    }

    /// All alive seats, ascending by seat number.
    pub fn alive_seats(&self) -> Vec<Position> {
        self.seats
            .iter()
            .filter(|s| s.alive())
            .map(|s| s.seat_number())
            .collect()
    }

    /// Alive seats belonging to the given team, ascending.
    pub fn alive_seats_of_team(&self, team: Team) -> Vec<Position> {
        self.seats
            .iter()
            .filter(|s| s.alive() && s.role().team() == team)
            .map(|s| s.seat_number())
            .collect()
    }

    pub fn human_seat(&self) -> Option<Position> {
        self.seats
            .iter()
            .find(|s| s.participant_kind() == ParticipantKind::Human)
            .map(|s| s.seat_number())
    }

    // -- lifecycle --------------------------------------------------------

    /// Marks the game started. Idempotent-ish: only sets the timestamp once.
    pub fn start(&mut self, now: DateTime<Utc>) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub fn next_day(&mut self) {
        self.day_number += 1;
    }

    pub fn set_speech_cursor(&mut self, cursor: Option<Position>) {
        self.speech_cursor = cursor;
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }
    pub fn resume(&mut self) {
        self.paused = false;
    }

    // -- night actions ----------------------------------------------------

    /// Records the wolves' collective choice. `None` means empty-knife.
    pub fn record_wolf_kill(&mut self, target: Option<Position>) -> Result<(), StateError> {
        if let Some(seat) = target {
            if !self.is_alive(seat)? {
                return Err(StateError::SeatNotAlive { seat });
            }
            self.pending_deaths.insert(seat, DeathCause::KilledByWolf);
        }
        self.last_night_kill = target;
        Ok(())
    }

    /// Read-only seer check: which team the target belongs to.
    pub fn seer_check(&self, target: Position) -> Result<Team, StateError> {
        Ok(self.seat(target)?.role().team())
    }

    /// Applies the witch's decision. `save` removes the current
    /// `last_night_kill` from `pending_deaths`; `poison_target` schedules an
    /// additional death. The two may not both be exercised the same night.
    pub fn apply_witch_action(
        &mut self,
        save: bool,
        poison_target: Option<Position>,
    ) -> Result<(), StateError> {
        if save && poison_target.is_some() {
            return Err(StateError::SaveAndPoisonSameNight);
        }
        if save {
            if !self.witch_state.has_antidote {
                return Err(StateError::PotionAlreadyUsed { potion: "antidote" });
            }
            if let Some(victim) = self.last_night_kill {
                self.pending_deaths.remove(&victim);
            }
            self.witch_state.has_antidote = false;
        }
        if let Some(target) = poison_target {
            if !self.witch_state.has_poison {
                return Err(StateError::PotionAlreadyUsed { potion: "poison" });
            }
            if !self.is_alive(target)? {
                return Err(StateError::SeatNotAlive { seat: target });
            }
            self.pending_deaths.insert(target, DeathCause::Poisoned);
            self.witch_state.has_poison = false;
        }
        Ok(())
    }

    /// Applies every scheduled death, flipping `alive` and recording cause
    /// and day. Returns the seats that died, ascending, for the caller to
    /// react to (e.g. hunter cascade, narration).
    pub fn apply_pending_deaths(&mut self) -> Result<Vec<(Position, DeathCause)>, StateError> {
        let day = self.day_number;
        let entries: Vec<(Position, DeathCause)> = self
            .pending_deaths
            .iter()
            .map(|(&s, &c)| (s, c))
            .collect();
        for (seat, cause) in &entries {
            if !self.is_alive(*seat)? {
                return Err(StateError::PendingDeathNotAlive { seat: *seat });
            }
            self.seat_mut(*seat)?.kill(*cause, day);
        }
        self.pending_deaths.clear();
        Ok(entries)
    }

    // -- hunter -------------------------------------------------------------

    pub fn schedule_hunter(&mut self, seat: Position) {
        self.hunter_pending = Some(seat);
    }

    pub fn take_hunter_pending(&mut self) -> Option<Position> {
        self.hunter_pending.take()
    }

    /// Immediately kills the hunter's chosen target (outside the batched
    /// `pending_deaths` resolution, since this happens mid-cascade).
    pub fn resolve_hunter_shot(&mut self, target: Position) -> Result<(), StateError> {
        if !self.is_alive(target)? {
            return Err(StateError::SeatNotAlive { seat: target });
        }
        let day = self.day_number;
        self.seat_mut(target)?.kill(DeathCause::ShotByHunter, day);
        Ok(())
    }

    // -- voting ---------------------------------------------------------------

    pub fn record_vote(&mut self, voter: Position, choice: VoteChoice) -> Result<(), StateError> {
        if !self.is_alive(voter)? {
            return Err(StateError::SeatNotAlive { seat: voter });
        }
        // A duplicate submission for the same round is rejected upstream by
        // the broker; here a second call simply overwrites, matching "first
        // accepted submission wins" being the broker's responsibility, not
        // the state model's.
        self.votes.entry(voter).or_insert(choice);
        Ok(())
    }

    pub fn clear_votes(&mut self) {
        self.votes.clear();
    }

    /// Highest vote count wins; ties yield no elimination.
    pub fn tally_votes(&self) -> VoteOutcome {
        let mut counts: BTreeMap<Position, usize> = BTreeMap::new();
        for choice in self.votes.values() {
            if let VoteChoice::Target(target) = choice {
                *counts.entry(*target).or_insert(0) += 1;
            }
        }
        let Some(&max) = counts.values().max() else {
            return VoteOutcome::Tie;
        };
        let mut leaders = counts.iter().filter(|(_, &c)| c == max);
        let first = leaders.next().map(|(&s, _)| s);
        match (first, leaders.next()) {
            (Some(seat), None) => VoteOutcome::Eliminate(seat),
            _ => VoteOutcome::Tie,
        }
    }

    pub fn eliminate_seat(&mut self, seat: Position) -> Result<(), StateError> {
        if !self.is_alive(seat)? {
            return Err(StateError::SeatNotAlive { seat });
        }
        let day = self.day_number;
        self.seat_mut(seat)?.kill(DeathCause::VotedOut, day);
        Ok(())
    }

    // -- win conditions ---------------------------------------------------

    /// Recomputes the winner from current alive counts. Idempotent: once a
    /// winner is set it is never overwritten by a later call.
    pub fn check_winner(&mut self) -> Winner {
        if self.winner.is_some() {
            return self.winner;
        }
        let wolves = self.alive_seats_of_team(Team::Werewolf).len();
        let total = self.alive_seats().len();
        let villagers = total - wolves;
        let decided = if villagers == 0 {
            Some(Team::Werewolf)
        } else if wolves == 0 {
            Some(Team::Villager)
        } else if wolves >= villagers {
            Some(Team::Werewolf)
        } else {
            None
        };
        if decided.is_some() {
            self.winner = decided;
        }
        self.winner
    }

    /// Ends the game. If a winner was already decided it is preserved; a
    /// cancellation passes `None` and leaves the game winnerless.
    pub fn end_game(&mut self, winner: Winner, now: DateTime<Utc>) {
        if self.winner.is_none() {
            self.winner = winner;
        }
        self.phase = Phase::Ended;
        self.ended_at = Some(now);
    }
}

fn role_rank(role: &Role) -> u8 {
    match role {
        Role::Werewolf => 0,
        Role::Seer => 1,
        Role::Witch => 2,
        Role::Hunter => 3,
        Role::Villager => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seat::ParticipantKind;

    fn standard_seats() -> Vec<Seat> {
        let roles = ww_roles::RoleCatalog.standard_composition();
        roles
            .into_iter()
            .enumerate()
            .map(|(i, role)| {
                let kind = if i == 0 {
                    ParticipantKind::Human
                } else {
                    ParticipantKind::Ai
                };
                Seat::new(i + 1, kind, format!("Seat {}", i + 1), role)
            })
            .collect()
    }

    #[test]
    fn new_game_validates_composition() {
        let game = Game::new("ABC123", standard_seats()).unwrap();
        assert_eq!(game.seats().len(), 10);
        assert_eq!(game.phase(), Phase::NightWolf);
        assert_eq!(game.day_number(), 1);
    }

    #[test]
    fn rejects_wrong_seat_count() {
        let mut seats = standard_seats();
        seats.pop();
        assert!(matches!(
            Game::new("ABC123", seats),
            Err(StateError::WrongSeatCount { found: 9 })
        ));
    }

    #[test]
    fn wolf_kill_then_witch_save_clears_pending_death() {
        let mut game = Game::new("ABC123", standard_seats()).unwrap();
        let wolf_target = game
            .seats()
            .iter()
            .find(|s| s.role() != Role::Werewolf)
            .unwrap()
            .seat_number();
        game.record_wolf_kill(Some(wolf_target)).unwrap();
        assert_eq!(game.pending_deaths().count(), 1);
        game.apply_witch_action(true, None).unwrap();
        assert_eq!(game.pending_deaths().count(), 0);
        assert!(!game.witch_state().has_antidote());
    }

    #[test]
    fn witch_cannot_save_and_poison_same_night() {
        let mut game = Game::new("ABC123", standard_seats()).unwrap();
        let target = game.seats()[0].seat_number();
        let err = game.apply_witch_action(true, Some(target)).unwrap_err();
        assert_eq!(err, StateError::SaveAndPoisonSameNight);
    }

    #[test]
    fn vote_tally_tie_yields_no_elimination() {
        let mut game = Game::new("ABC123", standard_seats()).unwrap();
        game.record_vote(1, VoteChoice::Target(2)).unwrap();
        game.record_vote(2, VoteChoice::Target(1)).unwrap();
        assert_eq!(game.tally_votes(), VoteOutcome::Tie);
    }

    #[test]
    fn vote_tally_picks_majority() {
        let mut game = Game::new("ABC123", standard_seats()).unwrap();
        game.record_vote(1, VoteChoice::Target(5)).unwrap();
        game.record_vote(2, VoteChoice::Target(5)).unwrap();
        game.record_vote(3, VoteChoice::Target(1)).unwrap();
        assert_eq!(game.tally_votes(), VoteOutcome::Eliminate(5));
    }

    #[test]
    fn winner_decided_once_wolves_equal_villagers() {
        let mut game = Game::new("ABC123", standard_seats()).unwrap();
        // kill seats until 3 wolves vs 3 villagers remain (10 seats -> kill 4 non-wolves)
        let victims: Vec<Position> = game
            .seats()
            .iter()
            .filter(|s| s.role() != Role::Werewolf)
            .take(4)
            .map(|s| s.seat_number())
            .collect();
        for v in victims {
            game.eliminate_seat(v).unwrap();
        }
        assert_eq!(game.check_winner(), Some(Team::Werewolf));
        // further mutation does not change the decided winner
        assert_eq!(game.check_winner(), Some(Team::Werewolf));
    }
}
