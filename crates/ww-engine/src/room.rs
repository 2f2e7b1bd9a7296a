//! The imperative shell: spawns and owns the background task that drives an
//! `Engine`'s phase loop, and exposes the external control surface (start,
//! pause, resume, stop, submit a human action, read a snapshot) without
//! handing out `&mut Engine` to callers. Mirrors the corpus's own room/engine
//! split — a thin async-task wrapper around a synchronous-feeling core.

use std::sync::Arc;

use rand::seq::SliceRandom;
use tokio::task::JoinHandle;
use ww_audit::AuditStore;
use ww_broker::{BrokerError, PromptBroker};
use ww_bus::EventBus;
use ww_core::{Position, Unique, ID};
use ww_llm::LlmClient;
use ww_roles::{ActionKind, RoleCatalog};
use ww_state::{ActionPayload, Game, ParticipantKind, Seat, VoteChoice};

use crate::config::EngineConfig;
use crate::control::{pause_pair, stop_pair, PauseHandle, StopHandle};
use crate::engine::{Engine, StepOutcome};
use crate::repository::{GameRepository, RoomStatus};

/// Shuffles the standard 10-seat role composition and assigns one seat to
/// the human observer, the rest to AI. `display_names` must have exactly
/// `ww_core::SEAT_COUNT` entries, indexed by seat number (seat 1 at index 0).
pub fn assign_roles(human_seat: Position, display_names: &[String]) -> Vec<Seat> {
    assert_eq!(display_names.len(), ww_core::SEAT_COUNT, "one display name per seat");
    let mut roles = RoleCatalog.standard_composition();
    roles.shuffle(&mut rand::thread_rng());
    roles
        .into_iter()
        .enumerate()
        .map(|(i, role)| {
            let seat_number = i + 1;
            let kind = if seat_number == human_seat {
                ParticipantKind::Human
            } else {
                ParticipantKind::Ai
            };
            Seat::new(seat_number, kind, display_names[i].clone(), role)
        })
        .collect()
}

/// A running (or just-finished) game, as seen from outside the engine. Holds
/// the control handles and the join handle of the background scheduler task;
/// dropping this without calling `stop` leaves the task running to
/// completion on its own.
pub struct GameRoom<B: EventBus, R: GameRepository> {
    game_id: ID<Game>,
    room_code: String,
    broker: Arc<PromptBroker<B>>,
    repo: Arc<R>,
    stop: StopHandle,
    pause: PauseHandle,
    task: JoinHandle<()>,
}

impl<B: EventBus + 'static, R: GameRepository + 'static> GameRoom<B, R> {
    /// Starts a brand-new game: marks the room `InProgress`, spawns the
    /// scheduler task, and returns the handle immediately — the first phase
    /// (`NIGHT_WOLF`) begins running in the background.
    pub fn start_game<L, A>(
        game: Game,
        config: EngineConfig,
        llm: Arc<L>,
        bus: Arc<B>,
        audit: Arc<A>,
        repo: Arc<R>,
    ) -> Self
    where
        L: LlmClient + 'static,
        A: AuditStore + 'static,
    {
        Self::spawn(game, config, llm, bus, audit, repo)
    }

    /// Rebuilds a room from its last persisted snapshot and resumes the
    /// scheduler task from the persisted phase. Returns `None` if no
    /// snapshot exists for `room_code`. No deadline state survives a
    /// restart — every phase recomputes a fresh deadline from `now` the
    /// first time it asks a seat for input after recovery.
    pub async fn recover<L, A>(
        room_code: &str,
        config: EngineConfig,
        llm: Arc<L>,
        bus: Arc<B>,
        audit: Arc<A>,
        repo: Arc<R>,
    ) -> Option<Self>
    where
        L: LlmClient + 'static,
        A: AuditStore + 'static,
    {
        let game = repo.load_game_snapshot(room_code).await?;
        Some(Self::spawn(game, config, llm, bus, audit, repo))
    }

    fn spawn<L, A>(game: Game, config: EngineConfig, llm: Arc<L>, bus: Arc<B>, audit: Arc<A>, repo: Arc<R>) -> Self
    where
        L: LlmClient + 'static,
        A: AuditStore + 'static,
    {
        let game_id = game.id();
        let room_code = game.room_code().to_string();
        let broker = Arc::new(PromptBroker::new(bus.clone()));
        let (stop, mut stop_signal) = stop_pair();
        let (pause, mut pause_signal) = pause_pair();
        let mut engine = Engine::new(game, config, llm, bus, audit, repo.clone(), broker.clone());

        let task_repo = repo.clone();
        let task_room_code = room_code.clone();
        let task = tokio::spawn(async move {
            task_repo.set_room_status(&task_room_code, RoomStatus::InProgress).await;
            loop {
                if stop_signal.is_stopped() {
                    engine.cancel().await;
                    break;
                }
                match engine.step(&mut pause_signal).await {
                    Ok(StepOutcome::Continue) => continue,
                    Ok(StepOutcome::Ended) => break,
                    Err(err) => {
                        engine.abort(&err).await;
                        break;
                    }
                }
            }
            task_repo.set_room_status(&task_room_code, RoomStatus::Ended).await;
        });

        Self {
            game_id,
            room_code,
            broker,
            repo,
            stop,
            pause,
            task,
        }
    }

    pub fn game_id(&self) -> ID<Game> {
        self.game_id
    }

    pub fn room_code(&self) -> &str {
        &self.room_code
    }

    /// Best-effort pause: the scheduler finishes any in-flight prompt before
    /// suspending, then issues no new ones until `resume`.
    pub fn pause(&self) {
        self.pause.pause();
    }

    pub fn resume(&self) {
        self.pause.resume();
    }

    /// Requests the scheduler stop after its current phase step. The game
    /// ends winnerless, same as `Engine::cancel`.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Blocks until the background scheduler task has exited (game ended,
    /// stopped, or aborted).
    pub async fn join(self) {
        let _ = self.task.await;
    }

    /// Delivers a human seat's submission for the currently pending request.
    /// A submission with no matching pending request (wrong seat, wrong
    /// action kind, already resolved) is rejected without touching game
    /// state.
    pub fn submit_action(&self, seat: Position, kind: ActionKind, payload: ActionPayload) -> Result<(), BrokerError> {
        self.broker.submit(self.game_id, seat, kind, payload)
    }

    pub fn submit_speech(&self, seat: Position, text: String) -> Result<(), BrokerError> {
        self.submit_action(seat, ActionKind::Speech, ActionPayload::Speech(text))
    }

    pub fn submit_last_words(&self, seat: Position, text: String) -> Result<(), BrokerError> {
        self.submit_action(seat, ActionKind::LastWords, ActionPayload::LastWords(text))
    }

    pub fn submit_vote(&self, seat: Position, choice: VoteChoice) -> Result<(), BrokerError> {
        self.submit_action(seat, ActionKind::Vote, ActionPayload::Vote(choice))
    }

    pub fn submit_wolf_kill(&self, seat: Position, target: Option<Position>) -> Result<(), BrokerError> {
        self.submit_action(seat, ActionKind::WolfKill, ActionPayload::WolfKill(target))
    }

    pub fn submit_seer_check(&self, seat: Position, target: Option<Position>) -> Result<(), BrokerError> {
        self.submit_action(seat, ActionKind::SeerCheck, ActionPayload::SeerCheck(target))
    }

    pub fn submit_witch_act(
        &self,
        seat: Position,
        save: bool,
        poison_target: Option<Position>,
    ) -> Result<(), BrokerError> {
        self.submit_action(seat, ActionKind::WitchAct, ActionPayload::WitchAct { save, poison_target })
    }

    pub fn submit_hunter_shoot(&self, seat: Position, target: Option<Position>) -> Result<(), BrokerError> {
        self.submit_action(seat, ActionKind::HunterShoot, ActionPayload::HunterShoot(target))
    }

    /// Reads back the last snapshot the scheduler persisted. `None` only if
    /// nothing has been saved yet (the task hasn't run its first step).
    pub async fn snapshot(&self) -> Option<Game> {
        self.repo.load_game_snapshot(&self.room_code).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_roles_seats_human_at_requested_position() {
        let names: Vec<String> = (1..=ww_core::SEAT_COUNT).map(|i| format!("Player {i}")).collect();
        let seats = assign_roles(4, &names);
        assert_eq!(seats.len(), ww_core::SEAT_COUNT);
        let human_count = seats.iter().filter(|s| s.participant_kind() == ParticipantKind::Human).count();
        assert_eq!(human_count, 1);
        assert_eq!(
            seats.iter().find(|s| s.participant_kind() == ParticipantKind::Human).unwrap().seat_number(),
            4
        );
    }

    #[test]
    fn assign_roles_preserves_standard_composition() {
        let names: Vec<String> = (1..=ww_core::SEAT_COUNT).map(|i| format!("Player {i}")).collect();
        let seats = assign_roles(1, &names);
        let roles: Vec<_> = seats.iter().map(|s| s.role()).collect();
        assert_eq!(roles.iter().filter(|r| **r == ww_roles::Role::Werewolf).count(), 3);
        assert_eq!(roles.iter().filter(|r| **r == ww_roles::Role::Hunter).count(), 1);
    }
}
