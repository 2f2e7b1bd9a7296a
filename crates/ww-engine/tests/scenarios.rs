//! End-to-end scenarios driving a full `GameRoom` through the event bus.
//!
//! Every seat is `ParticipantKind::Human` here, on purpose: `FakeLlmClient`
//! serves scripted responses from one shared FIFO queue, so concurrent AI
//! fan-out (three werewolves deciding at once) can consume script entries in
//! whatever order their tasks happen to poll — fine for unit tests with a
//! single caller, unreliable for an exact end-to-end script. Driving every
//! seat through `PromptBroker::submit` instead, keyed by the `seat` and
//! `action_kind` on each `WaitingForHuman` event, makes these scenarios
//! deterministic regardless of task scheduling order.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use ww_audit::InMemoryAuditStore;
use ww_bus::{Event, EventBus, InMemoryEventBus, Subscription};
use ww_core::{Position, Unique};
use ww_engine::{EngineConfig, GameRoom, InMemoryGameRepository};
use ww_llm::FakeLlmClient;
use ww_roles::{ActionKind, Role, RoleCatalog, Team};
use ww_state::{ActionPayload, Game, ParticipantKind, Seat, VoteChoice};

const WOLF_A: Position = 1;
const WOLF_B: Position = 2;
const WOLF_C: Position = 3;
const SEER: Position = 4;
const WITCH: Position = 5;
const HUNTER: Position = 6;

/// The standard composition in its fixed, unshuffled order: seats 1-3
/// werewolf, 4 seer, 5 witch, 6 hunter, 7-10 villager. Every seat is human so
/// the test harness controls every decision.
fn standard_human_seats() -> Vec<Seat> {
    RoleCatalog
        .standard_composition()
        .into_iter()
        .enumerate()
        .map(|(i, role)| Seat::new(i + 1, ParticipantKind::Human, format!("Seat {}", i + 1), role))
        .collect()
}

fn default_payload(kind: ActionKind) -> ActionPayload {
    match kind {
        ActionKind::Speech => ActionPayload::Speech("No comment.".into()),
        ActionKind::LastWords => ActionPayload::LastWords("Farewell.".into()),
        ActionKind::Vote => ActionPayload::Vote(VoteChoice::Abstain),
        ActionKind::WolfKill => ActionPayload::WolfKill(None),
        ActionKind::SeerCheck => ActionPayload::SeerCheck(None),
        ActionKind::WitchAct => ActionPayload::WitchAct {
            save: false,
            poison_target: None,
        },
        ActionKind::HunterShoot => ActionPayload::HunterShoot(None),
    }
}

type Scripts = HashMap<(Position, ActionKind), VecDeque<ActionPayload>>;

fn script(scripts: &mut Scripts, seat: Position, kind: ActionKind, payload: ActionPayload) {
    scripts.entry((seat, kind)).or_default().push_back(payload);
}

struct Harness {
    room: GameRoom<InMemoryEventBus, InMemoryGameRepository>,
    sub: Subscription,
}

impl Harness {
    fn new(seats: Vec<Seat>) -> Self {
        let game = Game::new("SCENARIO", seats).expect("standard composition is valid");
        let game_id = game.id();
        let bus = Arc::new(InMemoryEventBus::new());
        // Subscribing as a spectator with no seat still receives every
        // Public event (PhaseChanged, WaitingForHuman, PlayerDied, GameEnded)
        // — the only SeatPrivate traffic (NightActionResult, SpectatorMode)
        // is invisible here, which scenarios that need it subscribe for
        // directly instead.
        let sub = bus.subscribe(game_id, None, None);
        let audit = Arc::new(InMemoryAuditStore::new());
        let llm = Arc::new(FakeLlmClient::new());
        let repo = Arc::new(InMemoryGameRepository::new());
        let room = GameRoom::start_game(game, EngineConfig::default(), llm, bus, audit, repo);
        Self { room, sub }
    }

    fn with_seat_subscription(seats: Vec<Seat>, bus: Arc<InMemoryEventBus>, seat: Position) -> (Self, Subscription) {
        let game = Game::new("SCENARIO", seats).expect("standard composition is valid");
        let game_id = game.id();
        let spectator = bus.subscribe(game_id, None, None);
        let seat_sub = bus.subscribe(game_id, Some(seat), None);
        let audit = Arc::new(InMemoryAuditStore::new());
        let llm = Arc::new(FakeLlmClient::new());
        let repo = Arc::new(InMemoryGameRepository::new());
        let room = GameRoom::start_game(game, EngineConfig::default(), llm, bus, audit, repo);
        (
            Self {
                room,
                sub: spectator,
            },
            seat_sub,
        )
    }

    /// Answers every `WaitingForHuman` request from `scripts` (falling back
    /// to a harmless default), forwarding every observed event to
    /// `on_event`, until `on_event` returns `true` or the game ends.
    async fn drive(&mut self, scripts: &mut Scripts, mut on_event: impl FnMut(&Event) -> bool) {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(2), self.sub.stream.next())
                .await
                .expect("scenario stalled waiting for an event")
                .expect("event stream ended before the game did");
            if let Event::WaitingForHuman { seat, action_kind, .. } = &event {
                let payload = scripts
                    .get_mut(&(*seat, *action_kind))
                    .and_then(|q| q.pop_front())
                    .unwrap_or_else(|| default_payload(*action_kind));
                let _ = self.room.submit_action(*seat, *action_kind, payload);
            }
            let ended = matches!(event, Event::GameEnded { .. });
            let stop = on_event(&event);
            if stop || ended {
                break;
            }
        }
    }
}

#[tokio::test]
async fn wolf_kill_resolves_and_day_reaches_vote() {
    let mut harness = Harness::new(standard_human_seats());
    let mut scripts = Scripts::new();
    for wolf in [WOLF_A, WOLF_B, WOLF_C] {
        script(&mut scripts, wolf, ActionKind::WolfKill, ActionPayload::WolfKill(Some(7)));
    }

    let mut saw_death = false;
    harness
        .drive(&mut scripts, |event| {
            if matches!(event, Event::PlayerDied { seat: 7, cause: ww_state::DeathCause::KilledByWolf }) {
                saw_death = true;
            }
            matches!(event, Event::PhaseChanged { phase: ww_state::Phase::DayVote, .. })
        })
        .await;

    assert!(saw_death, "seat 7 should have died to the wolves' kill");
    let snapshot = harness.room.snapshot().await.expect("a snapshot was saved");
    assert!(!snapshot.is_alive(7).unwrap());
}

#[tokio::test]
async fn seer_check_reports_team_only_to_the_seer() {
    let bus = Arc::new(InMemoryEventBus::new());
    let (mut harness, mut seer_sub) =
        Harness::with_seat_subscription(standard_human_seats(), bus, SEER);
    let mut scripts = Scripts::new();
    script(&mut scripts, SEER, ActionKind::SeerCheck, ActionPayload::SeerCheck(Some(WOLF_A)));

    harness
        .drive(&mut scripts, |event| {
            matches!(event, Event::PhaseChanged { phase: ww_state::Phase::NightWitch, .. })
        })
        .await;

    let mut found = None;
    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(200), seer_sub.stream.next()).await {
        if let Event::NightActionResult { seat: SEER, payload } = event {
            found = Some(payload);
            break;
        }
    }
    assert_eq!(found.as_deref(), Some("WEREWOLF"));
}

#[tokio::test]
async fn witch_antidote_cancels_the_wolf_kill() {
    let mut harness = Harness::new(standard_human_seats());
    let mut scripts = Scripts::new();
    for wolf in [WOLF_A, WOLF_B, WOLF_C] {
        script(&mut scripts, wolf, ActionKind::WolfKill, ActionPayload::WolfKill(Some(7)));
    }
    script(
        &mut scripts,
        WITCH,
        ActionKind::WitchAct,
        ActionPayload::WitchAct {
            save: true,
            poison_target: None,
        },
    );

    harness
        .drive(&mut scripts, |event| {
            matches!(event, Event::PhaseChanged { phase: ww_state::Phase::DayVote, .. })
        })
        .await;

    let snapshot = harness.room.snapshot().await.expect("a snapshot was saved");
    assert!(snapshot.is_alive(7).unwrap(), "the witch's antidote should have saved seat 7");
    assert!(!snapshot.witch_state().has_antidote());
}

#[tokio::test]
async fn hunter_shot_cascades_after_a_vote_elimination() {
    let mut harness = Harness::new(standard_human_seats());
    let mut scripts = Scripts::new();
    for voter in [WOLF_A, WOLF_B, WOLF_C, SEER, WITCH] {
        script(&mut scripts, voter, ActionKind::Vote, ActionPayload::Vote(VoteChoice::Target(HUNTER)));
    }
    script(&mut scripts, HUNTER, ActionKind::HunterShoot, ActionPayload::HunterShoot(Some(7)));

    let mut hunter_died = false;
    let mut shot_victim_died = false;
    harness
        .drive(&mut scripts, |event| {
            match event {
                Event::PlayerDied { seat: HUNTER, cause: ww_state::DeathCause::VotedOut } => hunter_died = true,
                Event::PlayerDied { seat: 7, cause: ww_state::DeathCause::ShotByHunter } => shot_victim_died = true,
                _ => {}
            }
            matches!(event, Event::PhaseChanged { phase: ww_state::Phase::Resolve, .. })
        })
        .await;

    assert!(hunter_died, "the hunter should have been voted out");
    assert!(shot_victim_died, "the hunter's shot should have killed seat 7");
}

#[tokio::test]
async fn tied_vote_eliminates_no_one_and_the_game_continues() {
    let mut harness = Harness::new(standard_human_seats());
    let mut scripts = Scripts::new();
    for voter in [WOLF_A, WOLF_B, WOLF_C, SEER, WITCH] {
        script(&mut scripts, voter, ActionKind::Vote, ActionPayload::Vote(VoteChoice::Target(7)));
    }
    for voter in [HUNTER, 7, 8, 9, 10] {
        script(&mut scripts, voter, ActionKind::Vote, ActionPayload::Vote(VoteChoice::Target(8)));
    }

    let mut reached_night_two = false;
    harness
        .drive(&mut scripts, |event| {
            if let Event::PhaseChanged { phase: ww_state::Phase::NightWolf, day: 2 } = event {
                reached_night_two = true;
            }
            reached_night_two
        })
        .await;

    let snapshot = harness.room.snapshot().await.expect("a snapshot was saved");
    assert_eq!(snapshot.alive_seats().len(), ww_core::SEAT_COUNT, "a tie should eliminate no one");
    assert_eq!(snapshot.day_number(), 2);
}

#[tokio::test]
async fn werewolves_win_once_they_are_no_longer_outnumbered() {
    let mut harness = Harness::new(standard_human_seats());
    let mut scripts = Scripts::new();
    for (night, victim) in [(1, 7), (2, 8), (3, 9), (4, 10)] {
        let _ = night;
        for wolf in [WOLF_A, WOLF_B, WOLF_C] {
            script(&mut scripts, wolf, ActionKind::WolfKill, ActionPayload::WolfKill(Some(victim)));
        }
    }

    let mut winner = None;
    harness
        .drive(&mut scripts, |event| {
            if let Event::GameEnded { winner: w, .. } = event {
                winner = *w;
                true
            } else {
                false
            }
        })
        .await;

    assert_eq!(winner, Some(Team::Werewolf));
}
