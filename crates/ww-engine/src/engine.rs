//! The functional core: pure-ish phase-transition logic over a single
//! `Game`. `Engine` is the sole mutator of `Game`, matching the "single
//! logical writer" discipline the state model documents. `GameRoom` (the
//! imperative shell) owns an `Engine` and drives it in a loop; `Engine`
//! itself never spawns tasks or owns a run loop of its own.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ww_agent::{AiAgentRunner, Candidates};
use ww_audit::{AuditStore, NewLogEntry};
use ww_broker::{BrokerOutcome, PromptBroker};
use ww_bus::{Event, EventBus, NarrationKind, VoteCandidate, Visibility};
use ww_core::{Position, Unique, ID};
use ww_llm::LlmClient;
use ww_narrator::{build_prompt, HostNarrator};
use ww_roles::{ActionKind, Role, Team};
use ww_state::{ActionPayload, DeathCause, Game, ParticipantKind, Phase, VoteChoice, VoteOutcome, Winner};

use crate::config::EngineConfig;
use crate::control::PauseSignal;
use crate::error::EngineError;
use crate::repository::GameRepository;

/// Outcome of a single `Engine::step` call, for the imperative shell to
/// decide whether to keep looping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Ended,
}

/// Pure transition logic plus the component handles every phase needs to do
/// its work (narration, AI decisions, human prompts, audit, persistence).
/// `Engine` owns `Game` outright — nothing outside this module mutates it.
pub struct Engine<L: LlmClient, B: EventBus, A: AuditStore, R: GameRepository> {
    game: Game,
    config: EngineConfig,
    bus: Arc<B>,
    audit: Arc<A>,
    repo: Arc<R>,
    broker: Arc<PromptBroker<B>>,
    narrator: HostNarrator<L, B, A>,
    agent: AiAgentRunner<L, B, A>,
}

impl<L: LlmClient, B: EventBus, A: AuditStore, R: GameRepository> Engine<L, B, A, R> {
    pub fn new(
        game: Game,
        config: EngineConfig,
        llm: Arc<L>,
        bus: Arc<B>,
        audit: Arc<A>,
        repo: Arc<R>,
        broker: Arc<PromptBroker<B>>,
    ) -> Self {
        let narrator = HostNarrator::new(llm.clone(), bus.clone(), audit.clone());
        let agent = AiAgentRunner::new(llm, bus.clone(), audit.clone());
        Self {
            game,
            config,
            bus,
            audit,
            repo,
            broker,
            narrator,
            agent,
        }
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    fn game_id(&self) -> ID<Game> {
        self.game.id()
    }

    fn is_ai_seat(&self, seat: Position) -> bool {
        self.game
            .seat(seat)
            .map(|s| s.participant_kind() == ParticipantKind::Ai)
            .unwrap_or(true)
    }

    /// Issues a time-bounded human-input request, publishing `WaitingForHuman`
    /// via the broker. Callers match the returned outcome and fall back to
    /// the matching `ww-agent` call on `TimedOut`/`Canceled`, so a takeover
    /// is indistinguishable in shape from a native AI turn.
    async fn human_request(
        &self,
        pause: &mut PauseSignal,
        seat: Position,
        kind: ActionKind,
        timeout: Duration,
    ) -> BrokerOutcome {
        pause.wait_while_paused().await;
        let deadline = Utc::now() + chrono::Duration::from_std(timeout).unwrap_or_default();
        self.broker.request_human_input(self.game_id(), seat, kind, deadline).await
    }

    /// Advances the game by exactly one phase, handling that phase's actions
    /// and setting the next phase before returning. Callers loop until
    /// `StepOutcome::Ended`.
    pub async fn step(&mut self, pause: &mut PauseSignal) -> Result<StepOutcome, EngineError> {
        if self.game.started_at().is_none() {
            self.game.start(Utc::now());
        }
        let want_paused = pause.is_paused();
        if want_paused != self.game.paused() {
            if want_paused {
                self.game.pause();
            } else {
                self.game.resume();
            }
        }

        match self.game.phase() {
            Phase::NightWolf => self.phase_night_wolf(pause).await?,
            Phase::NightSeer => self.phase_night_seer(pause).await?,
            Phase::NightWitch => self.phase_night_witch(pause).await?,
            Phase::NightHunter => self.phase_night_hunter(pause).await?,
            Phase::DayAnnounce => self.phase_day_announce(pause).await?,
            Phase::DaySpeech => self.phase_day_speech(pause).await?,
            Phase::DayVote => self.phase_day_vote(pause).await?,
            Phase::DayLastWords => self.phase_day_last_words(pause).await?,
            Phase::Resolve => self.phase_resolve().await?,
            Phase::Ended => return Ok(StepOutcome::Ended),
        }

        self.repo.save_game_snapshot(&self.game).await;
        if self.game.phase() == Phase::Ended {
            Ok(StepOutcome::Ended)
        } else {
            Ok(StepOutcome::Continue)
        }
    }

    /// Aborts the game on an unrecoverable invariant violation: ends it
    /// winnerless, appends a DEBUG audit entry, and lets the caller's loop
    /// exit. The process itself keeps running — only this game is affected.
    pub async fn abort(&mut self, err: &EngineError) {
        log::error!("[engine {}] aborting game: {err}", self.game_id());
        self.audit.append(
            self.game_id(),
            NewLogEntry {
                entry_type: "internal_error".into(),
                content: err.to_string(),
                seat: None,
                day: self.game.day_number(),
                phase: self.game.phase(),
                timestamp: Utc::now(),
                visibility: Visibility::Debug,
                metadata: serde_json::Value::Null,
            },
        );
        self.finish_game(None).await;
    }

    /// Cancels the game in progress (external stop request): ends it
    /// winnerless without treating it as an error.
    pub async fn cancel(&mut self) {
        log::info!("[engine {}] canceling game on stop request", self.game_id());
        self.broker.cancel_all(self.game_id());
        self.finish_game(None).await;
    }

    // -- phase handlers ----------------------------------------------------

    async fn phase_night_wolf(&mut self, pause: &mut PauseSignal) -> Result<(), EngineError> {
        let day = self.game.day_number();
        self.narrate(pause, NarrationKind::NightStart, "the village sleeps").await;

        let wolves = self.game.alive_seats_of_team(Team::Werewolf);
        let targets: Vec<Position> = self
            .game
            .alive_seats()
            .into_iter()
            .filter(|s| !wolves.contains(s))
            .collect();
        let candidates = Candidates {
            targets,
            allow_skip: true,
        };

        // All alive wolves are prompted concurrently: each gets its own clone
        // of the pause signal so the fan-out doesn't fight `pause`'s single
        // `&mut` borrow, then every proposal is tallied serially below.
        let engine = &*self;
        let wolf_votes = futures::future::join_all(wolves.iter().map(|&wolf| {
            let candidates = &candidates;
            let mut wolf_pause = pause.clone();
            async move {
                let payload = if engine.is_ai_seat(wolf) {
                    engine.agent.wolf_kill(candidates, "the night is new").await
                } else {
                    match engine
                        .human_request(&mut wolf_pause, wolf, ActionKind::WolfKill, engine.config.timers.night_action)
                        .await
                    {
                        BrokerOutcome::Submitted(payload) => payload,
                        BrokerOutcome::TimedOut | BrokerOutcome::Canceled => {
                            engine.agent.wolf_kill(candidates, "the night is new").await
                        }
                    }
                };
                payload
            }
        }))
        .await;

        let mut proposals: BTreeMap<Position, usize> = BTreeMap::new();
        for payload in wolf_votes {
            if let ActionPayload::WolfKill(requested) = payload {
                if let Some(target) = sanitize_target(&candidates, requested) {
                    *proposals.entry(target).or_insert(0) += 1;
                }
            }
        }

        // Ascending `BTreeMap` iteration plus strict `>` keeps the first (i.e.
        // lowest-seat) entry among equal maxima, so ties break low per §4.9.
        let mut target: Option<Position> = None;
        let mut best_count = 0usize;
        for (&seat, &count) in &proposals {
            if target.is_none() || count > best_count {
                target = Some(seat);
                best_count = count;
            }
        }
        self.game.record_wolf_kill(target)?;
        log::debug!("[engine {}] night {day} wolves chose {target:?}", self.game_id());

        self.transition(Phase::NightSeer);
        Ok(())
    }

    async fn phase_night_seer(&mut self, pause: &mut PauseSignal) -> Result<(), EngineError> {
        let game_id = self.game_id();
        let seer_seat = self
            .game
            .seats()
            .iter()
            .find(|s| s.role() == Role::Seer && s.alive())
            .map(|s| s.seat_number());

        if let Some(seer) = seer_seat {
            let targets: Vec<Position> = self.game.alive_seats().into_iter().filter(|&s| s != seer).collect();
            let candidates = Candidates {
                targets,
                allow_skip: false,
            };

            let payload = if self.is_ai_seat(seer) {
                self.agent.seer_check(&candidates).await
            } else {
                match self
                    .human_request(pause, seer, ActionKind::SeerCheck, self.config.timers.night_action)
                    .await
                {
                    BrokerOutcome::Submitted(payload) => payload,
                    BrokerOutcome::TimedOut | BrokerOutcome::Canceled => self.agent.seer_check(&candidates).await,
                }
            };
            let requested = match payload {
                ActionPayload::SeerCheck(target) => target,
                _ => None,
            };
            if let Some(target) = sanitize_target(&candidates, requested) {
                let team = self.game.seer_check(target)?;
                let verdict = match team {
                    Team::Werewolf => "WEREWOLF",
                    Team::Villager => "NOT_WEREWOLF",
                };
                self.bus.publish(
                    game_id,
                    Event::NightActionResult {
                        seat: seer,
                        payload: verdict.to_string(),
                    },
                );
                self.audit.append(
                    game_id,
                    NewLogEntry {
                        entry_type: "seer_check".into(),
                        content: format!("seat {target}: {verdict}"),
                        seat: Some(seer),
                        day: self.game.day_number(),
                        phase: Phase::NightSeer,
                        timestamp: Utc::now(),
                        visibility: Visibility::SeatPrivate(seer),
                        metadata: serde_json::json!({ "target": target }),
                    },
                );
            }
        }

        self.transition(Phase::NightWitch);
        Ok(())
    }

    async fn phase_night_witch(&mut self, pause: &mut PauseSignal) -> Result<(), EngineError> {
        let witch_seat = self
            .game
            .seats()
            .iter()
            .find(|s| s.role() == Role::Witch && s.alive())
            .map(|s| s.seat_number());

        if let Some(witch) = witch_seat {
            let witch_state = self.game.witch_state();
            let wolf_target = self.game.last_night_kill();
            let self_save_allowed = !(self.config.witch_can_self_save_only_on_night_1
                && self.game.day_number() > 1
                && wolf_target == Some(witch));
            let poisonable: Vec<Position> =
                self.game.alive_seats().into_iter().filter(|&s| s != witch).collect();
            let has_antidote = witch_state.has_antidote() && self_save_allowed;
            let has_poison = witch_state.has_poison();

            if has_antidote || has_poison {
                let payload = if self.is_ai_seat(witch) {
                    self.agent.witch_act(wolf_target, has_antidote, has_poison, &poisonable).await
                } else {
                    match self
                        .human_request(pause, witch, ActionKind::WitchAct, self.config.timers.night_action)
                        .await
                    {
                        BrokerOutcome::Submitted(payload) => payload,
                        BrokerOutcome::TimedOut | BrokerOutcome::Canceled => {
                            self.agent.witch_act(wolf_target, has_antidote, has_poison, &poisonable).await
                        }
                    }
                };
                let (save, poison_target) = match payload {
                    ActionPayload::WitchAct { save, poison_target } => (save, poison_target),
                    _ => (false, None),
                };
                let (save, poison_target) =
                    sanitize_witch_action(has_antidote, has_poison, &poisonable, save, poison_target);
                if save || poison_target.is_some() {
                    self.game.apply_witch_action(save, poison_target)?;
                }
            }
        }

        self.transition(Phase::DayAnnounce);
        Ok(())
    }

    /// Runs any hunter shots scheduled by `phase_day_announce` for hunters
    /// killed overnight, then proceeds to `DAY_SPEECH`. Entered only when
    /// such a hunter death was found; otherwise `phase_day_announce` skips
    /// straight to `DAY_SPEECH` itself.
    async fn phase_night_hunter(&mut self, pause: &mut PauseSignal) -> Result<(), EngineError> {
        if self.run_hunter_cascade(pause).await? {
            return Ok(());
        }
        self.enter_day_speech().await;
        Ok(())
    }

    async fn phase_day_announce(&mut self, _pause: &mut PauseSignal) -> Result<(), EngineError> {
        let game_id = self.game_id();
        let deaths = self.game.apply_pending_deaths()?;
        let human_seat = self.game.human_seat();

        for (seat, cause) in &deaths {
            self.bus.publish(game_id, Event::PlayerDied { seat: *seat, cause: *cause });
            if Some(*seat) == human_seat {
                self.bus.publish(game_id, Event::SpectatorMode { seat: *seat });
            }
        }

        let detail = if deaths.is_empty() {
            "no one died overnight".to_string()
        } else {
            deaths
                .iter()
                .map(|(seat, cause)| format!("seat {seat} was {cause}"))
                .collect::<Vec<_>>()
                .join("; ")
        };
        let snapshot = self.game.public_snapshot();
        let prompt = build_prompt(NarrationKind::NightResolution, &snapshot, &detail);
        self.narrator
            .narrate(game_id, self.game.day_number(), Phase::DayAnnounce, NarrationKind::NightResolution, prompt)
            .await;

        if self.game.check_winner().is_some() {
            let winner = self.game.winner();
            self.finish_game(winner).await;
            return Ok(());
        }

        // Deaths are applied and narrated first; only now does a hunter
        // killed overnight get scheduled to shoot, per §4.9's
        // NIGHT_WITCH → DAY_ANNOUNCE → (if hunter died) NIGHT_HUNTER order.
        let mut hunter_died = false;
        for (seat, cause) in &deaths {
            if self.game.seat(*seat)?.role() != Role::Hunter {
                continue;
            }
            if *cause == DeathCause::Poisoned && !self.config.hunter_can_shoot_when_poisoned {
                continue;
            }
            self.game.schedule_hunter(*seat);
            hunter_died = true;
        }
        if hunter_died {
            self.transition(Phase::NightHunter);
            return Ok(());
        }

        self.enter_day_speech().await;
        Ok(())
    }

    /// Sets the speech cursor to the first alive seat, transitions to
    /// `DAY_SPEECH`, and narrates the start of the day. Shared by
    /// `phase_day_announce`'s no-cascade path and `phase_night_hunter`'s
    /// post-cascade path so the two don't drift.
    async fn enter_day_speech(&mut self) {
        let game_id = self.game_id();
        self.game.set_speech_cursor(self.game.alive_seats().first().copied());
        self.transition(Phase::DaySpeech);
        let snapshot = self.game.public_snapshot();
        let prompt = build_prompt(NarrationKind::DayStart, &snapshot, "the village gathers to talk");
        self.narrator
            .narrate(game_id, self.game.day_number(), Phase::DaySpeech, NarrationKind::DayStart, prompt)
            .await;
    }

    async fn phase_day_speech(&mut self, pause: &mut PauseSignal) -> Result<(), EngineError> {
        let order = self.game.alive_seats();
        let start_idx = match self.game.speech_cursor() {
            Some(seat) => order.iter().position(|&s| s == seat).unwrap_or(0),
            None => 0,
        };

        for &seat in &order[start_idx..] {
            self.game.set_speech_cursor(Some(seat));
            self.repo.save_game_snapshot(&self.game).await;
            self.run_speech_turn(pause, seat, ActionKind::Speech).await?;
        }

        self.game.set_speech_cursor(None);
        self.transition(Phase::DayVote);
        Ok(())
    }

    async fn phase_day_vote(&mut self, pause: &mut PauseSignal) -> Result<(), EngineError> {
        let game_id = self.game_id();
        let alive = self.game.alive_seats();
        let human_seat = self.game.human_seat();
        let deadline =
            Utc::now() + chrono::Duration::from_std(self.config.timers.vote).unwrap_or_default();

        for &seat in &alive {
            let agent_candidates = Candidates {
                targets: alive.iter().copied().filter(|&s| s != seat).collect(),
                allow_skip: true,
            };

            if Some(seat) == human_seat {
                let options: Vec<VoteCandidate> = alive
                    .iter()
                    .filter(|&&s| s != seat)
                    .map(|&s| VoteCandidate::Seat(s))
                    .chain(std::iter::once(VoteCandidate::Abstain))
                    .collect();
                self.bus.publish(
                    game_id,
                    Event::VoteOptions {
                        seat,
                        candidates: options,
                        deadline,
                    },
                );
            }

            let payload = if self.is_ai_seat(seat) {
                self.agent.vote(&agent_candidates).await
            } else {
                match self.human_request(pause, seat, ActionKind::Vote, self.config.timers.vote).await {
                    BrokerOutcome::Submitted(payload) => payload,
                    BrokerOutcome::TimedOut | BrokerOutcome::Canceled => self.agent.vote(&agent_candidates).await,
                }
            };
            let choice = match payload {
                ActionPayload::Vote(choice) => sanitize_vote(&agent_candidates, choice),
                _ => VoteChoice::Abstain,
            };
            self.game.record_vote(seat, choice)?;
            if Some(seat) == human_seat {
                self.bus.publish(game_id, Event::HumanVoteComplete { voter: seat, choice });
            }
        }

        let outcome = self.game.tally_votes();
        let detail = match outcome {
            VoteOutcome::Eliminate(seat) => format!("the village voted out seat {seat}"),
            VoteOutcome::Tie => "the vote ended in a tie, no one is eliminated".to_string(),
        };
        let snapshot = self.game.public_snapshot();
        let prompt = build_prompt(NarrationKind::VoteResult, &snapshot, &detail);
        self.narrator
            .narrate(game_id, self.game.day_number(), Phase::DayVote, NarrationKind::VoteResult, prompt)
            .await;

        match outcome {
            VoteOutcome::Eliminate(seat) => {
                self.game.eliminate_seat(seat)?;
                self.game.clear_votes();
                self.bus.publish(game_id, Event::PlayerDied { seat, cause: DeathCause::VotedOut });
                if Some(seat) == human_seat {
                    self.bus.publish(game_id, Event::SpectatorMode { seat });
                }
                if self.game.check_winner().is_some() {
                    let winner = self.game.winner();
                    self.finish_game(winner).await;
                    return Ok(());
                }
                self.transition(Phase::DayLastWords);
            }
            VoteOutcome::Tie => {
                self.game.clear_votes();
                self.transition(Phase::Resolve);
            }
        }
        Ok(())
    }

    async fn phase_day_last_words(&mut self, pause: &mut PauseSignal) -> Result<(), EngineError> {
        let day = self.game.day_number();
        let eliminated = self
            .game
            .seats()
            .iter()
            .find(|s| !s.alive() && s.death_day() == Some(day) && s.death_cause() == Some(DeathCause::VotedOut))
            .map(|s| (s.seat_number(), s.role()));

        if let Some((seat, role)) = eliminated {
            self.run_speech_turn(pause, seat, ActionKind::LastWords).await?;
            if role == Role::Hunter {
                self.game.schedule_hunter(seat);
                if self.run_hunter_cascade(pause).await? {
                    return Ok(());
                }
            }
        }

        self.transition(Phase::Resolve);
        Ok(())
    }

    async fn phase_resolve(&mut self) -> Result<(), EngineError> {
        if self.game.check_winner().is_some() {
            let winner = self.game.winner();
            self.finish_game(winner).await;
            return Ok(());
        }
        self.game.next_day();
        self.transition(Phase::NightWolf);
        Ok(())
    }

    // -- shared helpers ------------------------------------------------------

    /// Runs the hunter-shot loop: every seat currently scheduled to shoot
    /// fires, and a shot that kills another hunter schedules that seat in
    /// turn. Returns `true` if the loop ended the game (caller should stop).
    async fn run_hunter_cascade(&mut self, pause: &mut PauseSignal) -> Result<bool, EngineError> {
        let game_id = self.game_id();
        while let Some(hunter_seat) = self.game.take_hunter_pending() {
            let pending: Vec<Position> = self.game.pending_deaths().map(|(s, _)| s).collect();
            let targets: Vec<Position> = self
                .game
                .alive_seats()
                .into_iter()
                .filter(|&s| s != hunter_seat && !pending.contains(&s))
                .collect();
            let candidates = Candidates {
                targets,
                allow_skip: true,
            };

            let payload = if self.is_ai_seat(hunter_seat) {
                self.agent.hunter_shoot(&candidates).await
            } else {
                match self
                    .human_request(pause, hunter_seat, ActionKind::HunterShoot, self.config.timers.night_action)
                    .await
                {
                    BrokerOutcome::Submitted(payload) => payload,
                    BrokerOutcome::TimedOut | BrokerOutcome::Canceled => self.agent.hunter_shoot(&candidates).await,
                }
            };
            let requested = match payload {
                ActionPayload::HunterShoot(target) => target,
                _ => None,
            };
            if let Some(target) = sanitize_target(&candidates, requested) {
                self.game.resolve_hunter_shot(target)?;
                self.bus.publish(
                    game_id,
                    Event::PlayerDied {
                        seat: target,
                        cause: DeathCause::ShotByHunter,
                    },
                );
                if Some(target) == self.game.human_seat() {
                    self.bus.publish(game_id, Event::SpectatorMode { seat: target });
                }
                if self.game.seat(target)?.role() == Role::Hunter {
                    self.game.schedule_hunter(target);
                }
                if self.game.check_winner().is_some() {
                    let winner = self.game.winner();
                    self.finish_game(winner).await;
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Runs one seat's speech or last-words turn to completion, publishing
    /// the same `seat_speech_*` events and PUBLIC audit entry regardless of
    /// whether the text came from a human or an AI takeover.
    async fn run_speech_turn(
        &mut self,
        pause: &mut PauseSignal,
        seat: Position,
        kind: ActionKind,
    ) -> Result<(), EngineError> {
        let game_id = self.game_id();
        let day = self.game.day_number();
        let phase = self.game.phase();
        let snapshot = self.game.seat_snapshot(seat)?;
        let history_text = self
            .narrator
            .public_history(game_id)
            .iter()
            .rev()
            .take(10)
            .map(|e| e.content.clone())
            .collect::<Vec<_>>()
            .join(" | ");

        let payload = if self.is_ai_seat(seat) {
            self.run_ai_speech(game_id, day, phase, seat, kind, &snapshot, &history_text).await
        } else {
            match self.human_request(pause, seat, kind, self.config.timers.speech).await {
                BrokerOutcome::Submitted(payload) => payload,
                BrokerOutcome::TimedOut | BrokerOutcome::Canceled => {
                    self.run_ai_speech(game_id, day, phase, seat, kind, &snapshot, &history_text).await
                }
            }
        };

        let text = match payload {
            ActionPayload::Speech(text) | ActionPayload::LastWords(text) => text,
            _ => String::new(),
        };

        // A human's submission never passed through the streaming helpers in
        // `ww-agent`, which is where speech/last-words events and audit
        // entries are normally emitted — emit the same shape here so a
        // client can't tell a human turn from an AI one.
        if self.game.seat(seat)?.participant_kind() == ParticipantKind::Human {
            self.bus.publish(game_id, Event::SeatSpeechStart { seat });
            self.bus.publish(
                game_id,
                Event::SeatSpeechEnd {
                    seat,
                    full_text: text.clone(),
                },
            );
            let entry_type = if kind == ActionKind::LastWords { "last_words" } else { "seat_speech" };
            self.audit.append(
                game_id,
                NewLogEntry {
                    entry_type: entry_type.into(),
                    content: text,
                    seat: Some(seat),
                    day,
                    phase,
                    timestamp: Utc::now(),
                    visibility: Visibility::Public,
                    metadata: serde_json::Value::Null,
                },
            );
        }
        Ok(())
    }

    async fn run_ai_speech(
        &self,
        game_id: ID<Game>,
        day: u32,
        phase: Phase,
        seat: Position,
        kind: ActionKind,
        snapshot: &ww_state::SeatSnapshot,
        history_text: &str,
    ) -> ActionPayload {
        match kind {
            ActionKind::LastWords => self.agent.last_words(game_id, day, phase, seat, snapshot).await,
            _ => self.agent.speech(game_id, day, phase, seat, snapshot, history_text).await,
        }
    }

    /// Issues a narration, suspending on pause like any other new prompt.
    async fn narrate(&mut self, pause: &mut PauseSignal, kind: NarrationKind, detail: &str) -> String {
        pause.wait_while_paused().await;
        let game_id = self.game_id();
        let snapshot = self.game.public_snapshot();
        let prompt = build_prompt(kind, &snapshot, detail);
        self.narrator
            .narrate(game_id, self.game.day_number(), self.game.phase(), kind, prompt)
            .await
    }

    fn transition(&mut self, phase: Phase) {
        self.game.set_phase(phase);
        self.bus.publish(
            self.game_id(),
            Event::PhaseChanged {
                day: self.game.day_number(),
                phase,
            },
        );
    }

    async fn finish_game(&mut self, winner: Winner) {
        let game_id = self.game_id();
        self.broker.cancel_all(game_id);
        self.game.end_game(winner, Utc::now());
        let reveal = self.game.reveal_snapshot();
        let detail = match winner {
            Some(team) => format!("the {team} team has won"),
            None => "the game has ended".to_string(),
        };
        let snapshot = self.game.public_snapshot();
        let prompt = build_prompt(NarrationKind::GameEnd, &snapshot, &detail);
        self.narrator
            .narrate(game_id, self.game.day_number(), Phase::Ended, NarrationKind::GameEnd, prompt)
            .await;
        self.bus.publish(game_id, Event::GameEnded { winner, reveal });
        self.repo.save_game_snapshot(&self.game).await;
    }
}

/// Clamps a requested target down to one this candidate list accepts,
/// falling back to a uniformly random valid choice (or `None`, if skipping
/// is allowed and there are no targets) otherwise — the same policy
/// `ww-agent` applies to a misbehaving AI response, applied here to a
/// human's out-of-bounds submission too.
fn sanitize_target(candidates: &Candidates, target: Option<Position>) -> Option<Position> {
    let accepted = match target {
        Some(t) => candidates.targets.contains(&t),
        None => candidates.allow_skip,
    };
    if accepted {
        return target;
    }
    use rand::seq::SliceRandom;
    if candidates.allow_skip && candidates.targets.is_empty() {
        None
    } else {
        candidates.targets.choose(&mut rand::thread_rng()).copied()
    }
}

fn sanitize_vote(candidates: &Candidates, choice: VoteChoice) -> VoteChoice {
    match choice {
        VoteChoice::Target(t) if candidates.targets.contains(&t) => VoteChoice::Target(t),
        _ => VoteChoice::Abstain,
    }
}

/// Mirrors `ww-agent`'s witch-decision validation for a human submission:
/// reject a save-and-poison-in-the-same-night combination, a save with no
/// antidote (or no self-save allowed), or a poison target outside the
/// poisonable list — falling back to "do nothing" rather than guessing.
fn sanitize_witch_action(
    has_antidote: bool,
    has_poison: bool,
    poisonable: &[Position],
    save: bool,
    poison_target: Option<Position>,
) -> (bool, Option<Position>) {
    if save && poison_target.is_some() {
        return (false, None);
    }
    let save = save && has_antidote;
    let poison_target = poison_target.filter(|t| has_poison && poisonable.contains(t));
    (save, poison_target)
}
