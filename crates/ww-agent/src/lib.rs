//! Given a seat and an action kind, produces that seat's decision via the
//! LLM streaming adapter: free text for speech, structured JSON for every
//! other action kind, each with a bounded retry-then-deterministic-fallback
//! policy so the game never stalls on a misbehaving model.

use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use rand::seq::SliceRandom;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use ww_audit::{AuditStore, NewLogEntry};
use ww_bus::{Event, EventBus, Visibility};
use ww_core::{Position, ID, AI_DECISION_MAX_RETRIES};
use ww_llm::{GenerationOptions, LlmClient, ResponseFormat};
use ww_state::{ActionPayload, Game, Phase, SeatSnapshot, VoteChoice};

/// Candidates a seat may choose among for a targeted action (votes, night
/// actions). The agent never sees seats outside this list — enforcing the
/// "agents must not receive private information not visible to their role"
/// rule is the caller's job (it builds this list from a `SeatSnapshot`).
#[derive(Debug, Clone)]
pub struct Candidates {
    pub targets: Vec<Position>,
    pub allow_skip: bool,
}

impl Candidates {
    fn accepts(&self, target: Option<Position>) -> bool {
        match target {
            Some(t) => self.targets.contains(&t),
            None => self.allow_skip,
        }
    }

    fn fallback(&self) -> Option<Position> {
        if self.allow_skip && self.targets.is_empty() {
            return None;
        }
        self.targets.choose(&mut rand::thread_rng()).copied()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TargetChoice {
    target: Option<Position>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WitchChoice {
    save: bool,
    poison_target: Option<Position>,
}

#[derive(Debug, Serialize, Deserialize)]
struct VoteChoiceJson {
    target: Option<Position>,
}

/// Produces AI decisions via an `LlmClient`. One instance is shared across
/// every game and seat.
pub struct AiAgentRunner<L: LlmClient, B: EventBus, A: AuditStore> {
    llm: Arc<L>,
    bus: Arc<B>,
    audit: Arc<A>,
}

impl<L: LlmClient, B: EventBus, A: AuditStore> AiAgentRunner<L, B, A> {
    pub fn new(llm: Arc<L>, bus: Arc<B>, audit: Arc<A>) -> Self {
        Self { llm, bus, audit }
    }

    /// Streams free text through the bus as `seat_speech_*` events, retrying
    /// once on a mid-stream failure before falling back to a short
    /// deterministic line, then appends the result to the audit log as
    /// PUBLIC. Shared by both `speech` and `last_words`, which differ only in
    /// prompt and audit `entry_type`.
    async fn stream_speech(
        &self,
        game_id: ID<Game>,
        day: u32,
        phase: Phase,
        seat: Position,
        entry_type: &str,
        prompt: String,
        fallback: String,
    ) -> String {
        self.bus.publish(game_id, Event::SeatSpeechStart { seat });

        let options = GenerationOptions {
            response_format: ResponseFormat::Free,
            ..Default::default()
        };

        let mut full_text = String::new();
        let mut succeeded = false;

        for attempt in 0..2 {
            let (_canceler, cancel) = ww_llm::cancel_pair();
            let stream = match self.llm.generate(prompt.clone(), options.clone(), cancel).await {
                Ok(stream) => stream,
                Err(err) => {
                    log::warn!("[agent {game_id}] seat {seat} attempt {attempt} failed to start: {err}");
                    continue;
                }
            };
            full_text.clear();
            let mut stream = stream;
            let mut failed_mid_stream = false;
            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(delta) => {
                        full_text.push_str(&delta);
                        self.bus.publish(game_id, Event::SeatSpeechChunk { seat, delta });
                    }
                    Err(err) => {
                        log::warn!("[agent {game_id}] seat {seat} stream error mid-speech: {err}");
                        failed_mid_stream = true;
                        break;
                    }
                }
            }
            if !failed_mid_stream {
                succeeded = true;
                break;
            }
        }

        if !succeeded {
            full_text = fallback;
        }

        self.bus.publish(
            game_id,
            Event::SeatSpeechEnd {
                seat,
                full_text: full_text.clone(),
            },
        );

        self.audit.append(
            game_id,
            NewLogEntry {
                entry_type: entry_type.to_string(),
                content: full_text.clone(),
                seat: Some(seat),
                day,
                phase,
                timestamp: Utc::now(),
                visibility: Visibility::Public,
                metadata: serde_json::Value::Null,
            },
        );

        full_text
    }

    /// Free-text speech, streamed through the bus and appended to the audit
    /// log as PUBLIC, matching the Host Narrator's own streaming idiom.
    pub async fn speech(
        &self,
        game_id: ID<Game>,
        day: u32,
        phase: Phase,
        seat: Position,
        snapshot: &SeatSnapshot,
        history: &str,
    ) -> ActionPayload {
        let alive = snapshot
            .public
            .seats
            .iter()
            .filter(|s| s.alive)
            .map(|s| s.display_name.clone())
            .collect::<Vec<_>>()
            .join(", ");
        let prompt = format!(
            "You are seat {seat} playing Werewolf as a {}. Alive players: {alive}. \
             Recent history: {history}. Speak to the table now — a few \
             sentences, in character, advancing your team's interests without \
             revealing secret information you wouldn't plausibly reveal.",
            snapshot.viewer_role,
        );
        let fallback = format!("Seat {seat} has nothing to add right now.");
        let text = self
            .stream_speech(game_id, day, phase, seat, "seat_speech", prompt, fallback)
            .await;
        ActionPayload::Speech(text)
    }

    /// Last words: identical streaming shape to `speech`, different prompt.
    pub async fn last_words(
        &self,
        game_id: ID<Game>,
        day: u32,
        phase: Phase,
        seat: Position,
        snapshot: &SeatSnapshot,
    ) -> ActionPayload {
        let prompt = format!(
            "You are seat {seat} playing Werewolf as a {}, and you have just been \
             eliminated. Give your final words to the table — brief, in \
             character.",
            snapshot.viewer_role,
        );
        let fallback = format!("Seat {seat} falls silent.");
        let text = self
            .stream_speech(game_id, day, phase, seat, "last_words", prompt, fallback)
            .await;
        ActionPayload::LastWords(text)
    }

    /// Runs the JSON-options retry-then-fallback loop shared by every
    /// structured decision kind: up to `AI_DECISION_MAX_RETRIES` retries with
    /// an increasingly strict reminder, then `None` so the caller can apply
    /// its own deterministic default.
    async fn decide_json<T, F>(&self, prompt: String, validate: F) -> Option<T>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> bool,
    {
        for attempt in 0..=AI_DECISION_MAX_RETRIES {
            let attempt_prompt = if attempt == 0 {
                prompt.clone()
            } else {
                format!(
                    "{prompt}\n\nYour previous answer was invalid. Respond with STRICTLY valid \
                     JSON matching the schema, nothing else."
                )
            };
            let options = GenerationOptions {
                response_format: ResponseFormat::JsonOptions,
                ..Default::default()
            };
            let (_canceler, cancel) = ww_llm::cancel_pair();
            let mut stream = match self.llm.generate(attempt_prompt, options, cancel).await {
                Ok(stream) => stream,
                Err(err) => {
                    log::warn!("[agent] JSON decision attempt {attempt} failed to start: {err}");
                    continue;
                }
            };
            let mut text = String::new();
            let mut failed = false;
            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(delta) => text.push_str(&delta),
                    Err(err) => {
                        log::warn!("[agent] JSON decision attempt {attempt} stream error: {err}");
                        failed = true;
                        break;
                    }
                }
            }
            if failed {
                continue;
            }
            match serde_json::from_str::<T>(&text) {
                Ok(parsed) if validate(&parsed) => return Some(parsed),
                Ok(_) => log::warn!("[agent] JSON decision attempt {attempt} failed validation"),
                Err(err) => log::warn!("[agent] JSON decision attempt {attempt} failed to parse: {err}"),
            }
        }
        None
    }

    pub async fn wolf_kill(&self, candidates: &Candidates, history: &str) -> ActionPayload {
        let prompt = format!(
            "You are a werewolf. Choose one seat among {:?} to kill tonight, or \
             null to empty-knife. History: {history}. Respond as JSON: \
             {{\"target\": <seat number or null>}}.",
            candidates.targets
        );
        let decided = self
            .decide_json::<TargetChoice, _>(prompt, |c| candidates.accepts(c.target))
            .await;
        // `decided` is already validated against `candidates`, so a `Some(TargetChoice
        // { target: None })` is a legitimate empty-knife — only a genuine parse/stream
        // failure (`None`) falls back to a random valid target.
        let target = match decided {
            Some(choice) => choice.target,
            None => candidates.fallback(),
        };
        ActionPayload::WolfKill(target)
    }

    pub async fn seer_check(&self, candidates: &Candidates) -> ActionPayload {
        let prompt = format!(
            "You are the Seer. Choose one seat among {:?} to investigate tonight, \
             or null to skip. Respond as JSON: {{\"target\": <seat number or null>}}.",
            candidates.targets
        );
        let decided = self
            .decide_json::<TargetChoice, _>(prompt, |c| candidates.accepts(c.target))
            .await;
        let target = match decided {
            Some(choice) => choice.target,
            None => candidates.fallback(),
        };
        ActionPayload::SeerCheck(target)
    }

    pub async fn hunter_shoot(&self, candidates: &Candidates) -> ActionPayload {
        let prompt = format!(
            "You are the Hunter and you have just died. Choose one seat among {:?} \
             to shoot, or null to hold fire. Respond as JSON: \
             {{\"target\": <seat number or null>}}.",
            candidates.targets
        );
        let decided = self
            .decide_json::<TargetChoice, _>(prompt, |c| candidates.accepts(c.target))
            .await;
        // A validated `None` here means the Hunter chose to hold fire, not that the
        // model failed to answer — only fall back to a random target on a genuine
        // decide failure.
        let target = match decided {
            Some(choice) => choice.target,
            None => candidates.fallback(),
        };
        ActionPayload::HunterShoot(target)
    }

    pub async fn witch_act(
        &self,
        wolf_target: Option<Position>,
        has_antidote: bool,
        has_poison: bool,
        poisonable: &[Position],
    ) -> ActionPayload {
        if !has_antidote && !has_poison {
            return ActionPayload::WitchAct {
                save: false,
                poison_target: None,
            };
        }
        let prompt = format!(
            "You are the Witch. Tonight's wolf target is {wolf_target:?} (has_antidote={has_antidote}). \
             You may poison one of {poisonable:?} (has_poison={has_poison}). You may not save and \
             poison the same night. Respond as JSON: \
             {{\"save\": <bool>, \"poison_target\": <seat number or null>}}.",
        );
        let decided = self
            .decide_json::<WitchChoice, _>(prompt, |c| {
                if c.save && c.poison_target.is_some() {
                    return false;
                }
                if c.save && !has_antidote {
                    return false;
                }
                match c.poison_target {
                    Some(t) => has_poison && poisonable.contains(&t),
                    None => true,
                }
            })
            .await;
        match decided {
            Some(choice) => ActionPayload::WitchAct {
                save: choice.save,
                poison_target: choice.poison_target,
            },
            None => ActionPayload::WitchAct {
                save: false,
                poison_target: None,
            },
        }
    }

    pub async fn vote(&self, candidates: &Candidates) -> ActionPayload {
        let prompt = format!(
            "You must cast a vote. Choose one seat among {:?}, or null to abstain. \
             Respond as JSON: {{\"target\": <seat number or null>}}.",
            candidates.targets
        );
        let decided = self
            .decide_json::<VoteChoiceJson, _>(prompt, |c| candidates.accepts(c.target))
            .await;
        let choice = match decided.and_then(|c| c.target) {
            Some(target) => VoteChoice::Target(target),
            None => VoteChoice::Abstain,
        };
        ActionPayload::Vote(choice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ww_audit::InMemoryAuditStore;
    use ww_bus::InMemoryEventBus;
    use ww_llm::FakeLlmClient;
    use ww_state::{ParticipantKind, PublicSeatView, PublicSnapshot};

    fn runner() -> (
        AiAgentRunner<FakeLlmClient, InMemoryEventBus, InMemoryAuditStore>,
        Arc<FakeLlmClient>,
    ) {
        let llm = Arc::new(FakeLlmClient::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let audit = Arc::new(InMemoryAuditStore::new());
        (AiAgentRunner::new(llm.clone(), bus, audit), llm)
    }

    fn seat_snapshot(viewer_seat: Position, viewer_role: ww_roles::Role) -> SeatSnapshot {
        SeatSnapshot {
            public: PublicSnapshot {
                game_id: ID::default(),
                room_code: "ABC123".into(),
                day_number: 1,
                phase: Phase::NightWolf,
                speech_cursor: None,
                winner: None,
                paused: false,
                seats: vec![PublicSeatView {
                    seat_number: viewer_seat,
                    participant_kind: ParticipantKind::Ai,
                    display_name: format!("Seat {viewer_seat}"),
                    alive: true,
                    role: None,
                    death_cause: None,
                    death_day: None,
                }],
            },
            viewer_seat,
            viewer_role,
            werewolf_teammates: Vec::new(),
        }
    }

    #[tokio::test]
    async fn wolf_kill_falls_back_to_valid_target_on_garbage_response() {
        let (runner, llm) = runner();
        llm.push_response("not json at all");
        llm.push_response("still not json");
        llm.push_response("nope");
        let candidates = Candidates {
            targets: vec![4, 5],
            allow_skip: true,
        };
        let decision = runner.wolf_kill(&candidates, "no history").await;
        match decision {
            ActionPayload::WolfKill(Some(target)) => assert!(candidates.targets.contains(&target)),
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[tokio::test]
    async fn vote_parses_valid_json_response() {
        let (runner, llm) = runner();
        llm.push_response(r#"{"target": 7}"#);
        let candidates = Candidates {
            targets: vec![6, 7, 8],
            allow_skip: true,
        };
        let decision = runner.vote(&candidates).await;
        assert_eq!(decision, ActionPayload::Vote(VoteChoice::Target(7)));
    }

    #[tokio::test]
    async fn witch_act_with_no_potions_skips_without_calling_llm() {
        let (runner, _llm) = runner();
        let decision = runner.witch_act(Some(3), false, false, &[]).await;
        assert_eq!(
            decision,
            ActionPayload::WitchAct {
                save: false,
                poison_target: None
            }
        );
    }

    #[tokio::test]
    async fn speech_streams_chunks_through_the_bus() {
        let llm = Arc::new(FakeLlmClient::new());
        llm.push_response("I think seat 3 is suspicious.");
        let bus = Arc::new(InMemoryEventBus::new());
        let audit = Arc::new(InMemoryAuditStore::new());
        let runner = AiAgentRunner::new(llm, bus.clone(), audit.clone());

        let snapshot = seat_snapshot(1, ww_roles::Role::Villager);
        let game_id = snapshot.public.game_id;
        let mut sub = bus.subscribe(game_id, Some(1), None);
        let text = runner
            .speech(game_id, 1, Phase::DaySpeech, 1, &snapshot, "no history yet")
            .await;
        assert_eq!(text, ActionPayload::Speech("I think seat 3 is suspicious.".into()));
        assert!(matches!(
            sub.stream.next().await,
            Some(Event::SeatSpeechStart { seat: 1 })
        ));

        let entries = audit.fetch(game_id, ww_audit::LevelFilter::Public, None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "I think seat 3 is suspicious.");
    }
}
