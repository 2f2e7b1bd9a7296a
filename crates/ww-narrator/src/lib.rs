//! Converts state transitions into prompts for the LLM streaming adapter,
//! streams the resulting chunks through the event bus, and writes the
//! accumulated announcement to the audit log as a PUBLIC entry.
//!
//! Host narration is purely descriptive: it never mutates `Game`. It is also
//! uninterruptible by construction — the scheduler is the only caller and it
//! always awaits one narration's `HostAnnouncementEnd` before starting the
//! next, so no internal locking is needed here.

use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use ww_audit::{AuditStore, LevelFilter, NewLogEntry};
use ww_bus::{Event, EventBus, NarrationKind, Visibility};
use ww_core::ID;
use ww_llm::{GenerationOptions, LlmClient, ResponseFormat};
use ww_state::{Game, Phase, PublicSnapshot};

/// Builds the prompt text for a given narration trigger from the current
/// public snapshot. Kept deliberately simple — the Host is a narrator, not a
/// decision-maker, so its prompt only needs to describe what already
/// happened.
pub fn build_prompt(trigger: NarrationKind, snapshot: &PublicSnapshot, detail: &str) -> String {
    let alive = snapshot
        .seats
        .iter()
        .filter(|s| s.alive)
        .map(|s| s.display_name.clone())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "You are the Host narrating a game of Werewolf to its players. Day {}. \
         Moment: {trigger}. Alive players: {alive}. Details: {detail}. \
         Write one short, vivid, in-character announcement. Do not reveal any \
         secret role unless the details explicitly say it is now public.",
        snapshot.day_number
    )
}

fn fallback_line(trigger: NarrationKind) -> String {
    match trigger {
        NarrationKind::NightStart => "Night falls over the village once more.".to_string(),
        NarrationKind::NightResolution => {
            "The village wakes to find the night has taken its toll.".to_string()
        }
        NarrationKind::DayStart => "The sun rises on another uneasy day.".to_string(),
        NarrationKind::VoteResult => "The village has made its choice.".to_string(),
        NarrationKind::GameEnd => "The game has reached its conclusion.".to_string(),
        NarrationKind::Fallback => "The Host pauses, gathering their thoughts.".to_string(),
    }
}

/// Streams one narration through the bus and appends it to the audit log.
pub struct HostNarrator<L: LlmClient, B: EventBus, A: AuditStore> {
    llm: Arc<L>,
    bus: Arc<B>,
    audit: Arc<A>,
}

impl<L: LlmClient, B: EventBus, A: AuditStore> HostNarrator<L, B, A> {
    pub fn new(llm: Arc<L>, bus: Arc<B>, audit: Arc<A>) -> Self {
        Self { llm, bus, audit }
    }

    /// Runs one narration to completion: start → (chunk)* → end, with a
    /// single retry on LLM failure before falling back to a short
    /// deterministic line. Returns the final text.
    pub async fn narrate(
        &self,
        game_id: ID<Game>,
        day: u32,
        phase: Phase,
        trigger: NarrationKind,
        prompt: String,
    ) -> String {
        self.bus
            .publish(game_id, Event::HostAnnouncementStart { kind: trigger });

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
                    log::warn!("[narrator {game_id}] attempt {attempt} failed to start: {err}");
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
                        self.bus.publish(
                            game_id,
                            Event::HostAnnouncementChunk {
                                delta,
                                accumulated: full_text.clone(),
                            },
                        );
                    }
                    Err(err) => {
                        log::warn!("[narrator {game_id}] stream error mid-narration: {err}");
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
            full_text = fallback_line(trigger);
        }

        self.bus.publish(
            game_id,
            Event::HostAnnouncementEnd {
                full_text: full_text.clone(),
            },
        );

        self.audit.append(
            game_id,
            NewLogEntry {
                entry_type: "host_announcement".into(),
                content: full_text.clone(),
                seat: None,
                day,
                phase,
                timestamp: Utc::now(),
                visibility: Visibility::Public,
                metadata: serde_json::json!({ "trigger": trigger.to_string() }),
            },
        );

        full_text
    }

    /// Convenience: fetch the current PUBLIC audit backlog for a
    /// reconnecting subscriber. Narration writes land here too.
    pub fn public_history(&self, game_id: ID<Game>) -> Vec<ww_audit::LogEntry> {
        self.audit.fetch(game_id, LevelFilter::Public, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ww_audit::InMemoryAuditStore;
    use ww_bus::InMemoryEventBus;
    use ww_llm::FakeLlmClient;
    use ww_state::ParticipantKind;

    fn snapshot() -> PublicSnapshot {
        PublicSnapshot {
            game_id: ID::default(),
            room_code: "ABC123".into(),
            day_number: 1,
            phase: Phase::DayAnnounce,
            speech_cursor: None,
            winner: None,
            paused: false,
            seats: vec![ww_state::PublicSeatView {
                seat_number: 1,
                participant_kind: ParticipantKind::Ai,
                display_name: "Seat 1".into(),
                alive: true,
                role: None,
                death_cause: None,
                death_day: None,
            }],
        }
    }

    #[tokio::test]
    async fn narration_streams_and_appends_to_audit() {
        let llm = Arc::new(FakeLlmClient::new());
        llm.push_response("The night was quiet.");
        let bus = Arc::new(InMemoryEventBus::new());
        let audit = Arc::new(InMemoryAuditStore::new());
        let narrator = HostNarrator::new(llm, bus, audit.clone());

        let game_id = ID::default();
        let snap = snapshot();
        let prompt = build_prompt(NarrationKind::NightStart, &snap, "no deaths");
        let text = narrator
            .narrate(game_id, 1, Phase::DayAnnounce, NarrationKind::NightStart, prompt)
            .await;
        assert_eq!(text, "The night was quiet.");

        let entries = audit.fetch(game_id, LevelFilter::Public, None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "The night was quiet.");
    }
}
