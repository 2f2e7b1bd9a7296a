use serde::{Deserialize, Serialize};
use ww_core::Position;

use crate::game::VoteChoice;

/// The concrete result of a decision for a given action kind — produced
/// identically by a human submission (via the Prompt Broker) or an AI
/// takeover (via the AI Agent Runner), so the caller never special-cases
/// the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionPayload {
    Speech(String),
    Vote(VoteChoice),
    WolfKill(Option<Position>),
    SeerCheck(Option<Position>),
    WitchAct {
        save: bool,
        poison_target: Option<Position>,
    },
    HunterShoot(Option<Position>),
    LastWords(String),
}
