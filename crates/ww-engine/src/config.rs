use std::time::Duration;

use ww_core::{
    DEFAULT_LAST_WORDS_TIMEOUT_SECS, DEFAULT_NIGHT_ACTION_TIMEOUT_SECS, DEFAULT_SPEECH_TIMEOUT_SECS,
    DEFAULT_VOTE_TIMEOUT_SECS,
};

/// Per-action deadlines. Mirrors the corpus's own `TimerConfig` shape, one
/// `Duration` field per action kind instead of per coarse game phase.
#[derive(Debug, Clone, Copy)]
pub struct TimerConfig {
    pub speech: Duration,
    pub vote: Duration,
    pub night_action: Duration,
    pub last_words: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            speech: Duration::from_secs(DEFAULT_SPEECH_TIMEOUT_SECS),
            vote: Duration::from_secs(DEFAULT_VOTE_TIMEOUT_SECS),
            night_action: Duration::from_secs(DEFAULT_NIGHT_ACTION_TIMEOUT_SECS),
            last_words: Duration::from_secs(DEFAULT_LAST_WORDS_TIMEOUT_SECS),
        }
    }
}

/// Which seat `DAY_SPEECH` starts from. Source material disagreed on this;
/// the lowest-alive-seat policy is the only one currently implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DaySpeechStart {
    #[default]
    LowestAliveSeat,
}

/// The three behavior flags left open, each wired to its documented default
/// rather than guessed away.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// If true, the witch may save herself only on the very first night.
    pub witch_can_self_save_only_on_night_1: bool,
    /// If true, a hunter killed by poison may still fire.
    pub hunter_can_shoot_when_poisoned: bool,
    pub day_speech_start: DaySpeechStart,
    pub timers: TimerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            witch_can_self_save_only_on_night_1: true,
            hunter_can_shoot_when_poisoned: true,
            day_speech_start: DaySpeechStart::LowestAliveSeat,
            timers: TimerConfig::default(),
        }
    }
}
