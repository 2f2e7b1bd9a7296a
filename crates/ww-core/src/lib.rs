//! Core type aliases, identity types, constants, and logging setup shared by
//! every crate in the werewolf orchestration workspace.
#![allow(dead_code)]

// ============================================================================
// TYPE ALIASES
// ============================================================================
/// Seat index around the table (0-indexed, lowest-first ordering rules use this).
pub type Position = usize;
/// Monotonic sequence number for audit log entries and bus events within a room.
pub type Sequence = u64;
/// In-game day/night cycle counter, starting at 1.
pub type Cycle = u32;

// ============================================================================
// TRAITS
// ============================================================================
/// Random instance generation, used by tests and by deterministic-fallback
/// decision paths that still need *some* concrete value.
pub trait Arbitrary {
    /// Generate a uniformly random instance.
    fn random() -> Self;
}

/// Unique identifier accessor for domain entities.
pub trait Unique<T = Self> {
    fn id(&self) -> ID<T>;
}

// ============================================================================
// IDENTITY TYPES
// ============================================================================
use std::cmp::Ordering;
use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::hash::Hash;
use std::hash::Hasher;
use std::marker::PhantomData;

/// Generic ID wrapper providing compile-time type safety over `uuid::Uuid`.
///
/// `ID<Game>` and `ID<Seat>` are distinct types even though both are plain
/// UUIDs underneath, so a game id can never be passed where a seat id is
/// expected.
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ID<T> {
    inner: uuid::Uuid,
    #[serde(skip)]
    marker: PhantomData<T>,
}

impl<T> ID<T> {
    pub fn inner(&self) -> uuid::Uuid {
        self.inner
    }
    /// Cast `ID<T>` to `ID<U>`, preserving the underlying UUID.
    pub fn cast<U>(self) -> ID<U> {
        ID {
            inner: self.inner,
            marker: PhantomData,
        }
    }
}

impl<T> From<ID<T>> for uuid::Uuid {
    fn from(id: ID<T>) -> Self {
        id.inner()
    }
}
impl<T> From<uuid::Uuid> for ID<T> {
    fn from(inner: uuid::Uuid) -> Self {
        Self {
            inner,
            marker: PhantomData,
        }
    }
}

impl<T> Default for ID<T> {
    fn default() -> Self {
        Self {
            inner: uuid::Uuid::now_v7(),
            marker: PhantomData,
        }
    }
}

impl<T> Copy for ID<T> {}
impl<T> Clone for ID<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Eq for ID<T> {}
impl<T> PartialEq for ID<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<T> Ord for ID<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.inner.cmp(&other.inner)
    }
}
impl<T> PartialOrd for ID<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Hash for ID<T> {
    fn hash<H>(&self, state: &mut H)
    where
        H: Hasher,
    {
        self.inner.hash(state);
    }
}

impl<T> Debug for ID<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ID").field(&self.inner).finish()
    }
}
impl<T> Display for ID<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.inner, f)
    }
}

// ============================================================================
// GAME PARAMETERS
// ============================================================================
/// Number of seats at the table. Fixed per the data model.
pub const SEAT_COUNT: usize = 10;
/// Number of AI-controlled seats (all but the single human seat).
pub const AI_SEAT_COUNT: usize = SEAT_COUNT - 1;

/// Default per-action deadlines, in seconds, matching §5 of the specification.
pub const DEFAULT_SPEECH_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_VOTE_TIMEOUT_SECS: u64 = 45;
pub const DEFAULT_NIGHT_ACTION_TIMEOUT_SECS: u64 = 45;
pub const DEFAULT_LAST_WORDS_TIMEOUT_SECS: u64 = 30;

/// Maximum retries before an AI decision falls back to a deterministic default.
pub const AI_DECISION_MAX_RETRIES: usize = 2;

// ============================================================================
// RUNTIME UTILITIES
// ============================================================================
/// Initialize dual logging (terminal + rolling file), DEBUG to file, INFO to
/// terminal. Mirrors the corpus's own `init_logger`/`log()` setup.
pub fn init_logger() -> anyhow::Result<()> {
    std::fs::create_dir_all("logs")?;
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    let time = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time moves forward")
        .as_secs();
    let file = simplelog::WriteLogger::new(
        log::LevelFilter::Debug,
        config.clone(),
        std::fs::File::create(format!("logs/{time}.log"))?,
    );
    let term = simplelog::TermLogger::new(
        log::LevelFilter::Info,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    simplelog::CombinedLogger::init(vec![term, file]).map_err(|e| anyhow::anyhow!(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Game;

    #[test]
    fn id_cast_preserves_uuid() {
        let id: ID<Game> = ID::default();
        let raw: uuid::Uuid = id.into();
        let back: ID<Game> = raw.into();
        assert_eq!(id, back);
    }

    #[test]
    fn id_ordering_matches_uuid_ordering() {
        let a: ID<Game> = ID::default();
        let b: ID<Game> = ID::default();
        assert_eq!(a.cmp(&b), a.inner().cmp(&b.inner()));
    }

    #[test]
    fn seat_count_is_ten() {
        assert_eq!(SEAT_COUNT, 10);
        assert_eq!(AI_SEAT_COUNT, 9);
    }
}
