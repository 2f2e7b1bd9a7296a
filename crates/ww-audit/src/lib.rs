//! Append-only ordered log of typed game events, filterable by visibility
//! level and replayable to a reconnecting subscriber.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use ww_bus::Visibility;
use ww_core::{Position, Sequence, ID};
use ww_state::{Game, Phase};

/// A single append-only audit entry. `id` is assigned by the store and is
/// strictly increasing within a room in real append order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Sequence,
    pub entry_type: String,
    pub content: String,
    pub seat: Option<Position>,
    pub day: u32,
    pub phase: Phase,
    pub timestamp: DateTime<Utc>,
    pub visibility: Visibility,
    pub metadata: serde_json::Value,
}

/// An entry as submitted by a caller, before the store assigns `id`.
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub entry_type: String,
    pub content: String,
    pub seat: Option<Position>,
    pub day: u32,
    pub phase: Phase,
    pub timestamp: DateTime<Utc>,
    pub visibility: Visibility,
    pub metadata: serde_json::Value,
}

/// Which entries `fetch` should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelFilter {
    Public,
    All,
}

impl LevelFilter {
    fn admits(self, visibility: Visibility) -> bool {
        match self {
            LevelFilter::Public => matches!(visibility, Visibility::Public),
            LevelFilter::All => true,
        }
    }
}

/// Append-only, room-scoped audit log. The engine's sole write path for
/// durable history; reconnect catch-up reads exclusively through `fetch`.
pub trait AuditStore: Send + Sync {
    fn append(&self, game_id: ID<Game>, entry: NewLogEntry) -> LogEntry;
    fn fetch(&self, game_id: ID<Game>, level: LevelFilter, since_id: Option<Sequence>) -> Vec<LogEntry>;
}

#[derive(Default)]
struct RoomLog {
    next_id: Sequence,
    entries: Vec<LogEntry>,
}

/// In-memory `AuditStore`. A real deployment backs this with a relational
/// store behind the same trait; the engine never depends on the concrete
/// adapter.
#[derive(Default)]
pub struct InMemoryAuditStore {
    rooms: Mutex<HashMap<ID<Game>, RoomLog>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditStore for InMemoryAuditStore {
    fn append(&self, game_id: ID<Game>, entry: NewLogEntry) -> LogEntry {
        let mut rooms = self.rooms.lock().expect("audit mutex poisoned");
        let room = rooms.entry(game_id).or_default();
        let id = room.next_id;
        room.next_id += 1;
        let entry = LogEntry {
            id,
            entry_type: entry.entry_type,
            content: entry.content,
            seat: entry.seat,
            day: entry.day,
            phase: entry.phase,
            timestamp: entry.timestamp,
            visibility: entry.visibility,
            metadata: entry.metadata,
        };
        room.entries.push(entry.clone());
        entry
    }

    fn fetch(&self, game_id: ID<Game>, level: LevelFilter, since_id: Option<Sequence>) -> Vec<LogEntry> {
        let rooms = self.rooms.lock().expect("audit mutex poisoned");
        let Some(room) = rooms.get(&game_id) else {
            return Vec::new();
        };
        room.entries
            .iter()
            .filter(|e| since_id.map_or(true, |since| e.id >= since))
            .filter(|e| level.admits(e.visibility))
            .cloned()
            .collect()
    }
}
