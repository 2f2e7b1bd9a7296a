//! The external persistence boundary: room lifecycle and game-snapshot
//! storage. The engine depends only on this trait; a real deployment backs
//! it with a relational store without the engine knowing the difference —
//! the same split the corpus draws between `HistoryRepository` and its
//! concrete `Arc<Client>` adapter.

use std::collections::HashMap;
use std::sync::Mutex;

use ww_core::Position;
use ww_state::Game;

/// Coarse room lifecycle state, external to the game itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    Seating,
    InProgress,
    Ended,
}

/// The external room entity a game is attached to.
#[derive(Debug, Clone)]
pub struct Room {
    pub room_code: String,
    pub status: RoomStatus,
    pub participants: Vec<Position>,
    pub game_type_slug: String,
}

/// Repository interface consumed by the engine. `save_game_snapshot` and
/// `load_game_snapshot` are what restart recovery rebuilds in-memory state
/// from; `Game` already derives `Serialize`/`Deserialize`; a real adapter
/// just persists the serialized bytes.
#[allow(async_fn_in_trait)]
pub trait GameRepository: Send + Sync {
    async fn get_room(&self, room_code: &str) -> Option<Room>;
    async fn set_room_status(&self, room_code: &str, status: RoomStatus);
    async fn save_game_snapshot(&self, game: &Game);
    async fn load_game_snapshot(&self, room_code: &str) -> Option<Game>;
}

/// In-memory `GameRepository`. A process restart in this implementation
/// loses everything — a real deployment backs this with durable storage, at
/// which point restart recovery (§4.9) has something to rebuild from.
#[derive(Default)]
pub struct InMemoryGameRepository {
    rooms: Mutex<HashMap<String, Room>>,
    snapshots: Mutex<HashMap<String, Game>>,
}

impl InMemoryGameRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a room before a game starts (normally done by the external
    /// lobby/matchmaking subsystem, out of scope here).
    pub fn seed_room(&self, room: Room) {
        self.rooms
            .lock()
            .expect("repository mutex poisoned")
            .insert(room.room_code.clone(), room);
    }
}

impl GameRepository for InMemoryGameRepository {
    async fn get_room(&self, room_code: &str) -> Option<Room> {
        self.rooms
            .lock()
            .expect("repository mutex poisoned")
            .get(room_code)
            .cloned()
    }

    async fn set_room_status(&self, room_code: &str, status: RoomStatus) {
        if let Some(room) = self
            .rooms
            .lock()
            .expect("repository mutex poisoned")
            .get_mut(room_code)
        {
            room.status = status;
        }
    }

    async fn save_game_snapshot(&self, game: &Game) {
        self.snapshots
            .lock()
            .expect("repository mutex poisoned")
            .insert(game.room_code().to_string(), game.clone());
    }

    async fn load_game_snapshot(&self, room_code: &str) -> Option<Game> {
        self.snapshots
            .lock()
            .expect("repository mutex poisoned")
            .get(room_code)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ww_state::ParticipantKind;

    fn standard_seats() -> Vec<ww_state::Seat> {
        let roles = ww_roles::RoleCatalog.standard_composition();
        roles
            .into_iter()
            .enumerate()
            .map(|(i, role)| ww_state::Seat::new(i + 1, ParticipantKind::Ai, format!("Seat {}", i + 1), role))
            .collect()
    }

    #[tokio::test]
    async fn seeded_room_is_retrievable() {
        let repo = InMemoryGameRepository::new();
        repo.seed_room(Room {
            room_code: "ABC123".into(),
            status: RoomStatus::Seating,
            participants: vec![1],
            game_type_slug: "werewolf-10".into(),
        });
        let room = repo.get_room("ABC123").await.unwrap();
        assert_eq!(room.status, RoomStatus::Seating);
    }

    #[tokio::test]
    async fn snapshot_round_trips() {
        let repo = InMemoryGameRepository::new();
        let game = Game::new("ABC123", standard_seats()).unwrap();
        repo.save_game_snapshot(&game).await;
        let loaded = repo.load_game_snapshot("ABC123").await.unwrap();
        assert_eq!(loaded.room_code(), game.room_code());
        assert_eq!(loaded.phase(), game.phase());
    }

    #[tokio::test]
    async fn missing_snapshot_is_none() {
        let repo = InMemoryGameRepository::new();
        assert!(repo.load_game_snapshot("NOPE").await.is_none());
    }
}
