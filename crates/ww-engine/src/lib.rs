//! The Phase Scheduler: the functional core (`Engine`) that owns `Game` and
//! advances it one phase at a time, plus the imperative shell (`GameRoom`)
//! that spawns and drives it and exposes the control surface a transport
//! layer (WebSocket handler, CLI, test harness) calls into.

pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod repository;
pub mod room;

pub use config::{DaySpeechStart, EngineConfig, TimerConfig};
pub use control::{pause_pair, stop_pair, PauseHandle, PauseSignal, StopHandle, StopSignal};
pub use engine::{Engine, StepOutcome};
pub use error::EngineError;
pub use repository::{GameRepository, InMemoryGameRepository, Room, RoomStatus};
pub use room::{assign_roles, GameRoom};
