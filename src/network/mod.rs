//! Network Layer
//!
//! WebSocket server for duel clients.
//! This layer is **non-deterministic**; all game rules run through `game/`.

pub mod config;
pub mod protocol;
pub mod session;
pub mod server;

pub use config::{ConfigError, ServerConfig};
pub use protocol::{ClientMessage, ServerMessage, FullGameState, RevealResult};
pub use session::{JoinOutcome, MatchSession, SessionId, SessionError, SessionManager};
pub use server::{GameServer, GameServerError};
