//! Game Logic Module
//!
//! The duel rules. Deterministic given the engine seed and the player ids.
//!
//! ## Module Structure
//!
//! - `card`: Card definitions and ability kinds
//! - `catalog`: Card catalog loaded from JSON
//! - `ability`: Ability effects
//! - `state`: Player state, phases, snapshots
//! - `events`: Events queued by the engine for the transport
//! - `timer`: Per-turn countdown
//! - `engine`: The match state machine and turn resolution

pub mod card;
pub mod catalog;
pub mod ability;
pub mod state;
pub mod events;
pub mod timer;
pub mod engine;

// Re-export key types
pub use card::{AbilityKind, Card, CardId};
pub use catalog::{CardCatalog, CatalogError};
pub use state::{MatchPhase, MatchSnapshot, PlayerId, PlayerSnapshot, PlayerState};
pub use events::{AbilityEvent, MatchEvent, MatchResult, TurnResult};
pub use engine::{EngineError, MatchConfig, MatchEngine};
