//! # Card Duel Server
//!
//! Authoritative match server for a two-player simultaneous-reveal card duel.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CARD DUEL SERVER                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │  └── hash.rs     - State hashing for verification            │
//! │                                                              │
//! │  game/           - Duel rules (deterministic)                │
//! │  ├── card.rs     - Cards and ability kinds                   │
//! │  ├── catalog.rs  - Card catalog                              │
//! │  ├── ability.rs  - Ability effects                           │
//! │  ├── state.rs    - Player state and snapshots                │
//! │  ├── events.rs   - Engine output events                      │
//! │  ├── timer.rs    - Per-turn countdown                        │
//! │  └── engine.rs   - Match state machine                       │
//! │                                                              │
//! │  network/        - Networking (non-deterministic)            │
//! │  ├── server.rs   - WebSocket server                          │
//! │  ├── protocol.rs - Message types                             │
//! │  ├── session.rs  - Match session management                  │
//! │  └── config.rs   - Server configuration                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! Given the same engine seed, the same player ids in the same join order
//! and the same reveals, a match deals, resolves and scores identically:
//! - No HashMap (uses BTreeMap for sorted iteration)
//! - All randomness from seeded Xorshift128+
//! - The engine never reads the clock; elapsed time is passed in

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::rng::DeterministicRng;
pub use game::card::{AbilityKind, Card, CardId};
pub use game::catalog::CardCatalog;
pub use game::engine::{MatchConfig, MatchEngine};
pub use game::state::{MatchPhase, PlayerId, PlayerState};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
