//! Core deterministic primitives.
//!
//! Randomness and hashing that the match engine builds on. Nothing here
//! touches the clock or the network.

pub mod rng;
pub mod hash;

// Re-export core types
pub use rng::DeterministicRng;
pub use hash::{compute_state_hash, StateHash, StateHasher};
