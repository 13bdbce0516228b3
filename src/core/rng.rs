//! Deterministic Random Number Generator
//!
//! Uses Xorshift128+ algorithm for fast, high-quality, deterministic randomness.
//! Every card draw and every random discard in a match comes from one of these,
//! so a match replays identically from the same seed and the same reveals.

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

/// Deterministic PRNG using Xorshift128+ algorithm.
///
/// # Example
///
/// ```
/// use card_duel::core::rng::DeterministicRng;
///
/// let mut a = DeterministicRng::new(12345);
/// let mut b = DeterministicRng::new(12345);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to initialize the internal state, ensuring
    /// good distribution even from weak seeds.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Ensure state is never all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Create RNG for a match from the engine seed and the seated players.
    pub fn from_match_params<S: AsRef<str>>(seed: u64, player_ids: &[S]) -> Self {
        Self::new(derive_match_seed(seed, player_ids))
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Generate a random index in range [0, max).
    #[inline]
    pub fn next_index(&mut self, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        // Simple modulo - slight bias for very large max, but acceptable
        (self.next_u64() % max as u64) as usize
    }

    /// Select a random element from a slice.
    pub fn choose<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        if slice.is_empty() {
            None
        } else {
            let idx = self.next_index(slice.len());
            Some(&slice[idx])
        }
    }

    /// Get current state (for checkpointing/hashing).
    pub fn state(&self) -> [u64; 2] {
        self.state
    }
}

/// SplitMix64 for seed initialization.
/// Produces well-distributed values from sequential seeds.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive a match seed from the engine seed and the seated players.
///
/// Player ids are hashed in seat order, each length-prefixed so that
/// `["ab", "c"]` and `["a", "bc"]` never collide.
pub fn derive_match_seed<S: AsRef<str>>(seed: u64, player_ids: &[S]) -> u64 {
    let mut hasher = Sha256::new();

    // Domain separator
    hasher.update(b"CARD_DUEL_SEED_V1");
    hasher.update(seed.to_le_bytes());

    for pid in player_ids {
        let bytes = pid.as_ref().as_bytes();
        hasher.update((bytes.len() as u32).to_le_bytes());
        hasher.update(bytes);
    }

    let hash = hasher.finalize();

    let mut first = [0u8; 8];
    first.copy_from_slice(&hash[0..8]);
    u64::from_le_bytes(first)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_determinism() {
        let mut rng1 = DeterministicRng::new(12345);
        let mut rng2 = DeterministicRng::new(12345);

        for _ in 0..1000 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn test_rng_different_seeds() {
        let mut rng1 = DeterministicRng::new(12345);
        let mut rng2 = DeterministicRng::new(54321);

        // Very unlikely to match
        assert_ne!(rng1.next_u64(), rng2.next_u64());
    }

    #[test]
    fn test_next_index() {
        let mut rng = DeterministicRng::new(1234);

        for _ in 0..1000 {
            assert!(rng.next_index(7) < 7);
        }

        // Edge cases
        assert_eq!(rng.next_index(0), 0);
        assert_eq!(rng.next_index(1), 0);
    }

    #[test]
    fn test_choose() {
        let mut rng = DeterministicRng::new(42);
        let empty: [u8; 0] = [];
        assert!(rng.choose(&empty).is_none());

        let items = [10, 20, 30];
        for _ in 0..100 {
            let picked = rng.choose(&items).copied().unwrap();
            assert!(items.contains(&picked));
        }
    }

    #[test]
    fn test_derive_match_seed() {
        let seed1 = derive_match_seed(7, &["alice", "bob"]);
        let seed2 = derive_match_seed(7, &["alice", "bob"]);
        assert_eq!(seed1, seed2);

        // Seat order matters
        assert_ne!(seed1, derive_match_seed(7, &["bob", "alice"]));
        // Engine seed matters
        assert_ne!(seed1, derive_match_seed(8, &["alice", "bob"]));
        // Length prefix keeps boundaries distinct
        assert_ne!(
            derive_match_seed(7, &["ab", "c"]),
            derive_match_seed(7, &["a", "bc"]),
        );
    }

    #[test]
    fn test_state_checkpoint() {
        let mut rng = DeterministicRng::new(5555);

        for _ in 0..50 {
            rng.next_u64();
        }

        let mut restored = rng.clone();
        assert_eq!(restored.state(), rng.state());

        for _ in 0..10 {
            assert_eq!(restored.next_u64(), rng.next_u64());
        }
    }
}
