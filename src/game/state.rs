//! Player and Match State
//!
//! Per-player records mutated by the engine during resolution, plus the
//! read-only snapshots handed out for reconnection.

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::hash::StateHasher;
use crate::game::card::{Card, CardId};

// =============================================================================
// PLAYER ID
// =============================================================================

/// Stable player identifier, as chosen by the client or issued by the server.
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Wrap an id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Issue a fresh random id (UUID v4).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Empty ids are never registered.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PlayerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// =============================================================================
// MATCH PHASE
// =============================================================================

/// Match lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPhase {
    /// Fewer than two players have joined.
    WaitingForPlayers,
    /// Collecting this turn's reveals.
    AwaitingReveals,
    /// Turn resolution in progress. Never observable from outside the engine.
    Resolving,
    /// All turns played.
    Ended,
}

impl fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchPhase::WaitingForPlayers => "waiting_for_players",
            MatchPhase::AwaitingReveals => "awaiting_reveals",
            MatchPhase::Resolving => "resolving",
            MatchPhase::Ended => "ended",
        };
        f.write_str(name)
    }
}

// =============================================================================
// PLAYER STATE
// =============================================================================

/// State of a single player in the match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerState {
    /// Player id
    pub id: PlayerId,

    /// Cards available to play, in draw order
    pub hand: Vec<Card>,

    /// Cards revealed this turn, in reveal order.
    /// Only populated while a turn is resolving.
    pub played_this_turn: Vec<Card>,

    /// Every distinct card played so far this match
    pub board: Vec<Card>,

    /// Accumulated score
    pub score: i32,

    /// Extra draws owed at the end of this turn
    pub pending_extra_draws: u32,
}

impl PlayerState {
    /// Create an empty player.
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            hand: Vec::new(),
            played_this_turn: Vec::new(),
            board: Vec::new(),
            score: 0,
            pending_extra_draws: 0,
        }
    }

    /// Clear everything for a new match.
    pub fn reset(&mut self) {
        self.hand.clear();
        self.played_this_turn.clear();
        self.board.clear();
        self.score = 0;
        self.pending_extra_draws = 0;
    }

    /// Add a card to the end of the hand.
    pub fn draw_card(&mut self, card: Card) {
        self.hand.push(card);
    }

    /// Remove the first hand card with this id.
    pub fn take_from_hand(&mut self, id: CardId) -> Option<Card> {
        let pos = self.hand.iter().position(|c| c.id == id)?;
        Some(self.hand.remove(pos))
    }

    /// Put a card on the board unless one with the same id is already there.
    pub fn add_to_board(&mut self, card: Card) {
        if !self.board.iter().any(|c| c.id == card.id) {
            self.board.push(card);
        }
    }

    /// Whether a card with this id is still in play this turn.
    pub fn has_in_play(&self, id: CardId) -> bool {
        self.played_this_turn.iter().any(|c| c.id == id)
    }

    /// Total power of the cards still in play this turn.
    pub fn power_in_play(&self) -> i32 {
        self.played_this_turn.iter().map(|c| c.power as i32).sum()
    }

    /// Drop per-turn state.
    pub fn clear_transient(&mut self) {
        self.played_this_turn.clear();
        self.pending_extra_draws = 0;
    }

    /// Hand card ids in draw order.
    pub fn hand_ids(&self) -> Vec<CardId> {
        self.hand.iter().map(|c| c.id).collect()
    }

    /// Board card ids in play order.
    pub fn board_ids(&self) -> Vec<CardId> {
        self.board.iter().map(|c| c.id).collect()
    }

    /// Hash this player's state.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_str(self.id.as_str());
        hasher.update_i32(self.score);
        hasher.update_i32_list(&self.hand_ids());
        hasher.update_i32_list(&self.board_ids());
        hasher.update_u32(self.pending_extra_draws);
    }

    /// Point-in-time view of this player.
    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            player_id: self.id.clone(),
            score: self.score,
            hand_card_ids: self.hand_ids(),
            board_card_ids: self.board_ids(),
        }
    }
}

// =============================================================================
// SNAPSHOTS
// =============================================================================

/// Read-only view of one player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Player id
    pub player_id: PlayerId,
    /// Score
    pub score: i32,
    /// Hand, in draw order
    pub hand_card_ids: Vec<CardId>,
    /// Board, in play order
    pub board_card_ids: Vec<CardId>,
}

/// Read-only view of the whole match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    /// Current turn (1-based)
    pub turn: u32,
    /// Turns in the match
    pub total_turns: u32,
    /// Players in seat order
    pub players: Vec<PlayerSnapshot>,
}
