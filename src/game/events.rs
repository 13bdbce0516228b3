//! Match Events
//!
//! Everything the engine announces. Events are queued in order on the
//! engine's outbox and drained by the transport after each engine step.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::game::card::{AbilityKind, Card, CardId};
use crate::game::state::{MatchSnapshot, PlayerId};

/// One ability firing during resolution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityEvent {
    /// Owner of the card
    pub player_id: PlayerId,
    /// Card whose ability fired
    pub card_id: CardId,
    /// Ability kind
    pub ability: AbilityKind,
    /// Text for client-side notification
    pub description: String,
}

impl AbilityEvent {
    /// Record a card's ability firing for its owner.
    pub fn fired(player_id: &PlayerId, card: &Card) -> Self {
        Self {
            player_id: player_id.clone(),
            card_id: card.id,
            ability: card.ability,
            description: card.description(),
        }
    }
}

/// Result of one resolved turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnResult {
    /// Turn the match moves on to
    pub turn: u32,
    /// Score per player
    pub scores: BTreeMap<PlayerId, i32>,
    /// Board (every card played so far) per player
    pub boards: BTreeMap<PlayerId, Vec<CardId>>,
    /// Abilities in the order they fired
    pub ability_events: Vec<AbilityEvent>,
}

/// Final result of a match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Turn counter at the end
    pub turn: u32,
    /// Final score per player
    pub scores: BTreeMap<PlayerId, i32>,
    /// Final state
    pub snapshot: MatchSnapshot,
}

impl MatchResult {
    /// Highest score, or None on a draw.
    pub fn winner(&self) -> Option<&PlayerId> {
        let best = self.scores.values().copied().max()?;
        let mut leaders = self.scores.iter().filter(|(_, &s)| s == best);
        let first = leaders.next()?;
        if leaders.next().is_some() {
            None
        } else {
            Some(first.0)
        }
    }
}

/// Engine output, all addressed to both players.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MatchEvent {
    /// Two players are in; cards dealt.
    MatchStarted,
    /// A turn is open for reveals.
    TurnStarted(MatchSnapshot),
    /// Cosmetic countdown.
    Timer {
        /// Seconds left this turn
        time_left: f32,
    },
    /// The countdown ran out and the turn is being forced.
    TimerExpired,
    /// A turn was resolved.
    TurnResolved(TurnResult),
    /// The last turn was resolved.
    MatchEnded(MatchResult),
}
