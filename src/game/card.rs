//! Card Definitions
//!
//! Immutable card data as it comes out of the catalog.

use serde::{Serialize, Deserialize};

/// Catalog identifier of a card.
pub type CardId = i32;

/// Ability printed on a card.
///
/// A closed set: the effect for each kind lives in [`crate::game::ability`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AbilityKind {
    /// Vanilla card, power only.
    None = 0,
    /// Add `value` to own score.
    GainPoints = 1,
    /// Move up to `value` points from the opponent to self.
    StealPoints = 2,
    /// Every card played this turn scores its power `value - 1` extra times.
    DoublePower = 3,
    /// Draw `value` extra cards at the end of the turn.
    DrawExtraCard = 4,
    /// Remove `value` random cards from the opponent's play this turn.
    DiscardOpponentRandomCard = 5,
    /// Remove the first `value` cards of the opponent's play this turn.
    DestroyOpponentCardInPlay = 6,
    /// Anything the catalog named that we do not recognise.
    #[default]
    Unknown = 7,
}

impl AbilityKind {
    /// Parse the catalog's ability type name.
    ///
    /// Missing, empty and unrecognised names all map to `Unknown`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "None" => AbilityKind::None,
            "GainPoints" => AbilityKind::GainPoints,
            "StealPoints" => AbilityKind::StealPoints,
            "DoublePower" => AbilityKind::DoublePower,
            "DrawExtraCard" => AbilityKind::DrawExtraCard,
            "DiscardOpponentRandomCard" => AbilityKind::DiscardOpponentRandomCard,
            "DestroyOpponentCardInPlay" => AbilityKind::DestroyOpponentCardInPlay,
            _ => AbilityKind::Unknown,
        }
    }

    /// Name as sent to clients in ability events.
    pub fn name(self) -> &'static str {
        match self {
            AbilityKind::None => "None",
            AbilityKind::GainPoints => "GainPoints",
            AbilityKind::StealPoints => "StealPoints",
            AbilityKind::DoublePower => "DoublePower",
            AbilityKind::DrawExtraCard => "DrawExtraCard",
            AbilityKind::DiscardOpponentRandomCard => "DiscardOpponentRandomCard",
            AbilityKind::DestroyOpponentCardInPlay => "DestroyOpponentCardInPlay",
            AbilityKind::Unknown => "Unknown",
        }
    }

    /// Abilities that remove opposing cards from the current turn.
    ///
    /// These resolve in their own pass ahead of every other ability.
    #[inline]
    pub fn is_destructive(self) -> bool {
        matches!(
            self,
            AbilityKind::DiscardOpponentRandomCard | AbilityKind::DestroyOpponentCardInPlay
        )
    }
}

/// A card definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// Catalog id.
    pub id: CardId,
    /// Display name.
    pub name: String,
    /// Cost counted against the per-turn limit.
    pub cost: u32,
    /// Points scored when the card survives the turn.
    pub power: u32,
    /// Ability kind.
    pub ability: AbilityKind,
    /// Ability magnitude.
    pub ability_value: i32,
    /// Flavour text from the catalog, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Card {
    /// Create a card without catalog text.
    pub fn new(
        id: CardId,
        name: impl Into<String>,
        cost: u32,
        power: u32,
        ability: AbilityKind,
        ability_value: i32,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            cost,
            power,
            ability,
            ability_value,
            text: None,
        }
    }

    /// Description shown when this card's ability fires.
    pub fn description(&self) -> String {
        if let Some(text) = self.text.as_deref().filter(|t| !t.is_empty()) {
            return text.to_string();
        }

        let v = self.ability_value;
        match self.ability {
            AbilityKind::None | AbilityKind::Unknown => String::new(),
            AbilityKind::GainPoints => format!("Gain {} points", v),
            AbilityKind::StealPoints => format!("Steal up to {} points from your opponent", v),
            AbilityKind::DoublePower => format!("Cards played this turn score x{} power", v),
            AbilityKind::DrawExtraCard => format!("Draw {} extra cards", v),
            AbilityKind::DiscardOpponentRandomCard => {
                format!("Discard {} random opposing cards in play", v)
            }
            AbilityKind::DestroyOpponentCardInPlay => {
                format!("Destroy the first {} opposing cards in play", v)
            }
        }
    }
}
