//! Card Catalog
//!
//! Immutable, id-keyed collection of card definitions. Loaded once at
//! startup and shared by every engine through an `Arc`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::core::rng::DeterministicRng;
use crate::game::card::{AbilityKind, Card, CardId};

/// Catalog loading errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Catalog file could not be read.
    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog JSON is malformed.
    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    /// Catalog has no cards; draws would be impossible.
    #[error("Catalog contains no cards")]
    Empty,

    /// Two definitions share an id.
    #[error("Duplicate card id {0}")]
    DuplicateId(CardId),
}

/// On-disk card list.
#[derive(Debug, Deserialize)]
struct CardListFile {
    #[serde(default)]
    cards: Vec<CardDefinition>,
}

/// On-disk card definition.
#[derive(Debug, Deserialize)]
struct CardDefinition {
    id: CardId,
    #[serde(default)]
    name: String,
    #[serde(default)]
    cost: u32,
    #[serde(default)]
    power: u32,
    #[serde(default)]
    ability: Option<AbilityDefinition>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AbilityDefinition {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    value: i32,
}

impl From<CardDefinition> for Card {
    fn from(def: CardDefinition) -> Self {
        let (ability, ability_value) = match def.ability {
            Some(a) => (AbilityKind::from_name(&a.kind), a.value),
            None => (AbilityKind::Unknown, 0),
        };
        Card {
            id: def.id,
            name: def.name,
            cost: def.cost,
            power: def.power,
            ability,
            ability_value,
            text: def.description,
        }
    }
}

/// Read-only card catalog.
#[derive(Debug, Clone)]
pub struct CardCatalog {
    /// Cards in file order (draws index into this).
    cards: Vec<Card>,
    /// Id to position in `cards`.
    index: BTreeMap<CardId, usize>,
}

impl CardCatalog {
    /// Build a catalog from card definitions.
    pub fn new(cards: Vec<Card>) -> Result<Self, CatalogError> {
        if cards.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut index = BTreeMap::new();
        for (i, card) in cards.iter().enumerate() {
            if index.insert(card.id, i).is_some() {
                return Err(CatalogError::DuplicateId(card.id));
            }
        }

        Ok(Self { cards, index })
    }

    /// Parse a catalog from its JSON form.
    pub fn from_json(s: &str) -> Result<Self, CatalogError> {
        let file: CardListFile = serde_json::from_str(s)?;
        Self::new(file.cards.into_iter().map(Card::from).collect())
    }

    /// Load a catalog file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&text)?;
        info!("Loaded {} cards from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    /// Look up a card by id.
    pub fn get(&self, id: CardId) -> Option<&Card> {
        self.index.get(&id).map(|&i| &self.cards[i])
    }

    /// Total cost of a reveal. Unknown ids cost nothing.
    pub fn cost_of(&self, ids: &[CardId]) -> u32 {
        ids.iter()
            .filter_map(|id| self.get(*id))
            .map(|c| c.cost)
            .sum()
    }

    /// Draw a card uniformly at random, with replacement.
    pub fn draw(&self, rng: &mut DeterministicRng) -> Card {
        // Non-empty by construction
        self.cards[rng.next_index(self.cards.len())].clone()
    }

    /// Number of cards.
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Always false for a constructed catalog.
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Iterate over all cards in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter()
    }
}
