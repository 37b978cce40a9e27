//! Immutable card and deck catalog.
//!
//! Definitions are parsed once from the embedded JSON at construction and
//! are read-only afterwards, so lookups are side-effect free and the engine
//! may hold references across a whole resolution.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::game::types::{CardDefId, DeckId, Resources};

const CARDS_JSON: &str = include_str!("cards.json");
const DECKS_JSON: &str = include_str!("decks.json");

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    Unit,
    Spell,
    Building,
    Order,
    Hero,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardColor {
    Red,
    Purple,
    Blue,
    Green,
    White,
    Black,
    Neutral,
}

/// Combat statistics for anything that can stand on the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStats {
    pub attack: i32,
    pub health: i32,
    pub armor: i32,
    pub speed: i32,
    pub range: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpellEffect {
    pub effect: String,
    pub target_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingStats {
    pub health: i32,
    pub armor: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDefinition {
    pub id: CardDefId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub card_type: CardType,
    pub color: CardColor,
    #[serde(default)]
    pub gold_cost: u32,
    #[serde(default)]
    pub mana_cost: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<UnitStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spell: Option<SpellEffect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building: Option<BuildingStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hero: Option<UnitStats>,
    #[serde(default)]
    pub abilities: Vec<String>,
}

impl CardDefinition {
    pub fn cost(&self) -> Resources {
        Resources::new(self.gold_cost, self.mana_cost)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.abilities.iter().any(|a| a == tag)
    }

    /// Stats used when this card puts a body on the board.
    pub fn spawn_stats(&self) -> Option<&UnitStats> {
        self.unit.as_ref().or(self.hero.as_ref())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckEntry {
    pub card_id: CardDefId,
    pub quantity: u32,
}

/// A deck definition: a hero, an optional signature card, cheap pawns and
/// the main card list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckDefinition {
    pub id: DeckId,
    pub name: String,
    pub color: CardColor,
    pub hero: CardDefId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<CardDefId>,
    #[serde(default)]
    pub pawns: Vec<DeckEntry>,
    #[serde(default)]
    pub main_cards: Vec<DeckEntry>,
}

impl DeckDefinition {
    /// Total instances the deck expands to.
    pub fn card_count(&self) -> usize {
        let entries: u32 = self
            .pawns
            .iter()
            .chain(self.main_cards.iter())
            .map(|e| e.quantity)
            .sum();
        1 + usize::from(self.signature.is_some()) + entries as usize
    }
}

/// The seam the resolution engine consumes: definitions by id, nothing else.
pub trait CardLookup {
    fn lookup(&self, id: &CardDefId) -> Option<&CardDefinition>;
}

pub struct CardCatalog {
    cards: HashMap<CardDefId, CardDefinition>,
    decks: HashMap<DeckId, DeckDefinition>,
    deck_order: Vec<DeckId>,
}

impl CardCatalog {
    /// Parses the embedded card set. Panics only on a malformed build
    /// artifact, before the server accepts any traffic.
    pub fn builtin() -> Self {
        let cards: Vec<CardDefinition> =
            serde_json::from_str(CARDS_JSON).expect("embedded cards.json is valid");
        let decks: Vec<DeckDefinition> =
            serde_json::from_str(DECKS_JSON).expect("embedded decks.json is valid");
        let deck_order = decks.iter().map(|d| d.id.clone()).collect();
        Self {
            cards: cards.into_iter().map(|c| (c.id.clone(), c)).collect(),
            decks: decks.into_iter().map(|d| (d.id.clone(), d)).collect(),
            deck_order,
        }
    }

    pub fn deck(&self, id: &DeckId) -> Option<&DeckDefinition> {
        self.decks.get(id)
    }

    /// Prebuilt decks in catalog order.
    pub fn prebuilt_decks(&self) -> Vec<&DeckDefinition> {
        self.deck_order
            .iter()
            .filter_map(|id| self.decks.get(id))
            .collect()
    }

    pub fn cards(&self) -> impl Iterator<Item = &CardDefinition> {
        self.cards.values()
    }

    /// All cards, sorted by id for stable listings.
    pub fn all_cards(&self) -> Vec<&CardDefinition> {
        let mut out: Vec<_> = self.cards.values().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    pub fn cards_by_color(&self, color: CardColor) -> Vec<&CardDefinition> {
        let mut out: Vec<_> = self.cards.values().filter(|c| c.color == color).collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    pub fn cards_by_type(&self, card_type: CardType) -> Vec<&CardDefinition> {
        let mut out: Vec<_> = self
            .cards
            .values()
            .filter(|c| c.card_type == card_type)
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    pub fn decks_by_color(&self, color: CardColor) -> Vec<&DeckDefinition> {
        self.prebuilt_decks()
            .into_iter()
            .filter(|d| d.color == color)
            .collect()
    }
}

impl CardLookup for CardCatalog {
    fn lookup(&self, id: &CardDefId) -> Option<&CardDefinition> {
        self.cards.get(id)
    }
}
