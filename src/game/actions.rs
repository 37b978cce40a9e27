//! Player intents submitted during Decision and their timing bands.

use serde::{Deserialize, Serialize};

use crate::catalog::{CardDefinition, CardType};
use crate::game::types::{CardInstanceId, Point, Seat, UnitId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    PlayCard,
    ActivateAbility,
}

/// Resolution window an action lands in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionSpeed {
    Fast,
    Normal,
    Slow,
}

impl ActionSpeed {
    pub fn as_step(self) -> &'static str {
        match self {
            ActionSpeed::Fast => "fast",
            ActionSpeed::Normal => "normal",
            ActionSpeed::Slow => "slow",
        }
    }
}

/// Ability parameters, parsed once at the dispatch boundary. The engine only
/// interprets the damage component; the rest travels to clients untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbilityPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub damage: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A single committed decision, speed already resolved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub seat: Seat,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_instance_id: Option<CardInstanceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_unit_id: Option<UnitId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
    pub speed: ActionSpeed,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<AbilityPayload>,
}

/// The wire shape of an action inside `submit_actions`: seat comes from the
/// envelope and speed may be omitted, in which case it is inferred from the
/// card definition.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDraft {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default)]
    pub card_instance_id: Option<CardInstanceId>,
    #[serde(default)]
    pub source_unit_id: Option<UnitId>,
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub position: Option<Point>,
    #[serde(default)]
    pub speed: Option<ActionSpeed>,
    #[serde(default)]
    pub params: Option<AbilityPayload>,
}

impl ActionDraft {
    /// Commits a draft: an explicit speed wins, otherwise the card's
    /// intrinsic speed decides.
    pub fn into_action(self, seat: Seat, card: Option<&CardDefinition>) -> Action {
        let speed = self.speed.unwrap_or_else(|| intrinsic_speed(card));
        Action {
            seat,
            action_type: self.action_type,
            card_instance_id: self.card_instance_id,
            source_unit_id: self.source_unit_id,
            target_id: self.target_id,
            position: self.position,
            speed,
            payload: self.params,
        }
    }
}

/// Speed a card resolves at when the submitter does not say otherwise:
/// buildings are slow to construct, `fast`/`quickcast` tags are fast, a
/// `slow` tag is slow, everything else is normal.
pub fn intrinsic_speed(card: Option<&CardDefinition>) -> ActionSpeed {
    let Some(card) = card else {
        return ActionSpeed::Normal;
    };
    if card.has_tag("fast") || card.has_tag("quickcast") {
        return ActionSpeed::Fast;
    }
    if card.has_tag("slow") {
        return ActionSpeed::Slow;
    }
    match card.card_type {
        CardType::Building => ActionSpeed::Slow,
        _ => ActionSpeed::Normal,
    }
}
