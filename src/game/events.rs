//! The resolution timeline: ordered atomic events clients render as
//! animations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Classifies a single atomic change for the client to animate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RoundStart,
    Trigger,
    Resource,
    Draw,
    Movement,
    Damage,
    Effect,
    Discard,
    RoundEnd,
}

/// One item in the timeline. `step` sequences client animations
/// (`upkeep` < `fast` < `movement` < `normal` < `combat` < `slow` <
/// `end_of_round`) with finer tags such as `unit_move` or `spawn_unit`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub step: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Value::is_null", default)]
    pub data: Value,
}

/// Accumulates events for one round. Every event of a round shares the
/// timestamp the scheduler handed in, so identical inputs produce identical
/// logs byte for byte.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLog {
    pub round_number: u32,
    pub events: Vec<Event>,
    #[serde(skip, default = "Utc::now")]
    now: DateTime<Utc>,
}

impl EventLog {
    pub fn new(round_number: u32, now: DateTime<Utc>) -> Self {
        Self {
            round_number,
            events: Vec::with_capacity(32),
            now,
        }
    }

    pub fn push(&mut self, event_type: EventType, step: &str, data: Value) {
        self.events.push(Event {
            event_type,
            step: step.to_owned(),
            timestamp: self.now,
            data,
        });
    }

    pub fn events_of(&self, event_type: EventType) -> impl Iterator<Item = &Event> {
        self.events
            .iter()
            .filter(move |e| e.event_type == event_type)
    }
}
