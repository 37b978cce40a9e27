//! Wire protocol shared by the WS handler, scheduler and session hub.

use serde::{Deserialize, Serialize};

use crate::game::actions::ActionDraft;
use crate::game::events;
use crate::game::snapshot::{BoardConfig, MatchSnapshot};
use crate::game::types::{CardInstanceId, Phase, Point, Seat};

// ---------- client → server ----------
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Replaces the seat's queued actions for this round.
    SubmitActions {
        seat: Seat,
        actions: Vec<ActionDraft>,
    },
    /// Stages a card→tile commitment; costs are escrowed immediately.
    #[serde(rename_all = "camelCase")]
    PlanPlay {
        seat: Seat,
        card_instance_id: CardInstanceId,
        position: Point,
    },
    #[serde(rename_all = "camelCase")]
    RemovePlan {
        seat: Seat,
        card_instance_id: CardInstanceId,
    },
    /// Queues instances to discard at end of round.
    #[serde(rename_all = "camelCase")]
    MarkDiscard {
        seat: Seat,
        instance_ids: Vec<CardInstanceId>,
    },
    /// Signals the seat is done deciding. Idempotent per round.
    LockChoice { seat: Seat },
    /// Requests a state snapshot; answered with a unicast `state`.
    GetState {},
    /// Debug hook: direct damage to a command center.
    DealDamage { seat: Seat, amount: i32 },
}

// ---------- server → client ----------
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    #[serde(rename_all = "camelCase")]
    Welcome { board_config: BoardConfig },
    State { state: MatchSnapshot },
    PhaseChanged { phase: Phase },
    PlayerLocked { seat: Seat },
    EventLog { log: events::EventLog },
    GameOver { winner: i32 },
}
