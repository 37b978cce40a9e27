//! Client-facing view of a match, redacted per viewer.
//!
//! The draw pile is never exposed (only its count), and an opposing seat's
//! hand, planned plays and queued discards are stripped at snapshot time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::game::events::EventLog;
use crate::game::types::{
    CardInstance, CommandCenter, DeckId, MatchId, MatchState, MatchStatus, Phase, PlannedPlay,
    Player, Resources, Seat, Unit,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandCenterView {
    pub seat: Seat,
    pub top_left_row: i32,
    pub top_left_col: i32,
    pub health: i32,
    pub max_health: i32,
    pub level: u8,
    pub turns_since_upgrade: u32,
}

impl From<&CommandCenter> for CommandCenterView {
    fn from(cc: &CommandCenter) -> Self {
        Self {
            seat: cc.seat,
            top_left_row: cc.top_left.row,
            top_left_col: cc.top_left.col,
            health: cc.health,
            max_health: cc.max_health,
            level: cc.level,
            turns_since_upgrade: cc.turns_since_upgrade,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatView {
    pub seat: Seat,
    pub deck_id: DeckId,
    /// Empty for seats the viewer may not see; `hand_count` is always real.
    pub hand: Vec<CardInstance>,
    pub hand_count: usize,
    pub deck_count: usize,
    pub discard_pile: Vec<CardInstance>,
    pub resources: Resources,
    pub resource_income: Resources,
    pub hand_limit: usize,
    pub planned_plays: Vec<PlannedPlay>,
    pub pending_discards: Vec<crate::game::types::CardInstanceId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSnapshot {
    pub id: MatchId,
    pub status: MatchStatus,
    pub round: u32,
    pub phase: Phase,
    pub phase_started_at: DateTime<Utc>,
    pub players: Vec<Player>,
    pub board_rows: i32,
    pub board_cols: i32,
    pub command_centers: Vec<CommandCenterView>,
    pub seats: Vec<SeatView>,
    pub units: Vec<Unit>,
    pub seats_locked: [bool; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_log: Option<EventLog>,
}

impl MatchSnapshot {
    /// Builds the view `viewer` is allowed to see. `None` is a spectator:
    /// both hands hidden, counts visible.
    pub fn of(state: &MatchState, viewer: Option<Seat>) -> Self {
        let seats = state
            .seats
            .iter()
            .map(|s| {
                let visible = viewer == Some(s.seat);
                SeatView {
                    seat: s.seat,
                    deck_id: s.deck_id.clone(),
                    hand: if visible { s.hand.clone() } else { Vec::new() },
                    hand_count: s.hand.len(),
                    deck_count: s.draw_pile.len(),
                    discard_pile: s.discard_pile.clone(),
                    resources: s.resources,
                    resource_income: s.resource_income,
                    hand_limit: s.hand_limit,
                    planned_plays: if visible {
                        s.planned_plays.clone()
                    } else {
                        Vec::new()
                    },
                    pending_discards: if visible {
                        s.pending_discards.clone()
                    } else {
                        Vec::new()
                    },
                }
            })
            .collect();

        Self {
            id: state.id.clone(),
            status: state.status,
            round: state.current_round,
            phase: state.current_phase,
            phase_started_at: state.phase_started_at,
            players: state.players.to_vec(),
            board_rows: state.board_rows,
            board_cols: state.board_cols,
            command_centers: state.command_centers.iter().map(Into::into).collect(),
            seats,
            units: state.units.clone(),
            seats_locked: state.seats_locked,
            last_event_log: state.last_event_log.clone(),
        }
    }
}

/// Board parameters pushed in the `welcome` message on connect.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardConfig {
    pub rows: i32,
    pub cols: i32,
    pub decision_deadline_secs: u64,
    pub hand_limit: usize,
}

impl BoardConfig {
    pub fn of(state: &MatchState) -> Self {
        let cfg = crate::config::settings();
        Self {
            rows: state.board_rows,
            cols: state.board_cols,
            decision_deadline_secs: cfg.decision_deadline_secs,
            hand_limit: cfg.hand_limit,
        }
    }
}
