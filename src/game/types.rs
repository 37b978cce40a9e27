//! Core domain types shared by the engine, scheduler and wire layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::catalog::UnitStats;
use crate::config::settings;
use crate::game::actions::Action;
use crate::game::events::EventLog;

/// A player slot: 0 or 1.
pub type Seat = usize;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_id!(
    /// Identifies one match instance.
    MatchId
);
string_id!(
    /// Identifies a card definition in the catalog.
    CardDefId
);
string_id!(
    /// Identifies one physical copy of a card within a match. Two copies of
    /// the same definition always carry distinct instance ids.
    CardInstanceId
);
string_id!(
    /// Identifies a unit on the board.
    UnitId
);
string_id!(
    /// Identifies a deck definition in the catalog.
    DeckId
);

/// A board coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub row: i32,
    pub col: i32,
}

impl Point {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    pub fn manhattan(self, other: Point) -> i32 {
        (self.row - other.row).abs() + (self.col - other.col).abs()
    }
}

/// Direction a unit is facing after its last step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    North,
    South,
    East,
    West,
}

/// Gold accumulates round over round (capped); mana is ephemeral and resets
/// to zero between rounds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    pub gold: u32,
    pub mana: u32,
}

impl Resources {
    pub fn new(gold: u32, mana: u32) -> Self {
        Self { gold, mana }
    }

    pub fn can_pay(&self, cost: Resources) -> bool {
        self.gold >= cost.gold && self.mana >= cost.mana
    }

    pub fn pay(&mut self, cost: Resources) {
        self.gold -= cost.gold;
        self.mana -= cost.mana;
    }

    /// Adds a refund back, saturating gold at the storage cap.
    pub fn refund(&mut self, amount: Resources, max_gold: u32) {
        self.gold = (self.gold + amount.gold).min(max_gold);
        self.mana += amount.mana;
    }
}

/// One physical copy of a card.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardInstance {
    pub instance_id: CardInstanceId,
    pub card_id: CardDefId,
}

/// A card→tile commitment staged during Decision and consumed at Resolution.
/// Costs are escrowed when the plan is staged; a blocked spawn refunds them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedPlay {
    pub instance_id: CardInstanceId,
    pub card_id: CardDefId,
    pub position: Point,
}

/// A unit on the board.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: UnitId,
    pub card_id: CardDefId,
    /// The card copy this unit embodies; it returns to the owner's discard
    /// pile when the unit dies.
    pub instance_id: CardInstanceId,
    pub seat: Seat,
    pub position: Point,
    pub facing: Facing,
    pub attack: i32,
    pub health: i32,
    pub max_health: i32,
    pub armor: i32,
    pub speed: i32,
    pub range: i32,
    pub has_moved: bool,
    pub has_attacked: bool,
    pub is_alive: bool,
    pub turn_spawned: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_position: Option<Point>,
}

impl Unit {
    pub fn from_stats(
        id: UnitId,
        card: CardInstance,
        seat: Seat,
        position: Point,
        stats: &UnitStats,
        turn_spawned: u32,
    ) -> Self {
        Self {
            id,
            card_id: card.card_id,
            instance_id: card.instance_id,
            seat,
            position,
            facing: if seat == 0 { Facing::South } else { Facing::North },
            attack: stats.attack,
            health: stats.health,
            max_health: stats.health,
            armor: stats.armor,
            speed: stats.speed,
            range: stats.range,
            has_moved: false,
            has_attacked: false,
            is_alive: true,
            turn_spawned,
            target_position: None,
        }
    }

    /// Applies already-mitigated damage. Armor is the attacker's problem so
    /// that simultaneous snapshots record the final numbers.
    pub fn apply_damage(&mut self, damage: i32) {
        if !self.is_alive {
            return;
        }
        self.health -= damage.max(0);
        if self.health <= 0 {
            self.health = 0;
            self.is_alive = false;
        }
    }

    pub fn reset_turn_flags(&mut self) {
        self.has_moved = false;
        self.has_attacked = false;
    }
}

/// A seat's home structure; destroying it wins the game. Occupies a 2×2
/// footprint anchored at `top_left`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandCenter {
    pub seat: Seat,
    pub top_left: Point,
    pub health: i32,
    pub max_health: i32,
    pub level: u8,
    pub turns_since_upgrade: u32,
}

impl CommandCenter {
    pub const FOOTPRINT: i32 = 2;
    pub const MAX_LEVEL: u8 = 3;

    pub fn new(seat: Seat, top_left: Point, health: i32) -> Self {
        Self {
            seat,
            top_left,
            health,
            max_health: health,
            level: 1,
            turns_since_upgrade: 0,
        }
    }

    pub fn footprint(&self) -> impl Iterator<Item = Point> + '_ {
        (0..Self::FOOTPRINT).flat_map(move |dr| {
            (0..Self::FOOTPRINT)
                .map(move |dc| Point::new(self.top_left.row + dr, self.top_left.col + dc))
        })
    }

    pub fn contains(&self, p: Point) -> bool {
        p.row >= self.top_left.row
            && p.row < self.top_left.row + Self::FOOTPRINT
            && p.col >= self.top_left.col
            && p.col < self.top_left.col + Self::FOOTPRINT
    }

    /// Returns true if the hit destroyed the center.
    pub fn take_damage(&mut self, damage: i32) -> bool {
        self.health = (self.health - damage.max(0)).max(0);
        self.is_destroyed()
    }

    pub fn is_destroyed(&self) -> bool {
        self.health <= 0
    }

    /// Centre tile units path toward when they have no explicit target.
    pub fn center(&self) -> Point {
        Point::new(
            self.top_left.row + Self::FOOTPRINT / 2,
            self.top_left.col + Self::FOOTPRINT / 2,
        )
    }

    /// Income generated at upkeep for the current level.
    pub fn income(&self) -> Resources {
        match self.level {
            1 => Resources::new(3, 2),
            2 => Resources::new(6, 4),
            _ => Resources::new(10, 6),
        }
    }
}

/// Per-seat runtime state: piles, hand, resources and staged decisions.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatState {
    pub seat: Seat,
    pub deck_id: DeckId,
    /// Top of the pile is the last element.
    pub draw_pile: Vec<CardInstance>,
    pub hand: Vec<CardInstance>,
    pub discard_pile: Vec<CardInstance>,
    pub resources: Resources,
    pub resource_income: Resources,
    pub max_gold: u32,
    pub hand_limit: usize,
    /// Instance ids queued during Decision, executed at end of round.
    pub pending_discards: Vec<CardInstanceId>,
    pub planned_plays: Vec<PlannedPlay>,
}

impl SeatState {
    pub fn new(seat: Seat, deck_id: DeckId) -> Self {
        let cfg = settings();
        Self {
            seat,
            deck_id,
            draw_pile: Vec::new(),
            hand: Vec::new(),
            discard_pile: Vec::new(),
            resources: Resources::new(cfg.starting_gold, 0),
            resource_income: Resources::new(3, 2),
            max_gold: cfg.max_gold,
            hand_limit: cfg.hand_limit,
            pending_discards: Vec::new(),
            planned_plays: Vec::new(),
        }
    }

    pub fn hand_position(&self, id: &CardInstanceId) -> Option<usize> {
        self.hand.iter().position(|c| &c.instance_id == id)
    }

    /// Moves one instance from hand to discard. Returns the card if found.
    pub fn discard_from_hand(&mut self, id: &CardInstanceId) -> Option<CardInstance> {
        let idx = self.hand_position(id)?;
        let card = self.hand.remove(idx);
        self.discard_pile.push(card.clone());
        Some(card)
    }

    pub fn plan_for(&self, id: &CardInstanceId) -> Option<&PlannedPlay> {
        self.planned_plays.iter().find(|p| &p.instance_id == id)
    }

    pub fn plan_on_tile(&self, p: Point) -> bool {
        self.planned_plays.iter().any(|plan| plan.position == p)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Waiting,
    InProgress,
    Finished,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Upkeep,
    Decision,
    Resolution,
}

/// A participant. The second seat may be a stub that never submits actions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
}

/// The full authoritative state of one match. Owned by exactly one scheduler
/// task; the resolution engine takes it by `&mut` and never escapes a
/// reference past a single step.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchState {
    pub id: MatchId,
    pub status: MatchStatus,
    pub players: [Player; 2],
    pub command_centers: [CommandCenter; 2],
    pub seats: [SeatState; 2],
    pub units: Vec<Unit>,
    pub board_rows: i32,
    pub board_cols: i32,
    pub current_round: u32,
    pub current_phase: Phase,
    pub phase_started_at: DateTime<Utc>,
    pub seats_locked: [bool; 2],
    pub pending_actions: [Vec<Action>; 2],
    pub pending_refunds: [Vec<Resources>; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_log: Option<EventLog>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    next_unit_seq: u32,
}

impl MatchState {
    pub fn new(
        id: MatchId,
        players: [Player; 2],
        deck_ids: [DeckId; 2],
        board_rows: i32,
        board_cols: i32,
    ) -> Self {
        let now = Utc::now();
        let cc_health = settings().command_center_health;
        let [cc0, cc1] = default_command_centers(board_rows, board_cols, cc_health);
        let [deck0, deck1] = deck_ids;
        Self {
            id,
            status: MatchStatus::Waiting,
            players,
            command_centers: [cc0, cc1],
            seats: [SeatState::new(0, deck0), SeatState::new(1, deck1)],
            units: Vec::new(),
            board_rows,
            board_cols,
            current_round: 1,
            current_phase: Phase::Upkeep,
            phase_started_at: now,
            seats_locked: [false, false],
            pending_actions: [Vec::new(), Vec::new()],
            pending_refunds: [Vec::new(), Vec::new()],
            last_event_log: None,
            created_at: now,
            updated_at: now,
            next_unit_seq: 0,
        }
    }

    pub fn in_bounds(&self, p: Point) -> bool {
        p.row >= 0 && p.row < self.board_rows && p.col >= 0 && p.col < self.board_cols
    }

    pub fn living_unit_at(&self, p: Point) -> Option<&Unit> {
        self.units.iter().find(|u| u.is_alive && u.position == p)
    }

    pub fn in_command_center(&self, p: Point) -> bool {
        self.command_centers.iter().any(|cc| cc.contains(p))
    }

    /// A tile is blocked for spawning/moving when it is out of bounds, holds
    /// a living unit, or lies inside any command center footprint.
    pub fn tile_blocked(&self, p: Point) -> bool {
        !self.in_bounds(p) || self.living_unit_at(p).is_some() || self.in_command_center(p)
    }

    pub fn set_phase(&mut self, phase: Phase, now: DateTime<Utc>) {
        self.current_phase = phase;
        self.phase_started_at = now;
        self.updated_at = now;
    }

    pub fn alloc_unit_id(&mut self, seat: Seat) -> UnitId {
        self.next_unit_seq += 1;
        UnitId::new(format!(
            "u{}-{}-{}",
            seat, self.current_round, self.next_unit_seq
        ))
    }

    pub fn spawn_unit(
        &mut self,
        card: CardInstance,
        seat: Seat,
        position: Point,
        stats: &UnitStats,
    ) -> Unit {
        let id = self.alloc_unit_id(seat);
        let unit = Unit::from_stats(id, card, seat, position, stats, self.current_round);
        self.units.push(unit.clone());
        unit
    }

    /// Clears dead units off the board, returning their card copies to the
    /// owners' discard piles.
    pub fn remove_dead_units(&mut self) {
        let Self { units, seats, .. } = self;
        units.retain(|u| {
            if u.is_alive {
                return true;
            }
            seats[u.seat].discard_pile.push(CardInstance {
                instance_id: u.instance_id.clone(),
                card_id: u.card_id.clone(),
            });
            false
        });
    }

    pub fn lock_seat(&mut self, seat: Seat) {
        self.seats_locked[seat] = true;
    }

    pub fn all_seats_locked(&self) -> bool {
        self.seats_locked.iter().all(|l| *l)
    }

    pub fn clear_round_inputs(&mut self) {
        self.seats_locked = [false, false];
        self.pending_actions = [Vec::new(), Vec::new()];
    }

    pub fn is_game_over(&self) -> bool {
        self.command_centers.iter().any(|cc| cc.is_destroyed())
    }

    /// Winner seat, or -1 while undecided and on a double knockout.
    pub fn winner(&self) -> i32 {
        match (
            self.command_centers[0].is_destroyed(),
            self.command_centers[1].is_destroyed(),
        ) {
            (true, true) => -1,
            (true, false) => 1,
            (false, true) => 0,
            (false, false) => -1,
        }
    }

    /// Card instances a seat owns across every zone, units included.
    pub fn instance_count(&self, seat: Seat) -> usize {
        let s = &self.seats[seat];
        s.draw_pile.len()
            + s.hand.len()
            + s.discard_pile.len()
            + self
                .units
                .iter()
                .filter(|u| u.seat == seat && u.is_alive)
                .count()
    }
}

/// Default command center layout: centered column, one footprint near each
/// board edge.
fn default_command_centers(rows: i32, cols: i32, health: i32) -> [CommandCenter; 2] {
    let top_left_col = (cols / 2 - 2).clamp(0, (cols - 2).max(0));
    let top_row = (rows - 2).max(0).min(1);
    let bottom_row = (rows - 3).clamp(0, (rows - 2).max(0));
    [
        CommandCenter::new(0, Point::new(top_row, top_left_col), health),
        CommandCenter::new(1, Point::new(bottom_row, top_left_col), health),
    ]
}
