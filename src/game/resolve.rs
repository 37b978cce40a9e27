//! Upkeep and the resolution engine.
//!
//! `resolve_round` is a pure function over the committed state and both
//! seats' action queues: no I/O, no wall clock (the timestamp is an input),
//! no randomness. Given identical inputs it produces identical event logs
//! byte for byte.

use chrono::{DateTime, Utc};
use rand_pcg::Pcg64Mcg;
use serde_json::json;

use crate::catalog::CardLookup;
use crate::config::settings;
use crate::game::actions::{Action, ActionSpeed, ActionType};
use crate::game::deck;
use crate::game::events::{EventLog, EventType};
use crate::game::types::{
    CommandCenter, Facing, MatchState, MatchStatus, Point, Seat, UnitId,
};

/// Runs the automatic upkeep: command center upgrades, resource income,
/// and drawing each hand back up to its limit. The scheduler transitions
/// the phase afterwards.
pub fn run_upkeep(
    state: &mut MatchState,
    rngs: &mut [Pcg64Mcg; 2],
    now: DateTime<Utc>,
) -> EventLog {
    let mut log = EventLog::new(state.current_round, now);
    log.push(
        EventType::RoundStart,
        "upkeep",
        json!({ "round": state.current_round }),
    );

    let cadence = settings().upgrade_cadence;
    for seat in 0..2 {
        let cc = &mut state.command_centers[seat];
        if cc.level < CommandCenter::MAX_LEVEL && cc.turns_since_upgrade >= cadence {
            cc.level += 1;
            cc.turns_since_upgrade = 0;
            let income = cc.income();
            log.push(
                EventType::Effect,
                "upkeep",
                json!({
                    "seat": seat,
                    "ccLevel": cc.level,
                    "goldIncome": income.gold,
                    "manaIncome": income.mana,
                }),
            );
        } else {
            cc.turns_since_upgrade += 1;
        }
        state.seats[seat].resource_income = state.command_centers[seat].income();
    }

    for seat in 0..2 {
        let ps = &mut state.seats[seat];
        let income = ps.resource_income;
        ps.resources.gold = (ps.resources.gold + income.gold).min(ps.max_gold);
        ps.resources.mana = income.mana;
        log.push(
            EventType::Resource,
            "upkeep",
            json!({
                "seat": seat,
                "goldIncome": income.gold,
                "manaIncome": income.mana,
                "gold": ps.resources.gold,
                "mana": ps.resources.mana,
            }),
        );
    }

    for seat in 0..2 {
        let to_draw = state.seats[seat]
            .hand_limit
            .saturating_sub(state.seats[seat].hand.len());
        if to_draw == 0 {
            continue;
        }
        let drawn = deck::draw_to_hand(state, seat, to_draw, &mut rngs[seat], &mut log);
        if drawn > 0 {
            log.push(
                EventType::Draw,
                "upkeep",
                json!({
                    "seat": seat,
                    "count": drawn,
                    "handCount": state.seats[seat].hand.len(),
                }),
            );
        }
    }

    if state.is_game_over() {
        state.status = MatchStatus::Finished;
        log.push(
            EventType::RoundEnd,
            "upkeep",
            json!({ "winner": state.winner() }),
        );
    }

    state.updated_at = now;
    log
}

/// Resolves one round from the committed state and both seats' queues:
/// unit movement, unit combat, planned spawns, the fast/normal/slow action
/// bands, then end-of-round cleanup.
pub fn resolve_round(
    state: &mut MatchState,
    queues: [Vec<Action>; 2],
    catalog: &dyn CardLookup,
    now: DateTime<Utc>,
    deadline_expired: bool,
) -> EventLog {
    let mut log = EventLog::new(state.current_round, now);
    if deadline_expired {
        log.push(
            EventType::Trigger,
            "decision",
            json!({ "reason": "timer_expired" }),
        );
    }

    run_unit_movement(state, &mut log);
    run_unit_combat(state, &mut log);
    run_planned_spawns(state, catalog, &mut log);
    run_speed_bands(state, queues, catalog, &mut log);
    run_cleanup(state, &mut log);

    state.updated_at = now;
    log
}

fn facing_for(delta_row: i32, delta_col: i32) -> Facing {
    if delta_row > 0 {
        Facing::South
    } else if delta_row < 0 {
        Facing::North
    } else if delta_col > 0 {
        Facing::East
    } else {
        Facing::West
    }
}

/// R0: every living unit not spawned this round walks up to `speed` tiles
/// toward its target (explicit target tile, else the enemy command center),
/// greedy with row reduction preferred over column. Moved units occupy their
/// new tile and vacate the old one for the rest of the step.
fn run_unit_movement(state: &mut MatchState, log: &mut EventLog) {
    use std::collections::HashSet;

    let round = state.current_round;
    let mut occupied: HashSet<Point> = HashSet::new();
    for cc in &state.command_centers {
        occupied.extend(cc.footprint());
    }
    for u in &state.units {
        if u.is_alive {
            occupied.insert(u.position);
        }
    }
    let enemy_center = [
        state.command_centers[1].center(),
        state.command_centers[0].center(),
    ];

    for i in 0..state.units.len() {
        let (id, seat, speed, start, target) = {
            let u = &state.units[i];
            if !u.is_alive || u.has_moved || u.turn_spawned == round || u.speed <= 0 {
                continue;
            }
            (
                u.id.clone(),
                u.seat,
                u.speed,
                u.position,
                u.target_position.unwrap_or(enemy_center[u.seat]),
            )
        };

        let mut cur = start;
        let mut facing = state.units[i].facing;
        let mut moved_any = false;
        for _ in 0..speed {
            let delta_row = target.row - cur.row;
            let delta_col = target.col - cur.col;
            if delta_row == 0 && delta_col == 0 {
                break;
            }

            let mut next = None;
            if delta_row != 0 {
                let cand = Point::new(cur.row + delta_row.signum(), cur.col);
                if state.in_bounds(cand) && !occupied.contains(&cand) {
                    next = Some((cand, facing_for(delta_row, 0)));
                }
            }
            if next.is_none() && delta_col != 0 {
                let cand = Point::new(cur.row, cur.col + delta_col.signum());
                if state.in_bounds(cand) && !occupied.contains(&cand) {
                    next = Some((cand, facing_for(0, delta_col)));
                }
            }
            let Some((step_to, step_facing)) = next else {
                break;
            };

            occupied.remove(&cur);
            occupied.insert(step_to);
            log.push(
                EventType::Movement,
                "unit_move",
                json!({
                    "unitId": id,
                    "seat": seat,
                    "fromRow": cur.row,
                    "fromCol": cur.col,
                    "toRow": step_to.row,
                    "toCol": step_to.col,
                    "facing": step_facing,
                }),
            );
            cur = step_to;
            facing = step_facing;
            moved_any = true;
        }

        if moved_any {
            let u = &mut state.units[i];
            u.position = cur;
            u.facing = facing;
            u.has_moved = true;
        }
    }
}

enum CombatTarget {
    Unit(usize),
    CommandCenter(Seat),
}

/// R1: each eligible unit picks the closest living enemy in Manhattan range
/// (ties to the lexicographically lowest unit id), or the enemy command
/// center if any footprint tile is in range. All damage is collected first
/// and applied as one snapshot, so units killed this step still strike.
fn run_unit_combat(state: &mut MatchState, log: &mut EventLog) {
    let round = state.current_round;

    struct Strike {
        attacker_id: UnitId,
        attacker_seat: Seat,
        target: CombatTarget,
        damage: i32,
    }

    let mut strikes: Vec<Strike> = Vec::new();
    let mut attackers: Vec<usize> = Vec::new();

    for (i, u) in state.units.iter().enumerate() {
        if !u.is_alive || u.has_attacked || u.turn_spawned == round {
            continue;
        }

        let mut best: Option<(i32, usize)> = None;
        for (j, enemy) in state.units.iter().enumerate() {
            if !enemy.is_alive || enemy.seat == u.seat {
                continue;
            }
            let dist = u.position.manhattan(enemy.position);
            if dist > u.range {
                continue;
            }
            let better = match best {
                None => true,
                Some((best_dist, best_j)) => {
                    dist < best_dist || (dist == best_dist && enemy.id < state.units[best_j].id)
                }
            };
            if better {
                best = Some((dist, j));
            }
        }

        if let Some((_, j)) = best {
            strikes.push(Strike {
                attacker_id: u.id.clone(),
                attacker_seat: u.seat,
                target: CombatTarget::Unit(j),
                damage: (u.attack - state.units[j].armor).max(0),
            });
            attackers.push(i);
        } else {
            let enemy_seat = 1 - u.seat;
            let in_range = state.command_centers[enemy_seat]
                .footprint()
                .any(|tile| u.position.manhattan(tile) <= u.range);
            if in_range {
                strikes.push(Strike {
                    attacker_id: u.id.clone(),
                    attacker_seat: u.seat,
                    target: CombatTarget::CommandCenter(enemy_seat),
                    damage: u.attack,
                });
                attackers.push(i);
            }
        }
    }

    for &i in &attackers {
        state.units[i].has_attacked = true;
    }
    for strike in &strikes {
        match strike.target {
            CombatTarget::Unit(j) => state.units[j].apply_damage(strike.damage),
            CombatTarget::CommandCenter(seat) => {
                state.command_centers[seat].take_damage(strike.damage);
            }
        }
    }

    for strike in &strikes {
        match strike.target {
            CombatTarget::Unit(j) => {
                let target = &state.units[j];
                log.push(
                    EventType::Damage,
                    "unit_attack",
                    json!({
                        "attackerId": strike.attacker_id,
                        "attackerSeat": strike.attacker_seat,
                        "targetId": target.id,
                        "targetSeat": target.seat,
                        "damage": strike.damage,
                        "targetHealth": target.health,
                        "targetAlive": target.is_alive,
                    }),
                );
            }
            CombatTarget::CommandCenter(seat) => {
                let cc = &state.command_centers[seat];
                log.push(
                    EventType::Damage,
                    "unit_attack_cc",
                    json!({
                        "attackerId": strike.attacker_id,
                        "attackerSeat": strike.attacker_seat,
                        "targetSeat": seat,
                        "damage": strike.damage,
                        "ccHealth": cc.health,
                        "ccDestroyed": cc.is_destroyed(),
                    }),
                );
            }
        }
    }
}

/// R2: planned plays spawn in seat order (seat 0 first), each seat's plans
/// in submission order. A blocked tile turns the play into a pending refund;
/// a free tile spawns the unit. The card copy leaves the hand either way:
/// onto the board, or into the discard pile with the refund.
fn run_planned_spawns(state: &mut MatchState, catalog: &dyn CardLookup, log: &mut EventLog) {
    for seat in 0..2 {
        let plays = std::mem::take(&mut state.seats[seat].planned_plays);
        for play in plays {
            let card = match catalog.lookup(&play.card_id) {
                Some(card) => card,
                None => {
                    log.push(
                        EventType::Trigger,
                        "reveal",
                        json!({
                            "seat": seat,
                            "cardId": play.card_id,
                            "cardInstanceId": play.instance_id,
                            "reason": "unknown_card",
                        }),
                    );
                    state.seats[seat].discard_from_hand(&play.instance_id);
                    continue;
                }
            };

            let blocked = state.tile_blocked(play.position);
            let stats = card.spawn_stats().copied();
            match (blocked, stats) {
                (false, Some(stats)) => {
                    let Some(idx) = state.seats[seat].hand_position(&play.instance_id) else {
                        continue;
                    };
                    let instance = state.seats[seat].hand.remove(idx);
                    let unit = state.spawn_unit(instance, seat, play.position, &stats);
                    log.push(
                        EventType::Effect,
                        "spawn_unit",
                        json!({
                            "seat": seat,
                            "cardId": play.card_id,
                            "unitId": unit.id,
                            "row": play.position.row,
                            "col": play.position.col,
                            "attack": unit.attack,
                            "health": unit.health,
                        }),
                    );
                    log.push(
                        EventType::Effect,
                        "reveal",
                        json!({
                            "seat": seat,
                            "action": "play_card",
                            "cardId": play.card_id,
                            "cardInstanceId": play.instance_id,
                            "row": play.position.row,
                            "col": play.position.col,
                        }),
                    );
                }
                _ => {
                    let refund = card.cost();
                    state.pending_refunds[seat].push(refund);
                    log.push(
                        EventType::Effect,
                        "refund",
                        json!({
                            "seat": seat,
                            "cardId": play.card_id,
                            "cardInstanceId": play.instance_id,
                            "goldRefunded": refund.gold,
                            "manaRefunded": refund.mana,
                            "reason": "spawn_blocked",
                        }),
                    );
                    state.seats[seat].discard_from_hand(&play.instance_id);
                }
            }
        }
    }

    for seat in 0..2 {
        let max_gold = state.seats[seat].max_gold;
        for refund in std::mem::take(&mut state.pending_refunds[seat]) {
            state.seats[seat].resources.refund(refund, max_gold);
        }
    }
}

/// R3: both queues concatenated (seat 0 first) and processed in fast,
/// normal, slow bands; submission order within a band. Damage produced
/// inside a band lands as one simultaneous snapshot at the band's end.
fn run_speed_bands(
    state: &mut MatchState,
    queues: [Vec<Action>; 2],
    catalog: &dyn CardLookup,
    log: &mut EventLog,
) {
    let [q0, q1] = queues;
    let all: Vec<Action> = q0.into_iter().chain(q1).collect();

    for speed in [ActionSpeed::Fast, ActionSpeed::Normal, ActionSpeed::Slow] {
        let step = speed.as_step();
        let mut band_damage: Vec<(UnitId, i32)> = Vec::new();

        for action in all.iter().filter(|a| a.speed == speed) {
            match action.action_type {
                ActionType::PlayCard => {
                    resolve_card_play(state, catalog, action, step, &mut band_damage, log);
                }
                ActionType::ActivateAbility => {
                    log.push(
                        EventType::Effect,
                        step,
                        json!({
                            "seat": action.seat,
                            "sourceUnitId": action.source_unit_id,
                            "targetId": action.target_id,
                            "payload": action.payload,
                        }),
                    );
                    if let (Some(damage), Some(target)) = (
                        action.payload.as_ref().and_then(|p| p.damage),
                        action.target_id.as_deref(),
                    ) {
                        band_damage.push((UnitId::from(target), damage));
                    }
                }
            }
        }

        apply_band_damage(state, band_damage, step, log);
    }
}

fn resolve_card_play(
    state: &mut MatchState,
    catalog: &dyn CardLookup,
    action: &Action,
    step: &str,
    band_damage: &mut Vec<(UnitId, i32)>,
    log: &mut EventLog,
) {
    let seat = action.seat;
    let Some(instance_id) = &action.card_instance_id else {
        return;
    };

    let Some(idx) = state.seats[seat].hand_position(instance_id) else {
        log.push(
            EventType::Trigger,
            step,
            json!({
                "seat": seat,
                "cardInstanceId": instance_id,
                "reason": "card_not_in_hand",
            }),
        );
        return;
    };
    let card_id = state.seats[seat].hand[idx].card_id.clone();

    let Some(card) = catalog.lookup(&card_id) else {
        log.push(
            EventType::Trigger,
            step,
            json!({
                "seat": seat,
                "cardId": card_id,
                "reason": "unknown_card",
            }),
        );
        return;
    };

    let cost = card.cost();
    if !state.seats[seat].resources.can_pay(cost) {
        log.push(
            EventType::Effect,
            step,
            json!({
                "seat": seat,
                "cardId": card_id,
                "reason": "insufficient_resources",
            }),
        );
        return;
    }
    state.seats[seat].resources.pay(cost);
    state.seats[seat].discard_from_hand(instance_id);

    log.push(
        EventType::Effect,
        step,
        json!({
            "seat": seat,
            "cardId": card_id,
            "cardInstanceId": instance_id,
            "targetId": action.target_id,
            "goldCost": cost.gold,
            "manaCost": cost.mana,
        }),
    );

    // A direct-damage spell body contributes to the band's snapshot.
    if let (Some(spell), Some(target)) = (&card.spell, action.target_id.as_deref()) {
        if spell.effect == "damage" {
            if let Some(amount) = spell.amount {
                band_damage.push((UnitId::from(target), amount));
            }
        }
    }
}

fn apply_band_damage(
    state: &mut MatchState,
    band_damage: Vec<(UnitId, i32)>,
    step: &str,
    log: &mut EventLog,
) {
    for (target_id, damage) in band_damage {
        let Some(unit) = state.units.iter_mut().find(|u| u.id == target_id) else {
            continue;
        };
        unit.apply_damage(damage);
        log.push(
            EventType::Damage,
            step,
            json!({
                "targetId": unit.id,
                "targetSeat": unit.seat,
                "damage": damage,
                "targetHealth": unit.health,
                "targetAlive": unit.is_alive,
            }),
        );
    }
}

/// R4: clear the dead, reset per-round flags, execute queued discards,
/// zero out mana, and check the victory condition.
fn run_cleanup(state: &mut MatchState, log: &mut EventLog) {
    state.remove_dead_units();
    for unit in &mut state.units {
        unit.reset_turn_flags();
    }

    for seat in 0..2 {
        let pending = std::mem::take(&mut state.seats[seat].pending_discards);
        if pending.is_empty() {
            continue;
        }
        let hand_before = state.seats[seat].hand.len();
        let moved = deck::discard_instances(&mut state.seats[seat], &pending);
        log.push(
            EventType::Discard,
            "end_of_round",
            json!({
                "seat": seat,
                "requested": pending.len(),
                "discarded": moved,
                "handBefore": hand_before,
                "handAfter": state.seats[seat].hand.len(),
            }),
        );
    }

    for seat in 0..2 {
        if state.seats[seat].resources.mana != 0 {
            state.seats[seat].resources.mana = 0;
            log.push(
                EventType::Resource,
                "end_of_round",
                json!({ "seat": seat, "mana": 0 }),
            );
        }
    }

    if state.is_game_over() {
        state.status = MatchStatus::Finished;
        log.push(
            EventType::RoundEnd,
            "end_of_round",
            json!({ "winner": state.winner() }),
        );
    }
}
