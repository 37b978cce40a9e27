//! Resolution engine scenarios: movement, combat, spawns, speed bands and
//! cleanup.

use chrono::{TimeZone, Utc};
use serde_json::json;

use gridfall_server::catalog::{CardCatalog, UnitStats};
use gridfall_server::game::actions::{Action, ActionSpeed, ActionType};
use gridfall_server::game::events::EventType;
use gridfall_server::game::resolve::resolve_round;
use gridfall_server::game::types::{
    CardDefId, CardInstance, CardInstanceId, DeckId, MatchId, MatchState, MatchStatus, Phase,
    PlannedPlay, Player, Point, Resources, UnitId,
};

fn players() -> [Player; 2] {
    [
        Player {
            id: "player".into(),
            name: "Player".into(),
        },
        Player {
            id: "cpu".into(),
            name: "CPU".into(),
        },
    ]
}

fn new_state(id: &str) -> MatchState {
    let mut state = MatchState::new(
        MatchId::new(id),
        players(),
        [DeckId::new("crimson_assault"), DeckId::new("azure_bulwark")],
        12,
        12,
    );
    state.status = MatchStatus::InProgress;
    state.current_phase = Phase::Resolution;
    state
}

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap()
}

fn instance(tag: &str, card: &str) -> CardInstance {
    CardInstance {
        instance_id: CardInstanceId::new(tag),
        card_id: CardDefId::new(card),
    }
}

fn melee(attack: i32, health: i32) -> UnitStats {
    UnitStats {
        attack,
        health,
        armor: 0,
        speed: 0,
        range: 1,
    }
}

/// Spawns a unit that is eligible to act this round.
fn put_unit(
    state: &mut MatchState,
    seat: usize,
    pos: Point,
    stats: UnitStats,
    tag: &str,
) -> UnitId {
    let unit = state.spawn_unit(instance(tag, "militia"), seat, pos, &stats);
    let id = unit.id.clone();
    state.units.last_mut().unwrap().turn_spawned = 0;
    id
}

fn play_card(seat: usize, tag: &str, speed: ActionSpeed) -> Action {
    Action {
        seat,
        action_type: ActionType::PlayCard,
        card_instance_id: Some(CardInstanceId::new(tag)),
        source_unit_id: None,
        target_id: None,
        position: None,
        speed,
        payload: None,
    }
}

#[test]
fn units_advance_toward_the_enemy_command_center() {
    let catalog = CardCatalog::builtin();
    let mut state = new_state("m-move");
    let id = put_unit(
        &mut state,
        0,
        Point::new(4, 4),
        UnitStats {
            attack: 1,
            health: 3,
            armor: 0,
            speed: 2,
            range: 1,
        },
        "mover",
    );

    let log = resolve_round(&mut state, [vec![], vec![]], &catalog, now(), false);

    // Row axis reduces first: (4,4) → (5,4) → (6,4).
    let unit = state.units.iter().find(|u| u.id == id).unwrap();
    assert_eq!(unit.position, Point::new(6, 4));
    assert!(unit.position.row > 4);

    let steps: Vec<_> = log.events_of(EventType::Movement).collect();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].step, "unit_move");
    assert_eq!(steps[0].data["fromRow"], json!(4));
    assert_eq!(steps[1].data["toRow"], json!(6));
}

#[test]
fn a_surrounded_unit_stays_put() {
    let catalog = CardCatalog::builtin();
    let mut state = new_state("m-stuck");
    let id = put_unit(
        &mut state,
        0,
        Point::new(5, 5),
        UnitStats {
            attack: 0,
            health: 3,
            armor: 0,
            speed: 1,
            range: 0,
        },
        "stuck",
    );
    // Box it in with friendlies on all four sides.
    for (i, pos) in [(4, 5), (6, 5), (5, 4), (5, 6)].iter().enumerate() {
        put_unit(
            &mut state,
            0,
            Point::new(pos.0, pos.1),
            melee(0, 3),
            &format!("wall-{i}"),
        );
    }
    // Pin the walls so only the middle unit would try to move.
    for unit in state.units.iter_mut() {
        if unit.id != id {
            unit.has_moved = true;
        }
    }

    let log = resolve_round(&mut state, [vec![], vec![]], &catalog, now(), false);

    let unit = state.units.iter().find(|u| u.id == id).unwrap();
    assert_eq!(unit.position, Point::new(5, 5));
    assert!(log
        .events_of(EventType::Movement)
        .all(|e| e.data["unitId"] != json!(id.as_str())));
}

#[test]
fn simultaneous_lethal_combat_kills_both_units() {
    let catalog = CardCatalog::builtin();
    let mut state = new_state("m-lethal");
    let _a = put_unit(&mut state, 0, Point::new(5, 5), melee(5, 3), "a");
    let _b = put_unit(&mut state, 1, Point::new(5, 6), melee(4, 2), "b");

    let log = resolve_round(&mut state, [vec![], vec![]], &catalog, now(), false);

    // Both strikes land in one snapshot; both units die and leave the board.
    let hits: Vec<_> = log.events_of(EventType::Damage).collect();
    assert_eq!(hits.len(), 2);
    for hit in &hits {
        assert_eq!(hit.step, "unit_attack");
        assert_eq!(hit.data["targetAlive"], json!(false));
    }
    assert!(state.units.is_empty());

    // Their card copies went back to the owners' discard piles.
    assert!(state.seats[0]
        .discard_pile
        .iter()
        .any(|c| c.instance_id.as_str() == "a"));
    assert!(state.seats[1]
        .discard_pile
        .iter()
        .any(|c| c.instance_id.as_str() == "b"));
}

#[test]
fn combat_prefers_closest_then_lowest_unit_id() {
    let catalog = CardCatalog::builtin();
    let mut state = new_state("m-target");
    put_unit(
        &mut state,
        0,
        Point::new(5, 5),
        UnitStats {
            attack: 2,
            health: 5,
            armor: 0,
            speed: 0,
            range: 2,
        },
        "attacker",
    );
    // Two enemies at equal distance; the first spawned has the lower id.
    let first = put_unit(&mut state, 1, Point::new(7, 5), melee(0, 5), "e1");
    let second = put_unit(&mut state, 1, Point::new(5, 7), melee(0, 5), "e2");

    resolve_round(&mut state, [vec![], vec![]], &catalog, now(), false);

    let hit = state.units.iter().find(|u| u.id == first).unwrap();
    let spared = state.units.iter().find(|u| u.id == second).unwrap();
    assert_eq!(hit.health, 3);
    assert_eq!(spared.health, 5);
}

#[test]
fn unit_in_range_of_a_center_tile_attacks_the_center() {
    let catalog = CardCatalog::builtin();
    let mut state = new_state("m-siege");
    // Command center for seat 1 occupies rows 9–10, cols 4–5.
    put_unit(&mut state, 0, Point::new(8, 4), melee(6, 5), "ram");

    let log = resolve_round(&mut state, [vec![], vec![]], &catalog, now(), false);

    assert_eq!(state.command_centers[1].health, 94);
    let hit = log
        .events_of(EventType::Damage)
        .find(|e| e.step == "unit_attack_cc")
        .expect("center attack logged");
    assert_eq!(hit.data["targetSeat"], json!(1));
    assert_eq!(hit.data["damage"], json!(6));
}

#[test]
fn colliding_planned_plays_spawn_first_seat_and_refund_second() {
    let catalog = CardCatalog::builtin();
    let mut state = new_state("m-collide");
    state.seats[0].hand.push(instance("p0-card", "militia"));
    state.seats[1].hand.push(instance("p1-card", "militia"));
    // Costs were escrowed at plan time.
    state.seats[0].resources = Resources::new(5, 0);
    state.seats[1].resources = Resources::new(5, 0);
    let tile = Point::new(5, 5);
    state.seats[0].planned_plays.push(PlannedPlay {
        instance_id: CardInstanceId::new("p0-card"),
        card_id: CardDefId::new("militia"),
        position: tile,
    });
    state.seats[1].planned_plays.push(PlannedPlay {
        instance_id: CardInstanceId::new("p1-card"),
        card_id: CardDefId::new("militia"),
        position: tile,
    });

    let log = resolve_round(&mut state, [vec![], vec![]], &catalog, now(), false);

    // Seat 0 owns the tile; seat 1 got its gold back and the card discarded.
    let spawned = state.units.iter().find(|u| u.position == tile).unwrap();
    assert_eq!(spawned.seat, 0);
    assert_eq!(state.seats[1].resources.gold, 6);
    assert!(state.seats[1]
        .discard_pile
        .iter()
        .any(|c| c.instance_id.as_str() == "p1-card"));
    assert!(state.seats[0].hand.is_empty());
    assert!(state.seats[1].hand.is_empty());

    let refund = log
        .events_of(EventType::Effect)
        .find(|e| e.step == "refund")
        .expect("refund logged");
    assert_eq!(refund.data["seat"], json!(1));
    assert_eq!(refund.data["reason"], json!("spawn_blocked"));
    assert_eq!(refund.data["goldRefunded"], json!(1));
}

#[test]
fn play_card_deducts_cost_and_discards_the_instance() {
    let catalog = CardCatalog::builtin();
    let mut state = new_state("m-play");
    state.seats[0].hand.push(instance("hand-1", "militia"));
    state.seats[0].resources = Resources::new(6, 2);

    let log = resolve_round(
        &mut state,
        [vec![play_card(0, "hand-1", ActionSpeed::Normal)], vec![]],
        &catalog,
        now(),
        false,
    );

    assert_eq!(state.seats[0].resources.gold, 5);
    assert!(state.seats[0].hand.is_empty());
    assert!(state.seats[0]
        .discard_pile
        .iter()
        .any(|c| c.instance_id.as_str() == "hand-1"));

    let effect = log
        .events_of(EventType::Effect)
        .find(|e| e.step == "normal")
        .expect("play logged in the normal step");
    assert_eq!(effect.data["cardId"], json!("militia"));
    assert_eq!(effect.data["goldCost"], json!(1));
}

#[test]
fn unaffordable_play_is_skipped_with_a_reason() {
    let catalog = CardCatalog::builtin();
    let mut state = new_state("m-broke");
    state.seats[0].hand.push(instance("hand-1", "vanguard"));
    state.seats[0].resources = Resources::new(1, 0); // vanguard costs 4g 1m

    let log = resolve_round(
        &mut state,
        [vec![play_card(0, "hand-1", ActionSpeed::Normal)], vec![]],
        &catalog,
        now(),
        false,
    );

    assert_eq!(state.seats[0].resources.gold, 1);
    assert_eq!(state.seats[0].hand.len(), 1);
    let skip = log
        .events_of(EventType::Effect)
        .find(|e| e.data["reason"] == json!("insufficient_resources"))
        .expect("skip logged");
    assert_eq!(skip.data["seat"], json!(0));
}

#[test]
fn fast_actions_resolve_before_normal_and_slow() {
    let catalog = CardCatalog::builtin();
    let mut state = new_state("m-bands");
    state.seats[0].hand.push(instance("slowcard", "watchtower"));
    state.seats[0].hand.push(instance("normcard", "militia"));
    state.seats[1].hand.push(instance("fastcard", "fireball"));
    state.seats[0].resources = Resources::new(10, 5);
    state.seats[1].resources = Resources::new(10, 5);

    let log = resolve_round(
        &mut state,
        [
            vec![
                play_card(0, "slowcard", ActionSpeed::Slow),
                play_card(0, "normcard", ActionSpeed::Normal),
            ],
            vec![play_card(1, "fastcard", ActionSpeed::Fast)],
        ],
        &catalog,
        now(),
        false,
    );

    let order: Vec<&str> = log
        .events_of(EventType::Effect)
        .filter(|e| e.data.get("cardInstanceId").is_some())
        .map(|e| e.step.as_str())
        .collect();
    assert_eq!(order, vec!["fast", "normal", "slow"]);
}

#[test]
fn band_damage_is_snapshotted_so_both_strikes_land() {
    let catalog = CardCatalog::builtin();
    let mut state = new_state("m-snapshot");
    let target = put_unit(&mut state, 1, Point::new(6, 8), melee(0, 6), "victim");
    state.seats[0].hand.push(instance("fb-1", "fireball"));
    state.seats[0].hand.push(instance("fb-2", "fireball"));
    state.seats[0].resources = Resources::new(0, 4);

    let mut first = play_card(0, "fb-1", ActionSpeed::Fast);
    first.target_id = Some(target.as_str().to_owned());
    let mut second = play_card(0, "fb-2", ActionSpeed::Fast);
    second.target_id = Some(target.as_str().to_owned());

    let log = resolve_round(&mut state, [vec![first, second], vec![]], &catalog, now(), false);

    // 6 health vs two 4-damage bolts: the second still lands and is logged.
    let hits: Vec<_> = log
        .events_of(EventType::Damage)
        .filter(|e| e.step == "fast")
        .collect();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[1].data["targetAlive"], json!(false));
    assert!(!state.units.iter().any(|u| u.id == target));
}

#[test]
fn quiet_round_logs_only_movement_combat_and_cleanup() {
    let catalog = CardCatalog::builtin();
    let mut state = new_state("m-quiet");
    put_unit(
        &mut state,
        0,
        Point::new(4, 8),
        UnitStats {
            attack: 1,
            health: 3,
            armor: 0,
            speed: 1,
            range: 1,
        },
        "walker",
    );

    let log = resolve_round(&mut state, [vec![], vec![]], &catalog, now(), false);

    assert!(!log.events.is_empty());
    assert!(log.events.iter().all(|e| matches!(
        e.event_type,
        EventType::Movement | EventType::Damage | EventType::Resource | EventType::RoundEnd
    )));
}

#[test]
fn resolution_is_deterministic_byte_for_byte() {
    let catalog = CardCatalog::builtin();
    let build = || {
        let mut state = new_state("m-replay");
        put_unit(&mut state, 0, Point::new(5, 5), melee(3, 4), "a");
        put_unit(&mut state, 1, Point::new(5, 6), melee(2, 6), "b");
        state.seats[0].hand.push(instance("hand-1", "militia"));
        state.seats[0].resources = Resources::new(6, 2);
        state
    };
    let queues = || [vec![play_card(0, "hand-1", ActionSpeed::Normal)], vec![]];

    let mut one = build();
    let mut two = build();
    let log_one = resolve_round(&mut one, queues(), &catalog, now(), false);
    let log_two = resolve_round(&mut two, queues(), &catalog, now(), false);

    assert_eq!(
        serde_json::to_string(&log_one).unwrap(),
        serde_json::to_string(&log_two).unwrap()
    );
}

#[test]
fn card_instances_are_conserved_across_a_busy_round() {
    let catalog = CardCatalog::builtin();
    let mut state = new_state("m-conserve");
    state.seats[0].hand = vec![
        instance("c1", "militia"),
        instance("c2", "militia"),
        instance("c3", "militia"),
    ];
    state.seats[0].resources = Resources::new(10, 2);
    state.seats[0].planned_plays.push(PlannedPlay {
        instance_id: CardInstanceId::new("c1"),
        card_id: CardDefId::new("militia"),
        position: Point::new(5, 5),
    });
    state.seats[0]
        .pending_discards
        .push(CardInstanceId::new("c3"));

    resolve_round(
        &mut state,
        [vec![play_card(0, "c2", ActionSpeed::Normal)], vec![]],
        &catalog,
        now(),
        false,
    );

    // One on the board, one played to discard, one discarded at cleanup.
    assert_eq!(state.instance_count(0), 3);
    assert_eq!(state.units.len(), 1);
    assert_eq!(state.seats[0].discard_pile.len(), 2);
    assert!(state.seats[0].hand.is_empty());
}

#[test]
fn marked_discards_remove_exact_instances_at_cleanup() {
    let catalog = CardCatalog::builtin();
    let mut state = new_state("m-mark");
    state.seats[0].hand = vec![
        instance("ia", "militia"),
        instance("ib", "militia"),
        instance("ic", "militia"),
    ];
    state.seats[0]
        .pending_discards
        .push(CardInstanceId::new("ib"));

    let log = resolve_round(&mut state, [vec![], vec![]], &catalog, now(), false);

    let hand: Vec<_> = state.seats[0]
        .hand
        .iter()
        .map(|c| c.instance_id.as_str().to_owned())
        .collect();
    assert_eq!(hand, vec!["ia", "ic"]);
    assert_eq!(state.seats[0].discard_pile.len(), 1);
    assert!(state.seats[0].pending_discards.is_empty());

    let event = log
        .events_of(EventType::Discard)
        .next()
        .expect("one discard event for the seat");
    assert_eq!(event.data["requested"], json!(1));
    assert_eq!(event.data["discarded"], json!(1));
}

#[test]
fn mana_resets_to_zero_at_end_of_round() {
    let catalog = CardCatalog::builtin();
    let mut state = new_state("m-mana");
    state.seats[0].resources = Resources::new(3, 4);
    state.seats[1].resources = Resources::new(3, 0);

    let log = resolve_round(&mut state, [vec![], vec![]], &catalog, now(), false);

    assert_eq!(state.seats[0].resources.mana, 0);
    assert_eq!(state.seats[1].resources.mana, 0);
    // Only the seat whose mana actually changed gets an event.
    let resets: Vec<_> = log
        .events_of(EventType::Resource)
        .filter(|e| e.step == "end_of_round")
        .collect();
    assert_eq!(resets.len(), 1);
    assert_eq!(resets[0].data["seat"], json!(0));
}

#[test]
fn an_explicit_target_overrides_the_default_path() {
    let catalog = CardCatalog::builtin();
    let mut state = new_state("m-target-pos");
    let id = put_unit(
        &mut state,
        0,
        Point::new(5, 5),
        UnitStats {
            attack: 1,
            health: 3,
            armor: 0,
            speed: 1,
            range: 1,
        },
        "escort",
    );
    // Sent sideways instead of toward the enemy center.
    state
        .units
        .iter_mut()
        .find(|u| u.id == id)
        .unwrap()
        .target_position = Some(Point::new(5, 9));

    resolve_round(&mut state, [vec![], vec![]], &catalog, now(), false);

    let unit = state.units.iter().find(|u| u.id == id).unwrap();
    assert_eq!(unit.position, Point::new(5, 6));
}

#[test]
fn a_vacated_tile_opens_up_within_the_same_step() {
    let catalog = CardCatalog::builtin();
    let mut state = new_state("m-convoy");
    // Two units in column 8, leader in front; the follower takes the tile
    // the leader vacates.
    let leader = put_unit(
        &mut state,
        0,
        Point::new(5, 8),
        UnitStats {
            attack: 0,
            health: 3,
            armor: 0,
            speed: 1,
            range: 0,
        },
        "lead",
    );
    let follower = put_unit(
        &mut state,
        0,
        Point::new(4, 8),
        UnitStats {
            attack: 0,
            health: 3,
            armor: 0,
            speed: 1,
            range: 0,
        },
        "tail",
    );

    resolve_round(&mut state, [vec![], vec![]], &catalog, now(), false);

    let lead = state.units.iter().find(|u| u.id == leader).unwrap();
    let tail = state.units.iter().find(|u| u.id == follower).unwrap();
    assert_eq!(lead.position, Point::new(6, 8));
    assert_eq!(tail.position, Point::new(5, 8));
}

#[test]
fn armor_floors_combat_damage_at_zero() {
    let catalog = CardCatalog::builtin();
    let mut state = new_state("m-armor");
    put_unit(&mut state, 0, Point::new(5, 5), melee(1, 5), "soft");
    let tank = put_unit(
        &mut state,
        1,
        Point::new(5, 6),
        UnitStats {
            attack: 0,
            health: 4,
            armor: 3,
            speed: 0,
            range: 1,
        },
        "tank",
    );

    let log = resolve_round(&mut state, [vec![], vec![]], &catalog, now(), false);

    let unit = state.units.iter().find(|u| u.id == tank).unwrap();
    assert_eq!(unit.health, 4);
    let hit = log
        .events_of(EventType::Damage)
        .find(|e| e.data["targetId"] == json!(tank.as_str()))
        .expect("the swing is still logged");
    assert_eq!(hit.data["damage"], json!(0));
}

#[test]
fn units_spawned_this_round_do_not_move_or_attack() {
    let catalog = CardCatalog::builtin();
    let mut state = new_state("m-fresh");
    // An enemy parked next to the spawn tile.
    let bystander = put_unit(&mut state, 1, Point::new(5, 6), melee(0, 5), "bystander");
    state.seats[0].hand.push(instance("fresh", "raider"));
    state.seats[0].planned_plays.push(PlannedPlay {
        instance_id: CardInstanceId::new("fresh"),
        card_id: CardDefId::new("raider"),
        position: Point::new(5, 5),
    });

    resolve_round(&mut state, [vec![], vec![]], &catalog, now(), false);

    // The raider spawned after movement and combat and took no action.
    let raider = state
        .units
        .iter()
        .find(|u| u.card_id.as_str() == "raider")
        .unwrap();
    assert_eq!(raider.position, Point::new(5, 5));
    let enemy = state.units.iter().find(|u| u.id == bystander).unwrap();
    assert_eq!(enemy.health, 5);
}

#[test]
fn destroyed_center_finishes_the_match_with_a_winner() {
    let catalog = CardCatalog::builtin();
    let mut state = new_state("m-finish");
    state.command_centers[1].health = 5;
    put_unit(&mut state, 0, Point::new(8, 4), melee(6, 5), "ram");

    let log = resolve_round(&mut state, [vec![], vec![]], &catalog, now(), false);

    assert_eq!(state.status, MatchStatus::Finished);
    assert_eq!(state.winner(), 0);
    let end = log
        .events_of(EventType::RoundEnd)
        .next()
        .expect("round_end logged");
    assert_eq!(end.data["winner"], json!(0));
}
