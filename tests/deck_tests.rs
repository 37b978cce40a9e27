//! Deck expansion and draw engine behavior.

use chrono::Utc;
use gridfall_server::catalog::CardCatalog;
use gridfall_server::game::deck;
use gridfall_server::game::events::{EventLog, EventType};
use gridfall_server::game::types::{
    CardDefId, CardInstance, CardInstanceId, DeckId, MatchId, MatchState, Player,
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
    MatchState::new(
        MatchId::new(id),
        players(),
        [DeckId::new("crimson_assault"), DeckId::new("azure_bulwark")],
        12,
        12,
    )
}

fn instance(n: u32, card: &str) -> CardInstance {
    CardInstance {
        instance_id: CardInstanceId::new(format!("t-{n}")),
        card_id: CardDefId::new(card),
    }
}

#[test]
fn expansion_yields_one_instance_per_copy() {
    let catalog = CardCatalog::builtin();
    let deck = catalog.deck(&DeckId::new("crimson_assault")).unwrap();
    let match_id = MatchId::new("m1");

    let mut rng = deck::seat_rng(&match_id, 0);
    let pile = deck::expand_deck(deck, 0, &mut rng);

    assert_eq!(pile.len(), deck.card_count());

    // Every instance id is unique even though definitions repeat.
    let mut ids: Vec<_> = pile.iter().map(|c| c.instance_id.clone()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), pile.len());

    // One hero, one signature.
    let heroes = pile.iter().filter(|c| c.card_id == deck.hero).count();
    assert_eq!(heroes, 1);
}

#[test]
fn expansion_is_deterministic_per_match_and_seat() {
    let catalog = CardCatalog::builtin();
    let deck = catalog.deck(&DeckId::new("crimson_assault")).unwrap();
    let match_id = MatchId::new("replay-me");

    let mut rng_a = deck::seat_rng(&match_id, 0);
    let mut rng_b = deck::seat_rng(&match_id, 0);
    let pile_a = deck::expand_deck(deck, 0, &mut rng_a);
    let pile_b = deck::expand_deck(deck, 0, &mut rng_b);
    assert_eq!(pile_a, pile_b);

    // The other seat shuffles differently.
    let mut rng_c = deck::seat_rng(&match_id, 1);
    let pile_c = deck::expand_deck(deck, 1, &mut rng_c);
    let order_a: Vec<_> = pile_a.iter().map(|c| c.card_id.clone()).collect();
    let order_c: Vec<_> = pile_c.iter().map(|c| c.card_id.clone()).collect();
    assert_ne!(order_a, order_c);
}

#[test]
fn draw_moves_top_of_pile_into_hand() {
    let mut state = new_state("m-draw");
    state.seats[0].draw_pile = vec![instance(1, "militia"), instance(2, "raider")];

    let mut rng = deck::seat_rng(&state.id, 0);
    let mut log = EventLog::new(1, Utc::now());
    let drawn = deck::draw_to_hand(&mut state, 0, 1, &mut rng, &mut log);

    assert_eq!(drawn, 1);
    // Top of pile is the last element.
    assert_eq!(state.seats[0].hand[0].instance_id.as_str(), "t-2");
    assert_eq!(state.seats[0].draw_pile.len(), 1);
}

#[test]
fn exhaustion_reshuffles_discard_and_damages_own_center() {
    // Draw pile empty, 5 in discard, 3 in hand, limit 7: drawing 4 reshuffles
    // once, costs 25 health, and ends 1/7/0.
    let mut state = new_state("m-exhaust");
    state.seats[0].discard_pile = (1..=5).map(|n| instance(n, "militia")).collect();
    state.seats[0].hand = (6..=8).map(|n| instance(n, "militia")).collect();

    let mut rng = deck::seat_rng(&state.id, 0);
    let mut log = EventLog::new(1, Utc::now());
    let drawn = deck::draw_to_hand(&mut state, 0, 4, &mut rng, &mut log);

    assert_eq!(drawn, 4);
    assert_eq!(state.seats[0].draw_pile.len(), 1);
    assert_eq!(state.seats[0].hand.len(), 7);
    assert!(state.seats[0].discard_pile.is_empty());
    assert_eq!(state.command_centers[0].health, 75);

    let penalty = log
        .events_of(EventType::Effect)
        .find(|e| e.data["deckExhausted"] == serde_json::json!(true))
        .expect("exhaustion event logged");
    assert_eq!(penalty.data["penaltyDamage"], serde_json::json!(25));
}

#[test]
fn draw_stops_when_both_piles_are_empty() {
    let mut state = new_state("m-empty");
    state.seats[0].draw_pile = vec![instance(1, "militia")];

    let mut rng = deck::seat_rng(&state.id, 0);
    let mut log = EventLog::new(1, Utc::now());
    let drawn = deck::draw_to_hand(&mut state, 0, 4, &mut rng, &mut log);

    assert_eq!(drawn, 1);
    assert_eq!(state.command_centers[0].health, 100);
    assert!(log.events.is_empty());
}

#[test]
fn discard_targets_exact_instances() {
    // Three copies of the same definition: discarding B leaves A and C.
    let mut state = new_state("m-discard");
    state.seats[0].hand = vec![
        instance(1, "militia"),
        instance(2, "militia"),
        instance(3, "militia"),
    ];

    let moved = deck::discard_instances(
        &mut state.seats[0],
        &[
            CardInstanceId::new("t-2"),
            CardInstanceId::new("ghost"), // unknown ids are ignored
        ],
    );

    assert_eq!(moved, 1);
    let hand: Vec<_> = state.seats[0]
        .hand
        .iter()
        .map(|c| c.instance_id.as_str().to_owned())
        .collect();
    assert_eq!(hand, vec!["t-1", "t-3"]);
    assert_eq!(state.seats[0].discard_pile[0].instance_id.as_str(), "t-2");
}
