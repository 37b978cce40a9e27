//! Session hub fan-out and match store contracts.

use std::sync::Arc;

use gridfall_server::game::snapshot::MatchSnapshot;
use gridfall_server::game::types::{
    CardDefId, CardInstance, CardInstanceId, DeckId, MatchId, MatchState, Phase, Player,
};
use gridfall_server::hub::SessionHub;
use gridfall_server::protocol::ServerMsg;
use gridfall_server::store::{MatchStore, StoreError};

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

#[tokio::test]
async fn broadcast_reaches_every_subscriber_in_order() {
    let hub = SessionHub::new();
    let id = MatchId::new("h-order");
    let (_h1, mut rx1) = hub.subscribe(&id, Some(0));
    let (_h2, mut rx2) = hub.subscribe(&id, None);

    hub.broadcast(
        &id,
        ServerMsg::PhaseChanged {
            phase: Phase::Upkeep,
        },
    );
    hub.broadcast(
        &id,
        ServerMsg::PhaseChanged {
            phase: Phase::Decision,
        },
    );

    for rx in [&mut rx1, &mut rx2] {
        assert!(matches!(
            rx.try_recv().unwrap(),
            ServerMsg::PhaseChanged {
                phase: Phase::Upkeep
            }
        ));
        assert!(matches!(
            rx.try_recv().unwrap(),
            ServerMsg::PhaseChanged {
                phase: Phase::Decision
            }
        ));
    }
}

#[tokio::test]
async fn dead_subscribers_are_dropped_without_blocking_others() {
    let hub = SessionHub::new();
    let id = MatchId::new("h-dead");
    let (_h1, rx1) = hub.subscribe(&id, None);
    let (_h2, mut rx2) = hub.subscribe(&id, None);
    assert_eq!(hub.subscriber_count(&id), 2);

    drop(rx1);
    hub.broadcast(&id, ServerMsg::GameOver { winner: 0 });

    assert_eq!(hub.subscriber_count(&id), 1);
    assert!(matches!(
        rx2.try_recv().unwrap(),
        ServerMsg::GameOver { winner: 0 }
    ));
}

#[tokio::test]
async fn unsubscribe_removes_only_that_handle() {
    let hub = SessionHub::new();
    let id = MatchId::new("h-unsub");
    let (h1, _rx1) = hub.subscribe(&id, None);
    let (_h2, _rx2) = hub.subscribe(&id, None);

    hub.unsubscribe(&h1);
    assert_eq!(hub.subscriber_count(&id), 1);
}

#[tokio::test]
async fn state_broadcast_redacts_opposing_hands() {
    let hub = SessionHub::new();
    let id = MatchId::new("h-redact");
    let mut state = new_state("h-redact");
    for seat in 0..2 {
        state.seats[seat].hand.push(CardInstance {
            instance_id: CardInstanceId::new(format!("hidden-{seat}")),
            card_id: CardDefId::new("militia"),
        });
    }

    let (_h0, mut rx0) = hub.subscribe(&id, Some(0));
    let (_hs, mut rx_spec) = hub.subscribe(&id, None);
    hub.broadcast_state(&id, &state);

    let ServerMsg::State { state: for_seat0 } = rx0.try_recv().unwrap() else {
        panic!("expected state message");
    };
    assert_eq!(for_seat0.seats[0].hand.len(), 1);
    assert!(for_seat0.seats[1].hand.is_empty());
    assert_eq!(for_seat0.seats[1].hand_count, 1);

    let ServerMsg::State { state: for_spec } = rx_spec.try_recv().unwrap() else {
        panic!("expected state message");
    };
    assert!(for_spec.seats[0].hand.is_empty());
    assert!(for_spec.seats[1].hand.is_empty());
}

#[test]
fn snapshot_never_exposes_the_draw_pile() {
    let mut state = new_state("h-pile");
    state.seats[0].draw_pile.push(CardInstance {
        instance_id: CardInstanceId::new("secret"),
        card_id: CardDefId::new("militia"),
    });

    let snapshot = MatchSnapshot::of(&state, Some(0));
    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["seats"][0]["deckCount"], serde_json::json!(1));
    assert!(json["seats"][0].get("drawPile").is_none());
    assert!(!serde_json::to_string(&snapshot).unwrap().contains("secret"));
}

#[test]
fn store_enforces_create_and_lookup_contracts() {
    let store = Arc::new(MatchStore::new());
    let id = MatchId::new("s-contract");

    store.create(new_state("s-contract")).unwrap();
    assert_eq!(
        store.create(new_state("s-contract")),
        Err(StoreError::AlreadyExists)
    );

    let mut state = store.get(&id).unwrap();
    state.current_round = 5;
    store.update(state).unwrap();
    assert_eq!(store.get(&id).unwrap().current_round, 5);

    store.delete(&id).unwrap();
    assert_eq!(store.get(&id).unwrap_err(), StoreError::NotFound);
    assert_eq!(store.delete(&id), Err(StoreError::NotFound));
    assert_eq!(
        store.update(new_state("s-contract")),
        Err(StoreError::NotFound)
    );
}
