//! Deck expansion and the draw engine.
//!
//! Every random choice flows through a per-seat PCG stream seeded from
//! `(matchId, seat)`, so a match replays bit for bit from its id alone.

use rand::Rng;
use rand_pcg::Pcg64Mcg;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::catalog::DeckDefinition;
use crate::config::settings;
use crate::game::events::{EventLog, EventType};
use crate::game::types::{CardInstance, CardInstanceId, MatchId, MatchState, Seat, SeatState};

/// Derives the seat's shuffle seed from the match id.
pub fn seat_seed(match_id: &MatchId, seat: Seat) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(match_id.as_str().as_bytes());
    hasher.update([seat as u8]);
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Expands a u64 seed into the 16 bytes the PCG generator wants.
pub fn rng_from_seed(seed: u64) -> Pcg64Mcg {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    rand::SeedableRng::from_seed(bytes)
}

pub fn seat_rng(match_id: &MatchId, seat: Seat) -> Pcg64Mcg {
    rng_from_seed(seat_seed(match_id, seat))
}

fn shuffle<T>(items: &mut [T], rng: &mut Pcg64Mcg) {
    if items.len() <= 1 {
        return;
    }
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

/// Expands a deck definition into a shuffled draw pile of unique instances:
/// hero, signature, pawns, then the main list, one instance per copy.
/// Instance ids are ordinal so seeded replays stay identical.
pub fn expand_deck(deck: &DeckDefinition, seat: Seat, rng: &mut Pcg64Mcg) -> Vec<CardInstance> {
    let mut ordinal = 0u32;
    let mut instance = |card_id: &crate::game::types::CardDefId| {
        ordinal += 1;
        CardInstance {
            instance_id: CardInstanceId::new(format!("ci-{seat}-{ordinal}")),
            card_id: card_id.clone(),
        }
    };

    let mut pile = Vec::with_capacity(deck.card_count());
    pile.push(instance(&deck.hero));
    if let Some(sig) = &deck.signature {
        pile.push(instance(sig));
    }
    for entry in deck.pawns.iter().chain(deck.main_cards.iter()) {
        for _ in 0..entry.quantity {
            pile.push(instance(&entry.card_id));
        }
    }
    shuffle(&mut pile, rng);
    pile
}

/// Draws up to `count` cards for a seat, reshuffling the discard pile into
/// the draw pile when it runs dry. Each reshuffle costs the seat's own
/// command center the exhaustion penalty. Returns the number actually drawn;
/// with both piles empty the draw simply stops short.
pub fn draw_to_hand(
    state: &mut MatchState,
    seat: Seat,
    count: usize,
    rng: &mut Pcg64Mcg,
    log: &mut EventLog,
) -> usize {
    let penalty = settings().deck_exhaustion_penalty;
    let MatchState {
        seats,
        command_centers,
        ..
    } = state;
    let ps = &mut seats[seat];

    let mut drawn = 0;
    for _ in 0..count {
        if ps.draw_pile.is_empty() {
            if ps.discard_pile.is_empty() {
                break;
            }
            ps.draw_pile.append(&mut ps.discard_pile);
            shuffle(&mut ps.draw_pile, rng);
            command_centers[seat].take_damage(penalty);
            log.push(
                EventType::Effect,
                "upkeep",
                json!({
                    "seat": seat,
                    "deckExhausted": true,
                    "penaltyDamage": penalty,
                    "ccHealth": command_centers[seat].health,
                }),
            );
        }
        if let Some(card) = ps.draw_pile.pop() {
            ps.hand.push(card);
            drawn += 1;
        }
    }
    drawn
}

/// Moves each instance found in hand to the discard pile; unknown ids are
/// ignored. Returns how many actually moved.
pub fn discard_instances(seat_state: &mut SeatState, ids: &[CardInstanceId]) -> usize {
    let mut moved = 0;
    for id in ids {
        if seat_state.discard_from_hand(id).is_some() {
            moved += 1;
        }
    }
    moved
}
