//! Read-only deck catalog queries, with card details populated per entry.

use actix_web::{get, web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::catalog::{CardCatalog, CardColor, CardDefinition, CardLookup, DeckDefinition};
use crate::game::types::DeckId;

/// A deck entry joined with its full card definition.
#[derive(Serialize)]
pub struct PopulatedDeckCard<'a> {
    pub card: &'a CardDefinition,
    pub quantity: u32,
}

/// A deck with every entry populated. Entries whose card is missing from
/// the catalog are skipped rather than failing the whole deck.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckWithCards<'a> {
    #[serde(flatten)]
    pub deck: &'a DeckDefinition,
    pub populated_cards: Vec<PopulatedDeckCard<'a>>,
}

fn populate<'a>(catalog: &'a CardCatalog, deck: &'a DeckDefinition) -> DeckWithCards<'a> {
    let mut populated_cards = Vec::new();
    if let Some(card) = catalog.lookup(&deck.hero) {
        populated_cards.push(PopulatedDeckCard { card, quantity: 1 });
    }
    if let Some(card) = deck.signature.as_ref().and_then(|id| catalog.lookup(id)) {
        populated_cards.push(PopulatedDeckCard { card, quantity: 1 });
    }
    for entry in deck.pawns.iter().chain(deck.main_cards.iter()) {
        match catalog.lookup(&entry.card_id) {
            Some(card) => populated_cards.push(PopulatedDeckCard {
                card,
                quantity: entry.quantity,
            }),
            None => log::warn!("deck {} references unknown card {}", deck.id, entry.card_id),
        }
    }
    DeckWithCards {
        deck,
        populated_cards,
    }
}

/// GET /api/decks — every prebuilt deck.
#[get("/decks")]
pub async fn all_decks(catalog: web::Data<Arc<CardCatalog>>) -> impl Responder {
    let decks = catalog.prebuilt_decks();
    HttpResponse::Ok().json(serde_json::json!({
        "decks": decks,
        "count": decks.len(),
    }))
}

/// GET /api/decks/prebuilt — prebuilt decks with populated entries.
#[get("/decks/prebuilt")]
pub async fn prebuilt_decks(catalog: web::Data<Arc<CardCatalog>>) -> impl Responder {
    let catalog: &CardCatalog = &catalog;
    let decks: Vec<_> = catalog
        .prebuilt_decks()
        .into_iter()
        .map(|deck| populate(catalog, deck))
        .collect();
    HttpResponse::Ok().json(serde_json::json!({
        "decks": decks,
        "count": decks.len(),
    }))
}

/// GET /api/decks/{deckId} — one deck with populated entries.
#[get("/decks/{deck_id}")]
pub async fn get_deck(
    path: web::Path<String>,
    catalog: web::Data<Arc<CardCatalog>>,
) -> impl Responder {
    let id = DeckId::new(path.into_inner());
    let catalog: &CardCatalog = &catalog;
    match catalog.deck(&id) {
        Some(deck) => HttpResponse::Ok().json(populate(catalog, deck)),
        None => HttpResponse::NotFound().body("deck not found"),
    }
}

#[derive(Deserialize)]
struct ColorPath {
    color: CardColor,
}

/// GET /api/decks/color/{color} — decks of one color.
#[get("/decks/color/{color}")]
pub async fn decks_by_color(
    path: web::Path<ColorPath>,
    catalog: web::Data<Arc<CardCatalog>>,
) -> impl Responder {
    let color = path.into_inner().color;
    let decks = catalog.decks_by_color(color);
    HttpResponse::Ok().json(serde_json::json!({
        "decks": decks,
        "color": color,
        "count": decks.len(),
    }))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(all_decks)
        .service(prebuilt_decks)
        .service(decks_by_color)
        .service(get_deck);
}
