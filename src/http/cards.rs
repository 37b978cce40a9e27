//! Read-only card catalog queries.

use actix_web::{get, web, HttpResponse, Responder};
use serde::Deserialize;
use std::sync::Arc;

use crate::catalog::{CardCatalog, CardColor, CardLookup, CardType};
use crate::game::types::CardDefId;

/// GET /api/cards — every card definition.
#[get("/cards")]
pub async fn all_cards(catalog: web::Data<Arc<CardCatalog>>) -> impl Responder {
    let cards = catalog.all_cards();
    HttpResponse::Ok().json(serde_json::json!({
        "cards": cards,
        "count": cards.len(),
    }))
}

/// GET /api/cards/{cardId} — one card definition.
#[get("/cards/{card_id}")]
pub async fn get_card(
    path: web::Path<String>,
    catalog: web::Data<Arc<CardCatalog>>,
) -> impl Responder {
    let id = CardDefId::new(path.into_inner());
    match catalog.lookup(&id) {
        Some(card) => HttpResponse::Ok().json(card),
        None => HttpResponse::NotFound().body("card not found"),
    }
}

#[derive(Deserialize)]
struct ColorPath {
    color: CardColor,
}

/// GET /api/cards/color/{color} — cards of one color.
#[get("/cards/color/{color}")]
pub async fn cards_by_color(
    path: web::Path<ColorPath>,
    catalog: web::Data<Arc<CardCatalog>>,
) -> impl Responder {
    let color = path.into_inner().color;
    let cards = catalog.cards_by_color(color);
    HttpResponse::Ok().json(serde_json::json!({
        "cards": cards,
        "color": color,
        "count": cards.len(),
    }))
}

#[derive(Deserialize)]
struct TypePath {
    card_type: CardType,
}

/// GET /api/cards/type/{type} — cards of one type.
#[get("/cards/type/{card_type}")]
pub async fn cards_by_type(
    path: web::Path<TypePath>,
    catalog: web::Data<Arc<CardCatalog>>,
) -> impl Responder {
    let card_type = path.into_inner().card_type;
    let cards = catalog.cards_by_type(card_type);
    HttpResponse::Ok().json(serde_json::json!({
        "cards": cards,
        "type": card_type,
        "count": cards.len(),
    }))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(all_cards)
        .service(cards_by_color)
        .service(cards_by_type)
        .service(get_card);
}
