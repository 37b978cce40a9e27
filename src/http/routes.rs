use crate::http;
use actix_web::web;

/// Mount every HTTP sub-module under `/api`.
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .configure(http::cards::init_routes)
            .configure(http::decks::init_routes)
            .configure(http::matches::init_routes)
            .configure(http::health::init_routes),
    );
}
