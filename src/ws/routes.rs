use crate::ws::index::ws_index;
use actix_web::web;

/// Mount the per-match WebSocket endpoint.
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/ws/{match_id}", web::get().to(ws_index));
}
