//! Simple liveness / readiness probe

use actix_web::{get, web, HttpResponse, Responder};
use std::sync::Arc;

use crate::store::MatchStore;

#[get("/healthz")]
pub async fn healthz(store: web::Data<Arc<MatchStore>>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "matches": store.len(),
    }))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(healthz);
}
