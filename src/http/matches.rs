//! Thin match lifecycle endpoints: create, inspect, tear down.
//!
//! Full lobby CRUD lives outside this service; these handlers exist so a
//! match can be brought up and its scheduler started.

use actix_web::{delete, get, post, web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::catalog::CardCatalog;
use crate::config::settings;
use crate::game::scheduler::Schedulers;
use crate::game::snapshot::MatchSnapshot;
use crate::game::types::{DeckId, MatchId, MatchState, MatchStatus, Player};
use crate::hub::SessionHub;
use crate::store::{MatchStore, StoreError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMatchReq {
    #[serde(default)]
    pub match_id: Option<String>,
    #[serde(default)]
    pub players: Option<[PlayerReq; 2]>,
    #[serde(default)]
    pub deck_ids: Option<[String; 2]>,
}

#[derive(Debug, Deserialize)]
pub struct PlayerReq {
    pub id: String,
    pub name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MatchSummary {
    id: MatchId,
    status: MatchStatus,
    round: u32,
}

/// POST /api/matches — create a match and start its scheduler. The second
/// seat defaults to a stub opponent that never submits actions.
#[post("/matches")]
pub async fn create_match(
    req: web::Json<CreateMatchReq>,
    store: web::Data<Arc<MatchStore>>,
    catalog: web::Data<Arc<CardCatalog>>,
    schedulers: web::Data<Arc<Schedulers>>,
) -> impl Responder {
    let req = req.into_inner();
    let match_id = MatchId::new(
        req.match_id
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
    );

    let players = match req.players {
        Some([p0, p1]) => [
            Player {
                id: p0.id,
                name: p0.name,
            },
            Player {
                id: p1.id,
                name: p1.name,
            },
        ],
        None => [
            Player {
                id: "player".into(),
                name: "Player".into(),
            },
            Player {
                id: "cpu".into(),
                name: "CPU".into(),
            },
        ],
    };

    let prebuilt = catalog.prebuilt_decks();
    let deck_ids = match req.deck_ids {
        Some([d0, d1]) => [DeckId::new(d0), DeckId::new(d1)],
        None => {
            let pick = |i: usize| {
                prebuilt
                    .get(i % prebuilt.len().max(1))
                    .map(|d| d.id.clone())
                    .unwrap_or_else(|| DeckId::new("default"))
            };
            [pick(0), pick(1)]
        }
    };

    let cfg = settings();
    let state = MatchState::new(
        match_id.clone(),
        players,
        deck_ids,
        cfg.board_rows,
        cfg.board_cols,
    );

    match store.create(state) {
        Ok(()) => {}
        Err(StoreError::AlreadyExists) => {
            return HttpResponse::Conflict().body("match already exists")
        }
        Err(e) => return HttpResponse::InternalServerError().body(e.to_string()),
    }
    if let Err(e) = schedulers.start(&match_id) {
        log::error!("failed to start scheduler for {match_id}: {e:?}");
        return HttpResponse::InternalServerError().body("scheduler start failed");
    }

    log::info!("match {match_id} created");
    match store.get(&match_id) {
        Ok(state) => HttpResponse::Created().json(MatchSnapshot::of(&state, None)),
        Err(_) => HttpResponse::InternalServerError().finish(),
    }
}

/// GET /api/matches — ids and status of every live match.
#[get("/matches")]
pub async fn list_matches(store: web::Data<Arc<MatchStore>>) -> impl Responder {
    let mut out = Vec::new();
    for id in store.list() {
        if let Ok(state) = store.get(&id) {
            out.push(MatchSummary {
                id,
                status: state.status,
                round: state.current_round,
            });
        }
    }
    HttpResponse::Ok().json(out)
}

/// GET /api/matches/{id} — spectator snapshot.
#[get("/matches/{id}")]
pub async fn get_match(
    path: web::Path<String>,
    store: web::Data<Arc<MatchStore>>,
) -> impl Responder {
    let id = MatchId::new(path.into_inner());
    match store.get(&id) {
        Ok(state) => HttpResponse::Ok().json(MatchSnapshot::of(&state, None)),
        Err(_) => HttpResponse::NotFound().body("match not found"),
    }
}

/// DELETE /api/matches/{id} — stop the scheduler, drop subscribers and
/// forget the match.
#[delete("/matches/{id}")]
pub async fn delete_match(
    path: web::Path<String>,
    store: web::Data<Arc<MatchStore>>,
    hub: web::Data<Arc<SessionHub>>,
    schedulers: web::Data<Arc<Schedulers>>,
) -> impl Responder {
    let id = MatchId::new(path.into_inner());
    schedulers.shutdown(&id).await;
    hub.close_match(&id);
    match store.delete(&id) {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(_) => HttpResponse::NotFound().body("match not found"),
    }
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(create_match)
        .service(list_matches)
        .service(get_match)
        .service(delete_match);
}
