use actix_web::{middleware::Logger, web, App, HttpServer};
use std::sync::Arc;

use gridfall_server::{
    catalog::CardCatalog, config::settings, game::scheduler::Schedulers, http, hub::SessionHub,
    metrics, store::MatchStore, ws,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let cfg = settings();

    // Explicitly constructed collaborators; the scheduler registry owns one
    // actor task per match.
    let store = Arc::new(MatchStore::new());
    let catalog = Arc::new(CardCatalog::builtin());
    let hub = Arc::new(SessionHub::new());
    let schedulers = Arc::new(Schedulers::new(
        store.clone(),
        catalog.clone(),
        hub.clone(),
    ));

    log::info!("listening on {}", cfg.server_addr);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(metrics::METRICS.clone())
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(catalog.clone()))
            .app_data(web::Data::new(hub.clone()))
            .app_data(web::Data::new(schedulers.clone()))
            .configure(http::routes::init_routes)
            .configure(ws::routes::init_routes)
    })
    .bind(&cfg.server_addr)?
    .run()
    .await
}
