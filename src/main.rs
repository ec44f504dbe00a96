use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use chrono::Datelike;

mod api;
mod auth;
mod calendar;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod models;
mod routes;
mod utils;
mod ws;

use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::utils::{email_filter, holiday_cache};
use crate::ws::EventHub;
use tracing::{info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!(addr = %config.server_addr, "Server starting...");

    let pool = init_db(&config).await?;

    // the filter must know existing emails before the bootstrap admin is checked
    if let Err(e) = email_filter::warmup_email_filter(&pool, 500).await {
        warn!(error = ?e, "Failed to warmup email filter");
    }

    auth::bootstrap::ensure_admin(&pool, &config).await?;

    let pool_for_cache_warmup = pool.clone();
    let this_year = config.today().year();

    actix_web::rt::spawn(async move {
        // current and next year cover every upcoming-holiday lookup
        if let Err(e) =
            holiday_cache::warmup_holiday_cache(&pool_for_cache_warmup, &[this_year, this_year + 1])
                .await
        {
            warn!(error = ?e, "Failed to warmup holiday cache");
        }
    });

    let hub = EventHub::default();
    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(Data::new(hub.clone()))
            // Configure auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await?;

    info!("Server stopped");
    Ok(())
}
