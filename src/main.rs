use std::io;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use bookie::config::Config;
use bookie::middleware::{cors_from_origins, RequestLogging};
use bookie::routes::{api_v1_routes, public_routes};
use bookie::services::{Mailer, MpesaService};
use bookie::state::AppState;
use chrono::Local;
use log::info;
use sqlx::postgres::PgPoolOptions;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Logging
    let mut log_builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    log_builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S %:z"),
                record.level(),
                record.args()
            )
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
        })
        .init();

    let config = Config::from_env()?;
    config.validate()?;

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout))
        .idle_timeout(Duration::from_secs(config.database.idle_timeout))
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .context("Failed to run database migrations")?;

    let mpesa = Arc::new(MpesaService::new(config.mpesa.clone())?);
    let mailer = Arc::new(Mailer::from_config(&config.mail)?);

    let bind_address = config.bind_address();
    let workers = config.server.workers;
    let cors_origins = config.security.cors_allowed_origins.clone();
    let app_state = web::Data::new(AppState::new(db_pool, config, mpesa, mailer));

    info!("Starting Bookie payments server on {}", bind_address);

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(cors_from_origins(&cors_origins))
            .wrap(RequestLogging)
            .service(api_v1_routes())
            .service(public_routes())
    });

    if let Some(workers) = workers {
        server = server.workers(workers);
    }

    server.bind(&bind_address)?.run().await?;

    info!("Server stopped");
    Ok(())
}
