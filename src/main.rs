use actix_cors::Cors;
use actix_web::{middleware::Logger, web};
use anyhow::Context;
use shuttle_actix_web::ShuttleActixWeb;
use shuttle_runtime::SecretStore;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use anivoice::gateway::{HttpTtsGateway, OpenAiGateway};
use anivoice::routes::voice::REPLY_TEXT_HEADER;
use anivoice::store::{CachedCharacterStore, PgStore};
use anivoice::{AppConfig, AppState};

const CHARACTER_CACHE_TTL: Duration = Duration::from_secs(300);

#[shuttle_runtime::main]
async fn main(
    #[shuttle_runtime::Secrets] secret_store: SecretStore,
) -> ShuttleActixWeb<impl FnOnce(&mut web::ServiceConfig) + Send + Clone + 'static> {
    let app_config = Arc::new(AppConfig::new(&secret_store)?);

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&app_config.database_url)
        .await
        .context("Failed to connect to Postgres")?;
    sqlx::migrate!()
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let store = Arc::new(PgStore::new(pool));
    let characters = Arc::new(CachedCharacterStore::new(store.clone(), CHARACTER_CACHE_TTL));
    let llm = Arc::new(OpenAiGateway::new(&app_config));
    let tts = Arc::new(HttpTtsGateway::new(&app_config)?);

    let app_state = Arc::new(AppState::new(characters, store.clone(), store, llm, tts));
    info!(
        "AniVoice ready (model {}, tts {})",
        app_config.llm_model, app_config.tts_api_url
    );

    let config = move |cfg: &mut web::ServiceConfig| {
        let cors = match app_config.cors_origin.as_deref() {
            Some(origin) => Cors::default()
                .allowed_origin(origin)
                .allow_any_method()
                .allow_any_header()
                .expose_headers([REPLY_TEXT_HEADER])
                .max_age(3600),
            None => Cors::permissive(),
        };

        cfg.service(
            web::scope("")
                .wrap(Logger::default())
                .wrap(cors)
                .configure(|cfg| anivoice::configure(cfg, app_state, app_config)),
        );
    };

    Ok(config.into())
}
