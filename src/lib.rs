use actix_web::web;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub mod config;
pub mod error;
pub mod gateway;
pub mod middleware;
pub mod models;
pub mod prompts;
pub mod routes;
pub mod services;
pub mod session;
pub mod store;
pub mod types;

pub use config::AppConfig;

use error::AppError;
use gateway::{LlmGateway, TtsGateway};
use middleware::auth::Authentication;
use routes::ApiDoc;
use services::{ChatOrchestrator, VoiceOrchestrator};
use store::{CharacterStore, ConversationStore, SubscriptionStore};

pub struct AppState {
    pub characters: Arc<dyn CharacterStore>,
    pub conversations: Arc<dyn ConversationStore>,
    pub chat: ChatOrchestrator,
    pub voice: VoiceOrchestrator,
}

impl AppState {
    pub fn new(
        characters: Arc<dyn CharacterStore>,
        conversations: Arc<dyn ConversationStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        llm: Arc<dyn LlmGateway>,
        tts: Arc<dyn TtsGateway>,
    ) -> Self {
        let chat = ChatOrchestrator::new(characters.clone(), subscriptions, llm);
        let voice = VoiceOrchestrator::new(characters.clone(), tts, chat.clone());

        AppState {
            characters,
            conversations,
            chat,
            voice,
        }
    }
}

/// Mounts every route. Shared by the Shuttle entrypoint and the handler tests.
/// Extractor failures are rendered like any other `AppError`.
pub fn configure(cfg: &mut web::ServiceConfig, app_state: Arc<AppState>, app_config: Arc<AppConfig>) {
    cfg.app_data(web::Data::new(app_state))
        .app_data(
            web::JsonConfig::default()
                .error_handler(|err, _req| AppError::validation(err.to_string()).into()),
        )
        .app_data(
            web::PathConfig::default()
                .error_handler(|err, _req| AppError::validation(err.to_string()).into()),
        )
        .app_data(
            web::QueryConfig::default()
                .error_handler(|err, _req| AppError::validation(err.to_string()).into()),
        )
        .service(routes::health)
        .service(Scalar::with_url("/docs", ApiDoc::openapi()))
        .service(
            web::scope("/api/model")
                .wrap(Authentication::user(&app_config))
                .service(routes::model::chat),
        )
        .service(
            web::scope("/api/voice")
                .wrap(Authentication::user(&app_config))
                .service(routes::voice::speak)
                .service(routes::voice::chat),
        )
        .service(
            web::scope("/api/conversations")
                .wrap(Authentication::user(&app_config))
                .service(routes::conversations::list_conversations)
                .service(routes::conversations::latest_for_character)
                .service(routes::conversations::get_conversation)
                .service(routes::conversations::create_conversation)
                .service(routes::conversations::update_conversation)
                .service(routes::conversations::delete_conversation),
        )
        .service(
            web::scope("/api/characters")
                .service(routes::characters::list_characters)
                .service(routes::characters::get_character),
        )
        .service(
            web::scope("/api/admin")
                .wrap(Authentication::admin(&app_config))
                .service(routes::admin::list_characters)
                .service(routes::admin::create_character)
                .service(routes::admin::update_character)
                .service(routes::admin::delete_character),
        );
}
