use actix_web::{post, web, HttpResponse};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;

use crate::error::AppError;
use crate::middleware::auth::AuthenticatedUser;
use crate::services::SpokenReply;
use crate::types::{VoiceOfflineResponse, VoiceRequest};
use crate::AppState;

/// Carries the generated reply next to the audio body. Base64 keeps arbitrary
/// text header-safe.
pub const REPLY_TEXT_HEADER: &str = "X-Reply-Text";

#[post("/speak")]
async fn speak(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    web::Json(voice_request): web::Json<VoiceRequest>,
) -> Result<HttpResponse, AppError> {
    let audio = app_state
        .voice
        .synthesize(
            &authenticated_user.user_id,
            voice_request.character_id,
            &voice_request.text,
        )
        .await?;

    Ok(HttpResponse::Ok().content_type("audio/wav").body(audio))
}

#[post("/chat")]
async fn chat(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    web::Json(voice_request): web::Json<VoiceRequest>,
) -> Result<HttpResponse, AppError> {
    let spoken = app_state
        .voice
        .reply_and_synthesize(
            &authenticated_user.user_id,
            voice_request.character_id,
            &voice_request.text,
        )
        .await?;

    let encoded_reply = STANDARD.encode(spoken.reply());

    let response = match spoken {
        SpokenReply::Full { audio, .. } => HttpResponse::Ok()
            .content_type("audio/wav")
            .insert_header((REPLY_TEXT_HEADER, encoded_reply))
            .body(audio),
        SpokenReply::Partial { reply } => HttpResponse::Ok()
            .insert_header((REPLY_TEXT_HEADER, encoded_reply))
            .json(VoiceOfflineResponse {
                text: reply,
                voice_offline: true,
            }),
    };

    Ok(response)
}
