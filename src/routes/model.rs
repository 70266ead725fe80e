use actix_web::{post, web};
use std::sync::Arc;
use tracing::info;

use crate::error::AppError;
use crate::middleware::auth::AuthenticatedUser;
use crate::types::{ChatReply, ChatRequest};
use crate::AppState;

#[post("/chat")]
async fn chat(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    web::Json(chat_request): web::Json<ChatRequest>,
) -> Result<web::Json<ChatReply>, AppError> {
    info!(
        "User {} chatting with character {}",
        authenticated_user.user_id, chat_request.character_id
    );

    let reply = app_state
        .chat
        .reply(
            &authenticated_user.user_id,
            chat_request.character_id,
            &chat_request.message,
        )
        .await?;

    Ok(web::Json(ChatReply { reply }))
}
