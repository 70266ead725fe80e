use actix_web::{delete, get, post, put, web, HttpResponse};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{Conversation, ConversationSummary};
use crate::types::SaveConversationRequest;
use crate::AppState;

#[get("")]
async fn list_conversations(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
) -> Result<web::Json<Vec<ConversationSummary>>, AppError> {
    let conversations = app_state
        .conversations
        .list_for_user(&authenticated_user.user_id)
        .await?;
    Ok(web::Json(conversations))
}

#[get("/character/{character_id}")]
async fn latest_for_character(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    character_id: web::Path<Uuid>,
) -> Result<web::Json<Conversation>, AppError> {
    let character_id = character_id.into_inner();
    let conversation = app_state
        .conversations
        .latest_for_character(&authenticated_user.user_id, character_id)
        .await?
        .ok_or_else(|| {
            AppError::not_found(format!("No conversation with character {}", character_id))
        })?;
    Ok(web::Json(conversation))
}

#[get("/{conversation_id}")]
async fn get_conversation(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    conversation_id: web::Path<Uuid>,
) -> Result<web::Json<Conversation>, AppError> {
    let conversation_id = conversation_id.into_inner();
    let conversation = app_state
        .conversations
        .get(&authenticated_user.user_id, conversation_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Conversation {} not found", conversation_id)))?;
    Ok(web::Json(conversation))
}

/// First save of a transcript (no id yet) or an upsert with a known id.
#[post("")]
async fn create_conversation(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    web::Json(save_request): web::Json<SaveConversationRequest>,
) -> Result<web::Json<Conversation>, AppError> {
    let conversation = save(&app_state, &authenticated_user.user_id, save_request).await?;
    Ok(web::Json(conversation))
}

#[put("/{conversation_id}")]
async fn update_conversation(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    conversation_id: web::Path<Uuid>,
    web::Json(mut save_request): web::Json<SaveConversationRequest>,
) -> Result<web::Json<Conversation>, AppError> {
    save_request.conversation_id = Some(conversation_id.into_inner());
    let conversation = save(&app_state, &authenticated_user.user_id, save_request).await?;
    Ok(web::Json(conversation))
}

#[delete("/{conversation_id}")]
async fn delete_conversation(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    conversation_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let conversation_id = conversation_id.into_inner();
    let deleted = app_state
        .conversations
        .delete(&authenticated_user.user_id, conversation_id)
        .await?;

    if !deleted {
        return Err(AppError::not_found(format!(
            "Conversation {} not found",
            conversation_id
        )));
    }
    Ok(HttpResponse::NoContent().finish())
}

async fn save(
    app_state: &AppState,
    user_id: &str,
    save_request: SaveConversationRequest,
) -> Result<Conversation, AppError> {
    app_state.characters.require(save_request.character_id).await?;

    if let Some(conversation_id) = save_request.conversation_id {
        let existing = app_state.conversations.get(user_id, conversation_id).await?;
        if let Some(existing) = existing {
            if existing.character_id != save_request.character_id {
                return Err(AppError::validation(format!(
                    "Conversation {} belongs to character {}",
                    conversation_id, existing.character_id
                )));
            }
        }
    }

    let conversation = app_state
        .conversations
        .save(user_id, &save_request)
        .await?
        .ok_or_else(|| {
            error!(
                "User {} could not save conversation {:?}",
                user_id, save_request.conversation_id
            );
            AppError::not_found("Conversation not found")
        })?;

    info!(
        "Saved conversation {} ({} messages)",
        conversation.id,
        conversation.messages.len()
    );
    Ok(conversation)
}
