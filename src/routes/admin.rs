use actix_web::{delete, get, post, put, web, HttpResponse};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::AuthenticatedAdmin;
use crate::types::{CharacterDetail, CharacterInput};
use crate::AppState;

#[get("/characters")]
async fn list_characters(
    app_state: web::Data<Arc<AppState>>,
    _admin: AuthenticatedAdmin,
) -> Result<web::Json<Vec<CharacterDetail>>, AppError> {
    let characters = app_state.characters.list(None).await?;
    Ok(web::Json(
        characters.into_iter().map(CharacterDetail::from).collect(),
    ))
}

#[post("/characters")]
async fn create_character(
    app_state: web::Data<Arc<AppState>>,
    admin: AuthenticatedAdmin,
    web::Json(input): web::Json<CharacterInput>,
) -> Result<HttpResponse, AppError> {
    input.validate()?;
    let character = app_state.characters.create(&input).await?;
    info!("Admin {} created character {}", admin.admin_id, character.id);
    Ok(HttpResponse::Created().json(CharacterDetail::from(character)))
}

#[put("/characters/{character_id}")]
async fn update_character(
    app_state: web::Data<Arc<AppState>>,
    admin: AuthenticatedAdmin,
    character_id: web::Path<Uuid>,
    web::Json(input): web::Json<CharacterInput>,
) -> Result<web::Json<CharacterDetail>, AppError> {
    input.validate()?;
    let character_id = character_id.into_inner();
    let character = app_state
        .characters
        .update(character_id, &input)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Character {} not found", character_id)))?;
    info!("Admin {} updated character {}", admin.admin_id, character.id);
    Ok(web::Json(CharacterDetail::from(character)))
}

#[delete("/characters/{character_id}")]
async fn delete_character(
    app_state: web::Data<Arc<AppState>>,
    admin: AuthenticatedAdmin,
    character_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let character_id = character_id.into_inner();
    if !app_state.characters.delete(character_id).await? {
        return Err(AppError::not_found(format!(
            "Character {} not found",
            character_id
        )));
    }
    info!("Admin {} deleted character {}", admin.admin_id, character_id);
    Ok(HttpResponse::NoContent().finish())
}
