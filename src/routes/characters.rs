use actix_web::{get, web};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Character;
use crate::types::CharacterListQuery;
use crate::AppState;

#[get("")]
async fn list_characters(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<CharacterListQuery>,
) -> Result<web::Json<Vec<Character>>, AppError> {
    let characters = app_state.characters.list(query.category).await?;
    Ok(web::Json(characters))
}

#[get("/{character_id}")]
async fn get_character(
    app_state: web::Data<Arc<AppState>>,
    character_id: web::Path<Uuid>,
) -> Result<web::Json<Character>, AppError> {
    let character = app_state.characters.require(character_id.into_inner()).await?;
    Ok(web::Json(character))
}
