use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Category, Character};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CharacterInput {
    pub name: String,
    pub description: Option<String>,
    pub system_prompt: String,
    pub avatar_url: Option<String>,
    pub voice_id: String,
    pub category: Option<Category>,
    pub is_premium: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CharacterListQuery {
    pub category: Option<Category>,
}

/// Admin view of a character, system prompt included.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CharacterDetail {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub system_prompt: String,
    pub avatar_url: Option<String>,
    pub voice_id: String,
    pub category: Category,
    pub is_premium: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Character> for CharacterDetail {
    fn from(character: Character) -> Self {
        CharacterDetail {
            id: character.id,
            name: character.name,
            description: character.description,
            system_prompt: character.system_prompt,
            avatar_url: character.avatar_url,
            voice_id: character.voice_id,
            category: character.category,
            is_premium: character.is_premium,
            created_at: character.created_at,
            updated_at: character.updated_at,
        }
    }
}

impl CharacterInput {
    pub fn validate(&self) -> Result<(), crate::error::AppError> {
        if self.name.trim().is_empty() {
            return Err(crate::error::AppError::validation("name is required"));
        }
        if self.system_prompt.trim().is_empty() {
            return Err(crate::error::AppError::validation("systemPrompt is required"));
        }
        if self.voice_id.trim().is_empty() {
            return Err(crate::error::AppError::validation("voiceId is required"));
        }
        Ok(())
    }
}
