use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query, query_as, FromRow, PgPool, Type};
use std::fmt;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::types::CharacterInput;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "character_category_enum", rename_all = "lowercase")] // SQL value name
#[serde(rename_all = "lowercase")] // JSON value name
pub enum Category {
    Anime,
    Game,
    Movie,
    Original,
    Other,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Anime => write!(f, "anime"),
            Category::Game => write!(f, "game"),
            Category::Movie => write!(f, "movie"),
            Category::Original => write!(f, "original"),
            Category::Other => write!(f, "other"),
        }
    }
}

/// A persona users can talk to. The system prompt never leaves the server
/// through this type; admin views go through `CharacterDetail`.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing)]
    pub system_prompt: String,
    pub avatar_url: Option<String>,
    pub voice_id: String,
    pub category: Category,
    pub is_premium: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Character {
    fn default() -> Self {
        Character {
            id: Uuid::new_v4(),
            name: String::new(),
            description: String::new(),
            system_prompt: String::new(),
            avatar_url: None,
            voice_id: String::new(),
            category: Category::Other,
            is_premium: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

impl Character {
    pub fn from_input(input: &CharacterInput) -> Self {
        Character {
            name: input.name.clone(),
            description: input.description.clone().unwrap_or_default(),
            system_prompt: input.system_prompt.clone(),
            avatar_url: input.avatar_url.clone(),
            voice_id: input.voice_id.clone(),
            category: input.category.unwrap_or(Category::Other),
            is_premium: input.is_premium.unwrap_or(false),
            ..Default::default()
        }
    }

    pub async fn list(pool: &PgPool, category: Option<Category>) -> Result<Vec<Self>> {
        let characters = query_as::<_, Character>(
            r#"
            SELECT * FROM characters
            WHERE ($1::character_category_enum IS NULL OR category = $1)
            ORDER BY is_premium ASC, name ASC
            "#,
        )
        .bind(category)
        .fetch_all(pool)
        .await?;

        Ok(characters)
    }

    pub async fn get_by_id(pool: &PgPool, character_id: Uuid) -> Result<Option<Self>> {
        let character = query_as::<_, Character>("SELECT * FROM characters WHERE id = $1")
            .bind(character_id)
            .fetch_optional(pool)
            .await?;

        Ok(character)
    }

    pub async fn create(pool: &PgPool, input: &CharacterInput) -> Result<Self> {
        let character = Character::from_input(input);

        let character = query_as::<_, Character>(
            r#"
            INSERT INTO characters (id, name, description, system_prompt, avatar_url, voice_id, category, is_premium, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(character.id)
        .bind(&character.name)
        .bind(&character.description)
        .bind(&character.system_prompt)
        .bind(&character.avatar_url)
        .bind(&character.voice_id)
        .bind(character.category)
        .bind(character.is_premium)
        .bind(character.created_at)
        .bind(character.updated_at)
        .fetch_one(pool)
        .await?;

        debug!("Character created: {:?}", character.id);
        Ok(character)
    }

    pub async fn update(
        pool: &PgPool,
        character_id: Uuid,
        input: &CharacterInput,
    ) -> Result<Option<Self>> {
        let changes = Character::from_input(input);

        let character = query_as::<_, Character>(
            r#"
            UPDATE characters
            SET name = $1, description = $2, system_prompt = $3, avatar_url = $4,
                voice_id = $5, category = $6, is_premium = $7, updated_at = $8
            WHERE id = $9
            RETURNING *
            "#,
        )
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(&changes.system_prompt)
        .bind(&changes.avatar_url)
        .bind(&changes.voice_id)
        .bind(changes.category)
        .bind(changes.is_premium)
        .bind(Utc::now())
        .bind(character_id)
        .fetch_optional(pool)
        .await?;

        debug!("Character updated: {:?}", character_id);
        Ok(character)
    }

    pub async fn delete(pool: &PgPool, character_id: Uuid) -> Result<bool> {
        let result = query("DELETE FROM characters WHERE id = $1")
            .bind(character_id)
            .execute(pool)
            .await?;

        debug!("Character deleted: {:?}", character_id);
        Ok(result.rows_affected() > 0)
    }
}
