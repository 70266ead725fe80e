use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{CharacterStore, ConversationStore, SubscriptionStore};
use crate::error::AppError;
use crate::models::{Category, Character, Conversation, ConversationSummary, Subscription};
use crate::types::{CharacterInput, SaveConversationRequest};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }
}

#[async_trait]
impl CharacterStore for PgStore {
    async fn list(&self, category: Option<Category>) -> Result<Vec<Character>, AppError> {
        Ok(Character::list(&self.pool, category).await?)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Character>, AppError> {
        Ok(Character::get_by_id(&self.pool, id).await?)
    }

    async fn create(&self, input: &CharacterInput) -> Result<Character, AppError> {
        Ok(Character::create(&self.pool, input).await?)
    }

    async fn update(&self, id: Uuid, input: &CharacterInput) -> Result<Option<Character>, AppError> {
        Ok(Character::update(&self.pool, id, input).await?)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(Character::delete(&self.pool, id).await?)
    }
}

#[async_trait]
impl ConversationStore for PgStore {
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<ConversationSummary>, AppError> {
        Ok(Conversation::list_for_user(&self.pool, user_id).await?)
    }

    async fn get(&self, user_id: &str, id: Uuid) -> Result<Option<Conversation>, AppError> {
        Ok(Conversation::get_by_id(&self.pool, user_id, id).await?)
    }

    async fn latest_for_character(
        &self,
        user_id: &str,
        character_id: Uuid,
    ) -> Result<Option<Conversation>, AppError> {
        Ok(Conversation::latest_for_character(&self.pool, user_id, character_id).await?)
    }

    async fn save(
        &self,
        user_id: &str,
        request: &SaveConversationRequest,
    ) -> Result<Option<Conversation>, AppError> {
        Ok(Conversation::save(&self.pool, user_id, request).await?)
    }

    async fn delete(&self, user_id: &str, id: Uuid) -> Result<bool, AppError> {
        Ok(Conversation::delete(&self.pool, user_id, id).await?)
    }
}

#[async_trait]
impl SubscriptionStore for PgStore {
    async fn has_active_premium(&self, user_id: &str, now: DateTime<Utc>) -> Result<bool, AppError> {
        Ok(Subscription::has_active_premium(&self.pool, user_id, now).await?)
    }
}
