//! Persistence seams. Handlers and orchestrators only see these traits; the
//! Postgres implementation delegates to the model-level queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Category, Character, Conversation, ConversationSummary};
use crate::types::{CharacterInput, SaveConversationRequest};

mod cache;
#[cfg(test)]
pub mod memory;
mod postgres;

pub use cache::CachedCharacterStore;
pub use postgres::PgStore;

#[async_trait]
pub trait CharacterStore: Send + Sync {
    async fn list(&self, category: Option<Category>) -> Result<Vec<Character>, AppError>;
    async fn get(&self, id: Uuid) -> Result<Option<Character>, AppError>;
    async fn create(&self, input: &CharacterInput) -> Result<Character, AppError>;
    async fn update(&self, id: Uuid, input: &CharacterInput) -> Result<Option<Character>, AppError>;
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;

    /// Like `get`, but a missing character is an error.
    async fn require(&self, id: Uuid) -> Result<Character, AppError> {
        self.get(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Character {} not found", id)))
    }
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<ConversationSummary>, AppError>;
    async fn get(&self, user_id: &str, id: Uuid) -> Result<Option<Conversation>, AppError>;
    async fn latest_for_character(
        &self,
        user_id: &str,
        character_id: Uuid,
    ) -> Result<Option<Conversation>, AppError>;
    /// Upsert by `request.conversation_id`. `None` means the id exists but
    /// belongs to someone else.
    async fn save(
        &self,
        user_id: &str,
        request: &SaveConversationRequest,
    ) -> Result<Option<Conversation>, AppError>;
    async fn delete(&self, user_id: &str, id: Uuid) -> Result<bool, AppError>;
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn has_active_premium(&self, user_id: &str, now: DateTime<Utc>) -> Result<bool, AppError>;
}
