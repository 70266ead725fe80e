use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::CharacterStore;
use crate::error::AppError;
use crate::models::{Category, Character};
use crate::types::CharacterInput;

/// Read-through cache in front of a character store. Characters are looked
/// up on every chat and voice request but only change through the admin
/// routes, which go through this wrapper and invalidate.
pub struct CachedCharacterStore {
    inner: Arc<dyn CharacterStore>,
    cache: Cache<Uuid, Character>,
}

impl CachedCharacterStore {
    pub fn new(inner: Arc<dyn CharacterStore>, ttl: Duration) -> Self {
        CachedCharacterStore {
            inner,
            cache: Cache::builder().max_capacity(1_000).time_to_live(ttl).build(),
        }
    }
}

#[async_trait]
impl CharacterStore for CachedCharacterStore {
    async fn list(&self, category: Option<Category>) -> Result<Vec<Character>, AppError> {
        self.inner.list(category).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Character>, AppError> {
        if let Some(character) = self.cache.get(&id).await {
            debug!("Character cache hit: {:?}", id);
            return Ok(Some(character));
        }

        let character = self.inner.get(id).await?;
        if let Some(character) = &character {
            self.cache.insert(id, character.clone()).await;
        }
        Ok(character)
    }

    async fn create(&self, input: &CharacterInput) -> Result<Character, AppError> {
        self.inner.create(input).await
    }

    async fn update(&self, id: Uuid, input: &CharacterInput) -> Result<Option<Character>, AppError> {
        let character = self.inner.update(id, input).await?;
        self.cache.invalidate(&id).await;
        Ok(character)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let deleted = self.inner.delete(id).await?;
        self.cache.invalidate(&id).await;
        Ok(deleted)
    }
}
