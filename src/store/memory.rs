//! In-process store used by the handler and orchestrator tests. Mirrors the
//! Postgres semantics closely enough to exercise the same call paths.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use super::{CharacterStore, ConversationStore, SubscriptionStore};
use crate::error::AppError;
use crate::models::{
    Category, Character, Conversation, ConversationSummary, Subscription, SubscriptionStatus,
};
use crate::types::{CharacterInput, SaveConversationRequest};

#[derive(Default)]
pub struct MemoryStore {
    characters: Mutex<HashMap<Uuid, Character>>,
    conversations: Mutex<HashMap<Uuid, Conversation>>,
    subscriptions: Mutex<Vec<Subscription>>,
    character_reads: AtomicUsize,
}

impl MemoryStore {
    pub fn add_character(&self, character: Character) -> Character {
        self.characters
            .lock()
            .unwrap()
            .insert(character.id, character.clone());
        character
    }

    pub fn grant_premium(&self, user_id: &str) {
        let now = Utc::now();
        self.subscriptions.lock().unwrap().push(Subscription {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            plan_id: "pro_monthly".to_string(),
            status: SubscriptionStatus::Active,
            current_period_start: now - Duration::days(1),
            current_period_end: now + Duration::days(30),
            created_at: now,
            updated_at: now,
        });
    }

    pub fn conversation_count(&self) -> usize {
        self.conversations.lock().unwrap().len()
    }

    pub fn character_reads(&self) -> usize {
        self.character_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CharacterStore for MemoryStore {
    async fn list(&self, category: Option<Category>) -> Result<Vec<Character>, AppError> {
        let mut characters: Vec<Character> = self
            .characters
            .lock()
            .unwrap()
            .values()
            .filter(|c| category.map_or(true, |category| c.category == category))
            .cloned()
            .collect();
        characters.sort_by(|a, b| (a.is_premium, &a.name).cmp(&(b.is_premium, &b.name)));
        Ok(characters)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Character>, AppError> {
        self.character_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.characters.lock().unwrap().get(&id).cloned())
    }

    async fn create(&self, input: &CharacterInput) -> Result<Character, AppError> {
        Ok(self.add_character(Character::from_input(input)))
    }

    async fn update(&self, id: Uuid, input: &CharacterInput) -> Result<Option<Character>, AppError> {
        let mut characters = self.characters.lock().unwrap();
        let Some(existing) = characters.get_mut(&id) else {
            return Ok(None);
        };
        let changes = Character::from_input(input);
        *existing = Character {
            id,
            created_at: existing.created_at,
            updated_at: Utc::now(),
            ..changes
        };
        Ok(Some(existing.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let removed = self.characters.lock().unwrap().remove(&id).is_some();
        if removed {
            self.conversations
                .lock()
                .unwrap()
                .retain(|_, conversation| conversation.character_id != id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<ConversationSummary>, AppError> {
        let mut summaries: Vec<ConversationSummary> = self
            .conversations
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.user_id == user_id)
            .map(Conversation::summary)
            .collect();
        summaries.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        Ok(summaries)
    }

    async fn get(&self, user_id: &str, id: Uuid) -> Result<Option<Conversation>, AppError> {
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .get(&id)
            .filter(|c| c.user_id == user_id)
            .cloned())
    }

    async fn latest_for_character(
        &self,
        user_id: &str,
        character_id: Uuid,
    ) -> Result<Option<Conversation>, AppError> {
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.user_id == user_id && c.character_id == character_id)
            .max_by_key(|c| c.last_message_at)
            .cloned())
    }

    async fn save(
        &self,
        user_id: &str,
        request: &SaveConversationRequest,
    ) -> Result<Option<Conversation>, AppError> {
        let now = Utc::now();
        let id = request.conversation_id.unwrap_or_else(Uuid::new_v4);
        let last_message_at: DateTime<Utc> = Conversation::last_message_at(&request.messages);
        let mut conversations = self.conversations.lock().unwrap();

        if let Some(existing) = conversations.get_mut(&id) {
            if existing.user_id != user_id || existing.character_id != request.character_id {
                return Ok(None);
            }
            if let Some(title) = &request.title {
                existing.title = title.clone();
            }
            existing.messages = request.messages.clone();
            existing.last_message_at = last_message_at;
            existing.updated_at = now;
            return Ok(Some(existing.clone()));
        }

        let conversation = Conversation {
            id,
            user_id: user_id.to_string(),
            character_id: request.character_id,
            title: request
                .title
                .clone()
                .unwrap_or_else(|| Conversation::derive_title(&request.messages)),
            messages: request.messages.clone(),
            last_message_at,
            created_at: now,
            updated_at: now,
        };
        conversations.insert(id, conversation.clone());
        Ok(Some(conversation))
    }

    async fn delete(&self, user_id: &str, id: Uuid) -> Result<bool, AppError> {
        let mut conversations = self.conversations.lock().unwrap();
        let owned = conversations
            .get(&id)
            .map_or(false, |c| c.user_id == user_id);
        if owned {
            conversations.remove(&id);
        }
        Ok(owned)
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn has_active_premium(&self, user_id: &str, now: DateTime<Utc>) -> Result<bool, AppError> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .any(|s| s.user_id == user_id && s.grants_premium_at(now)))
    }
}
