use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::gateway::{GatewayError, LlmGateway};
use crate::models::Character;
use crate::prompts::Prompts;
use crate::store::{CharacterStore, SubscriptionStore};

/// Total LLM attempts per reply. The second one only happens after a
/// rate-limit response.
const MAX_ATTEMPTS: usize = 2;

#[derive(Clone)]
pub struct ChatOrchestrator {
    characters: Arc<dyn CharacterStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    llm: Arc<dyn LlmGateway>,
    retry_delay: Duration,
}

impl ChatOrchestrator {
    pub fn new(
        characters: Arc<dyn CharacterStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        llm: Arc<dyn LlmGateway>,
    ) -> Self {
        ChatOrchestrator {
            characters,
            subscriptions,
            llm,
            retry_delay: Duration::from_millis(750),
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Premium characters are only available to users with an active
    /// subscription.
    pub async fn authorize(&self, user_id: &str, character: &Character) -> Result<(), AppError> {
        if character.is_premium
            && !self
                .subscriptions
                .has_active_premium(user_id, Utc::now())
                .await?
        {
            info!(
                "User {} denied premium character {}",
                user_id, character.id
            );
            return Err(AppError::Forbidden("premium required".to_string()));
        }
        Ok(())
    }

    /// Produces the character's reply to a single user message.
    pub async fn reply(
        &self,
        user_id: &str,
        character_id: Uuid,
        message: &str,
    ) -> Result<String, AppError> {
        if message.trim().is_empty() {
            return Err(AppError::validation("message is required"));
        }

        let character = self.characters.require(character_id).await?;
        self.authorize(user_id, &character).await?;

        let prompt = Prompts::character_chat(&character, message);

        let mut attempt = 1;
        let reply = loop {
            match self.llm.complete(&prompt).await {
                Ok(reply) => break reply,
                Err(e) if e.is_rate_limited() && attempt < MAX_ATTEMPTS => {
                    warn!(
                        "LLM rate limited on attempt {}, retrying in {:?}",
                        attempt, self.retry_delay
                    );
                    attempt += 1;
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    warn!("LLM request failed after {} attempt(s): {}", attempt, e);
                    return Err(e.into());
                }
            }
        };

        let reply = reply.trim().to_string();
        if reply.is_empty() {
            return Err(GatewayError::Failed("LLM returned an empty reply".to_string()).into());
        }

        Ok(reply)
    }
}
