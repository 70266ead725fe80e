use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{query, query_as, FromRow, PgPool};
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::types::SaveConversationRequest;

const TITLE_MAX_CHARS: usize = 50;
const DEFAULT_TITLE: &str = "New Chat";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of a transcript. Messages only live inside a conversation's
/// `messages` array; their position is their order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub voice_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Message {
            role: Role::User,
            content: content.into(),
            voice_url: None,
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message {
            role: Role::Assistant,
            content: content.into(),
            voice_url: None,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: String,
    pub character_id: Uuid,
    pub title: String,
    pub messages: Vec<Message>,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: Uuid,
    pub character_id: Uuid,
    pub title: String,
    pub message_count: i32,
    pub last_message_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ConversationRow {
    id: Uuid,
    user_id: String,
    character_id: Uuid,
    title: String,
    messages: Json<Vec<Message>>,
    last_message_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Conversation {
            id: row.id,
            user_id: row.user_id,
            character_id: row.character_id,
            title: row.title,
            messages: row.messages.0,
            last_message_at: row.last_message_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl Conversation {
    /// Title for a conversation that was saved without one: the opening user
    /// message, cut to a readable length.
    pub fn derive_title(messages: &[Message]) -> String {
        let first = messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|content| !content.is_empty());

        match first {
            Some(content) if content.chars().count() > TITLE_MAX_CHARS => {
                let cut: String = content.chars().take(TITLE_MAX_CHARS).collect();
                format!("{}...", cut.trim_end())
            }
            Some(content) => content,
            None => DEFAULT_TITLE.to_string(),
        }
    }

    pub fn last_message_at(messages: &[Message]) -> DateTime<Utc> {
        messages
            .last()
            .map(|m| m.timestamp)
            .unwrap_or_else(Utc::now)
    }

    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id,
            character_id: self.character_id,
            title: self.title.clone(),
            message_count: self.messages.len() as i32,
            last_message_at: self.last_message_at,
        }
    }

    pub async fn list_for_user(pool: &PgPool, user_id: &str) -> Result<Vec<ConversationSummary>> {
        let summaries = query_as::<_, ConversationSummary>(
            r#"
            SELECT id, character_id, title, jsonb_array_length(messages)::INT4 AS message_count, last_message_at
            FROM conversations
            WHERE user_id = $1
            ORDER BY last_message_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(summaries)
    }

    pub async fn get_by_id(pool: &PgPool, user_id: &str, conversation_id: Uuid) -> Result<Option<Self>> {
        let row = query_as::<_, ConversationRow>(
            "SELECT * FROM conversations WHERE id = $1 AND user_id = $2",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(Conversation::from))
    }

    pub async fn latest_for_character(
        pool: &PgPool,
        user_id: &str,
        character_id: Uuid,
    ) -> Result<Option<Self>> {
        let row = query_as::<_, ConversationRow>(
            r#"
            SELECT * FROM conversations
            WHERE user_id = $1 AND character_id = $2
            ORDER BY last_message_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(character_id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(Conversation::from))
    }

    /// Upserts by id. Without an id a fresh one is minted; with an id that
    /// belongs to another user nothing is written and `None` comes back.
    pub async fn save(
        pool: &PgPool,
        user_id: &str,
        request: &SaveConversationRequest,
    ) -> Result<Option<Self>> {
        let id = request.conversation_id.unwrap_or_else(Uuid::new_v4);
        let insert_title = request
            .title
            .clone()
            .unwrap_or_else(|| Conversation::derive_title(&request.messages));
        let last_message_at = Conversation::last_message_at(&request.messages);
        let now = Utc::now();

        let row = query_as::<_, ConversationRow>(
            r#"
            INSERT INTO conversations (id, user_id, character_id, title, messages, last_message_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            ON CONFLICT (id) DO UPDATE
            SET title = COALESCE($8, conversations.title),
                messages = EXCLUDED.messages,
                last_message_at = EXCLUDED.last_message_at,
                updated_at = EXCLUDED.updated_at
            WHERE conversations.user_id = EXCLUDED.user_id
              AND conversations.character_id = EXCLUDED.character_id
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(request.character_id)
        .bind(insert_title)
        .bind(Json(&request.messages))
        .bind(last_message_at)
        .bind(now)
        .bind(&request.title)
        .fetch_optional(pool)
        .await?;

        debug!("Conversation saved: {:?}", id);
        Ok(row.map(Conversation::from))
    }

    pub async fn delete(pool: &PgPool, user_id: &str, conversation_id: Uuid) -> Result<bool> {
        let result = query("DELETE FROM conversations WHERE id = $1 AND user_id = $2")
            .bind(conversation_id)
            .bind(user_id)
            .execute(pool)
            .await?;

        debug!("Conversation deleted: {:?}", conversation_id);
        Ok(result.rows_affected() > 0)
    }
}
