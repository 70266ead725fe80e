use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::types::{ChatReply, ChatRequest, SaveConversationRequest, VoiceRequest};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{0}")]
    Validation(String),
    #[error("a message is already being sent")]
    Busy,
    #[error("server responded {status}: {message}")]
    Server { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("audio unavailable: {0}")]
    Audio(String),
}

/// What a session needs from the service. `HttpBackend` talks to the real
/// API; tests substitute their own.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn chat(&self, character_id: Uuid, message: &str) -> Result<String, SessionError>;
    async fn synthesize(&self, character_id: Uuid, text: &str) -> Result<Bytes, SessionError>;
    /// Persists the transcript and returns the conversation id, fresh when
    /// the request carried none.
    async fn save(&self, request: &SaveConversationRequest) -> Result<Uuid, SessionError>;
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
struct SavedConversation {
    id: Uuid,
}

pub struct HttpBackend {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        HttpBackend {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: Response) -> Result<Response, SessionError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
        };
        Err(SessionError::Server {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl SessionBackend for HttpBackend {
    async fn chat(&self, character_id: Uuid, message: &str) -> Result<String, SessionError> {
        let response = self
            .client
            .post(self.url("/api/model/chat"))
            .bearer_auth(&self.token)
            .json(&ChatRequest {
                character_id,
                message: message.to_string(),
            })
            .send()
            .await?;

        let reply: ChatReply = Self::check(response).await?.json().await?;
        Ok(reply.reply)
    }

    async fn synthesize(&self, character_id: Uuid, text: &str) -> Result<Bytes, SessionError> {
        let response = self
            .client
            .post(self.url("/api/voice/speak"))
            .bearer_auth(&self.token)
            .json(&VoiceRequest {
                text: text.to_string(),
                character_id,
            })
            .send()
            .await?;

        Ok(Self::check(response).await?.bytes().await?)
    }

    async fn save(&self, request: &SaveConversationRequest) -> Result<Uuid, SessionError> {
        let builder = match request.conversation_id {
            Some(id) => self.client.put(self.url(&format!("/api/conversations/{}", id))),
            None => self.client.post(self.url("/api/conversations")),
        };

        let response = builder.bearer_auth(&self.token).json(request).send().await?;
        let saved: SavedConversation = Self::check(response).await?.json().await?;
        Ok(saved.id)
    }
}
