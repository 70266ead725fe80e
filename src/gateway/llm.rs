use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use tracing::{info, warn};

use super::GatewayError;
use crate::config::AppConfig;

/// A single-turn completion request: one system message, one user message.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatPrompt {
    pub system: String,
    pub user: String,
}

#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn complete(&self, prompt: &ChatPrompt) -> Result<String, GatewayError>;
}

pub struct OpenAiGateway {
    client: Client<OpenAIConfig>,
    model: String,
    max_tokens: u32,
}

impl OpenAiGateway {
    pub fn new(app_config: &AppConfig) -> Self {
        let client = Client::with_config(
            OpenAIConfig::new()
                .with_api_key(&app_config.llm_api_key)
                .with_api_base(&app_config.llm_api_base),
        );

        OpenAiGateway {
            client,
            model: app_config.llm_model.clone(),
            max_tokens: app_config.llm_max_tokens,
        }
    }
}

#[async_trait]
impl LlmGateway for OpenAiGateway {
    async fn complete(&self, prompt: &ChatPrompt) -> Result<String, GatewayError> {
        let request = CreateChatCompletionRequestArgs::default()
            .max_tokens(self.max_tokens)
            .model(&self.model)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(prompt.system.clone())
                    .build()
                    .map_err(classify)?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt.user.clone())
                    .build()
                    .map_err(classify)?
                    .into(),
            ])
            .build()
            .map_err(classify)?;

        info!("Requesting completion from model: {}", self.model);

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("Completion request failed: {:?}", e);
            classify(e)
        })?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| GatewayError::Failed("No content in completion response".to_string()))
    }
}

fn classify(e: OpenAIError) -> GatewayError {
    let rate_limited = match &e {
        OpenAIError::ApiError(api) => is_rate_limit(api.r#type.as_deref(), &api.message),
        OpenAIError::Reqwest(err) => err.status().map_or(false, |status| status.as_u16() == 429),
        _ => false,
    };

    if rate_limited {
        GatewayError::RateLimited(e.to_string())
    } else {
        GatewayError::Failed(e.to_string())
    }
}

/// OpenAI-compatible providers don't agree on how they report throttling, so
/// accept either the error type or the wording.
fn is_rate_limit(kind: Option<&str>, message: &str) -> bool {
    let kind_matches = kind.map_or(false, |kind| {
        kind.contains("rate_limit") || kind == "requests" || kind == "tokens"
    });
    let message = message.to_lowercase();

    kind_matches || message.contains("rate limit") || message.contains("too many requests")
}
