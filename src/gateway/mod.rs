//! Outbound calls to the hosted completion and speech providers.

#[cfg(test)]
pub mod fake;
mod llm;
mod tts;

pub use llm::{ChatPrompt, LlmGateway, OpenAiGateway};
pub use tts::{HttpTtsGateway, SpeechRequest, TtsGateway};

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    /// The provider asked us to slow down. Worth one more try.
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("{0}")]
    Failed(String),
}

impl GatewayError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GatewayError::RateLimited(_))
    }
}

impl From<GatewayError> for AppError {
    fn from(e: GatewayError) -> Self {
        AppError::Upstream(e.to_string())
    }
}
