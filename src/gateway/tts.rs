use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info};

use super::GatewayError;
use crate::config::AppConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub voice: String,
    pub input: String,
    pub speed: f32,
}

#[async_trait]
pub trait TtsGateway: Send + Sync {
    /// Returns WAV bytes for `request.input` spoken with `request.voice`.
    async fn speak(&self, request: &SpeechRequest) -> Result<Bytes, GatewayError>;
}

// For the request payload
#[derive(Serialize)]
struct SpeechBody<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'a str,
    speed: f32,
}

/// Speaks to an OpenAI-style `/audio/speech` endpoint.
pub struct HttpTtsGateway {
    client: Client,
    url: String,
    api_key: Option<String>,
    model: String,
}

impl HttpTtsGateway {
    pub fn new(app_config: &AppConfig) -> Result<Self, anyhow::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(app_config.tts_timeout_secs))
            .build()?;

        Ok(HttpTtsGateway {
            client,
            url: app_config.tts_api_url.clone(),
            api_key: app_config.tts_api_key.clone(),
            model: app_config.tts_model.clone(),
        })
    }

    fn body<'a>(&'a self, request: &'a SpeechRequest) -> SpeechBody<'a> {
        SpeechBody {
            model: &self.model,
            voice: &request.voice,
            input: &request.input,
            response_format: "wav",
            speed: request.speed,
        }
    }
}

#[async_trait]
impl TtsGateway for HttpTtsGateway {
    async fn speak(&self, request: &SpeechRequest) -> Result<Bytes, GatewayError> {
        info!(
            "Synthesizing {} chars with voice {}",
            request.input.chars().count(),
            request.voice
        );

        let mut builder = self.client.post(&self.url).json(&self.body(request));
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(|e| {
            error!("TTS request error: {}", e);
            GatewayError::Failed(format!("TTS service unreachable: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            // Attempt to read the response body for error details
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read response body".to_string());
            error!("Error response from TTS service ({}): {}", status, error_body);
            return Err(GatewayError::Failed(format!(
                "TTS service returned {}",
                status
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| GatewayError::Failed(format!("Failed to read TTS audio: {}", e)))?;

        if audio.is_empty() {
            return Err(GatewayError::Failed("TTS service returned no audio".to_string()));
        }

        Ok(audio)
    }
}
