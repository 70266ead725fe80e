use anyhow::{anyhow, Context};
use shuttle_runtime::SecretStore;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub admin_jwt_secret: String,
    pub llm_api_key: String,
    pub llm_api_base: String,
    pub llm_model: String,
    pub llm_max_tokens: u32,
    pub tts_api_url: String,
    pub tts_api_key: Option<String>,
    pub tts_model: String,
    pub tts_timeout_secs: u64,
    pub cors_origin: Option<String>,
}

impl AppConfig {
    pub const DEFAULT_LLM_API_BASE: &'static str = "https://api.openai.com/v1";
    pub const DEFAULT_LLM_MODEL: &'static str = "gpt-4o-mini";
    pub const DEFAULT_TTS_MODEL: &'static str = "kokoro";

    pub fn new(secret_store: &SecretStore) -> Result<Self, anyhow::Error> {
        Self::from_lookup(|key| secret_store.get(key))
    }

    /// Builds the config from any key lookup, so the same parsing runs against
    /// Shuttle secrets in production and a plain map in tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| lookup(key).ok_or_else(|| anyhow!("{} not found", key));

        let database_url = require("DATABASE_URL")?;
        let jwt_secret = require("JWT_SECRET")?;
        let admin_jwt_secret = require("ADMIN_JWT_SECRET")?;
        if jwt_secret == admin_jwt_secret {
            return Err(anyhow!("JWT_SECRET and ADMIN_JWT_SECRET must differ"));
        }

        let llm_api_key = require("LLM_API_KEY")?;
        let tts_api_url = require("TTS_API_URL")?;

        let llm_max_tokens = match lookup("LLM_MAX_TOKENS") {
            Some(value) => value
                .parse::<u32>()
                .with_context(|| format!("LLM_MAX_TOKENS is not a number: {}", value))?,
            None => 512,
        };

        let tts_timeout_secs = match lookup("TTS_TIMEOUT_SECS") {
            Some(value) => value
                .parse::<u64>()
                .with_context(|| format!("TTS_TIMEOUT_SECS is not a number: {}", value))?,
            None => 60,
        };

        Ok(AppConfig {
            database_url,
            jwt_secret,
            admin_jwt_secret,
            llm_api_key,
            llm_api_base: lookup("LLM_API_BASE")
                .unwrap_or_else(|| Self::DEFAULT_LLM_API_BASE.to_string()),
            llm_model: lookup("LLM_MODEL").unwrap_or_else(|| Self::DEFAULT_LLM_MODEL.to_string()),
            llm_max_tokens,
            tts_api_url,
            tts_api_key: lookup("TTS_API_KEY").filter(|key| !key.is_empty()),
            tts_model: lookup("TTS_MODEL").unwrap_or_else(|| Self::DEFAULT_TTS_MODEL.to_string()),
            tts_timeout_secs,
            cors_origin: lookup("CORS_ORIGIN").filter(|origin| !origin.is_empty()),
        })
    }
}
