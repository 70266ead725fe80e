use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::ChatOrchestrator;
use crate::error::AppError;
use crate::gateway::{SpeechRequest, TtsGateway};
use crate::models::Character;
use crate::store::CharacterStore;

/// Slightly slower than the engine default; reads more naturally.
pub const SPEECH_SPEED: f32 = 0.9;

lazy_static! {
    static ref MARKDOWN_PUNCTUATION: Regex = Regex::new(r"[*_~`#>|\[\]]").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Strips formatting artifacts the speech engine would otherwise read out or
/// stumble over. Applying it twice gives the same result as applying it once.
pub fn sanitize(text: &str) -> String {
    let stripped = MARKDOWN_PUNCTUATION.replace_all(text, "");
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

/// Outcome of reply-and-speak. `Partial` means the reply was generated but
/// audio could not be produced for it.
#[derive(Debug, Clone, PartialEq)]
pub enum SpokenReply {
    Full { reply: String, audio: Bytes },
    Partial { reply: String },
}

impl SpokenReply {
    pub fn reply(&self) -> &str {
        match self {
            SpokenReply::Full { reply, .. } | SpokenReply::Partial { reply } => reply,
        }
    }

    pub fn audio_available(&self) -> bool {
        matches!(self, SpokenReply::Full { .. })
    }
}

#[derive(Clone)]
pub struct VoiceOrchestrator {
    characters: Arc<dyn CharacterStore>,
    tts: Arc<dyn TtsGateway>,
    chat: ChatOrchestrator,
}

impl VoiceOrchestrator {
    pub fn new(
        characters: Arc<dyn CharacterStore>,
        tts: Arc<dyn TtsGateway>,
        chat: ChatOrchestrator,
    ) -> Self {
        VoiceOrchestrator {
            characters,
            tts,
            chat,
        }
    }

    /// Speaks `text` in the character's voice. Premium voices need an active
    /// subscription. TTS failures are returned, not swallowed.
    pub async fn synthesize(
        &self,
        user_id: &str,
        character_id: Uuid,
        text: &str,
    ) -> Result<Bytes, AppError> {
        let character = self.characters.require(character_id).await?;
        self.chat.authorize(user_id, &character).await?;
        self.speak(&character, text).await
    }

    async fn speak(&self, character: &Character, text: &str) -> Result<Bytes, AppError> {
        let input = sanitize(text);
        if input.is_empty() {
            return Err(AppError::validation("text is required"));
        }

        let audio = self
            .tts
            .speak(&SpeechRequest {
                voice: character.voice_id.clone(),
                input,
                speed: SPEECH_SPEED,
            })
            .await?;

        Ok(audio)
    }

    /// Generates the character's reply, then tries to speak it. Chat errors
    /// fail the call; speech errors only downgrade it to `Partial`.
    pub async fn reply_and_synthesize(
        &self,
        user_id: &str,
        character_id: Uuid,
        text: &str,
    ) -> Result<SpokenReply, AppError> {
        let reply = self.chat.reply(user_id, character_id, text).await?;

        // `reply` already passed the premium check.
        let spoken = match self.characters.require(character_id).await {
            Ok(character) => self.speak(&character, &reply).await,
            Err(e) => Err(e),
        };

        match spoken {
            Ok(audio) => {
                info!("Voice reply ready for character {}", character_id);
                Ok(SpokenReply::Full { reply, audio })
            }
            Err(e) => {
                warn!(
                    "Voice offline for character {}, returning text only: {}",
                    character_id, e
                );
                Ok(SpokenReply::Partial { reply })
            }
        }
    }
}
