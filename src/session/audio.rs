use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;

use super::SessionError;

const WAV_DATA_URL_PREFIX: &str = "data:audio/wav;base64,";

/// Sink for synthesized speech. Implementations start playback without
/// blocking; the session makes sure only one clip is active.
pub trait AudioOutput: Send + Sync {
    fn start(&self, audio: Bytes) -> Result<(), SessionError>;
    fn stop(&self);
}

pub fn to_data_url(audio: &[u8]) -> String {
    format!("{}{}", WAV_DATA_URL_PREFIX, STANDARD.encode(audio))
}

pub fn from_data_url(url: &str) -> Result<Bytes, SessionError> {
    let encoded = url
        .strip_prefix(WAV_DATA_URL_PREFIX)
        .ok_or_else(|| SessionError::Audio("voice url is not an inline WAV".into()))?;

    let audio = STANDARD
        .decode(encoded)
        .map_err(|e| SessionError::Audio(format!("voice url is not valid base64: {}", e)))?;

    Ok(Bytes::from(audio))
}
