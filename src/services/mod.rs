mod chat;
mod voice;

pub use chat::ChatOrchestrator;
pub use voice::{sanitize, SpokenReply, VoiceOrchestrator, SPEECH_SPEED};
