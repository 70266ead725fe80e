use actix_web::get;
use utoipa::OpenApi;

use crate::models::{Category, Character, Conversation, ConversationSummary, Message, Role};
use crate::types::{
    CharacterDetail, CharacterInput, ChatReply, ChatRequest, SaveConversationRequest,
    VoiceOfflineResponse, VoiceRequest,
};

pub mod admin;
pub mod characters;
pub mod conversations;
pub mod model;
pub mod voice;

#[derive(OpenApi)]
#[openapi(components(schemas(
    ChatRequest,
    ChatReply,
    VoiceRequest,
    VoiceOfflineResponse,
    SaveConversationRequest,
    Conversation,
    ConversationSummary,
    Message,
    Role,
    Character,
    Category,
    CharacterInput,
    CharacterDetail,
)))]
pub struct ApiDoc;

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}
