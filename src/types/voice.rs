use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Body for both `/voice/speak` and `/voice/chat`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoiceRequest {
    pub text: String,
    pub character_id: Uuid,
}

/// What `/voice/chat` answers with when the reply exists but audio doesn't.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoiceOfflineResponse {
    pub text: String,
    pub voice_offline: bool,
}
