use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Message;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveConversationRequest {
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
    pub character_id: Uuid,
    #[serde(default)]
    pub title: Option<String>,
    pub messages: Vec<Message>,
}
