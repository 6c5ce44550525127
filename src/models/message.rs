use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;

/// Gig-scoped negotiation message between the owner and a bidder.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Message {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub sender: ObjectId,
    pub receiver: ObjectId,
    pub gig: ObjectId,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SendMessageDto {
    pub receiver_id: String,
    pub gig_id: String,
    pub content: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct MessageResponse {
    pub id: String,
    pub sender: crate::models::UserRef,
    pub receiver: crate::models::UserRef,
    pub gig: String,
    pub content: String,
    pub read: bool,
    pub created_at: String,
}

impl MessageResponse {
    pub fn from_message(
        message: Message,
        sender: crate::models::UserRef,
        receiver: crate::models::UserRef,
    ) -> Self {
        MessageResponse {
            id: message.id.map(|id| id.to_hex()).unwrap_or_default(),
            sender,
            receiver,
            gig: message.gig.to_hex(),
            content: message.content,
            read: message.read,
            created_at: message.created_at.try_to_rfc3339_string().unwrap_or_default(),
        }
    }
}
