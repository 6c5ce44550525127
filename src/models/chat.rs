use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;

/// One entry in a chat's embedded, append-only transcript. Entries are
/// never edited or removed once pushed.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatMessage {
    pub sender: ObjectId,
    pub text: String,
    pub sent_at: DateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Chat {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub participants: Vec<ObjectId>,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Chat {
    pub fn is_participant(&self, user_id: &ObjectId) -> bool {
        self.participants.contains(user_id)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AccessChatDto {
    /// The other participant.
    pub user_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ChatMessageDto {
    pub text: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ChatMessageResponse {
    pub sender: String,
    pub text: String,
    pub sent_at: String,
}

impl From<ChatMessage> for ChatMessageResponse {
    fn from(message: ChatMessage) -> Self {
        ChatMessageResponse {
            sender: message.sender.to_hex(),
            text: message.text,
            sent_at: message.sent_at.try_to_rfc3339_string().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ChatResponse {
    pub id: String,
    pub participants: Vec<crate::models::UserRef>,
    pub messages: Vec<ChatMessageResponse>,
    pub updated_at: String,
}

impl ChatResponse {
    pub fn from_chat(chat: Chat, participants: Vec<crate::models::UserRef>) -> Self {
        ChatResponse {
            id: chat.id.map(|id| id.to_hex()).unwrap_or_default(),
            participants,
            messages: chat.messages.into_iter().map(Into::into).collect(),
            updated_at: chat.updated_at.try_to_rfc3339_string().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_participant() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        let chat = Chat {
            id: Some(ObjectId::new()),
            participants: vec![a, b],
            messages: vec![],
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
        };
        assert!(chat.is_participant(&a));
        assert!(chat.is_participant(&b));
        assert!(!chat.is_participant(&ObjectId::new()));
    }
}
