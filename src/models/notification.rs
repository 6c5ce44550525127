use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Notification {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user: ObjectId,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub read: bool,
    pub created_at: DateTime,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct NotificationResponse {
    pub id: String,
    pub message: String,
    pub link: Option<String>,
    pub read: bool,
    pub created_at: String,
}

impl From<Notification> for NotificationResponse {
    fn from(notification: Notification) -> Self {
        NotificationResponse {
            id: notification.id.map(|id| id.to_hex()).unwrap_or_default(),
            message: notification.message,
            link: notification.link,
            read: notification.read,
            created_at: notification
                .created_at
                .try_to_rfc3339_string()
                .unwrap_or_default(),
        }
    }
}
