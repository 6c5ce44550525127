use mongodb::bson::{oid::ObjectId, DateTime};

use crate::db::DbConn;
use crate::models::{Notification, NotificationResponse};
use crate::services::realtime::{EventHub, RealtimeEvent};
use crate::utils::ApiError;

pub struct NotificationService;

impl NotificationService {
    /// Durable record first, live push second. The push is best-effort;
    /// a recipient with no open session reads the record later.
    pub async fn send(
        db: &DbConn,
        hub: &EventHub,
        user: ObjectId,
        message: String,
        link: Option<String>,
    ) -> Result<(), ApiError> {
        let notification = Notification {
            id: None,
            user,
            message,
            link,
            read: false,
            created_at: DateTime::now(),
        };

        let res = db
            .collection::<Notification>("notifications")
            .insert_one(&notification, None)
            .await
            .map_err(|e| ApiError::internal_error(format!("Failed to create notification: {}", e)))?;

        let mut saved = notification;
        saved.id = res.inserted_id.as_object_id();

        hub.publish(
            &EventHub::user_topic(&user),
            RealtimeEvent::new(
                "newNotification",
                serde_json::json!(NotificationResponse::from(saved)),
            ),
        );

        Ok(())
    }
}
