use mongodb::bson::doc;
use mongodb::options::FindOptions;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::{Notification, NotificationResponse};
use crate::routes::parse_object_id;
use crate::utils::{ApiError, ApiResponse};

#[openapi(tag = "Notification")]
#[get("/notifications")]
pub async fn get_notifications(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let find_options = FindOptions::builder()
        .sort(doc! { "created_at": -1 })
        .build();

    let mut cursor = db
        .collection::<Notification>("notifications")
        .find(doc! { "user": auth.user_id }, find_options)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?;

    let mut notifications = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| ApiError::internal_error(format!("Cursor error: {}", e)))?
    {
        let notification: Notification = cursor
            .deserialize_current()
            .map_err(|e| ApiError::internal_error(format!("Deserialization error: {}", e)))?;
        notifications.push(NotificationResponse::from(notification));
    }

    Ok(Json(ApiResponse::success(serde_json::json!(notifications))))
}

#[openapi(tag = "Notification")]
#[put("/notifications/<notification_id>/read")]
pub async fn mark_as_read(
    db: &State<DbConn>,
    auth: AuthGuard,
    notification_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let notification_id = parse_object_id(&notification_id, "notification")?;

    let notifications = db.collection::<Notification>("notifications");
    let notification = notifications
        .find_one(doc! { "_id": notification_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("Notification not found"))?;

    if notification.user != auth.user_id {
        return Err(ApiError::forbidden("Not authorized"));
    }

    notifications
        .update_one(
            doc! { "_id": notification_id },
            doc! { "$set": { "read": true } },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    let mut notification = notification;
    notification.read = true;

    Ok(Json(ApiResponse::success(serde_json::json!(
        NotificationResponse::from(notification)
    ))))
}

#[openapi(tag = "Notification")]
#[get("/notifications/unread")]
pub async fn get_unread_count(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let count = db
        .collection::<Notification>("notifications")
        .count_documents(doc! { "user": auth.user_id, "read": false }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Count error: {}", e)))?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "count": count
    }))))
}
