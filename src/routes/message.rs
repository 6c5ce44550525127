use mongodb::bson::{doc, oid::ObjectId, DateTime};
use mongodb::options::FindOptions;
use rocket::futures::TryStreamExt;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::{Bid, BidStatus, Gig, GigStatus, Message, MessageResponse, SendMessageDto};
use crate::routes::{parse_object_id, user_ref, user_ref_map};
use crate::services::{EventHub, NotificationService, RealtimeEvent};
use crate::utils::{ApiError, ApiResponse};

/// Once a gig is in-progress its conversation narrows to the owner and
/// the accepted freelancer; while it is open anyone may enquire.
async fn require_conversation_access(
    db: &DbConn,
    gig: &Gig,
    user_id: &ObjectId,
) -> Result<(), ApiError> {
    if gig.status != GigStatus::InProgress {
        return Ok(());
    }

    let accepted = db
        .collection::<Bid>("bids")
        .find_one(
            doc! { "gig": gig.id, "status": BidStatus::Accepted },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("No accepted applicant found for this gig."))?;

    let is_gig_owner = &gig.user == user_id;
    let is_accepted_freelancer = &accepted.user == user_id;

    if !is_gig_owner && !is_accepted_freelancer {
        return Err(ApiError::forbidden(
            "You are not authorized to view this chat.",
        ));
    }
    Ok(())
}

#[openapi(tag = "Message")]
#[get("/messages/<gig_id>")]
pub async fn get_messages(
    db: &State<DbConn>,
    auth: AuthGuard,
    gig_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let gig_id = parse_object_id(&gig_id, "gig")?;

    let gig = db
        .collection::<Gig>("gigs")
        .find_one(doc! { "_id": gig_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("Gig not found"))?;

    require_conversation_access(db, &gig, &auth.user_id).await?;

    let find_options = FindOptions::builder().sort(doc! { "created_at": 1 }).build();

    let messages: Vec<Message> = db
        .collection::<Message>("messages")
        .find(doc! { "gig": gig_id }, find_options)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .try_collect()
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    let mut user_ids: Vec<ObjectId> = Vec::new();
    for message in &messages {
        user_ids.push(message.sender);
        user_ids.push(message.receiver);
    }
    let users = user_ref_map(db, &user_ids).await?;

    let fallback = |id: ObjectId| crate::models::UserRef {
        id: id.to_hex(),
        name: String::new(),
    };

    let responses: Vec<MessageResponse> = messages
        .into_iter()
        .map(|message| {
            let sender = users
                .get(&message.sender)
                .cloned()
                .unwrap_or_else(|| fallback(message.sender));
            let receiver = users
                .get(&message.receiver)
                .cloned()
                .unwrap_or_else(|| fallback(message.receiver));
            MessageResponse::from_message(message, sender, receiver)
        })
        .collect();

    Ok(Json(ApiResponse::success(serde_json::json!(responses))))
}

#[openapi(tag = "Message")]
#[post("/messages", data = "<dto>")]
pub async fn send_message(
    db: &State<DbConn>,
    hub: &State<EventHub>,
    auth: AuthGuard,
    dto: Json<SendMessageDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if dto.content.trim().is_empty() {
        return Err(ApiError::bad_request("Receiver, Gig, and Content are required."));
    }

    let receiver_id = parse_object_id(&dto.receiver_id, "receiver")?;
    let gig_id = parse_object_id(&dto.gig_id, "gig")?;

    let gig = db
        .collection::<Gig>("gigs")
        .find_one(doc! { "_id": gig_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("Gig not found"))?;

    require_conversation_access(db, &gig, &auth.user_id).await?;
    if gig.status == GigStatus::InProgress {
        // The receiver must be part of the narrowed conversation too.
        let accepted = db
            .collection::<Bid>("bids")
            .find_one(doc! { "gig": gig_id, "status": BidStatus::Accepted }, None)
            .await
            .map_err(|e| ApiError::internal_error(e.to_string()))?;
        let authorized_receiver = receiver_id == gig.user
            || accepted.map(|bid| bid.user == receiver_id).unwrap_or(false);
        if !authorized_receiver {
            return Err(ApiError::forbidden(
                "You are not authorized to send messages for this gig.",
            ));
        }
    }

    let message = Message {
        id: None,
        sender: auth.user_id,
        receiver: receiver_id,
        gig: gig_id,
        content: dto.content.trim().to_string(),
        read: false,
        created_at: DateTime::now(),
    };

    let res = db
        .collection::<Message>("messages")
        .insert_one(&message, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to send message: {}", e)))?;

    let mut message = message;
    message.id = res.inserted_id.as_object_id();

    let sender = user_ref(db, &auth.user_id).await?;
    let receiver = user_ref(db, &receiver_id).await?;
    let response = MessageResponse::from_message(message, sender, receiver);

    // Live push to the gig room; the sender's own stream drops the echo.
    hub.publish(
        &EventHub::gig_topic(&gig_id),
        RealtimeEvent::from_sender("receive_message", auth.user_id, serde_json::json!(response)),
    );

    if auth.user_id != receiver_id {
        NotificationService::send(
            db,
            hub,
            receiver_id,
            format!(
                "New message from {} on gig \"{}\"",
                response.sender.name, gig.title
            ),
            Some(format!("/gigs/{}", gig_id.to_hex())),
        )
        .await?;
    }

    Ok(Json(ApiResponse::success(serde_json::json!(response))))
}
