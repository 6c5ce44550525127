use mongodb::bson::{doc, oid::ObjectId, DateTime};
use mongodb::options::FindOptions;
use rocket::futures::TryStreamExt;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::{
    AccessChatDto, Chat, ChatMessage, ChatMessageDto, ChatMessageResponse, ChatResponse,
};
use crate::routes::{parse_object_id, user_ref_map};
use crate::services::{EventHub, RealtimeEvent};
use crate::utils::{ApiError, ApiResponse};

async fn load_chat(db: &DbConn, chat_id: &ObjectId) -> Result<Chat, ApiError> {
    db.collection::<Chat>("chats")
        .find_one(doc! { "_id": chat_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("Chat not found"))
}

async fn chat_response(db: &DbConn, chat: Chat) -> Result<ChatResponse, ApiError> {
    let participants = user_ref_map(db, &chat.participants).await?;
    let refs = chat
        .participants
        .iter()
        .map(|id| {
            participants
                .get(id)
                .cloned()
                .unwrap_or_else(|| crate::models::UserRef {
                    id: id.to_hex(),
                    name: String::new(),
                })
        })
        .collect();
    Ok(ChatResponse::from_chat(chat, refs))
}

/// Get or create the 1:1 conversation with another user.
#[openapi(tag = "Chat")]
#[post("/chats", data = "<dto>")]
pub async fn access_chat(
    db: &State<DbConn>,
    auth: AuthGuard,
    dto: Json<AccessChatDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let other_id = parse_object_id(&dto.user_id, "user")?;

    let chats = db.collection::<Chat>("chats");

    let existing = chats
        .find_one(
            doc! { "participants": { "$all": [auth.user_id, other_id] } },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    if let Some(chat) = existing {
        let response = chat_response(db, chat).await?;
        return Ok(Json(ApiResponse::success(serde_json::json!(response))));
    }

    let chat = Chat {
        id: None,
        participants: vec![auth.user_id, other_id],
        messages: vec![],
        created_at: DateTime::now(),
        updated_at: DateTime::now(),
    };

    let res = chats
        .insert_one(&chat, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to create chat: {}", e)))?;

    let mut chat = chat;
    chat.id = res.inserted_id.as_object_id();

    let response = chat_response(db, chat).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Chat created".to_string(),
        serde_json::json!(response),
    )))
}

#[openapi(tag = "Chat")]
#[get("/chats")]
pub async fn get_user_chats(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let find_options = FindOptions::builder().sort(doc! { "updated_at": -1 }).build();

    let chats: Vec<Chat> = db
        .collection::<Chat>("chats")
        .find(doc! { "participants": auth.user_id }, find_options)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .try_collect()
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    let mut responses = Vec::new();
    for chat in chats {
        responses.push(chat_response(db, chat).await?);
    }

    Ok(Json(ApiResponse::success(serde_json::json!(responses))))
}

/// Append to the transcript and broadcast to the other participants
/// currently subscribed to this conversation.
#[openapi(tag = "Chat")]
#[post("/chats/<chat_id>/message", data = "<dto>")]
pub async fn send_chat_message(
    db: &State<DbConn>,
    hub: &State<EventHub>,
    auth: AuthGuard,
    chat_id: String,
    dto: Json<ChatMessageDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if dto.text.trim().is_empty() {
        return Err(ApiError::bad_request("Message content cannot be empty"));
    }

    let chat_id = parse_object_id(&chat_id, "chat")?;
    let chat = load_chat(db, &chat_id).await?;

    if !chat.is_participant(&auth.user_id) {
        return Err(ApiError::forbidden("You are not part of this chat"));
    }

    let message = ChatMessage {
        sender: auth.user_id,
        text: dto.text.trim().to_string(),
        sent_at: DateTime::now(),
    };

    db.collection::<Chat>("chats")
        .update_one(
            doc! { "_id": chat_id },
            doc! {
                "$push": {
                    "messages": mongodb::bson::to_bson(&message)
                        .map_err(|e| ApiError::internal_error(e.to_string()))?
                },
                "$set": { "updated_at": DateTime::now() }
            },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to send message: {}", e)))?;

    let response = ChatMessageResponse::from(message);

    // Everyone else in the conversation gets the live event; the sender's
    // own subscription filters it out.
    hub.publish(
        &EventHub::chat_topic(&chat_id),
        RealtimeEvent::from_sender("message received", auth.user_id, serde_json::json!(response)),
    );

    Ok(Json(ApiResponse::success(serde_json::json!(response))))
}

#[openapi(tag = "Chat")]
#[get("/chats/<chat_id>/messages")]
pub async fn get_chat_messages(
    db: &State<DbConn>,
    auth: AuthGuard,
    chat_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let chat_id = parse_object_id(&chat_id, "chat")?;
    let chat = load_chat(db, &chat_id).await?;

    if !chat.is_participant(&auth.user_id) {
        return Err(ApiError::forbidden("You are not part of this chat"));
    }

    let messages: Vec<ChatMessageResponse> =
        chat.messages.into_iter().map(Into::into).collect();

    Ok(Json(ApiResponse::success(serde_json::json!(messages))))
}
