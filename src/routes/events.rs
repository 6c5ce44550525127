use mongodb::bson::oid::ObjectId;
use rocket::response::stream::{Event, EventStream};
use rocket::serde::json::Json;
use rocket::tokio::select;
use rocket::tokio::sync::broadcast::error::RecvError;
use rocket::tokio::time::{interval, Duration};
use rocket::{Shutdown, State};

use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::Chat;
use crate::routes::parse_object_id;
use crate::services::presence::PRESENCE_TTL_SECS;
use crate::services::realtime::PRESENCE_TOPIC;
use crate::services::{EventHub, PresenceStore, RealtimeEvent};
use crate::utils::{ApiError, ApiResponse};

/// Announces offline when the subscriber's stream is dropped, whether by
/// client disconnect or server shutdown. Best effort only; the redis TTL
/// covers the cases where this never runs.
struct PresenceSession {
    user_id: ObjectId,
    presence: PresenceStore,
    hub: EventHub,
}

impl Drop for PresenceSession {
    fn drop(&mut self) {
        let user_id = self.user_id;
        let presence = self.presence.clone();
        let hub = self.hub.clone();
        rocket::tokio::spawn(async move {
            if let Err(e) = presence.mark_offline(&user_id).await {
                log::warn!("presence cleanup failed for {}: {}", user_id.to_hex(), e);
            }
            hub.publish(
                PRESENCE_TOPIC,
                RealtimeEvent::new(
                    "update_user_status",
                    serde_json::json!({ "userId": user_id.to_hex(), "status": "offline" }),
                ),
            );
        });
    }
}

/// The per-user stream. Delivers `newNotification` events and doubles as
/// the presence heartbeat: connecting announces online, the TTL is
/// refreshed while the stream lives, disconnecting announces offline.
#[get("/events/notifications")]
pub async fn notification_stream(
    hub: &State<EventHub>,
    presence: &State<PresenceStore>,
    auth: AuthGuard,
    mut end: Shutdown,
) -> EventStream![] {
    let hub = hub.inner().clone();
    let presence = presence.inner().clone();
    let user_id = auth.user_id;
    let mut rx = hub.subscribe(&EventHub::user_topic(&user_id));

    EventStream! {
        if let Err(e) = presence.mark_online(&user_id).await {
            log::warn!("failed to mark {} online: {}", user_id.to_hex(), e);
        }
        hub.publish(
            PRESENCE_TOPIC,
            RealtimeEvent::new(
                "update_user_status",
                serde_json::json!({ "userId": user_id.to_hex(), "status": "online" }),
            ),
        );

        let _session = PresenceSession {
            user_id,
            presence: presence.clone(),
            hub: hub.clone(),
        };

        let mut heartbeat = interval(Duration::from_secs(PRESENCE_TTL_SECS as u64 / 2));
        heartbeat.tick().await; // first tick fires immediately

        loop {
            let event = select! {
                msg = rx.recv() => match msg {
                    Ok(event) => event,
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(_)) => continue,
                },
                _ = heartbeat.tick() => {
                    if let Err(e) = presence.refresh(&user_id).await {
                        log::warn!("presence refresh failed for {}: {}", user_id.to_hex(), e);
                    }
                    continue;
                },
                _ = &mut end => break,
            };
            yield Event::json(&event.payload).event(event.name);
        }
    }
}

/// Gig-room stream, the rendezvous for negotiation messages. Subscribing
/// is the "join room" step; the sender's own messages are filtered out so
/// they don't echo back.
#[get("/events/gigs/<gig_id>")]
pub async fn gig_stream(
    hub: &State<EventHub>,
    auth: AuthGuard,
    gig_id: String,
    mut end: Shutdown,
) -> Result<EventStream![], ApiError> {
    let gig_id = parse_object_id(&gig_id, "gig")?;
    let user_id = auth.user_id;
    let mut rx = hub.subscribe(&EventHub::gig_topic(&gig_id));

    Ok(EventStream! {
        loop {
            let event = select! {
                msg = rx.recv() => match msg {
                    Ok(event) => event,
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(_)) => continue,
                },
                _ = &mut end => break,
            };
            if event.sender == Some(user_id) {
                continue;
            }
            yield Event::json(&event.payload).event(event.name);
        }
    })
}

/// Conversation stream. Participants only.
#[get("/events/chats/<chat_id>")]
pub async fn chat_stream(
    db: &State<DbConn>,
    hub: &State<EventHub>,
    auth: AuthGuard,
    chat_id: String,
    mut end: Shutdown,
) -> Result<EventStream![], ApiError> {
    let chat_id = parse_object_id(&chat_id, "chat")?;

    let chat = db
        .collection::<Chat>("chats")
        .find_one(mongodb::bson::doc! { "_id": chat_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("Chat not found"))?;

    if !chat.is_participant(&auth.user_id) {
        return Err(ApiError::forbidden("You are not part of this chat"));
    }

    let user_id = auth.user_id;
    let mut rx = hub.subscribe(&EventHub::chat_topic(&chat_id));

    Ok(EventStream! {
        loop {
            let event = select! {
                msg = rx.recv() => match msg {
                    Ok(event) => event,
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(_)) => continue,
                },
                _ = &mut end => break,
            };
            if event.sender == Some(user_id) {
                continue;
            }
            yield Event::json(&event.payload).event(event.name);
        }
    })
}

/// Global best-effort presence feed (`update_user_status` events).
#[get("/events/presence")]
pub async fn presence_stream(hub: &State<EventHub>, mut end: Shutdown) -> EventStream![] {
    let mut rx = hub.subscribe(PRESENCE_TOPIC);

    EventStream! {
        loop {
            let event = select! {
                msg = rx.recv() => match msg {
                    Ok(event) => event,
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(_)) => continue,
                },
                _ = &mut end => break,
            };
            yield Event::json(&event.payload).event(event.name);
        }
    }
}

/// Point-in-time presence check backed by the TTL key.
#[get("/presence/<user_id>")]
pub async fn get_presence(
    presence: &State<PresenceStore>,
    user_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let user_id = parse_object_id(&user_id, "user")?;

    let online = presence
        .is_online(&user_id)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "userId": user_id.to_hex(),
        "status": if online { "online" } else { "offline" }
    }))))
}
