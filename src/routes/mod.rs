use std::collections::HashMap;

use mongodb::bson::{doc, oid::ObjectId};
use rocket::futures::TryStreamExt;

use crate::db::DbConn;
use crate::models::{User, UserRef};
use crate::utils::ApiError;

pub mod auth;
pub mod bid;
pub mod chat;
pub mod events;
pub mod gig;
pub mod message;
pub mod notification;
pub mod payment;
pub mod profile;
pub mod review;

/// Resolve a single user reference to the fields responses embed.
/// References are resolved explicitly before returning to the caller,
/// there is no automatic document population.
pub(crate) async fn user_ref(db: &DbConn, user_id: &ObjectId) -> Result<UserRef, ApiError> {
    let user = db
        .collection::<User>("users")
        .find_one(doc! { "_id": user_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(UserRef {
        id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
        name: user.name,
    })
}

/// Batch variant for list endpoints: one `$in` query instead of a lookup
/// per row. Unknown ids are simply absent from the map.
pub(crate) async fn user_ref_map(
    db: &DbConn,
    ids: &[ObjectId],
) -> Result<HashMap<ObjectId, UserRef>, ApiError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let users: Vec<User> = db
        .collection::<User>("users")
        .find(doc! { "_id": { "$in": ids } }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .try_collect()
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(users
        .into_iter()
        .filter_map(|user| {
            user.id.map(|id| {
                (
                    id,
                    UserRef {
                        id: id.to_hex(),
                        name: user.name,
                    },
                )
            })
        })
        .collect())
}

pub(crate) fn parse_object_id(raw: &str, what: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(raw).map_err(|_| ApiError::bad_request(format!("Invalid {} ID", what)))
}
