use mongodb::bson::{doc, oid::ObjectId, DateTime};
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::{
    AcceptedBidResponse, Bid, CreateGigDto, GeoPoint, Gig, GigDetailResponse, GigPaymentStatus,
    GigResponse, GigStatus, LocationSearchQuery, UpdateGigDto, UserRef, UserRole, VerifyPaymentDto,
};
use crate::routes::{parse_object_id, user_ref, user_ref_map};
use crate::services::{EventHub, NotificationService, PaymentService};
use crate::utils::{validate_coordinates, ApiError, ApiResponse};

/// Mean Earth radius, used to turn a kilometer radius into radians for
/// `$centerSphere`.
const EARTH_RADIUS_KM: f64 = 6371.0;

fn km_to_radians(km: f64) -> f64 {
    km / EARTH_RADIUS_KM
}

async fn load_gig(db: &DbConn, gig_id: &ObjectId) -> Result<Gig, ApiError> {
    db.collection::<Gig>("gigs")
        .find_one(doc! { "_id": gig_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("Gig not found"))
}

/// Finish and cancellation edges authorize against the freelancer whose
/// bid the owner accepted, so the bid has to be fetched first.
async fn load_accepted_bid(db: &DbConn, gig: &Gig) -> Result<Bid, ApiError> {
    let bid_id = gig
        .accepted_bid
        .ok_or_else(|| ApiError::bad_request("No freelancer assigned to this gig."))?;

    db.collection::<Bid>("bids")
        .find_one(doc! { "_id": bid_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("Accepted bid not found"))
}

async fn gigs_with_owners(db: &DbConn, gigs: Vec<Gig>) -> Result<Vec<GigResponse>, ApiError> {
    let owner_ids: Vec<ObjectId> = gigs.iter().map(|gig| gig.user).collect();
    let owners = user_ref_map(db, &owner_ids).await?;

    Ok(gigs
        .into_iter()
        .map(|gig| {
            let owner = owners
                .get(&gig.user)
                .cloned()
                .unwrap_or_else(|| UserRef {
                    id: gig.user.to_hex(),
                    name: String::new(),
                });
            GigResponse::from_gig(gig, owner)
        })
        .collect())
}

// ============================================================================
// READS
// ============================================================================

#[openapi(tag = "Gig")]
#[get("/gigs?<keyword>")]
pub async fn get_gigs(
    db: &State<DbConn>,
    keyword: Option<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let mut filter = doc! { "status": GigStatus::Open };

    if let Some(keyword) = keyword {
        filter.insert("title", doc! { "$regex": keyword, "$options": "i" });
    }

    let mut cursor = db
        .collection::<Gig>("gigs")
        .find(filter, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?;

    let mut gigs = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| ApiError::internal_error(format!("Cursor error: {}", e)))?
    {
        let gig = cursor
            .deserialize_current()
            .map_err(|e| ApiError::internal_error(format!("Deserialization error: {}", e)))?;
        gigs.push(gig);
    }

    let gigs = gigs_with_owners(db, gigs).await?;

    Ok(Json(ApiResponse::success(serde_json::json!(gigs))))
}

#[openapi(tag = "Gig")]
#[get("/gigs/my")]
pub async fn get_my_gigs(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let mut cursor = db
        .collection::<Gig>("gigs")
        .find(doc! { "user": auth.user_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?;

    let mut gigs = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| ApiError::internal_error(format!("Cursor error: {}", e)))?
    {
        let gig = cursor
            .deserialize_current()
            .map_err(|e| ApiError::internal_error(format!("Deserialization error: {}", e)))?;
        gigs.push(gig);
    }

    let gigs = gigs_with_owners(db, gigs).await?;

    Ok(Json(ApiResponse::success(serde_json::json!(gigs))))
}

#[openapi(tag = "Gig")]
#[get("/gigs/search/location?<query..>")]
pub async fn search_gigs_by_location(
    db: &State<DbConn>,
    query: LocationSearchQuery,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if !validate_coordinates(query.lat, query.lon) {
        return Err(ApiError::bad_request("Invalid coordinates"));
    }
    if query.radius <= 0.0 {
        return Err(ApiError::bad_request("Radius must be positive"));
    }

    let filter = doc! {
        "location": {
            "$geoWithin": {
                "$centerSphere": [
                    [query.lon, query.lat],
                    km_to_radians(query.radius)
                ]
            }
        }
    };

    let mut cursor = db
        .collection::<Gig>("gigs")
        .find(filter, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?;

    let mut gigs = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| ApiError::internal_error(format!("Cursor error: {}", e)))?
    {
        let gig = cursor
            .deserialize_current()
            .map_err(|e| ApiError::internal_error(format!("Deserialization error: {}", e)))?;
        gigs.push(gig);
    }

    let gigs = gigs_with_owners(db, gigs).await?;

    Ok(Json(ApiResponse::success(serde_json::json!(gigs))))
}

#[openapi(tag = "Gig")]
#[get("/gigs/<gig_id>")]
pub async fn get_gig_by_id(
    db: &State<DbConn>,
    gig_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let gig_id = parse_object_id(&gig_id, "gig")?;
    let gig = load_gig(db, &gig_id).await?;

    let owner = user_ref(db, &gig.user).await?;

    let accepted_bid = match gig.accepted_bid {
        Some(bid_id) => {
            let bid = db
                .collection::<Bid>("bids")
                .find_one(doc! { "_id": bid_id }, None)
                .await
                .map_err(|e| ApiError::internal_error(e.to_string()))?;
            match bid {
                Some(bid) => Some(AcceptedBidResponse {
                    id: bid_id.to_hex(),
                    user: user_ref(db, &bid.user).await?,
                    price: bid.price,
                }),
                None => None,
            }
        }
        None => None,
    };

    let response = GigDetailResponse {
        id: gig.id.map(|id| id.to_hex()).unwrap_or_default(),
        user: owner,
        title: gig.title,
        description: gig.description,
        category: gig.category,
        price: gig.price,
        location: gig.location,
        status: gig.status,
        payment_status: gig.payment_status,
        accepted_bid,
        cancellation_requested_by: gig.cancellation_requested_by.map(|id| id.to_hex()),
        created_at: gig.created_at.try_to_rfc3339_string().unwrap_or_default(),
    };

    Ok(Json(ApiResponse::success(serde_json::json!(response))))
}

// ============================================================================
// CRUD
// ============================================================================

#[openapi(tag = "Gig")]
#[post("/gigs", data = "<dto>")]
pub async fn create_gig(
    db: &State<DbConn>,
    auth: AuthGuard,
    dto: Json<CreateGigDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if auth.role != UserRole::Client {
        return Err(ApiError::forbidden("Only clients can create gigs"));
    }
    if dto.title.trim().is_empty() || dto.description.trim().is_empty() {
        return Err(ApiError::bad_request("Title and description are required"));
    }
    if dto.price < 0.0 {
        return Err(ApiError::bad_request("Price cannot be negative"));
    }
    if !validate_coordinates(dto.location.latitude, dto.location.longitude) {
        return Err(ApiError::bad_request("Invalid coordinates"));
    }

    let gig = Gig {
        id: None,
        user: auth.user_id,
        title: dto.title.trim().to_string(),
        description: dto.description.clone(),
        category: dto.category,
        price: dto.price,
        location: GeoPoint::new(dto.location.longitude, dto.location.latitude),
        status: GigStatus::Open,
        payment_status: GigPaymentStatus::Pending,
        accepted_bid: None,
        cancellation_requested_by: None,
        created_at: DateTime::now(),
        updated_at: DateTime::now(),
    };

    let res = db
        .collection::<Gig>("gigs")
        .insert_one(&gig, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to create gig: {}", e)))?;

    let mut gig = gig;
    gig.id = res.inserted_id.as_object_id();

    let owner = user_ref(db, &auth.user_id).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Gig created successfully".to_string(),
        serde_json::json!(GigResponse::from_gig(gig, owner)),
    )))
}

#[openapi(tag = "Gig")]
#[put("/gigs/<gig_id>", data = "<dto>")]
pub async fn update_gig(
    db: &State<DbConn>,
    auth: AuthGuard,
    gig_id: String,
    dto: Json<UpdateGigDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let gig_id = parse_object_id(&gig_id, "gig")?;
    let gig = load_gig(db, &gig_id).await?;
    gig.require_owner(&auth.user_id, "Not authorized to update this gig")?;

    let mut update_doc = doc! {
        "updated_at": DateTime::now()
    };

    if let Some(ref title) = dto.title {
        update_doc.insert("title", title.trim());
    }
    if let Some(ref description) = dto.description {
        update_doc.insert("description", description);
    }
    if let Some(category) = dto.category {
        update_doc.insert(
            "category",
            mongodb::bson::to_bson(&category).map_err(|e| ApiError::internal_error(e.to_string()))?,
        );
    }
    if let Some(price) = dto.price {
        if price < 0.0 {
            return Err(ApiError::bad_request("Price cannot be negative"));
        }
        update_doc.insert("price", price);
    }
    if let Some(ref location) = dto.location {
        if !validate_coordinates(location.latitude, location.longitude) {
            return Err(ApiError::bad_request("Invalid coordinates"));
        }
        update_doc.insert(
            "location",
            doc! {
                "type": "Point",
                "coordinates": vec![location.longitude, location.latitude]
            },
        );
    }

    db.collection::<Gig>("gigs")
        .update_one(doc! { "_id": gig_id }, doc! { "$set": update_doc }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to update gig: {}", e)))?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Gig updated successfully"
    }))))
}

#[openapi(tag = "Gig")]
#[delete("/gigs/<gig_id>")]
pub async fn delete_gig(
    db: &State<DbConn>,
    auth: AuthGuard,
    gig_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let gig_id = parse_object_id(&gig_id, "gig")?;
    let gig = load_gig(db, &gig_id).await?;
    gig.require_owner(&auth.user_id, "Not authorized to delete this gig")?;
    gig.require_status(GigStatus::Open, "Cannot delete a gig that is not open.")?;

    db.collection::<Gig>("gigs")
        .delete_one(doc! { "_id": gig_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to delete gig: {}", e)))?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Gig removed"
    }))))
}

// ============================================================================
// LIFECYCLE EDGES
// ============================================================================

#[openapi(tag = "Gig")]
#[put("/gigs/<gig_id>/freelancer-finish")]
pub async fn freelancer_finish_gig(
    db: &State<DbConn>,
    hub: &State<EventHub>,
    auth: AuthGuard,
    gig_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let gig_id = parse_object_id(&gig_id, "gig")?;
    let gig = load_gig(db, &gig_id).await?;

    let bid = load_accepted_bid(db, &gig).await?;
    bid.require_bidder(&auth.user_id, "User not authorized to finish this gig")?;
    gig.require_status(GigStatus::InProgress, "Gig must be in-progress to be finished.")?;

    db.collection::<Gig>("gigs")
        .update_one(
            doc! { "_id": gig_id },
            doc! { "$set": {
                "status": GigStatus::AwaitingPayment,
                "updated_at": DateTime::now()
            }},
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    NotificationService::send(
        db,
        hub,
        gig.user,
        format!(
            "Your gig \"{}\" has been completed by the freelancer and is now awaiting payment.",
            gig.title
        ),
        Some(format!("/gigs/{}", gig_id.to_hex())),
    )
    .await?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Gig marked as finished",
        "status": GigStatus::AwaitingPayment
    }))))
}

#[openapi(tag = "Gig")]
#[put("/gigs/<gig_id>/client-pay")]
pub async fn client_pay_gig(
    db: &State<DbConn>,
    hub: &State<EventHub>,
    auth: AuthGuard,
    gig_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let gig_id = parse_object_id(&gig_id, "gig")?;
    let gig = load_gig(db, &gig_id).await?;
    gig.require_owner(&auth.user_id, "User not authorized to complete this gig")?;
    gig.require_status(
        GigStatus::AwaitingPayment,
        "Gig must be awaiting payment to be completed.",
    )?;

    let bid = load_accepted_bid(db, &gig).await?;

    db.collection::<Gig>("gigs")
        .update_one(
            doc! { "_id": gig_id },
            doc! { "$set": {
                "status": GigStatus::Completed,
                "payment_status": GigPaymentStatus::Paid,
                "updated_at": DateTime::now()
            }},
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    NotificationService::send(
        db,
        hub,
        bid.user,
        format!("Gig \"{}\" was marked as paid and completed.", gig.title),
        Some(format!("/gigs/{}", gig_id.to_hex())),
    )
    .await?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Gig completed",
        "status": GigStatus::Completed
    }))))
}

#[openapi(tag = "Gig")]
#[put("/gigs/<gig_id>/cancel-request")]
pub async fn request_cancel_gig(
    db: &State<DbConn>,
    hub: &State<EventHub>,
    auth: AuthGuard,
    gig_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let gig_id = parse_object_id(&gig_id, "gig")?;
    let gig = load_gig(db, &gig_id).await?;
    gig.require_owner(&auth.user_id, "User not authorized to request cancellation.")?;
    gig.require_status(GigStatus::InProgress, "Only in-progress gigs can be cancelled.")?;

    let bid = load_accepted_bid(db, &gig).await?;

    db.collection::<Gig>("gigs")
        .update_one(
            doc! { "_id": gig_id },
            doc! { "$set": {
                "status": GigStatus::CancellationPending,
                "cancellation_requested_by": auth.user_id,
                "updated_at": DateTime::now()
            }},
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    NotificationService::send(
        db,
        hub,
        bid.user,
        format!("Cancellation requested for gig: \"{}\"", gig.title),
        Some(format!("/gigs/{}", gig_id.to_hex())),
    )
    .await?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Cancellation requested",
        "status": GigStatus::CancellationPending
    }))))
}

#[openapi(tag = "Gig")]
#[put("/gigs/<gig_id>/approve-cancel")]
pub async fn approve_cancel_gig(
    db: &State<DbConn>,
    hub: &State<EventHub>,
    auth: AuthGuard,
    gig_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let gig_id = parse_object_id(&gig_id, "gig")?;
    let gig = load_gig(db, &gig_id).await?;

    let bid = load_accepted_bid(db, &gig).await?;
    bid.require_bidder(&auth.user_id, "User not authorized to approve cancellation.")?;
    gig.require_status(
        GigStatus::CancellationPending,
        "This gig is not pending cancellation.",
    )?;

    db.collection::<Gig>("gigs")
        .update_one(
            doc! { "_id": gig_id },
            doc! { "$set": {
                "status": GigStatus::Cancelled,
                "updated_at": DateTime::now()
            }},
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    NotificationService::send(
        db,
        hub,
        gig.user,
        format!("Cancellation approved for gig: \"{}\"", gig.title),
        Some(format!("/gigs/{}", gig_id.to_hex())),
    )
    .await?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Cancellation approved",
        "status": GigStatus::Cancelled
    }))))
}

#[openapi(tag = "Gig")]
#[put("/gigs/<gig_id>/reject-cancel")]
pub async fn reject_cancel_gig(
    db: &State<DbConn>,
    hub: &State<EventHub>,
    auth: AuthGuard,
    gig_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let gig_id = parse_object_id(&gig_id, "gig")?;
    let gig = load_gig(db, &gig_id).await?;

    let bid = load_accepted_bid(db, &gig).await?;
    bid.require_bidder(&auth.user_id, "User not authorized to reject cancellation.")?;
    gig.require_status(
        GigStatus::CancellationPending,
        "This gig is not pending cancellation.",
    )?;

    db.collection::<Gig>("gigs")
        .update_one(
            doc! { "_id": gig_id },
            doc! { "$set": {
                "status": GigStatus::InProgress,
                "updated_at": DateTime::now()
            }},
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    NotificationService::send(
        db,
        hub,
        gig.user,
        format!("Cancellation rejected for gig: \"{}\"", gig.title),
        Some(format!("/gigs/{}", gig_id.to_hex())),
    )
    .await?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Cancellation rejected",
        "status": GigStatus::InProgress
    }))))
}

// ============================================================================
// PAYMENT (delegates to the unified payment component)
// ============================================================================

#[openapi(tag = "Gig")]
#[post("/gigs/<gig_id>/create-order")]
pub async fn create_order(
    db: &State<DbConn>,
    auth: AuthGuard,
    gig_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let gig_id = parse_object_id(&gig_id, "gig")?;
    let order = PaymentService::create_order(db, &gig_id, &auth.user_id).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[openapi(tag = "Gig")]
#[post("/gigs/<gig_id>/verify-payment", data = "<dto>")]
pub async fn verify_payment(
    db: &State<DbConn>,
    hub: &State<EventHub>,
    auth: AuthGuard,
    gig_id: String,
    dto: Json<VerifyPaymentDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let gig_id = parse_object_id(&gig_id, "gig")?;
    let result = PaymentService::verify_callback(db, hub, &gig_id, &auth.user_id, &dto).await?;
    Ok(Json(ApiResponse::success(result)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_km_to_radians_uses_earth_radius() {
        assert_eq!(km_to_radians(6371.0), 1.0);
        let r = km_to_radians(10.0);
        assert!((r - 10.0 / 6371.0).abs() < 1e-12);
    }
}
