use mongodb::bson::{doc, oid::ObjectId, DateTime};
use rocket::futures::TryStreamExt;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::{
    Bid, BidResponse, BidStatus, CreateBidDto, Gig, GigStatus, MyBidGig, MyBidResponse, UserRole,
};
use crate::routes::{parse_object_id, user_ref, user_ref_map};
use crate::services::{EventHub, NotificationService};
use crate::utils::{ApiError, ApiResponse};

#[openapi(tag = "Bid")]
#[post("/bids", data = "<dto>")]
pub async fn create_bid(
    db: &State<DbConn>,
    hub: &State<EventHub>,
    auth: AuthGuard,
    dto: Json<CreateBidDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if auth.role != UserRole::Freelancer {
        return Err(ApiError::forbidden("Only freelancers can submit bids."));
    }
    if dto.proposal.trim().is_empty() {
        return Err(ApiError::bad_request("Proposal is required"));
    }
    if dto.price < 0.0 {
        return Err(ApiError::bad_request("Price cannot be negative"));
    }

    let gig_id = parse_object_id(&dto.gig_id, "gig")?;

    let gig = db
        .collection::<Gig>("gigs")
        .find_one(doc! { "_id": gig_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("Gig not found"))?;

    // Bids are only accepted while the listing is open. Read paths filter
    // by status anyway; this closes the write path too.
    gig.require_status(GigStatus::Open, "This gig is no longer open.")?;

    let bids = db.collection::<Bid>("bids");

    let existing = bids
        .find_one(doc! { "gig": gig_id, "user": auth.user_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    if existing.is_some() {
        return Err(ApiError::conflict(
            "You have already submitted a bid for this gig.",
        ));
    }

    let bid = Bid {
        id: None,
        gig: gig_id,
        user: auth.user_id,
        proposal: dto.proposal.trim().to_string(),
        price: dto.price,
        status: BidStatus::Pending,
        created_at: DateTime::now(),
        updated_at: DateTime::now(),
    };

    let res = bids
        .insert_one(&bid, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to create bid: {}", e)))?;

    let mut bid = bid;
    bid.id = res.inserted_id.as_object_id();

    let bidder = user_ref(db, &auth.user_id).await?;

    NotificationService::send(
        db,
        hub,
        gig.user,
        format!("{} applied for your gig \"{}\"", bidder.name, gig.title),
        Some(format!("/gigs/{}", gig_id.to_hex())),
    )
    .await?;

    Ok(Json(ApiResponse::success_with_message(
        "Bid submitted successfully".to_string(),
        serde_json::json!(BidResponse::from_bid(bid, bidder)),
    )))
}

#[openapi(tag = "Bid")]
#[get("/bids/mybids")]
pub async fn get_my_bids(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    my_bids(db, &auth, None).await
}

#[openapi(tag = "Bid")]
#[get("/bids/mybids/accepted")]
pub async fn get_my_accepted_bids(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    my_bids(db, &auth, Some(BidStatus::Accepted)).await
}

async fn my_bids(
    db: &DbConn,
    auth: &AuthGuard,
    status: Option<BidStatus>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if auth.role != UserRole::Freelancer {
        return Err(ApiError::forbidden("Only freelancers can view this."));
    }

    let mut filter = doc! { "user": auth.user_id };
    if let Some(status) = status {
        filter.insert("status", status);
    }

    let bids: Vec<Bid> = db
        .collection::<Bid>("bids")
        .find(filter, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .try_collect()
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    // One query for all referenced gigs, joined in memory.
    let gig_ids: Vec<ObjectId> = bids.iter().map(|bid| bid.gig).collect();
    let gigs: Vec<Gig> = if gig_ids.is_empty() {
        Vec::new()
    } else {
        db.collection::<Gig>("gigs")
            .find(doc! { "_id": { "$in": gig_ids.as_slice() } }, None)
            .await
            .map_err(|e| ApiError::internal_error(e.to_string()))?
            .try_collect()
            .await
            .map_err(|e| ApiError::internal_error(e.to_string()))?
    };

    let responses: Vec<MyBidResponse> = bids
        .into_iter()
        .filter_map(|bid| {
            let gig = gigs.iter().find(|gig| gig.id == Some(bid.gig))?;
            Some(MyBidResponse {
                id: bid.id.map(|id| id.to_hex()).unwrap_or_default(),
                proposal: bid.proposal,
                price: bid.price,
                status: bid.status,
                gig: MyBidGig {
                    id: bid.gig.to_hex(),
                    title: gig.title.clone(),
                    status: gig.status,
                    price: gig.price,
                },
            })
        })
        .collect();

    Ok(Json(ApiResponse::success(serde_json::json!(responses))))
}

#[openapi(tag = "Bid")]
#[get("/bids/<gig_id>")]
pub async fn get_bids_for_gig(
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

    gig.require_owner(&auth.user_id, "Not authorized to view bids for this gig.")?;

    let bids: Vec<Bid> = db
        .collection::<Bid>("bids")
        .find(doc! { "gig": gig_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .try_collect()
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    let bidder_ids: Vec<ObjectId> = bids.iter().map(|bid| bid.user).collect();
    let bidders = user_ref_map(db, &bidder_ids).await?;

    let responses: Vec<BidResponse> = bids
        .into_iter()
        .map(|bid| {
            let bidder = bidders
                .get(&bid.user)
                .cloned()
                .unwrap_or_else(|| crate::models::UserRef {
                    id: bid.user.to_hex(),
                    name: String::new(),
                });
            BidResponse::from_bid(bid, bidder)
        })
        .collect();

    Ok(Json(ApiResponse::success(serde_json::json!(responses))))
}

#[openapi(tag = "Bid")]
#[put("/bids/<bid_id>/accept")]
pub async fn accept_bid(
    db: &State<DbConn>,
    hub: &State<EventHub>,
    auth: AuthGuard,
    bid_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let bid_id = parse_object_id(&bid_id, "bid")?;

    let bids = db.collection::<Bid>("bids");
    let bid = bids
        .find_one(doc! { "_id": bid_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("Bid not found"))?;

    let gigs = db.collection::<Gig>("gigs");
    let gig = gigs
        .find_one(doc! { "_id": bid.gig }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("Associated gig not found"))?;

    gig.require_owner(&auth.user_id, "User not authorized to accept this bid")?;
    // Accepting twice fails here: the first accept moved the gig off "open".
    gig.require_status(GigStatus::Open, "This gig is no longer open.")?;

    bids.update_one(
        doc! { "_id": bid_id },
        doc! { "$set": {
            "status": BidStatus::Accepted,
            "updated_at": DateTime::now()
        }},
        None,
    )
    .await
    .map_err(|e| ApiError::internal_error(e.to_string()))?;

    gigs.update_one(
        doc! { "_id": bid.gig },
        doc! { "$set": {
            "status": GigStatus::InProgress,
            "accepted_bid": bid_id,
            "updated_at": DateTime::now()
        }},
        None,
    )
    .await
    .map_err(|e| ApiError::internal_error(e.to_string()))?;

    // Reject all others in one sweep. The rejected bidders are not
    // notified, only the accepted one is.
    bids.update_many(
        doc! { "gig": bid.gig, "_id": { "$ne": bid_id } },
        doc! { "$set": {
            "status": BidStatus::Rejected,
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
        format!("Your bid on \"{}\" was accepted!", gig.title),
        Some(format!("/gigs/{}", bid.gig.to_hex())),
    )
    .await?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Bid accepted, gig in progress.",
        "gigId": bid.gig.to_hex(),
        "acceptedBid": bid_id.to_hex(),
        "gigStatus": GigStatus::InProgress
    }))))
}
