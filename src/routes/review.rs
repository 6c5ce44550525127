use mongodb::bson::{doc, oid::ObjectId, DateTime};
use rocket::futures::TryStreamExt;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::{Bid, CreateReviewDto, Gig, GigStatus, Review, ReviewResponse};
use crate::routes::{parse_object_id, user_ref, user_ref_map};
use crate::utils::{ApiError, ApiResponse};

#[openapi(tag = "Review")]
#[post("/reviews", data = "<dto>")]
pub async fn create_review(
    db: &State<DbConn>,
    auth: AuthGuard,
    dto: Json<CreateReviewDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if dto.rating < 1 || dto.rating > 5 {
        return Err(ApiError::bad_request("Rating must be between 1 and 5"));
    }
    if dto.comment.trim().is_empty() {
        return Err(ApiError::bad_request("Comment is required"));
    }

    let gig_id = parse_object_id(&dto.gig_id, "gig")?;
    let reviewed_user_id = parse_object_id(&dto.reviewed_user_id, "user")?;

    let gig = db
        .collection::<Gig>("gigs")
        .find_one(doc! { "_id": gig_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("Gig not found"))?;

    gig.require_status(GigStatus::Completed, "Cannot review an incomplete gig")?;

    let accepted_bid = match gig.accepted_bid {
        Some(bid_id) => db
            .collection::<Bid>("bids")
            .find_one(doc! { "_id": bid_id }, None)
            .await
            .map_err(|e| ApiError::internal_error(e.to_string()))?,
        None => None,
    };

    let is_gig_owner = gig.user == auth.user_id;
    let is_accepted_freelancer = accepted_bid
        .as_ref()
        .map(|bid| bid.user == auth.user_id)
        .unwrap_or(false);

    if !is_gig_owner && !is_accepted_freelancer {
        return Err(ApiError::forbidden("Not authorized to review this gig"));
    }

    // Each side may only review the counterparty.
    let target = if is_gig_owner {
        accepted_bid.as_ref().map(|bid| bid.user)
    } else {
        Some(gig.user)
    };

    if target != Some(reviewed_user_id) {
        return Err(ApiError::bad_request("Invalid reviewed user"));
    }

    let reviews = db.collection::<Review>("reviews");

    let existing = reviews
        .find_one(doc! { "gig": gig_id, "user": auth.user_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    if existing.is_some() {
        return Err(ApiError::conflict("You have already reviewed this gig"));
    }

    let review = Review {
        id: None,
        gig: gig_id,
        user: auth.user_id,
        reviewed_user: reviewed_user_id,
        rating: dto.rating,
        comment: dto.comment.trim().to_string(),
        created_at: DateTime::now(),
        updated_at: DateTime::now(),
    };

    let res = reviews
        .insert_one(&review, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to create review: {}", e)))?;

    let mut review = review;
    review.id = res.inserted_id.as_object_id();

    let reviewer = user_ref(db, &auth.user_id).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Review submitted successfully".to_string(),
        serde_json::json!(ReviewResponse::from_review(review, reviewer)),
    )))
}

async fn list_reviews(
    db: &DbConn,
    filter: mongodb::bson::Document,
) -> Result<Vec<ReviewResponse>, ApiError> {
    let reviews: Vec<Review> = db
        .collection::<Review>("reviews")
        .find(filter, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .try_collect()
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    let reviewer_ids: Vec<ObjectId> = reviews.iter().map(|review| review.user).collect();
    let reviewers = user_ref_map(db, &reviewer_ids).await?;

    Ok(reviews
        .into_iter()
        .map(|review| {
            let reviewer = reviewers
                .get(&review.user)
                .cloned()
                .unwrap_or_else(|| crate::models::UserRef {
                    id: review.user.to_hex(),
                    name: String::new(),
                });
            ReviewResponse::from_review(review, reviewer)
        })
        .collect())
}

#[openapi(tag = "Review")]
#[get("/reviews/user/<user_id>")]
pub async fn get_reviews_for_user(
    db: &State<DbConn>,
    user_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let user_id = parse_object_id(&user_id, "user")?;
    let reviews = list_reviews(db, doc! { "reviewed_user": user_id }).await?;
    Ok(Json(ApiResponse::success(serde_json::json!(reviews))))
}

#[openapi(tag = "Review")]
#[get("/reviews/gig/<gig_id>")]
pub async fn get_reviews_for_gig(
    db: &State<DbConn>,
    gig_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let gig_id = parse_object_id(&gig_id, "gig")?;
    let reviews = list_reviews(db, doc! { "gig": gig_id }).await?;
    Ok(Json(ApiResponse::success(serde_json::json!(reviews))))
}

#[openapi(tag = "Review")]
#[get("/reviews/user/<user_id>/average")]
pub async fn get_average_rating_for_user(
    db: &State<DbConn>,
    user_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let user_id = parse_object_id(&user_id, "user")?;

    let reviews: Vec<Review> = db
        .collection::<Review>("reviews")
        .find(doc! { "reviewed_user": user_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .try_collect()
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    if reviews.is_empty() {
        return Ok(Json(ApiResponse::success(serde_json::json!({
            "averageRating": 0.0,
            "totalReviews": 0
        }))));
    }

    let total_reviews = reviews.len() as i32;
    let average = reviews.iter().map(|review| review.rating).sum::<i32>() as f64
        / total_reviews as f64;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "averageRating": (average * 10.0).round() / 10.0,
        "totalReviews": total_reviews
    }))))
}
