use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Review {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub gig: ObjectId,
    pub user: ObjectId,
    pub reviewed_user: ObjectId,
    pub rating: i32, // 1-5
    pub comment: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateReviewDto {
    pub gig_id: String,
    pub reviewed_user_id: String,
    pub rating: i32,
    pub comment: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ReviewResponse {
    pub id: String,
    pub gig: String,
    pub user: crate::models::UserRef,
    pub reviewed_user: String,
    pub rating: i32,
    pub comment: String,
    pub created_at: String,
}

impl ReviewResponse {
    pub fn from_review(review: Review, reviewer: crate::models::UserRef) -> Self {
        ReviewResponse {
            id: review.id.map(|id| id.to_hex()).unwrap_or_default(),
            gig: review.gig.to_hex(),
            user: reviewer,
            reviewed_user: review.reviewed_user.to_hex(),
            rating: review.rating,
            comment: review.comment,
            created_at: review.created_at.try_to_rfc3339_string().unwrap_or_default(),
        }
    }
}
