use mongodb::bson::{doc, DateTime};
use mongodb::options::UpdateOptions;
use rocket::futures::TryStreamExt;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::{
    Profile, ProfileLocation, ProfileResponse, Review, ReviewResponse, UpsertProfileDto, User,
    UserRole,
};
use crate::routes::{parse_object_id, user_ref_map};
use crate::utils::{validate_upi_id, ApiError, ApiResponse};

#[openapi(tag = "Profile")]
#[get("/profiles")]
pub async fn get_profiles(
    db: &State<DbConn>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let profiles: Vec<Profile> = db
        .collection::<Profile>("profiles")
        .find(doc! {}, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .try_collect()
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    let user_ids: Vec<_> = profiles.iter().map(|profile| profile.user).collect();
    let users: Vec<User> = if user_ids.is_empty() {
        Vec::new()
    } else {
        db.collection::<User>("users")
            .find(doc! { "_id": { "$in": user_ids.as_slice() } }, None)
            .await
            .map_err(|e| ApiError::internal_error(e.to_string()))?
            .try_collect()
            .await
            .map_err(|e| ApiError::internal_error(e.to_string()))?
    };

    let responses: Vec<ProfileResponse> = profiles
        .into_iter()
        .filter_map(|profile| {
            let user = users.iter().find(|user| user.id == Some(profile.user))?;
            Some(ProfileResponse::from_profile(
                profile,
                crate::models::UserRef {
                    id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
                    name: user.name.clone(),
                },
                user.role.as_str().to_string(),
            ))
        })
        .collect();

    Ok(Json(ApiResponse::success(serde_json::json!(responses))))
}

/// Profile plus the reviews written about this user.
#[openapi(tag = "Profile")]
#[get("/profiles/<user_id>")]
pub async fn get_profile_by_user(
    db: &State<DbConn>,
    user_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let user_id = parse_object_id(&user_id, "user")?;

    let user = db
        .collection::<User>("users")
        .find_one(doc! { "_id": user_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let profile = db
        .collection::<Profile>("profiles")
        .find_one(doc! { "user": user_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("Profile not found"))?;

    let reviews: Vec<Review> = db
        .collection::<Review>("reviews")
        .find(doc! { "reviewed_user": user_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .try_collect()
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    let reviewer_ids: Vec<_> = reviews.iter().map(|review| review.user).collect();
    let reviewers = user_ref_map(db, &reviewer_ids).await?;

    let review_responses: Vec<ReviewResponse> = reviews
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
        .collect();

    let response = ProfileResponse::from_profile(
        profile,
        crate::models::UserRef {
            id: user_id.to_hex(),
            name: user.name,
        },
        user.role.as_str().to_string(),
    );

    Ok(Json(ApiResponse::success(serde_json::json!({
        "profile": response,
        "reviews": review_responses
    }))))
}

/// Create or update the caller's profile. The UPI handle is only
/// persisted for freelancers; it is their payable identity and a hard
/// precondition for payment orders against their gigs.
#[openapi(tag = "Profile")]
#[post("/profiles", data = "<dto>")]
pub async fn upsert_profile(
    db: &State<DbConn>,
    auth: AuthGuard,
    dto: Json<UpsertProfileDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let mut set_doc = doc! {
        "user": auth.user_id,
        "bio": dto.bio.clone().unwrap_or_default(),
        "skills": dto.skills.clone().unwrap_or_default(),
        "portfolio": dto.portfolio.clone().unwrap_or_default(),
        "profile_photo": dto.profile_photo.clone().unwrap_or_default(),
        "location": mongodb::bson::to_bson(&dto.location.clone().unwrap_or_default())
            .map_err(|e| ApiError::internal_error(e.to_string()))?,
        "updated_at": DateTime::now()
    };

    if auth.role == UserRole::Freelancer {
        let upi_id = dto.upi_id.clone().unwrap_or_default();
        if !upi_id.is_empty() && !validate_upi_id(&upi_id) {
            return Err(ApiError::bad_request("Invalid UPI ID"));
        }
        set_doc.insert("upi_id", upi_id);
    }

    let options = UpdateOptions::builder().upsert(true).build();

    db.collection::<Profile>("profiles")
        .update_one(
            doc! { "user": auth.user_id },
            doc! {
                "$set": set_doc,
                "$setOnInsert": { "created_at": DateTime::now() }
            },
            options,
        )
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to save profile: {}", e)))?;

    let profile = db
        .collection::<Profile>("profiles")
        .find_one(doc! { "user": auth.user_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::internal_error("Profile not persisted"))?;

    Ok(Json(ApiResponse::success_with_message(
        "Profile saved".to_string(),
        serde_json::json!(profile),
    )))
}
