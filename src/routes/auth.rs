use rocket::serde::json::Json;
use rocket::State;
use mongodb::bson::{doc, DateTime};

use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::{LoginDto, RegisterDto, User, UserResponse};
use crate::services::JwtService;
use crate::utils::{validate_email, ApiError, ApiResponse};

#[post("/auth/register", data = "<dto>")]
pub async fn register(
    db: &State<DbConn>,
    dto: Json<RegisterDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if dto.name.trim().is_empty() {
        return Err(ApiError::bad_request("Name is required"));
    }
    if !validate_email(&dto.email) {
        return Err(ApiError::bad_request("Invalid email"));
    }
    if dto.password.len() < 6 {
        return Err(ApiError::bad_request("Password must be at least 6 characters"));
    }

    let users = db.collection::<User>("users");

    let existing = users
        .find_one(doc! { "email": &dto.email }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    if existing.is_some() {
        return Err(ApiError::conflict("An account with this email already exists"));
    }

    let hash = bcrypt::hash(&dto.password, bcrypt::DEFAULT_COST)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    let user = User {
        id: None,
        name: dto.name.trim().to_string(),
        email: dto.email.clone(),
        password: hash,
        role: dto.role,
        created_at: DateTime::now(),
        updated_at: DateTime::now(),
    };

    let res = users
        .insert_one(&user, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    let mut user = user;
    user.id = res.inserted_id.as_object_id();

    let token = JwtService::generate_token(user.id.as_ref().unwrap(), user.role)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Registration successful",
        "user": UserResponse::from(user),
        "token": token
    }))))
}

#[post("/auth/login", data = "<dto>")]
pub async fn login(
    db: &State<DbConn>,
    dto: Json<LoginDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let user = db
        .collection::<User>("users")
        .find_one(doc! { "email": &dto.email }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    let valid = bcrypt::verify(&dto.password, &user.password)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    if !valid {
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    let token = JwtService::generate_token(user.id.as_ref().unwrap(), user.role)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Login successful",
        "user": UserResponse::from(user),
        "token": token
    }))))
}

#[get("/auth/me")]
pub async fn me(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let user = db
        .collection::<User>("users")
        .find_one(doc! { "_id": auth.user_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(ApiResponse::success(serde_json::json!(
        UserResponse::from(user)
    ))))
}
