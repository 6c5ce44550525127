use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::VerifyPaymentDto;
use crate::routes::parse_object_id;
use crate::services::{EventHub, PaymentService};
use crate::utils::{ApiError, ApiResponse};

#[openapi(tag = "Payment")]
#[post("/payments/create-order/<gig_id>")]
pub async fn create_order(
    db: &State<DbConn>,
    auth: AuthGuard,
    gig_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let gig_id = parse_object_id(&gig_id, "gig")?;
    let order = PaymentService::create_order(db, &gig_id, &auth.user_id).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[openapi(tag = "Payment")]
#[post("/payments/verify/<gig_id>", data = "<dto>")]
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
