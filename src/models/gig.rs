use mongodb::bson::{oid::ObjectId, Bson, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;

use crate::utils::ApiError;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
pub enum GigCategory {
    #[serde(rename = "Web Development")]
    WebDevelopment,
    #[serde(rename = "Graphic Design")]
    GraphicDesign,
    Writing,
    Gardening,
    Plumbing,
    Cleaning,
    Other,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
pub enum GigStatus {
    #[serde(rename = "open")]
    Open,
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "awaiting_payment")]
    AwaitingPayment,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "cancelled")]
    Cancelled,
    #[serde(rename = "cancellation_pending")]
    CancellationPending,
    #[serde(rename = "cancellation_rejected")]
    CancellationRejected,
}

impl GigStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GigStatus::Open => "open",
            GigStatus::InProgress => "in-progress",
            GigStatus::AwaitingPayment => "awaiting_payment",
            GigStatus::Completed => "completed",
            GigStatus::Cancelled => "cancelled",
            GigStatus::CancellationPending => "cancellation_pending",
            GigStatus::CancellationRejected => "cancellation_rejected",
        }
    }

    /// States in which the gig must carry an accepted bid.
    pub fn requires_accepted_bid(&self) -> bool {
        matches!(
            self,
            GigStatus::InProgress
                | GigStatus::AwaitingPayment
                | GigStatus::Completed
                | GigStatus::CancellationPending
        )
    }
}

impl From<GigStatus> for Bson {
    fn from(status: GigStatus) -> Bson {
        Bson::String(status.as_str().to_string())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum GigPaymentStatus {
    Pending,
    Paid,
}

impl GigPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GigPaymentStatus::Pending => "pending",
            GigPaymentStatus::Paid => "paid",
        }
    }
}

impl From<GigPaymentStatus> for Bson {
    fn from(status: GigPaymentStatus) -> Bson {
        Bson::String(status.as_str().to_string())
    }
}

/// GeoJSON point, `coordinates` is `[longitude, latitude]`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct GeoPoint {
    #[serde(rename = "type")]
    pub geo_type: String, // "Point"
    pub coordinates: [f64; 2],
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        GeoPoint {
            geo_type: String::from("Point"),
            coordinates: [longitude, latitude],
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Gig {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user: ObjectId,
    pub title: String,
    pub description: String,
    pub category: GigCategory,
    pub price: f64,
    pub location: GeoPoint,
    pub status: GigStatus,
    pub payment_status: GigPaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_bid: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_requested_by: Option<ObjectId>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Gig {
    /// Every mutating edge starts with these two checks, in this order.
    pub fn require_owner(&self, user_id: &ObjectId, message: &str) -> Result<(), ApiError> {
        if &self.user != user_id {
            return Err(ApiError::forbidden(message));
        }
        Ok(())
    }

    pub fn require_status(&self, expected: GigStatus, message: &str) -> Result<(), ApiError> {
        if self.status != expected {
            return Err(ApiError::bad_request(message));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct LocationDto {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateGigDto {
    pub title: String,
    pub description: String,
    pub category: GigCategory,
    pub price: f64,
    pub location: LocationDto,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateGigDto {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<GigCategory>,
    pub price: Option<f64>,
    pub location: Option<LocationDto>,
}

#[derive(Debug, FromForm, Deserialize, JsonSchema)]
pub struct LocationSearchQuery {
    pub lat: f64,
    pub lon: f64,
    /// Radius in kilometers.
    pub radius: f64,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct UserRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct GigResponse {
    pub id: String,
    pub user: UserRef,
    pub title: String,
    pub description: String,
    pub category: GigCategory,
    pub price: f64,
    pub location: GeoPoint,
    pub status: GigStatus,
    pub payment_status: GigPaymentStatus,
    pub accepted_bid: Option<String>,
    pub cancellation_requested_by: Option<String>,
    pub created_at: String,
}

impl GigResponse {
    pub fn from_gig(gig: Gig, owner: UserRef) -> Self {
        GigResponse {
            id: gig.id.map(|id| id.to_hex()).unwrap_or_default(),
            user: owner,
            title: gig.title,
            description: gig.description,
            category: gig.category,
            price: gig.price,
            location: gig.location,
            status: gig.status,
            payment_status: gig.payment_status,
            accepted_bid: gig.accepted_bid.map(|id| id.to_hex()),
            cancellation_requested_by: gig.cancellation_requested_by.map(|id| id.to_hex()),
            created_at: gig.created_at.try_to_rfc3339_string().unwrap_or_default(),
        }
    }
}

/// Accepted-bid summary embedded in the gig detail view.
#[derive(Debug, Serialize, JsonSchema)]
pub struct AcceptedBidResponse {
    pub id: String,
    pub user: UserRef,
    pub price: f64,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct GigDetailResponse {
    pub id: String,
    pub user: UserRef,
    pub title: String,
    pub description: String,
    pub category: GigCategory,
    pub price: f64,
    pub location: GeoPoint,
    pub status: GigStatus,
    pub payment_status: GigPaymentStatus,
    pub accepted_bid: Option<AcceptedBidResponse>,
    pub cancellation_requested_by: Option<String>,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_gig(status: GigStatus) -> Gig {
        Gig {
            id: Some(ObjectId::new()),
            user: ObjectId::new(),
            title: "Paint fence".to_string(),
            description: "White paint, two coats".to_string(),
            category: GigCategory::Other,
            price: 500.0,
            location: GeoPoint::new(72.83, 21.17),
            status,
            payment_status: GigPaymentStatus::Pending,
            accepted_bid: None,
            cancellation_requested_by: None,
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
        }
    }

    #[test]
    fn test_require_owner() {
        let gig = sample_gig(GigStatus::Open);
        assert!(gig.require_owner(&gig.user.clone(), "nope").is_ok());
        assert!(gig.require_owner(&ObjectId::new(), "nope").is_err());
    }

    #[test]
    fn test_require_status() {
        let gig = sample_gig(GigStatus::InProgress);
        assert!(gig.require_status(GigStatus::InProgress, "nope").is_ok());
        assert!(gig.require_status(GigStatus::Open, "nope").is_err());
    }

    #[test]
    fn test_accepted_bid_states() {
        assert!(GigStatus::InProgress.requires_accepted_bid());
        assert!(GigStatus::AwaitingPayment.requires_accepted_bid());
        assert!(GigStatus::Completed.requires_accepted_bid());
        assert!(GigStatus::CancellationPending.requires_accepted_bid());
        assert!(!GigStatus::Open.requires_accepted_bid());
        assert!(!GigStatus::Cancelled.requires_accepted_bid());
        assert!(!GigStatus::CancellationRejected.requires_accepted_bid());
    }

    #[test]
    fn test_gig_bson_round_trip() {
        let gig = sample_gig(GigStatus::Open);
        let doc = mongodb::bson::to_document(&gig).unwrap();
        assert_eq!(doc.get_str("status").unwrap(), "open");
        assert_eq!(doc.get_str("payment_status").unwrap(), "pending");

        let back: Gig = mongodb::bson::from_document(doc).unwrap();
        assert_eq!(back.title, gig.title);
        assert_eq!(back.description, gig.description);
        assert_eq!(back.category, gig.category);
        assert_eq!(back.price, gig.price);
        assert_eq!(back.location, gig.location);
    }

    #[test]
    fn test_happy_path_walk() {
        let mut gig = sample_gig(GigStatus::Open);
        let owner = gig.user;

        // accept-bid is only valid while open
        assert!(gig.require_status(GigStatus::Open, "not open").is_ok());
        gig.status = GigStatus::InProgress;
        gig.accepted_bid = Some(ObjectId::new());

        // a second accept fails, the gig has left "open"
        assert!(gig.require_status(GigStatus::Open, "not open").is_err());

        // finish requires in-progress
        assert!(gig.require_status(GigStatus::InProgress, "not in progress").is_ok());
        gig.status = GigStatus::AwaitingPayment;

        // settle requires awaiting_payment and the owner
        assert!(gig.require_owner(&owner, "not owner").is_ok());
        assert!(gig
            .require_status(GigStatus::AwaitingPayment, "not awaiting")
            .is_ok());
        gig.status = GigStatus::Completed;
        gig.payment_status = GigPaymentStatus::Paid;

        assert!(gig.status.requires_accepted_bid());
        assert!(gig.accepted_bid.is_some());
    }

    #[test]
    fn test_cancellation_walk() {
        let mut gig = sample_gig(GigStatus::InProgress);
        gig.accepted_bid = Some(ObjectId::new());
        let owner = gig.user;

        // only in-progress gigs can enter cancellation
        assert!(gig.require_owner(&owner, "not owner").is_ok());
        assert!(gig
            .require_status(GigStatus::InProgress, "not in progress")
            .is_ok());
        gig.status = GigStatus::CancellationPending;
        gig.cancellation_requested_by = Some(owner);

        // reject reverts to in-progress
        assert!(gig
            .require_status(GigStatus::CancellationPending, "not pending")
            .is_ok());
        gig.status = GigStatus::InProgress;

        // cancelling from a non-pending state fails
        assert!(gig
            .require_status(GigStatus::CancellationPending, "not pending")
            .is_err());
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&GigStatus::InProgress).unwrap(),
            "\"in-progress\""
        );
        assert_eq!(
            serde_json::to_string(&GigStatus::AwaitingPayment).unwrap(),
            "\"awaiting_payment\""
        );
        assert_eq!(
            serde_json::to_string(&GigCategory::WebDevelopment).unwrap(),
            "\"Web Development\""
        );
        let status: GigStatus = serde_json::from_str("\"cancellation_pending\"").unwrap();
        assert_eq!(status, GigStatus::CancellationPending);
    }
}
