use mongodb::bson::{oid::ObjectId, Bson, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;

use crate::utils::ApiError;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BidStatus {
    Pending,
    Accepted,
    Rejected,
}

impl BidStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BidStatus::Pending => "pending",
            BidStatus::Accepted => "accepted",
            BidStatus::Rejected => "rejected",
        }
    }
}

impl From<BidStatus> for Bson {
    fn from(status: BidStatus) -> Bson {
        Bson::String(status.as_str().to_string())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Bid {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub gig: ObjectId,
    pub user: ObjectId,
    pub proposal: String,
    pub price: f64,
    pub status: BidStatus,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Bid {
    /// Finish/cancel-approval edges are reserved for the freelancer whose
    /// bid was accepted.
    pub fn require_bidder(&self, user_id: &ObjectId, message: &str) -> Result<(), ApiError> {
        if &self.user != user_id {
            return Err(ApiError::forbidden(message));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateBidDto {
    pub gig_id: String,
    pub proposal: String,
    pub price: f64,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct BidResponse {
    pub id: String,
    pub gig: String,
    pub user: crate::models::UserRef,
    pub proposal: String,
    pub price: f64,
    pub status: BidStatus,
    pub created_at: String,
}

impl BidResponse {
    pub fn from_bid(bid: Bid, bidder: crate::models::UserRef) -> Self {
        BidResponse {
            id: bid.id.map(|id| id.to_hex()).unwrap_or_default(),
            gig: bid.gig.to_hex(),
            user: bidder,
            proposal: bid.proposal,
            price: bid.price,
            status: bid.status,
            created_at: bid.created_at.try_to_rfc3339_string().unwrap_or_default(),
        }
    }
}

/// A freelancer's bid joined with the gig it targets, for the "my bids"
/// listings.
#[derive(Debug, Serialize, JsonSchema)]
pub struct MyBidResponse {
    pub id: String,
    pub proposal: String,
    pub price: f64,
    pub status: BidStatus,
    pub gig: MyBidGig,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct MyBidGig {
    pub id: String,
    pub title: String,
    pub status: crate::models::GigStatus,
    pub price: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_bidder() {
        let bid = Bid {
            id: Some(ObjectId::new()),
            gig: ObjectId::new(),
            user: ObjectId::new(),
            proposal: "I can do it".to_string(),
            price: 450.0,
            status: BidStatus::Pending,
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
        };
        assert!(bid.require_bidder(&bid.user.clone(), "nope").is_ok());
        assert!(bid.require_bidder(&ObjectId::new(), "nope").is_err());
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(serde_json::to_string(&BidStatus::Pending).unwrap(), "\"pending\"");
        assert_eq!(serde_json::to_string(&BidStatus::Accepted).unwrap(), "\"accepted\"");
        assert_eq!(serde_json::to_string(&BidStatus::Rejected).unwrap(), "\"rejected\"");
    }
}
