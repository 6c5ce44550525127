use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;

#[derive(Debug, Serialize, Deserialize, Clone, Default, JsonSchema)]
pub struct ProfileLocation {
    #[serde(default)]
    pub district: String,
    /// `[longitude, latitude]`, empty when unset.
    #[serde(default)]
    pub coordinates: Vec<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Profile {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user: ObjectId,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub portfolio: Vec<String>,
    #[serde(default)]
    pub profile_photo: String,
    #[serde(default)]
    pub location: ProfileLocation,
    /// Payable handle, freelancers only. Must be present before a payment
    /// order can be opened against this freelancer.
    #[serde(default)]
    pub upi_id: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpsertProfileDto {
    pub bio: Option<String>,
    pub skills: Option<Vec<String>>,
    pub portfolio: Option<Vec<String>>,
    pub profile_photo: Option<String>,
    pub location: Option<ProfileLocation>,
    pub upi_id: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ProfileResponse {
    pub id: String,
    pub user: crate::models::UserRef,
    pub role: String,
    pub bio: String,
    pub skills: Vec<String>,
    pub portfolio: Vec<String>,
    pub profile_photo: String,
    pub location: ProfileLocation,
    pub upi_id: String,
}

impl ProfileResponse {
    pub fn from_profile(profile: Profile, user: crate::models::UserRef, role: String) -> Self {
        ProfileResponse {
            id: profile.id.map(|id| id.to_hex()).unwrap_or_default(),
            user,
            role,
            bio: profile.bio,
            skills: profile.skills,
            portfolio: profile.portfolio,
            profile_photo: profile.profile_photo,
            location: profile.location,
            upi_id: profile.upi_id,
        }
    }
}
