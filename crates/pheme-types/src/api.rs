use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;
use crate::visibility::Visibility;

// -- JWT Claims --

/// Claims of the `jwt` cookie minted by the auth service. The user id travels
/// in the standard issuer claim as a decimal string; this service validates
/// the signature and expiry and trusts the identity from there on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub exp: usize,
}

// -- Phemes --

/// A pheme as served over the API. `created_by` is the author; `user_id` is
/// the profile the pheme is posted to, which differs from the author for
/// cross-posts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pheme {
    pub id: i64,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub visibility: Visibility,
    pub category: String,
    pub text: String,
    pub created_by: UserId,
    pub user_id: UserId,
}

/// Body of pheme create and update requests. `user_id` selects the target
/// profile on create and is ignored on update (a pheme cannot be retargeted).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PhemeParams {
    pub visibility: Visibility,
    pub category: String,
    pub text: String,
    pub user_id: UserId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PhemeId {
    pub id: i64,
}

// -- Users --

/// Public view of a user account. Email and credential fields never leave the
/// service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPublic {
    pub id: UserId,
    pub user_name: String,
    pub avatar: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}
