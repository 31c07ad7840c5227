use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

// Import serde helpers from user module
use super::user::bson_datetime_as_chrono;

/// Refresh token stored in MongoDB "refresh_tokens" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    #[serde(rename = "userId")]
    pub user_id: ObjectId,

    /// SHA-256 hash of the actual refresh token (stored for validation)
    pub token_hash: String,

    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "expiresAt", with = "bson_datetime_as_chrono")]
    pub expires_at: DateTime<Utc>,

    #[serde(rename = "lastUsedAt", with = "bson_datetime_as_chrono")]
    pub last_used_at: DateTime<Utc>,

    /// User agent of the client that created this token
    pub user_agent: Option<String>,

    /// IP address of the client that created this token
    pub ip: Option<String>,

    /// Whether this token has been revoked
    #[serde(default)]
    pub revoked: bool,
}

/// Response after refreshing access token
#[derive(Debug, Serialize)]
pub struct RefreshTokenResponse {
    pub access_token: String,
}
