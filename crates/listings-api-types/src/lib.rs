//! Request and response shapes shared by the listings server and its clients.
//!
//! Monetary amounts are integer minor units (hundredths) throughout.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthResponse {
    pub id: Uuid,
    pub username: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub token: String,
    pub is_authorized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_user: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateAdRequest {
    pub caption: String,
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub price: i64,
}

/// Partial update; absent fields keep their stored values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UpdateAdRequest {
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub price: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FeedQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AdResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub author_username: String,
    pub caption: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub price: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<OffsetDateTime>,
    /// Present only for authenticated callers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_owner: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedResponse {
    pub ads: Vec<AdResponse>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthResponse {
    pub database: String,
    pub cache: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_ad_omits_owner_flag() {
        let ad = AdResponse {
            id: Uuid::nil(),
            owner_id: Uuid::nil(),
            author_username: "alice".to_string(),
            caption: "Bike".to_string(),
            description: "Red".to_string(),
            image_url: None,
            price: 1_500,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: None,
            is_owner: None,
        };

        let json = serde_json::to_value(&ad).expect("serialize ad");
        assert!(json.get("is_owner").is_none());
        assert!(json.get("image_url").is_none());
        assert!(json.get("updated_at").is_none());
        assert_eq!(json["price"], 1_500);
    }

    #[test]
    fn non_owner_flag_is_serialized_as_false() {
        let ad = AdResponse {
            id: Uuid::nil(),
            owner_id: Uuid::nil(),
            author_username: "alice".to_string(),
            caption: "Bike".to_string(),
            description: "Red".to_string(),
            image_url: None,
            price: 0,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: None,
            is_owner: Some(false),
        };

        let json = serde_json::to_value(&ad).expect("serialize ad");
        assert_eq!(json["is_owner"], false);
    }

    #[test]
    fn update_request_fields_default_to_absent() {
        let request: UpdateAdRequest =
            serde_json::from_str(r#"{"price": 250}"#).expect("parse update");
        assert_eq!(request.price, Some(250));
        assert!(request.caption.is_none());
        assert!(request.description.is_none());
        assert!(request.image_url.is_none());
    }
}
