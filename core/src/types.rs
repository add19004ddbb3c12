//! Domain DTOs for the BizMap API.
//!
//! # Design
//! These types mirror the backend's JSON schema (snake_case field names) but
//! are defined independently from the mock-server crate; integration tests
//! catch schema drift between the two. Response types default every field the
//! backend may omit so a sparse payload still decodes. Timestamps are epoch
//! seconds.

use serde::{Deserialize, Serialize};

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoLocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub phone: String,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Body of `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Body of `POST /auth/register`. `phone` is left out of the JSON when unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Business {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub phone: String,
    pub email: String,
    pub website: String,
    pub address: String,
    pub location: GeoLocation,
    pub rating: f64,
    pub total_reviews: i32,
    pub is_verified: bool,
    pub is_active: bool,
    pub images: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
    /// Only present in search results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Product {
    pub id: String,
    pub business_id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub currency: String,
    pub category: String,
    pub is_available: bool,
    pub stock_quantity: i32,
    pub images: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Default for Product {
    fn default() -> Self {
        Self {
            id: String::new(),
            business_id: String::new(),
            name: String::new(),
            description: String::new(),
            price: 0.0,
            currency: "PEN".to_string(),
            category: String::new(),
            is_available: true,
            stock_quantity: 0,
            images: Vec::new(),
            created_at: 0,
            updated_at: 0,
        }
    }
}

/// A product search hit together with the business that sells it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProductWithBusiness {
    pub product: Product,
    pub business: Business,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchHistoryEntry {
    pub id: String,
    pub user_id: String,
    pub query: String,
    pub category: String,
    pub location: GeoLocation,
    pub created_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UserRecommendations {
    pub popular_searches: Vec<String>,
    pub popular_categories: Vec<String>,
}
