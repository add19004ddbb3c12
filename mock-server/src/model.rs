//! Wire types and seed data for the mock BizMap backend.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
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

#[derive(Deserialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i32,
    pub user: User,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
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
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
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

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProductWithBusiness {
    pub product: Product,
    pub business: Business,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchHistoryEntry {
    pub id: String,
    pub user_id: String,
    pub query: String,
    pub category: String,
    pub location: GeoLocation,
    pub created_at: i64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UserRecommendations {
    pub popular_searches: Vec<String>,
    pub popular_categories: Vec<String>,
}

pub struct Account {
    pub user: User,
    pub password: String,
}

/// Everything the mock backend knows, guarded by one lock.
#[derive(Default)]
pub struct Store {
    /// Keyed by username.
    pub accounts: HashMap<String, Account>,
    /// Access token to user id.
    pub sessions: HashMap<String, String>,
    pub businesses: Vec<Business>,
    pub products: Vec<Product>,
    pub history: Vec<SearchHistoryEntry>,
}

pub const DEMO_USERNAME: &str = "demo";
pub const DEMO_PASSWORD: &str = "demo123";

pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

impl Store {
    /// A store with one demo account, two New York pizzerias and a Lima
    /// electronics shop.
    pub fn seeded() -> Self {
        let mut store = Store::default();
        let ts = now();

        let owner = User {
            id: "u-demo".to_string(),
            username: DEMO_USERNAME.to_string(),
            email: "demo@bizmap.test".to_string(),
            full_name: "Demo User".to_string(),
            phone: "+51 999 000 111".to_string(),
            is_active: true,
            created_at: ts,
            updated_at: ts,
        };
        store.accounts.insert(
            DEMO_USERNAME.to_string(),
            Account {
                user: owner.clone(),
                password: DEMO_PASSWORD.to_string(),
            },
        );

        let business = |id: &str, name: &str, category: &str, lat: f64, lng: f64, rating: f64| Business {
            id: id.to_string(),
            owner_id: owner.id.clone(),
            name: name.to_string(),
            description: format!("{name} ({category})"),
            category: category.to_string(),
            phone: String::new(),
            email: String::new(),
            website: String::new(),
            address: String::new(),
            location: GeoLocation {
                latitude: lat,
                longitude: lng,
            },
            rating,
            total_reviews: 0,
            is_verified: true,
            is_active: true,
            images: Vec::new(),
            created_at: ts,
            updated_at: ts,
            distance_meters: None,
        };
        store.businesses = vec![
            business("b-joes-pizza", "Joe's Pizza", "restaurant", 40.7306, -73.9890, 4.6),
            business("b-prince-slice", "Prince Street Pizza", "restaurant", 40.7231, -73.9945, 4.4),
            business("b-techstore", "TechStore Lima", "electronics", -12.0464, -77.0428, 4.1),
        ];

        let product = |id: &str, business_id: &str, name: &str, price: f64, currency: &str, category: &str| Product {
            id: id.to_string(),
            business_id: business_id.to_string(),
            name: name.to_string(),
            description: String::new(),
            price,
            currency: currency.to_string(),
            category: category.to_string(),
            is_available: true,
            stock_quantity: 10,
            images: Vec::new(),
            created_at: ts,
            updated_at: ts,
        };
        store.products = vec![
            product("p-margherita", "b-joes-pizza", "Margherita Pizza", 18.0, "USD", "food"),
            product("p-pepperoni", "b-prince-slice", "Pepperoni Pizza Slice", 4.5, "USD", "food"),
            product("p-laptop", "b-techstore", "Laptop Pro 14", 1500.0, "PEN", "computers"),
            product("p-mouse", "b-techstore", "Wireless Mouse", 45.0, "PEN", "accessories"),
        ];

        store
    }

    pub fn user_for_token(&self, token: &str) -> Option<&User> {
        let user_id = self.sessions.get(token)?;
        self.accounts
            .values()
            .map(|account| &account.user)
            .find(|user| &user.id == user_id)
    }

    pub fn business(&self, id: &str) -> Option<&Business> {
        self.businesses.iter().find(|b| b.id == id)
    }
}

/// Great-circle distance in meters.
pub fn haversine_meters(a: GeoLocation, b: GeoLocation) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let dlat = lat2 - lat1;
    let dlng = (b.longitude - a.longitude).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}
