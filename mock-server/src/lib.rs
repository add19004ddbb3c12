//! In-memory stand-in for the BizMap REST backend, used by integration tests
//! and for local development against the bindings.

pub mod model;

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};

use model::{
    haversine_meters, new_id, now, Account, AuthResponse, Business, GeoLocation, LoginInput, Product,
    ProductWithBusiness, RegisterInput, SearchHistoryEntry, Store, User, UserRecommendations,
};

pub type Db = Arc<RwLock<Store>>;

const DEFAULT_LIMIT: usize = 20;
const TOKEN_TTL_SECS: i32 = 3600;

pub fn app() -> Router {
    app_with_store(Store::seeded())
}

pub fn app_with_store(store: Store) -> Router {
    let db: Db = Arc::new(RwLock::new(store));
    let api = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/logout", post(logout))
        .route("/auth/profile", get(profile))
        .route("/businesses/search", get(search_businesses))
        .route("/businesses/{id}", get(get_business))
        .route("/products/search", get(search_products))
        .route("/products/business/{id}", get(business_products))
        .route("/products/{id}", get(get_product))
        .route("/search/history", get(search_history).delete(clear_history))
        .route("/search/recommendations", get(recommendations));
    Router::new().nest("/api/v1", api).with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with_store(listener, Store::seeded()).await
}

pub async fn run_with_store(listener: TcpListener, store: Store) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "mock server listening");
    }
    axum::serve(listener, app_with_store(store)).await
}

/// Error body shared by every failing route: `{"error": .., "code": ..}`.
pub struct Failure {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl Failure {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "missing or invalid token")
    }

    fn not_found(what: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", format!("{what} not found"))
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        debug!(status = self.status.as_u16(), code = self.code, "request failed");
        (self.status, Json(json!({ "error": self.message, "code": self.code }))).into_response()
    }
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
}

fn authenticated(store: &Store, headers: &HeaderMap) -> Result<User, Failure> {
    bearer(headers)
        .and_then(|token| store.user_for_token(token))
        .cloned()
        .ok_or_else(Failure::unauthorized)
}

// --- auth ---

async fn login(State(db): State<Db>, Json(input): Json<LoginInput>) -> Result<Json<AuthResponse>, Failure> {
    let mut store = db.write().await;
    let user = match store.accounts.get(&input.username) {
        Some(account) if account.password == input.password => account.user.clone(),
        _ => {
            return Err(Failure::new(
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "invalid credentials",
            ))
        }
    };
    let access_token = new_id();
    store.sessions.insert(access_token.clone(), user.id.clone());
    info!(username = %user.username, "login");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token: new_id(),
        token_type: "Bearer".to_string(),
        expires_in: TOKEN_TTL_SECS,
        user,
    }))
}

async fn register(
    State(db): State<Db>,
    Json(input): Json<RegisterInput>,
) -> Result<(StatusCode, Json<User>), Failure> {
    if input.username.is_empty() || input.password.is_empty() || input.email.is_empty() {
        return Err(Failure::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "username, email and password are required",
        ));
    }
    let mut store = db.write().await;
    if store.accounts.contains_key(&input.username) {
        return Err(Failure::new(StatusCode::CONFLICT, "USERNAME_TAKEN", "username already taken"));
    }
    let ts = now();
    let user = User {
        id: new_id(),
        username: input.username.clone(),
        email: input.email,
        full_name: input.full_name,
        phone: input.phone.unwrap_or_default(),
        is_active: true,
        created_at: ts,
        updated_at: ts,
    };
    store.accounts.insert(
        input.username,
        Account {
            user: user.clone(),
            password: input.password,
        },
    );
    info!(username = %user.username, "registered");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn logout(State(db): State<Db>, headers: HeaderMap) -> Result<StatusCode, Failure> {
    let mut store = db.write().await;
    let token = bearer(&headers).ok_or_else(Failure::unauthorized)?;
    store
        .sessions
        .remove(token)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(Failure::unauthorized)
}

async fn profile(State(db): State<Db>, headers: HeaderMap) -> Result<Json<User>, Failure> {
    let store = db.read().await;
    authenticated(&store, &headers).map(Json)
}

// --- search ---

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub category: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl SearchQuery {
    fn origin(&self) -> Option<GeoLocation> {
        Some(GeoLocation {
            latitude: self.lat?,
            longitude: self.lng?,
        })
    }

    fn matches_text(&self, fields: &[&str]) -> bool {
        let needle = self.q.trim().to_lowercase();
        needle.is_empty() || fields.iter().any(|f| f.to_lowercase().contains(&needle))
    }

    fn matches_category(&self, category: &str) -> bool {
        match self.category.as_deref() {
            None | Some("") => true,
            Some(wanted) => wanted.eq_ignore_ascii_case(category),
        }
    }

    /// Distance from the query origin, or `Err(())` when outside the radius.
    fn distance_to(&self, location: GeoLocation) -> Result<Option<f64>, ()> {
        let Some(origin) = self.origin() else {
            return Ok(None);
        };
        let distance = haversine_meters(origin, location);
        match self.radius {
            Some(radius) if radius > 0.0 && distance > radius => Err(()),
            _ => Ok(Some(distance)),
        }
    }

    fn page<T>(&self, mut items: Vec<T>) -> Vec<T> {
        let limit = self.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIMIT);
        let offset = self.offset.unwrap_or(0).min(items.len());
        items.drain(..offset);
        items.truncate(limit);
        items
    }
}

fn by_distance(a: Option<f64>, b: Option<f64>) -> std::cmp::Ordering {
    a.unwrap_or(0.0).total_cmp(&b.unwrap_or(0.0))
}

async fn search_businesses(State(db): State<Db>, Query(query): Query<SearchQuery>) -> Json<Vec<Business>> {
    let store = db.read().await;
    let mut hits: Vec<Business> = store
        .businesses
        .iter()
        .filter(|b| b.is_active && query.matches_category(&b.category))
        .filter(|b| query.matches_text(&[&b.name, &b.description, &b.category]))
        .filter_map(|b| {
            let distance = query.distance_to(b.location).ok()?;
            let mut hit = b.clone();
            hit.distance_meters = distance;
            Some(hit)
        })
        .collect();
    hits.sort_by(|a, b| by_distance(a.distance_meters, b.distance_meters));
    debug!(q = %query.q, hits = hits.len(), "business search");
    Json(query.page(hits))
}

async fn get_business(State(db): State<Db>, Path(id): Path<String>) -> Result<Json<Business>, Failure> {
    let store = db.read().await;
    store.business(&id).cloned().map(Json).ok_or_else(|| Failure::not_found("business"))
}

/// Authentication is optional here; a valid token records the search in the
/// caller's history.
async fn search_products(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> Json<Vec<ProductWithBusiness>> {
    let mut store = db.write().await;
    let mut hits: Vec<ProductWithBusiness> = store
        .products
        .iter()
        .filter(|p| p.is_available && query.matches_category(&p.category))
        .filter(|p| query.matches_text(&[&p.name, &p.description, &p.category]))
        .filter(|p| query.min_price.is_none_or(|min| p.price >= min))
        .filter(|p| query.max_price.is_none_or(|max| p.price <= max))
        .filter_map(|p| {
            let business = store.business(&p.business_id)?;
            let distance = query.distance_to(business.location).ok()?;
            Some(ProductWithBusiness {
                product: p.clone(),
                business: business.clone(),
                distance_meters: distance,
            })
        })
        .collect();
    hits.sort_by(|a, b| by_distance(a.distance_meters, b.distance_meters));

    let user_id = bearer(&headers)
        .and_then(|token| store.user_for_token(token))
        .map(|user| user.id.clone());
    if let Some(user_id) = user_id {
        let entry = SearchHistoryEntry {
            id: new_id(),
            user_id,
            query: query.q.clone(),
            category: query.category.clone().unwrap_or_default(),
            location: query.origin().unwrap_or_default(),
            created_at: now(),
        };
        store.history.push(entry);
    }
    debug!(q = %query.q, hits = hits.len(), "product search");
    Json(query.page(hits))
}

async fn get_product(State(db): State<Db>, Path(id): Path<String>) -> Result<Json<Product>, Failure> {
    let store = db.read().await;
    store
        .products
        .iter()
        .find(|p| p.id == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| Failure::not_found("product"))
}

async fn business_products(State(db): State<Db>, Path(id): Path<String>) -> Result<Json<Vec<Product>>, Failure> {
    let store = db.read().await;
    if store.business(&id).is_none() {
        return Err(Failure::not_found("business"));
    }
    let products = store.products.iter().filter(|p| p.business_id == id).cloned().collect();
    Ok(Json(products))
}

// --- history ---

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

async fn search_history(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<SearchHistoryEntry>>, Failure> {
    let store = db.read().await;
    let user = authenticated(&store, &headers)?;
    let limit = query.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIMIT);
    let entries = store
        .history
        .iter()
        .rev()
        .filter(|e| e.user_id == user.id)
        .take(limit)
        .cloned()
        .collect();
    Ok(Json(entries))
}

async fn clear_history(State(db): State<Db>, headers: HeaderMap) -> Result<StatusCode, Failure> {
    let mut store = db.write().await;
    let user = authenticated(&store, &headers)?;
    store.history.retain(|e| e.user_id != user.id);
    Ok(StatusCode::NO_CONTENT)
}

async fn recommendations(State(db): State<Db>, headers: HeaderMap) -> Result<Json<UserRecommendations>, Failure> {
    let store = db.read().await;
    let user = authenticated(&store, &headers)?;
    let mine: Vec<&SearchHistoryEntry> = store.history.iter().filter(|e| e.user_id == user.id).collect();
    Ok(Json(UserRecommendations {
        popular_searches: most_frequent(mine.iter().map(|e| e.query.as_str())),
        popular_categories: most_frequent(mine.iter().map(|e| e.category.as_str())),
    }))
}

/// Distinct non-empty values, most frequent first, ties by first appearance.
fn most_frequent<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for value in values.filter(|v| !v.is_empty()) {
        match index.get(value) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(value, counts.len());
                counts.push((value, 1));
            }
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(5).map(|(v, _)| v.to_string()).collect()
}
