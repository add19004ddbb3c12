//! Callback-style client for the BizMap REST API.
//!
//! # Design
//! Every operation is split in three steps:
//! - `build_*` turns typed parameters into an `HttpRequest` (pure, no I/O);
//! - the configured `Transport` executes it;
//! - a parser from `codec` maps the `(status, body)` pair into `T` or
//!   `ApiError`.
//!
//! Operations come in two shapes. `op_then(.., complete)` delivers a single
//! `Result` to one `FnOnce`, which lets a caller move exactly one owned
//! context into exactly one closure. `op(.., on_success, on_error)` is the
//! two-callback form built on top of it. Either way exactly one callback runs,
//! exactly once, inline or on a worker thread depending on `Dispatch`.
//!
//! The auth token and base URL are interior-mutable so a shared client can be
//! reconfigured; a request snapshots both when it is built.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread;

use tracing::{debug, info, warn};

use crate::codec;
use crate::config::{normalize_base_url, ClientConfig, Dispatch, API_PREFIX};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::params::{encode_segment, normalize_page, BusinessSearchParams, ProductSearchParams};
use crate::transport::UreqTransport;
use crate::types::{
    AuthResponse, Business, LoginRequest, Product, ProductWithBusiness, RegisterRequest,
    SearchHistoryEntry, User, UserRecommendations,
};

/// How an endpoint uses the bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    None,
    /// Always sends `Authorization`, even when no token is set.
    Required,
    /// Sends `Authorization` only when a token is set.
    Optional,
}

pub struct BizMapClient {
    base_url: RwLock<String>,
    token: Arc<RwLock<Option<String>>>,
    transport: Arc<dyn Transport>,
    dispatch: Dispatch,
}

impl std::fmt::Debug for BizMapClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BizMapClient")
            .field("base_url", &self.base_url())
            .field("has_token", &self.auth_token().is_some())
            .field("dispatch", &self.dispatch)
            .finish()
    }
}

impl BizMapClient {
    /// Client with default configuration and the `ureq` transport.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_config(ClientConfig::new(base_url))
    }

    pub fn with_config(config: ClientConfig) -> Result<Self, ApiError> {
        let transport = Arc::new(UreqTransport::new(config.timeout, config.user_agent.clone()));
        Self::with_transport(config, transport)
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self, ApiError> {
        let base_url = normalize_base_url(&config.base_url)?;
        info!(base_url = %base_url, dispatch = ?config.dispatch, "client created");
        Ok(Self {
            base_url: RwLock::new(base_url),
            token: Arc::new(RwLock::new(None)),
            transport,
            dispatch: config.dispatch,
        })
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    pub fn base_url(&self) -> String {
        self.base_url.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_base_url(&self, base_url: &str) -> Result<(), ApiError> {
        let normalized = normalize_base_url(base_url)?;
        info!(base_url = %normalized, "base url changed");
        *self.base_url.write().unwrap_or_else(PoisonError::into_inner) = normalized;
        Ok(())
    }

    pub fn set_auth_token(&self, token: &str) {
        store_token(&self.token, Some(token.to_string()));
    }

    pub fn clear_auth_token(&self) {
        store_token(&self.token, None);
    }

    pub fn auth_token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn dispatch(&self) -> Dispatch {
        self.dispatch
    }

    // -----------------------------------------------------------------------
    // Request builders
    // -----------------------------------------------------------------------

    fn request(&self, method: HttpMethod, path: &str, auth: Auth, body: Option<String>) -> HttpRequest {
        let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        let token = self.auth_token();
        match (auth, token) {
            (Auth::Required, token) => {
                headers.push(("Authorization".to_string(), bearer(token.as_deref().unwrap_or(""))));
            }
            (Auth::Optional, Some(token)) => {
                headers.push(("Authorization".to_string(), bearer(&token)));
            }
            (Auth::Optional, None) | (Auth::None, _) => {}
        }
        HttpRequest {
            method,
            url: format!("{}{API_PREFIX}{path}", self.base_url()),
            headers,
            body,
        }
    }

    pub fn build_login(&self, input: &LoginRequest) -> Result<HttpRequest, ApiError> {
        let body = codec::encode(input)?;
        Ok(self.request(HttpMethod::Post, "/auth/login", Auth::None, Some(body)))
    }

    pub fn build_register(&self, input: &RegisterRequest) -> Result<HttpRequest, ApiError> {
        let mut input = input.clone();
        input.phone = input.phone.filter(|p| !p.is_empty());
        let body = codec::encode(&input)?;
        Ok(self.request(HttpMethod::Post, "/auth/register", Auth::None, Some(body)))
    }

    pub fn build_logout(&self) -> HttpRequest {
        self.request(HttpMethod::Post, "/auth/logout", Auth::Required, Some("{}".to_string()))
    }

    pub fn build_get_profile(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "/auth/profile", Auth::Required, None)
    }

    pub fn build_search_businesses(&self, params: &BusinessSearchParams) -> HttpRequest {
        let path = format!("/businesses/search?{}", params.query_string());
        self.request(HttpMethod::Get, &path, Auth::None, None)
    }

    pub fn build_get_business(&self, business_id: &str) -> HttpRequest {
        let path = format!("/businesses/{}", encode_segment(business_id));
        self.request(HttpMethod::Get, &path, Auth::None, None)
    }

    pub fn build_search_products(&self, params: &ProductSearchParams) -> HttpRequest {
        let path = format!("/products/search?{}", params.query_string());
        self.request(HttpMethod::Get, &path, Auth::Optional, None)
    }

    pub fn build_get_product(&self, product_id: &str) -> HttpRequest {
        let path = format!("/products/{}", encode_segment(product_id));
        self.request(HttpMethod::Get, &path, Auth::None, None)
    }

    pub fn build_get_business_products(&self, business_id: &str) -> HttpRequest {
        let path = format!("/products/business/{}", encode_segment(business_id));
        self.request(HttpMethod::Get, &path, Auth::None, None)
    }

    pub fn build_get_search_history(&self, limit: i32) -> HttpRequest {
        let (limit, _) = normalize_page(limit, 0);
        let path = format!("/search/history?limit={limit}");
        self.request(HttpMethod::Get, &path, Auth::Required, None)
    }

    pub fn build_get_recommendations(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "/search/recommendations", Auth::Required, None)
    }

    pub fn build_clear_search_history(&self) -> HttpRequest {
        self.request(HttpMethod::Delete, "/search/history", Auth::Required, None)
    }

    // -----------------------------------------------------------------------
    // Auth
    // -----------------------------------------------------------------------

    /// On success the access token becomes the client's auth token.
    pub fn login_then<F>(&self, username: &str, password: &str, complete: F)
    where
        F: FnOnce(Result<AuthResponse, ApiError>) + Send + 'static,
    {
        let input = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let token = Arc::clone(&self.token);
        self.execute(self.build_login(&input), codec::parse_json, move |result: Result<AuthResponse, ApiError>| {
            if let Ok(auth) = &result {
                store_token(&token, Some(auth.access_token.clone()));
            }
            complete(result);
        });
    }

    pub fn login<S, E>(&self, username: &str, password: &str, on_success: S, on_error: E)
    where
        S: FnOnce(AuthResponse) + Send + 'static,
        E: FnOnce(ApiError) + Send + 'static,
    {
        self.login_then(username, password, split(on_success, on_error));
    }

    pub fn register_then<F>(&self, input: &RegisterRequest, complete: F)
    where
        F: FnOnce(Result<(), ApiError>) + Send + 'static,
    {
        self.execute(self.build_register(input), codec::parse_empty, complete);
    }

    pub fn register<S, E>(&self, input: &RegisterRequest, on_success: S, on_error: E)
    where
        S: FnOnce(()) + Send + 'static,
        E: FnOnce(ApiError) + Send + 'static,
    {
        self.register_then(input, split(on_success, on_error));
    }

    /// On success the client's auth token is cleared.
    pub fn logout_then<F>(&self, complete: F)
    where
        F: FnOnce(Result<(), ApiError>) + Send + 'static,
    {
        let token = Arc::clone(&self.token);
        self.execute(Ok(self.build_logout()), codec::parse_empty, move |result: Result<(), ApiError>| {
            if result.is_ok() {
                store_token(&token, None);
            }
            complete(result);
        });
    }

    pub fn logout<S, E>(&self, on_success: S, on_error: E)
    where
        S: FnOnce(()) + Send + 'static,
        E: FnOnce(ApiError) + Send + 'static,
    {
        self.logout_then(split(on_success, on_error));
    }

    pub fn get_profile_then<F>(&self, complete: F)
    where
        F: FnOnce(Result<User, ApiError>) + Send + 'static,
    {
        self.execute(Ok(self.build_get_profile()), codec::parse_json, complete);
    }

    pub fn get_profile<S, E>(&self, on_success: S, on_error: E)
    where
        S: FnOnce(User) + Send + 'static,
        E: FnOnce(ApiError) + Send + 'static,
    {
        self.get_profile_then(split(on_success, on_error));
    }

    // -----------------------------------------------------------------------
    // Businesses
    // -----------------------------------------------------------------------

    pub fn search_businesses_then<F>(&self, params: &BusinessSearchParams, complete: F)
    where
        F: FnOnce(Result<Vec<Business>, ApiError>) + Send + 'static,
    {
        self.execute(Ok(self.build_search_businesses(params)), codec::parse_json, complete);
    }

    pub fn search_businesses<S, E>(&self, params: &BusinessSearchParams, on_success: S, on_error: E)
    where
        S: FnOnce(Vec<Business>) + Send + 'static,
        E: FnOnce(ApiError) + Send + 'static,
    {
        self.search_businesses_then(params, split(on_success, on_error));
    }

    pub fn get_business_then<F>(&self, business_id: &str, complete: F)
    where
        F: FnOnce(Result<Business, ApiError>) + Send + 'static,
    {
        self.execute(Ok(self.build_get_business(business_id)), codec::parse_json, complete);
    }

    pub fn get_business<S, E>(&self, business_id: &str, on_success: S, on_error: E)
    where
        S: FnOnce(Business) + Send + 'static,
        E: FnOnce(ApiError) + Send + 'static,
    {
        self.get_business_then(business_id, split(on_success, on_error));
    }

    // -----------------------------------------------------------------------
    // Products
    // -----------------------------------------------------------------------

    pub fn search_products_then<F>(&self, params: &ProductSearchParams, complete: F)
    where
        F: FnOnce(Result<Vec<ProductWithBusiness>, ApiError>) + Send + 'static,
    {
        self.execute(Ok(self.build_search_products(params)), codec::parse_json, complete);
    }

    pub fn search_products<S, E>(&self, params: &ProductSearchParams, on_success: S, on_error: E)
    where
        S: FnOnce(Vec<ProductWithBusiness>) + Send + 'static,
        E: FnOnce(ApiError) + Send + 'static,
    {
        self.search_products_then(params, split(on_success, on_error));
    }

    pub fn get_product_then<F>(&self, product_id: &str, complete: F)
    where
        F: FnOnce(Result<Product, ApiError>) + Send + 'static,
    {
        self.execute(Ok(self.build_get_product(product_id)), codec::parse_json, complete);
    }

    pub fn get_product<S, E>(&self, product_id: &str, on_success: S, on_error: E)
    where
        S: FnOnce(Product) + Send + 'static,
        E: FnOnce(ApiError) + Send + 'static,
    {
        self.get_product_then(product_id, split(on_success, on_error));
    }

    pub fn get_business_products_then<F>(&self, business_id: &str, complete: F)
    where
        F: FnOnce(Result<Vec<Product>, ApiError>) + Send + 'static,
    {
        self.execute(Ok(self.build_get_business_products(business_id)), codec::parse_json, complete);
    }

    pub fn get_business_products<S, E>(&self, business_id: &str, on_success: S, on_error: E)
    where
        S: FnOnce(Vec<Product>) + Send + 'static,
        E: FnOnce(ApiError) + Send + 'static,
    {
        self.get_business_products_then(business_id, split(on_success, on_error));
    }

    // -----------------------------------------------------------------------
    // History and recommendations
    // -----------------------------------------------------------------------

    pub fn get_search_history_then<F>(&self, limit: i32, complete: F)
    where
        F: FnOnce(Result<Vec<SearchHistoryEntry>, ApiError>) + Send + 'static,
    {
        self.execute(Ok(self.build_get_search_history(limit)), codec::parse_json, complete);
    }

    pub fn get_search_history<S, E>(&self, limit: i32, on_success: S, on_error: E)
    where
        S: FnOnce(Vec<SearchHistoryEntry>) + Send + 'static,
        E: FnOnce(ApiError) + Send + 'static,
    {
        self.get_search_history_then(limit, split(on_success, on_error));
    }

    pub fn get_recommendations_then<F>(&self, complete: F)
    where
        F: FnOnce(Result<UserRecommendations, ApiError>) + Send + 'static,
    {
        self.execute(Ok(self.build_get_recommendations()), codec::parse_json, complete);
    }

    pub fn get_recommendations<S, E>(&self, on_success: S, on_error: E)
    where
        S: FnOnce(UserRecommendations) + Send + 'static,
        E: FnOnce(ApiError) + Send + 'static,
    {
        self.get_recommendations_then(split(on_success, on_error));
    }

    pub fn clear_search_history_then<F>(&self, complete: F)
    where
        F: FnOnce(Result<(), ApiError>) + Send + 'static,
    {
        self.execute(Ok(self.build_clear_search_history()), codec::parse_empty, complete);
    }

    pub fn clear_search_history<S, E>(&self, on_success: S, on_error: E)
    where
        S: FnOnce(()) + Send + 'static,
        E: FnOnce(ApiError) + Send + 'static,
    {
        self.clear_search_history_then(split(on_success, on_error));
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    fn execute<T, P, F>(&self, request: Result<HttpRequest, ApiError>, parse: P, complete: F)
    where
        T: Send + 'static,
        P: FnOnce(HttpResponse) -> Result<T, ApiError> + Send + 'static,
        F: FnOnce(Result<T, ApiError>) + Send + 'static,
    {
        let request = match request {
            Ok(request) => request,
            Err(err) => {
                warn!(error = %err, "request could not be built");
                complete(Err(err));
                return;
            }
        };

        let transport = Arc::clone(&self.transport);
        let job = move || {
            let result = exchange(transport.as_ref(), &request).and_then(parse);
            complete(result);
        };

        match self.dispatch {
            Dispatch::Inline => job(),
            Dispatch::Background => spawn_or_run(job),
        }
    }
}

fn exchange(transport: &dyn Transport, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
    debug!(method = request.method.as_str(), url = %request.url, "sending request");
    let response = transport.execute(request)?;
    if !response.is_success() {
        debug!(status = response.status, url = %request.url, "server returned an error status");
    }
    Ok(response)
}

/// Run `job` on a worker thread, or inline if no thread can be spawned, so
/// the completion still fires exactly once.
fn spawn_or_run<J>(job: J)
where
    J: FnOnce() + Send + 'static,
{
    let slot = Arc::new(Mutex::new(Some(job)));
    let worker_slot = Arc::clone(&slot);
    let spawned = thread::Builder::new()
        .name("bizmap-request".to_string())
        .spawn(move || run_once(&worker_slot));
    if let Err(err) = spawned {
        warn!(error = %err, "could not spawn request thread, running inline");
        run_once(&slot);
    }
}

fn run_once<J: FnOnce()>(slot: &Mutex<Option<J>>) {
    let job = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(job) = job {
        job();
    }
}

fn split<T, S, E>(on_success: S, on_error: E) -> impl FnOnce(Result<T, ApiError>) + Send + 'static
where
    S: FnOnce(T) + Send + 'static,
    E: FnOnce(ApiError) + Send + 'static,
{
    move |result| match result {
        Ok(value) => on_success(value),
        Err(err) => on_error(err),
    }
}

fn store_token(slot: &RwLock<Option<String>>, token: Option<String>) {
    debug!(present = token.is_some(), "auth token updated");
    *slot.write().unwrap_or_else(PoisonError::into_inner) = token;
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}
