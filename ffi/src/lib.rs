//! C-ABI bridge around `bizmap-core`.
//!
//! # Overview
//! Exposes every BizMap client operation through `extern "C"` functions that
//! take primitive and string arguments plus an `on_success` callback, an
//! `on_error` callback and an opaque `user_data`. Mobile hosts (Swift through
//! the generated header, Kotlin through the optional `jni` feature) drive the
//! client without touching Rust types.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Clients live in a handle registry; hosts hold a `u64`, never a pointer.
//! - Each invocation owns one `CallbackContext`, consumed when the result is
//!   delivered. Exactly one of `on_success` / `on_error` fires per call, also
//!   for a null argument or an unknown handle (`status_code = -1`).
//! - Structured results cross as JSON text. Strings passed to callbacks are
//!   borrowed for the duration of the callback only.

/// Unwrap an argument or deliver its error through the context and return.
macro_rules! or_fail {
    ($ctx:ident, $value:expr) => {
        match $value {
            Ok(value) => value,
            Err(err) => return $ctx.fail(err),
        }
    };
}

pub mod callbacks;
pub mod context;
pub mod logging;
pub mod payload;
pub mod registry;
pub mod types;

#[cfg(feature = "jni")]
pub mod jni_bridge;

use std::ffi::{c_void, CStr};
use std::os::raw::{c_char, c_int};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use bizmap_core::{
    BizMapClient, BusinessSearchParams, ClientConfig, Dispatch, ProductSearchParams, RegisterRequest,
};
use tracing::{debug, error, info, warn};

use callbacks::CallbackSink;
use context::{CallbackContext, Host};
use types::*;

/// Run an entry point body, logging a panic instead of unwinding into the host.
pub(crate) fn guarded<R>(operation: &'static str, fallback: R, body: impl FnOnce() -> R) -> R {
    catch_unwind(AssertUnwindSafe(body)).unwrap_or_else(|_| {
        error!(operation, "panic caught at the C boundary");
        fallback
    })
}

/// Open the context for one invocation of `operation` on `handle`.
pub(crate) fn begin<H: Host>(operation: &'static str, handle: BizMapClientHandle, host: H) -> CallbackContext<H> {
    debug!(operation, handle, "invoke");
    CallbackContext::new(operation, host)
}

/// Register a client built from `config`, with `base_url` overriding the
/// configured one. Returns 0 if the URL is rejected.
pub(crate) fn create_client(base_url: Option<&str>, mut config: ClientConfig) -> BizMapClientHandle {
    if let Some(url) = base_url {
        config.base_url = url.to_string();
    }
    match BizMapClient::with_config(config) {
        Ok(client) => {
            let handle = registry::insert(client);
            info!(handle, "client created");
            handle
        }
        Err(err) => {
            warn!(error = %err, "client creation failed");
            0
        }
    }
}

pub(crate) fn destroy_client(handle: BizMapClientHandle) {
    if handle == 0 {
        return;
    }
    match registry::remove(handle) {
        Some(_) => info!(handle, "client destroyed"),
        None => warn!(handle, "destroy of unknown client handle"),
    }
}

// ---------------------------------------------------------------------------
// Library
// ---------------------------------------------------------------------------

static VERSION: &CStr = match CStr::from_bytes_with_nul(concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes()) {
    Ok(version) => version,
    Err(_) => c"unknown",
};

/// Library version, e.g. `"1.0.0"`. Static; never free it.
#[unsafe(no_mangle)]
pub extern "C" fn bizmap_get_version() -> *const c_char {
    VERSION.as_ptr()
}

/// Install a `tracing` subscriber writing to stderr.
///
/// `filter` uses `RUST_LOG` syntax and may be null for the default. Returns 1
/// if installed, 0 if a subscriber already existed or the filter is invalid.
#[unsafe(no_mangle)]
pub extern "C" fn bizmap_init_logging(filter: *const c_char) -> c_int {
    guarded("init_logging", 0, || {
        let filter = unsafe { opt_str(filter) };
        c_int::from(logging::init(filter.as_deref()))
    })
}

/// Number of callback contexts not yet released. Diagnostic only.
#[unsafe(no_mangle)]
pub extern "C" fn bizmap_live_callback_contexts() -> usize {
    context::live_contexts()
}

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Create a client bound to `base_url` (null means the default,
/// `http://localhost:8080` unless `BIZMAP_BASE_URL` is set).
///
/// Returns 0 if the URL is not a valid http(s) URL or an internal panic
/// occurs. Release the handle with `bizmap_destroy_client`.
#[unsafe(no_mangle)]
pub extern "C" fn bizmap_create_client(base_url: *const c_char) -> BizMapClientHandle {
    guarded("create_client", 0, || {
        let base_url = unsafe { opt_str(base_url) };
        create_client(base_url.as_deref(), ClientConfig::from_env())
    })
}

/// Like `bizmap_create_client`, with an explicit transport timeout (0 keeps
/// the default of 30 s) and dispatch mode (`BIZMAP_DISPATCH_INLINE` or
/// `BIZMAP_DISPATCH_BACKGROUND`).
#[unsafe(no_mangle)]
pub extern "C" fn bizmap_create_client_with_config(
    base_url: *const c_char,
    timeout_secs: u32,
    dispatch: c_int,
) -> BizMapClientHandle {
    guarded("create_client_with_config", 0, || {
        let base_url = unsafe { opt_str(base_url) };
        let mut config = ClientConfig::from_env();
        if timeout_secs > 0 {
            config = config.with_timeout(Duration::from_secs(u64::from(timeout_secs)));
        }
        config = match dispatch {
            BIZMAP_DISPATCH_INLINE => config.with_dispatch(Dispatch::Inline),
            BIZMAP_DISPATCH_BACKGROUND => config.with_dispatch(Dispatch::Background),
            other => {
                warn!(dispatch = other, "unknown dispatch mode");
                return 0;
            }
        };
        create_client(base_url.as_deref(), config)
    })
}

/// Release a client. 0 and unknown handles are ignored. Calls already in
/// flight on a background thread still complete.
#[unsafe(no_mangle)]
pub extern "C" fn bizmap_destroy_client(handle: BizMapClientHandle) {
    guarded("destroy_client", (), || destroy_client(handle))
}

/// Returns 0 on success, -1 for an unknown handle or an invalid URL.
#[unsafe(no_mangle)]
pub extern "C" fn bizmap_set_base_url(handle: BizMapClientHandle, base_url: *const c_char) -> c_int {
    guarded("set_base_url", -1, || {
        let result = registry::lookup(handle).and_then(|client| {
            let url = unsafe { required_str(base_url, "base_url") }?;
            client.set_base_url(&url)
        });
        match result {
            Ok(()) => 0,
            Err(err) => {
                warn!(handle, error = %err, "set_base_url rejected");
                err.status_code()
            }
        }
    })
}

/// Returns 0 on success, -1 for an unknown handle or a null token.
#[unsafe(no_mangle)]
pub extern "C" fn bizmap_set_auth_token(handle: BizMapClientHandle, token: *const c_char) -> c_int {
    guarded("set_auth_token", -1, || {
        let result = registry::lookup(handle).and_then(|client| {
            let token = unsafe { required_str(token, "token") }?;
            client.set_auth_token(&token);
            Ok(())
        });
        result.map_or_else(|err| err.status_code(), |()| 0)
    })
}

/// Returns 0 on success, -1 for an unknown handle.
#[unsafe(no_mangle)]
pub extern "C" fn bizmap_clear_auth_token(handle: BizMapClientHandle) -> c_int {
    guarded("clear_auth_token", -1, || match registry::lookup(handle) {
        Ok(client) => {
            client.clear_auth_token();
            0
        }
        Err(err) => err.status_code(),
    })
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// On success the access token is also stored on the client.
#[unsafe(no_mangle)]
pub extern "C" fn bizmap_login(
    handle: BizMapClientHandle,
    username: *const c_char,
    password: *const c_char,
    on_success: BizMapLoginCallback,
    on_error: BizMapErrorCallback,
    user_data: *mut c_void,
) {
    guarded("login", (), || {
        let ctx = begin("login", handle, CallbackSink::login(on_success, on_error, user_data));
        let client = or_fail!(ctx, registry::lookup(handle));
        let username = or_fail!(ctx, unsafe { required_str(username, "username") });
        let password = or_fail!(ctx, unsafe { required_str(password, "password") });
        client.login_then(&username, &password, move |result| ctx.complete(result));
    })
}

/// `phone` may be null.
#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn bizmap_register(
    handle: BizMapClientHandle,
    username: *const c_char,
    email: *const c_char,
    password: *const c_char,
    full_name: *const c_char,
    phone: *const c_char,
    on_success: BizMapVoidCallback,
    on_error: BizMapErrorCallback,
    user_data: *mut c_void,
) {
    guarded("register", (), || {
        let ctx = begin("register", handle, CallbackSink::void(on_success, on_error, user_data));
        let client = or_fail!(ctx, registry::lookup(handle));
        let input = RegisterRequest {
            username: or_fail!(ctx, unsafe { required_str(username, "username") }).into_owned(),
            email: or_fail!(ctx, unsafe { required_str(email, "email") }).into_owned(),
            password: or_fail!(ctx, unsafe { required_str(password, "password") }).into_owned(),
            full_name: or_fail!(ctx, unsafe { required_str(full_name, "full_name") }).into_owned(),
            phone: unsafe { opt_str(phone) }.map(|p| p.into_owned()),
        };
        client.register_then(&input, move |result| ctx.complete(result));
    })
}

/// On success the client's token is cleared.
#[unsafe(no_mangle)]
pub extern "C" fn bizmap_logout(
    handle: BizMapClientHandle,
    on_success: BizMapVoidCallback,
    on_error: BizMapErrorCallback,
    user_data: *mut c_void,
) {
    guarded("logout", (), || {
        let ctx = begin("logout", handle, CallbackSink::void(on_success, on_error, user_data));
        let client = or_fail!(ctx, registry::lookup(handle));
        client.logout_then(move |result| ctx.complete(result));
    })
}

/// Delivers the user as a JSON object.
#[unsafe(no_mangle)]
pub extern "C" fn bizmap_get_profile(
    handle: BizMapClientHandle,
    on_success: BizMapJsonCallback,
    on_error: BizMapErrorCallback,
    user_data: *mut c_void,
) {
    guarded("get_profile", (), || {
        let ctx = begin("get_profile", handle, CallbackSink::json(on_success, on_error, user_data));
        let client = or_fail!(ctx, registry::lookup(handle));
        client.get_profile_then(move |result| ctx.complete(result));
    })
}

// ---------------------------------------------------------------------------
// Businesses
// ---------------------------------------------------------------------------

/// `latitude = longitude = 0` means no location filter, `radius_meters <= 0`
/// no radius, a null or empty `category` all categories, `limit <= 0` the
/// default of 20 and `offset < 0` zero. Delivers a JSON array of businesses.
#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn bizmap_search_businesses(
    handle: BizMapClientHandle,
    query: *const c_char,
    latitude: f64,
    longitude: f64,
    radius_meters: c_int,
    category: *const c_char,
    limit: c_int,
    offset: c_int,
    on_success: BizMapJsonCallback,
    on_error: BizMapErrorCallback,
    user_data: *mut c_void,
) {
    guarded("search_businesses", (), || {
        let ctx = begin("search_businesses", handle, CallbackSink::json(on_success, on_error, user_data));
        let client = or_fail!(ctx, registry::lookup(handle));
        let query = or_fail!(ctx, unsafe { required_str(query, "query") });
        let category = unsafe { opt_str(category) };
        let params = BusinessSearchParams::from_raw(
            &query,
            latitude,
            longitude,
            radius_meters,
            category.as_deref(),
            limit,
            offset,
        );
        client.search_businesses_then(&params, move |result| ctx.complete(result));
    })
}

/// Delivers the business as a JSON object.
#[unsafe(no_mangle)]
pub extern "C" fn bizmap_get_business(
    handle: BizMapClientHandle,
    business_id: *const c_char,
    on_success: BizMapJsonCallback,
    on_error: BizMapErrorCallback,
    user_data: *mut c_void,
) {
    guarded("get_business", (), || {
        let ctx = begin("get_business", handle, CallbackSink::json(on_success, on_error, user_data));
        let client = or_fail!(ctx, registry::lookup(handle));
        let business_id = or_fail!(ctx, unsafe { required_str(business_id, "business_id") });
        client.get_business_then(&business_id, move |result| ctx.complete(result));
    })
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

/// Same sentinels as `bizmap_search_businesses`; a negative `min_price` or
/// `max_price` means no bound. Sends the auth token when one is set.
/// Delivers a JSON array of `{product, business, distance_meters}`.
#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn bizmap_search_products(
    handle: BizMapClientHandle,
    query: *const c_char,
    latitude: f64,
    longitude: f64,
    radius_meters: c_int,
    min_price: f64,
    max_price: f64,
    category: *const c_char,
    limit: c_int,
    offset: c_int,
    on_success: BizMapJsonCallback,
    on_error: BizMapErrorCallback,
    user_data: *mut c_void,
) {
    guarded("search_products", (), || {
        let ctx = begin("search_products", handle, CallbackSink::json(on_success, on_error, user_data));
        let client = or_fail!(ctx, registry::lookup(handle));
        let query = or_fail!(ctx, unsafe { required_str(query, "query") });
        let category = unsafe { opt_str(category) };
        let params = ProductSearchParams::from_raw(
            &query,
            latitude,
            longitude,
            radius_meters,
            min_price,
            max_price,
            category.as_deref(),
            limit,
            offset,
        );
        client.search_products_then(&params, move |result| ctx.complete(result));
    })
}

/// Delivers the product as a JSON object.
#[unsafe(no_mangle)]
pub extern "C" fn bizmap_get_product(
    handle: BizMapClientHandle,
    product_id: *const c_char,
    on_success: BizMapJsonCallback,
    on_error: BizMapErrorCallback,
    user_data: *mut c_void,
) {
    guarded("get_product", (), || {
        let ctx = begin("get_product", handle, CallbackSink::json(on_success, on_error, user_data));
        let client = or_fail!(ctx, registry::lookup(handle));
        let product_id = or_fail!(ctx, unsafe { required_str(product_id, "product_id") });
        client.get_product_then(&product_id, move |result| ctx.complete(result));
    })
}

/// Delivers a JSON array of the business's products.
#[unsafe(no_mangle)]
pub extern "C" fn bizmap_get_business_products(
    handle: BizMapClientHandle,
    business_id: *const c_char,
    on_success: BizMapJsonCallback,
    on_error: BizMapErrorCallback,
    user_data: *mut c_void,
) {
    guarded("get_business_products", (), || {
        let ctx = begin("get_business_products", handle, CallbackSink::json(on_success, on_error, user_data));
        let client = or_fail!(ctx, registry::lookup(handle));
        let business_id = or_fail!(ctx, unsafe { required_str(business_id, "business_id") });
        client.get_business_products_then(&business_id, move |result| ctx.complete(result));
    })
}

// ---------------------------------------------------------------------------
// History and recommendations
// ---------------------------------------------------------------------------

/// `limit <= 0` means 20. Delivers a JSON array of history entries.
#[unsafe(no_mangle)]
pub extern "C" fn bizmap_get_search_history(
    handle: BizMapClientHandle,
    limit: c_int,
    on_success: BizMapJsonCallback,
    on_error: BizMapErrorCallback,
    user_data: *mut c_void,
) {
    guarded("get_search_history", (), || {
        let ctx = begin("get_search_history", handle, CallbackSink::json(on_success, on_error, user_data));
        let client = or_fail!(ctx, registry::lookup(handle));
        client.get_search_history_then(limit, move |result| ctx.complete(result));
    })
}

/// Delivers `{popular_searches, popular_categories}`.
#[unsafe(no_mangle)]
pub extern "C" fn bizmap_get_recommendations(
    handle: BizMapClientHandle,
    on_success: BizMapJsonCallback,
    on_error: BizMapErrorCallback,
    user_data: *mut c_void,
) {
    guarded("get_recommendations", (), || {
        let ctx = begin("get_recommendations", handle, CallbackSink::json(on_success, on_error, user_data));
        let client = or_fail!(ctx, registry::lookup(handle));
        client.get_recommendations_then(move |result| ctx.complete(result));
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn bizmap_clear_search_history(
    handle: BizMapClientHandle,
    on_success: BizMapVoidCallback,
    on_error: BizMapErrorCallback,
    user_data: *mut c_void,
) {
    guarded("clear_search_history", (), || {
        let ctx = begin("clear_search_history", handle, CallbackSink::void(on_success, on_error, user_data));
        let client = or_fail!(ctx, registry::lookup(handle));
        client.clear_search_history_then(move |result| ctx.complete(result));
    })
}
