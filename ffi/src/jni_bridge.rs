//! JNI entry points for the Kotlin class `com.aisoldev.bizmap.BizMapClient`.
//!
//! # Design
//! Kotlin passes lambdas (`kotlin.jvm.functions.FunctionN`) as callbacks. They
//! are pinned with global refs inside a `JniHost`, which also keeps the
//! `JavaVM` so a completion running on a worker thread can attach itself
//! (permanently, so reused threads attach once). Every host value is created
//! inside a local frame that is popped before the callback returns, and a Java
//! exception thrown by a callback is described and cleared rather than left
//! pending on a native thread.
//!
//! Kotlin hands `""` for an absent category; empty categories already mean
//! "all categories" on the Rust side.

use bizmap_core::{ApiError, BusinessSearchParams, ClientConfig, ProductSearchParams, RegisterRequest};
use jni::errors::Result as JniResult;
use jni::objects::{GlobalRef, JObject, JString, JValue};
use jni::sys::{jdouble, jint, jlong};
use jni::{JNIEnv, JavaVM};
use tracing::error;

use crate::context::Host;
use crate::payload::{Payload, PayloadKind};
use crate::types::BizMapClientHandle;
use crate::{begin, create_client, destroy_client, guarded, registry};

const INVOKE_0: &str = "()Ljava/lang/Object;";
const INVOKE_1: &str = "(Ljava/lang/Object;)Ljava/lang/Object;";
const INVOKE_2: &str = "(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;";
const INVOKE_3: &str = "(Ljava/lang/Object;Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;";

/// Local refs created per delivery: at most three arguments plus the result.
const FRAME_CAPACITY: i32 = 8;

pub struct JniHost {
    vm: JavaVM,
    on_success: GlobalRef,
    on_error: GlobalRef,
    accepts: PayloadKind,
}

impl JniHost {
    fn new(env: &mut JNIEnv, on_success: &JObject, on_error: &JObject, accepts: PayloadKind) -> JniResult<Self> {
        Ok(Self {
            vm: env.get_java_vm()?,
            on_success: env.new_global_ref(on_success)?,
            on_error: env.new_global_ref(on_error)?,
            accepts,
        })
    }

    fn with_env<F>(&self, what: &'static str, f: F)
    where
        F: FnOnce(&mut JNIEnv) -> JniResult<()>,
    {
        let mut env = match self.vm.attach_current_thread_permanently() {
            Ok(env) => env,
            Err(err) => {
                error!(error = %err, what, "could not attach thread to the JVM");
                return;
            }
        };
        if let Err(err) = env.with_local_frame(FRAME_CAPACITY, f) {
            error!(error = %err, what, "host callback failed");
            clear_exception(&mut env);
        }
    }
}

fn clear_exception(env: &mut JNIEnv) {
    if env.exception_check().unwrap_or(false) {
        let _ = env.exception_describe();
        let _ = env.exception_clear();
    }
}

/// `invoke` signature matching the arity of each success shape.
fn success_signature(kind: PayloadKind) -> &'static str {
    match kind {
        PayloadKind::Login => INVOKE_3,
        PayloadKind::Void => INVOKE_0,
        PayloadKind::Json => INVOKE_1,
    }
}

/// `(status, message)` as handed to `onError`.
fn error_args(error: &ApiError) -> (i32, String) {
    (error.status_code(), error.message().to_string())
}

fn invoke_error(env: &mut JNIEnv, callback: &JObject, status: i32, message: String) -> JniResult<()> {
    let status = boxed_int(env, status)?;
    let message = env.new_string(message)?;
    env.call_method(
        callback,
        "invoke",
        INVOKE_2,
        &[JValue::Object(&status), JValue::Object(&message)],
    )?;
    Ok(())
}

fn boxed_int<'local>(env: &mut JNIEnv<'local>, value: i32) -> JniResult<JObject<'local>> {
    env.call_static_method("java/lang/Integer", "valueOf", "(I)Ljava/lang/Integer;", &[JValue::Int(value)])?
        .l()
}

impl Host for JniHost {
    fn accepts(&self) -> PayloadKind {
        self.accepts
    }

    fn success(&mut self, payload: Payload) {
        let callback = self.on_success.as_obj();
        self.with_env("success", |env| {
            match payload {
                Payload::Login {
                    access_token,
                    refresh_token,
                    expires_in,
                } => {
                    let access_token = env.new_string(access_token)?;
                    let refresh_token = env.new_string(refresh_token)?;
                    let expires_in = boxed_int(env, expires_in)?;
                    env.call_method(
                        callback,
                        "invoke",
                        success_signature(PayloadKind::Login),
                        &[
                            JValue::Object(&access_token),
                            JValue::Object(&refresh_token),
                            JValue::Object(&expires_in),
                        ],
                    )?;
                }
                Payload::Void => {
                    env.call_method(callback, "invoke", success_signature(PayloadKind::Void), &[])?;
                }
                Payload::Json(json) => {
                    let json = env.new_string(json)?;
                    let signature = success_signature(PayloadKind::Json);
                    env.call_method(callback, "invoke", signature, &[JValue::Object(&json)])?;
                }
            }
            Ok(())
        });
    }

    fn failure(&mut self, error: &ApiError) {
        let callback = self.on_error.as_obj();
        let (status, message) = error_args(error);
        self.with_env("failure", |env| invoke_error(env, callback, status, message));
    }
}

/// `None` for a null reference or an unreadable string.
fn java_string(env: &mut JNIEnv, value: &JString) -> Option<String> {
    if value.is_null() {
        return None;
    }
    env.get_string(value).ok().map(String::from)
}

fn required(env: &mut JNIEnv, value: &JString, name: &str) -> Result<String, ApiError> {
    java_string(env, value).ok_or_else(|| ApiError::InvalidArgument(format!("{name} is null")))
}

/// Pin the callbacks. When the JVM refuses, `onError` is invoked directly
/// through the caller's local reference with an internal error.
fn host(env: &mut JNIEnv, on_success: &JObject, on_error: &JObject, accepts: PayloadKind) -> Option<JniHost> {
    match JniHost::new(env, on_success, on_error, accepts) {
        Ok(host) => Some(host),
        Err(err) => {
            error!(error = %err, "could not pin host callbacks");
            clear_exception(env);
            let (status, message) = error_args(&ApiError::Internal(format!("could not pin host callbacks: {err}")));
            if let Err(err) = env.with_local_frame(FRAME_CAPACITY, |env| invoke_error(env, on_error, status, message)) {
                error!(error = %err, "could not report callback pinning failure");
                clear_exception(env);
            }
            None
        }
    }
}

fn handle_of(handle: jlong) -> BizMapClientHandle {
    handle as BizMapClientHandle
}

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_aisoldev_bizmap_BizMapClient_nativeCreateClient<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    base_url: JString<'local>,
) -> jlong {
    guarded("jni_create_client", 0, || {
        let base_url = java_string(&mut env, &base_url);
        create_client(base_url.as_deref(), ClientConfig::from_env()) as jlong
    })
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_aisoldev_bizmap_BizMapClient_nativeDestroyClient<'local>(
    _env: JNIEnv<'local>,
    _this: JObject<'local>,
    handle: jlong,
) {
    guarded("jni_destroy_client", (), || destroy_client(handle_of(handle)))
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_aisoldev_bizmap_BizMapClient_nativeSetAuthToken<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    handle: jlong,
    token: JString<'local>,
) {
    guarded("jni_set_auth_token", (), || {
        let (Some(client), Some(token)) = (registry::get(handle_of(handle)), java_string(&mut env, &token)) else {
            error!(handle, "set_auth_token ignored: unknown handle or null token");
            return;
        };
        client.set_auth_token(&token);
    })
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_aisoldev_bizmap_BizMapClient_nativeClearAuthToken<'local>(
    _env: JNIEnv<'local>,
    _this: JObject<'local>,
    handle: jlong,
) {
    guarded("jni_clear_auth_token", (), || match registry::get(handle_of(handle)) {
        Some(client) => client.clear_auth_token(),
        None => error!(handle, "clear_auth_token ignored: unknown handle"),
    })
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// `onSuccess: (String, String, Int) -> Unit`, `onError: (Int, String) -> Unit`.
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_aisoldev_bizmap_BizMapClient_nativeLogin<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    handle: jlong,
    username: JString<'local>,
    password: JString<'local>,
    on_success: JObject<'local>,
    on_error: JObject<'local>,
) {
    guarded("jni_login", (), || {
        let Some(host) = host(&mut env, &on_success, &on_error, PayloadKind::Login) else {
            return;
        };
        let ctx = begin("login", handle_of(handle), host);
        let client = or_fail!(ctx, registry::lookup(handle_of(handle)));
        let username = or_fail!(ctx, required(&mut env, &username, "username"));
        let password = or_fail!(ctx, required(&mut env, &password, "password"));
        client.login_then(&username, &password, move |result| ctx.complete(result));
    })
}

/// `onSuccess: () -> Unit`, `onError: (Int, String) -> Unit`.
#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub extern "system" fn Java_com_aisoldev_bizmap_BizMapClient_nativeRegister<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    handle: jlong,
    username: JString<'local>,
    email: JString<'local>,
    password: JString<'local>,
    full_name: JString<'local>,
    on_success: JObject<'local>,
    on_error: JObject<'local>,
) {
    guarded("jni_register", (), || {
        let Some(host) = host(&mut env, &on_success, &on_error, PayloadKind::Void) else {
            return;
        };
        let ctx = begin("register", handle_of(handle), host);
        let client = or_fail!(ctx, registry::lookup(handle_of(handle)));
        let input = RegisterRequest {
            username: or_fail!(ctx, required(&mut env, &username, "username")),
            email: or_fail!(ctx, required(&mut env, &email, "email")),
            password: or_fail!(ctx, required(&mut env, &password, "password")),
            full_name: or_fail!(ctx, required(&mut env, &full_name, "full_name")),
            phone: None,
        };
        client.register_then(&input, move |result| ctx.complete(result));
    })
}

/// `onSuccess: (String) -> Unit` receives a JSON array of product hits.
#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub extern "system" fn Java_com_aisoldev_bizmap_BizMapClient_nativeSearchProducts<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    handle: jlong,
    query: JString<'local>,
    latitude: jdouble,
    longitude: jdouble,
    radius_meters: jint,
    min_price: jdouble,
    max_price: jdouble,
    category: JString<'local>,
    limit: jint,
    offset: jint,
    on_success: JObject<'local>,
    on_error: JObject<'local>,
) {
    guarded("jni_search_products", (), || {
        let Some(host) = host(&mut env, &on_success, &on_error, PayloadKind::Json) else {
            return;
        };
        let ctx = begin("search_products", handle_of(handle), host);
        let client = or_fail!(ctx, registry::lookup(handle_of(handle)));
        let query = or_fail!(ctx, required(&mut env, &query, "query"));
        let category = java_string(&mut env, &category);
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

/// `onSuccess: (String) -> Unit` receives a JSON array of businesses.
#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub extern "system" fn Java_com_aisoldev_bizmap_BizMapClient_nativeSearchBusinesses<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    handle: jlong,
    query: JString<'local>,
    latitude: jdouble,
    longitude: jdouble,
    radius_meters: jint,
    category: JString<'local>,
    limit: jint,
    offset: jint,
    on_success: JObject<'local>,
    on_error: JObject<'local>,
) {
    guarded("jni_search_businesses", (), || {
        let Some(host) = host(&mut env, &on_success, &on_error, PayloadKind::Json) else {
            return;
        };
        let ctx = begin("search_businesses", handle_of(handle), host);
        let client = or_fail!(ctx, registry::lookup(handle_of(handle)));
        let query = or_fail!(ctx, required(&mut env, &query, "query"));
        let category = java_string(&mut env, &category);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_signatures_match_callback_arity() {
        assert_eq!(success_signature(PayloadKind::Void), "()Ljava/lang/Object;");
        assert_eq!(success_signature(PayloadKind::Json), "(Ljava/lang/Object;)Ljava/lang/Object;");
        assert_eq!(
            success_signature(PayloadKind::Login),
            "(Ljava/lang/Object;Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;"
        );
    }

    #[test]
    fn error_args_carry_status_and_bare_message() {
        let http = ApiError::Http {
            status: 409,
            message: "username already taken".to_string(),
            code: Some("USERNAME_TAKEN".to_string()),
        };
        assert_eq!(error_args(&http), (409, "username already taken".to_string()));
        let pinned = ApiError::Internal("could not pin host callbacks".to_string());
        assert_eq!(error_args(&pinned), (-2, "could not pin host callbacks".to_string()));
        let missing = ApiError::InvalidArgument("username is null".to_string());
        assert_eq!(error_args(&missing).0, -1);
    }

    #[test]
    fn handles_round_trip_through_jlong() {
        assert_eq!(handle_of(42), 42);
        assert_eq!(handle_of(0), 0);
    }
}
