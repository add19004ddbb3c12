//! `Host` backed by C function pointers and an opaque `user_data`.

use std::ffi::c_void;
use std::os::raw::c_int;

use bizmap_core::ApiError;
use tracing::debug;

use crate::context::Host;
use crate::payload::{Payload, PayloadKind};
use crate::types::{to_cstring, BizMapErrorCallback, BizMapJsonCallback, BizMapLoginCallback, BizMapVoidCallback};

#[derive(Clone, Copy)]
pub enum SuccessCallback {
    Login(BizMapLoginCallback),
    Void(BizMapVoidCallback),
    Json(BizMapJsonCallback),
}

impl SuccessCallback {
    fn kind(self) -> PayloadKind {
        match self {
            SuccessCallback::Login(_) => PayloadKind::Login,
            SuccessCallback::Void(_) => PayloadKind::Void,
            SuccessCallback::Json(_) => PayloadKind::Json,
        }
    }
}

/// The caller's callbacks and `user_data` for one invocation.
///
/// A null callback is skipped; the invocation still counts as delivered.
pub struct CallbackSink {
    on_success: SuccessCallback,
    on_error: BizMapErrorCallback,
    user_data: *mut c_void,
}

// Safety: the C caller guarantees `user_data` may be used from whichever
// thread completes the call, and keeps it alive until a callback has fired.
unsafe impl Send for CallbackSink {}

impl CallbackSink {
    pub fn new(on_success: SuccessCallback, on_error: BizMapErrorCallback, user_data: *mut c_void) -> Self {
        Self {
            on_success,
            on_error,
            user_data,
        }
    }

    pub fn login(on_success: BizMapLoginCallback, on_error: BizMapErrorCallback, user_data: *mut c_void) -> Self {
        Self::new(SuccessCallback::Login(on_success), on_error, user_data)
    }

    pub fn void(on_success: BizMapVoidCallback, on_error: BizMapErrorCallback, user_data: *mut c_void) -> Self {
        Self::new(SuccessCallback::Void(on_success), on_error, user_data)
    }

    pub fn json(on_success: BizMapJsonCallback, on_error: BizMapErrorCallback, user_data: *mut c_void) -> Self {
        Self::new(SuccessCallback::Json(on_success), on_error, user_data)
    }
}

impl Host for CallbackSink {
    fn accepts(&self) -> PayloadKind {
        self.on_success.kind()
    }

    fn success(&mut self, payload: Payload) {
        match (self.on_success, payload) {
            (
                SuccessCallback::Login(Some(cb)),
                Payload::Login {
                    access_token,
                    refresh_token,
                    expires_in,
                },
            ) => {
                let access_token = to_cstring(&access_token);
                let refresh_token = to_cstring(&refresh_token);
                unsafe { cb(self.user_data, access_token.as_ptr(), refresh_token.as_ptr(), expires_in as c_int) };
            }
            (SuccessCallback::Void(Some(cb)), Payload::Void) => unsafe { cb(self.user_data) },
            (SuccessCallback::Json(Some(cb)), Payload::Json(json)) => {
                let json = to_cstring(&json);
                unsafe { cb(self.user_data, json.as_ptr()) };
            }
            _ => debug!("no success callback registered"),
        }
    }

    fn failure(&mut self, error: &ApiError) {
        let Some(cb) = self.on_error else {
            debug!(status = error.status_code(), "no error callback registered");
            return;
        };
        let message = to_cstring(error.message());
        let code = error.error_code().map(to_cstring);
        let code_ptr = code.as_ref().map_or(std::ptr::null(), |c| c.as_ptr());
        unsafe { cb(self.user_data, error.status_code() as c_int, message.as_ptr(), code_ptr) };
    }
}
