//! C-compatible types for the FFI boundary.
//!
//! # Design
//! Callbacks are nullable C function pointers (`Option<extern "C" fn>`), each
//! taking the caller's opaque `user_data` as the first argument. Strings handed
//! to callbacks are borrowed for the duration of the call only. Conversion
//! helpers between C strings and Rust strings live here to keep `lib.rs`
//! focused on the `extern "C"` surface.

use std::borrow::Cow;
use std::ffi::{c_void, CStr, CString};
use std::os::raw::{c_char, c_int};

use bizmap_core::ApiError;

/// Opaque client handle. `0` never names a live client.
pub type BizMapClientHandle = u64;

/// `(user_data, access_token, refresh_token, expires_in)`
pub type BizMapLoginCallback = Option<
    unsafe extern "C" fn(
        user_data: *mut c_void,
        access_token: *const c_char,
        refresh_token: *const c_char,
        expires_in: c_int,
    ),
>;

/// `(user_data)` for operations without a result value.
pub type BizMapVoidCallback = Option<unsafe extern "C" fn(user_data: *mut c_void)>;

/// `(user_data, json)` for operations returning structured data.
pub type BizMapJsonCallback = Option<unsafe extern "C" fn(user_data: *mut c_void, json: *const c_char)>;

/// `(user_data, status_code, message, error_code)`. `error_code` is null when
/// the server supplied none.
pub type BizMapErrorCallback = Option<
    unsafe extern "C" fn(
        user_data: *mut c_void,
        status_code: c_int,
        message: *const c_char,
        error_code: *const c_char,
    ),
>;

/// Completion runs on the calling thread before the entry point returns.
pub const BIZMAP_DISPATCH_INLINE: c_int = 0;
/// Completion runs on a worker thread.
pub const BIZMAP_DISPATCH_BACKGROUND: c_int = 1;

/// Borrow a nullable C string. Invalid UTF-8 is replaced, not rejected.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that outlives `'a`.
pub(crate) unsafe fn opt_str<'a>(ptr: *const c_char) -> Option<Cow<'a, str>> {
    if ptr.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy())
    }
}

/// A required string argument; null becomes `InvalidArgument`.
///
/// # Safety
/// Same contract as [`opt_str`].
pub(crate) unsafe fn required_str<'a>(ptr: *const c_char, name: &str) -> Result<Cow<'a, str>, ApiError> {
    unsafe { opt_str(ptr) }.ok_or_else(|| ApiError::InvalidArgument(format!("{name} is null")))
}

/// Build a `CString`, dropping interior NULs rather than failing.
pub(crate) fn to_cstring(value: &str) -> CString {
    CString::new(value).unwrap_or_else(|_| {
        let cleaned: Vec<u8> = value.bytes().filter(|b| *b != 0).collect();
        CString::new(cleaned).unwrap_or_default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_pointer_is_none() {
        assert!(unsafe { opt_str(std::ptr::null()) }.is_none());
    }

    #[test]
    fn required_null_names_the_argument() {
        let err = unsafe { required_str(std::ptr::null(), "query") }.unwrap_err();
        assert_eq!(err.status_code(), -1);
        assert_eq!(err.message(), "query is null");
    }

    #[test]
    fn borrowed_string_round_trips() {
        let owned = CString::new("café").unwrap();
        assert_eq!(unsafe { opt_str(owned.as_ptr()) }.as_deref(), Some("café"));
    }

    #[test]
    fn interior_nul_is_stripped() {
        assert_eq!(to_cstring("a\0b").to_str().unwrap(), "ab");
        assert_eq!(to_cstring("plain").to_str().unwrap(), "plain");
    }
}
