//! Per-invocation callback context.
//!
//! # Design
//! A `CallbackContext` owns the host's callbacks for one invocation and is
//! consumed by value when the result is delivered, so the success or error
//! callback fires at most once by construction. If the context is dropped
//! without being completed (a panic unwound past it, or a worker closure was
//! discarded) its `Drop` delivers an internal error instead, so exactly one
//! callback always fires.
//!
//! The host side is abstracted by `Host`: the C bridge holds function
//! pointers plus `user_data`, the JNI bridge holds a `JavaVM` and global refs.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

use bizmap_core::ApiError;
use tracing::{error, warn};

use crate::payload::{IntoPayload, Payload, PayloadKind};

static LIVE_CONTEXTS: AtomicUsize = AtomicUsize::new(0);

/// Number of contexts created but not yet released.
pub fn live_contexts() -> usize {
    LIVE_CONTEXTS.load(Ordering::SeqCst)
}

/// Receiver of exactly one completion.
pub trait Host: Send + 'static {
    /// The success shape this host's success callback expects.
    fn accepts(&self) -> PayloadKind;

    fn success(&mut self, payload: Payload);

    fn failure(&mut self, error: &ApiError);
}

pub struct CallbackContext<H: Host> {
    operation: &'static str,
    host: Option<H>,
}

impl<H: Host> CallbackContext<H> {
    pub fn new(operation: &'static str, host: H) -> Self {
        LIVE_CONTEXTS.fetch_add(1, Ordering::SeqCst);
        Self {
            operation,
            host: Some(host),
        }
    }

    /// Marshal `result` and deliver it, consuming the context.
    pub fn complete<T: IntoPayload>(mut self, result: Result<T, ApiError>) {
        let Some(mut host) = self.host.take() else {
            return;
        };
        let operation = self.operation;

        let marshalled = catch_unwind(AssertUnwindSafe(|| result.and_then(IntoPayload::into_payload)))
            .unwrap_or_else(|_| {
                error!(operation, "panic while marshalling result");
                Err(ApiError::Internal("panic while marshalling result".to_string()))
            });
        let marshalled = match marshalled {
            Ok(payload) if payload.kind() != host.accepts() => {
                error!(operation, got = ?payload.kind(), want = ?host.accepts(), "result shape mismatch");
                Err(ApiError::Internal(format!("{operation}: unexpected result shape")))
            }
            other => other,
        };

        if let Err(err) = &marshalled {
            warn!(operation, status = err.status_code(), error = %err, "operation failed");
        }
        deliver(operation, &mut host, marshalled);
    }

    /// Deliver `error` without running the operation.
    pub fn fail(self, error: ApiError) {
        self.complete::<()>(Err(error));
    }
}

impl<H: Host> Drop for CallbackContext<H> {
    fn drop(&mut self) {
        if let Some(mut host) = self.host.take() {
            error!(operation = self.operation, "callback context dropped before completion");
            let err = ApiError::Internal(format!("{}: dropped before completion", self.operation));
            deliver(self.operation, &mut host, Err(err));
        }
        LIVE_CONTEXTS.fetch_sub(1, Ordering::SeqCst);
    }
}

fn deliver<H: Host>(operation: &'static str, host: &mut H, outcome: Result<Payload, ApiError>) {
    let delivered = catch_unwind(AssertUnwindSafe(|| match outcome {
        Ok(payload) => host.success(payload),
        Err(err) => host.failure(&err),
    }));
    if delivered.is_err() {
        error!(operation, "panic while invoking host callback");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Recorder {
        accepts: PayloadKind,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Host for Recorder {
        fn accepts(&self) -> PayloadKind {
            self.accepts
        }

        fn success(&mut self, payload: Payload) {
            self.log.lock().unwrap().push(format!("ok {payload:?}"));
        }

        fn failure(&mut self, error: &ApiError) {
            self.log.lock().unwrap().push(format!("err {}", error.status_code()));
        }
    }

    fn recorder(accepts: PayloadKind) -> (Recorder, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (
            Recorder {
                accepts,
                log: Arc::clone(&log),
            },
            log,
        )
    }

    struct Exploding;

    impl IntoPayload for Exploding {
        fn into_payload(self) -> Result<Payload, ApiError> {
            panic!("boom")
        }
    }

    #[test]
    fn success_fires_exactly_once() {
        let (host, log) = recorder(PayloadKind::Void);
        CallbackContext::new("logout", host).complete(Ok(()));
        assert_eq!(*log.lock().unwrap(), vec!["ok Void".to_string()]);
    }

    #[test]
    fn error_keeps_the_status() {
        let (host, log) = recorder(PayloadKind::Json);
        let err = ApiError::Http {
            status: 404,
            message: "nope".to_string(),
            code: None,
        };
        CallbackContext::new("get_business", host).complete::<Vec<bizmap_core::Business>>(Err(err));
        assert_eq!(*log.lock().unwrap(), vec!["err 404".to_string()]);
    }

    #[test]
    fn dropping_an_uncompleted_context_reports_internal() {
        let (host, log) = recorder(PayloadKind::Json);
        drop(CallbackContext::new("get_profile", host));
        assert_eq!(*log.lock().unwrap(), vec!["err -2".to_string()]);
    }

    #[test]
    fn marshalling_panic_becomes_internal_error() {
        let (host, log) = recorder(PayloadKind::Json);
        CallbackContext::new("search_products", host).complete(Ok(Exploding));
        assert_eq!(*log.lock().unwrap(), vec!["err -2".to_string()]);
    }

    #[test]
    fn shape_mismatch_is_internal() {
        let (host, log) = recorder(PayloadKind::Login);
        CallbackContext::new("logout", host).complete(Ok(()));
        assert_eq!(*log.lock().unwrap(), vec!["err -2".to_string()]);
    }

    #[test]
    fn fail_routes_to_the_error_callback() {
        let (host, log) = recorder(PayloadKind::Void);
        CallbackContext::new("register", host).fail(ApiError::InvalidArgument("username is null".into()));
        assert_eq!(*log.lock().unwrap(), vec!["err -1".to_string()]);
    }
}
