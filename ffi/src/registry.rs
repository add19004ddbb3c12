//! Handle registry mapping opaque `u64` handles to live clients.
//!
//! # Design
//! Hosts never see a pointer: a handle is looked up under a short-lived lock
//! and the `Arc` is cloned out before any I/O, so destroying a handle while a
//! background call is in flight only drops the registry's reference. Unknown,
//! zero and already-destroyed handles are reported, never dereferenced.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use bizmap_core::{ApiError, BizMapClient};

use crate::types::BizMapClientHandle;

static CLIENTS: LazyLock<Mutex<HashMap<BizMapClientHandle, Arc<BizMapClient>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

fn clients() -> MutexGuard<'static, HashMap<BizMapClientHandle, Arc<BizMapClient>>> {
    CLIENTS.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn insert(client: BizMapClient) -> BizMapClientHandle {
    let handle = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
    clients().insert(handle, Arc::new(client));
    handle
}

pub fn get(handle: BizMapClientHandle) -> Option<Arc<BizMapClient>> {
    clients().get(&handle).cloned()
}

/// Like [`get`], with the miss reported as `InvalidArgument`.
pub fn lookup(handle: BizMapClientHandle) -> Result<Arc<BizMapClient>, ApiError> {
    get(handle).ok_or_else(|| ApiError::InvalidArgument(format!("unknown client handle {handle}")))
}

pub fn remove(handle: BizMapClientHandle) -> Option<Arc<BizMapClient>> {
    clients().remove(&handle)
}
