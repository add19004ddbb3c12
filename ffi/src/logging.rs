//! On-demand `tracing` subscriber for hosts that want library logs.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "bizmap_core=info,bizmap_ffi=info";

/// Install a global fmt subscriber. `filter` overrides `RUST_LOG`, which
/// overrides [`DEFAULT_FILTER`]. Returns `false` if a subscriber was already
/// installed or the filter did not parse.
pub fn init(filter: Option<&str>) -> bool {
    let filter = match filter {
        Some(directives) => match EnvFilter::try_new(directives) {
            Ok(filter) => filter,
            Err(_) => return false,
        },
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init()
        .is_ok()
}
