//! Client configuration.

use std::env;
use std::time::Duration;

use tracing::warn;
use url::Url;

use crate::error::ApiError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const API_PREFIX: &str = "/api/v1";

/// Where an operation's completion callback runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dispatch {
    /// The HTTP exchange and the callback run on the calling thread before
    /// the operation returns.
    #[default]
    Inline,
    /// The exchange and the callback run on a fresh worker thread; the
    /// operation returns as soon as the thread is spawned.
    Background,
}

impl Dispatch {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "inline" => Some(Dispatch::Inline),
            "background" => Some(Dispatch::Background),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
    pub dispatch: Dispatch,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: concat!("bizmap-core/", env!("CARGO_PKG_VERSION")).to_string(),
            dispatch: Dispatch::Inline,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `BIZMAP_BASE_URL`, `BIZMAP_TIMEOUT_SECS` and
    /// `BIZMAP_DISPATCH`. A timeout of 0 keeps the default; unparseable
    /// values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// `from_env` over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup("BIZMAP_BASE_URL") {
            config.base_url = url;
        }
        if let Some(raw) = lookup("BIZMAP_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(0) => {}
                Ok(secs) => config.timeout = Duration::from_secs(secs),
                Err(err) => warn!(value = %raw, error = %err, "ignoring BIZMAP_TIMEOUT_SECS"),
            }
        }
        if let Some(raw) = lookup("BIZMAP_DISPATCH") {
            match Dispatch::parse(&raw) {
                Some(dispatch) => config.dispatch = dispatch,
                None => warn!(value = %raw, "ignoring BIZMAP_DISPATCH, expected inline or background"),
            }
        }
        config
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Validate an http(s) base URL and strip trailing slashes.
pub fn normalize_base_url(base_url: &str) -> Result<String, ApiError> {
    let trimmed = base_url.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed)
        .map_err(|e| ApiError::InvalidArgument(format!("base_url {trimmed:?}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(trimmed.to_string()),
        scheme => Err(ApiError::InvalidArgument(format!(
            "base_url {trimmed:?}: unsupported scheme {scheme:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_stripped() {
        assert_eq!(
            normalize_base_url("http://localhost:8080/").unwrap(),
            "http://localhost:8080"
        );
    }

    #[test]
    fn non_http_schemes_are_rejected() {
        assert!(normalize_base_url("ftp://example.com").is_err());
        assert!(normalize_base_url("not a url").is_err());
        assert!(normalize_base_url("").is_err());
    }

    #[test]
    fn https_with_path_prefix_is_kept() {
        assert_eq!(
            normalize_base_url("https://api.example.com/bizmap/").unwrap(),
            "https://api.example.com/bizmap"
        );
    }

    #[test]
    fn dispatch_parses_case_insensitively() {
        assert_eq!(Dispatch::parse("Background"), Some(Dispatch::Background));
        assert_eq!(Dispatch::parse(" inline "), Some(Dispatch::Inline));
        assert_eq!(Dispatch::parse("later"), None);
    }

    #[test]
    fn defaults_match_the_reference_backend() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.dispatch, Dispatch::Inline);
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: std::collections::HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = ClientConfig::from_lookup(vars(&[
            ("BIZMAP_BASE_URL", "http://10.0.2.2:8080"),
            ("BIZMAP_TIMEOUT_SECS", "5"),
            ("BIZMAP_DISPATCH", "background"),
        ]));
        assert_eq!(config.base_url, "http://10.0.2.2:8080");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.dispatch, Dispatch::Background);
    }

    #[test]
    fn zero_timeout_keeps_the_default() {
        let config = ClientConfig::from_lookup(vars(&[("BIZMAP_TIMEOUT_SECS", "0")]));
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn unparseable_values_are_ignored() {
        let config = ClientConfig::from_lookup(vars(&[
            ("BIZMAP_TIMEOUT_SECS", "soon"),
            ("BIZMAP_DISPATCH", "later"),
        ]));
        assert_eq!(config, ClientConfig::default());
    }
}
