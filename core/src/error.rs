//! Error types for the BizMap API client.
//!
//! # Design
//! Every failure a caller can observe is an `ApiError`. Each variant maps to
//! a numeric status through `ApiError::status_code`, which is what crosses the
//! C boundary: real HTTP statuses for server errors, `0` for requests that
//! never reached the server, and small negative values for failures that
//! happen on the client side of the wire.

use thiserror::Error;

/// The request never reached the server.
pub const STATUS_TRANSPORT: i32 = 0;
/// A required argument was missing or a handle was unknown.
pub const STATUS_INVALID_ARGUMENT: i32 = -1;
/// A panic or other internal fault was caught while marshalling a result.
pub const STATUS_INTERNAL: i32 = -2;
/// A 2xx response body did not decode into the expected type.
pub const STATUS_DECODE: i32 = -3;
/// A request body could not be encoded.
pub const STATUS_ENCODE: i32 = -4;

/// Errors delivered to the error callback of every client operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    /// Connection, DNS, TLS, timeout or I/O failure before a response arrived.
    #[error("network error: {message}")]
    Transport { message: String },

    /// The server answered with a status outside `[200, 300)`.
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        code: Option<String>,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("internal error: {0}")]
    Internal(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl ApiError {
    /// Numeric status reported across the boundary.
    pub fn status_code(&self) -> i32 {
        match self {
            ApiError::Transport { .. } => STATUS_TRANSPORT,
            ApiError::Http { status, .. } => i32::from(*status),
            ApiError::InvalidArgument(_) => STATUS_INVALID_ARGUMENT,
            ApiError::Internal(_) => STATUS_INTERNAL,
            ApiError::Deserialization(_) => STATUS_DECODE,
            ApiError::Serialization(_) => STATUS_ENCODE,
        }
    }

    /// Human-readable message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            ApiError::Transport { message } | ApiError::Http { message, .. } => message,
            ApiError::InvalidArgument(msg)
            | ApiError::Internal(msg)
            | ApiError::Deserialization(msg)
            | ApiError::Serialization(msg) => msg,
        }
    }

    /// Machine-readable error code supplied by the server, if any.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            ApiError::Http { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport { .. })
    }
}

/// Failures reported by a `Transport` before any HTTP status was received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("could not connect to the server: {0}")]
    Connect(String),

    #[error("host not found: {0}")]
    HostNotFound(String),

    #[error("request timed out")]
    Timeout,

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("too many redirects")]
    TooManyRedirects,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("{0}")]
    Other(String),
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        ApiError::Transport {
            message: err.to_string(),
        }
    }
}
