//! Client core for the BizMap business and product discovery API.
//!
//! # Overview
//! `BizMapClient` exposes every backend operation as a call that completes by
//! invoking exactly one success or error callback. Requests are built as plain
//! `HttpRequest` values and executed through the `Transport` seam, so the
//! request layout, status routing and JSON decoding are testable without a
//! network.
//!
//! # Design
//! - `BizMapClient` holds the base URL and the bearer token; both can change
//!   while the client is shared between threads.
//! - Each operation is split into `build_*` (produces a request), a transport
//!   exchange, and a parser from `codec`.
//! - Host bindings pass sentinel-encoded numbers; `params` converts them into
//!   explicit `Option`s once, at the edge.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod http;
pub mod params;
pub mod transport;
pub mod types;

pub use client::BizMapClient;
pub use config::{ClientConfig, Dispatch};
pub use error::{ApiError, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use params::{BusinessSearchParams, ProductSearchParams};
pub use transport::UreqTransport;
pub use types::{
    AuthResponse, Business, GeoLocation, LoginRequest, Product, ProductWithBusiness, RegisterRequest,
    SearchHistoryEntry, User, UserRecommendations,
};

/// Library version reported through the bindings.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
