//! Search parameters and their query-string encoding.
//!
//! # Design
//! Host bindings pass plain numbers with sentinel values ("0,0 means no
//! location", "-1 means no price bound"). `from_raw` turns those sentinels
//! into `Option`s once, at the edge, so the rest of the client only ever sees
//! explicit presence. Rust callers can build the structs directly and express
//! any coordinate, including `(0, 0)`.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::form_urlencoded;

use crate::types::GeoLocation;

pub const DEFAULT_LIMIT: i32 = 20;

/// Clamp `limit`/`offset` the way every search endpoint expects.
pub fn normalize_page(limit: i32, offset: i32) -> (i32, i32) {
    let limit = if limit > 0 { limit } else { DEFAULT_LIMIT };
    let offset = offset.max(0);
    (limit, offset)
}

/// `(0, 0)` is the "no location" sentinel used by the C and JNI bindings.
pub fn location_from_raw(latitude: f64, longitude: f64) -> Option<GeoLocation> {
    if latitude == 0.0 && longitude == 0.0 {
        None
    } else {
        Some(GeoLocation::new(latitude, longitude))
    }
}

fn radius_from_raw(radius_meters: i32) -> Option<i32> {
    (radius_meters > 0).then_some(radius_meters)
}

fn price_from_raw(price: f64) -> Option<f64> {
    (price >= 0.0).then_some(price)
}

fn category_from_raw(category: Option<&str>) -> Option<String> {
    category.filter(|c| !c.is_empty()).map(str::to_string)
}

#[derive(Debug, Clone, PartialEq)]
pub struct BusinessSearchParams {
    pub query: String,
    pub category: Option<String>,
    pub location: Option<GeoLocation>,
    pub radius_meters: Option<i32>,
    pub limit: i32,
    pub offset: i32,
}

impl BusinessSearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            category: None,
            location: None,
            radius_meters: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }

    /// Build from sentinel-encoded host arguments.
    pub fn from_raw(
        query: &str,
        latitude: f64,
        longitude: f64,
        radius_meters: i32,
        category: Option<&str>,
        limit: i32,
        offset: i32,
    ) -> Self {
        let (limit, offset) = normalize_page(limit, offset);
        Self {
            query: query.to_string(),
            category: category_from_raw(category),
            location: location_from_raw(latitude, longitude),
            radius_meters: radius_from_raw(radius_meters),
            limit,
            offset,
        }
    }

    pub fn query_string(&self) -> String {
        let mut qs = form_urlencoded::Serializer::new(String::new());
        qs.append_pair("q", &self.query);
        append_location(&mut qs, self.location, self.radius_meters);
        if let Some(category) = &self.category {
            qs.append_pair("category", category);
        }
        append_page(&mut qs, self.limit, self.offset);
        qs.finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductSearchParams {
    pub query: String,
    pub category: Option<String>,
    pub location: Option<GeoLocation>,
    pub radius_meters: Option<i32>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub limit: i32,
    pub offset: i32,
}

impl ProductSearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            category: None,
            location: None,
            radius_meters: None,
            min_price: None,
            max_price: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }

    /// Build from sentinel-encoded host arguments.
    #[allow(clippy::too_many_arguments)]
    pub fn from_raw(
        query: &str,
        latitude: f64,
        longitude: f64,
        radius_meters: i32,
        min_price: f64,
        max_price: f64,
        category: Option<&str>,
        limit: i32,
        offset: i32,
    ) -> Self {
        let (limit, offset) = normalize_page(limit, offset);
        Self {
            query: query.to_string(),
            category: category_from_raw(category),
            location: location_from_raw(latitude, longitude),
            radius_meters: radius_from_raw(radius_meters),
            min_price: price_from_raw(min_price),
            max_price: price_from_raw(max_price),
            limit,
            offset,
        }
    }

    pub fn query_string(&self) -> String {
        let mut qs = form_urlencoded::Serializer::new(String::new());
        qs.append_pair("q", &self.query);
        append_location(&mut qs, self.location, self.radius_meters);
        if let Some(min) = self.min_price {
            qs.append_pair("min_price", &min.to_string());
        }
        if let Some(max) = self.max_price {
            qs.append_pair("max_price", &max.to_string());
        }
        if let Some(category) = &self.category {
            qs.append_pair("category", category);
        }
        append_page(&mut qs, self.limit, self.offset);
        qs.finish()
    }
}

// A radius without a centre is meaningless, so it only follows a location.
fn append_location(
    qs: &mut form_urlencoded::Serializer<'_, String>,
    location: Option<GeoLocation>,
    radius_meters: Option<i32>,
) {
    let Some(location) = location else {
        return;
    };
    qs.append_pair("lat", &location.latitude.to_string());
    qs.append_pair("lng", &location.longitude.to_string());
    if let Some(radius) = radius_meters {
        qs.append_pair("radius", &radius.to_string());
    }
}

fn append_page(qs: &mut form_urlencoded::Serializer<'_, String>, limit: i32, offset: i32) {
    let (limit, offset) = normalize_page(limit, offset);
    qs.append_pair("limit", &limit.to_string());
    qs.append_pair("offset", &offset.to_string());
}

/// Everything except RFC 3986 unreserved characters.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// Percent-encode a single path segment such as a business id.
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}
