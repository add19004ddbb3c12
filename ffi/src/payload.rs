//! Boundary-neutral shapes of a successful result.
//!
//! Both the C and the JNI bridge deliver one of three success shapes: the
//! login triple, nothing, or a JSON document. Converting a typed result into a
//! `Payload` is the only step that can fail after the exchange (JSON encoding),
//! so it happens before any host callback is chosen.

use bizmap_core::codec;
use bizmap_core::{
    ApiError, AuthResponse, Business, Product, ProductWithBusiness, SearchHistoryEntry, User,
    UserRecommendations,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Login {
        access_token: String,
        refresh_token: String,
        expires_in: i32,
    },
    Void,
    Json(String),
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Login { .. } => PayloadKind::Login,
            Payload::Void => PayloadKind::Void,
            Payload::Json(_) => PayloadKind::Json,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Login,
    Void,
    Json,
}

pub trait IntoPayload {
    fn into_payload(self) -> Result<Payload, ApiError>;
}

impl IntoPayload for AuthResponse {
    fn into_payload(self) -> Result<Payload, ApiError> {
        Ok(Payload::Login {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_in: self.expires_in,
        })
    }
}

impl IntoPayload for () {
    fn into_payload(self) -> Result<Payload, ApiError> {
        Ok(Payload::Void)
    }
}

macro_rules! json_payload {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoPayload for $ty {
                fn into_payload(self) -> Result<Payload, ApiError> {
                    codec::encode(&self).map(Payload::Json)
                }
            }
        )*
    };
}

json_payload!(
    User,
    Business,
    Vec<Business>,
    Product,
    Vec<Product>,
    Vec<ProductWithBusiness>,
    Vec<SearchHistoryEntry>,
    UserRecommendations,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_becomes_the_token_triple() {
        let auth = AuthResponse {
            access_token: "T".to_string(),
            refresh_token: "R".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: 3600,
            user: None,
        };
        assert_eq!(
            auth.into_payload().unwrap(),
            Payload::Login {
                access_token: "T".to_string(),
                refresh_token: "R".to_string(),
                expires_in: 3600,
            }
        );
    }

    #[test]
    fn lists_become_json_arrays() {
        let payload = Vec::<Business>::new().into_payload().unwrap();
        assert_eq!(payload, Payload::Json("[]".to_string()));
        assert_eq!(payload.kind(), PayloadKind::Json);
    }

    #[test]
    fn product_json_keeps_defaults() {
        let Payload::Json(json) = Product::default().into_payload().unwrap() else {
            panic!("expected json");
        };
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["currency"], "PEN");
        assert_eq!(value["is_available"], true);
    }

    #[test]
    fn unit_is_void() {
        assert_eq!(().into_payload().unwrap().kind(), PayloadKind::Void);
    }
}
