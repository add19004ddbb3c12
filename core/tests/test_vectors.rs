//! Verify client operations against JSON test vectors stored in `test-vectors/`.
//!
//! Each vector describes an operation, its inputs, the request the client must
//! produce, a simulated server response, and the expected result or error.
//! A replaying transport captures the request and returns the simulated
//! response, so the whole build, exchange and parse path runs for each case.
//! Comparing parsed JSON (not raw strings) avoids false negatives from
//! field-ordering differences.

use std::fmt::Debug;
use std::sync::{mpsc, Arc, Mutex};

use bizmap_core::{
    ApiError, AuthResponse, BizMapClient, Business, BusinessSearchParams, ClientConfig, HttpMethod,
    HttpRequest, HttpResponse, Product, ProductSearchParams, ProductWithBusiness, RegisterRequest,
    SearchHistoryEntry, Transport, TransportError, User, UserRecommendations,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

const BASE_URL: &str = "http://localhost:8080";

struct ReplayTransport {
    status: u16,
    body: String,
    captured: Mutex<Option<HttpRequest>>,
}

impl Transport for ReplayTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        *self.captured.lock().unwrap() = Some(request.clone());
        Ok(HttpResponse {
            status: self.status,
            headers: Vec::new(),
            body: self.body.clone(),
        })
    }
}

/// Parse the method string from test vectors into `HttpMethod`.
fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

fn str_field<'a>(input: &'a Value, key: &str) -> &'a str {
    input[key].as_str().unwrap()
}

fn num_field(input: &Value, key: &str) -> f64 {
    input[key].as_f64().unwrap()
}

fn int_field(input: &Value, key: &str) -> i32 {
    input[key].as_i64().unwrap() as i32
}

/// Run `op` with a completion that stores its result, then compare the
/// outcome against the case's `expected_result` or `expected_error`.
fn check<T, F>(name: &str, case: &Value, op: F)
where
    T: DeserializeOwned + PartialEq + Debug + Send + 'static,
    F: FnOnce(Box<dyn FnOnce(Result<T, ApiError>) + Send>),
{
    let (tx, rx) = mpsc::channel();
    op(Box::new(move |result| tx.send(result).unwrap()));
    let result = rx.try_recv().unwrap_or_else(|_| panic!("{name}: inline completion did not fire"));

    if let Some(expected) = case.get("expected_error") {
        let err = result.expect_err(name);
        assert_eq!(err.status_code() as i64, expected["status"].as_i64().unwrap(), "{name}: status");
        if let Some(message) = expected.get("message") {
            assert_eq!(err.message(), message.as_str().unwrap(), "{name}: message");
        }
        if let Some(code) = expected.get("code") {
            assert_eq!(err.error_code(), code.as_str(), "{name}: code");
        }
    } else {
        let expected: T = serde_json::from_value(case["expected_result"].clone()).unwrap();
        assert_eq!(result.unwrap(), expected, "{name}: parsed result");
    }
}

fn run_case(case: &Value) {
    let name = case["name"].as_str().unwrap();
    let sim = &case["simulated_response"];
    let transport = Arc::new(ReplayTransport {
        status: sim["status"].as_u64().unwrap() as u16,
        body: sim["body"].as_str().unwrap().to_string(),
        captured: Mutex::new(None),
    });
    let client = BizMapClient::with_transport(ClientConfig::new(BASE_URL), transport.clone()).unwrap();
    if let Some(token) = case["token"].as_str() {
        client.set_auth_token(token);
    }

    let input = &case["input"];
    let c = &client;
    match case["operation"].as_str().unwrap() {
        "login" => check::<AuthResponse, _>(name, case, |done| {
            c.login_then(str_field(input, "username"), str_field(input, "password"), done)
        }),
        "register" => {
            let input: RegisterRequest = serde_json::from_value(input.clone()).unwrap();
            check::<(), _>(name, case, |done| c.register_then(&input, done))
        }
        "logout" => check::<(), _>(name, case, |done| c.logout_then(done)),
        "get_profile" => check::<User, _>(name, case, |done| c.get_profile_then(done)),
        "search_businesses" => {
            let params = BusinessSearchParams::from_raw(
                str_field(input, "query"),
                num_field(input, "lat"),
                num_field(input, "lng"),
                int_field(input, "radius"),
                input["category"].as_str(),
                int_field(input, "limit"),
                int_field(input, "offset"),
            );
            check::<Vec<Business>, _>(name, case, |done| c.search_businesses_then(&params, done))
        }
        "get_business" => check::<Business, _>(name, case, |done| c.get_business_then(str_field(input, "id"), done)),
        "search_products" => {
            let params = ProductSearchParams::from_raw(
                str_field(input, "query"),
                num_field(input, "lat"),
                num_field(input, "lng"),
                int_field(input, "radius"),
                num_field(input, "min_price"),
                num_field(input, "max_price"),
                input["category"].as_str(),
                int_field(input, "limit"),
                int_field(input, "offset"),
            );
            check::<Vec<ProductWithBusiness>, _>(name, case, |done| c.search_products_then(&params, done))
        }
        "get_product" => check::<Product, _>(name, case, |done| c.get_product_then(str_field(input, "id"), done)),
        "get_business_products" => check::<Vec<Product>, _>(name, case, |done| {
            c.get_business_products_then(str_field(input, "id"), done)
        }),
        "get_search_history" => check::<Vec<SearchHistoryEntry>, _>(name, case, |done| {
            c.get_search_history_then(int_field(input, "limit"), done)
        }),
        "get_recommendations" => {
            check::<UserRecommendations, _>(name, case, |done| c.get_recommendations_then(done))
        }
        "clear_search_history" => check::<(), _>(name, case, |done| c.clear_search_history_then(done)),
        other => panic!("{name}: unknown operation {other}"),
    }

    // Verify the request the client produced.
    let req = transport.captured.lock().unwrap().take().unwrap();
    let expected_req = &case["expected_request"];
    assert_eq!(req.method, parse_method(expected_req["method"].as_str().unwrap()), "{name}: method");
    assert_eq!(req.url, format!("{BASE_URL}{}", expected_req["path"].as_str().unwrap()), "{name}: url");

    let expected_headers: Vec<(String, String)> = expected_req["headers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|h| {
            let arr = h.as_array().unwrap();
            (arr[0].as_str().unwrap().to_string(), arr[1].as_str().unwrap().to_string())
        })
        .collect();
    assert_eq!(req.headers, expected_headers, "{name}: headers");

    match expected_req.get("body") {
        Some(body) => {
            let req_body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
            assert_eq!(&req_body, body, "{name}: body");
        }
        None => assert!(req.body.is_none(), "{name}: body should be None"),
    }
}

fn run_file(raw: &str) {
    let vectors: Value = serde_json::from_str(raw).unwrap();
    for case in vectors["cases"].as_array().unwrap() {
        run_case(case);
    }
}

#[test]
fn auth_test_vectors() {
    run_file(include_str!("../../test-vectors/auth.json"));
}

#[test]
fn search_test_vectors() {
    run_file(include_str!("../../test-vectors/search.json"));
}
