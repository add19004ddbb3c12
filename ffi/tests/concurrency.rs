//! Background dispatch: many in-flight calls on one handle, each delivering
//! its own result to its own `user_data`.

mod common;

use bizmap_ffi::types::BIZMAP_DISPATCH_BACKGROUND;
use bizmap_ffi::*;
use common::*;

#[test]
fn concurrent_searches_get_their_own_results() {
    let addr = start_server();
    let url = cstring(&format!("http://{addr}"));
    let handle = bizmap_create_client_with_config(url.as_ptr(), 5, BIZMAP_DISPATCH_BACKGROUND);
    assert_ne!(handle, 0);

    let cases = [
        ("pizza", 2usize),
        ("laptop", 1),
        ("mouse", 1),
        ("margherita", 1),
        ("submarine", 0),
        ("pizza", 2),
        ("laptop", 1),
        ("submarine", 0),
    ];

    let queries: Vec<_> = cases.iter().map(|(q, _)| cstring(q)).collect();
    let inboxes: Vec<_> = cases.iter().map(|_| Inbox::new()).collect();

    for (query, (inbox, _)) in queries.iter().zip(&inboxes) {
        bizmap_search_products(
            handle,
            query.as_ptr(),
            0.0,
            0.0,
            0,
            -1.0,
            -1.0,
            std::ptr::null(),
            20,
            0,
            Some(on_json),
            Some(on_error),
            inbox.user_data(),
        );
    }

    for ((query, expected), (_, rx)) in cases.iter().zip(&inboxes) {
        let hits = next(rx).json();
        let hits = hits.as_array().unwrap();
        assert_eq!(hits.len(), *expected, "{query}");
        for hit in hits {
            let name = hit["product"]["name"].as_str().unwrap().to_lowercase();
            assert!(name.contains(query), "{query} got {name}");
        }
        assert_quiet(rx);
    }

    bizmap_destroy_client(handle);
}

#[test]
fn destroy_during_flight_still_completes_once() {
    let addr = start_server();
    let url = cstring(&format!("http://{addr}"));
    let handle = bizmap_create_client_with_config(url.as_ptr(), 5, BIZMAP_DISPATCH_BACKGROUND);
    let (inbox, rx) = Inbox::new();
    let id = cstring("b-techstore");

    bizmap_get_business(handle, id.as_ptr(), Some(on_json), Some(on_error), inbox.user_data());
    bizmap_destroy_client(handle);

    assert_eq!(next(&rx).json()["name"], "TechStore Lima");
    assert_quiet(&rx);

    // The handle is gone for new calls.
    bizmap_get_business(handle, id.as_ptr(), Some(on_json), Some(on_error), inbox.user_data());
    assert_eq!(next(&rx).status(), -1);
}

#[test]
fn background_login_then_profile() {
    let addr = start_server();
    let url = cstring(&format!("http://{addr}"));
    let handle = bizmap_create_client_with_config(url.as_ptr(), 5, BIZMAP_DISPATCH_BACKGROUND);
    let (inbox, rx) = Inbox::new();
    let (user, pass) = (cstring("demo"), cstring("demo123"));

    bizmap_login(handle, user.as_ptr(), pass.as_ptr(), Some(on_login), Some(on_error), inbox.user_data());
    assert!(matches!(next(&rx), Event::Login { expires_in: 3600, .. }));

    bizmap_get_profile(handle, Some(on_json), Some(on_error), inbox.user_data());
    assert_eq!(next(&rx).json()["username"], "demo");
    bizmap_destroy_client(handle);
}
