//! Shared fixtures: a mock server on a random port and C callbacks that
//! forward every delivery into a channel owned by the test.

#![allow(dead_code)]

use std::ffi::{c_void, CStr, CString};
use std::net::SocketAddr;
use std::os::raw::{c_char, c_int};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;
use std::time::Duration;

pub fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

pub fn cstring(value: &str) -> CString {
    CString::new(value).unwrap()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Login {
        access_token: String,
        refresh_token: String,
        expires_in: i32,
    },
    Void,
    Json(String),
    Error {
        status: i32,
        message: String,
        code: Option<String>,
    },
}

impl Event {
    pub fn json(&self) -> serde_json::Value {
        match self {
            Event::Json(text) => serde_json::from_str(text).unwrap(),
            other => panic!("expected json, got {other:?}"),
        }
    }

    pub fn status(&self) -> i32 {
        match self {
            Event::Error { status, .. } => *status,
            other => panic!("expected error, got {other:?}"),
        }
    }
}

/// Receives the deliveries of one or more invocations. Lives on the heap so
/// its address stays valid for callbacks on worker threads.
pub struct Inbox {
    tx: Mutex<Sender<Event>>,
}

impl Inbox {
    pub fn new() -> (Box<Inbox>, Receiver<Event>) {
        let (tx, rx) = mpsc::channel();
        (Box::new(Inbox { tx: Mutex::new(tx) }), rx)
    }

    pub fn user_data(&self) -> *mut c_void {
        self as *const Inbox as *mut c_void
    }
}

/// Next delivery, or panic after five seconds.
pub fn next(rx: &Receiver<Event>) -> Event {
    rx.recv_timeout(Duration::from_secs(5)).expect("no callback delivered")
}

/// Assert nothing else arrives for a short while.
pub fn assert_quiet(rx: &Receiver<Event>) {
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err(), "unexpected extra callback");
}

/// The sender is cloned out of the lock first: once `send` wakes the test
/// thread the `Inbox` may be freed, so nothing may touch it afterwards.
fn send(user_data: *mut c_void, event: Event) {
    let tx = {
        let inbox = unsafe { &*(user_data as *const Inbox) };
        inbox.tx.lock().unwrap().clone()
    };
    let _ = tx.send(event);
}

fn text(ptr: *const c_char) -> Option<String> {
    (!ptr.is_null()).then(|| unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

pub unsafe extern "C" fn on_login(
    user_data: *mut c_void,
    access_token: *const c_char,
    refresh_token: *const c_char,
    expires_in: c_int,
) {
    send(
        user_data,
        Event::Login {
            access_token: text(access_token).unwrap_or_default(),
            refresh_token: text(refresh_token).unwrap_or_default(),
            expires_in,
        },
    );
}

pub unsafe extern "C" fn on_void(user_data: *mut c_void) {
    send(user_data, Event::Void);
}

pub unsafe extern "C" fn on_json(user_data: *mut c_void, json: *const c_char) {
    send(user_data, Event::Json(text(json).unwrap_or_default()));
}

pub unsafe extern "C" fn on_error(user_data: *mut c_void, status: c_int, message: *const c_char, code: *const c_char) {
    send(
        user_data,
        Event::Error {
            status,
            message: text(message).unwrap_or_default(),
            code: text(code),
        },
    );
}
