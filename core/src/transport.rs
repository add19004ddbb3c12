//! `Transport` implementation backed by `ureq`.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};

/// Blocking HTTP(S) transport.
///
/// Status codes are returned as data (`http_status_as_error(false)`) so 4xx
/// and 5xx responses reach the client's parser instead of surfacing as
/// transport failures.
pub struct UreqTransport {
    agent: ureq::Agent,
    user_agent: String,
}

impl UreqTransport {
    pub fn new(timeout: Duration, user_agent: impl Into<String>) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build()
            .new_agent();
        Self {
            agent,
            user_agent: user_agent.into(),
        }
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let agent = &self.agent;
        let ua = self.user_agent.as_str();

        let sent = match (request.method, request.body.as_deref()) {
            (HttpMethod::Get, _) => with_headers(agent.get(&request.url), request, ua).call(),
            (HttpMethod::Delete, _) => with_headers(agent.delete(&request.url), request, ua).call(),
            (HttpMethod::Post, Some(body)) => {
                with_headers(agent.post(&request.url), request, ua).send(body.as_bytes())
            }
            (HttpMethod::Post, None) => with_headers(agent.post(&request.url), request, ua).send_empty(),
            (HttpMethod::Put, Some(body)) => {
                with_headers(agent.put(&request.url), request, ua).send(body.as_bytes())
            }
            (HttpMethod::Put, None) => with_headers(agent.put(&request.url), request, ua).send_empty(),
        };

        let mut response = sent.map_err(|err| {
            warn!(method = request.method.as_str(), error = %err, "transport failure");
            classify(err)
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let body = response.body_mut().read_to_string().map_err(classify)?;
        debug!(method = request.method.as_str(), status, bytes = body.len(), "response received");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    request: &HttpRequest,
    user_agent: &str,
) -> ureq::RequestBuilder<B> {
    builder = builder.header("User-Agent", user_agent);
    for (key, value) in &request.headers {
        builder = builder.header(key.as_str(), value.as_str());
    }
    builder
}

fn classify(err: ureq::Error) -> TransportError {
    let message = err.to_string();
    match err {
        ureq::Error::Timeout(_) => TransportError::Timeout,
        ureq::Error::HostNotFound => TransportError::HostNotFound(message),
        ureq::Error::ConnectionFailed => TransportError::Connect(message),
        ureq::Error::TooManyRedirects => TransportError::TooManyRedirects,
        ureq::Error::Io(_) => TransportError::Io(message),
        _ => {
            if message.to_ascii_lowercase().contains("tls") {
                TransportError::Tls(message)
            } else {
                TransportError::Other(message)
            }
        }
    }
}
