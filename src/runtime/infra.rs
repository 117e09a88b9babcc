//! Simulated platform ingress and egress layers for local runs.

use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use tracing::warn;
use uuid::Uuid;

/// Append the headers the platform's ingress proxies add to every request
/// reaching a function.
pub fn inject_ingress_headers(headers: &mut HeaderMap, host: &str) {
    let request_id = Uuid::new_v4().to_string();

    append(headers, header::FORWARDED, &format!("for={host};proto=http"));
    append(headers, HeaderName::from_static("k-proxy-request"), "activator");
    append(headers, HeaderName::from_static("x-forwarded-for"), host);
    append(headers, HeaderName::from_static("x-forwarded-for"), "127.0.0.1");
    append(headers, HeaderName::from_static("x-forwarded-for"), "127.0.0.2");
    append(headers, HeaderName::from_static("x-forwarded-proto"), "http");
    append(headers, HeaderName::from_static("x-request-id"), &request_id);
    append(headers, HeaderName::from_static("x-envoy-external-address"), host);
}

/// Set the headers the platform's egress proxy adds to every response.
pub fn inject_egress_headers(headers: &mut HeaderMap) {
    headers.insert(header::SERVER, HeaderValue::from_static("envoy"));
}

fn append(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.append(name, value);
        }
        Err(_) => warn!("Skipping ingress header '{}'", name),
    }
}
