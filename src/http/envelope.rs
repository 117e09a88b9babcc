//! Gateway event → forward request addressed to the function.

use crate::error::AdapterError;
use crate::function::ExecutionContext;
use crate::http::GatewayEvent;
use bytes::Bytes;
use http::header::{self, HeaderName, HeaderValue};
use http::{Method, Request, Uri};
use http_body_util::Full;
use serde::Serialize;
use tracing::warn;

/// Handler the sub-runtime should import and run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerInfo {
    /// Exported function to execute.
    pub name: String,
    /// Path of the file exporting it.
    pub path: String,
}

impl HandlerInfo {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Body of the request sent from the core runtime to the sub-runtime.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreRuntimeRequest<'a> {
    pub event: &'a GatewayEvent,
    pub context: &'a ExecutionContext,
    pub handler_name: &'a str,
    pub handler_path: &'a str,
}

/// Headers the HTTP client computes itself; copying the inbound values would
/// describe the wrong body.
const TRANSPORT_OWNED: [HeaderName; 3] = [
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::HOST,
];

/// Build the POST request carrying `event` to the function at `upstream`.
///
/// Flattened headers are set first, then every multi-value entry is appended,
/// so a header present in both maps is sent with duplicated values.
pub fn build_forward_request(
    event: &GatewayEvent,
    context: &ExecutionContext,
    handler: &HandlerInfo,
    upstream: &str,
) -> Result<Request<Full<Bytes>>, AdapterError> {
    let envelope = CoreRuntimeRequest {
        event,
        context,
        handler_name: &handler.name,
        handler_path: &handler.path,
    };
    let body = serde_json::to_vec(&envelope)?;

    let path = if event.path.is_empty() { "/" } else { &event.path };
    let uri: Uri = format!("{}{}", upstream.trim_end_matches('/'), path)
        .parse()
        .map_err(|e| AdapterError::MalformedEnvelope(format!("invalid upstream uri: {e}")))?;

    let mut request = Request::new(Full::new(Bytes::from(body)));
    *request.method_mut() = Method::POST;
    *request.uri_mut() = uri;

    let headers = request.headers_mut();
    for (key, value) in &event.headers {
        if let Some((name, value)) = header_pair(key, value) {
            headers.insert(name, value);
        }
    }
    for (key, values) in &event.multi_value_headers {
        for value in values {
            if let Some((name, value)) = header_pair(key, value) {
                headers.append(name, value);
            }
        }
    }
    for name in &TRANSPORT_OWNED {
        headers.remove(name);
    }

    if !headers.contains_key(header::CONTENT_TYPE) {
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
    }

    if let Some(user_agent) = event
        .get_header(header::USER_AGENT.as_str())
        .filter(|v| !v.is_empty())
    {
        if let Ok(value) = HeaderValue::from_str(user_agent) {
            headers.insert(header::USER_AGENT, value);
        }
    }

    Ok(request)
}

fn header_pair(key: &str, value: &str) -> Option<(HeaderName, HeaderValue)> {
    let name = match HeaderName::from_bytes(key.as_bytes()) {
        Ok(name) => name,
        Err(e) => {
            warn!("Skipping header with invalid name '{}': {}", key, e);
            return None;
        }
    };
    match HeaderValue::from_str(value) {
        Ok(value) => Some((name, value)),
        Err(e) => {
            warn!("Skipping header '{}' with invalid value: {}", key, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::collections::HashMap;

    fn event_with_headers() -> GatewayEvent {
        let mut event = GatewayEvent {
            path: "/hello".to_string(),
            http_method: "GET".to_string(),
            body: "sampleBody".to_string(),
            ..Default::default()
        };
        event.headers = HashMap::from([
            ("user-agent".to_string(), "curl/8.0".to_string()),
            ("x-multi".to_string(), "a,b".to_string()),
            ("content-length".to_string(), "10".to_string()),
        ]);
        event.multi_value_headers = HashMap::from([
            ("x-multi".to_string(), vec!["a".to_string(), "b".to_string()]),
            ("user-agent".to_string(), vec!["curl/8.0".to_string()]),
        ]);
        event
    }

    #[tokio::test]
    async fn test_forward_request_envelope() {
        let event = event_with_headers();
        let ctx = ExecutionContext::default();
        let handler = HandlerInfo::new("handle", "/app/handler.js");

        let request =
            build_forward_request(&event, &ctx, &handler, "http://127.0.0.1:8081").unwrap();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.uri(), "http://127.0.0.1:8081/hello");

        let body = request.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["handlerName"], "handle");
        assert_eq!(json["handlerPath"], "/app/handler.js");
        assert_eq!(json["context"]["memoryLimitInMb"], 128);
        assert_eq!(json["context"]["functionName"], "handler");
        assert_eq!(json["context"]["functionVersion"], "0.0.0");
        assert_eq!(json["event"]["body"], "sampleBody");
        assert_eq!(json["event"]["path"], "/hello");
    }

    #[test]
    fn test_forward_request_header_order() {
        let event = event_with_headers();
        let request = build_forward_request(
            &event,
            &ExecutionContext::default(),
            &HandlerInfo::default(),
            "http://localhost/",
        )
        .unwrap();
        let headers = request.headers();

        // flat value set first, then both multi values appended
        let multi: Vec<_> = headers.get_all("x-multi").iter().collect();
        assert_eq!(multi, vec!["a,b", "a", "b"]);

        // user agent is re-set from the flat map, dropping the appended copy
        let agents: Vec<_> = headers.get_all(header::USER_AGENT).iter().collect();
        assert_eq!(agents, vec!["curl/8.0"]);

        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "application/json");
        assert!(headers.get(header::CONTENT_LENGTH).is_none());
    }

    #[test]
    fn test_forward_request_user_agent_any_case() {
        let mut event = GatewayEvent::default();
        event
            .headers
            .insert("User-Agent".to_string(), "okhttp/4.9".to_string());

        let request = build_forward_request(
            &event,
            &ExecutionContext::default(),
            &HandlerInfo::default(),
            "http://localhost",
        )
        .unwrap();

        let agents: Vec<_> = request.headers().get_all(header::USER_AGENT).iter().collect();
        assert_eq!(agents, vec!["okhttp/4.9"]);
    }

    #[test]
    fn test_forward_request_keeps_content_type() {
        let mut event = GatewayEvent::default();
        event
            .headers
            .insert("content-type".to_string(), "text/plain".to_string());

        let request = build_forward_request(
            &event,
            &ExecutionContext::default(),
            &HandlerInfo::default(),
            "http://localhost",
        )
        .unwrap();

        assert_eq!(request.uri().path(), "/");
        assert_eq!(
            request.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain"
        );
    }

    #[test]
    fn test_forward_request_skips_invalid_headers() {
        let mut event = GatewayEvent::default();
        event
            .headers
            .insert("bad header".to_string(), "value".to_string());
        event
            .headers
            .insert("x-good".to_string(), "value".to_string());

        let request = build_forward_request(
            &event,
            &ExecutionContext::default(),
            &HandlerInfo::default(),
            "http://localhost",
        )
        .unwrap();

        assert_eq!(request.headers().get("x-good").unwrap(), "value");
        assert_eq!(request.headers().len(), 2);
    }

    #[test]
    fn test_forward_request_invalid_upstream() {
        let result = build_forward_request(
            &GatewayEvent::default(),
            &ExecutionContext::default(),
            &HandlerInfo::default(),
            "not a uri",
        );
        assert!(matches!(result, Err(AdapterError::MalformedEnvelope(_))));
    }
}
