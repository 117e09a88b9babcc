//! Inbound HTTP request → gateway event.

use crate::error::AdapterError;
use crate::http::{decode_base64, MultiValueHeaders};
use http::request::Parts;
use http::{HeaderMap, Request};
use http_body_util::BodyExt;
use hyper::body::Body;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use url::form_urlencoded;

/// Normalized request handed to a function, modeled on the API gateway proxy
/// integration format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayEvent {
    pub resource: String,
    pub path: String,
    pub http_method: String,
    /// Every header flattened to one comma-joined value.
    pub headers: HashMap<String, String>,
    /// Every header with all of its values, in arrival order.
    pub multi_value_headers: MultiValueHeaders,
    /// Last value of each query key.
    pub query_string_parameters: HashMap<String, String>,
    pub multi_value_query_string_parameters: HashMap<String, Vec<String>>,
    pub path_parameters: HashMap<String, String>,
    pub stage_variables: HashMap<String, String>,
    pub request_context: RequestContext,
    /// Raw request body as text, binary content included.
    pub body: String,
    /// True whenever `body` happens to decode as base64.
    ///
    /// This is a probe, not a binary detector: plenty of plain ASCII bodies
    /// (and the empty body) decode successfully. Runtimes on the platform rely
    /// on exactly this behavior, so it must not be tightened.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_base64_encoded: bool,
}

/// Request context block of the gateway event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestContext {
    pub account_id: String,
    pub resource_id: String,
    pub stage: String,
    pub request_id: String,
    pub resource_path: String,
    pub authorizer: Option<serde_json::Map<String, serde_json::Value>>,
    pub http_method: String,
    pub api_id: String,
}

impl GatewayEvent {
    /// Get a flattened header value, matching the name in any case.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Read the full request body and format it as a gateway event.
pub async fn to_event<B>(request: Request<B>) -> Result<GatewayEvent, AdapterError>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    let (parts, body) = request.into_parts();
    let body = body
        .collect()
        .await
        .map_err(|e| AdapterError::ReadFailure(e.to_string()))?
        .to_bytes();

    Ok(format_event(&parts, &body))
}

/// Build a gateway event from request parts and an already-read body.
pub fn format_event(parts: &Parts, body: &[u8]) -> GatewayEvent {
    let multi_value_query = parse_query(parts.uri.query().unwrap_or_default());
    let query_string_parameters = multi_value_query
        .iter()
        .filter_map(|(key, values)| values.last().map(|v| (key.clone(), v.clone())))
        .collect();

    let multi_value_headers = collect_headers(&parts.headers);
    let headers = multi_value_headers
        .iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(key, values)| (key.clone(), values.join(",")))
        .collect();

    let method = parts.method.to_string();

    GatewayEvent {
        path: parts.uri.path().to_string(),
        http_method: method.clone(),
        headers,
        multi_value_headers,
        query_string_parameters,
        multi_value_query_string_parameters: multi_value_query,
        body: String::from_utf8_lossy(body).into_owned(),
        is_base64_encoded: decode_base64(body).is_ok(),
        request_context: RequestContext {
            http_method: method,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn parse_query(query: &str) -> HashMap<String, Vec<String>> {
    let mut params: HashMap<String, Vec<String>> = HashMap::new();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        params
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    params
}

fn collect_headers(headers: &HeaderMap) -> MultiValueHeaders {
    headers
        .keys()
        .map(|name| {
            let values = headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect();
            (name.as_str().to_string(), values)
        })
        .collect()
}

/// Event source of an invocation. Only HTTP is served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TriggerType {
    #[default]
    Http,
}

impl TriggerType {
    /// Request header carrying the trigger type.
    pub const HEADER: &'static str = "scw_trigger_type";

    /// Resolve the trigger type declared on a request.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AdapterError> {
        let declared = headers
            .get(Self::HEADER)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .unwrap_or_default();
        declared.parse()
    }
}

impl FromStr for TriggerType {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "http" => Ok(TriggerType::Http),
            other => Err(AdapterError::UnsupportedTrigger(other.to_string())),
        }
    }
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerType::Http => write!(f, "http"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::Full;

    fn parts(method: &str, uri: &str, headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().method(method).uri(uri);
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_format_event_flattens_headers() {
        let parts = parts(
            "POST",
            "/127.0.0.1",
            &[
                ("array", "val1"),
                ("array", "val2"),
                ("comma", "val1,val2"),
                ("single", "val1"),
            ],
        );

        let event = format_event(&parts, b"testing");

        assert_eq!(event.headers["array"], "val1,val2");
        assert_eq!(event.headers["comma"], "val1,val2");
        assert_eq!(event.headers["single"], "val1");
        assert_eq!(event.multi_value_headers["array"], vec!["val1", "val2"]);
        assert_eq!(event.multi_value_headers["comma"], vec!["val1,val2"]);
        assert!(!event.headers.contains_key("empty"));
        assert_eq!(event.path, "/127.0.0.1");
        assert_eq!(event.http_method, "POST");
        assert_eq!(event.body, "testing");
        assert!(!event.is_base64_encoded);
    }

    #[test]
    fn test_format_event_base64_probe() {
        let parts = parts("POST", "/", &[]);

        let event = format_event(&parts, b"YmFzZTY0c2FtcGxl");
        assert!(event.is_base64_encoded);
        assert_eq!(event.body, "YmFzZTY0c2FtcGxl");

        // Plain ASCII that happens to be valid base64 is flagged too.
        let event = format_event(&parts, b"dGVzdA==");
        assert!(event.is_base64_encoded);

        let event = format_event(&parts, b"abcd");
        assert!(event.is_base64_encoded);
    }

    #[test]
    fn test_format_event_last_query_value_wins() {
        let parts = parts("GET", "/search?a=1&b=x&a=2&a=3&c=hello%20world", &[]);

        let event = format_event(&parts, b"");

        assert_eq!(event.query_string_parameters["a"], "3");
        assert_eq!(event.query_string_parameters["b"], "x");
        assert_eq!(event.query_string_parameters["c"], "hello world");
        assert_eq!(
            event.multi_value_query_string_parameters["a"],
            vec!["1", "2", "3"]
        );
        assert_eq!(event.path, "/search");
    }

    #[test]
    fn test_format_event_request_context() {
        let parts = parts("PATCH", "/sample/path", &[]);
        let event = format_event(&parts, b"sampleBody");

        assert_eq!(event.http_method, "PATCH");
        assert_eq!(event.request_context.http_method, "PATCH");
        assert!(event.stage_variables.is_empty());
    }

    #[test]
    fn test_event_serialization_shape() {
        let parts = parts("GET", "/", &[("x-test", "1")]);
        let event = format_event(&parts, b"testing");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["httpMethod"], "GET");
        assert_eq!(json["requestContext"]["httpMethod"], "GET");
        assert_eq!(json["headers"]["x-test"], "1");
        assert_eq!(json["multiValueHeaders"]["x-test"][0], "1");
        assert!(json.get("isBase64Encoded").is_none());
        assert!(json["requestContext"]["authorizer"].is_null());
    }

    #[test]
    fn test_get_header_ignores_case() {
        let parts = parts("GET", "/", &[("x-api-key", "secret")]);
        let event = format_event(&parts, b"");

        assert_eq!(event.get_header("X-Api-Key"), Some("secret"));
        assert_eq!(event.get_header("x-api-key"), Some("secret"));
        assert_eq!(event.get_header("x-missing"), None);
    }

    #[tokio::test]
    async fn test_to_event_reads_body() {
        let request = Request::builder()
            .method("PUT")
            .uri("/items?id=7")
            .body(Full::new(Bytes::from_static(b"payload")))
            .unwrap();

        let event = to_event(request).await.unwrap();

        assert_eq!(event.body, "payload");
        assert_eq!(event.http_method, "PUT");
        assert_eq!(event.query_string_parameters["id"], "7");
    }

    #[test]
    fn test_trigger_type() {
        assert_eq!("".parse::<TriggerType>().unwrap(), TriggerType::Http);
        assert_eq!("http".parse::<TriggerType>().unwrap(), TriggerType::Http);
        assert!(matches!(
            "sqs".parse::<TriggerType>(),
            Err(AdapterError::UnsupportedTrigger(t)) if t == "sqs"
        ));

        let mut headers = HeaderMap::new();
        assert_eq!(TriggerType::from_headers(&headers).unwrap(), TriggerType::Http);
        headers.insert(
            http::HeaderName::from_bytes(b"SCW_TRIGGER_TYPE").unwrap(),
            "nats".parse().unwrap(),
        );
        assert!(TriggerType::from_headers(&headers).is_err());
    }
}
