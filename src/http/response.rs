//! Handler / sub-runtime response → normalized response.

use crate::error::AdapterError;
use crate::http::MultiValueHeaders;
use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::Response;
use http_body_util::BodyExt;
use hyper::body::Body;
use serde_json::value::RawValue;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Response of a function after the JSON envelope, if any, has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedResponse {
    /// Status to send; never zero.
    pub status_code: u16,
    /// Body to hydrate. When the handler answered with a JSON envelope this is
    /// the verbatim JSON text of its `body` field.
    pub body: Bytes,
    /// Lowercase header name → every value.
    pub headers: MultiValueHeaders,
    pub is_base64_encoded: bool,
}

impl Default for NormalizedResponse {
    fn default() -> Self {
        Self {
            status_code: 200,
            body: Bytes::new(),
            headers: HashMap::new(),
            is_base64_encoded: false,
        }
    }
}

impl NormalizedResponse {
    /// Get all values of a header.
    pub fn get_header(&self, name: &str) -> Option<&Vec<String>> {
        self.headers.get(&name.to_ascii_lowercase())
    }

    /// Headers as an HTTP header map, skipping entries HTTP cannot carry.
    pub fn header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (key, values) in &self.headers {
            let Ok(name) = HeaderName::from_bytes(key.as_bytes()) else {
                warn!("Dropping response header with invalid name '{}'", key);
                continue;
            };
            for value in values {
                match HeaderValue::from_str(value) {
                    Ok(value) => {
                        map.append(name.clone(), value);
                    }
                    Err(_) => warn!("Dropping invalid value of response header '{}'", key),
                }
            }
        }
        map
    }

    /// Overlay the fields of a JSON response envelope.
    ///
    /// `headers` is read twice: once as name → string and once as
    /// name → [string]. Flat entries are applied first, then any non-empty
    /// array replaces the entry for its key. When both shapes name the same
    /// key the array wins; handlers on the platform depend on that precedence.
    fn overlay(&mut self, raw: &[u8]) {
        let Ok(fields) = serde_json::from_slice::<HashMap<String, &RawValue>>(raw) else {
            return;
        };

        // keys differing only in case collapse onto one entry; sorted
        // iteration makes the lowercase spelling win
        if let Some(headers) = fields.get("headers") {
            for (key, value) in flat_headers(headers) {
                self.headers.insert(key.to_ascii_lowercase(), vec![value]);
            }
            for (key, values) in array_headers(headers) {
                if values.is_empty() {
                    continue;
                }
                self.headers.insert(key.to_ascii_lowercase(), values);
            }
        }

        if let Some(status) = fields
            .get("statusCode")
            .and_then(|raw| serde_json::from_str::<u16>(raw.get()).ok())
        {
            self.status_code = status;
        }

        if let Some(body) = fields.get("body") {
            self.body = Bytes::copy_from_slice(body.get().as_bytes());
        }

        if let Some(flag) = fields
            .get("isBase64Encoded")
            .and_then(|raw| serde_json::from_str::<bool>(raw.get()).ok())
        {
            self.is_base64_encoded = flag;
        }
    }
}

/// Whether `raw` is one well-formed JSON document.
pub fn is_json(raw: &[u8]) -> bool {
    serde_json::from_slice::<serde::de::IgnoredAny>(raw).is_ok()
}

/// Drain a transport response into a [`NormalizedResponse`].
///
/// Fails with [`AdapterError::EmptyResponse`] when there is no response at
/// all and with [`AdapterError::ReadFailure`] when the body cannot be read.
/// A body that is not JSON is kept verbatim.
pub async fn parse_response<B>(
    response: Option<Response<B>>,
) -> Result<NormalizedResponse, AdapterError>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    let response = response.ok_or(AdapterError::EmptyResponse)?;
    let (parts, body) = response.into_parts();

    let body = body
        .collect()
        .await
        .map_err(|e| {
            warn!("error on body read: {}", e);
            AdapterError::ReadFailure(e.to_string())
        })?
        .to_bytes();

    let mut normalized = NormalizedResponse {
        status_code: parts.status.as_u16(),
        headers: transport_headers(&parts.headers),
        body: body.clone(),
        is_base64_encoded: false,
    };

    if is_json(&body) {
        normalized.overlay(&body);
    }

    if normalized.status_code == 0 {
        normalized.status_code = 200;
    }

    Ok(normalized)
}

fn transport_headers(headers: &HeaderMap) -> MultiValueHeaders {
    let mut out: MultiValueHeaders = HashMap::new();
    for (name, value) in headers {
        // framing belongs to the connection the response arrived on
        if name == header::TRANSFER_ENCODING {
            continue;
        }
        out.entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    out
}

fn header_entries(raw: &RawValue) -> BTreeMap<String, &RawValue> {
    serde_json::from_str(raw.get()).unwrap_or_default()
}

fn flat_headers(raw: &RawValue) -> BTreeMap<String, String> {
    header_entries(raw)
        .into_iter()
        .filter_map(|(key, value)| {
            serde_json::from_str::<String>(value.get())
                .ok()
                .map(|v| (key, v))
        })
        .collect()
}

fn array_headers(raw: &RawValue) -> BTreeMap<String, Vec<String>> {
    header_entries(raw)
        .into_iter()
        .filter_map(|(key, value)| {
            serde_json::from_str::<Vec<String>>(value.get())
                .ok()
                .map(|v| (key, v))
        })
        .collect()
}
