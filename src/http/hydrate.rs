//! Normalized response → outbound HTTP response.

use crate::error::AdapterError;
use crate::http::{decode_base64, NormalizedResponse};
use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::{Response, StatusCode};
use http_body_util::Full;
use tracing::warn;

pub const CORS_ALLOW_ORIGIN: HeaderName = header::ACCESS_CONTROL_ALLOW_ORIGIN;
pub const CORS_ALLOW_HEADERS: HeaderName = header::ACCESS_CONTROL_ALLOW_HEADERS;

/// Set the permissive CORS headers every function response starts with.
pub fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(CORS_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(CORS_ALLOW_HEADERS, HeaderValue::from_static("Content-Type"));
}

/// Append every value of `source` onto `destination`.
///
/// The same destination receives merges from several stages, so CORS headers
/// carried by `source` first replace the destination's copy; otherwise the
/// values would pile up as `access-control-allow-origin: *,*`.
pub fn merge_headers(source: &HeaderMap, destination: &mut HeaderMap) {
    for name in [CORS_ALLOW_ORIGIN, CORS_ALLOW_HEADERS] {
        if source.contains_key(&name) {
            destination.remove(&name);
        }
    }

    for (name, value) in source {
        destination.append(name.clone(), value.clone());
    }
}

/// Decode a body holding exactly one JSON string. JSON `null` reads as the
/// empty string.
pub(crate) fn decode_json_string(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<Option<String>>(body)
        .ok()
        .map(Option::unwrap_or_default)
}

/// Write `response` with the accumulated `headers` as the outbound response.
///
/// A body that is a bare JSON string is sent unquoted, anything else as is.
/// `Content-Length` always matches the bytes actually sent. Bodies flagged
/// `is_base64_encoded` must be a JSON string of base64 text and are decoded
/// first.
pub fn write(
    mut headers: HeaderMap,
    response: NormalizedResponse,
) -> Result<Response<Full<Bytes>>, AdapterError> {
    let mut body = response.body;

    if response.is_base64_encoded && !body.is_empty() {
        let encoded = decode_json_string(&body).ok_or_else(|| {
            AdapterError::InvalidEncoding("base64 body is not a JSON string".to_string())
        })?;
        let decoded = decode_base64(encoded.as_bytes())
            .map_err(|e| AdapterError::InvalidEncoding(e.to_string()))?;
        body = Bytes::from(decoded);
    }

    let body = match decode_json_string(&body) {
        Some(text) => Bytes::from(text),
        None => body,
    };

    // the body is always sent with a known length
    headers.remove(header::TRANSFER_ENCODING);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));

    let status = StatusCode::from_u16(response.status_code).unwrap_or_else(|_| {
        warn!(
            "Invalid status code {}, falling back to 500 Internal Server Error",
            response.status_code
        );
        StatusCode::INTERNAL_SERVER_ERROR
    });

    let mut hydrated = Response::new(Full::new(body));
    *hydrated.status_mut() = status;
    *hydrated.headers_mut() = headers;
    Ok(hydrated)
}
