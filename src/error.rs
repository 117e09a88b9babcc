//! Adapter error taxonomy.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{header, Response, StatusCode};
use thiserror::Error;

/// Errors raised while translating a single request.
///
/// Every variant is fatal for the request being processed only. Nothing is
/// retried.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The transport produced no response object at all.
    #[error("http response is empty")]
    EmptyResponse,

    /// Draining a request or response body failed.
    #[error("unable to read body: {0}")]
    ReadFailure(String),

    /// A body declared as base64 could not be decoded.
    #[error("invalid base64 body: {0}")]
    InvalidEncoding(String),

    /// The outbound envelope could not be serialized or addressed.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The `SCW_TRIGGER_TYPE` header named something other than HTTP.
    #[error("trigger type '{0}' is not supported by the functions runtime")]
    UnsupportedTrigger(String),

    /// The declared request body exceeds the configured limit.
    #[error("request payload too large, max payload size = {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    /// The sub-runtime could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    /// Startup configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),
}

impl AdapterError {
    /// HTTP status reported to the caller for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UnsupportedTrigger(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Render the error as a plain-text response.
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let status = self.status_code();
        let mut response = Response::new(Full::new(Bytes::from(format!("{self}\n"))));
        *response.status_mut() = status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::MalformedEnvelope(err.to_string())
    }
}
