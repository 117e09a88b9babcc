//! Function handler trait, execution context and error type.

use async_trait::async_trait;
use bytes::Bytes;
use http::{header, HeaderValue, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};

/// Execution context sent to the function with every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    /// Memory limit of the function, in MB.
    pub memory_limit_in_mb: u32,
    /// Function name.
    pub function_name: String,
    /// Function version.
    pub function_version: String,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            memory_limit_in_mb: 128,
            function_name: "handler".to_string(),
            function_version: "0.0.0".to_string(),
        }
    }
}

impl ExecutionContext {
    /// Create a context for the named function with default limits.
    pub fn new(function_name: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            ..Default::default()
        }
    }

    /// Set the function version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.function_version = version.into();
        self
    }

    /// Set the memory limit.
    pub fn with_memory_limit(mut self, memory_limit_in_mb: u32) -> Self {
        self.memory_limit_in_mb = memory_limit_in_mb;
        self
    }
}

/// User function served in-process by the local runtime.
///
/// The request is the plain HTTP request the platform would hand to the
/// function; whatever it returns goes through the same response shaping as a
/// sub-runtime answer, so returning a JSON envelope such as
/// `{"statusCode": 201, "body": "..."}` works exactly as in production.
#[async_trait]
pub trait FunctionHandler: Send + Sync {
    /// Handle one invocation.
    async fn handle(
        &self,
        request: Request<Bytes>,
        ctx: &ExecutionContext,
    ) -> Result<Response<Bytes>, FunctionError>;

    /// Get the function name.
    fn name(&self) -> &str {
        "handler"
    }
}

/// Function error type.
#[derive(Debug, Clone)]
pub struct FunctionError {
    /// Error message.
    pub message: String,
    /// HTTP status code reported for the error.
    pub code: u16,
}

impl FunctionError {
    /// Create a new FunctionError.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: 500,
        }
    }

    /// Create a FunctionError with a specific code.
    pub fn with_code(code: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }

    /// Create a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_code(400, message)
    }
}

impl std::fmt::Display for FunctionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for FunctionError {}

impl From<FunctionError> for Response<Bytes> {
    fn from(err: FunctionError) -> Self {
        let mut response = Response::new(Bytes::from(err.message));
        *response.status_mut() =
            StatusCode::from_u16(err.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}

impl From<serde_json::Error> for FunctionError {
    fn from(err: serde_json::Error) -> Self {
        FunctionError::bad_request(err.to_string())
    }
}

impl From<std::io::Error> for FunctionError {
    fn from(err: std::io::Error) -> Self {
        FunctionError::new(err.to_string())
    }
}
