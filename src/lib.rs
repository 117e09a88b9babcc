//! # funcrt - local adapter for a Function-as-a-Service runtime
//!
//! funcrt reproduces, on a developer machine, how the managed platform turns
//! an HTTP request into a function invocation and the function's answer back
//! into an HTTP response.
//!
//! ## Architecture
//!
//! ```text
//! HTTP request
//!     │  to_event
//!     ▼
//! GatewayEvent ── build_forward_request ──▶ Invoker
//!                                            ├─ SubRuntimeInvoker (loopback HTTP)
//!                                            └─ LocalInvoker (in-process function)
//!     ┌──────────────────────────────────────┘
//!     │  parse_response
//!     ▼
//! NormalizedResponse ── merge_headers + write ──▶ HTTP response
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use funcrt::prelude::*;
//!
//! struct Hello;
//!
//! #[async_trait]
//! impl FunctionHandler for Hello {
//!     async fn handle(
//!         &self,
//!         _request: Request<Bytes>,
//!         _ctx: &ExecutionContext,
//!     ) -> Result<Response<Bytes>, FunctionError> {
//!         // JSON envelopes are interpreted like on the platform
//!         Ok(Response::new(Bytes::from_static(
//!             br#"{"statusCode": 201, "body": "created"}"#,
//!         )))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), AdapterError> {
//!     let config = AdapterConfig::from_env();
//!     AdapterServer::local(config, Hello).run().await
//! }
//! ```
//!
//! ## Response shaping
//!
//! A function answer is either a raw body or a JSON object carrying any of
//! `statusCode`, `headers` (string or array values), `body` and
//! `isBase64Encoded`. Bodies that are a single JSON string are sent unquoted,
//! base64 bodies are decoded, and permissive CORS headers are always present
//! exactly once.

pub mod error;
pub mod function;
pub mod http;
pub mod runtime;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::error::AdapterError;
    pub use crate::function::{ExecutionContext, FunctionError, FunctionHandler, Invoker};
    pub use crate::http::{GatewayEvent, NormalizedResponse};
    pub use crate::runtime::{AdapterConfig, AdapterServer, Pipeline};
    pub use async_trait::async_trait;
    pub use bytes::Bytes;
    pub use ::http::{Request, Response};
}

// Re-export for convenience
pub use crate::error::AdapterError;
pub use crate::function::{ExecutionContext, FunctionError, FunctionHandler, Invoker};
pub use crate::http::{GatewayEvent, NormalizedResponse};
pub use crate::runtime::{AdapterConfig, AdapterServer, Pipeline};
