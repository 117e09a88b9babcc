//! Invocation transports: how a forward request reaches a function.

use crate::error::AdapterError;
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Request, Response};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::debug;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Body of a response produced by an [`Invoker`].
pub type InvokeBody = UnsyncBoxBody<Bytes, BoxError>;

/// Anything able to take a forward request and produce the function's HTTP
/// response.
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(
        &self,
        request: Request<Full<Bytes>>,
    ) -> Result<Response<InvokeBody>, AdapterError>;
}

/// Request headers the function actually received, attached to the response
/// extensions by invokers that simulate the platform's ingress layer.
#[derive(Debug, Clone, Default)]
pub struct ForwardedHeaders(pub HeaderMap);

/// Box a fully buffered body as an [`InvokeBody`].
pub fn full_body(body: impl Into<Bytes>) -> InvokeBody {
    Full::new(body.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Forwards requests over loopback HTTP to the sub-runtime process.
#[derive(Clone)]
pub struct SubRuntimeInvoker {
    client: Client<HttpConnector, Full<Bytes>>,
}

impl SubRuntimeInvoker {
    pub fn new() -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }
}

impl Default for SubRuntimeInvoker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Invoker for SubRuntimeInvoker {
    async fn invoke(
        &self,
        request: Request<Full<Bytes>>,
    ) -> Result<Response<InvokeBody>, AdapterError> {
        debug!("Forwarding event to sub-runtime at {}", request.uri());

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        Ok(response.map(|body| body.map_err(BoxError::from).boxed_unsync()))
    }
}
