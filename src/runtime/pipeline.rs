//! Per-request processing shared by every connection.

use crate::error::AdapterError;
use crate::function::{
    ExecutionContext, ForwardedHeaders, FunctionHandler, Invoker, LocalInvoker, SubRuntimeInvoker,
};
use crate::http::{
    apply_cors, build_forward_request, merge_headers, parse_response, to_event, write,
    HandlerInfo, TriggerType,
};
use crate::runtime::config::AdapterConfig;
use crate::runtime::infra::inject_egress_headers;
use bytes::Bytes;
use http::header::{self, HeaderMap};
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Body;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time;
use tracing::{debug, error};

/// Everything a request needs besides itself, built once at startup.
#[derive(Clone)]
pub struct Pipeline {
    invoker: Arc<dyn Invoker>,
    context: ExecutionContext,
    handler: HandlerInfo,
    upstream: String,
    allow_favicon: bool,
    max_payload_size: u64,
    simulate_egress: bool,
    cold_start: Duration,
    base_latency: Duration,
    warmed_up: Arc<OnceCell<()>>,
}

impl Pipeline {
    /// Create a pipeline around any invoker.
    pub fn new(invoker: Arc<dyn Invoker>, config: &AdapterConfig) -> Self {
        Self {
            invoker,
            context: config.context.clone(),
            handler: config.handler_info(),
            upstream: config.upstream_url(),
            allow_favicon: config.allow_favicon,
            max_payload_size: config.max_payload_size,
            simulate_egress: false,
            cold_start: config.cold_start,
            base_latency: config.base_latency,
            warmed_up: Arc::new(OnceCell::new()),
        }
    }

    /// Serve `function` in-process, simulating the platform's proxies.
    pub fn local<F>(function: F, config: &AdapterConfig) -> Self
    where
        F: FunctionHandler + 'static,
    {
        let invoker = LocalInvoker::new(function, config.context.clone());
        let mut pipeline = Self::new(Arc::new(invoker), config);
        pipeline.simulate_egress = true;
        pipeline
    }

    /// Forward every event to the sub-runtime at the configured upstream.
    pub fn sub_runtime(config: &AdapterConfig) -> Self {
        Self::new(Arc::new(SubRuntimeInvoker::new()), config)
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    /// Handle one inbound request. Never fails: errors become plain-text
    /// responses with the status of the error.
    pub async fn handle<B>(&self, request: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        let mut headers = HeaderMap::new();
        apply_cors(&mut headers);

        if self.drop_request(request.uri().path()) {
            let mut response = Response::new(Full::new(Bytes::new()));
            *response.status_mut() = StatusCode::NOT_FOUND;
            *response.headers_mut() = headers;
            return response;
        }

        match self.process(request, headers).await {
            Ok(response) => response,
            Err(e) => {
                error!("Request failed: {}", e);
                let mut response = e.into_response();
                apply_cors(response.headers_mut());
                response
            }
        }
    }

    fn drop_request(&self, path: &str) -> bool {
        (!self.allow_favicon && path == "/favicon.ico") || path == "/robots.txt"
    }

    async fn process<B>(
        &self,
        request: Request<B>,
        mut headers: HeaderMap,
    ) -> Result<Response<Full<Bytes>>, AdapterError>
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        if self.declared_length(request.headers()) > self.max_payload_size {
            debug!("Function Triggered");
            return Err(AdapterError::PayloadTooLarge {
                limit: self.max_payload_size,
            });
        }

        TriggerType::from_headers(request.headers()).inspect_err(|_| {
            debug!("Function Triggered");
        })?;

        let event = to_event(request).await?;
        debug!("Function Triggered: {}", event.path);

        let forward = build_forward_request(&event, &self.context, &self.handler, &self.upstream)?;
        self.simulate_latency().await;
        let mut response = self.invoker.invoke(forward).await?;

        let forwarded = response.extensions_mut().remove::<ForwardedHeaders>();
        let normalized = parse_response(Some(response)).await?;

        if let Some(ForwardedHeaders(forwarded)) = forwarded {
            merge_headers(&forwarded, &mut headers);
        }
        apply_cors(&mut headers);
        if self.simulate_egress {
            inject_egress_headers(&mut headers);
        }
        merge_headers(&normalized.header_map(), &mut headers);

        write(headers, normalized)
    }

    /// Wait out the configured cold start (first invocation only) and base
    /// latency.
    async fn simulate_latency(&self) {
        if !self.cold_start.is_zero() {
            self.warmed_up
                .get_or_init(|| async {
                    debug!("Simulating cold start of {:?}", self.cold_start);
                    time::sleep(self.cold_start).await;
                })
                .await;
        }
        if !self.base_latency.is_zero() {
            time::sleep(self.base_latency).await;
        }
    }

    fn declared_length(&self, headers: &HeaderMap) -> u64 {
        headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }
}
