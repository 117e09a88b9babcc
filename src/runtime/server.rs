//! Adapter HTTP server.

use crate::error::AdapterError;
use crate::function::FunctionHandler;
use crate::runtime::config::AdapterConfig;
use crate::runtime::pipeline::Pipeline;
use crate::runtime::upstream::wait_until_reachable;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Interval between two readiness probes of the sub-runtime.
const READINESS_POLL: Duration = Duration::from_secs(1);

/// Local-development adapter server.
///
/// Every inbound request is turned into a gateway event, handed to the
/// pipeline's invoker, and the function's answer is shaped back into an HTTP
/// response the way the managed platform does it.
pub struct AdapterServer {
    /// Server configuration.
    config: AdapterConfig,
    /// Shared request pipeline.
    pipeline: Arc<Pipeline>,
    /// Wait for the sub-runtime before accepting requests.
    wait_for_upstream: bool,
}

impl AdapterServer {
    /// Create a server around an existing pipeline.
    pub fn new(config: AdapterConfig, pipeline: Pipeline) -> Self {
        Self {
            config,
            pipeline: Arc::new(pipeline),
            wait_for_upstream: false,
        }
    }

    /// Serve `function` in-process.
    pub fn local<F>(config: AdapterConfig, function: F) -> Self
    where
        F: FunctionHandler + 'static,
    {
        let pipeline = Pipeline::local(function, &config);
        Self::new(config, pipeline)
    }

    /// Forward to the sub-runtime, waiting for it to come up first.
    pub fn sub_runtime(config: AdapterConfig) -> Self {
        let pipeline = Pipeline::sub_runtime(&config);
        let mut server = Self::new(config, pipeline);
        server.wait_for_upstream = true;
        server
    }

    /// Get the request pipeline.
    pub fn pipeline(&self) -> Arc<Pipeline> {
        self.pipeline.clone()
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Bind the configured address and serve forever.
    pub async fn run(self) -> Result<(), AdapterError> {
        if self.wait_for_upstream {
            wait_until_reachable(
                self.pipeline.upstream(),
                READINESS_POLL,
                self.config.readiness_timeout_duration(),
            )
            .await?;
        }

        let addr = self.config.socket_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| AdapterError::Config(format!("cannot listen on {addr}: {e}")))?;

        self.serve(listener).await
    }

    /// Serve connections accepted on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), AdapterError> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| AdapterError::Config(e.to_string()))?;
        info!("Using port {}", local_addr.port());
        info!("Adapter server listening on {}", local_addr);

        loop {
            let (stream, remote_addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    continue;
                }
            };
            let io = TokioIo::new(stream);
            let pipeline = self.pipeline.clone();

            tokio::task::spawn(async move {
                serve_connection(io, pipeline, remote_addr).await;
            });
        }
    }
}

async fn serve_connection(
    io: TokioIo<tokio::net::TcpStream>,
    pipeline: Arc<Pipeline>,
    remote_addr: SocketAddr,
) {
    let service = service_fn(move |req: Request<Incoming>| {
        let pipeline = pipeline.clone();
        async move {
            debug!("Handling {} {} from {}", req.method(), req.uri(), remote_addr);
            Ok::<_, Infallible>(pipeline.handle(req).await)
        }
    });

    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
        error!("Error serving connection: {:?}", err);
    }
}
