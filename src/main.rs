//! funcrt - local adapter server
//!
//! Forwards to a sub-runtime when `SCW_HANDLER_NAME` is set, otherwise serves
//! a sample function in-process.

use funcrt::prelude::*;
use std::collections::BTreeMap;
use tracing_subscriber::EnvFilter;

/// Sample function answering with its own view of the request.
struct StatusFunction;

#[async_trait]
impl FunctionHandler for StatusFunction {
    async fn handle(
        &self,
        request: Request<Bytes>,
        ctx: &ExecutionContext,
    ) -> Result<Response<Bytes>, FunctionError> {
        let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in request.headers() {
            headers
                .entry(name.as_str().to_string())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }

        let body = serde_json::json!({
            "message": "We're all good",
            "healthy": true,
            "function": ctx.function_name,
            "headers": headers,
        });

        let mut response = Response::new(Bytes::from(serde_json::to_vec(&body)?));
        response.headers_mut().insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        Ok(response)
    }

    fn name(&self) -> &str {
        "status"
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AdapterConfig::from_env();

    let server = if config.handler_name.is_empty() {
        tracing::info!("No handler configured, serving the sample function in-process");
        tracing::info!("Try: curl http://localhost:{}/", config.port);
        AdapterServer::local(config, StatusFunction)
    } else {
        tracing::info!(
            "Forwarding '{}' from '{}' to sub-runtime at {}",
            config.handler_name,
            config.handler_path,
            config.upstream_url()
        );
        AdapterServer::sub_runtime(config)
    };

    server.run().await?;
    Ok(())
}
