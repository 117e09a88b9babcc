//! Adapter configuration.

use crate::error::AdapterError;
use crate::function::ExecutionContext;
use crate::http::HandlerInfo;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Largest request body accepted by the platform, in bytes.
pub const DEFAULT_MAX_PAYLOAD_SIZE: u64 = 6_291_456;

/// Configuration for the adapter server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on. 0 picks a free port.
    pub port: u16,
    /// Scheme and host of the sub-runtime.
    pub upstream_host: String,
    /// Port the sub-runtime listens on.
    pub upstream_port: u16,
    /// Exported function the sub-runtime should run.
    pub handler_name: String,
    /// File exporting the handler.
    pub handler_path: String,
    /// Serve `/favicon.ico` instead of answering 404.
    pub allow_favicon: bool,
    /// Maximum declared request body size in bytes.
    pub max_payload_size: u64,
    /// How long to wait for the sub-runtime, in seconds.
    pub readiness_timeout: u64,
    /// Delay added once, before the first invocation.
    pub cold_start: Duration,
    /// Delay added before every invocation.
    pub base_latency: Duration,
    /// Context sent along with every event.
    pub context: ExecutionContext,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            upstream_host: "http://127.0.0.1".to_string(),
            upstream_port: 8081,
            handler_name: String::new(),
            handler_path: String::new(),
            allow_favicon: false,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            readiness_timeout: 300,
            cold_start: Duration::ZERO,
            base_latency: Duration::ZERO,
            context: ExecutionContext::default(),
        }
    }
}

impl AdapterConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration from any key-value source. Missing keys keep
    /// their default, unparsable numbers too.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = parsed(&lookup, "PORT") {
            config.port = port;
        }
        if let Some(host) = lookup("SCW_UPSTREAM_HOST").filter(|v| !v.is_empty()) {
            config.upstream_host = host;
        }
        if let Some(port) = parsed(&lookup, "SCW_UPSTREAM_PORT") {
            config.upstream_port = port;
        }
        if let Some(name) = lookup("SCW_HANDLER_NAME") {
            config.handler_name = name;
        }
        if let Some(path) = lookup("SCW_HANDLER_PATH") {
            config.handler_path = path;
        }
        if let Some(allow) = lookup("SCW_ALLOW_FAVICON") {
            config.allow_favicon = parse_flag(&allow);
        }
        if let Some(size) = parsed(&lookup, "SCW_PAYLOAD_MAX_SIZE") {
            config.max_payload_size = size;
        }
        if let Some(name) = lookup("SCW_FUNCTION_NAME").filter(|v| !v.is_empty()) {
            config.context.function_name = name;
        }
        if let Some(version) = lookup("SCW_FUNCTION_VERSION").filter(|v| !v.is_empty()) {
            config.context.function_version = version;
        }
        if let Some(memory) = parsed(&lookup, "SCW_FUNCTION_MEMORY_LIMIT") {
            config.context.memory_limit_in_mb = memory;
        }

        config
    }

    /// Set the host address.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the sub-runtime host and port.
    pub fn upstream(mut self, host: impl Into<String>, port: u16) -> Self {
        self.upstream_host = host.into();
        self.upstream_port = port;
        self
    }

    /// Set the handler the sub-runtime should run.
    pub fn handler(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.handler_name = name.into();
        self.handler_path = path.into();
        self
    }

    pub fn allow_favicon(mut self, allow: bool) -> Self {
        self.allow_favicon = allow;
        self
    }

    pub fn max_payload_size(mut self, size: u64) -> Self {
        self.max_payload_size = size;
        self
    }

    pub fn readiness_timeout(mut self, secs: u64) -> Self {
        self.readiness_timeout = secs;
        self
    }

    /// Simulate a cold start: the first invocation waits `delay`.
    pub fn cold_start(mut self, delay: Duration) -> Self {
        self.cold_start = delay;
        self
    }

    /// Simulate platform latency: every invocation waits `delay`.
    pub fn base_latency(mut self, delay: Duration) -> Self {
        self.base_latency = delay;
        self
    }

    /// Set the execution context.
    pub fn context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Parse the bind address.
    pub fn socket_addr(&self) -> Result<SocketAddr, AdapterError> {
        self.bind_addr()
            .parse()
            .map_err(|e| AdapterError::Config(format!("invalid bind address: {e}")))
    }

    /// Base URL of the sub-runtime.
    pub fn upstream_url(&self) -> String {
        format!(
            "{}:{}",
            self.upstream_host.trim_end_matches('/'),
            self.upstream_port
        )
    }

    pub fn handler_info(&self) -> HandlerInfo {
        HandlerInfo::new(&self.handler_name, &self.handler_path)
    }

    pub fn readiness_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.readiness_timeout)
    }
}

/// Boolean spellings accepted in the environment. Anything else is false.
fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim(), "1" | "t" | "T" | "true" | "TRUE" | "True")
}

fn parsed<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparsable value '{}' for {}", raw, key);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AdapterConfig::from_lookup(|_| None);
        assert_eq!(config, AdapterConfig::default());
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.upstream_url(), "http://127.0.0.1:8081");
        assert_eq!(config.max_payload_size, 6291456);
        assert_eq!(config.readiness_timeout_duration(), Duration::from_secs(300));
        assert!(!config.allow_favicon);
    }

    #[test]
    fn test_from_lookup() {
        let config = AdapterConfig::from_lookup(lookup_from(&[
            ("PORT", "9000"),
            ("SCW_UPSTREAM_HOST", "http://localhost/"),
            ("SCW_UPSTREAM_PORT", "9001"),
            ("SCW_HANDLER_NAME", "handle"),
            ("SCW_HANDLER_PATH", "./handler.js"),
            ("SCW_ALLOW_FAVICON", "true"),
            ("SCW_PAYLOAD_MAX_SIZE", "1024"),
            ("SCW_FUNCTION_NAME", "resize"),
            ("SCW_FUNCTION_MEMORY_LIMIT", "256"),
        ]));

        assert_eq!(config.port, 9000);
        assert_eq!(config.upstream_url(), "http://localhost:9001");
        assert_eq!(config.handler_info(), HandlerInfo::new("handle", "./handler.js"));
        assert!(config.allow_favicon);
        assert_eq!(config.max_payload_size, 1024);
        assert_eq!(config.context.function_name, "resize");
        assert_eq!(config.context.function_version, "0.0.0");
        assert_eq!(config.context.memory_limit_in_mb, 256);
    }

    #[test]
    fn test_unparsable_numbers_keep_defaults() {
        let config = AdapterConfig::from_lookup(lookup_from(&[
            ("PORT", "http"),
            ("SCW_PAYLOAD_MAX_SIZE", "-1"),
        ]));
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_payload_size, DEFAULT_MAX_PAYLOAD_SIZE);
    }

    #[test]
    fn test_builder() {
        let config = AdapterConfig::new()
            .host("127.0.0.1")
            .port(0)
            .upstream("http://127.0.0.1", 7000)
            .handler("main", "app.py")
            .max_payload_size(10);

        assert_eq!(config.socket_addr().unwrap().port(), 0);
        assert_eq!(config.upstream_url(), "http://127.0.0.1:7000");
        assert_eq!(config.handler_name, "main");
        assert_eq!(config.max_payload_size, 10);
    }

    #[test]
    fn test_allow_favicon_flag() {
        for raw in ["1", "t", "T", "true", "TRUE", "True"] {
            let config = AdapterConfig::from_lookup(lookup_from(&[("SCW_ALLOW_FAVICON", raw)]));
            assert!(config.allow_favicon, "{raw} should enable favicons");
        }
        for raw in ["0", "yes", "on", "tRUE", ""] {
            let config = AdapterConfig::from_lookup(lookup_from(&[("SCW_ALLOW_FAVICON", raw)]));
            assert!(!config.allow_favicon, "{raw} should not enable favicons");
        }
    }

    #[test]
    fn test_latency_builder() {
        let config = AdapterConfig::default();
        assert!(config.cold_start.is_zero());
        assert!(config.base_latency.is_zero());

        let config = config
            .cold_start(Duration::from_secs(2))
            .base_latency(Duration::from_millis(150));
        assert_eq!(config.cold_start, Duration::from_secs(2));
        assert_eq!(config.base_latency, Duration::from_millis(150));
    }

    #[test]
    fn test_invalid_bind_addr() {
        let config = AdapterConfig::new().host("not a host");
        assert!(matches!(config.socket_addr(), Err(AdapterError::Config(_))));
    }
}
