//! Readiness polling against the sub-runtime port.

use crate::error::AdapterError;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{self, Instant};
use tracing::{debug, info};

/// Wait until something accepts TCP connections at `upstream`.
///
/// `upstream` is a base URL such as `http://127.0.0.1:8081`. The address is
/// tried once per `poll` interval; once `timeout` has elapsed the wait fails
/// with [`AdapterError::Transport`].
pub async fn wait_until_reachable(
    upstream: &str,
    poll: Duration,
    timeout: Duration,
) -> Result<(), AdapterError> {
    let addr = authority(upstream);
    let deadline = Instant::now() + timeout;
    let mut interval = time::interval(poll);

    loop {
        interval.tick().await;

        let remaining = deadline.saturating_duration_since(Instant::now());
        match time::timeout(remaining.max(poll), TcpStream::connect(addr)).await {
            Ok(Ok(_)) => {
                info!("Sub-runtime is reachable at {}", addr);
                return Ok(());
            }
            Ok(Err(e)) => debug!("Sub-runtime at {} not ready: {}", addr, e),
            Err(_) => debug!("Connecting to sub-runtime at {} timed out", addr),
        }

        if Instant::now() >= deadline {
            return Err(AdapterError::Transport(format!(
                "sub-runtime at {} not reachable after {}s",
                addr,
                timeout.as_secs()
            )));
        }
    }
}

/// `host:port` part of a base URL.
fn authority(upstream: &str) -> &str {
    let rest = upstream
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(upstream);
    rest.split('/').next().unwrap_or(rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_authority() {
        assert_eq!(authority("http://127.0.0.1:8081"), "127.0.0.1:8081");
        assert_eq!(authority("http://localhost:80/base"), "localhost:80");
        assert_eq!(authority("127.0.0.1:9000"), "127.0.0.1:9000");
    }

    #[tokio::test]
    async fn test_reachable_upstream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let upstream = format!("http://{}", listener.local_addr().unwrap());

        let result = wait_until_reachable(
            &upstream,
            Duration::from_millis(10),
            Duration::from_secs(1),
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_upstream_times_out() {
        // reserve a port, then free it so nothing listens there
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let upstream = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let result = wait_until_reachable(
            &upstream,
            Duration::from_millis(10),
            Duration::from_millis(50),
        )
        .await;
        assert!(matches!(result, Err(AdapterError::Transport(_))));
    }
}
