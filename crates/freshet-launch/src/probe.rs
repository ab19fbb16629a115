//! Node readiness probing.
//!
//! A readiness probe answers one question: can this host be reached right
//! now? The launch path treats a successful lightweight connection as
//! ready; retry and deadline policy live in the hostfile builder, not here.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

/// A single reachability check against one host.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// Whether the host accepted a connection within the attempt timeout.
    async fn is_ready(&self, hostname: &str) -> bool;
}

/// TCP connect probe.
///
/// Defaults to port 22: an MPI launch needs the remote login path up, not
/// an application endpoint.
pub struct TcpProbe {
    port: u16,
    attempt_timeout: Duration,
}

impl TcpProbe {
    pub fn new(port: u16, attempt_timeout: Duration) -> Self {
        Self {
            port,
            attempt_timeout,
        }
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(22, Duration::from_secs(2))
    }
}

#[async_trait]
impl ReadinessProbe for TcpProbe {
    async fn is_ready(&self, hostname: &str) -> bool {
        let target = format!("{}:{}", hostname, self.port);
        let attempt = tokio::net::TcpStream::connect(&target);
        match tokio::time::timeout(self.attempt_timeout, attempt).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(%target, error = %e, "readiness probe refused");
                false
            }
            Err(_) => {
                debug!(%target, "readiness probe timed out");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn listening_port_is_ready() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let probe = TcpProbe::new(port, Duration::from_secs(1));
        assert!(probe.is_ready("127.0.0.1").await);
    }

    #[tokio::test]
    async fn closed_port_is_not_ready() {
        // Bind and immediately drop to get a port that is very likely closed.
        let port = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let probe = TcpProbe::new(port, Duration::from_millis(500));
        assert!(!probe.is_ready("127.0.0.1").await);
    }
}
