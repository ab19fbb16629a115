//! Partitioner interface and its HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use http_body_util::BodyExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PartitionError, PartitionResult};

/// Requests a domain decomposition matching a granted allocation.
///
/// `cpus_per_node` is the granted CPU count of each node in allocation
/// order; the decomposition must produce exactly that many partitions per
/// node so MPI ranks line up with catchment groups.
#[async_trait]
pub trait Partitioner: Send + Sync {
    async fn partition(
        &self,
        hydrofabric_id: &str,
        cpus_per_node: &[u32],
    ) -> PartitionResult<String>;
}

/// Wire request sent to the partitioner service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartitionRequest {
    pub hydrofabric_id: String,
    pub node_count: u32,
    pub cpus_per_node: Vec<u32>,
}

/// Wire response from the partitioner service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartitionResponse {
    pub success: bool,
    #[serde(default)]
    pub partition_config_id: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// HTTP client for a partitioner service endpoint.
pub struct HttpPartitioner {
    /// Host:port of the partitioner service.
    address: String,
    /// Request path, e.g. `/partition`.
    path: String,
    /// Overall deadline per partition request.
    timeout: Duration,
}

impl HttpPartitioner {
    pub fn new(address: impl Into<String>, path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            path: path.into(),
            timeout,
        }
    }

    async fn send(&self, body: Vec<u8>) -> PartitionResult<PartitionResponse> {
        let transport = |e: &dyn std::fmt::Display| PartitionError::Transport(e.to_string());

        let stream = tokio::net::TcpStream::connect(&self.address)
            .await
            .map_err(|e| transport(&e))?;
        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| transport(&e))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let uri = format!("http://{}{}", self.address, self.path);
        let req = http::Request::builder()
            .method("POST")
            .uri(&uri)
            .header("host", &self.address)
            .header("content-type", "application/json")
            .body(http_body_util::Full::new(bytes::Bytes::from(body)))
            .map_err(|e| transport(&e))?;

        let resp = sender.send_request(req).await.map_err(|e| transport(&e))?;
        let status = resp.status();
        let collected = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| transport(&e))?
            .to_bytes();

        if !status.is_success() {
            return Err(PartitionError::Rejected(format!(
                "partitioner answered {status}"
            )));
        }

        let parsed: PartitionResponse =
            serde_json::from_slice(&collected).map_err(|e| transport(&e))?;
        debug!(success = parsed.success, "partitioner answered");
        Ok(parsed)
    }
}

#[async_trait]
impl Partitioner for HttpPartitioner {
    async fn partition(
        &self,
        hydrofabric_id: &str,
        cpus_per_node: &[u32],
    ) -> PartitionResult<String> {
        let request = PartitionRequest {
            hydrofabric_id: hydrofabric_id.to_string(),
            node_count: cpus_per_node.len() as u32,
            cpus_per_node: cpus_per_node.to_vec(),
        };
        let body = serde_json::to_vec(&request)
            .map_err(|e| PartitionError::Transport(e.to_string()))?;

        let response = tokio::time::timeout(self.timeout, self.send(body))
            .await
            .map_err(|_| PartitionError::Timeout(self.timeout))??;

        match response {
            PartitionResponse {
                success: true,
                partition_config_id: Some(id),
                ..
            } => {
                info!(%hydrofabric_id, partition_config_id = %id, "domain partitioned");
                Ok(id)
            }
            PartitionResponse { reason, .. } => Err(PartitionError::Rejected(
                reason.unwrap_or_else(|| "no reason given".to_string()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn request_wire_shape() {
        let request = PartitionRequest {
            hydrofabric_id: "hf-9".to_string(),
            node_count: 2,
            cpus_per_node: vec![4, 2],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["hydrofabric_id"], "hf-9");
        assert_eq!(json["node_count"], 2);
        assert_eq!(json["cpus_per_node"], serde_json::json!([4, 2]));
    }

    #[test]
    fn response_tolerates_missing_optionals() {
        let parsed: PartitionResponse = serde_json::from_str(r#"{"success":false}"#).unwrap();
        assert!(!parsed.success);
        assert!(parsed.partition_config_id.is_none());
        assert!(parsed.reason.is_none());
    }

    /// One-shot HTTP server answering every request with a fixed JSON body.
    async fn fake_partitioner(body: &str) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = vec![0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        addr
    }

    #[tokio::test]
    async fn http_partitioner_accepts_grant() {
        let addr =
            fake_partitioner(r#"{"success":true,"partition_config_id":"part-42"}"#).await;
        let client =
            HttpPartitioner::new(addr.to_string(), "/partition", Duration::from_secs(5));

        let id = client.partition("hf-1", &[4, 2]).await.unwrap();
        assert_eq!(id, "part-42");
    }

    #[tokio::test]
    async fn http_partitioner_surfaces_rejection_reason() {
        let addr =
            fake_partitioner(r#"{"success":false,"reason":"catchment count too low"}"#).await;
        let client =
            HttpPartitioner::new(addr.to_string(), "/partition", Duration::from_secs(5));

        let err = client.partition("hf-1", &[4, 2]).await.unwrap_err();
        match err {
            PartitionError::Rejected(reason) => assert!(reason.contains("catchment")),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_partitioner_is_a_transport_error() {
        // Port 9 on localhost is essentially never listening.
        let client =
            HttpPartitioner::new("127.0.0.1:9", "/partition", Duration::from_secs(2));
        let err = client.partition("hf-1", &[1]).await.unwrap_err();
        assert!(matches!(
            err,
            PartitionError::Transport(_) | PartitionError::Timeout(_)
        ));
    }
}
