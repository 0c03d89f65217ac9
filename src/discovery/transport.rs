//! One-shot discovery queries against a bootstrap endpoint.
//!
//! Each query opens its own connection, issues the configuration command,
//! reads the full response and closes the connection. Retries live in the
//! poller, not here.

use std::time::Duration;

use async_trait::async_trait;
use log::trace;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;

use crate::config::BootstrapEndpoint;
use crate::error::TransportError;

/// Command understood by managed cluster configuration endpoints.
const CONFIG_COMMAND: &[u8] = b"config get cluster\r\n";

/// Line terminating a configuration response.
const END_MARKER: &str = "END";

/// Sends a single discovery query and returns the raw descriptor payload.
#[async_trait]
pub trait DiscoveryTransport: Send + Sync {
    async fn query(&self, endpoint: &BootstrapEndpoint) -> Result<String, TransportError>;
}

/// TCP transport speaking the text configuration protocol.
#[derive(Debug, Clone)]
pub struct TcpDiscoveryTransport {
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl TcpDiscoveryTransport {
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            read_timeout,
        }
    }
}

#[async_trait]
impl DiscoveryTransport for TcpDiscoveryTransport {
    async fn query(&self, endpoint: &BootstrapEndpoint) -> Result<String, TransportError> {
        let connect = TcpStream::connect((endpoint.host.as_str(), endpoint.port));
        let mut stream = time::timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| TransportError::Unreachable(format!("connect to {endpoint} timed out")))?
            .map_err(|e| TransportError::Unreachable(format!("{endpoint}: {e}")))?;

        stream
            .write_all(CONFIG_COMMAND)
            .await
            .map_err(|e| TransportError::Unreachable(format!("{endpoint}: {e}")))?;

        let response = time::timeout(self.read_timeout, read_full_response(&mut stream))
            .await
            .map_err(|_| TransportError::Timeout)??;
        trace!("configuration response from {endpoint}: {response:?}");

        // The stream drops here; connection lifetime is scoped to the query.
        extract_payload(&response)
    }
}

/// Read until the end marker arrives. The caller bounds the whole read.
async fn read_full_response(stream: &mut TcpStream) -> Result<String, TransportError> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;
        if n == 0 {
            return Err(TransportError::ProtocolViolation(
                "connection closed before the end marker".to_string(),
            ));
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if text.ends_with("END\r\n") || text.ends_with("END\n") {
            return Ok(text.into_owned());
        }
    }
}

/// Strip the response framing, leaving the descriptor payload (version line
/// plus node line).
fn extract_payload(response: &str) -> Result<String, TransportError> {
    let mut lines = response.lines();

    let header = lines.next().unwrap_or_default();
    if header.starts_with("ERROR") {
        return Err(TransportError::ProtocolViolation(
            "endpoint rejected the configuration command".to_string(),
        ));
    }
    if !header.starts_with("CONFIG cluster") {
        return Err(TransportError::ProtocolViolation(format!(
            "unexpected response header: {header:?}"
        )));
    }

    let mut payload: Vec<&str> = Vec::new();
    let mut terminated = false;
    for line in lines {
        if line.trim() == END_MARKER {
            terminated = true;
            break;
        }
        payload.push(line);
    }
    if !terminated {
        return Err(TransportError::ProtocolViolation(
            "response missing the end marker".to_string(),
        ));
    }

    while payload.last().is_some_and(|l| l.trim().is_empty()) {
        payload.pop();
    }

    Ok(format!("{}\n", payload.join("\n")))
}
