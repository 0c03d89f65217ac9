//! Node construction seam and live node handles.
//!
//! The routing pool exclusively owns every connection handle it creates. The
//! cache-operation layer receives shared references through lookups and must
//! treat them as opaque.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time;

use crate::descriptor::NodeAddress;
use crate::error::ConstructionError;

/// Opaque connection handle for a single cache node.
pub trait NodeConnection: fmt::Debug + Send + Sync {
    /// The address this connection was built for.
    fn address(&self) -> &NodeAddress;
}

/// Constructs connection handles for newly discovered nodes.
///
/// A failure here is contained within one reconciliation pass; the node is
/// skipped for that cycle and attempted again on the next poll.
#[async_trait]
pub trait NodeFactory: Send + Sync {
    async fn create(
        &self,
        address: &NodeAddress,
    ) -> Result<Arc<dyn NodeConnection>, ConstructionError>;
}

/// A node currently part of the routing pool.
#[derive(Debug, Clone)]
pub struct LiveNode {
    address: NodeAddress,
    connection: Arc<dyn NodeConnection>,
}

impl LiveNode {
    pub fn new(address: NodeAddress, connection: Arc<dyn NodeConnection>) -> Self {
        Self {
            address,
            connection,
        }
    }

    pub fn address(&self) -> &NodeAddress {
        &self.address
    }

    /// Shared handle to the node's connection. Holders keep the connection
    /// alive even after the node leaves the pool, so in-flight operations
    /// finish on their own terms.
    pub fn connection(&self) -> Arc<dyn NodeConnection> {
        self.connection.clone()
    }
}

/// Default factory: one persistent TCP connection per node.
///
/// Deployments with their own socket-pool layer plug in a custom
/// [`NodeFactory`] instead.
#[derive(Debug, Clone)]
pub struct TcpNodeFactory {
    connect_timeout: Duration,
}

impl TcpNodeFactory {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl NodeFactory for TcpNodeFactory {
    async fn create(
        &self,
        address: &NodeAddress,
    ) -> Result<Arc<dyn NodeConnection>, ConstructionError> {
        let connect = TcpStream::connect((address.host.as_str(), address.port));
        let stream = time::timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| ConstructionError::new(address, "connect timed out"))?
            .map_err(|e| ConstructionError::new(address, e))?;

        debug!("connected to cache node {}", address);

        Ok(Arc::new(TcpNodeConnection {
            address: address.clone(),
            stream: Mutex::new(stream),
        }))
    }
}

/// Connection handle produced by [`TcpNodeFactory`].
#[derive(Debug)]
pub struct TcpNodeConnection {
    address: NodeAddress,
    stream: Mutex<TcpStream>,
}

impl TcpNodeConnection {
    /// Exclusive access to the underlying stream for issuing cache requests.
    pub async fn stream(&self) -> MutexGuard<'_, TcpStream> {
        self.stream.lock().await
    }
}

impl NodeConnection for TcpNodeConnection {
    fn address(&self) -> &NodeAddress {
        &self.address
    }
}
