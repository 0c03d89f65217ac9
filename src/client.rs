//! Client facade wiring configuration, discovery and routing together.

use std::sync::Arc;

use crate::config::ClusterConfig;
use crate::discovery::poller::DiscoveryPoller;
use crate::discovery::transport::{DiscoveryTransport, TcpDiscoveryTransport};
use crate::error::ConfigError;
use crate::node::{NodeConnection, TcpNodeFactory};
use crate::pool::locator::KetamaLocator;
use crate::pool::RoutingPool;

/// Auto-discovering client handle for one managed cache cluster.
///
/// Construction wires the discovery poller to a routing pool and fires the
/// first poll immediately; it does not wait for it. Lookups against a client
/// whose pool has not been primed yet simply miss.
pub struct ClusterClient {
    pool: Arc<RoutingPool>,
    poller: DiscoveryPoller,
}

impl ClusterClient {
    /// Start discovery with the default TCP transport.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: ClusterConfig) -> Result<Self, ConfigError> {
        let transport = Arc::new(TcpDiscoveryTransport::new(
            config.connect_timeout,
            config.read_timeout,
        ));
        Self::start_with_transport(config, transport)
    }

    /// Start discovery with a caller-supplied transport. Useful for tests
    /// and for deployments with a nonstandard configuration wire.
    pub fn start_with_transport(
        config: ClusterConfig,
        transport: Arc<dyn DiscoveryTransport>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let factory = config
            .factory
            .clone()
            .unwrap_or_else(|| Arc::new(TcpNodeFactory::new(config.connect_timeout)));
        let locator = config
            .locator
            .clone()
            .unwrap_or_else(|| Arc::new(KetamaLocator::default()));

        let pool = Arc::new(RoutingPool::new(factory, locator));
        let poller = DiscoveryPoller::start(config, transport, pool.clone());

        Ok(Self { pool, poller })
    }

    /// Connection handle owning `key`. Never blocks on discovery.
    pub fn lookup(&self, key: &[u8]) -> Option<Arc<dyn NodeConnection>> {
        self.pool.lookup(key)
    }

    /// Version of the membership the pool currently routes against.
    pub fn topology_version(&self) -> u64 {
        self.pool.topology_version()
    }

    /// True while discovery has exceeded its retry ceiling without a
    /// subsequent success. Routing continues on the last-known-good set.
    pub fn degraded(&self) -> bool {
        self.poller.degraded()
    }

    /// The underlying pool, for diagnostics and advanced callers.
    pub fn pool(&self) -> &Arc<RoutingPool> {
        &self.pool
    }

    /// Stop polling. Routing keeps serving the last applied topology.
    pub fn stop(&self) {
        self.poller.stop();
    }

    /// Stop polling and wait for the discovery task to wind down.
    pub async fn shutdown(self) {
        self.poller.shutdown().await;
    }
}
