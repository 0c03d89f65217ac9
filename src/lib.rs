//! memfleet: client-side auto-discovery for managed memcached clusters.
//!
//! A managed cache service resizes clusters without telling the clients.
//! This crate keeps a memcached-protocol client's view of the cluster
//! current: a background poller queries a well-known configuration endpoint,
//! parses the versioned membership descriptor it returns and reconciles a
//! live connection pool and consistent-hash routing ring against it, without
//! interrupting traffic to nodes that did not change.
//!
//! # Module structure
//!
//! - [`descriptor`]: membership descriptors and their textual wire form
//! - [`discovery`]: the configuration transport and the polling loop
//! - [`pool`]: live nodes, reconciliation and key routing
//! - [`node`]: the factory/connection seam toward the cache protocol layer
//! - [`config`]: bootstrap settings handed in by the embedding application
//!
//! # Quick start
//!
//! ```rust,no_run
//! use memfleet::{ClusterClient, ClusterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClusterConfig::new("demo.cfg.use1.cache.amazonaws.com", 11211);
//!     let client = ClusterClient::start(config)?;
//!
//!     // Route cache keys; discovery keeps the pool current in the
//!     // background as the cluster is resized.
//!     if let Some(connection) = client.lookup(b"user:42") {
//!         println!("user:42 lives on {}", connection.address());
//!     }
//!     println!("topology v{}, degraded: {}", client.topology_version(), client.degraded());
//!
//!     client.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod descriptor;
pub mod discovery;
pub mod error;
mod logging;
pub mod node;
pub mod pool;

pub use client::ClusterClient;
pub use config::{
    BootstrapEndpoint, ClusterConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_POLL_INTERVAL,
    DEFAULT_READ_TIMEOUT, DEFAULT_TRY_COUNT, DEFAULT_TRY_DELAY,
};
pub use descriptor::{MembershipDescriptor, NodeAddress};
pub use discovery::{DiscoveryPoller, DiscoveryTransport, TcpDiscoveryTransport};
pub use error::{
    ConfigError, ConstructionError, DiscoveryError, IntegrityError, ParseError, TransportError,
};
pub use node::{LiveNode, NodeConnection, NodeFactory, TcpNodeConnection, TcpNodeFactory};
pub use pool::locator::{KetamaLocator, NodeLocator, RoutingSnapshot};
pub use pool::{ReconcileOutcome, RoutingPool};

/// Install the default stderr logger, honoring `RUST_LOG`. Optional;
/// embedders with their own `log` backend skip this.
pub fn init_logging() {
    logging::ensure_initialized();
}
