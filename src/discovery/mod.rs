//! Cluster discovery: querying the configuration endpoint and feeding
//! membership changes into the routing pool.
//!
//! - [`transport`]: one-shot queries over the text configuration protocol
//! - [`poller`]: the background loop with bounded retries and the degraded
//!   signal
//!
//! The poller owns the schedule and the poll state; the pool owns every
//! connection handle. Neither ever blocks a cache-operation caller.

pub mod poller;
pub mod transport;

pub use poller::DiscoveryPoller;
pub use transport::{DiscoveryTransport, TcpDiscoveryTransport};
