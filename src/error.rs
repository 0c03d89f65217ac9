use thiserror::Error;

/// Failure to turn a raw discovery response into a membership descriptor.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed cluster descriptor: {0}")]
    Malformed(String),
    #[error("cluster descriptor lists no nodes")]
    Empty,
}

/// Failure of a single discovery query against the bootstrap endpoint.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("bootstrap endpoint unreachable: {0}")]
    Unreachable(String),
    #[error("discovery query timed out")]
    Timeout,
    #[error("discovery response violated the protocol: {0}")]
    ProtocolViolation(String),
}

/// Failure to construct a connection handle for one node.
///
/// Contained within a single reconciliation pass; the node is skipped for
/// that cycle and picked up again on the next poll.
#[derive(Debug, Error)]
#[error("failed to construct node {address}: {reason}")]
pub struct ConstructionError {
    pub address: String,
    pub reason: String,
}

impl ConstructionError {
    pub fn new(address: impl ToString, reason: impl ToString) -> Self {
        Self {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Reconciliation refused to apply a descriptor that would corrupt the pool.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("refusing to apply a topology that would empty the pool")]
    EmptyTopologyRejected,
}

/// Invalid bootstrap configuration supplied to [`crate::ClusterClient`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid bootstrap endpoint: {0}")]
    InvalidEndpoint(String),
}

/// A failed discovery cycle, as seen by the poller's retry loop.
///
/// Never propagates to cache-operation callers; only the aggregate degraded
/// signal surfaces.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}
