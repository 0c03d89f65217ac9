//! Bootstrap configuration for cluster discovery.
//!
//! The embedding application hands a fully built [`ClusterConfig`] to
//! [`crate::ClusterClient::start`]; nothing here reads files, environment
//! variables or process-wide sections.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::warn;

use crate::error::ConfigError;
use crate::node::NodeFactory;
use crate::pool::locator::NodeLocator;

/// Interval between successful polls of the configuration endpoint.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Consecutive failed attempts tolerated before discovery reports degraded.
pub const DEFAULT_TRY_COUNT: u32 = 5;

/// Fixed delay between failed attempts while below the try ceiling.
pub const DEFAULT_TRY_DELAY: Duration = Duration::from_secs(1);

/// Connect timeout for discovery queries and the default node factory.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Bound on reading one full discovery response.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Well-known address used only to discover cluster membership, not
/// necessarily a data-serving node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapEndpoint {
    pub host: String,
    pub port: u16,
}

impl BootstrapEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for BootstrapEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Settings for one auto-discovered cluster.
///
/// Zero durations and a zero try count fall back to the defaults, matching
/// how unset values behave in deployment descriptors.
#[derive(Clone)]
pub struct ClusterConfig {
    pub bootstrap: BootstrapEndpoint,
    pub poll_interval: Duration,
    pub retry_count: u32,
    pub retry_delay: Duration,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub(crate) locator: Option<Arc<dyn NodeLocator>>,
    pub(crate) factory: Option<Arc<dyn NodeFactory>>,
}

impl ClusterConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            bootstrap: BootstrapEndpoint::new(host, port),
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry_count: DEFAULT_TRY_COUNT,
            retry_delay: DEFAULT_TRY_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            locator: None,
            factory: None,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_retries(mut self, count: u32, delay: Duration) -> Self {
        self.retry_count = count;
        self.retry_delay = delay;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Swap in a routing strategy other than the default ketama ring.
    pub fn with_locator(mut self, locator: Arc<dyn NodeLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    /// Swap in a node factory other than the default per-node TCP connector.
    pub fn with_node_factory(mut self, factory: Arc<dyn NodeFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub(crate) fn effective_poll_interval(&self) -> Duration {
        if self.poll_interval.is_zero() {
            DEFAULT_POLL_INTERVAL
        } else {
            self.poll_interval
        }
    }

    pub(crate) fn effective_retry_count(&self) -> u32 {
        if self.retry_count == 0 {
            DEFAULT_TRY_COUNT
        } else {
            self.retry_count
        }
    }

    pub(crate) fn effective_retry_delay(&self) -> Duration {
        if self.retry_delay.is_zero() {
            DEFAULT_TRY_DELAY
        } else {
            self.retry_delay
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.bootstrap.host.is_empty() {
            return Err(ConfigError::InvalidEndpoint(
                "bootstrap host is empty".to_string(),
            ));
        }
        if self.bootstrap.port == 0 {
            return Err(ConfigError::InvalidEndpoint(
                "bootstrap port is zero".to_string(),
            ));
        }
        if !self.bootstrap.host.contains(".cfg.") {
            // Managed configuration endpoints conventionally carry a .cfg.
            // infix; anything else is likely a data node or a test fixture.
            warn!(
                "bootstrap host {} does not look like a configuration endpoint",
                self.bootstrap.host
            );
        }
        Ok(())
    }
}

impl fmt::Debug for ClusterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterConfig")
            .field("bootstrap", &self.bootstrap)
            .field("poll_interval", &self.poll_interval)
            .field("retry_count", &self.retry_count)
            .field("retry_delay", &self.retry_delay)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("custom_locator", &self.locator.is_some())
            .field("custom_factory", &self.factory.is_some())
            .finish()
    }
}
