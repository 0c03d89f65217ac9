//! Background polling of the cluster configuration endpoint.
//!
//! One task per cluster queries the bootstrap endpoint, parses the returned
//! membership descriptor and pushes version changes into the routing pool.
//! Transport and parse failures stay inside the retry cycle here; cache
//! traffic keeps routing against the last applied snapshot no matter what
//! discovery does.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::ClusterConfig;
use crate::descriptor::MembershipDescriptor;
use crate::error::DiscoveryError;
use crate::pool::{ReconcileOutcome, RoutingPool};

use super::transport::DiscoveryTransport;

/// State owned exclusively by the polling task.
struct PollState {
    /// Highest descriptor version fully applied to the pool. `None` until
    /// the first successful application.
    last_applied_version: Option<u64>,
    consecutive_failures: u32,
}

struct PollerShared {
    degraded: AtomicBool,
    stopped: AtomicBool,
    stop: Notify,
}

/// Handle to the background discovery task for one cluster.
///
/// Dropping the handle does not stop the task; call [`stop`](Self::stop) or
/// [`shutdown`](Self::shutdown).
pub struct DiscoveryPoller {
    shared: Arc<PollerShared>,
    task: JoinHandle<()>,
}

impl DiscoveryPoller {
    /// Spawn the polling task. The first query fires immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        config: ClusterConfig,
        transport: Arc<dyn DiscoveryTransport>,
        pool: Arc<RoutingPool>,
    ) -> Self {
        let shared = Arc::new(PollerShared {
            degraded: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            stop: Notify::new(),
        });

        let task_shared = shared.clone();
        let task = tokio::spawn(async move {
            run_loop(config, transport, pool, task_shared).await;
        });

        Self { shared, task }
    }

    /// True once the retry ceiling has been exceeded since the last
    /// successful poll. Advisory only; routing keeps working on the last
    /// known-good topology.
    pub fn degraded(&self) -> bool {
        self.shared.degraded.load(Ordering::Acquire)
    }

    /// Ask the task to stop. Cooperative: an in-flight query finishes or
    /// fails on its own timeout, then no further cycles are scheduled. Pool
    /// state is left untouched.
    pub fn stop(&self) {
        self.shared.stopped.store(true, Ordering::Release);
        self.shared.stop.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }

    /// Stop and wait for the task to finish.
    pub async fn shutdown(self) {
        self.stop();
        let _ = self.task.await;
    }
}

async fn run_loop(
    config: ClusterConfig,
    transport: Arc<dyn DiscoveryTransport>,
    pool: Arc<RoutingPool>,
    shared: Arc<PollerShared>,
) {
    let poll_interval = config.effective_poll_interval();
    let retry_count = config.effective_retry_count();
    let retry_delay = config.effective_retry_delay();

    let mut state = PollState {
        last_applied_version: None,
        consecutive_failures: 0,
    };

    info!(
        "cluster discovery started against {}, polling every {:?}",
        config.bootstrap, poll_interval
    );

    loop {
        if shared.stopped.load(Ordering::Acquire) {
            break;
        }

        let delay = match poll_cycle(&config, transport.as_ref(), &pool, &mut state).await {
            Ok(()) => {
                if state.consecutive_failures > 0 {
                    info!(
                        "discovery recovered after {} failed attempts",
                        state.consecutive_failures
                    );
                }
                state.consecutive_failures = 0;
                shared.degraded.store(false, Ordering::Release);
                poll_interval
            }
            Err(err) => {
                state.consecutive_failures += 1;
                if state.consecutive_failures < retry_count {
                    warn!(
                        "discovery attempt {}/{} against {} failed: {err}, retrying in {:?}",
                        state.consecutive_failures, retry_count, config.bootstrap, retry_delay
                    );
                    retry_delay
                } else {
                    if !shared.degraded.swap(true, Ordering::AcqRel) {
                        error!(
                            "discovery degraded after {} consecutive failures ({err}); \
                             routing continues on topology v{}",
                            state.consecutive_failures,
                            pool.topology_version()
                        );
                    }
                    poll_interval
                }
            }
        };

        tokio::select! {
            _ = shared.stop.notified() => break,
            _ = time::sleep(delay) => {}
        }
    }

    shared.stopped.store(true, Ordering::Release);
    info!("cluster discovery against {} stopped", config.bootstrap);
}

/// One full query-parse-apply cycle.
async fn poll_cycle(
    config: &ClusterConfig,
    transport: &dyn DiscoveryTransport,
    pool: &RoutingPool,
    state: &mut PollState,
) -> Result<(), DiscoveryError> {
    let raw = transport.query(&config.bootstrap).await?;
    let descriptor = MembershipDescriptor::parse(&raw)?;

    if state
        .last_applied_version
        .is_some_and(|applied| descriptor.version <= applied)
    {
        debug!(
            "descriptor v{} is not newer than applied v{:?}, nothing to do",
            descriptor.version, state.last_applied_version
        );
        return Ok(());
    }

    match pool.reconcile(&descriptor).await {
        Ok(ReconcileOutcome::Applied { failed, .. }) if failed > 0 => {
            // Keep the applied version where it was so the failed nodes are
            // attempted again when this membership is seen on the next poll.
            debug!(
                "topology v{} partially applied, {failed} nodes pending retry",
                descriptor.version
            );
            Ok(())
        }
        Ok(_) => {
            state.last_applied_version = Some(descriptor.version);
            Ok(())
        }
        Err(err) => {
            // The endpoint answered; re-sending the same payload cannot
            // succeed, so this does not count against the retry ceiling.
            warn!("topology v{} rejected: {err}", descriptor.version);
            Ok(())
        }
    }
}
