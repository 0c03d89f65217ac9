//! Live node pool and topology reconciliation.
//!
//! The pool owns every connection handle and the published routing snapshot.
//! Reconciliations are serialized against each other but never block routing
//! lookups: lookups clone the current snapshot reference and route against
//! an immutable ring.

pub mod locator;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use log::{debug, info, warn};
use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::descriptor::{MembershipDescriptor, NodeAddress};
use crate::error::IntegrityError;
use crate::node::{LiveNode, NodeConnection, NodeFactory};
use locator::{NodeLocator, RoutingSnapshot};

/// What a reconciliation pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Descriptor version was below what the pool already carries.
    Stale,
    /// Node set already matched the descriptor; nothing republished.
    Unchanged,
    /// A new snapshot was published (or additions were attempted).
    Applied {
        added: usize,
        removed: usize,
        /// Nodes whose construction failed; they stay out of the pool and
        /// are attempted again when the same membership is seen next poll.
        failed: usize,
    },
}

/// Connection pool plus consistent-hash routing for one cluster.
pub struct RoutingPool {
    factory: Arc<dyn NodeFactory>,
    locator: Arc<dyn NodeLocator>,
    nodes: DashMap<NodeAddress, LiveNode>,
    snapshot: RwLock<Arc<RoutingSnapshot>>,
    topology_version: AtomicU64,
    primed: AtomicBool,
    /// Serializes reconciliations; lookups never take this.
    reconcile_gate: Mutex<()>,
}

impl RoutingPool {
    pub fn new(factory: Arc<dyn NodeFactory>, locator: Arc<dyn NodeLocator>) -> Self {
        Self {
            factory,
            locator,
            nodes: DashMap::new(),
            snapshot: RwLock::new(Arc::new(RoutingSnapshot::empty())),
            topology_version: AtomicU64::new(0),
            primed: AtomicBool::new(false),
            reconcile_gate: Mutex::new(()),
        }
    }

    /// Bring the live set and routing ring in line with `descriptor`.
    ///
    /// Safe to call concurrently with any number of lookups; concurrent
    /// reconciliations queue behind each other. A stale descriptor is a
    /// side-effect-free no-op.
    pub async fn reconcile(
        &self,
        descriptor: &MembershipDescriptor,
    ) -> Result<ReconcileOutcome, IntegrityError> {
        let _gate = self.reconcile_gate.lock().await;

        if self.primed.load(Ordering::Acquire)
            && descriptor.version < self.topology_version.load(Ordering::Acquire)
        {
            debug!(
                "ignoring stale topology v{} (pool at v{})",
                descriptor.version,
                self.topology_version.load(Ordering::Acquire)
            );
            return Ok(ReconcileOutcome::Stale);
        }

        let current: Vec<NodeAddress> = self.nodes.iter().map(|e| e.key().clone()).collect();

        let mut added: Vec<NodeAddress> = Vec::new();
        for address in &descriptor.nodes {
            if !current.contains(address) && !added.contains(address) {
                added.push(address.clone());
            }
        }
        let removed: Vec<NodeAddress> = current
            .iter()
            .filter(|a| !descriptor.nodes.contains(a))
            .cloned()
            .collect();

        if added.is_empty() && removed.is_empty() {
            self.topology_version
                .store(descriptor.version, Ordering::Release);
            self.primed.store(true, Ordering::Release);
            debug!(
                "topology v{} matches the current node set, nothing to do",
                descriptor.version
            );
            return Ok(ReconcileOutcome::Unchanged);
        }

        // One bad node must not abort the whole pass: construct what we can,
        // skip the rest for this cycle.
        let built: Vec<LiveNode> = join_all(added.iter().map(|address| async move {
            match self.factory.create(address).await {
                Ok(connection) => Some(LiveNode::new(address.clone(), connection)),
                Err(err) => {
                    warn!("skipping node this cycle: {err}");
                    None
                }
            }
        }))
        .await
        .into_iter()
        .flatten()
        .collect();
        let failed = added.len() - built.len();

        if built.is_empty() && removed.is_empty() {
            // Every addition failed and nothing left; keep the snapshot as
            // is and let the next poll try again.
            return Ok(ReconcileOutcome::Applied {
                added: 0,
                removed: 0,
                failed,
            });
        }

        let mut next: Vec<LiveNode> = current
            .iter()
            .filter(|a| descriptor.nodes.contains(a))
            .filter_map(|a| self.nodes.get(a).map(|e| e.value().clone()))
            .collect();
        next.extend(built.iter().cloned());

        if next.is_empty() {
            warn!(
                "topology v{} would empty the pool, keeping {} nodes",
                descriptor.version,
                current.len()
            );
            return Err(IntegrityError::EmptyTopologyRejected);
        }

        let snapshot = Arc::new(self.locator.build(&next));
        *self.snapshot.write() = snapshot;
        self.topology_version
            .store(descriptor.version, Ordering::Release);
        self.primed.store(true, Ordering::Release);

        // Published; from here on no new request routes to a removed node.
        // Holders of the old snapshot finish against their own handles.
        for address in &removed {
            if let Some((_, node)) = self.nodes.remove(address) {
                debug!("released node {}", node.address());
            }
        }
        let added_count = built.len();
        for node in built {
            self.nodes.insert(node.address().clone(), node);
        }

        info!(
            "applied topology v{}: {} added, {} removed, {} failed, {} live",
            descriptor.version,
            added_count,
            removed.len(),
            failed,
            self.nodes.len()
        );

        Ok(ReconcileOutcome::Applied {
            added: added_count,
            removed: removed.len(),
            failed,
        })
    }

    /// Connection handle owning `key`, from the current snapshot.
    ///
    /// Never blocks on discovery or reconciliation; misses while the pool is
    /// not yet primed.
    pub fn lookup(&self, key: &[u8]) -> Option<Arc<dyn NodeConnection>> {
        let snapshot = self.snapshot.read().clone();
        snapshot.route(key).map(LiveNode::connection)
    }

    /// The currently published snapshot.
    pub fn snapshot(&self) -> Arc<RoutingSnapshot> {
        self.snapshot.read().clone()
    }

    /// Version of the last descriptor that reached the pool.
    pub fn topology_version(&self) -> u64 {
        self.topology_version.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Addresses of all live nodes, for diagnostics.
    pub fn addresses(&self) -> Vec<NodeAddress> {
        self.nodes.iter().map(|e| e.key().clone()).collect()
    }
}
