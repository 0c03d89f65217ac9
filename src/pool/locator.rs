//! Key-to-node routing: immutable snapshots and the default token ring.
//!
//! A key is routed to the node owning the first ring point at or above the
//! key's hash, wrapping to the start of the ring. Virtual nodes smooth the
//! distribution so that adding or removing one node only moves the keys that
//! node owned.

use std::hash::Hasher;

use siphasher::sip::SipHasher24;

use crate::node::LiveNode;

/// Hash a byte slice to a `u64` ring token using SipHash-2-4.
pub fn hash_bytes(data: &[u8]) -> u64 {
    let mut hasher = SipHasher24::new();
    hasher.write(data);
    hasher.finish()
}

/// Immutable mapping from key space to live nodes.
///
/// Replaced wholesale on each applied topology change and never mutated in
/// place; concurrent readers always observe a fully consistent ring.
#[derive(Debug, Clone)]
pub struct RoutingSnapshot {
    nodes: Vec<LiveNode>,
    /// `(token, index into nodes)` pairs, sorted by token.
    ring: Vec<(u64, usize)>,
}

impl RoutingSnapshot {
    /// Snapshot with no nodes; every lookup misses.
    pub fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            ring: Vec::new(),
        }
    }

    /// Build a snapshot from nodes and their ring points. Locators call this
    /// after placing tokens; the ring is sorted here.
    pub fn new(nodes: Vec<LiveNode>, mut ring: Vec<(u64, usize)>) -> Self {
        ring.sort_unstable();
        Self { nodes, ring }
    }

    /// The node owning `key`, or `None` for an empty snapshot.
    pub fn route(&self, key: &[u8]) -> Option<&LiveNode> {
        if self.ring.is_empty() {
            return None;
        }

        let token = hash_bytes(key);
        let at = match self.ring.binary_search_by(|(t, _)| t.cmp(&token)) {
            Ok(at) => at,
            Err(at) if at == self.ring.len() => 0,
            Err(at) => at,
        };
        self.nodes.get(self.ring[at].1)
    }

    pub fn nodes(&self) -> &[LiveNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Pluggable routing strategy.
///
/// Injected as an instance through configuration; implementations must be
/// shareable across threads.
pub trait NodeLocator: Send + Sync {
    /// Derive an immutable routing snapshot from the given live set.
    fn build(&self, nodes: &[LiveNode]) -> RoutingSnapshot;
}

/// Consistent-hash locator with virtual nodes, ketama style.
///
/// Ring points are derived from `host:port` so a node keeps its tokens across
/// rebuilds regardless of its position in the membership list.
#[derive(Debug, Clone)]
pub struct KetamaLocator {
    points_per_node: usize,
}

/// Virtual nodes per physical node in the default ring.
pub const DEFAULT_POINTS_PER_NODE: usize = 160;

impl KetamaLocator {
    pub fn new(points_per_node: usize) -> Self {
        Self {
            points_per_node: points_per_node.max(1),
        }
    }
}

impl Default for KetamaLocator {
    fn default() -> Self {
        Self::new(DEFAULT_POINTS_PER_NODE)
    }
}

impl NodeLocator for KetamaLocator {
    fn build(&self, nodes: &[LiveNode]) -> RoutingSnapshot {
        let mut ring = Vec::with_capacity(nodes.len() * self.points_per_node);
        for (at, node) in nodes.iter().enumerate() {
            for point in 0..self.points_per_node {
                let label = format!("{}-{}", node.address().endpoint(), point);
                ring.push((hash_bytes(label.as_bytes()), at));
            }
        }
        RoutingSnapshot::new(nodes.to_vec(), ring)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::NodeAddress;
    use crate::node::NodeConnection;
    use std::sync::Arc;

    #[derive(Debug)]
    struct FakeConnection {
        address: NodeAddress,
    }

    impl NodeConnection for FakeConnection {
        fn address(&self) -> &NodeAddress {
            &self.address
        }
    }

    fn live_node(name: &str, host: &str) -> LiveNode {
        let address = NodeAddress::new(name, host, 11211);
        LiveNode::new(
            address.clone(),
            Arc::new(FakeConnection { address }),
        )
    }

    fn sample_keys() -> Vec<Vec<u8>> {
        (0..500).map(|n| format!("user:{n}").into_bytes()).collect()
    }

    #[test]
    fn empty_snapshot_routes_nothing() {
        assert!(RoutingSnapshot::empty().route(b"any").is_none());
    }

    #[test]
    fn routing_is_deterministic() {
        let locator = KetamaLocator::default();
        let nodes = vec![live_node("a", "10.0.0.1"), live_node("b", "10.0.0.2")];

        let first = locator.build(&nodes);
        let second = locator.build(&nodes);

        for key in sample_keys() {
            assert_eq!(
                first.route(&key).unwrap().address(),
                second.route(&key).unwrap().address()
            );
        }
    }

    #[test]
    fn all_nodes_receive_some_keys() {
        let locator = KetamaLocator::default();
        let nodes = vec![
            live_node("a", "10.0.0.1"),
            live_node("b", "10.0.0.2"),
            live_node("c", "10.0.0.3"),
        ];
        let snapshot = locator.build(&nodes);

        let mut hits = [0usize; 3];
        for key in sample_keys() {
            let owner = snapshot.route(&key).unwrap();
            let at = nodes
                .iter()
                .position(|n| n.address() == owner.address())
                .unwrap();
            hits[at] += 1;
        }

        assert!(hits.iter().all(|&h| h > 0), "unbalanced ring: {hits:?}");
    }

    #[test]
    fn removing_a_node_only_moves_its_keys() {
        let locator = KetamaLocator::default();
        let full = vec![
            live_node("a", "10.0.0.1"),
            live_node("b", "10.0.0.2"),
            live_node("c", "10.0.0.3"),
        ];
        let without_c = full[..2].to_vec();

        let before = locator.build(&full);
        let after = locator.build(&without_c);

        for key in sample_keys() {
            let owner_before = before.route(&key).unwrap().address().clone();
            if owner_before.host != "10.0.0.3" {
                let owner_after = after.route(&key).unwrap().address();
                assert_eq!(&owner_before, owner_after, "key moved off an unchanged node");
            }
        }
    }

    #[test]
    fn adding_a_node_keeps_other_owners() {
        let locator = KetamaLocator::default();
        let two = vec![live_node("a", "10.0.0.1"), live_node("b", "10.0.0.2")];
        let three = vec![
            live_node("a", "10.0.0.1"),
            live_node("b", "10.0.0.2"),
            live_node("c", "10.0.0.3"),
        ];

        let before = locator.build(&two);
        let after = locator.build(&three);

        for key in sample_keys() {
            let owner_after = after.route(&key).unwrap().address().clone();
            if owner_after.host != "10.0.0.3" {
                let owner_before = before.route(&key).unwrap().address();
                assert_eq!(owner_before, &owner_after);
            }
        }
    }
}
