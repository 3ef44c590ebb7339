//! Node-to-node reachability through panels.
//!
//! Two nodes are linked when a panel of this topology uses both. Nodes of a
//! registry that is not editable belong to one rigid part and are all linked
//! to each other. The search is best-first on world distance to the target.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use tracing::debug;

use super::PanelTopology;
use crate::registry::{NodeId, NodeRegistries};

/// Frontier entry; the heap pops the smallest distance first.
struct Frontier {
    distance: f64,
    node: NodeId,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other.distance.total_cmp(&self.distance)
    }
}

impl PanelTopology {
    /// Whether `end` can be reached from `start` by walking panels of this
    /// topology and rigid (non-editable) registries.
    ///
    /// A live node reaches itself. Unknown nodes reach nothing.
    pub fn are_nodes_connected(
        &self,
        registries: &NodeRegistries,
        start: NodeId,
        end: NodeId,
    ) -> bool {
        if !registries.contains(&start) {
            return false;
        }
        let Some(target) = registries.node_world(&end) else {
            return false;
        };
        if start == end {
            return true;
        }
        let distance = |node: &NodeId| {
            registries
                .node_world(node)
                .map_or(f64::INFINITY, |w| (w - target).norm())
        };

        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut frontier = BinaryHeap::new();
        frontier.push(Frontier {
            distance: distance(&start),
            node: start,
        });
        while let Some(Frontier { node, .. }) = frontier.pop() {
            if node == end {
                debug!(topology = %self.id, visited = visited.len(), "nodes_connected");
                return true;
            }
            if !visited.insert(node) {
                continue;
            }
            for next in self.linked_nodes(registries, &node) {
                if !visited.contains(&next) {
                    frontier.push(Frontier {
                        distance: distance(&next),
                        node: next,
                    });
                }
            }
        }
        debug!(topology = %self.id, visited = visited.len(), "nodes_not_connected");
        false
    }

    /// Nodes one hop away from `node`.
    fn linked_nodes(&self, registries: &NodeRegistries, node: &NodeId) -> Vec<NodeId> {
        let Some(registry) = registries.get(node.registry) else {
            return Vec::new();
        };
        let mut linked: Vec<NodeId> = Vec::new();
        if !registry.editable() {
            linked.extend(
                registry
                    .nodes()
                    .iter()
                    .map(|n| NodeId::new(registry.id(), n.location)),
            );
        }
        if registry.attached_topology() == Some(self.id) {
            for index in registry.attached_panels(node.location) {
                if let Some(panel) = self.panel(index) {
                    linked.extend_from_slice(panel.nodes());
                }
            }
        }
        linked
    }
}
