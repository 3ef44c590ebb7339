//! Node registries: uniquely-located point nodes and their panel attachments.
//!
//! Model
//! - A `NodeRegistry` owns its nodes; the location is the key (exact float
//!   equality, no tolerance). Storage order is insertion order and is what
//!   `generate_node_list` and positional save/load rely on.
//! - A node's `connected_panels` is the single source of truth for "in use":
//!   `remove_node` refuses attached nodes.
//! - `attach_node`/`detach_node` are crate-internal; only `PanelTopology`
//!   mutates attachments. The first attach and last detach flip the registry
//!   between unconnected and attached to one topology, and fire the listener.
//! - `NodeRegistries` is the arena that topologies reach nodes through.

mod types;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use nalgebra::{Isometry3, Point3, Vector3};
use tracing::debug;

use crate::topology::{PanelIndex, TopologyId};

pub(crate) use types::location_key;
use types::LocationKey;
pub use types::{AttachmentChange, Node, NodeId, RegistryId};

/// Default node size carried into saves.
pub const DEFAULT_NODE_SIZE: f64 = 10.0;

/// Default node color (RGBA).
pub const DEFAULT_NODE_COLOR: [u8; 4] = [200, 200, 200, 255];

type AttachmentListener = Box<dyn FnMut(RegistryId, AttachmentChange) + Send>;

/// Per-container collection of uniquely-located nodes.
pub struct NodeRegistry {
    id: RegistryId,
    nodes: Vec<Node>,
    index: HashMap<LocationKey, usize>,
    transform: Isometry3<f64>,
    editable: bool,
    node_size: f64,
    default_color: [u8; 4],
    attached: Option<TopologyId>,
    attached_nodes: usize,
    listener: Option<AttachmentListener>,
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("id", &self.id)
            .field("nodes", &self.nodes)
            .field("transform", &self.transform)
            .field("editable", &self.editable)
            .field("node_size", &self.node_size)
            .field("attached", &self.attached)
            .field("attached_nodes", &self.attached_nodes)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

impl NodeRegistry {
    pub fn new(id: RegistryId) -> Self {
        Self {
            id,
            nodes: Vec::new(),
            index: HashMap::new(),
            transform: Isometry3::identity(),
            editable: false,
            node_size: DEFAULT_NODE_SIZE,
            default_color: DEFAULT_NODE_COLOR,
            attached: None,
            attached_nodes: 0,
            listener: None,
        }
    }

    #[inline]
    pub fn id(&self) -> RegistryId {
        self.id
    }

    /// Insert a node; `false` on duplicate or non-finite location.
    pub fn add_node(&mut self, location: Vector3<f64>) -> bool {
        if !location.iter().all(|c| c.is_finite()) {
            return false;
        }
        let key = location_key(&location);
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.nodes.len());
        self.nodes.push(Node::new(location, self.default_color));
        true
    }

    /// Remove an unattached node; `false` if absent or still attached.
    pub fn remove_node(&mut self, location: Vector3<f64>) -> bool {
        let key = location_key(&location);
        let Some(&idx) = self.index.get(&key) else {
            return false;
        };
        if self.nodes[idx].is_attached() {
            return false;
        }
        self.nodes.remove(idx);
        self.index.remove(&key);
        for slot in self.index.values_mut() {
            if *slot > idx {
                *slot -= 1;
            }
        }
        true
    }

    /// Record that `panel` of `topology` uses the node at `location`.
    ///
    /// `false` if the node is absent, the registry is attached to another
    /// topology, or the panel is already recorded.
    pub(crate) fn attach_node(
        &mut self,
        location: Vector3<f64>,
        topology: TopologyId,
        panel: PanelIndex,
    ) -> bool {
        if self.attached.is_some_and(|t| t != topology) {
            return false;
        }
        let Some(&idx) = self.index.get(&location_key(&location)) else {
            return false;
        };
        let node = &mut self.nodes[idx];
        let first = !node.is_attached();
        if !node.connected_panels.insert(panel) {
            return false;
        }
        if first {
            self.attached_nodes += 1;
            if self.attached.is_none() {
                self.attached = Some(topology);
                self.notify(AttachmentChange::Attached(topology));
            }
        }
        true
    }

    /// Inverse of `attach_node`; `false` if the node or the record is absent.
    pub(crate) fn detach_node(&mut self, location: Vector3<f64>, panel: PanelIndex) -> bool {
        let Some(&idx) = self.index.get(&location_key(&location)) else {
            return false;
        };
        let node = &mut self.nodes[idx];
        if !node.connected_panels.remove(&panel) {
            return false;
        }
        if !node.is_attached() {
            self.attached_nodes = self.attached_nodes.saturating_sub(1);
            if self.attached_nodes == 0 {
                if let Some(topology) = self.attached.take() {
                    self.notify(AttachmentChange::Detached(topology));
                }
            }
        }
        true
    }

    pub fn find_node(&self, location: Vector3<f64>) -> Option<NodeId> {
        self.index
            .get(&location_key(&location))
            .map(|&idx| NodeId::new(self.id, self.nodes[idx].location))
    }

    pub fn node(&self, location: Vector3<f64>) -> Option<&Node> {
        self.index
            .get(&location_key(&location))
            .map(|&idx| &self.nodes[idx])
    }

    #[inline]
    pub fn contains(&self, location: Vector3<f64>) -> bool {
        self.index.contains_key(&location_key(&location))
    }

    /// Panels using the node, ascending; empty if the node is absent.
    pub fn attached_panels(&self, location: Vector3<f64>) -> Vec<PanelIndex> {
        self.node(location)
            .map(|n| n.connected_panels.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Snapshot of node ids in storage order.
    pub fn generate_node_list(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .map(|n| NodeId::new(self.id, n.location))
            .collect()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Replace the content at construction time. Duplicate and non-finite
    /// locations are dropped. `false` (and no change) while any node is attached.
    pub fn set_nodes_default(&mut self, locations: &[Vector3<f64>], editable: bool) -> bool {
        if self.attached_nodes > 0 {
            return false;
        }
        self.nodes.clear();
        self.index.clear();
        for &location in locations {
            self.add_node(location);
        }
        self.editable = editable;
        true
    }

    pub fn set_node_color(&mut self, location: Vector3<f64>, color: [u8; 4]) -> bool {
        match self.index.get(&location_key(&location)) {
            Some(&idx) => {
                self.nodes[idx].color = color;
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn transform(&self) -> &Isometry3<f64> {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: Isometry3<f64>) {
        self.transform = transform;
    }

    /// Local location to world space.
    #[inline]
    pub fn to_world(&self, location: Vector3<f64>) -> Vector3<f64> {
        self.transform.transform_point(&Point3::from(location)).coords
    }

    /// World position to this registry's local space.
    #[inline]
    pub fn from_world(&self, world: Vector3<f64>) -> Vector3<f64> {
        self.transform
            .inverse_transform_point(&Point3::from(world))
            .coords
    }

    #[inline]
    pub fn editable(&self) -> bool {
        self.editable
    }

    pub fn set_editable(&mut self, editable: bool) {
        self.editable = editable;
    }

    #[inline]
    pub fn node_size(&self) -> f64 {
        self.node_size
    }

    pub fn set_node_size(&mut self, node_size: f64) {
        self.node_size = node_size;
    }

    #[inline]
    pub fn attached_topology(&self) -> Option<TopologyId> {
        self.attached
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.attached.is_some()
    }

    /// Number of nodes with at least one panel.
    #[inline]
    pub fn attached_nodes(&self) -> usize {
        self.attached_nodes
    }

    /// Register the transition listener, replacing any previous one.
    pub fn on_attachment_change<F>(&mut self, listener: F)
    where
        F: FnMut(RegistryId, AttachmentChange) + Send + 'static,
    {
        self.listener = Some(Box::new(listener));
    }

    fn notify(&mut self, change: AttachmentChange) {
        debug!(registry = %self.id, ?change, "registry_attachment");
        if let Some(listener) = self.listener.as_mut() {
            listener(self.id, change);
        }
    }
}

/// Arena of registries addressed by `RegistryId`.
#[derive(Debug, Default)]
pub struct NodeRegistries {
    registries: BTreeMap<RegistryId, NodeRegistry>,
    next_id: u32,
}

impl NodeRegistries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry and return its id.
    pub fn create(&mut self) -> RegistryId {
        let id = RegistryId(self.next_id);
        self.next_id += 1;
        self.registries.insert(id, NodeRegistry::new(id));
        id
    }

    #[inline]
    pub fn get(&self, id: RegistryId) -> Option<&NodeRegistry> {
        self.registries.get(&id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: RegistryId) -> Option<&mut NodeRegistry> {
        self.registries.get_mut(&id)
    }

    /// Drop a registry. Refused (`None`) while any of its nodes is attached.
    pub fn remove(&mut self, id: RegistryId) -> Option<NodeRegistry> {
        if self.registries.get(&id)?.is_connected() {
            return None;
        }
        self.registries.remove(&id)
    }

    /// Whether `node` names a live node.
    pub fn contains(&self, node: &NodeId) -> bool {
        self.get(node.registry)
            .is_some_and(|r| r.contains(node.location))
    }

    /// World position of a live node.
    pub fn node_world(&self, node: &NodeId) -> Option<Vector3<f64>> {
        let registry = self.get(node.registry)?;
        registry
            .contains(node.location)
            .then(|| registry.to_world(node.location))
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeRegistry> {
        self.registries.values()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.registries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.registries.is_empty()
    }
}
