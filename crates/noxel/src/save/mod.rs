//! Flattening the node/panel graph to plain records and back.
//!
//! Purpose
//! - Persistence and network transport need the graph without live handles.
//!   Nodes are replaced by `NodeRedirector` triples
//!   `(parent_index, container_index, node_index)`: component, registry within
//!   the component, and position in the registry's storage order.
//!
//! Model
//! - `save_nodes` fills a forward map `NodeId → NodeRedirector`; `save_panels`
//!   translates every panel through it.
//! - `load_nodes` fills the reverse map; `load_panels` translates back and
//!   re-adds every panel through `PanelTopology::add_panel`.
//! - Editable registries carry their locations in the save. Non-editable ones
//!   carry none: their content is rebuilt by the owner, and the reverse map is
//!   positional. That relies on the owner producing the same node order on
//!   every run; nothing here can check it.
//!
//! Misses are logged and skipped, never fatal: a save with a missing redirector
//! is lossy (`error!`), a load that cannot resolve or re-add something reports
//! it in `LoadReport` (`warn!`).

use std::collections::HashMap;

use nalgebra::{Isometry3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{SaveError, SaveResult};
use crate::registry::{NodeId, NodeRegistries, NodeRegistry, RegistryId, DEFAULT_NODE_SIZE};
use crate::topology::{PanelData, PanelIndex, PanelTopology};

/// Serializable stand-in for a `NodeId`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeRedirector {
    pub parent_index: usize,
    pub container_index: usize,
    pub node_index: usize,
}

impl NodeRedirector {
    pub fn new(parent_index: usize, container_index: usize, node_index: usize) -> Self {
        Self {
            parent_index,
            container_index,
            node_index,
        }
    }
}

/// Forward map built while saving.
pub type SaveRedirectorMap = HashMap<NodeId, NodeRedirector>;
/// Reverse map built while loading.
pub type LoadRedirectorMap = HashMap<NodeRedirector, NodeId>;

/// One registry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodesSave {
    pub component_name: String,
    pub node_size: f64,
    /// Local locations in storage order; empty for non-editable registries.
    #[serde(default)]
    pub nodes: Vec<Vector3<f64>>,
}

impl NodesSave {
    pub fn new(component_name: impl Into<String>, node_size: f64) -> Self {
        Self {
            component_name: component_name.into(),
            node_size,
            nodes: Vec::new(),
        }
    }
}

impl Default for NodesSave {
    fn default() -> Self {
        Self::new("", DEFAULT_NODE_SIZE)
    }
}

/// One panel. The index is informational; loading assigns fresh indices.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PanelSave {
    pub panel_index: PanelIndex,
    pub nodes: Vec<NodeRedirector>,
    pub thickness_normal: f64,
    pub thickness_anti_normal: f64,
    #[serde(rename = "virtual", default)]
    pub is_virtual: bool,
}

/// One topology.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NoxelSave {
    pub component_name: String,
    #[serde(default)]
    pub panels: Vec<PanelSave>,
}

/// One component: its placement plus every registry and topology it holds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentSave {
    pub component_id: String,
    pub transform: Isometry3<f64>,
    #[serde(default)]
    pub saved_nodes: Vec<NodesSave>,
    #[serde(default)]
    pub saved_noxels: Vec<NoxelSave>,
}

impl ComponentSave {
    pub fn new(component_id: impl Into<String>, transform: Isometry3<f64>) -> Self {
        Self {
            component_id: component_id.into(),
            transform,
            saved_nodes: Vec::new(),
            saved_noxels: Vec::new(),
        }
    }
}

/// Default scale of a fresh craft.
pub const DEFAULT_CRAFT_SCALE: f64 = 10.0;

/// A whole craft.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CraftSave {
    pub craft_name: String,
    pub craft_scale: f64,
    #[serde(default)]
    pub components: Vec<ComponentSave>,
}

impl CraftSave {
    pub fn new(craft_name: impl Into<String>, craft_scale: f64) -> Self {
        Self {
            craft_name: craft_name.into(),
            craft_scale,
            components: Vec::new(),
        }
    }

    /// Pretty-printed JSON text.
    pub fn to_json(&self) -> SaveResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> SaveResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

impl Default for CraftSave {
    fn default() -> Self {
        Self::new("", DEFAULT_CRAFT_SCALE)
    }
}

/// What a load could not restore.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Panels re-added.
    pub panels: usize,
    /// Saved panels that `add_panel` rejected.
    pub rejected: usize,
    /// Redirectors with no counterpart in the reverse map.
    pub missing_nodes: usize,
}

impl LoadReport {
    #[inline]
    pub fn is_lossless(&self) -> bool {
        self.rejected == 0 && self.missing_nodes == 0
    }

    pub(crate) fn absorb(&mut self, other: LoadReport) {
        self.panels += other.panels;
        self.rejected += other.rejected;
        self.missing_nodes += other.missing_nodes;
    }
}

/// Record `registry` and extend `map` with a redirector per node.
///
/// Locations are only written for editable registries.
pub fn save_nodes(
    registry: &NodeRegistry,
    parent_index: usize,
    container_index: usize,
    map: &mut SaveRedirectorMap,
) -> NodesSave {
    let mut save = NodesSave::new("", registry.node_size());
    for (i, node) in registry.generate_node_list().into_iter().enumerate() {
        if registry.editable() {
            save.nodes.push(node.location);
        }
        map.insert(node, NodeRedirector::new(parent_index, container_index, i));
    }
    save
}

/// Restore `registry` from `save` and extend `map` with the reverse entries.
///
/// Editable: clear, apply `node_size`, re-add the saved locations. Nodes still
/// attached to a panel cannot be cleared and are kept (`warn!`).
/// Non-editable: the content is left alone and mapped by position.
/// Returns the number of redirectors mapped.
pub fn load_nodes(
    registry: &mut NodeRegistry,
    parent_index: usize,
    container_index: usize,
    save: &NodesSave,
    map: &mut LoadRedirectorMap,
) -> usize {
    let redirector = |i| NodeRedirector::new(parent_index, container_index, i);
    if !registry.editable() {
        let nodes = registry.generate_node_list();
        for (i, node) in nodes.iter().enumerate() {
            map.insert(redirector(i), *node);
        }
        return nodes.len();
    }

    for old in registry.generate_node_list() {
        if !registry.remove_node(old.location) {
            warn!(node = %old, "node_not_cleared");
        }
    }
    registry.set_node_size(save.node_size);
    let mut mapped = 0;
    for (i, &location) in save.nodes.iter().enumerate() {
        // A kept node at the same location still resolves.
        if registry.add_node(location) || registry.contains(location) {
            map.insert(redirector(i), NodeId::new(registry.id(), location));
            mapped += 1;
        } else {
            warn!(registry = %registry.id(), index = i, "node_not_restored");
        }
    }
    debug!(registry = %registry.id(), mapped, "nodes_loaded");
    mapped
}

/// Record every panel of `topology` in storage order.
///
/// A node missing from `map` is an inconsistency: it is logged and dropped
/// from that panel, which makes the save lossy.
pub fn save_panels(topology: &PanelTopology, map: &SaveRedirectorMap) -> NoxelSave {
    let mut save = NoxelSave::default();
    for panel in topology.panels() {
        let mut nodes = Vec::with_capacity(panel.nodes().len());
        for node in panel.nodes() {
            match map.get(node) {
                Some(r) => nodes.push(*r),
                None => error!(topology = %topology.id(), panel = %panel.index(), %node, "redirector_missing"),
            }
        }
        save.panels.push(PanelSave {
            panel_index: panel.index(),
            nodes,
            thickness_normal: panel.thickness_normal(),
            thickness_anti_normal: panel.thickness_anti_normal(),
            is_virtual: panel.is_virtual(),
        });
    }
    save
}

/// Remove every panel of `topology`, then re-add the saved ones.
///
/// Unresolved redirectors are skipped; the panel is still attempted with the
/// nodes that did resolve and may then be rejected.
pub fn load_panels(
    topology: &mut PanelTopology,
    registries: &mut NodeRegistries,
    map: &LoadRedirectorMap,
    save: &NoxelSave,
) -> LoadReport {
    clear_panels(topology, registries);
    let mut report = LoadReport::default();
    for saved in &save.panels {
        let mut nodes = Vec::with_capacity(saved.nodes.len());
        for r in &saved.nodes {
            match map.get(r) {
                Some(node) => nodes.push(*node),
                None => {
                    warn!(topology = %topology.id(), redirector = ?r, "redirector_unresolved");
                    report.missing_nodes += 1;
                }
            }
        }
        let data = PanelData::with_thicknesses(
            nodes,
            saved.thickness_normal,
            saved.thickness_anti_normal,
            saved.is_virtual,
        );
        match topology.add_panel(registries, &data) {
            Ok(_) => report.panels += 1,
            Err(err) => {
                warn!(topology = %topology.id(), saved = %saved.panel_index, %err, "panel_not_restored");
                report.rejected += 1;
            }
        }
    }
    debug!(topology = %topology.id(), panels = report.panels, "panels_loaded");
    report
}

/// Remove every panel through the regular edit path.
pub(crate) fn clear_panels(topology: &mut PanelTopology, registries: &mut NodeRegistries) {
    let indices: Vec<PanelIndex> = topology.panels().iter().map(|p| p.index()).collect();
    for index in indices {
        if let Err(err) = topology.remove_panel(registries, index) {
            warn!(topology = %topology.id(), %index, %err, "panel_not_cleared");
        }
    }
}

/// One topology with the registries it uses, for transport between peers that
/// already share the registry handles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkSave {
    pub registries: Vec<RegistryId>,
    pub nodes: Vec<NodesSave>,
    pub noxel: NoxelSave,
}

/// Snapshot `topology` and its connected registries (`parent_index` 0,
/// `container_index` = position in `registries`).
pub fn save_network(topology: &PanelTopology, registries: &NodeRegistries) -> SaveResult<NetworkSave> {
    let mut map = SaveRedirectorMap::new();
    let ids: Vec<RegistryId> = topology.connected_registries().iter().copied().collect();
    let mut nodes = Vec::with_capacity(ids.len());
    for (i, &id) in ids.iter().enumerate() {
        let registry = registries.get(id).ok_or(SaveError::RegistryNotFound(id))?;
        nodes.push(save_nodes(registry, 0, i, &mut map));
    }
    Ok(NetworkSave {
        registries: ids,
        nodes,
        noxel: save_panels(topology, &map),
    })
}

/// Restore a `NetworkSave` into `topology`. Every listed registry must exist.
pub fn load_network(
    topology: &mut PanelTopology,
    registries: &mut NodeRegistries,
    save: &NetworkSave,
) -> SaveResult<LoadReport> {
    if save.registries.len() != save.nodes.len() {
        return Err(SaveError::ComponentMismatch(format!(
            "{} registries but {} node records",
            save.registries.len(),
            save.nodes.len()
        )));
    }
    if let Some(&missing) = save.registries.iter().find(|&&id| registries.get(id).is_none()) {
        return Err(SaveError::RegistryNotFound(missing));
    }
    // Attached nodes cannot be cleared, so panels go first.
    clear_panels(topology, registries);
    let mut map = LoadRedirectorMap::new();
    for (i, (&id, nodes)) in save.registries.iter().zip(&save.nodes).enumerate() {
        let registry = registries.get_mut(id).ok_or(SaveError::RegistryNotFound(id))?;
        load_nodes(registry, 0, i, nodes, &mut map);
    }
    Ok(load_panels(topology, registries, &map, &save.noxel))
}
