//! Panel topology: polygonal panels over registry nodes, with adjacency.
//!
//! Purpose
//! - Hold the panels of one container, compute their geometry (plane fit,
//!   winding order, fan area) and keep panel-to-panel adjacency symmetric.
//!
//! Differed protocol
//! - Edits are staged: `add_panel_differed` → `connect_node_differed`* →
//!   `set_panel_properties_differed` → `finish_add_panel`. Only the finish
//!   step validates and (re)computes geometry and adjacency; staged panels are
//!   flagged "differed" until then.
//! - `add_panel` composes the protocol with explicit compensating actions: any
//!   failure disconnects what was connected, drops the shell and restores the
//!   index pool, so a rejected edit leaves no trace.
//!
//! Validity rules checked by `finish_add_panel`
//! 1. Thicknesses are non-negative and at least one is positive.
//! 2. At least 3 nodes.
//! 3. Every node's registry is attached to this topology or to none.
//! 4. No other panel shares more than 2 nodes with this one.
//! 5. Each polygon edge already belongs to at most one other panel.
//! 6. The plane fit and area are non-degenerate.
//!
//! Adjacency
//! - Two panels are adjacent iff they share exactly 2 nodes that are
//!   consecutive in both winding orders. Diagonal sharing does not count.
//!
//! Reachability
//! - `are_nodes_connected` walks from node to node through shared panels and
//!   rigid registries (see `reach.rs`).
//!
//! All operations reach nodes through a `NodeRegistries` arena passed in by
//! the caller; the topology stores `NodeId`s, never registry references.

pub mod geometry;
mod reach;
mod types;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use nalgebra::{Isometry3, Point3, Vector3};
use tracing::{debug, warn};

use crate::error::{TopologyError, TopologyResult};
use crate::registry::{NodeId, NodeRegistries, RegistryId};

pub use types::{Panel, PanelData, PanelHit, PanelIndex, TopologyCfg, TopologyId};

use geometry::{plane_fit, reorder_nodes, triangle_fan_area};
use types::is_edge;

/// Index pool state, snapshotted so a failed `add_panel` can restore it.
#[derive(Clone, Debug, Default, PartialEq)]
struct IndexPool {
    max_index: Option<u32>,
    unused: Vec<PanelIndex>,
    reserved: BTreeSet<PanelIndex>,
}

/// Geometry computed for a panel before it is committed.
struct Finished {
    nodes: Vec<NodeId>,
    center: Vector3<f64>,
    normal: Vector3<f64>,
    area: f64,
    adjacent: Vec<PanelIndex>,
}

/// Polygonal panels of one container.
#[derive(Clone, Debug, PartialEq)]
pub struct PanelTopology {
    id: TopologyId,
    transform: Isometry3<f64>,
    cfg: TopologyCfg,
    panels: Vec<Panel>,
    differed: BTreeSet<PanelIndex>,
    pool: IndexPool,
    connected_registries: BTreeSet<RegistryId>,
}

impl PanelTopology {
    pub fn new(id: TopologyId) -> Self {
        Self::with_cfg(id, TopologyCfg::default())
    }

    pub fn with_cfg(id: TopologyId, cfg: TopologyCfg) -> Self {
        Self {
            id,
            transform: Isometry3::identity(),
            cfg,
            panels: Vec::new(),
            differed: BTreeSet::new(),
            pool: IndexPool::default(),
            connected_registries: BTreeSet::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> TopologyId {
        self.id
    }

    #[inline]
    pub fn cfg(&self) -> &TopologyCfg {
        &self.cfg
    }

    #[inline]
    pub fn transform(&self) -> &Isometry3<f64> {
        &self.transform
    }

    /// Set the local frame. Existing panel geometry is not recomputed.
    pub fn set_transform(&mut self, transform: Isometry3<f64>) {
        self.transform = transform;
    }

    // ----- lookup -----

    /// Panels in storage order.
    #[inline]
    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    pub fn panel(&self, index: PanelIndex) -> Option<&Panel> {
        self.panels.iter().find(|p| p.index == index)
    }

    fn position(&self, index: PanelIndex) -> TopologyResult<usize> {
        self.panels
            .iter()
            .position(|p| p.index == index)
            .ok_or(TopologyError::PanelNotFound(index))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.panels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    #[inline]
    pub fn is_differed(&self, index: PanelIndex) -> bool {
        self.differed.contains(&index)
    }

    pub fn differed_panels(&self) -> Vec<PanelIndex> {
        self.differed.iter().copied().collect()
    }

    /// Registries with at least one node on a panel of this topology.
    #[inline]
    pub fn connected_registries(&self) -> &BTreeSet<RegistryId> {
        &self.connected_registries
    }

    #[inline]
    pub fn max_index(&self) -> Option<PanelIndex> {
        self.pool.max_index.map(PanelIndex)
    }

    #[inline]
    pub fn unused_indices(&self) -> &[PanelIndex] {
        &self.pool.unused
    }

    #[inline]
    pub fn reserved_indices(&self) -> &BTreeSet<PanelIndex> {
        &self.pool.reserved
    }

    // ----- index lifecycle -----

    fn index_taken(&self, index: PanelIndex) -> bool {
        self.pool.reserved.contains(&index) || self.panel(index).is_some()
    }

    /// Next free index: recycled if available, otherwise `max_index + 1`.
    ///
    /// Skips indices that are reserved or in use.
    pub fn new_panel_index(&mut self) -> PanelIndex {
        while let Some(index) = self.pool.unused.pop() {
            if !self.index_taken(index) {
                debug!(topology = %self.id, %index, "index_recycled");
                return index;
            }
        }
        loop {
            let next = self.pool.max_index.map_or(0, |m| m.saturating_add(1));
            self.pool.max_index = Some(next);
            let index = PanelIndex(next);
            if !self.index_taken(index) {
                debug!(topology = %self.id, %index, "index_new");
                return index;
            }
        }
    }

    /// Claim `count` fresh indices ahead of a staged edit.
    pub fn reserve_panel_indices(&mut self, count: usize) -> Vec<PanelIndex> {
        let mut claimed = Vec::with_capacity(count);
        for _ in 0..count {
            let index = self.new_panel_index();
            self.pool.reserved.insert(index);
            claimed.push(index);
        }
        claimed
    }

    /// Claim exactly these indices; none may be in use, reserved or repeated.
    pub fn reserve_panel_index_list(&mut self, indices: &[PanelIndex]) -> TopologyResult<()> {
        let mut seen = BTreeSet::new();
        for &index in indices {
            if self.index_taken(index) || !seen.insert(index) {
                return Err(TopologyError::IndexReserved(index));
            }
        }
        for &index in indices {
            self.pool.reserved.insert(index);
            self.pool.unused.retain(|&u| u != index);
            self.bump_max(index);
        }
        Ok(())
    }

    /// Raise `max_index` to `index`. Skipped indices go to the unused pool,
    /// lowest on top, so they are still handed out later.
    fn bump_max(&mut self, index: PanelIndex) {
        let first = self.pool.max_index.map_or(0, |m| m.saturating_add(1));
        if index.0 < first {
            return;
        }
        for gap in (first..index.0).rev() {
            let gap = PanelIndex(gap);
            if !self.index_taken(gap) && !self.pool.unused.contains(&gap) {
                self.pool.unused.push(gap);
            }
        }
        self.pool.max_index = Some(index.0);
    }

    // ----- differed protocol -----

    /// Stage an empty shell under `index`.
    pub fn add_panel_differed(&mut self, index: PanelIndex) -> TopologyResult<()> {
        if self.panel(index).is_some() {
            return Err(TopologyError::PanelExists(index));
        }
        self.pool.reserved.remove(&index);
        self.pool.unused.retain(|&u| u != index);
        self.bump_max(index);
        self.panels.push(Panel::shell(index));
        self.differed.insert(index);
        Ok(())
    }

    /// Attach `node` to the staged panel and append it to the node list.
    pub fn connect_node_differed(
        &mut self,
        registries: &mut NodeRegistries,
        index: PanelIndex,
        node: NodeId,
    ) -> TopologyResult<()> {
        let pos = self.position(index)?;
        if self.panels[pos].contains(&node) {
            return Err(TopologyError::NodeAlreadyConnected { index, node });
        }
        let registry = registries
            .get_mut(node.registry)
            .ok_or(TopologyError::RegistryNotFound(node.registry))?;
        if let Some(attached) = registry.attached_topology().filter(|&t| t != self.id) {
            return Err(TopologyError::RegistryAttachedElsewhere {
                registry: node.registry,
                attached,
            });
        }
        if !registry.attach_node(node.location, self.id, index) {
            return Err(TopologyError::NodeNotFound(node));
        }
        if registry.is_connected() && self.connected_registries.insert(node.registry) {
            debug!(topology = %self.id, registry = %node.registry, "registry_connected");
        }
        self.panels[pos].nodes.push(node);
        self.differed.insert(index);
        Ok(())
    }

    /// Detach `node` from the panel and drop it from the node list.
    pub fn disconnect_node_differed(
        &mut self,
        registries: &mut NodeRegistries,
        index: PanelIndex,
        node: NodeId,
    ) -> TopologyResult<()> {
        let pos = self.position(index)?;
        let Some(slot) = self.panels[pos].nodes.iter().position(|n| *n == node) else {
            return Err(TopologyError::NodeNotConnected { index, node });
        };
        let registry = registries
            .get_mut(node.registry)
            .ok_or(TopologyError::RegistryNotFound(node.registry))?;
        if !registry.detach_node(node.location, index) {
            return Err(TopologyError::NodeNotConnected { index, node });
        }
        if !registry.is_connected() && self.connected_registries.remove(&node.registry) {
            debug!(topology = %self.id, registry = %node.registry, "registry_disconnected");
        }
        self.panels[pos].nodes.remove(slot);
        self.differed.insert(index);
        Ok(())
    }

    /// Set scalar properties; geometry is left as is until finish.
    pub fn set_panel_properties_differed(
        &mut self,
        index: PanelIndex,
        thickness_normal: f64,
        thickness_anti_normal: f64,
        is_virtual: bool,
    ) -> TopologyResult<()> {
        let pos = self.position(index)?;
        let panel = &mut self.panels[pos];
        panel.thickness_normal = thickness_normal;
        panel.thickness_anti_normal = thickness_anti_normal;
        panel.is_virtual = is_virtual;
        self.differed.insert(index);
        Ok(())
    }

    /// Validate, compute geometry and adjacency, and clear the differed flag.
    ///
    /// Nothing is mutated when validation fails.
    pub fn finish_add_panel(
        &mut self,
        registries: &NodeRegistries,
        index: PanelIndex,
    ) -> TopologyResult<()> {
        let pos = self.position(index)?;
        let finished = match self.compute_finished(registries, pos) {
            Ok(f) => f,
            Err(err) => {
                warn!(topology = %self.id, %index, %err, "panel_rejected");
                return Err(err);
            }
        };

        self.clear_adjacency(index);
        for &other in &finished.adjacent {
            if let Some(p) = self.panels.iter_mut().find(|p| p.index == other) {
                p.connected_panels.insert(index);
            }
            debug!(topology = %self.id, %index, %other, "edge_shared");
        }
        let panel = &mut self.panels[pos];
        panel.nodes = finished.nodes;
        panel.center = finished.center;
        panel.normal = finished.normal;
        panel.area = finished.area;
        panel.connected_panels = finished.adjacent.into_iter().collect();
        self.differed.remove(&index);
        debug!(topology = %self.id, %index, area = panel.area, "panel_finished");
        Ok(())
    }

    /// Drop an empty shell, clearing its adjacency and recycling its index.
    pub fn remove_panel_differed(&mut self, index: PanelIndex) -> TopologyResult<()> {
        let pos = self.position(index)?;
        let nodes = self.panels[pos].nodes.len();
        if nodes != 0 {
            return Err(TopologyError::PanelNotEmpty { index, nodes });
        }
        self.clear_adjacency(index);
        self.panels.remove(pos);
        self.differed.remove(&index);
        self.pool.unused.push(index);
        Ok(())
    }

    // ----- composed edits -----

    /// All-or-nothing panel creation. Returns the new panel's index.
    pub fn add_panel(
        &mut self,
        registries: &mut NodeRegistries,
        data: &PanelData,
    ) -> TopologyResult<PanelIndex> {
        let pool = self.pool.clone();
        let index = self.new_panel_index();
        self.add_panel_differed(index)?;
        match self.stage(registries, index, data) {
            Ok(()) => Ok(index),
            Err(err) => {
                self.roll_back(registries, index, pool);
                Err(err)
            }
        }
    }

    fn stage(
        &mut self,
        registries: &mut NodeRegistries,
        index: PanelIndex,
        data: &PanelData,
    ) -> TopologyResult<()> {
        self.set_panel_properties_differed(
            index,
            data.thickness_normal,
            data.thickness_anti_normal,
            data.is_virtual,
        )?;
        for &node in &data.nodes {
            self.connect_node_differed(registries, index, node)?;
        }
        self.finish_add_panel(registries, index)
    }

    fn roll_back(&mut self, registries: &mut NodeRegistries, index: PanelIndex, pool: IndexPool) {
        let connected = self
            .panel(index)
            .map(|p| p.nodes.clone())
            .unwrap_or_default();
        for node in connected.into_iter().rev() {
            if let Err(err) = self.disconnect_node_differed(registries, index, node) {
                warn!(topology = %self.id, %index, %err, "rollback_disconnect_failed");
            }
        }
        if let Err(err) = self.remove_panel_differed(index) {
            warn!(topology = %self.id, %index, %err, "rollback_remove_failed");
        }
        self.pool = pool;
    }

    /// Disconnect every node, then drop the shell.
    pub fn remove_panel(
        &mut self,
        registries: &mut NodeRegistries,
        index: PanelIndex,
    ) -> TopologyResult<()> {
        let pos = self.position(index)?;
        let nodes = self.panels[pos].nodes.clone();
        for node in nodes.into_iter().rev() {
            self.disconnect_node_differed(registries, index, node)?;
        }
        self.remove_panel_differed(index)
    }

    /// Detach every node, drop all panels and reset the index pool.
    pub fn empty(&mut self, registries: &mut NodeRegistries) {
        for panel in &self.panels {
            for node in &panel.nodes {
                if let Some(r) = registries.get_mut(node.registry) {
                    r.detach_node(node.location, panel.index);
                }
            }
        }
        self.panels.clear();
        self.differed.clear();
        self.pool = IndexPool::default();
        self.connected_registries.clear();
    }

    // ----- queries -----

    /// Panels sharing at least one node with `nodes`, in first-seen order.
    ///
    /// Only registries attached to this topology contribute.
    pub fn find_panels_by_nodes(
        &self,
        registries: &NodeRegistries,
        nodes: &[NodeId],
        ignore: &[PanelIndex],
    ) -> Vec<PanelHit> {
        let mut hits: Vec<PanelHit> = Vec::new();
        for node in nodes {
            let Some(registry) = registries.get(node.registry) else {
                continue;
            };
            if registry.attached_topology() != Some(self.id) {
                continue;
            }
            for index in registry.attached_panels(node.location) {
                if ignore.contains(&index) {
                    continue;
                }
                match hits.iter_mut().find(|h| h.index == index) {
                    Some(hit) => {
                        hit.occurrences += 1;
                        hit.shared.push(*node);
                    }
                    None => hits.push(PanelHit {
                        index,
                        occurrences: 1,
                        shared: vec![*node],
                    }),
                }
            }
        }
        hits
    }

    /// A panel using every node in `nodes` (at least 3, all on this topology).
    pub fn get_panel_by_nodes(
        &self,
        registries: &NodeRegistries,
        nodes: &[NodeId],
    ) -> Option<PanelIndex> {
        if nodes.len() < 3 {
            return None;
        }
        let mut common: Option<BTreeSet<PanelIndex>> = None;
        for node in nodes {
            let registry = registries.get(node.registry)?;
            if registry.attached_topology() != Some(self.id) {
                return None;
            }
            let attached = &registry.node(node.location)?.connected_panels;
            common = Some(match common {
                None => attached.clone(),
                Some(c) => c.intersection(attached).copied().collect(),
            });
        }
        common?.into_iter().next()
    }

    // ----- internals -----

    fn clear_adjacency(&mut self, index: PanelIndex) {
        let Some(pos) = self.panels.iter().position(|p| p.index == index) else {
            return;
        };
        let old = std::mem::take(&mut self.panels[pos].connected_panels);
        for other in old {
            if let Some(p) = self.panels.iter_mut().find(|p| p.index == other) {
                p.connected_panels.remove(&index);
            }
        }
    }

    fn local_position(&self, registries: &NodeRegistries, node: &NodeId) -> TopologyResult<Vector3<f64>> {
        let world = registries
            .node_world(node)
            .ok_or(TopologyError::NodeNotFound(*node))?;
        Ok(self
            .transform
            .inverse_transform_point(&Point3::from(world))
            .coords)
    }

    /// Rules 1–6 plus geometry, without touching `self`.
    fn compute_finished(&self, registries: &NodeRegistries, pos: usize) -> TopologyResult<Finished> {
        let panel = &self.panels[pos];
        let index = panel.index;
        let (tn, ta) = (panel.thickness_normal, panel.thickness_anti_normal);
        // Negated comparisons also reject NaN.
        if !(tn >= 0.0 && ta >= 0.0) || !(tn > 0.0 || ta > 0.0) {
            return Err(TopologyError::InvalidThickness {
                normal: tn,
                anti_normal: ta,
            });
        }
        if panel.nodes.len() < 3 {
            return Err(TopologyError::NotEnoughNodes(panel.nodes.len()));
        }
        for node in &panel.nodes {
            let registry = registries
                .get(node.registry)
                .ok_or(TopologyError::RegistryNotFound(node.registry))?;
            if let Some(attached) = registry.attached_topology().filter(|&t| t != self.id) {
                return Err(TopologyError::RegistryAttachedElsewhere {
                    registry: node.registry,
                    attached,
                });
            }
        }
        let hits = self.find_panels_by_nodes(registries, &panel.nodes, &[index]);
        if let Some(hit) = hits.iter().find(|h| h.occurrences > 2) {
            return Err(TopologyError::TooManySharedNodes {
                other: hit.index,
                shared: hit.occurrences,
            });
        }

        let positions = panel
            .nodes
            .iter()
            .map(|n| self.local_position(registries, n))
            .collect::<TopologyResult<Vec<_>>>()?;
        let (center, normal) =
            plane_fit(&positions, self.cfg.eps_normal).ok_or(TopologyError::DegenerateGeometry)?;
        let order = reorder_nodes(&positions, center, normal);
        let nodes: Vec<NodeId> = order.iter().map(|&i| panel.nodes[i]).collect();
        let ordered: Vec<Vector3<f64>> = order.iter().map(|&i| positions[i]).collect();
        let area = triangle_fan_area(center, &ordered);
        if !area.is_finite() || area < self.cfg.eps_area {
            return Err(TopologyError::DegenerateGeometry);
        }

        let mut adjacent = Vec::new();
        let mut edge_owners: HashMap<(NodeId, NodeId), usize> = HashMap::new();
        for hit in hits.iter().filter(|h| h.occurrences == 2) {
            let (a, b) = (hit.shared[0], hit.shared[1]);
            let Some(other) = self.panel(hit.index) else {
                continue;
            };
            if is_edge(&nodes, &a, &b) && other.has_edge(&a, &b) {
                let owners = edge_owners.entry(edge_key(a, b)).or_insert(0);
                *owners += 1;
                if *owners > 1 {
                    return Err(TopologyError::EdgeOvershared { a, b });
                }
                adjacent.push(hit.index);
            }
        }

        Ok(Finished {
            nodes,
            center,
            normal,
            area,
            adjacent,
        })
    }
}

/// Order-independent key for an edge.
fn edge_key(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    let rank = |n: &NodeId| {
        (
            n.registry,
            crate::registry::location_key(&n.location),
        )
    };
    if rank(&a) <= rank(&b) {
        (a, b)
    } else {
        (b, a)
    }
}

/// Topologies addressed by id, the counterpart of `NodeRegistries`.
pub type Topologies = BTreeMap<TopologyId, PanelTopology>;
