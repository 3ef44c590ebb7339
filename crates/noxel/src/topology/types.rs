//! Panel types, caller input and tunables.

use std::collections::BTreeSet;
use std::fmt;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::registry::NodeId;

/// Handle of a `PanelTopology`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TopologyId(pub u32);

impl fmt::Display for TopologyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "noxel#{}", self.0)
    }
}

/// Stable panel identifier within one topology. Not a storage position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PanelIndex(pub u32);

impl fmt::Display for PanelIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Caller input for `PanelTopology::add_panel`. Node order is not significant.
#[derive(Clone, Debug, PartialEq)]
pub struct PanelData {
    pub nodes: Vec<NodeId>,
    pub thickness_normal: f64,
    pub thickness_anti_normal: f64,
    pub is_virtual: bool,
}

impl PanelData {
    /// Total `thickness` split evenly on both sides.
    pub fn new(nodes: Vec<NodeId>, thickness: f64) -> Self {
        Self::with_thicknesses(nodes, thickness * 0.5, thickness * 0.5, false)
    }

    pub fn with_thicknesses(
        nodes: Vec<NodeId>,
        thickness_normal: f64,
        thickness_anti_normal: f64,
        is_virtual: bool,
    ) -> Self {
        Self {
            nodes,
            thickness_normal,
            thickness_anti_normal,
            is_virtual,
        }
    }
}

/// A polygonal panel. Geometry and adjacency are valid once finished.
#[derive(Clone, Debug, PartialEq)]
pub struct Panel {
    pub(crate) index: PanelIndex,
    pub(crate) nodes: Vec<NodeId>,
    pub(crate) thickness_normal: f64,
    pub(crate) thickness_anti_normal: f64,
    pub(crate) is_virtual: bool,
    pub(crate) center: Vector3<f64>,
    pub(crate) normal: Vector3<f64>,
    pub(crate) area: f64,
    pub(crate) connected_panels: BTreeSet<PanelIndex>,
}

impl Panel {
    pub(crate) fn shell(index: PanelIndex) -> Self {
        Self {
            index,
            nodes: Vec::new(),
            thickness_normal: 0.0,
            thickness_anti_normal: 0.0,
            is_virtual: false,
            center: Vector3::zeros(),
            normal: Vector3::z(),
            area: 0.0,
            connected_panels: BTreeSet::new(),
        }
    }

    #[inline]
    pub fn index(&self) -> PanelIndex {
        self.index
    }

    /// Nodes in winding order (counterclockwise about `normal`).
    #[inline]
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    #[inline]
    pub fn thickness_normal(&self) -> f64 {
        self.thickness_normal
    }

    #[inline]
    pub fn thickness_anti_normal(&self) -> f64 {
        self.thickness_anti_normal
    }

    #[inline]
    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    /// Plane-fit centroid, topology-local.
    #[inline]
    pub fn center(&self) -> Vector3<f64> {
        self.center
    }

    /// Unit plane normal, topology-local.
    #[inline]
    pub fn normal(&self) -> Vector3<f64> {
        self.normal
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.area
    }

    /// Adjacent panels (shared edge), symmetric across the topology.
    #[inline]
    pub fn connected_panels(&self) -> &BTreeSet<PanelIndex> {
        &self.connected_panels
    }

    #[inline]
    pub fn contains(&self, node: &NodeId) -> bool {
        self.nodes.contains(node)
    }

    /// Whether `a` and `b` are consecutive in the winding order (wrap-around included).
    pub fn has_edge(&self, a: &NodeId, b: &NodeId) -> bool {
        is_edge(&self.nodes, a, b)
    }
}

/// `a`/`b` consecutive in `nodes`, counting the closing edge.
pub(crate) fn is_edge(nodes: &[NodeId], a: &NodeId, b: &NodeId) -> bool {
    let n = nodes.len();
    let (Some(i), Some(j)) = (
        nodes.iter().position(|x| x == a),
        nodes.iter().position(|x| x == b),
    ) else {
        return false;
    };
    let delta = i.abs_diff(j);
    n >= 2 && (delta == 1 || delta == n - 1)
}

/// One panel touched by a node set: how many nodes hit it and which.
#[derive(Clone, Debug, PartialEq)]
pub struct PanelHit {
    pub index: PanelIndex,
    pub occurrences: usize,
    pub shared: Vec<NodeId>,
}

/// Thresholds for rejecting degenerate panels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TopologyCfg {
    /// Minimum fan area; smaller panels are collinear or collapsed.
    pub eps_area: f64,
    /// Minimum length of the unnormalised plane-fit direction.
    pub eps_normal: f64,
}

impl Default for TopologyCfg {
    fn default() -> Self {
        Self {
            eps_area: 1e-6,
            eps_normal: 1e-12,
        }
    }
}
