//! Node identity and per-node storage.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::topology::{PanelIndex, TopologyId};

/// Handle of a `NodeRegistry` inside a `NodeRegistries` arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegistryId(pub u32);

impl fmt::Display for RegistryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "nodes#{}", self.0)
    }
}

/// Bit pattern used as the lookup key for a location.
///
/// `-0.0` folds onto `0.0` so the key agrees with float `==`.
pub(crate) type LocationKey = [u64; 3];

#[inline]
pub(crate) fn location_key(location: &Vector3<f64>) -> LocationKey {
    let bits = |x: f64| if x == 0.0 { 0.0f64.to_bits() } else { x.to_bits() };
    [bits(location.x), bits(location.y), bits(location.z)]
}

/// A node reference: owning registry plus local-space location.
///
/// Equality is exact on the location. Registries never hold NaN locations, so
/// `Eq` holds for every id a registry hands out.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct NodeId {
    pub registry: RegistryId,
    pub location: Vector3<f64>,
}

impl NodeId {
    #[inline]
    pub fn new(registry: RegistryId, location: Vector3<f64>) -> Self {
        Self { registry, location }
    }
}

impl PartialEq for NodeId {
    fn eq(&self, other: &Self) -> bool {
        self.registry == other.registry && self.location == other.location
    }
}

impl Eq for NodeId {}

impl Hash for NodeId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.registry.hash(state);
        location_key(&self.location).hash(state);
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({:.3}, {:.3}, {:.3})",
            self.registry, self.location.x, self.location.y, self.location.z
        )
    }
}

/// Stored node. `connected_panels` is only mutated through attach/detach.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub location: Vector3<f64>,
    /// RGBA, render-only.
    pub color: [u8; 4],
    pub(crate) connected_panels: BTreeSet<PanelIndex>,
}

impl Node {
    pub(crate) fn new(location: Vector3<f64>, color: [u8; 4]) -> Self {
        Self {
            location,
            color,
            connected_panels: BTreeSet::new(),
        }
    }

    #[inline]
    pub fn connected_panels(&self) -> &BTreeSet<PanelIndex> {
        &self.connected_panels
    }

    #[inline]
    pub fn is_attached(&self) -> bool {
        !self.connected_panels.is_empty()
    }
}

/// Registry-level attachment transition, fired on first attach / last detach.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachmentChange {
    Attached(TopologyId),
    Detached(TopologyId),
}

impl AttachmentChange {
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, AttachmentChange::Attached(_))
    }
}
