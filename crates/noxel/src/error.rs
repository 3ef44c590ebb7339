//! Error types for the solver, topology and save layers.
//!
//! Validation failures are expected outcomes of user edits; the variants name
//! the rule that rejected the edit so callers can report it.

use thiserror::Error;

use crate::registry::{NodeId, RegistryId};
use crate::topology::{PanelIndex, TopologyId};

/// Errors raised before or while setting up a solve.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolverError {
    /// No generators were supplied.
    #[error("Generator list is empty")]
    EmptyGenerators,

    /// Iteration budget must be positive.
    #[error("Iteration budget must be positive")]
    ZeroIterations,

    /// Exhaustive search needs at least one cut per axis.
    #[error("Exhaustive search needs at least one cut per axis")]
    ZeroCuts,

    /// Inputs do not line up with generators (or matrix columns).
    #[error("Length mismatch: {generators} generators/columns vs {inputs} inputs")]
    LengthMismatch { generators: usize, inputs: usize },

    /// A range bound is ~0 while being exceeded, so no finite scale exists.
    #[error("Generator {index} has a near-zero range bound that is exceeded")]
    DegenerateRange { index: usize },

    /// No runner with this index in the pool.
    #[error("Unknown solver runner {0}")]
    UnknownRunner(usize),
}

/// Rejected panel edits and failed lookups.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TopologyError {
    #[error("Panel {0} already exists")]
    PanelExists(PanelIndex),

    #[error("Panel {0} not found")]
    PanelNotFound(PanelIndex),

    #[error("Panel {index} still has {nodes} nodes connected")]
    PanelNotEmpty { index: PanelIndex, nodes: usize },

    #[error("Panel index {0} is already used or reserved")]
    IndexReserved(PanelIndex),

    #[error("Invalid thickness: normal {normal}, anti-normal {anti_normal}")]
    InvalidThickness { normal: f64, anti_normal: f64 },

    #[error("Panel has {0} nodes, at least 3 are needed")]
    NotEnoughNodes(usize),

    #[error("Node registry {0} not found")]
    RegistryNotFound(RegistryId),

    #[error("Node {0} not found")]
    NodeNotFound(NodeId),

    #[error("Node registry {registry} is attached to topology {attached}")]
    RegistryAttachedElsewhere {
        registry: RegistryId,
        attached: TopologyId,
    },

    #[error("Node {node} is already connected to panel {index}")]
    NodeAlreadyConnected { index: PanelIndex, node: NodeId },

    #[error("Node {node} is not connected to panel {index}")]
    NodeNotConnected { index: PanelIndex, node: NodeId },

    #[error("Panel {other} already has {shared} of the nodes (at most 2 may be shared)")]
    TooManySharedNodes { other: PanelIndex, shared: usize },

    #[error("Edge {a} - {b} is already shared by two panels")]
    EdgeOvershared { a: NodeId, b: NodeId },

    #[error("Panel nodes are degenerate (collinear or coincident)")]
    DegenerateGeometry,
}

/// Structural problems while flattening or restoring a craft.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("Node registry {0} not found")]
    RegistryNotFound(RegistryId),

    #[error("Topology {0} not found")]
    TopologyNotFound(TopologyId),

    #[error("Save layout does not match craft: {0}")]
    ComponentMismatch(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for solver operations.
pub type SolverResult<T> = std::result::Result<T, SolverError>;
/// Result type for topology edits.
pub type TopologyResult<T> = std::result::Result<T, TopologyError>;
/// Result type for save/load operations.
pub type SaveResult<T> = std::result::Result<T, SaveError>;
