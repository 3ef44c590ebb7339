//! Curated internal API (UNSTABLE).
//!
//! Important
//! - This is not a public API. It is a convenience surface for the CLI, benches
//!   and experiments. Breaking changes are allowed and expected.
//! - Prefer these re-exports for clarity and consistency across callers.

// 6-DOF vectors and force allocation
pub use crate::six_dof::SixDofVector;
pub use crate::solver::{
    compute_gradient, desaturate, make_test_cube, output_vector, planned_iterations, score,
    score_with, solve, solve_with, DriveColumn, DriveMatrix, ForceGenerator, ScoreMode,
    SolveJob, SolveMethod, SolveProgress, SolverCfg, SolverPool,
};
// Seeded inputs
pub use crate::rand::{
    draw_direction, draw_generators, GeneratorCfg, GeneratorCount, RangeKind,
    ReplayToken as GeneratorReplay,
};
// Nodes and panels
pub use crate::registry::{AttachmentChange, Node, NodeId, NodeRegistries, NodeRegistry, RegistryId};
pub use crate::topology::geometry::{plane_fit, reorder_nodes, triangle_fan_area};
pub use crate::topology::{
    Panel, PanelData, PanelHit, PanelIndex, PanelTopology, Topologies, TopologyCfg, TopologyId,
};
// Flattening
pub use crate::craft::{Component, Craft};
pub use crate::save::{
    load_network, load_nodes, load_panels, save_network, save_nodes, save_panels, ComponentSave,
    CraftSave, LoadRedirectorMap, LoadReport, NetworkSave, NodeRedirector, NodesSave, NoxelSave,
    PanelSave, SaveRedirectorMap,
};
// Errors
pub use crate::error::{
    SaveError, SaveResult, SolverError, SolverResult, TopologyError, TopologyResult,
};
