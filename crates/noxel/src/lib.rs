//! Craft core: force allocation and the panel/node topology.
//!
//! Two independent halves:
//! - `solver`: per-actuator drive values that best reproduce a desired 6‑DOF
//!   input, run synchronously or on cancellable worker threads.
//! - `registry` + `topology`: point nodes and the polygonal panels built on
//!   them, with adjacency and a staged (differed) edit protocol. `save` and
//!   `craft` flatten the graph to a plain serializable form and back.
//!
//! API Policy
//! - This crate is project-internal. There is no stable public API; `api`
//!   is a curated convenience surface and may change with the code.
//! - The core performs no I/O and never prints; it logs through `tracing`.

pub mod api;
pub mod craft;
pub mod error;
pub mod rand;
pub mod registry;
pub mod save;
pub mod six_dof;
pub mod solver;
pub mod topology;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Guard for divisions by range extents and scale factors.
pub const SMALL_NUMBER: f64 = 1e-8;

pub use nalgebra::{Isometry3 as Iso3, Vector3 as Vec3};
pub use six_dof::SixDofVector;

/// Common exports for quick imports in callers.
pub mod prelude {
    pub use crate::craft::Craft;
    pub use crate::error::{SaveError, SolverError, TopologyError};
    pub use crate::registry::{NodeId, NodeRegistries, NodeRegistry, RegistryId};
    pub use crate::six_dof::SixDofVector;
    pub use crate::solver::{
        desaturate, make_test_cube, solve, DriveColumn, DriveMatrix, ForceGenerator, SolverCfg,
        SolverPool,
    };
    pub use crate::topology::{PanelData, PanelIndex, PanelTopology, TopologyId};
    pub use nalgebra::{Isometry3 as Iso3, Vector3 as Vec3};
}
