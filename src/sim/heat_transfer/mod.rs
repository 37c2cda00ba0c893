//! Conduction finite-difference (CondFD) solver for layered constructions.
//!
//! # Architecture
//!
//! ```text
//! Construction ──► discretize(dt) ──► MeshLayout ──► FdWall
//!                  (MeshCache)                        │
//!                                        step() / commit() / face temperatures
//! ```
//!
//! Layouts are pure functions of `(construction, dt, fourier_limit)` and are
//! shared between surfaces through `Arc`. Node temperatures live in
//! [`FdWall`], one per surface.

pub mod boundary;
pub mod mesh;
pub mod mesh_1d;
pub mod solver;

pub use boundary::BoundaryCondition;
pub use mesh::{MeshLayout, Node};
pub use mesh_1d::{DEFAULT_FOURIER_LIMIT, MeshCache, discretize, remap_temperatures};
pub use solver::{ConductionStep, FdWall, solve};
