pub mod io;
pub mod sim;

// Prelude
pub use sim::energy::{
    BoundaryConditions, Construction, HeatBalanceTerms, Model, ModelConfig, Simulation, Zone,
    ZoneCoupledSolver, ZoneState,
};
pub use sim::materials::{Layer, MaterialLibrary};
