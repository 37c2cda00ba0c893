//! Single-zone coupled heat balance.
//!
//! # Architecture
//!
//! ```text
//! ModelConfig ──► build() ──► ZoneCoupledSolver ──► Simulation
//!                              │                      (warm_up / run)
//!                              ├── ConvectionSelector
//!                              ├── AirExchangeModel
//!                              └── FdWall per surface (heat_transfer)
//! ```
//!
//! Each step the solver iterates on the zone air temperature: surfaces are
//! conducted against the trial temperature, the air balance is solved
//! implicitly for a new temperature, and the HVAC model is queried (never
//! committed) until the trial converges. The accepted step commits wall
//! temperatures and the HVAC controller together.

pub mod air_exchange;
pub mod boundary;
pub mod config;
pub mod construction;
pub mod convection;
pub mod error;
pub mod global_solve;
pub mod hvac;
pub mod result;
pub mod simulation;
pub mod window;
pub mod zone;

pub use air_exchange::{
    Aim2AirExchange, Aim2Params, AirExchangeInput, AirExchangeModel, ConstantAch, NoAirExchange,
};
pub use boundary::BoundaryConditions;
pub use config::{Model, ModelConfig};
pub use construction::Construction;
pub use convection::{
    CombineRule, Correlation, ConvectionConfig, ConvectionSelector, CorrelationSpec, Face,
};
pub use error::{ConfigError, StepError};
pub use global_solve::{SolverOptions, ZoneCoupledSolver};
pub use hvac::{HvacInput, HvacModel, HvacRuntime, IdealLoadsHvac, NoHvac, PiThermostat};
pub use result::{HeatBalanceTerms, StepWarning};
pub use simulation::{BoundaryProvider, ConstantBoundary, RunSummary, Simulation, SimulationFailure};
pub use window::Window;
pub use zone::{box_surfaces, Surface, SurfaceBoundary, SurfaceType, Zone, ZoneState};
