use serde::Serialize;
use thiserror::Error;
use tracing::info;

use super::boundary::BoundaryConditions;
use super::config::Model;
use super::error::StepError;
use super::global_solve::ZoneCoupledSolver;
use super::hvac::{HvacModel, HvacRuntime};
use super::result::HeatBalanceTerms;
use super::zone::ZoneState;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Supplies boundary conditions for each step of a run.
pub trait BoundaryProvider {
    /// Conditions for step `step`, starting `elapsed_s` seconds into the run.
    fn conditions(&mut self, step: usize, elapsed_s: f64) -> BoundaryConditions;
}

impl<F> BoundaryProvider for F
where
    F: FnMut(usize, f64) -> BoundaryConditions,
{
    fn conditions(&mut self, step: usize, elapsed_s: f64) -> BoundaryConditions {
        self(step, elapsed_s)
    }
}

/// The same conditions for every step.
#[derive(Debug, Clone)]
pub struct ConstantBoundary(pub BoundaryConditions);

impl BoundaryProvider for ConstantBoundary {
    fn conditions(&mut self, _step: usize, _elapsed_s: f64) -> BoundaryConditions {
        self.0.clone()
    }
}

/// A fatal step error together with the last committed state.
#[derive(Debug, Error)]
#[error("simulation failed at step {step_index}: {source}")]
pub struct SimulationFailure {
    pub step_index: usize,
    pub last_state: Box<ZoneState>,
    #[source]
    pub source: StepError,
}

/// Aggregates over the steps of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub steps: usize,
    pub simulated_s: f64,
    pub heating_kwh: f64,
    pub cooling_kwh: f64,
    pub peak_heating_w: f64,
    pub peak_cooling_w: f64,
    pub convergence_warnings: usize,
    pub max_iterations_used: usize,
    pub min_air_temp_c: f64,
    pub max_air_temp_c: f64,
    pub final_air_temp_c: f64,
}

impl RunSummary {
    fn record(&mut self, terms: &HeatBalanceTerms, air_temp_c: f64, dt: f64) {
        if self.steps == 0 {
            self.min_air_temp_c = air_temp_c;
            self.max_air_temp_c = air_temp_c;
        }
        self.steps += 1;
        self.simulated_s += dt;
        let p = terms.hvac_power_w;
        if p > 0.0 {
            self.heating_kwh += p * dt / 3.6e6;
            self.peak_heating_w = self.peak_heating_w.max(p);
        } else if p < 0.0 {
            self.cooling_kwh += -p * dt / 3.6e6;
            self.peak_cooling_w = self.peak_cooling_w.max(-p);
        }
        self.convergence_warnings += terms.warnings.len();
        self.max_iterations_used = self.max_iterations_used.max(terms.iterations_used);
        self.min_air_temp_c = self.min_air_temp_c.min(air_temp_c);
        self.max_air_temp_c = self.max_air_temp_c.max(air_temp_c);
        self.final_air_temp_c = air_temp_c;
    }
}

/// Sequential driver: owns the solver, the HVAC model and the committed state.
pub struct Simulation {
    solver: ZoneCoupledSolver,
    hvac: Box<dyn HvacModel>,
    state: ZoneState,
    step_index: usize,
}

impl Simulation {
    pub fn new(mut solver: ZoneCoupledSolver, hvac: Box<dyn HvacModel>, initial_temperature_c: f64, dt: f64) -> Self {
        let state = solver.initial_state(initial_temperature_c, dt);
        Self {
            solver,
            hvac,
            state,
            step_index: 0,
        }
    }

    pub fn from_model(model: Model) -> Self {
        Self::new(model.solver, model.hvac, model.run.initial_temperature_c, model.run.dt_s)
    }

    pub fn state(&self) -> &ZoneState {
        &self.state
    }

    pub fn solver(&self) -> &ZoneCoupledSolver {
        &self.solver
    }

    pub fn hvac_runtime(&self) -> HvacRuntime {
        self.hvac.runtime()
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    /// Solve and commit one step.
    pub fn step(&mut self, bc: &BoundaryConditions, dt: f64) -> Result<HeatBalanceTerms, SimulationFailure> {
        match self.solver.solve_step(&self.state, bc, dt, self.hvac.as_mut()) {
            Ok((next, terms)) => {
                self.state = next;
                self.step_index += 1;
                Ok(terms)
            }
            Err(source) => Err(SimulationFailure {
                step_index: self.step_index,
                last_state: Box::new(self.state.clone()),
                source,
            }),
        }
    }

    /// Repeat the first day of `provider` `days` times to settle the fabric,
    /// then restart the clock. Controller state is kept.
    pub fn warm_up(
        &mut self,
        provider: &mut dyn BoundaryProvider,
        days: usize,
        dt: f64,
    ) -> Result<(), SimulationFailure> {
        if days == 0 {
            return Ok(());
        }
        let steps_per_day = ((SECONDS_PER_DAY / dt).round() as usize).max(1);
        info!(days, steps_per_day, "warm-up");
        for _ in 0..days {
            for k in 0..steps_per_day {
                let bc = provider.conditions(k, k as f64 * dt);
                self.step(&bc, dt)?;
            }
        }
        info!(air_temp_c = self.state.air_temp_c, "warm-up complete");
        self.state.elapsed_s = 0.0;
        self.step_index = 0;
        Ok(())
    }

    /// Run `steps` steps of `dt` seconds.
    pub fn run(
        &mut self,
        provider: &mut dyn BoundaryProvider,
        steps: usize,
        dt: f64,
    ) -> Result<RunSummary, SimulationFailure> {
        self.run_with(provider, steps, dt, |_, _, _| {})
    }

    /// Like [`Self::run`], calling `on_step` after every committed step.
    pub fn run_with(
        &mut self,
        provider: &mut dyn BoundaryProvider,
        steps: usize,
        dt: f64,
        mut on_step: impl FnMut(usize, &ZoneState, &HeatBalanceTerms),
    ) -> Result<RunSummary, SimulationFailure> {
        let mut summary = RunSummary::default();
        for _ in 0..steps {
            let index = self.step_index;
            let bc = provider.conditions(index, self.state.elapsed_s);
            let terms = self.step(&bc, dt)?;
            summary.record(&terms, self.state.air_temp_c, dt);
            on_step(index, &self.state, &terms);
        }
        info!(
            steps = summary.steps,
            heating_kwh = summary.heating_kwh,
            cooling_kwh = summary.cooling_kwh,
            warnings = summary.convergence_warnings,
            "run complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::sim::energy::air_exchange::NoAirExchange;
    use crate::sim::energy::construction::tests::sandwich_wall;
    use crate::sim::energy::convection::{ConvectionConfig, ConvectionSelector};
    use crate::sim::energy::global_solve::SolverOptions;
    use crate::sim::energy::hvac::{IdealLoadsHvac, NoHvac};
    use crate::sim::energy::zone::{box_surfaces, Zone};

    fn solver(options: SolverOptions) -> ZoneCoupledSolver {
        let c = Arc::new(sandwich_wall());
        let zone = Zone {
            name: "z".into(),
            length: 6.0,
            width: 4.0,
            height: 2.5,
            heat_capacity_multiplier: 1.0,
            surfaces: box_surfaces(6.0, 4.0, 2.5, &c, &["south_wall", "roof"]),
            windows: vec![],
        };
        let sel = ConvectionSelector::new(&ConvectionConfig::default(), zone.volume()).unwrap();
        ZoneCoupledSolver::new(zone, sel, Box::new(NoAirExchange), options).unwrap()
    }

    #[test]
    fn test_run_summary_counts_heating() {
        let mut sim = Simulation::new(solver(SolverOptions::default()), Box::new(IdealLoadsHvac::unlimited()), 20.0, 600.0);
        let mut bc = BoundaryConditions::still_air(0.0);
        bc.hvac_setpoint_c = Some(20.0);
        let summary = sim.run(&mut ConstantBoundary(bc), 12, 600.0).unwrap();
        assert_eq!(summary.steps, 12);
        assert!((summary.simulated_s - 7200.0).abs() < 1e-9);
        assert!(summary.heating_kwh > 0.0);
        assert_eq!(summary.cooling_kwh, 0.0);
        assert!(summary.peak_heating_w > 0.0);
        let rt = sim.hvac_runtime();
        assert!((rt.heating_energy_j / 3.6e6 - summary.heating_kwh).abs() < 1e-9);
        assert!((sim.state().elapsed_s - 7200.0).abs() < 1e-9);
    }

    #[test]
    fn test_warm_up_restarts_clock() {
        let mut sim = Simulation::new(solver(SolverOptions::default()), Box::new(NoHvac), 20.0, 3600.0);
        let mut seen = Vec::new();
        let mut provider = |step: usize, _t: f64| {
            seen.push(step);
            BoundaryConditions::still_air(5.0)
        };
        sim.warm_up(&mut provider, 2, 3600.0).unwrap();
        assert_eq!(seen.len(), 48);
        assert_eq!(seen[24], 0);
        assert_eq!(sim.step_index(), 0);
        assert_eq!(sim.state().elapsed_s, 0.0);
        // The fabric has moved toward the exterior temperature.
        assert!(sim.state().air_temp_c < 20.0);
    }

    #[test]
    fn test_failure_carries_last_state() {
        let opts = SolverOptions {
            max_temperature_c: 25.0,
            ..SolverOptions::default()
        };
        let mut sim = Simulation::new(solver(opts), Box::new(NoHvac), 20.0, 600.0);
        let mut bc = BoundaryConditions::still_air(20.0);
        bc.internal_gains_w = 3000.0;
        let err = sim.run(&mut ConstantBoundary(bc), 1000, 600.0).unwrap_err();
        assert!(matches!(err.source, StepError::PhysicalBounds { .. }));
        assert_eq!(err.step_index, sim.step_index());
        assert_eq!(*err.last_state, *sim.state());
        assert!(err.last_state.air_temp_c <= 25.0);
    }
}
