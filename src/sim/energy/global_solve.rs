//! Coupled fabric / air heat balance for one zone.
//!
//! Each step iterates on a trial air temperature `T*`:
//!
//! ```text
//!            ┌────────────── T* ◄──── relax ◄────┐
//!            ▼                                    │
//! per surface: h_in(T_si, T*) ─► CondFD solve ─► K_eff, T_node
//!            │                                    │
//!            └─► windows, air exchange, HVAC.query(T*) ─► air balance ─► T_new
//! ```
//!
//! The air balance is implicit in `T_new`. Surface exchange is the solved
//! face flux `q_in` at `T*` extended along `K_eff`, and the HVAC output is
//! linearised about `T*` with the controller's own slope `K_hvac`:
//!
//! ```text
//! (C/dt + ΣK_eff·A + ΣUA + G + K_hvac) T_new = C/dt T_old + Σ(q_in + K_eff T*)·A + (ΣUA + G) T_out
//!                                              + Q_int + Q_solar,air + Q_hvac(T*) + K_hvac T*
//! ```
//!
//! Once the iteration stops, the HVAC output is evaluated at the last
//! `T_new` and the balance is closed once more with that power held fixed.
//! The committed air temperature comes from this final balance, so the
//! reported heat balance closes exactly whether or not the iteration met
//! its tolerance. The HVAC model is committed once, with that same input.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::sim::heat_transfer::{BoundaryCondition, ConductionStep, FdWall, MeshCache};

use super::air_exchange::{AirExchangeInput, AirExchangeModel};
use super::boundary::BoundaryConditions;
use super::convection::{ConvectionSelector, Face};
use super::error::{ConfigError, StepError};
use super::hvac::{HvacInput, HvacModel};
use super::result::{HeatBalanceTerms, StepWarning};
use super::zone::{FaceTemperatures, SurfaceBoundary, Zone, ZoneState};

// ─── Options ────────────────────────────────────────────────────────────

/// Inner-iteration and plausibility settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    pub max_iterations: usize,
    /// Convergence threshold on |T_new - T*| [K].
    pub tolerance_c: f64,
    /// Under-relaxation factor ω in (0, 1]: `T* += ω (T_new - T*)`.
    pub relaxation: f64,
    /// Upper bound on the mesh Fourier number α·dt/Δx².
    pub fourier_limit: f64,
    pub min_temperature_c: f64,
    pub max_temperature_c: f64,
    /// Solve surfaces on the rayon pool.
    pub parallel_surfaces: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            tolerance_c: 0.01,
            relaxation: 0.8,
            fourier_limit: crate::sim::heat_transfer::DEFAULT_FOURIER_LIMIT,
            min_temperature_c: -50.0,
            max_temperature_c: 60.0,
            parallel_surfaces: false,
        }
    }
}

impl SolverOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let err = |detail: String| Err(ConfigError::invalid("solver", detail));
        if self.max_iterations == 0 {
            return err("max_iterations must be >= 1".into());
        }
        if !(self.tolerance_c.is_finite() && self.tolerance_c > 0.0) {
            return err(format!("tolerance must be > 0 (got {})", self.tolerance_c));
        }
        if !(self.relaxation > 0.0 && self.relaxation <= 1.0) {
            return err(format!("relaxation must be in (0, 1] (got {})", self.relaxation));
        }
        if !(self.fourier_limit.is_finite() && self.fourier_limit > 0.0) {
            return err(format!("Fourier limit must be > 0 (got {})", self.fourier_limit));
        }
        if !(self.min_temperature_c < self.max_temperature_c) {
            return err(format!(
                "temperature bounds [{}, {}] are empty",
                self.min_temperature_c, self.max_temperature_c
            ));
        }
        Ok(())
    }
}

// ─── Per-step working data ──────────────────────────────────────────────

/// Quantities fixed for the whole inner iteration of one step.
struct StepInputs<'a> {
    dt: f64,
    state: &'a ZoneState,
    bc: &'a BoundaryConditions,
    bc_exterior: Vec<BoundaryCondition>,
    /// Transmitted solar absorbed at each interior face [W/m²].
    interior_solar_w_m2: Vec<f64>,
    window_ua: f64,
    solar_total_w: f64,
    solar_absorbed_w: f64,
    /// Transmitted solar left to heat the air directly [W].
    solar_air_w: f64,
}

struct SurfaceSolve {
    step: ConductionStep,
    bc_interior: BoundaryCondition,
}

/// One pass of the inner iteration.
struct Iterate {
    t_trial: f64,
    t_new: f64,
    surfaces: Vec<SurfaceSolve>,
    air_exchange_g: f64,
    hvac_input: HvacInput,
    /// Air balance without the HVAC term: `passive_diag * T = passive_rhs + Q_hvac`.
    passive_diag: f64,
    passive_rhs: f64,
}

impl Iterate {
    fn residual(&self) -> f64 {
        (self.t_new - self.t_trial).abs()
    }

    /// Air temperature closing this pass's balance for a fixed HVAC output.
    fn air_temperature_with(&self, hvac_power_w: f64) -> f64 {
        (self.passive_rhs + hvac_power_w) / self.passive_diag
    }
}

impl SurfaceSolve {
    /// Heat the air loses to this surface at air temperature `t_air` [W].
    fn air_loss_w(&self, area: f64, t_trial: f64, t_air: f64) -> f64 {
        area * (self.step.inner_conductance * (t_air - t_trial) - self.step.q_inner)
    }
}

// ─── Solver ─────────────────────────────────────────────────────────────

/// Fixed-point solver coupling every surface's conduction to the zone air.
pub struct ZoneCoupledSolver {
    zone: Zone,
    convection: ConvectionSelector,
    air_exchange: Box<dyn AirExchangeModel>,
    options: SolverOptions,
    cache: MeshCache,
}

impl ZoneCoupledSolver {
    pub fn new(
        zone: Zone,
        convection: ConvectionSelector,
        air_exchange: Box<dyn AirExchangeModel>,
        options: SolverOptions,
    ) -> Result<Self, ConfigError> {
        options.validate()?;
        zone.validate()?;
        Ok(Self {
            zone,
            convection,
            air_exchange,
            cache: MeshCache::new(options.fourier_limit),
            options,
        })
    }

    pub fn zone(&self) -> &Zone {
        &self.zone
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    pub fn mesh_cache(&self) -> &MeshCache {
        &self.cache
    }

    /// Uniform starting state with meshes for `dt`.
    pub fn initial_state(&mut self, temperature_c: f64, dt: f64) -> ZoneState {
        self.zone.initial_state(&mut self.cache, dt, temperature_c)
    }

    /// Advance `state` by one step of `dt` seconds.
    ///
    /// `hvac` is queried on every inner iteration and committed exactly once,
    /// after the bounds check has passed. On error neither `state` nor the
    /// HVAC model has changed.
    pub fn solve_step(
        &mut self,
        state: &ZoneState,
        bc: &BoundaryConditions,
        dt: f64,
        hvac: &mut dyn HvacModel,
    ) -> Result<(ZoneState, HeatBalanceTerms), StepError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(StepError::InvalidTimestep(dt));
        }
        let n = self.zone.surfaces.len();
        if state.walls.len() != n || state.faces.len() != n {
            return Err(StepError::StateMismatch(format!(
                "{n} surfaces but {} walls and {} face records",
                state.walls.len(),
                state.faces.len()
            )));
        }

        // A dt change swaps in the matching layouts; the cache never hands out
        // a layout built for another dt.
        let mut walls = state.walls.clone();
        for (wall, surface) in walls.iter_mut().zip(&self.zone.surfaces) {
            wall.remesh(self.cache.layout(&surface.construction, dt));
        }

        let inputs = self.step_inputs(state, bc, dt)?;

        let opts = self.options;
        let mut t_trial = state.air_temp_c;
        let mut iteration = 1;
        let mut it = self.iterate(&walls, &inputs, t_trial, &*hvac)?;
        loop {
            debug!(
                iteration,
                t_trial_c = it.t_trial,
                t_new_c = it.t_new,
                residual_c = it.residual(),
                "zone air iteration"
            );
            if it.residual() < opts.tolerance_c || iteration >= opts.max_iterations {
                break;
            }
            t_trial += opts.relaxation * (it.t_new - t_trial);
            iteration += 1;
            it = self.iterate(&walls, &inputs, t_trial, &*hvac)?;
        }

        let residual = it.residual();
        let mut warnings = Vec::new();
        if residual >= opts.tolerance_c {
            warn!(
                iterations = iteration,
                residual_c = residual,
                "zone air temperature did not converge; committing last balance"
            );
            warnings.push(StepWarning::Convergence {
                iterations: iteration,
                residual_c: residual,
            });
        }

        let hvac_input = it.hvac_input.at_air_temperature(it.t_new);
        let t_air = it.air_temperature_with(hvac.query(&hvac_input));
        if !t_air.is_finite() {
            return Err(StepError::singular(format!("zone air balance closed at {t_air}")));
        }
        self.check_bounds(t_air, &it)?;

        let hvac_power_w = hvac.commit(&hvac_input);

        let mut faces = Vec::with_capacity(n);
        let mut fabric_loss_w = inputs.solar_absorbed_w;
        let mut fabric_exterior_loss_w = 0.0;
        for (((wall, solved), surface), bc_ext) in walls
            .iter_mut()
            .zip(&it.surfaces)
            .zip(&self.zone.surfaces)
            .zip(&inputs.bc_exterior)
        {
            fabric_loss_w += solved.air_loss_w(surface.area, it.t_trial, t_air);
            fabric_exterior_loss_w += solved.step.q_outer * surface.area;
            wall.commit(&solved.step);
            faces.push(FaceTemperatures {
                interior_c: wall.interior_surface_temperature(&solved.bc_interior),
                exterior_c: wall.exterior_surface_temperature(bc_ext),
            });
        }

        let t_out = bc.exterior_air_temp_c;
        let terms = HeatBalanceTerms {
            fabric_loss_w,
            fabric_exterior_loss_w,
            window_loss_w: self.zone.windows.iter().map(|w| w.conduction_w(t_air, t_out)).sum(),
            air_exchange_loss_w: it.air_exchange_g * (t_air - t_out),
            solar_gain_w: inputs.solar_total_w,
            internal_gain_w: bc.internal_gains_w,
            hvac_power_w,
            iterations_used: iteration,
            residual_c: residual,
            warnings,
        };

        let next = ZoneState {
            air_temp_c: t_air,
            walls,
            faces,
            last_hvac_power_w: hvac_power_w,
            elapsed_s: state.elapsed_s + dt,
        };
        Ok((next, terms))
    }

    /// Exterior boundary conditions and solar distribution for the step.
    ///
    /// Exterior film coefficients depend only on committed face temperatures
    /// and weather, so they are evaluated once here.
    fn step_inputs<'a>(
        &self,
        state: &'a ZoneState,
        bc: &'a BoundaryConditions,
        dt: f64,
    ) -> Result<StepInputs<'a>, StepError> {
        let surfaces = &self.zone.surfaces;
        let mut bc_exterior = Vec::with_capacity(surfaces.len());
        for (surface, face) in surfaces.iter().zip(&state.faces) {
            let b = match surface.boundary {
                SurfaceBoundary::Adiabatic => BoundaryCondition::Adiabatic,
                SurfaceBoundary::Ground { temperature_c } => BoundaryCondition::Dirichlet {
                    temperature: temperature_c,
                },
                SurfaceBoundary::Exterior => {
                    let h = self.convection.select(
                        Face::Exterior,
                        surface,
                        face.exterior_c,
                        bc.exterior_air_temp_c,
                        bc.wind_speed_ms,
                        bc.wind_direction_deg,
                    )?;
                    BoundaryCondition::ConvectiveWithFlux {
                        h,
                        t_fluid: bc.exterior_air_temp_c,
                        heat_flux: surface.solar_absorptance * bc.irradiance_on(&surface.name),
                    }
                }
            };
            bc_exterior.push(b);
        }

        let mut absorbed_w = vec![0.0; surfaces.len()];
        let mut window_ua = 0.0;
        let mut solar_total_w = 0.0;
        let mut solar_air_w = 0.0;
        for w in &self.zone.windows {
            window_ua += w.ua();
            let transmitted = w.transmitted_solar_w(bc.irradiance_on(&surfaces[w.parent].name));
            solar_total_w += transmitted;
            solar_air_w += transmitted * w.air_fraction();
            for &(j, fraction) in &w.solar_distribution {
                absorbed_w[j] += transmitted * fraction;
            }
        }
        let solar_absorbed_w = absorbed_w.iter().sum();
        let interior_solar_w_m2 = absorbed_w
            .iter()
            .zip(surfaces)
            .map(|(q, s)| q / s.area)
            .collect();

        Ok(StepInputs {
            dt,
            state,
            bc,
            bc_exterior,
            interior_solar_w_m2,
            window_ua,
            solar_total_w,
            solar_absorbed_w,
            solar_air_w,
        })
    }

    /// Solve every surface and the air balance at trial temperature `t_trial`.
    fn iterate(
        &self,
        walls: &[FdWall],
        inputs: &StepInputs<'_>,
        t_trial: f64,
        hvac: &dyn HvacModel,
    ) -> Result<Iterate, StepError> {
        let surfaces = &self.zone.surfaces;
        let solve_one = |i: usize| -> Result<SurfaceSolve, StepError> {
            let surface = &surfaces[i];
            let h = self.convection.select(
                Face::Interior,
                surface,
                inputs.state.faces[i].interior_c,
                t_trial,
                0.0,
                0.0,
            )?;
            let bc_interior = BoundaryCondition::ConvectiveWithFluxToDomain {
                h,
                t_fluid: t_trial,
                heat_flux: inputs.interior_solar_w_m2[i],
            };
            let step = walls[i].step(inputs.dt, &inputs.bc_exterior[i], &bc_interior)?;
            Ok(SurfaceSolve { step, bc_interior })
        };
        // Ordered collect: the reduction below runs in surface order either way.
        let solved: Vec<SurfaceSolve> = if self.options.parallel_surfaces {
            (0..surfaces.len())
                .into_par_iter()
                .map(solve_one)
                .collect::<Result<_, _>>()?
        } else {
            (0..surfaces.len()).map(solve_one).collect::<Result<_, _>>()?
        };

        // Surface exchange at T*: Σ q_in·A, moving by ΣK_eff·A per kelvin.
        let mut ka = 0.0;
        let mut surface_gain_w = 0.0;
        for (s, r) in surfaces.iter().zip(&solved) {
            ka += r.step.inner_conductance * s.area;
            surface_gain_w += r.step.q_inner * s.area;
        }

        let bc = inputs.bc;
        let t_out = bc.exterior_air_temp_c;
        let t_old = inputs.state.air_temp_c;
        let g = self.air_exchange.conductance_w_per_k(&AirExchangeInput {
            zone_air_temp_c: t_trial,
            exterior_air_temp_c: t_out,
            wind_speed_ms: bc.wind_speed_ms,
            window_open_fraction: bc.window_open_fraction,
            hvac_heating: inputs.state.last_hvac_power_w > 0.0,
        });
        let solar_air_w = inputs.solar_air_w;

        let passive_conductance = ka + inputs.window_ua + g;
        let passive_net_gain_w = bc.internal_gains_w
            + solar_air_w
            + surface_gain_w
            + (inputs.window_ua + g) * (t_out - t_trial);
        let capacity = self.zone.air_heat_capacity();
        let hvac_input = HvacInput {
            trial_air_temp_c: t_trial,
            previous_air_temp_c: t_old,
            setpoint_c: bc.hvac_setpoint_c,
            passive_net_gain_w,
            passive_conductance_w_per_k: passive_conductance,
            air_capacity_j_per_k: capacity,
            dt_s: inputs.dt,
        };
        let q_hvac = hvac.query(&hvac_input);
        // Q(T) ~ Q(T*) - K_hvac (T - T*); a stiff controller stays implicit.
        let k_hvac = hvac.conductance_w_per_k(&hvac_input).max(0.0);

        let c_dt = capacity / inputs.dt;
        let diag = c_dt + passive_conductance;
        let rhs = c_dt * t_old
            + surface_gain_w
            + ka * t_trial
            + (inputs.window_ua + g) * t_out
            + bc.internal_gains_w
            + solar_air_w;
        let t_new = (rhs + q_hvac + k_hvac * t_trial) / (diag + k_hvac);
        if !(t_new.is_finite() && diag > 0.0) {
            return Err(StepError::singular(format!(
                "zone air balance (diag {diag}, rhs {rhs})"
            )));
        }

        Ok(Iterate {
            t_trial,
            t_new,
            surfaces: solved,
            air_exchange_g: g,
            hvac_input,
            passive_diag: diag,
            passive_rhs: rhs,
        })
    }

    fn check_bounds(&self, t_air: f64, it: &Iterate) -> Result<(), StepError> {
        let (lo, hi) = (self.options.min_temperature_c, self.options.max_temperature_c);
        let out_of_range = |location: String, value_c: f64| StepError::PhysicalBounds {
            location,
            value_c,
            min_c: lo,
            max_c: hi,
        };
        if !(lo..=hi).contains(&t_air) {
            return Err(out_of_range("zone air".into(), t_air));
        }
        for (surface, solved) in self.zone.surfaces.iter().zip(&it.surfaces) {
            if let Some((i, &t)) = solved
                .step
                .temperatures
                .iter()
                .enumerate()
                .find(|(_, t)| !(lo..=hi).contains(*t))
            {
                return Err(out_of_range(format!("surface '{}' node {i}", surface.name), t));
            }
        }
        Ok(())
    }
}
