use std::sync::Arc;

use crate::sim::energy::error::StepError;
use crate::sim::heat_transfer::boundary::BoundaryCondition;
use crate::sim::heat_transfer::mesh::MeshLayout;
use crate::sim::heat_transfer::mesh_1d::remap_temperatures;

/// Outcome of one implicit conduction step, per unit face area.
#[derive(Debug, Clone, PartialEq)]
pub struct ConductionStep {
    /// Updated node temperatures [°C], exterior to interior.
    pub temperatures: Vec<f64>,
    /// Convective flux from the interior face into the zone air [W/m^2].
    pub q_inner: f64,
    /// Net heat leaving the mesh through the exterior face [W/m^2].
    pub q_outer: f64,
    /// Node-to-air conductance at the interior face [W/(m^2*K)]
    /// (film in series with the half-node).
    pub inner_conductance: f64,
}

/// Advance a node layout by one implicit (backward Euler) step.
///
/// Assembles the tridiagonal system
///
/// ```text
/// (C_i/dt + K_w + K_e) T_i - K_w T_{i-1} - K_e T_{i+1} = C_i/dt T_i^old + boundary terms
/// ```
///
/// and solves it directly with the Thomas algorithm. The solve is exact; it
/// is repeated by the zone solver only because the boundary coefficients
/// change between outer iterations.
pub fn solve(
    layout: &MeshLayout,
    temperatures: &[f64],
    dt: f64,
    bc_exterior: &BoundaryCondition,
    bc_interior: &BoundaryCondition,
) -> Result<ConductionStep, StepError> {
    let n = layout.len();
    if n == 0 || temperatures.len() != n {
        return Err(StepError::StateMismatch(format!(
            "construction '{}' has {n} nodes but {} temperatures were supplied",
            layout.construction,
            temperatures.len()
        )));
    }
    if !(dt.is_finite() && dt > 0.0) {
        return Err(StepError::InvalidTimestep(dt));
    }

    // Tridiagonal coefficients: a[i]*T[i-1] + b[i]*T[i] + c[i]*T[i+1] = d[i]
    let mut a = vec![0.0; n];
    let mut b = vec![0.0; n];
    let mut c = vec![0.0; n];
    let mut d = vec![0.0; n];

    for (i, node) in layout.nodes.iter().enumerate() {
        let cap = node.capacity_per_area() / dt;
        b[i] += cap;
        d[i] += cap * temperatures[i];
    }

    for (i, &k) in layout.links.iter().enumerate() {
        b[i] += k;
        b[i + 1] += k;
        c[i] -= k;
        a[i + 1] -= k;
    }

    let k_half_out = layout.nodes[0].half_conductance_out();
    let k_half_in = layout.nodes[n - 1].half_conductance_in();
    apply_bc(bc_exterior, k_half_out, &mut b[0], &mut d[0]);
    apply_bc(bc_interior, k_half_in, &mut b[n - 1], &mut d[n - 1]);

    thomas_solve(&a, &mut b, &c, &mut d)
        .map_err(|i| StepError::singular(format!("conduction solve of '{}' at node {i}", layout.construction)))?;

    if let Some(i) = d.iter().position(|t| !t.is_finite()) {
        return Err(StepError::singular(format!(
            "non-finite temperature in '{}' at node {i}",
            layout.construction
        )));
    }

    let q_inner = face_convective_flux(d[n - 1], bc_interior, k_half_in);
    let q_outer = face_net_outflow(d[0], bc_exterior, k_half_out);
    let inner_conductance = bc_interior
        .film_coefficient()
        .map(|h| series(h, k_half_in))
        .unwrap_or(0.0);

    Ok(ConductionStep {
        temperatures: d,
        q_inner,
        q_outer,
        inner_conductance,
    })
}

/// Per-surface conduction state: a shared layout plus owned node temperatures.
///
/// Stepping never mutates the wall; callers commit an accepted
/// [`ConductionStep`] explicitly once the zone iteration has converged.
#[derive(Debug, Clone, PartialEq)]
pub struct FdWall {
    layout: Arc<MeshLayout>,
    temperatures: Vec<f64>,
}

impl FdWall {
    /// Create a wall from a layout and a uniform initial temperature.
    pub fn new(layout: Arc<MeshLayout>, initial_temperature: f64) -> Self {
        let n = layout.len();
        Self {
            layout,
            temperatures: vec![initial_temperature; n],
        }
    }

    pub fn layout(&self) -> &Arc<MeshLayout> {
        &self.layout
    }

    /// Current node temperatures [°C], exterior to interior.
    pub fn temperatures(&self) -> &[f64] {
        &self.temperatures
    }

    /// Move the current profile onto `layout` (e.g. after a timestep change).
    pub fn remesh(&mut self, layout: Arc<MeshLayout>) {
        if Arc::ptr_eq(&self.layout, &layout) {
            return;
        }
        self.temperatures = remap_temperatures(&self.layout, &self.temperatures, &layout);
        self.layout = layout;
    }

    /// Solve one step from the current state without modifying it.
    pub fn step(
        &self,
        dt: f64,
        bc_exterior: &BoundaryCondition,
        bc_interior: &BoundaryCondition,
    ) -> Result<ConductionStep, StepError> {
        solve(&self.layout, &self.temperatures, dt, bc_exterior, bc_interior)
    }

    /// Accept a step's node temperatures as the new state.
    pub fn commit(&mut self, step: &ConductionStep) {
        self.temperatures.copy_from_slice(&step.temperatures);
    }

    /// Stored heat per area relative to 0 °C [J/m^2].
    pub fn stored_energy_per_area(&self) -> f64 {
        self.layout
            .nodes
            .iter()
            .zip(&self.temperatures)
            .map(|(n, t)| n.capacity_per_area() * t)
            .sum()
    }

    /// Estimate the interior **face** temperature (not the node centroid).
    pub fn interior_surface_temperature(&self, bc_interior: &BoundaryCondition) -> f64 {
        let n = self.temperatures.len();
        if n == 0 {
            return 0.0;
        }
        let k_half = self.layout.nodes[n - 1].half_conductance_in();
        face_temperature(self.temperatures[n - 1], bc_interior, k_half)
    }

    /// Estimate the exterior **face** temperature (not the node centroid).
    pub fn exterior_surface_temperature(&self, bc_exterior: &BoundaryCondition) -> f64 {
        let Some(&t0) = self.temperatures.first() else {
            return 0.0;
        };
        let k_half = self.layout.nodes[0].half_conductance_out();
        face_temperature(t0, bc_exterior, k_half)
    }
}

/// Film and half-node conductances in series [W/(m^2*K)].
fn series(h: f64, k_half: f64) -> f64 {
    if h <= 0.0 {
        return 0.0;
    }
    1.0 / (1.0 / h + 1.0 / k_half)
}

/// Fraction of a surface source conducted into the node rather than lost
/// through the film: `K_half / (K_half + h)`.
fn conduction_fraction(h: f64, k_half: f64) -> f64 {
    if h <= 0.0 {
        return 1.0;
    }
    k_half / (k_half + h)
}

/// Apply a boundary condition to the diagonal and RHS of the boundary node.
fn apply_bc(bc: &BoundaryCondition, k_half: f64, diag: &mut f64, rhs: &mut f64) {
    match *bc {
        BoundaryCondition::Adiabatic => {}
        BoundaryCondition::Dirichlet { temperature } => {
            *diag += k_half;
            *rhs += k_half * temperature;
        }
        BoundaryCondition::Convective { h, t_fluid } => {
            let k_eff = series(h, k_half);
            *diag += k_eff;
            *rhs += k_eff * t_fluid;
        }
        BoundaryCondition::ConvectiveWithFlux {
            h,
            t_fluid,
            heat_flux,
        } => {
            let k_eff = series(h, k_half);
            *diag += k_eff;
            *rhs += k_eff * t_fluid + conduction_fraction(h, k_half) * heat_flux;
        }
        BoundaryCondition::ConvectiveWithFluxToDomain {
            h,
            t_fluid,
            heat_flux,
        } => {
            let k_eff = series(h, k_half);
            *diag += k_eff;
            *rhs += k_eff * t_fluid + heat_flux;
        }
    }
}

/// Convective (or fixed-face) flux from the mesh into the fluid [W/m^2].
fn face_convective_flux(t_node: f64, bc: &BoundaryCondition, k_half: f64) -> f64 {
    match *bc {
        BoundaryCondition::Adiabatic => 0.0,
        BoundaryCondition::Dirichlet { temperature } => k_half * (t_node - temperature),
        BoundaryCondition::Convective { h, t_fluid }
        | BoundaryCondition::ConvectiveWithFluxToDomain { h, t_fluid, .. } => {
            series(h, k_half) * (t_node - t_fluid)
        }
        BoundaryCondition::ConvectiveWithFlux {
            h,
            t_fluid,
            heat_flux,
        } => {
            // h * (T_face - T_fluid) with the face temperature including the source.
            series(h, k_half) * (t_node - t_fluid) + (1.0 - conduction_fraction(h, k_half)) * heat_flux
        }
    }
}

/// Net heat leaving the mesh through a face [W/m^2], sources included.
fn face_net_outflow(t_node: f64, bc: &BoundaryCondition, k_half: f64) -> f64 {
    match *bc {
        BoundaryCondition::Adiabatic => 0.0,
        BoundaryCondition::Dirichlet { temperature } => k_half * (t_node - temperature),
        BoundaryCondition::Convective { h, t_fluid } => series(h, k_half) * (t_node - t_fluid),
        BoundaryCondition::ConvectiveWithFlux {
            h,
            t_fluid,
            heat_flux,
        } => series(h, k_half) * (t_node - t_fluid) - conduction_fraction(h, k_half) * heat_flux,
        BoundaryCondition::ConvectiveWithFluxToDomain {
            h,
            t_fluid,
            heat_flux,
        } => series(h, k_half) * (t_node - t_fluid) - heat_flux,
    }
}

/// Reconstruct the face temperature from the boundary node temperature.
fn face_temperature(t_node: f64, bc: &BoundaryCondition, k_half: f64) -> f64 {
    match *bc {
        BoundaryCondition::Dirichlet { temperature } => temperature,
        BoundaryCondition::Adiabatic => t_node,
        BoundaryCondition::Convective { h, t_fluid }
        | BoundaryCondition::ConvectiveWithFluxToDomain { h, t_fluid, .. } => {
            if h <= 0.0 {
                return t_node;
            }
            (k_half * t_node + h * t_fluid) / (k_half + h)
        }
        BoundaryCondition::ConvectiveWithFlux {
            h,
            t_fluid,
            heat_flux,
        } => {
            if h <= 0.0 {
                return t_node;
            }
            (k_half * t_node + h * t_fluid + heat_flux) / (k_half + h)
        }
    }
}

/// Thomas algorithm for a tridiagonal system.
///
/// On entry:
/// - `a[i]` is the sub-diagonal (a[0] unused)
/// - `b[i]` is the diagonal
/// - `c[i]` is the super-diagonal (c[n-1] unused)
/// - `d[i]` is the RHS
///
/// On exit `d` contains the solution. Returns the row index of a zero or
/// non-finite pivot.
fn thomas_solve(a: &[f64], b: &mut [f64], c: &[f64], d: &mut [f64]) -> Result<(), usize> {
    const PIVOT_EPS: f64 = 1e-300;
    let n = b.len();
    if n == 0 {
        return Ok(());
    }

    let check = |p: f64, i: usize| {
        if p.is_finite() && p.abs() > PIVOT_EPS {
            Ok(())
        } else {
            Err(i)
        }
    };

    // Forward sweep
    for i in 1..n {
        check(b[i - 1], i - 1)?;
        let w = a[i] / b[i - 1];
        b[i] -= w * c[i - 1];
        d[i] -= w * d[i - 1];
    }

    // Back substitution
    check(b[n - 1], n - 1)?;
    d[n - 1] /= b[n - 1];
    for i in (0..n - 1).rev() {
        d[i] = (d[i] - c[i] * d[i + 1]) / b[i];
    }
    Ok(())
}
