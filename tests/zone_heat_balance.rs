use std::sync::Arc;

use approx::assert_relative_eq;
use thermozone::sim::energy::{
    box_surfaces, BoundaryConditions, ConstantAch, ConstantBoundary, Construction, ConvectionConfig,
    ConvectionSelector, Face, IdealLoadsHvac, NoAirExchange, NoHvac, PiThermostat, Simulation, SolverOptions,
    StepWarning, SurfaceBoundary, Window, Zone, ZoneCoupledSolver,
};
use thermozone::sim::heat_transfer::discretize;
use thermozone::sim::materials::Layer;

fn concrete() -> Layer {
    Layer::new("Concrete", 0.10, 1.4, 2300.0, 880.0)
}

fn insulation() -> Layer {
    Layer::new("Insulation", 0.08, 0.04, 30.0, 1030.0)
}

fn sandwich() -> Construction {
    Construction::new("sandwich", vec![concrete(), insulation(), concrete()]).unwrap()
}

fn board() -> Construction {
    Construction::new("board", vec![Layer::new("Board", 0.05, 0.1, 500.0, 1000.0)]).unwrap()
}

fn box_zone(l: f64, w: f64, h: f64, construction: Construction, exterior: &[&str]) -> Zone {
    let c = Arc::new(construction);
    Zone {
        name: "test".to_string(),
        length: l,
        width: w,
        height: h,
        heat_capacity_multiplier: 1.0,
        surfaces: box_surfaces(l, w, h, &c, exterior),
        windows: vec![],
    }
}

fn solver_with(zone: Zone, convection: &ConvectionConfig, options: SolverOptions) -> ZoneCoupledSolver {
    let selector = ConvectionSelector::new(convection, zone.volume()).unwrap();
    ZoneCoupledSolver::new(zone, selector, Box::new(NoAirExchange), options).unwrap()
}

#[test]
fn test_single_surface_steady_flux_matches_ua() {
    let (h_in, h_out) = (3.0, 20.0);
    let zone = box_zone(4.0, 3.0, 2.7, board(), &["roof"]);
    let roof = zone.surface_index("roof").unwrap();
    let ua = zone.surfaces[roof].construction.u_value(h_in, h_out) * zone.surfaces[roof].area;
    let solver = solver_with(zone, &ConvectionConfig::fixed(h_in, h_out), SolverOptions::default());

    let gains = 300.0;
    let mut bc = BoundaryConditions::still_air(0.0);
    bc.internal_gains_w = gains;
    let mut sim = Simulation::new(solver, Box::new(NoHvac), 0.0, 3600.0);
    let mut last = None;
    sim.run_with(&mut ConstantBoundary(bc), 500, 3600.0, |_, _, terms| {
        last = Some(terms.clone());
    })
    .unwrap();

    let terms = last.unwrap();
    let t_air = sim.state().air_temp_c;
    assert_relative_eq!(t_air, gains / ua, max_relative = 1e-3);
    assert_relative_eq!(terms.fabric_loss_w, ua * t_air, max_relative = 1e-3);
    assert_relative_eq!(terms.fabric_loss_w, gains, max_relative = 1e-3);
}

#[test]
fn test_energy_closes_every_step() {
    let mut zone = box_zone(6.0, 5.0, 3.0, sandwich(), &["south_wall", "west_wall", "roof"]);
    let south = zone.surface_index("south_wall").unwrap();
    let floor = zone.surface_index("floor").unwrap();
    let north = zone.surface_index("north_wall").unwrap();
    zone.windows.push(Window {
        name: "glazing".to_string(),
        parent: south,
        area: 3.0,
        u_value: 1.8,
        shgc: 0.5,
        solar_distribution: vec![(floor, 0.5), (north, 0.2)],
    });
    zone.subtract_window_areas().unwrap();
    let capacity = zone.air_heat_capacity();
    let volume = zone.volume();
    let selector = ConvectionSelector::new(&ConvectionConfig::default(), volume).unwrap();
    let ach = ConstantAch {
        zone_volume_m3: volume,
        ach: 0.8,
    };
    let solver = ZoneCoupledSolver::new(zone, selector, Box::new(ach), SolverOptions::default()).unwrap();
    let mut sim = Simulation::new(solver, Box::new(IdealLoadsHvac::new(1500.0, 1500.0)), 16.0, 300.0);

    let mut provider = |step: usize, _t: f64| {
        let mut bc = BoundaryConditions::still_air(-2.0 + 0.1 * step as f64);
        bc.wind_speed_ms = 4.0;
        bc.wind_direction_deg = 200.0;
        bc.internal_gains_w = if step % 12 < 6 { 600.0 } else { 0.0 };
        bc.hvac_setpoint_c = Some(21.0);
        bc.per_surface_solar_irradiance_w_m2
            .insert("south_wall".to_string(), 300.0);
        bc.per_surface_solar_irradiance_w_m2.insert("roof".to_string(), 500.0);
        bc
    };
    let mut previous = sim.state().air_temp_c;
    let mut total_net_j = 0.0;
    sim.run_with(&mut provider, 96, 300.0, |_, state, terms| {
        let stored_w = capacity * (state.air_temp_c - previous) / 300.0;
        assert!(
            (stored_w - terms.net_gain_w()).abs() < 1e-6 * stored_w.abs().max(1.0),
            "stored {stored_w} W, net {} W",
            terms.net_gain_w()
        );
        total_net_j += terms.net_gain_w() * 300.0;
        previous = state.air_temp_c;
    })
    .unwrap();
    let stored_j = capacity * (sim.state().air_temp_c - 16.0);
    assert!((total_net_j - stored_j).abs() < 1e-4 * stored_j.abs().max(1.0));
}

#[test]
fn test_mesh_respects_fourier_limit() {
    let construction = sandwich();
    for &limit in &[0.5, 0.25] {
        for &dt in &[30.0, 60.0, 300.0, 600.0] {
            let layout = discretize(&construction, dt, limit);
            assert_eq!(layout.nodes_per_layer.len(), 3);
            assert!(
                layout.max_fourier() <= limit * (1.0 + 1e-12),
                "dt={dt} limit={limit} Fo={}",
                layout.max_fourier()
            );
            let thickness: f64 = layout.nodes.iter().map(|n| n.dx).sum();
            assert!((thickness - construction.thickness()).abs() < 1e-12);
        }
    }
    // Insulation is thinner than its Fourier spacing at one hour.
    let coarse = discretize(&construction, 3600.0, 0.5);
    assert_eq!(coarse.nodes_per_layer[1], 1);
}

#[test]
fn test_adiabatic_zone_is_idempotent() {
    let zone = box_zone(5.0, 4.0, 3.0, sandwich(), &[]);
    assert!(zone
        .surfaces
        .iter()
        .all(|s| s.boundary == SurfaceBoundary::Adiabatic));
    let solver = solver_with(zone, &ConvectionConfig::default(), SolverOptions::default());
    let mut sim = Simulation::new(solver, Box::new(NoHvac), 17.5, 600.0);
    let summary = sim
        .run(&mut ConstantBoundary(BoundaryConditions::still_air(-10.0)), 200, 600.0)
        .unwrap();
    assert!((sim.state().air_temp_c - 17.5).abs() < 1e-9);
    assert!(sim.state().node_temperatures().all(|t| (t - 17.5).abs() < 1e-9));
    assert_eq!(summary.convergence_warnings, 0);
    assert_eq!(summary.heating_kwh, 0.0);
}

#[test]
fn test_iteration_limit_reports_warning_and_commits() {
    let options = SolverOptions {
        max_iterations: 1,
        tolerance_c: 1e-12,
        ..SolverOptions::default()
    };
    let zone = box_zone(10.0, 8.0, 2.8, sandwich(), &["south_wall"]);
    let solver = solver_with(zone, &ConvectionConfig::default(), options);
    let dt = 60.0;
    let mut sim = Simulation::new(solver, Box::new(NoHvac), 20.0, dt);
    let mut warnings = Vec::new();
    let summary = sim
        .run_with(
            &mut ConstantBoundary(BoundaryConditions::still_air(0.0)),
            10,
            dt,
            |_, _, terms| warnings.extend(terms.warnings.iter().cloned()),
        )
        .unwrap();
    assert_eq!(summary.steps, 10);
    assert_eq!(summary.convergence_warnings, 10);
    assert_eq!(summary.max_iterations_used, 1);
    assert!(warnings
        .iter()
        .all(|w| matches!(w, StepWarning::Convergence { iterations: 1, residual_c } if *residual_c > 0.0)));
    assert!(sim.state().air_temp_c < 20.0);
}

#[test]
fn test_free_float_cools_monotonically_without_undershoot() {
    let zone = box_zone(10.0, 8.0, 2.8, sandwich(), &["south_wall"]);
    let solver = solver_with(zone, &ConvectionConfig::default(), SolverOptions::default());
    let mut sim = Simulation::new(solver, Box::new(NoHvac), 20.0, 60.0);

    let mut previous = 20.0;
    sim.run_with(
        &mut ConstantBoundary(BoundaryConditions::still_air(0.0)),
        1440,
        60.0,
        |k, state, _| {
            let t = state.air_temp_c;
            assert!(t <= previous + 1e-6, "step {k}: {t} > {previous}");
            assert!(t > 0.0, "step {k}: undershoot to {t}");
            previous = t;
        },
    )
    .unwrap();
    assert!(sim.state().air_temp_c < 20.0);
}

#[test]
fn test_held_zone_reaches_wall_ua_loss() {
    let zone = box_zone(10.0, 8.0, 2.8, sandwich(), &["south_wall"]);
    let south = zone.surface_index("south_wall").unwrap();
    let surface = zone.surfaces[south].clone();
    let convection = ConvectionConfig::default();
    let selector = ConvectionSelector::new(&convection, zone.volume()).unwrap();
    let solver = solver_with(zone, &convection, SolverOptions::default());
    let dt = 60.0;
    let mut sim = Simulation::new(solver, Box::new(IdealLoadsHvac::unlimited()), 20.0, dt);

    let mut bc = BoundaryConditions::still_air(0.0);
    bc.hvac_setpoint_c = Some(20.0);
    let mut last = None;
    sim.run_with(&mut ConstantBoundary(bc), 14 * 1440, dt, |_, _, terms| {
        last = Some(terms.clone());
    })
    .unwrap();
    let terms = last.unwrap();
    let state = sim.state();
    assert!((state.air_temp_c - 20.0).abs() < 1e-6);

    let face = state.faces[south];
    let h_in = selector
        .select(Face::Interior, &surface, face.interior_c, state.air_temp_c, 0.0, 0.0)
        .unwrap();
    let h_out = selector
        .select(Face::Exterior, &surface, face.exterior_c, 0.0, 0.0, 0.0)
        .unwrap();
    let ua = surface.construction.u_value(h_in, h_out) * surface.area;
    assert_relative_eq!(terms.fabric_loss_w, ua * (state.air_temp_c - 0.0), max_relative = 2e-3);
    assert_relative_eq!(terms.hvac_power_w, terms.fabric_loss_w, max_relative = 1e-6);
    // Steady wall: what enters from the air leaves through the exterior face.
    assert_relative_eq!(terms.fabric_exterior_loss_w, terms.fabric_loss_w, max_relative = 5e-3);
}

#[test]
fn test_proportional_thermostat_holds_near_setpoint() {
    let mut bc = BoundaryConditions::still_air(0.0);
    bc.hvac_setpoint_c = Some(21.0);
    for kp in [2000.0, 5000.0] {
        let zone = box_zone(10.0, 8.0, 2.8, sandwich(), &["south_wall"]);
        let solver = solver_with(zone, &ConvectionConfig::default(), SolverOptions::default());
        let mut sim = Simulation::new(solver, Box::new(PiThermostat::new(kp, 0.0)), 20.0, 600.0);
        let summary = sim.run(&mut ConstantBoundary(bc.clone()), 144, 600.0).unwrap();

        assert_eq!(summary.convergence_warnings, 0, "kp={kp}");
        assert!(summary.min_air_temp_c > 20.0, "kp={kp}: min {}", summary.min_air_temp_c);
        assert!(summary.max_air_temp_c < 21.0, "kp={kp}: max {}", summary.max_air_temp_c);
        assert!(summary.heating_kwh > 0.0);
        assert_eq!(summary.cooling_kwh, 0.0);
    }
}

#[test]
fn test_ground_coupled_zone_settles_to_ground_temperature() {
    let ground_c = 12.0;
    let mut zone = box_zone(4.0, 3.0, 2.7, board(), &[]);
    let floor = zone.surface_index("floor").unwrap();
    zone.surfaces[floor].boundary = SurfaceBoundary::Ground {
        temperature_c: ground_c,
    };
    let solver = solver_with(zone, &ConvectionConfig::fixed(3.0, 20.0), SolverOptions::default());
    let mut sim = Simulation::new(solver, Box::new(NoHvac), 20.0, 3600.0);

    let mut last = None;
    let summary = sim
        .run_with(&mut ConstantBoundary(BoundaryConditions::still_air(-5.0)), 1000, 3600.0, |_, _, terms| {
            last = Some(terms.clone());
        })
        .unwrap();
    let terms = last.unwrap();

    assert_eq!(summary.convergence_warnings, 0);
    assert!((sim.state().air_temp_c - ground_c).abs() < 1e-3, "T_air={}", sim.state().air_temp_c);
    assert!(sim.state().node_temperatures().all(|t| (t - ground_c).abs() < 1e-3));
    assert!(terms.fabric_loss_w.abs() < 1e-2, "fabric loss {} W", terms.fabric_loss_w);
    assert!(terms.fabric_exterior_loss_w.abs() < 1e-2);
}
