//! Model configuration document and its validation.
//!
//! [`ModelConfig`] mirrors the JSON layout one-to-one. Nothing in it is
//! trusted until [`ModelConfig::build`] has resolved every name and checked
//! every number; the resulting [`Model`] is the only way to get a solver.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sim::materials::{Layer, MaterialLibrary};

use super::air_exchange::{Aim2AirExchange, Aim2Params, AirExchangeModel, ConstantAch, NoAirExchange};
use super::boundary::BoundaryConditions;
use super::construction::Construction;
use super::convection::{ConvectionConfig, ConvectionSelector};
use super::error::ConfigError;
use super::global_solve::{SolverOptions, ZoneCoupledSolver};
use super::hvac::{HvacModel, IdealLoadsHvac, NoHvac, PiThermostat};
use super::window::Window;
use super::zone::{box_surfaces, Surface, SurfaceBoundary, SurfaceType, Zone};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneConfig {
    #[serde(default = "default_zone_name")]
    pub name: String,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default = "one")]
    pub heat_capacity_multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructionConfig {
    pub name: String,
    /// Material names, outside to inside.
    pub layers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceConfig {
    pub name: String,
    pub area: f64,
    pub perimeter: f64,
    pub tilt_deg: f64,
    pub azimuth_deg: f64,
    #[serde(rename = "type")]
    pub surface_type: SurfaceType,
    pub roughness_index: u8,
    pub construction: String,
    pub boundary: SurfaceBoundary,
    #[serde(default = "default_absorptance")]
    pub solar_absorptance: f64,
}

/// Six surfaces of the zone's bounding box sharing one construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxSurfacesConfig {
    pub construction: String,
    /// Surfaces facing outdoor air; the others are adiabatic.
    pub exterior: Vec<String>,
    /// Couple the floor to a fixed ground temperature instead.
    #[serde(default)]
    pub ground_temperature_c: Option<f64>,
    #[serde(default = "default_absorptance")]
    pub solar_absorptance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub name: String,
    /// Parent surface name.
    pub surface: String,
    pub area: f64,
    pub u_value: f64,
    pub shgc: f64,
    /// Surface name to fraction of transmitted solar absorbed there.
    #[serde(default)]
    pub solar_distribution: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum AirExchangeConfig {
    None,
    ConstantAch {
        ach: f64,
    },
    Aim2 {
        #[serde(flatten)]
        params: Aim2Params,
        #[serde(default)]
        open_window_ach: f64,
    },
}

impl Default for AirExchangeConfig {
    fn default() -> Self {
        Self::None
    }
}

/// HVAC section. Omitted capacities are unlimited; `0` disables that
/// direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum HvacConfig {
    None,
    IdealLoads {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        heating_capacity_w: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cooling_capacity_w: Option<f64>,
        #[serde(default)]
        deadband_c: f64,
    },
    Pi {
        kp_w_per_k: f64,
        ki_w_per_k_s: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        heating_capacity_w: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cooling_capacity_w: Option<f64>,
    },
}

impl Default for HvacConfig {
    fn default() -> Self {
        Self::None
    }
}

/// Driver settings; the boundary conditions are held constant for the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub dt_s: f64,
    pub steps: usize,
    pub warmup_days: usize,
    pub initial_temperature_c: f64,
    pub boundary: BoundaryConditions,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            dt_s: 60.0,
            steps: 1440,
            warmup_days: 3,
            initial_temperature_c: 20.0,
            boundary: BoundaryConditions::default(),
        }
    }
}

/// Complete model configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub zone: ZoneConfig,
    pub materials: Vec<Layer>,
    pub constructions: Vec<ConstructionConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub surfaces: Vec<SurfaceConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_surfaces: Option<BoxSurfacesConfig>,
    #[serde(default)]
    pub windows: Vec<WindowConfig>,
    #[serde(default)]
    pub convection: ConvectionConfig,
    #[serde(default)]
    pub solver: SolverOptions,
    #[serde(default)]
    pub air_exchange: AirExchangeConfig,
    #[serde(default)]
    pub hvac: HvacConfig,
    #[serde(default)]
    pub run: RunConfig,
}

/// A validated, ready-to-step model.
pub struct Model {
    pub solver: ZoneCoupledSolver,
    pub hvac: Box<dyn HvacModel>,
    pub run: RunConfig,
}

impl ModelConfig {
    /// Resolve all references and validate all values.
    pub fn build(&self) -> Result<Model, ConfigError> {
        let library = MaterialLibrary::from_layers(self.materials.iter().cloned())?;

        let mut constructions: HashMap<&str, Arc<Construction>> = HashMap::new();
        for c in &self.constructions {
            let built = Construction::from_library(&c.name, &c.layers, &library)?;
            debug!(
                construction = %c.name,
                resistance_m2k_w = built.resistance(),
                capacity_j_m2k = built.thermal_capacity(),
                "construction built"
            );
            if constructions.insert(&c.name, Arc::new(built)).is_some() {
                return Err(ConfigError::DuplicateName {
                    kind: "construction",
                    name: c.name.clone(),
                });
            }
        }
        let lookup = |surface: &str, name: &str| {
            constructions
                .get(name)
                .cloned()
                .ok_or_else(|| ConfigError::UnknownConstruction {
                    surface: surface.to_string(),
                    construction: name.to_string(),
                })
        };

        let z = &self.zone;
        let surfaces = match (&self.box_surfaces, self.surfaces.is_empty()) {
            (Some(b), true) => self.box_surfaces_from(b, &lookup)?,
            (None, false) => self
                .surfaces
                .iter()
                .map(|s| {
                    Ok(Surface {
                        name: s.name.clone(),
                        area: s.area,
                        perimeter: s.perimeter,
                        tilt_deg: s.tilt_deg,
                        azimuth_deg: s.azimuth_deg,
                        surface_type: s.surface_type,
                        roughness_index: s.roughness_index,
                        construction: lookup(&s.name, &s.construction)?,
                        boundary: s.boundary,
                        solar_absorptance: s.solar_absorptance,
                    })
                })
                .collect::<Result<Vec<_>, ConfigError>>()?,
            (Some(_), false) => {
                return Err(ConfigError::invalid(
                    "configuration",
                    "give either `surfaces` or `box_surfaces`, not both",
                ))
            }
            (None, true) => return Err(ConfigError::invalid("configuration", "zone has no surfaces")),
        };

        let mut zone = Zone {
            name: z.name.clone(),
            length: z.length,
            width: z.width,
            height: z.height,
            heat_capacity_multiplier: z.heat_capacity_multiplier,
            surfaces,
            windows: Vec::new(),
        };
        zone.windows = self.windows(&zone)?;
        zone.validate()?;
        zone.subtract_window_areas()?;

        let volume = zone.volume();
        let convection = ConvectionSelector::new(&self.convection, volume)?;
        let air_exchange: Box<dyn AirExchangeModel> = match &self.air_exchange {
            AirExchangeConfig::None => Box::new(NoAirExchange),
            AirExchangeConfig::ConstantAch { ach } => {
                if !(ach.is_finite() && *ach >= 0.0) {
                    return Err(ConfigError::invalid("air exchange", format!("ACH must be >= 0 (got {ach})")));
                }
                Box::new(ConstantAch {
                    zone_volume_m3: volume,
                    ach: *ach,
                })
            }
            AirExchangeConfig::Aim2 {
                params,
                open_window_ach,
            } => Box::new(Aim2AirExchange::new(*params, *open_window_ach, volume)?),
        };
        let hvac = self.hvac_model()?;
        self.validate_run()?;

        let solver = ZoneCoupledSolver::new(zone, convection, air_exchange, self.solver)?;
        Ok(Model {
            solver,
            hvac,
            run: self.run.clone(),
        })
    }

    fn box_surfaces_from(
        &self,
        b: &BoxSurfacesConfig,
        lookup: &dyn Fn(&str, &str) -> Result<Arc<Construction>, ConfigError>,
    ) -> Result<Vec<Surface>, ConfigError> {
        const NAMES: [&str; 6] = ["north_wall", "east_wall", "south_wall", "west_wall", "roof", "floor"];
        if let Some(unknown) = b.exterior.iter().find(|n| !NAMES.contains(&n.as_str())) {
            return Err(ConfigError::invalid(
                "box_surfaces",
                format!("unknown surface '{unknown}' (expected one of {NAMES:?})"),
            ));
        }
        let construction = lookup("box", &b.construction)?;
        let exterior: Vec<&str> = b.exterior.iter().map(String::as_str).collect();
        let z = &self.zone;
        let mut surfaces = box_surfaces(z.length, z.width, z.height, &construction, &exterior);
        for s in &mut surfaces {
            s.solar_absorptance = b.solar_absorptance;
            if let (SurfaceType::Floor, Some(t)) = (s.surface_type, b.ground_temperature_c) {
                s.boundary = SurfaceBoundary::Ground { temperature_c: t };
            }
        }
        Ok(surfaces)
    }

    fn windows(&self, zone: &Zone) -> Result<Vec<Window>, ConfigError> {
        let index = |window: &str, surface: &str| {
            zone.surface_index(surface).ok_or_else(|| ConfigError::UnknownSurface {
                window: window.to_string(),
                surface: surface.to_string(),
            })
        };
        let mut out: Vec<Window> = Vec::with_capacity(self.windows.len());
        for w in &self.windows {
            if out.iter().any(|o| o.name == w.name) {
                return Err(ConfigError::DuplicateName {
                    kind: "window",
                    name: w.name.clone(),
                });
            }
            let solar_distribution = w
                .solar_distribution
                .iter()
                .map(|(s, &f)| Ok((index(&w.name, s)?, f)))
                .collect::<Result<Vec<_>, ConfigError>>()?;
            out.push(Window {
                name: w.name.clone(),
                parent: index(&w.name, &w.surface)?,
                area: w.area,
                u_value: w.u_value,
                shgc: w.shgc,
                solar_distribution,
            });
        }
        Ok(out)
    }

    fn hvac_model(&self) -> Result<Box<dyn HvacModel>, ConfigError> {
        let non_negative = |what: &str, v: f64| {
            if v.is_finite() && v >= 0.0 {
                Ok(())
            } else {
                Err(ConfigError::invalid("hvac", format!("{what} must be >= 0 (got {v})")))
            }
        };
        let capacity = |what: &str, v: Option<f64>| v.map_or(Ok(()), |v| non_negative(what, v));
        Ok(match self.hvac {
            HvacConfig::None => Box::new(NoHvac),
            HvacConfig::IdealLoads {
                heating_capacity_w,
                cooling_capacity_w,
                deadband_c,
            } => {
                capacity("heating capacity", heating_capacity_w)?;
                capacity("cooling capacity", cooling_capacity_w)?;
                non_negative("deadband", deadband_c)?;
                Box::new(
                    IdealLoadsHvac::with_capacities(heating_capacity_w, cooling_capacity_w).with_deadband(deadband_c),
                )
            }
            HvacConfig::Pi {
                kp_w_per_k,
                ki_w_per_k_s,
                heating_capacity_w,
                cooling_capacity_w,
            } => {
                non_negative("kp", kp_w_per_k)?;
                non_negative("ki", ki_w_per_k_s)?;
                capacity("heating capacity", heating_capacity_w)?;
                capacity("cooling capacity", cooling_capacity_w)?;
                Box::new(
                    PiThermostat::new(kp_w_per_k, ki_w_per_k_s).with_capacities(heating_capacity_w, cooling_capacity_w),
                )
            }
        })
    }

    fn validate_run(&self) -> Result<(), ConfigError> {
        let r = &self.run;
        if !(r.dt_s.is_finite() && r.dt_s > 0.0) {
            return Err(ConfigError::invalid("run", format!("dt_s must be > 0 (got {})", r.dt_s)));
        }
        let (lo, hi) = (self.solver.min_temperature_c, self.solver.max_temperature_c);
        if !(lo..=hi).contains(&r.initial_temperature_c) {
            return Err(ConfigError::invalid(
                "run",
                format!(
                    "initial temperature {} °C outside [{lo}, {hi}] °C",
                    r.initial_temperature_c
                ),
            ));
        }
        let b = &r.boundary;
        if !(0.0..=1.0).contains(&b.window_open_fraction) {
            return Err(ConfigError::invalid(
                "run.boundary",
                format!("window_open_fraction must be in [0, 1] (got {})", b.window_open_fraction),
            ));
        }
        Ok(())
    }
}

fn default_zone_name() -> String {
    "zone".to_string()
}

fn one() -> f64 {
    1.0
}

fn default_absorptance() -> f64 {
    0.6
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ModelConfig {
        let json = r#"{
            "zone": {"length": 10.0, "width": 8.0, "height": 2.8},
            "materials": [
                {"name": "Concrete", "thickness": 0.1, "conductivity": 1.4, "density": 2300, "specific_heat": 880},
                {"name": "Insulation", "thickness": 0.08, "conductivity": 0.04, "density": 30, "specific_heat": 1030}
            ],
            "constructions": [{"name": "wall", "layers": ["Concrete", "Insulation", "Concrete"]}],
            "box_surfaces": {"construction": "wall", "exterior": ["south_wall"]},
            "windows": [{"name": "w1", "surface": "south_wall", "area": 4.0, "u_value": 1.4,
                         "shgc": 0.6, "solar_distribution": {"floor": 0.6}}],
            "hvac": {"model": "ideal_loads", "heating_capacity_w": 5000}
        }"#;
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_build_box_model() {
        let model = config().build().unwrap();
        let zone = model.solver.zone();
        assert_eq!(zone.surfaces.len(), 6);
        let south = zone.surface_index("south_wall").unwrap();
        assert!((zone.surfaces[south].area - (8.0 * 2.8 - 4.0)).abs() < 1e-12);
        assert_eq!(zone.windows[0].solar_distribution, vec![(zone.surface_index("floor").unwrap(), 0.6)]);
        assert_eq!(model.run.dt_s, 60.0);
        assert_eq!(model.solver.options().max_iterations, 10);
    }

    #[test]
    fn test_unknown_material_rejected() {
        let mut cfg = config();
        cfg.constructions[0].layers.push("Brick".into());
        assert!(matches!(cfg.build(), Err(ConfigError::UnknownMaterial { .. })));
    }

    #[test]
    fn test_non_positive_property_rejected() {
        let mut cfg = config();
        cfg.materials[1].conductivity = 0.0;
        assert!(matches!(cfg.build(), Err(ConfigError::NonPositiveProperty { .. })));
    }

    #[test]
    fn test_unknown_surface_in_distribution_rejected() {
        let mut cfg = config();
        cfg.windows[0].solar_distribution.insert("ceiling".into(), 0.1);
        assert!(matches!(cfg.build(), Err(ConfigError::UnknownSurface { .. })));
    }

    #[test]
    fn test_distribution_sum_rejected() {
        let mut cfg = config();
        cfg.windows[0].solar_distribution.insert("north_wall".into(), 0.5);
        assert!(matches!(cfg.build(), Err(ConfigError::InvalidSolarDistribution { .. })));
    }

    #[test]
    fn test_surfaces_and_box_are_exclusive() {
        let mut cfg = config();
        cfg.surfaces.push(SurfaceConfig {
            name: "extra".into(),
            area: 1.0,
            perimeter: 4.0,
            tilt_deg: 90.0,
            azimuth_deg: 0.0,
            surface_type: SurfaceType::Wall,
            roughness_index: 2,
            construction: "wall".into(),
            boundary: SurfaceBoundary::Adiabatic,
            solar_absorptance: 0.6,
        });
        assert!(cfg.build().is_err());
        cfg.box_surfaces = None;
        cfg.windows.clear();
        assert!(cfg.build().is_ok());
    }

    #[test]
    fn test_ground_floor() {
        let mut cfg = config();
        if let Some(b) = cfg.box_surfaces.as_mut() {
            b.ground_temperature_c = Some(10.0);
        }
        let model = cfg.build().unwrap();
        let zone = model.solver.zone();
        let floor = &zone.surfaces[zone.surface_index("floor").unwrap()];
        assert_eq!(floor.boundary, SurfaceBoundary::Ground { temperature_c: 10.0 });
    }

    #[test]
    fn test_tagged_sections_parse() {
        let json = r#"{"model": "aim2", "flow_coefficient": 0.02, "open_window_ach": 5.0}"#;
        let ax: AirExchangeConfig = serde_json::from_str(json).unwrap();
        match ax {
            AirExchangeConfig::Aim2 {
                params,
                open_window_ach,
            } => {
                assert_eq!(params.flow_coefficient, 0.02);
                assert_eq!(params.pressure_exponent, 0.65);
                assert_eq!(open_window_ach, 5.0);
            }
            other => panic!("unexpected {other:?}"),
        }
        let hvac: HvacConfig = serde_json::from_str(r#"{"model": "pi", "kp_w_per_k": 200, "ki_w_per_k_s": 0.1}"#).unwrap();
        assert!(matches!(
            hvac,
            HvacConfig::Pi {
                heating_capacity_w: None,
                cooling_capacity_w: None,
                ..
            }
        ));
    }

    #[test]
    fn test_hvac_capacity_zero_is_distinct_from_omitted() {
        let json = r#"{"model": "ideal_loads", "heating_capacity_w": 0, "deadband_c": 0.5}"#;
        let hvac: HvacConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            hvac,
            HvacConfig::IdealLoads {
                heating_capacity_w: Some(0.0),
                cooling_capacity_w: None,
                deadband_c: 0.5,
            }
        );

        let mut cfg = config();
        cfg.hvac = HvacConfig::IdealLoads {
            heating_capacity_w: Some(-1.0),
            cooling_capacity_w: None,
            deadband_c: 0.0,
        };
        assert!(matches!(cfg.build(), Err(ConfigError::InvalidValue { .. })));
    }
}
