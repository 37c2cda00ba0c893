use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::sim::heat_transfer::{FdWall, MeshCache};

use super::construction::Construction;
use super::error::ConfigError;
use super::window::Window;

/// Density of air in kg/m^3 (standard conditions).
pub const AIR_DENSITY: f64 = 1.225;
/// Specific heat capacity of air in J/(kg*K).
pub const AIR_SPECIFIC_HEAT: f64 = 1006.0;

/// Geometric class of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceType {
    Wall,
    Roof,
    Floor,
}

/// What the outer face of a surface is coupled to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SurfaceBoundary {
    /// Outdoor air, with wind- and buoyancy-dependent convection.
    Exterior,
    /// No heat flow through the outer face.
    Adiabatic,
    /// Outer face held at a fixed temperature (ground proxy).
    Ground { temperature_c: f64 },
}

/// An opaque surface of the zone.
#[derive(Debug, Clone)]
pub struct Surface {
    pub name: String,
    /// Opaque area in m^2 (windows already subtracted).
    pub area: f64,
    /// Perimeter in m.
    pub perimeter: f64,
    /// Tilt of the outward normal from vertical-up in degrees
    /// (roof 0, wall 90, floor 180).
    pub tilt_deg: f64,
    /// Azimuth of the outward normal in degrees (north 0, east 90).
    pub azimuth_deg: f64,
    pub surface_type: SurfaceType,
    /// Roughness index 1 (very rough) to 6 (very smooth).
    pub roughness_index: u8,
    pub construction: Arc<Construction>,
    pub boundary: SurfaceBoundary,
    /// Exterior shortwave absorptance (0..1).
    pub solar_absorptance: f64,
}

impl Surface {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ctx = || format!("surface '{}'", self.name);
        if !(self.area.is_finite() && self.area > 0.0) {
            return Err(ConfigError::invalid(ctx(), format!("area must be > 0 (got {})", self.area)));
        }
        if !(self.perimeter.is_finite() && self.perimeter > 0.0) {
            return Err(ConfigError::invalid(
                ctx(),
                format!("perimeter must be > 0 (got {})", self.perimeter),
            ));
        }
        if !(0.0..=180.0).contains(&self.tilt_deg) {
            return Err(ConfigError::invalid(
                ctx(),
                format!("tilt must be in [0, 180] (got {})", self.tilt_deg),
            ));
        }
        if !(0.0..=360.0).contains(&self.azimuth_deg) {
            return Err(ConfigError::invalid(
                ctx(),
                format!("azimuth must be in [0, 360] (got {})", self.azimuth_deg),
            ));
        }
        if !(1..=6).contains(&self.roughness_index) {
            return Err(ConfigError::invalid(
                ctx(),
                format!("roughness index must be 1..=6 (got {})", self.roughness_index),
            ));
        }
        if !(0.0..=1.0).contains(&self.solar_absorptance) {
            return Err(ConfigError::invalid(
                ctx(),
                format!("solar absorptance must be in [0, 1] (got {})", self.solar_absorptance),
            ));
        }
        if let SurfaceBoundary::Ground { temperature_c } = self.boundary {
            if !temperature_c.is_finite() {
                return Err(ConfigError::invalid(ctx(), "ground temperature must be finite"));
            }
        }
        Ok(())
    }

    /// Cosine of the outward-normal tilt.
    pub fn cos_tilt(&self) -> f64 {
        self.tilt_deg.to_radians().cos()
    }
}

/// A single thermal zone: air volume plus the surfaces and windows around it.
///
/// Surfaces and windows are fixed for the lifetime of a simulation; only the
/// state in [`ZoneState`] changes from step to step.
#[derive(Debug, Clone)]
pub struct Zone {
    pub name: String,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    /// Multiplier on air capacity accounting for furnishings.
    pub heat_capacity_multiplier: f64,
    pub surfaces: Vec<Surface>,
    pub windows: Vec<Window>,
}

impl Zone {
    pub fn volume(&self) -> f64 {
        self.length * self.width * self.height
    }

    /// Air heat capacity C_air in J/K.
    pub fn air_heat_capacity(&self) -> f64 {
        self.volume() * AIR_DENSITY * AIR_SPECIFIC_HEAT * self.heat_capacity_multiplier
    }

    pub fn surface_index(&self, name: &str) -> Option<usize> {
        self.surfaces.iter().position(|s| s.name == name)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ctx = || format!("zone '{}'", self.name);
        for (what, v) in [
            ("length", self.length),
            ("width", self.width),
            ("height", self.height),
            ("heat capacity multiplier", self.heat_capacity_multiplier),
        ] {
            if !(v.is_finite() && v > 0.0) {
                return Err(ConfigError::invalid(ctx(), format!("{what} must be > 0 (got {v})")));
            }
        }
        for (i, s) in self.surfaces.iter().enumerate() {
            s.validate()?;
            if self.surfaces[..i].iter().any(|o| o.name == s.name) {
                return Err(ConfigError::DuplicateName {
                    kind: "surface",
                    name: s.name.clone(),
                });
            }
        }
        for w in &self.windows {
            w.validate()?;
            if w.parent >= self.surfaces.len()
                || w.solar_distribution.iter().any(|&(i, _)| i >= self.surfaces.len())
            {
                return Err(ConfigError::invalid(
                    format!("window '{}'", w.name),
                    "surface index out of range",
                ));
            }
        }
        Ok(())
    }

    /// Removes window areas from their parent surfaces.
    ///
    /// Each parent must keep a strictly positive opaque area.
    pub fn subtract_window_areas(&mut self) -> Result<(), ConfigError> {
        for w in &self.windows {
            let parent = &mut self.surfaces[w.parent];
            if w.area >= parent.area {
                return Err(ConfigError::invalid(
                    format!("window '{}'", w.name),
                    format!(
                        "area {} m² leaves no opaque area on '{}' ({} m²)",
                        w.area, parent.name, parent.area
                    ),
                ));
            }
            parent.area -= w.area;
        }
        Ok(())
    }

    /// Initial committed state: uniform air and fabric temperature.
    pub fn initial_state(&self, cache: &mut MeshCache, dt: f64, temperature_c: f64) -> ZoneState {
        let walls = self
            .surfaces
            .iter()
            .map(|s| FdWall::new(cache.layout(&s.construction, dt), temperature_c))
            .collect();
        let faces = vec![
            FaceTemperatures {
                interior_c: temperature_c,
                exterior_c: temperature_c,
            };
            self.surfaces.len()
        ];
        ZoneState {
            air_temp_c: temperature_c,
            walls,
            faces,
            last_hvac_power_w: 0.0,
            elapsed_s: 0.0,
        }
    }
}

/// Face temperatures of one surface at the last commit [°C].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceTemperatures {
    pub interior_c: f64,
    pub exterior_c: f64,
}

/// Committed state of a zone between steps.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneState {
    /// Zone air temperature in °C.
    pub air_temp_c: f64,
    /// Conduction state per surface, aligned with [`Zone::surfaces`].
    pub walls: Vec<FdWall>,
    /// Face temperatures per surface, used to classify convection regimes.
    pub faces: Vec<FaceTemperatures>,
    /// HVAC power committed in the previous step [W], + heating.
    pub last_hvac_power_w: f64,
    /// Simulated time since the start, in seconds.
    pub elapsed_s: f64,
}

impl ZoneState {
    /// All node temperatures of all surfaces.
    pub fn node_temperatures(&self) -> impl Iterator<Item = f64> + '_ {
        self.walls.iter().flat_map(|w| w.temperatures().iter().copied())
    }
}

/// The six surfaces of an `length` x `width` x `height` box.
///
/// Surfaces named in `exterior` face outdoor air; the rest are adiabatic.
/// North/south walls span the width, east/west walls span the length.
pub fn box_surfaces(
    length: f64,
    width: f64,
    height: f64,
    construction: &Arc<Construction>,
    exterior: &[&str],
) -> Vec<Surface> {
    let specs = [
        ("north_wall", width * height, 2.0 * (width + height), 90.0, 0.0, SurfaceType::Wall, 2),
        ("east_wall", length * height, 2.0 * (length + height), 90.0, 90.0, SurfaceType::Wall, 2),
        ("south_wall", width * height, 2.0 * (width + height), 90.0, 180.0, SurfaceType::Wall, 2),
        ("west_wall", length * height, 2.0 * (length + height), 90.0, 270.0, SurfaceType::Wall, 2),
        ("roof", length * width, 2.0 * (length + width), 0.0, 0.0, SurfaceType::Roof, 3),
        ("floor", length * width, 2.0 * (length + width), 180.0, 0.0, SurfaceType::Floor, 3),
    ];
    specs
        .into_iter()
        .map(|(name, area, perimeter, tilt, azimuth, surface_type, roughness)| Surface {
            name: name.to_string(),
            area,
            perimeter,
            tilt_deg: tilt,
            azimuth_deg: azimuth,
            surface_type,
            roughness_index: roughness,
            construction: Arc::clone(construction),
            boundary: if exterior.contains(&name) {
                SurfaceBoundary::Exterior
            } else {
                SurfaceBoundary::Adiabatic
            },
            solar_absorptance: 0.6,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::energy::construction::tests::sandwich_wall;

    fn zone() -> Zone {
        let c = Arc::new(sandwich_wall());
        Zone {
            name: "z".into(),
            length: 10.0,
            width: 8.0,
            height: 2.8,
            heat_capacity_multiplier: 1.0,
            surfaces: box_surfaces(10.0, 8.0, 2.8, &c, &["south_wall"]),
            windows: vec![],
        }
    }

    #[test]
    fn test_air_capacity() {
        let z = zone();
        let expected = 10.0 * 8.0 * 2.8 * AIR_DENSITY * AIR_SPECIFIC_HEAT;
        assert!((z.air_heat_capacity() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_box_surfaces() {
        let z = zone();
        assert_eq!(z.surfaces.len(), 6);
        let south = &z.surfaces[z.surface_index("south_wall").unwrap()];
        assert_eq!(south.boundary, SurfaceBoundary::Exterior);
        assert!((south.area - 8.0 * 2.8).abs() < 1e-12);
        let roof = &z.surfaces[z.surface_index("roof").unwrap()];
        assert_eq!(roof.boundary, SurfaceBoundary::Adiabatic);
        assert!((roof.cos_tilt() - 1.0).abs() < 1e-12);
        assert!(z.validate().is_ok());
    }

    #[test]
    fn test_window_area_subtraction() {
        let mut z = zone();
        let south = z.surface_index("south_wall").unwrap();
        z.windows.push(Window {
            name: "w".into(),
            parent: south,
            area: 4.0,
            u_value: 1.4,
            shgc: 0.6,
            solar_distribution: vec![],
        });
        z.subtract_window_areas().unwrap();
        assert!((z.surfaces[south].area - (8.0 * 2.8 - 4.0)).abs() < 1e-12);

        z.windows[0].area = 100.0;
        assert!(z.subtract_window_areas().is_err());
    }

    #[test]
    fn test_invalid_surface_rejected() {
        let mut z = zone();
        z.surfaces[0].tilt_deg = 200.0;
        assert!(z.validate().is_err());

        let mut z = zone();
        z.surfaces[1].name = z.surfaces[0].name.clone();
        assert!(matches!(z.validate(), Err(ConfigError::DuplicateName { .. })));
    }

    #[test]
    fn test_initial_state() {
        let z = zone();
        let mut cache = MeshCache::new(0.5);
        let s = z.initial_state(&mut cache, 60.0, 18.0);
        assert_eq!(s.walls.len(), 6);
        assert_eq!(s.faces.len(), 6);
        assert!(s.node_temperatures().all(|t| t == 18.0));
        // All six surfaces share one construction, hence one cached layout.
        assert_eq!(cache.len(), 1);
    }
}
