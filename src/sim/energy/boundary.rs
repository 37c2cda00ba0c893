use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Exterior and operational conditions for one timestep.
///
/// Everything here is held fixed for the whole of the step's inner
/// iteration, including the discrete window-open state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryConditions {
    pub exterior_air_temp_c: f64,
    pub wind_speed_ms: f64,
    /// Direction the wind blows from [deg], north 0, east 90.
    pub wind_direction_deg: f64,
    /// Incident shortwave on the exterior face of each named surface [W/m²].
    /// Missing surfaces receive none.
    pub per_surface_solar_irradiance_w_m2: HashMap<String, f64>,
    pub internal_gains_w: f64,
    /// 0 (closed) to 1 (fully open).
    pub window_open_fraction: f64,
    /// `None` switches the HVAC off for the step.
    pub hvac_setpoint_c: Option<f64>,
}

impl Default for BoundaryConditions {
    fn default() -> Self {
        Self {
            exterior_air_temp_c: 0.0,
            wind_speed_ms: 0.0,
            wind_direction_deg: 0.0,
            per_surface_solar_irradiance_w_m2: HashMap::new(),
            internal_gains_w: 0.0,
            window_open_fraction: 0.0,
            hvac_setpoint_c: None,
        }
    }
}

impl BoundaryConditions {
    /// Still outdoor air at `t_c`, nothing else.
    pub fn still_air(t_c: f64) -> Self {
        Self {
            exterior_air_temp_c: t_c,
            ..Self::default()
        }
    }

    pub fn irradiance_on(&self, surface: &str) -> f64 {
        self.per_surface_solar_irradiance_w_m2
            .get(surface)
            .copied()
            .unwrap_or(0.0)
            .max(0.0)
    }
}
