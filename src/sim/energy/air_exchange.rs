use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use super::zone::{AIR_DENSITY, AIR_SPECIFIC_HEAT};

/// Conditions an air-exchange model may depend on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AirExchangeInput {
    pub zone_air_temp_c: f64,
    pub exterior_air_temp_c: f64,
    pub wind_speed_ms: f64,
    /// 0 (closed) to 1 (fully open), sampled once per step.
    pub window_open_fraction: f64,
    /// Whether the HVAC was heating in the previous committed step.
    pub hvac_heating: bool,
}

/// Outdoor-air exchange expressed as a thermal conductance.
///
/// The loss to outdoor air is `G * (T_zone - T_out)`. Implementations are
/// pure functions of their input.
pub trait AirExchangeModel: Send + Sync {
    /// Conductance `m_dot * c_p` [W/K].
    fn conductance_w_per_k(&self, input: &AirExchangeInput) -> f64;
}

fn flow_to_conductance(flow_m3_s: f64) -> f64 {
    flow_m3_s * AIR_DENSITY * AIR_SPECIFIC_HEAT
}

/// No outdoor air exchange.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAirExchange;

impl AirExchangeModel for NoAirExchange {
    fn conductance_w_per_k(&self, _input: &AirExchangeInput) -> f64 {
        0.0
    }
}

/// Fixed air-change rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantAch {
    pub zone_volume_m3: f64,
    pub ach: f64,
}

impl AirExchangeModel for ConstantAch {
    fn conductance_w_per_k(&self, _input: &AirExchangeInput) -> f64 {
        flow_to_conductance(self.zone_volume_m3 * self.ach / 3600.0)
    }
}

/// AIM-2 infiltration parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Aim2Params {
    /// Flow coefficient c [m³/(s·Pa^n)].
    pub flow_coefficient: f64,
    /// Pressure exponent n.
    pub pressure_exponent: f64,
    /// Stack coefficient Cs [Pa/K].
    pub stack_coefficient: f64,
    /// Wind coefficient Cw [Pa·s²/m²].
    pub wind_coefficient: f64,
    /// Shelter factor s.
    pub shelter_factor: f64,
}

impl Default for Aim2Params {
    fn default() -> Self {
        Self {
            flow_coefficient: 0.0,
            pressure_exponent: 0.65,
            stack_coefficient: 0.0,
            wind_coefficient: 0.0,
            shelter_factor: 1.0,
        }
    }
}

/// AIM-2 infiltration combined with window ventilation.
///
/// ```text
/// dP    = sqrt((Cs*|dT|)^2 + (Cw*(s*V)^2)^2)
/// Q_inf = c * dP^n                      (0 while heating)
/// Q_ven = V_zone * ACH_open / 3600 * open_fraction
/// G     = sqrt(Q_inf^2 + Q_ven^2) * rho * c_p
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aim2AirExchange {
    pub params: Aim2Params,
    /// Air changes per hour with windows fully open.
    pub open_window_ach: f64,
    pub zone_volume_m3: f64,
}

impl Aim2AirExchange {
    pub fn new(params: Aim2Params, open_window_ach: f64, zone_volume_m3: f64) -> Result<Self, ConfigError> {
        let p = &params;
        for (what, v) in [
            ("flow coefficient", p.flow_coefficient),
            ("stack coefficient", p.stack_coefficient),
            ("wind coefficient", p.wind_coefficient),
            ("shelter factor", p.shelter_factor),
            ("open-window ACH", open_window_ach),
        ] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(ConfigError::invalid("air exchange", format!("{what} must be >= 0 (got {v})")));
            }
        }
        if !(p.pressure_exponent > 0.0 && p.pressure_exponent <= 1.0) {
            return Err(ConfigError::invalid(
                "air exchange",
                format!("pressure exponent must be in (0, 1] (got {})", p.pressure_exponent),
            ));
        }
        Ok(Self {
            params,
            open_window_ach,
            zone_volume_m3,
        })
    }

    /// Infiltration flow [m³/s].
    pub fn infiltration_m3_s(&self, input: &AirExchangeInput) -> f64 {
        if input.hvac_heating {
            return 0.0;
        }
        let p = &self.params;
        let dp_stack = p.stack_coefficient * (input.zone_air_temp_c - input.exterior_air_temp_c).abs();
        let dp_wind = p.wind_coefficient * (p.shelter_factor * input.wind_speed_ms).powi(2);
        let dp = dp_stack.hypot(dp_wind);
        p.flow_coefficient * dp.powf(p.pressure_exponent)
    }

    /// Window ventilation flow [m³/s].
    pub fn ventilation_m3_s(&self, input: &AirExchangeInput) -> f64 {
        if input.window_open_fraction <= 0.0 {
            return 0.0;
        }
        self.zone_volume_m3 * self.open_window_ach / 3600.0 * input.window_open_fraction.min(1.0)
    }
}

impl AirExchangeModel for Aim2AirExchange {
    fn conductance_w_per_k(&self, input: &AirExchangeInput) -> f64 {
        let flow = self.infiltration_m3_s(input).hypot(self.ventilation_m3_s(input));
        flow_to_conductance(flow)
    }
}
