use serde::Serialize;

/// Non-fatal condition raised while solving a step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepWarning {
    /// The inner iteration hit its limit; the last balance candidate was
    /// committed.
    Convergence { iterations: usize, residual_c: f64 },
}

/// Heat-balance record of one committed step.
///
/// Losses are positive outward, gains and HVAC positive into the air, so
/// for every step
///
/// ```text
/// (fabric + window + air_exchange - solar - internal - hvac) * dt = -C_air * dT_air
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HeatBalanceTerms {
    /// Net heat from the air into the opaque fabric [W].
    pub fabric_loss_w: f64,
    /// Heat leaving the opaque fabric through its exterior faces [W],
    /// net of absorbed exterior solar. Not part of the air balance.
    pub fabric_exterior_loss_w: f64,
    /// Conduction through windows [W].
    pub window_loss_w: f64,
    /// Infiltration and ventilation loss [W].
    pub air_exchange_loss_w: f64,
    /// Transmitted solar through windows [W].
    pub solar_gain_w: f64,
    pub internal_gain_w: f64,
    /// Signed HVAC power: + heating, - cooling [W].
    pub hvac_power_w: f64,
    pub iterations_used: usize,
    /// Final |T_new - T_trial| of the inner iteration [K].
    pub residual_c: f64,
    pub warnings: Vec<StepWarning>,
}

impl HeatBalanceTerms {
    /// Net heat into the air [W]; equals `C_air * dT_air / dt`.
    pub fn net_gain_w(&self) -> f64 {
        self.solar_gain_w + self.internal_gain_w + self.hvac_power_w
            - self.fabric_loss_w
            - self.window_loss_w
            - self.air_exchange_loss_w
    }

    pub fn converged(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_net_gain_sign_convention() {
        let t = HeatBalanceTerms {
            fabric_loss_w: 300.0,
            window_loss_w: 50.0,
            air_exchange_loss_w: 20.0,
            solar_gain_w: 100.0,
            internal_gain_w: 200.0,
            hvac_power_w: 120.0,
            ..Default::default()
        };
        assert!((t.net_gain_w() - 50.0).abs() < 1e-12);
        assert!(t.converged());
    }

    #[test]
    fn test_serializes_warnings() {
        let t = HeatBalanceTerms {
            warnings: vec![StepWarning::Convergence {
                iterations: 10,
                residual_c: 0.2,
            }],
            ..Default::default()
        };
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["warnings"][0]["kind"], "convergence");
        assert_eq!(json["warnings"][0]["iterations"], 10);
    }
}
