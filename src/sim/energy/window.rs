use super::error::ConfigError;

/// Simple glazing model: steady U-value conduction plus SHGC solar gain.
///
/// A window belongs to a parent wall; its area is removed from the wall's
/// opaque area when the zone is built.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub name: String,
    /// Index of the parent surface in the zone's surface list.
    pub parent: usize,
    /// Glazed area in m^2.
    pub area: f64,
    /// U-value in W/(m^2*K).
    pub u_value: f64,
    /// Solar heat gain coefficient (0, 1].
    pub shgc: f64,
    /// Fraction of transmitted solar absorbed by each interior surface
    /// (surface index, fraction). The remainder heats the air directly.
    pub solar_distribution: Vec<(usize, f64)>,
}

impl Window {
    /// Validates scalar properties and distribution fractions.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ctx = || format!("window '{}'", self.name);
        if !(self.area.is_finite() && self.area > 0.0) {
            return Err(ConfigError::invalid(ctx(), format!("area must be > 0 (got {})", self.area)));
        }
        if !(self.u_value.is_finite() && self.u_value > 0.0) {
            return Err(ConfigError::invalid(
                ctx(),
                format!("U-value must be > 0 (got {})", self.u_value),
            ));
        }
        if !(self.shgc > 0.0 && self.shgc <= 1.0) {
            return Err(ConfigError::invalid(
                ctx(),
                format!("SHGC must be in (0, 1] (got {})", self.shgc),
            ));
        }
        let mut sum = 0.0;
        for &(_, f) in &self.solar_distribution {
            if !(f.is_finite() && f >= 0.0) {
                return Err(ConfigError::InvalidSolarDistribution {
                    window: self.name.clone(),
                    detail: format!("fraction {f} is negative or not finite"),
                });
            }
            sum += f;
        }
        if sum > 1.0 + 1e-9 {
            return Err(ConfigError::InvalidSolarDistribution {
                window: self.name.clone(),
                detail: format!("fractions sum to {sum:.4} (> 1)"),
            });
        }
        Ok(())
    }

    /// Conductance U*A in W/K.
    pub fn ua(&self) -> f64 {
        self.u_value * self.area
    }

    /// Conductive heat flow in W, positive for a loss from the zone.
    pub fn conduction_w(&self, t_inside: f64, t_outside: f64) -> f64 {
        self.ua() * (t_inside - t_outside)
    }

    /// Transmitted solar gain in W for irradiance on the parent wall [W/m^2].
    pub fn transmitted_solar_w(&self, irradiance_w_m2: f64) -> f64 {
        self.shgc * self.area * irradiance_w_m2.max(0.0)
    }

    /// Fraction of transmitted solar that heats the air directly.
    pub fn air_fraction(&self) -> f64 {
        let absorbed: f64 = self.solar_distribution.iter().map(|(_, f)| f).sum();
        (1.0 - absorbed).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> Window {
        Window {
            name: "w".into(),
            parent: 0,
            area: 4.0,
            u_value: 1.2,
            shgc: 0.6,
            solar_distribution: vec![(1, 0.5), (2, 0.2)],
        }
    }

    #[test]
    fn test_heat_flows() {
        let w = window();
        assert!((w.conduction_w(20.0, 0.0) - 96.0).abs() < 1e-12);
        assert!((w.transmitted_solar_w(500.0) - 1200.0).abs() < 1e-12);
        assert_eq!(w.transmitted_solar_w(-10.0), 0.0);
        assert!((w.air_fraction() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_validation() {
        assert!(window().validate().is_ok());

        let mut w = window();
        w.shgc = 1.5;
        assert!(w.validate().is_err());

        let mut w = window();
        w.solar_distribution = vec![(1, -0.1)];
        assert!(matches!(
            w.validate(),
            Err(ConfigError::InvalidSolarDistribution { .. })
        ));

        let mut w = window();
        w.solar_distribution = vec![(1, 0.7), (2, 0.6)];
        assert!(matches!(
            w.validate(),
            Err(ConfigError::InvalidSolarDistribution { .. })
        ));
    }
}
