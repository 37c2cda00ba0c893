use crate::sim::materials::{Layer, MaterialLibrary};

use super::error::ConfigError;

/// An opaque construction defined by material layers (outside to inside).
///
/// Layer order is fixed once built; the conduction mesh and the boundary
/// assignment both depend on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Construction {
    name: String,
    layers: Vec<Layer>,
}

impl Construction {
    /// Builds a construction from already-validated layers.
    pub fn new(name: &str, layers: Vec<Layer>) -> Result<Self, ConfigError> {
        if layers.is_empty() {
            return Err(ConfigError::EmptyConstruction(name.to_string()));
        }
        for layer in &layers {
            layer.validate()?;
        }
        Ok(Self {
            name: name.to_string(),
            layers,
        })
    }

    /// Builds a construction from layer names looked up in `library`.
    pub fn from_library(
        name: &str,
        layer_names: &[String],
        library: &MaterialLibrary,
    ) -> Result<Self, ConfigError> {
        let layers = library.resolve(name, layer_names)?;
        Self::new(name, layers)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Total thickness in m.
    pub fn thickness(&self) -> f64 {
        self.layers.iter().map(|l| l.thickness).sum()
    }

    /// Conductive resistance of the layers only, in m^2*K/W.
    pub fn resistance(&self) -> f64 {
        self.layers.iter().map(|l| l.resistance()).sum()
    }

    /// Air-to-air U-value in W/(m^2*K) for the given film coefficients.
    pub fn u_value(&self, h_in: f64, h_out: f64) -> f64 {
        1.0 / (1.0 / h_out + self.resistance() + 1.0 / h_in)
    }

    /// Total thermal capacity per unit area in J/(m^2*K).
    pub fn thermal_capacity(&self) -> f64 {
        self.layers.iter().map(|l| l.capacity_per_area()).sum()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Concrete / insulation / concrete sandwich used across the test suite.
    pub(crate) fn sandwich_wall() -> Construction {
        Construction::new(
            "sandwich",
            vec![
                Layer::new("concrete", 0.10, 1.4, 2300.0, 880.0),
                Layer::new("insulation", 0.08, 0.04, 30.0, 1030.0),
                Layer::new("concrete", 0.10, 1.4, 2300.0, 880.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_resistance_and_u_value() {
        let c = sandwich_wall();
        let r = 0.10 / 1.4 + 0.08 / 0.04 + 0.10 / 1.4;
        assert!((c.resistance() - r).abs() < 1e-12);
        let u = c.u_value(7.7, 25.0);
        let expected = 1.0 / (1.0 / 25.0 + r + 1.0 / 7.7);
        assert!((u - expected).abs() < 1e-12);
        assert!(u < 0.5, "insulated sandwich should have U < 0.5, got {u}");
    }

    #[test]
    fn test_thermal_capacity() {
        let c = sandwich_wall();
        let cap = 2.0 * 2300.0 * 880.0 * 0.10 + 30.0 * 1030.0 * 0.08;
        assert!((c.thermal_capacity() - cap).abs() < 1e-6);
        assert!((c.thickness() - 0.28).abs() < 1e-12);
    }

    #[test]
    fn test_empty_construction_rejected() {
        assert!(matches!(
            Construction::new("none", vec![]),
            Err(ConfigError::EmptyConstruction(_))
        ));
    }

    #[test]
    fn test_invalid_layer_rejected() {
        let bad = Layer::new("air", 0.05, -1.0, 1.2, 1006.0);
        assert!(Construction::new("bad", vec![bad]).is_err());
    }
}
