use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::sim::energy::error::ConfigError;

/// A single homogeneous layer in a construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    /// Thickness in meters.
    pub thickness: f64,
    /// Thermal conductivity in W/(m*K).
    pub conductivity: f64,
    /// Density in kg/m^3.
    pub density: f64,
    /// Specific heat capacity in J/(kg*K).
    pub specific_heat: f64,
}

impl Layer {
    pub fn new(
        name: &str,
        thickness: f64,
        conductivity: f64,
        density: f64,
        specific_heat: f64,
    ) -> Self {
        Self {
            name: name.to_string(),
            thickness,
            conductivity,
            density,
            specific_heat,
        }
    }

    /// Thermal resistance of this layer in m^2*K/W.
    pub fn resistance(&self) -> f64 {
        self.thickness / self.conductivity
    }

    /// Thermal diffusivity k / (rho * c_p) in m^2/s.
    pub fn diffusivity(&self) -> f64 {
        self.conductivity / (self.density * self.specific_heat)
    }

    /// Heat capacity per unit area in J/(m^2*K).
    pub fn capacity_per_area(&self) -> f64 {
        self.density * self.specific_heat * self.thickness
    }

    /// Checks that every physical property is finite and strictly positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let props = [
            ("thickness", self.thickness),
            ("conductivity", self.conductivity),
            ("density", self.density),
            ("specific_heat", self.specific_heat),
        ];
        for (property, value) in props {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositiveProperty {
                    material: self.name.clone(),
                    property,
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Library of named layer materials.
///
/// Constructions refer to layers by name; the library is the single source
/// of truth for their properties.
#[derive(Debug, Clone, Default)]
pub struct MaterialLibrary {
    layers: HashMap<String, Layer>,
}

impl MaterialLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a validated layer. Duplicate names are rejected.
    pub fn insert(&mut self, layer: Layer) -> Result<(), ConfigError> {
        layer.validate()?;
        if self.layers.contains_key(&layer.name) {
            return Err(ConfigError::DuplicateName {
                kind: "material",
                name: layer.name,
            });
        }
        self.layers.insert(layer.name.clone(), layer);
        Ok(())
    }

    /// Builds a library from a list of layers, validating each one.
    pub fn from_layers(layers: impl IntoIterator<Item = Layer>) -> Result<Self, ConfigError> {
        let mut lib = Self::new();
        for layer in layers {
            lib.insert(layer)?;
        }
        Ok(lib)
    }

    pub fn get(&self, name: &str) -> Option<&Layer> {
        self.layers.get(name)
    }

    /// Resolves an ordered list of layer names (outside to inside).
    pub fn resolve(&self, construction: &str, names: &[String]) -> Result<Vec<Layer>, ConfigError> {
        names
            .iter()
            .map(|n| {
                self.get(n).cloned().ok_or_else(|| ConfigError::UnknownMaterial {
                    construction: construction.to_string(),
                    material: n.clone(),
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}
