//! Error taxonomy for configuration and stepping.
//!
//! Configuration errors are detected before any stepping. Step errors are
//! fatal for the run. Non-convergence is not an error; see
//! [`StepWarning`](super::result::StepWarning).

use thiserror::Error;

/// Invalid configuration detected at load time.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("material '{material}': {property} must be finite and > 0 (got {value})")]
    NonPositiveProperty {
        material: String,
        property: &'static str,
        value: f64,
    },

    #[error("{kind} '{name}' is defined more than once")]
    DuplicateName { kind: &'static str, name: String },

    #[error("construction '{construction}' references unknown material '{material}'")]
    UnknownMaterial {
        construction: String,
        material: String,
    },

    #[error("construction '{0}' has no layers")]
    EmptyConstruction(String),

    #[error("surface '{surface}' references unknown construction '{construction}'")]
    UnknownConstruction {
        surface: String,
        construction: String,
    },

    #[error("window '{window}' references unknown surface '{surface}'")]
    UnknownSurface { window: String, surface: String },

    #[error("unknown convection correlation '{name}' for {role} regime {regime}")]
    UnknownCorrelation {
        role: &'static str,
        regime: String,
        name: String,
    },

    #[error("correlation '{name}' cannot be used for {role} regime {regime}")]
    CorrelationRoleMismatch {
        role: &'static str,
        regime: String,
        name: String,
    },

    #[error("no {role} convection correlation assigned for regime {regime}")]
    MissingCorrelation { role: &'static str, regime: String },

    #[error("window '{window}': solar distribution {detail}")]
    InvalidSolarDistribution { window: String, detail: String },

    #[error("{context}: {detail}")]
    InvalidValue { context: String, detail: String },
}

impl ConfigError {
    pub(crate) fn invalid(context: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::InvalidValue {
            context: context.into(),
            detail: detail.into(),
        }
    }
}

/// Fatal failure while advancing a zone by one step.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StepError {
    #[error("timestep must be finite and > 0 (got {0} s)")]
    InvalidTimestep(f64),

    #[error("{location} temperature {value_c:.3} °C outside plausible range [{min_c}, {max_c}] °C")]
    PhysicalBounds {
        location: String,
        value_c: f64,
        min_c: f64,
        max_c: f64,
    },

    #[error("numerical singularity in {context}")]
    NumericalSingularity { context: String },

    #[error("surface '{surface}': convection coefficient {h} W/(m²·K) outside sane range")]
    ConvectionOutOfRange { surface: String, h: f64 },

    #[error("zone state does not match the zone definition: {0}")]
    StateMismatch(String),
}

impl StepError {
    pub(crate) fn singular(context: impl Into<String>) -> Self {
        Self::NumericalSingularity {
            context: context.into(),
        }
    }
}
