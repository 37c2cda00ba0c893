//! Surface convection coefficients selected by flow regime.
//!
//! Each surface face is classified into a regime (buoyancy-stable or
//! unstable, windward or leeward) and the regime is mapped, through
//! configuration, to one correlation from a closed registry:
//!
//! - **Natural**: Walton (TARP) and ASHRAE vertical-wall correlations, driven
//!   by the surface-to-air temperature difference and tilt.
//! - **Forced**: wind-driven exterior correlations (Sparrow, Blocken, Emmel,
//!   Mitchell, DOE-2 rough surface).
//! - **Combined**: exterior correlations that already include both parts
//!   (MoWITT, McAdams); these skip the natural mapping.
//!
//! All names are resolved when the selector is built, so an unknown or
//! misplaced correlation is a [`ConfigError`] before any stepping.
//!
//! Longwave radiation is not modelled separately; it is folded into these
//! film coefficients.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{ConfigError, StepError};
use super::zone::Surface;

/// Lower floor for any film coefficient [W/(m²·K)].
///
/// Natural correlations vanish at zero temperature difference; the floor
/// keeps nearly-adiabatic faces coupled and the conduction system regular.
pub const H_MIN: f64 = 0.1;

/// Upper sanity bound [W/(m²·K)]. Anything above indicates misconfiguration.
pub const H_MAX: f64 = 100.0;

/// |cos(tilt)| below this is treated as a vertical surface (±45° from vertical).
const VERTICAL_COS: f64 = 0.707;

/// Surfaces within this many degrees of 0° or 180° tilt are horizontal.
const HORIZONTAL_TOLERANCE_DEG: f64 = 1.0;

/// Surface roughness multipliers R_f for roughness index 1..=6 (Walton 1981).
const ROUGHNESS_MULTIPLIERS: [f64; 6] = [2.17, 1.67, 1.52, 1.13, 1.11, 1.00];

// ─── Regimes ────────────────────────────────────────────────────────────

/// Flow regime at an interior (zone-side) face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InteriorRegime {
    VerticalWall,
    StableHorizontal,
    UnstableHorizontal,
    StableTilted,
    UnstableTilted,
}

impl InteriorRegime {
    pub const ALL: [Self; 5] = [
        Self::VerticalWall,
        Self::StableHorizontal,
        Self::UnstableHorizontal,
        Self::StableTilted,
        Self::UnstableTilted,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::VerticalWall => "VerticalWall",
            Self::StableHorizontal => "StableHorizontal",
            Self::UnstableHorizontal => "UnstableHorizontal",
            Self::StableTilted => "StableTilted",
            Self::UnstableTilted => "UnstableTilted",
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    /// Classify an interior face.
    ///
    /// `delta_t` is `T_surface - T_air`; `cos_tilt` is the cosine of the
    /// surface's outward-normal tilt. The zone-side face of a floor looks up,
    /// so a warm floor (`delta_t > 0`, `cos < 0`) is unstable.
    pub fn classify(delta_t: f64, cos_tilt: f64) -> Self {
        if cos_tilt.abs() < VERTICAL_COS {
            return Self::VerticalWall;
        }
        let unstable = delta_t * cos_tilt < 0.0;
        let horizontal = cos_tilt.abs() >= HORIZONTAL_TOLERANCE_DEG.to_radians().cos();
        match (horizontal, unstable) {
            (true, true) => Self::UnstableHorizontal,
            (true, false) => Self::StableHorizontal,
            (false, true) => Self::UnstableTilted,
            (false, false) => Self::StableTilted,
        }
    }
}

/// Flow regime at an exterior (outdoor) face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExteriorRegime {
    RoofStable,
    RoofUnstable,
    VerticalWallWindward,
    VerticalWallLeeward,
}

impl ExteriorRegime {
    pub const ALL: [Self; 4] = [
        Self::RoofStable,
        Self::RoofUnstable,
        Self::VerticalWallWindward,
        Self::VerticalWallLeeward,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::RoofStable => "RoofStable",
            Self::RoofUnstable => "RoofUnstable",
            Self::VerticalWallWindward => "VerticalWallWindward",
            Self::VerticalWallLeeward => "VerticalWallLeeward",
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    /// Classify an exterior face.
    ///
    /// `delta_t` is `T_surface - T_outdoor`. Near-horizontal faces are roofs
    /// (unstable when buoyancy lifts air off the face); everything else is a
    /// wall, windward when the wind incidence is at most 90°.
    pub fn classify(delta_t: f64, cos_tilt: f64, incidence_deg: f64) -> Self {
        if cos_tilt.abs() >= VERTICAL_COS {
            if delta_t * cos_tilt > 0.0 {
                Self::RoofUnstable
            } else {
                Self::RoofStable
            }
        } else if incidence_deg <= 90.0 {
            Self::VerticalWallWindward
        } else {
            Self::VerticalWallLeeward
        }
    }
}

/// Angle between the wind direction and the surface azimuth, in [0, 180].
pub fn wind_incidence_deg(wind_direction_deg: f64, azimuth_deg: f64) -> f64 {
    let diff = (wind_direction_deg - azimuth_deg).rem_euclid(360.0);
    diff.min(360.0 - diff)
}

// ─── Correlations ───────────────────────────────────────────────────────

/// What a correlation computes, which decides where it may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationKind {
    Natural,
    Forced,
    Combined,
    Fixed,
}

/// The closed set of convection correlations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correlation {
    AshraeVerticalWall,
    WaltonUnstableHorizontalOrTilt,
    WaltonStableHorizontalOrTilt,
    SparrowWindward,
    SparrowLeeward,
    BlockenWindward,
    EmmelVertical,
    EmmelRoof,
    Mitchell,
    Doe2Rough,
    MoWittWindward,
    MoWittLeeward,
    McAdams,
    Fixed(f64),
}

impl Correlation {
    /// Every named (non-fixed) correlation.
    pub const NAMED: [Self; 13] = [
        Self::AshraeVerticalWall,
        Self::WaltonUnstableHorizontalOrTilt,
        Self::WaltonStableHorizontalOrTilt,
        Self::SparrowWindward,
        Self::SparrowLeeward,
        Self::BlockenWindward,
        Self::EmmelVertical,
        Self::EmmelRoof,
        Self::Mitchell,
        Self::Doe2Rough,
        Self::MoWittWindward,
        Self::MoWittLeeward,
        Self::McAdams,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::AshraeVerticalWall => "ASHRAEVerticalWall",
            Self::WaltonUnstableHorizontalOrTilt => "WaltonUnstableHorizontalOrTilt",
            Self::WaltonStableHorizontalOrTilt => "WaltonStableHorizontalOrTilt",
            Self::SparrowWindward => "SparrowWindward",
            Self::SparrowLeeward => "SparrowLeeward",
            Self::BlockenWindward => "BlockenWindward",
            Self::EmmelVertical => "EmmelVertical",
            Self::EmmelRoof => "EmmelRoof",
            Self::Mitchell => "Mitchell",
            Self::Doe2Rough => "Doe2Rough",
            Self::MoWittWindward => "MoWITTWindward",
            Self::MoWittLeeward => "MoWITTLeeward",
            Self::McAdams => "McAdams",
            Self::Fixed(_) => "fixed",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMED.into_iter().find(|c| c.name() == name)
    }

    pub fn kind(&self) -> CorrelationKind {
        match self {
            Self::AshraeVerticalWall
            | Self::WaltonUnstableHorizontalOrTilt
            | Self::WaltonStableHorizontalOrTilt => CorrelationKind::Natural,
            Self::SparrowWindward
            | Self::SparrowLeeward
            | Self::BlockenWindward
            | Self::EmmelVertical
            | Self::EmmelRoof
            | Self::Mitchell
            | Self::Doe2Rough => CorrelationKind::Forced,
            Self::MoWittWindward | Self::MoWittLeeward | Self::McAdams => {
                CorrelationKind::Combined
            }
            Self::Fixed(_) => CorrelationKind::Fixed,
        }
    }

    /// Raw coefficient [W/(m²·K)], before the floor and sanity bound.
    pub fn evaluate(&self, x: &ConvectionInput) -> f64 {
        let abs_dt = x.delta_t.abs();
        let dt_third = abs_dt.cbrt();
        let abs_cos = x.tilt_deg.to_radians().cos().abs();
        let v = x.wind_speed.max(0.0);
        let theta = x.incidence_deg;
        match *self {
            Self::AshraeVerticalWall => 1.31 * dt_third,
            Self::WaltonUnstableHorizontalOrTilt => 9.482 * dt_third / (7.238 - abs_cos),
            Self::WaltonStableHorizontalOrTilt => 1.810 * dt_third / (1.382 + abs_cos),
            Self::SparrowWindward => sparrow_windward(x.perimeter, x.area, x.roughness_index, v),
            Self::SparrowLeeward => 0.5 * sparrow_windward(x.perimeter, x.area, x.roughness_index, v),
            Self::BlockenWindward => {
                if theta <= 11.25 {
                    4.6 * v.powf(0.89)
                } else if theta <= 33.75 {
                    5.0 * v.powf(0.80)
                } else if theta <= 56.25 {
                    4.6 * v.powf(0.84)
                } else {
                    4.5 * v.powf(0.81)
                }
            }
            Self::EmmelVertical => {
                if theta <= 22.5 {
                    3.34 * v.powf(0.84)
                } else if theta <= 67.5 {
                    4.78 * v.powf(0.71)
                } else if theta <= 112.5 {
                    4.05 * v.powf(0.77)
                } else if theta <= 157.5 {
                    3.54 * v.powf(0.16)
                } else {
                    3.34 * v.powf(0.84)
                }
            }
            Self::EmmelRoof => {
                if theta <= 22.5 {
                    5.11 * v.powf(0.78)
                } else if theta <= 67.5 {
                    4.60 * v.powf(0.79)
                } else {
                    3.67 * v.powf(0.85)
                }
            }
            Self::Mitchell => {
                let l_char = x.zone_volume.cbrt();
                8.6 * v.powf(0.6) / l_char.powf(0.4)
            }
            Self::Doe2Rough => 3.26 + 3.89 * v,
            Self::MoWittWindward => (0.84 * dt_third).hypot(3.26 * v.powf(0.89)),
            Self::MoWittLeeward => (0.84 * dt_third).hypot(3.55 * v.powf(0.617)),
            Self::McAdams => 5.7 + 3.8 * v,
            Self::Fixed(h) => h,
        }
    }
}

impl fmt::Display for Correlation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(h) => write!(f, "fixed({h})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Sparrow windward forced convection: `2.537 * R_f * sqrt(P * V / A)`.
fn sparrow_windward(perimeter: f64, area: f64, roughness_index: u8, v: f64) -> f64 {
    let rf = ROUGHNESS_MULTIPLIERS
        .get(usize::from(roughness_index).wrapping_sub(1))
        .copied()
        .unwrap_or(1.0);
    let pv_over_a = perimeter * v / area;
    if pv_over_a > 0.0 {
        2.537 * rf * pv_over_a.sqrt()
    } else {
        0.0
    }
}

/// Physical quantities a correlation may depend on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvectionInput {
    /// Surface minus fluid temperature [K].
    pub delta_t: f64,
    /// Tilt of the outward normal [deg].
    pub tilt_deg: f64,
    /// Wind speed [m/s]; zero at interior faces.
    pub wind_speed: f64,
    /// Wind incidence on the face [deg], 0..=180.
    pub incidence_deg: f64,
    pub perimeter: f64,
    pub area: f64,
    pub roughness_index: u8,
    pub zone_volume: f64,
}

// ─── Configuration ──────────────────────────────────────────────────────

/// A correlation reference as written in configuration: a registry name or
/// `{"fixed": h}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrelationSpec {
    Named(String),
    Fixed { fixed: f64 },
}

impl From<&str> for CorrelationSpec {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

/// How exterior forced and natural parts are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineRule {
    #[default]
    Sum,
    RootSumSquare,
}

impl CombineRule {
    fn apply(self, forced: f64, natural: f64) -> f64 {
        match self {
            Self::Sum => forced + natural,
            Self::RootSumSquare => forced.hypot(natural),
        }
    }
}

/// Regime-name to correlation mapping for every face role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvectionConfig {
    pub interior: BTreeMap<String, CorrelationSpec>,
    pub exterior_forced: BTreeMap<String, CorrelationSpec>,
    pub exterior_natural: BTreeMap<String, CorrelationSpec>,
    pub combine: CombineRule,
}

impl Default for ConvectionConfig {
    fn default() -> Self {
        let map = |pairs: &[(&str, &str)]| {
            pairs
                .iter()
                .map(|&(regime, name)| (regime.to_string(), CorrelationSpec::from(name)))
                .collect()
        };
        Self {
            interior: map(&[
                ("VerticalWall", "ASHRAEVerticalWall"),
                ("StableHorizontal", "WaltonStableHorizontalOrTilt"),
                ("UnstableHorizontal", "WaltonUnstableHorizontalOrTilt"),
                ("StableTilted", "WaltonStableHorizontalOrTilt"),
                ("UnstableTilted", "WaltonUnstableHorizontalOrTilt"),
            ]),
            exterior_forced: map(&[
                ("RoofStable", "SparrowWindward"),
                ("RoofUnstable", "SparrowWindward"),
                ("VerticalWallWindward", "SparrowWindward"),
                ("VerticalWallLeeward", "SparrowLeeward"),
            ]),
            exterior_natural: map(&[
                ("RoofStable", "WaltonStableHorizontalOrTilt"),
                ("RoofUnstable", "WaltonUnstableHorizontalOrTilt"),
                ("VerticalWallWindward", "ASHRAEVerticalWall"),
                ("VerticalWallLeeward", "ASHRAEVerticalWall"),
            ]),
            combine: CombineRule::Sum,
        }
    }
}

impl ConvectionConfig {
    /// Same fixed coefficient at every face of the given role.
    pub fn fixed(h_interior: f64, h_exterior: f64) -> Self {
        let fill = |regimes: &[&'static str], h: f64| {
            regimes
                .iter()
                .map(|r| (r.to_string(), CorrelationSpec::Fixed { fixed: h }))
                .collect()
        };
        let interior: Vec<_> = InteriorRegime::ALL.iter().map(|r| r.name()).collect();
        let exterior: Vec<_> = ExteriorRegime::ALL.iter().map(|r| r.name()).collect();
        Self {
            interior: fill(&interior, h_interior),
            exterior_forced: fill(&exterior, h_exterior),
            exterior_natural: BTreeMap::new(),
            combine: CombineRule::Sum,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Role {
    Interior,
    ExteriorForced,
    ExteriorNatural,
}

impl Role {
    fn label(self) -> &'static str {
        match self {
            Self::Interior => "interior",
            Self::ExteriorForced => "exterior forced",
            Self::ExteriorNatural => "exterior natural",
        }
    }

    fn accepts(self, kind: CorrelationKind) -> bool {
        use CorrelationKind::*;
        match self {
            Self::Interior | Self::ExteriorNatural => matches!(kind, Natural | Fixed),
            Self::ExteriorForced => matches!(kind, Forced | Combined | Fixed),
        }
    }
}

fn resolve(
    role: Role,
    regime: &str,
    map: &BTreeMap<String, CorrelationSpec>,
) -> Result<Correlation, ConfigError> {
    let spec = map.get(regime).ok_or_else(|| ConfigError::MissingCorrelation {
        role: role.label(),
        regime: regime.to_string(),
    })?;
    let correlation = match spec {
        CorrelationSpec::Named(name) => {
            Correlation::from_name(name).ok_or_else(|| ConfigError::UnknownCorrelation {
                role: role.label(),
                regime: regime.to_string(),
                name: name.clone(),
            })?
        }
        CorrelationSpec::Fixed { fixed } => {
            if !(fixed.is_finite() && *fixed >= H_MIN && *fixed <= H_MAX) {
                return Err(ConfigError::invalid(
                    format!("{} convection for {regime}", role.label()),
                    format!("fixed coefficient must be in [{H_MIN}, {H_MAX}] (got {fixed})"),
                ));
            }
            Correlation::Fixed(*fixed)
        }
    };
    if !role.accepts(correlation.kind()) {
        return Err(ConfigError::CorrelationRoleMismatch {
            role: role.label(),
            regime: regime.to_string(),
            name: correlation.to_string(),
        });
    }
    Ok(correlation)
}

fn reject_unknown_regimes(
    role: Role,
    map: &BTreeMap<String, CorrelationSpec>,
    known: &[&str],
) -> Result<(), ConfigError> {
    match map.keys().find(|k| !known.contains(&k.as_str())) {
        Some(k) => Err(ConfigError::invalid(
            format!("{} convection", role.label()),
            format!("unknown regime '{k}'"),
        )),
        None => Ok(()),
    }
}

// ─── Selector ───────────────────────────────────────────────────────────

/// Which face of a surface a coefficient is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Face {
    Interior,
    Exterior,
}

/// Validated regime-to-correlation registry.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvectionSelector {
    interior: [Correlation; 5],
    exterior_forced: [Correlation; 4],
    /// `None` where the forced entry is combined or fixed.
    exterior_natural: [Option<Correlation>; 4],
    combine: CombineRule,
    zone_volume: f64,
}

impl ConvectionSelector {
    /// Resolve and validate every mapping. `zone_volume` feeds the Mitchell
    /// correlation.
    pub fn new(config: &ConvectionConfig, zone_volume: f64) -> Result<Self, ConfigError> {
        let interior_names: Vec<_> = InteriorRegime::ALL.iter().map(|r| r.name()).collect();
        let exterior_names: Vec<_> = ExteriorRegime::ALL.iter().map(|r| r.name()).collect();
        reject_unknown_regimes(Role::Interior, &config.interior, &interior_names)?;
        reject_unknown_regimes(Role::ExteriorForced, &config.exterior_forced, &exterior_names)?;
        reject_unknown_regimes(Role::ExteriorNatural, &config.exterior_natural, &exterior_names)?;

        let mut interior = [Correlation::Fixed(H_MIN); 5];
        for r in InteriorRegime::ALL {
            interior[r.index()] = resolve(Role::Interior, r.name(), &config.interior)?;
        }

        let mut exterior_forced = [Correlation::Fixed(H_MIN); 4];
        let mut exterior_natural = [None; 4];
        for r in ExteriorRegime::ALL {
            let forced = resolve(Role::ExteriorForced, r.name(), &config.exterior_forced)?;
            exterior_forced[r.index()] = forced;
            if forced.kind() == CorrelationKind::Forced {
                exterior_natural[r.index()] =
                    Some(resolve(Role::ExteriorNatural, r.name(), &config.exterior_natural)?);
            }
        }

        let uses_mitchell = exterior_forced.contains(&Correlation::Mitchell);
        if uses_mitchell && !(zone_volume.is_finite() && zone_volume > 0.0) {
            return Err(ConfigError::invalid(
                "Mitchell convection",
                format!("zone volume must be > 0 (got {zone_volume})"),
            ));
        }

        Ok(Self {
            interior,
            exterior_forced,
            exterior_natural,
            combine: config.combine,
            zone_volume,
        })
    }

    pub fn interior_correlation(&self, regime: InteriorRegime) -> Correlation {
        self.interior[regime.index()]
    }

    pub fn exterior_correlations(&self, regime: ExteriorRegime) -> (Correlation, Option<Correlation>) {
        (
            self.exterior_forced[regime.index()],
            self.exterior_natural[regime.index()],
        )
    }

    /// Film coefficient [W/(m²·K)] for one face of `surface`.
    ///
    /// `t_fluid` is zone air for the interior face and outdoor air for the
    /// exterior face. Wind is ignored at interior faces. The result is
    /// floored at [`H_MIN`]; a non-finite value or one above [`H_MAX`] is a
    /// fatal [`StepError::ConvectionOutOfRange`].
    pub fn select(
        &self,
        face: Face,
        surface: &Surface,
        t_surface: f64,
        t_fluid: f64,
        wind_speed: f64,
        wind_direction_deg: f64,
    ) -> Result<f64, StepError> {
        let delta_t = t_surface - t_fluid;
        let mut input = ConvectionInput {
            delta_t,
            tilt_deg: surface.tilt_deg,
            wind_speed: 0.0,
            incidence_deg: 0.0,
            perimeter: surface.perimeter,
            area: surface.area,
            roughness_index: surface.roughness_index,
            zone_volume: self.zone_volume,
        };
        let h = match face {
            Face::Interior => {
                let regime = InteriorRegime::classify(delta_t, surface.cos_tilt());
                self.interior_correlation(regime).evaluate(&input)
            }
            Face::Exterior => {
                input.wind_speed = wind_speed;
                input.incidence_deg = wind_incidence_deg(wind_direction_deg, surface.azimuth_deg);
                let regime =
                    ExteriorRegime::classify(delta_t, surface.cos_tilt(), input.incidence_deg);
                let (forced, natural) = self.exterior_correlations(regime);
                let hf = forced.evaluate(&input);
                match natural {
                    Some(n) => self.combine.apply(hf, n.evaluate(&input)),
                    None => hf,
                }
            }
        };
        if !h.is_finite() || h > H_MAX {
            return Err(StepError::ConvectionOutOfRange {
                surface: surface.name.clone(),
                h,
            });
        }
        Ok(h.max(H_MIN))
    }
}
