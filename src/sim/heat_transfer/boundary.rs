/// Boundary condition applied at one face of a conduction mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundaryCondition {
    /// Fixed face temperature (ground proxy): T_face = temperature.
    Dirichlet { temperature: f64 },
    /// Zero heat flux through the face.
    Adiabatic,
    /// Convective: q = h * (T_fluid - T_face).
    ///
    /// Exterior: h ~ 10-25 W/(m^2*K), interior: h ~ 1-8 W/(m^2*K).
    Convective { h: f64, t_fluid: f64 },
    /// Convective with an absorbed surface source `heat_flux` [W/m^2].
    ///
    /// Only part of the source enters the mesh; the rest is lost straight to
    /// `t_fluid` through the film (split by the half-node conductance).
    /// Used for exterior absorbed shortwave.
    ConvectiveWithFlux {
        h: f64,
        t_fluid: f64,
        heat_flux: f64,
    },
    /// Convective with a surface source applied **entirely** to the mesh.
    ///
    /// Used for transmitted solar absorbed by an interior face: it must heat
    /// the material before returning to the zone air by convection.
    ConvectiveWithFluxToDomain {
        h: f64,
        t_fluid: f64,
        heat_flux: f64,
    },
}

impl BoundaryCondition {
    /// Film coefficient, if this boundary is convective.
    pub fn film_coefficient(&self) -> Option<f64> {
        match *self {
            Self::Convective { h, .. }
            | Self::ConvectiveWithFlux { h, .. }
            | Self::ConvectiveWithFluxToDomain { h, .. } => Some(h),
            Self::Dirichlet { .. } | Self::Adiabatic => None,
        }
    }
}
