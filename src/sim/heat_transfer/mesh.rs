/// A single finite-difference node.
///
/// Nodes are cell-centred: each one owns a slab of thickness `dx` inside a
/// single layer, and its temperature is the slab-average temperature.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Index of the owning layer in construction order (outside to inside).
    pub layer_index: usize,
    /// Distance of the node centre from the exterior face in m.
    pub position: f64,
    /// Slab thickness in m.
    pub dx: f64,
    /// Effective half-thickness towards the exterior face in m.
    pub half_dx_out: f64,
    /// Effective half-thickness towards the interior face in m.
    pub half_dx_in: f64,
    /// Thermal conductivity in W/(m*K).
    pub conductivity: f64,
    /// Density in kg/m^3.
    pub density: f64,
    /// Specific heat capacity in J/(kg*K).
    pub specific_heat: f64,
}

impl Node {
    /// Heat capacity per unit area: rho * c_p * dx  [J/(m^2*K)].
    pub fn capacity_per_area(&self) -> f64 {
        self.density * self.specific_heat * self.dx
    }

    /// Fourier number alpha * dt / dx^2 for this node.
    pub fn fourier(&self, dt: f64) -> f64 {
        let alpha = self.conductivity / (self.density * self.specific_heat);
        alpha * dt / (self.dx * self.dx)
    }

    /// Conductance per area from the node centre to the exterior face [W/(m^2*K)].
    pub fn half_conductance_out(&self) -> f64 {
        self.conductivity / self.half_dx_out
    }

    /// Conductance per area from the node centre to the interior face [W/(m^2*K)].
    pub fn half_conductance_in(&self) -> f64 {
        self.conductivity / self.half_dx_in
    }
}

/// Node layout for one construction at one timestep.
///
/// A layout is a pure function of `(construction, dt, fourier_limit)`; it
/// carries no temperatures.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshLayout {
    pub construction: String,
    /// Timestep the layout was sized for, in seconds.
    pub dt_s: f64,
    /// Fourier limit the layout was sized for.
    pub fourier_limit: f64,
    /// Nodes ordered exterior to interior.
    pub nodes: Vec<Node>,
    /// Conductance per area between node `i` and `i + 1` [W/(m^2*K)].
    pub links: Vec<f64>,
    /// Number of nodes per layer, in construction order.
    pub nodes_per_layer: Vec<usize>,
}

impl MeshLayout {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node positions from the exterior face, in m.
    pub fn positions(&self) -> impl Iterator<Item = f64> + '_ {
        self.nodes.iter().map(|n| n.position)
    }

    /// Largest Fourier number over all nodes at the layout's timestep.
    pub fn max_fourier(&self) -> f64 {
        self.nodes
            .iter()
            .map(|n| n.fourier(self.dt_s))
            .fold(0.0, f64::max)
    }

    /// Whether this layout was generated for `dt` and `fourier_limit`.
    pub fn matches(&self, dt: f64, fourier_limit: f64) -> bool {
        self.dt_s.to_bits() == dt.to_bits() && self.fourier_limit.to_bits() == fourier_limit.to_bits()
    }
}
