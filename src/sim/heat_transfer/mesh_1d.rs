use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::sim::energy::construction::Construction;
use crate::sim::heat_transfer::mesh::{MeshLayout, Node};

/// Default Fourier limit used to size node spacing.
pub const DEFAULT_FOURIER_LIMIT: f64 = 0.5;

/// Build a 1D finite-difference node layout from a [`Construction`].
///
/// Layers are ordered **exterior → interior**. For each layer the smallest
/// admissible spacing is `dx_min = sqrt(alpha * dt / fourier_limit)`; the
/// layer receives `max(1, floor(L / dx_min))` equal nodes so that
/// `alpha * dt / dx^2 <= fourier_limit` for every layer at least `dx_min`
/// thick. Thinner layers get exactly one node.
///
/// The result depends only on its arguments and can be cached by
/// `(construction, dt)`; see [`MeshCache`].
pub fn discretize(construction: &Construction, dt: f64, fourier_limit: f64) -> MeshLayout {
    let mut nodes = Vec::new();
    let mut nodes_per_layer = Vec::with_capacity(construction.layers().len());
    let mut x0 = 0.0;

    for (layer_index, layer) in construction.layers().iter().enumerate() {
        let dx_min = (layer.diffusivity() * dt / fourier_limit).sqrt();
        let n = ((layer.thickness / dx_min).floor() as usize).max(1);
        if layer.thickness < dx_min {
            debug!(
                construction = construction.name(),
                layer = %layer.name,
                thickness = layer.thickness,
                dx_min,
                "layer thinner than Fourier spacing, using a single node"
            );
        }
        let dx = layer.thickness / n as f64;
        for j in 0..n {
            nodes.push(Node {
                layer_index,
                position: x0 + (j as f64 + 0.5) * dx,
                dx,
                half_dx_out: dx / 2.0,
                half_dx_in: dx / 2.0,
                conductivity: layer.conductivity,
                density: layer.density,
                specific_heat: layer.specific_heat,
            });
        }
        nodes_per_layer.push(n);
        x0 += layer.thickness;
    }

    // Series-resistance link between neighbours:
    //   K = 1 / (half_dx_L / k_L + half_dx_R / k_R)
    // This reduces to the harmonic mean at material interfaces.
    let links = nodes
        .windows(2)
        .map(|w| 1.0 / (w[0].half_dx_in / w[0].conductivity + w[1].half_dx_out / w[1].conductivity))
        .collect();

    MeshLayout {
        construction: construction.name().to_string(),
        dt_s: dt,
        fourier_limit,
        nodes,
        links,
        nodes_per_layer,
    }
}

/// Cache of node layouts keyed by construction name and timestep.
///
/// Looking up a different `dt` always produces a fresh layout; a layout is
/// never reused for a timestep it was not sized for.
#[derive(Debug, Default)]
pub struct MeshCache {
    fourier_limit: f64,
    layouts: HashMap<(String, u64), Arc<MeshLayout>>,
}

impl MeshCache {
    pub fn new(fourier_limit: f64) -> Self {
        Self {
            fourier_limit,
            layouts: HashMap::new(),
        }
    }

    pub fn fourier_limit(&self) -> f64 {
        self.fourier_limit
    }

    /// Returns the layout for `(construction, dt)`, building it on first use.
    pub fn layout(&mut self, construction: &Construction, dt: f64) -> Arc<MeshLayout> {
        let key = (construction.name().to_string(), dt.to_bits());
        let limit = self.fourier_limit;
        self.layouts
            .entry(key)
            .or_insert_with(|| Arc::new(discretize(construction, dt, limit)))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}

/// Carry a temperature profile from one layout onto another of the same
/// construction by linear interpolation over node positions.
///
/// Values beyond the first/last source node are held constant.
pub fn remap_temperatures(from: &MeshLayout, temperatures: &[f64], to: &MeshLayout) -> Vec<f64> {
    let xs: Vec<f64> = from.positions().collect();
    to.positions()
        .map(|x| interpolate(&xs, temperatures, x))
        .collect()
}

fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let n = xs.len().min(ys.len());
    if n == 0 {
        return 0.0;
    }
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[n - 1] {
        return ys[n - 1];
    }
    let i = xs[..n].partition_point(|&xi| xi <= x).max(1);
    let (x0, x1) = (xs[i - 1], xs[i]);
    let w = (x - x0) / (x1 - x0);
    ys[i - 1] + w * (ys[i] - ys[i - 1])
}
