//! Elimination of the massless surface nodes from the zone network.
//!
//! With the nodes split into states `S`, surfaces `A` and boundaries `B`, the surface
//! balances `L_AS T_S + L_AA T_A + L_AB T_B = q_A` are solved for `T_A` once and substituted
//! into the state balances. What remains couples only the three capacitive nodes.

use nalgebra::{DMatrix, DVector};
use petgraph::visit::NodeIndexable;
use uom::si::heat_capacity::joule_per_kelvin;

use crate::error::Error;
use crate::rc_network::{NodeKind, RcNetwork};

/// Linear map from the states, boundaries and heat injections of the full network onto the
/// three state nodes.
#[derive(Clone, Debug)]
pub struct ReducedNetwork {
    /// Heat capacities of the states, J/K
    pub capacities: DVector<f64>,
    /// Effective conductances among the states (3x3), W/K
    pub state_coupling: DMatrix<f64>,
    /// Effective conductances from the boundaries to the states (3x2), W/K
    pub boundary_coupling: DMatrix<f64>,
    /// How heat injected at each surface node ends up at the states (3 x surfaces)
    pub surface_injection: DMatrix<f64>,

    /// Surface kinds, in the column order of `surface_injection`
    pub surfaces: Vec<NodeKind>,
    /// Graph indices of states, surfaces and boundaries
    state_indices: Vec<usize>,
    surface_indices: Vec<usize>,
    boundary_indices: Vec<usize>,

    /// `L_AA^-1`, for recovering surface temperatures
    surface_inverse: DMatrix<f64>,
    surface_state_coupling: DMatrix<f64>,
    surface_boundary_coupling: DMatrix<f64>,
}

impl ReducedNetwork {
    pub fn new(network: &RcNetwork) -> Result<Self, Error> {
        let laplacian = network.conductance_matrix();
        let graph_index = |kind: NodeKind| {
            network
                .index(kind)
                .map(|index| network.graph.to_index(index))
                .ok_or_else(|| Error::invalid("network", format!("missing {kind} node")))
        };

        let state_indices = NodeKind::STATES
            .iter()
            .map(|kind| graph_index(*kind))
            .collect::<Result<Vec<_>, _>>()?;
        let boundary_indices = NodeKind::BOUNDARIES
            .iter()
            .map(|kind| graph_index(*kind))
            .collect::<Result<Vec<_>, _>>()?;
        let surfaces: Vec<NodeKind> = network
            .surface_nodes()
            .into_iter()
            .map(|index| network.graph[index].kind)
            .collect();
        let surface_indices = network
            .surface_nodes()
            .into_iter()
            .map(|index| network.graph.to_index(index))
            .collect::<Vec<_>>();

        let capacities = DVector::from_iterator(
            state_indices.len(),
            NodeKind::STATES.iter().map(|kind| {
                network
                    .index(*kind)
                    .map(|index| network.graph[index].heat_capacity.get::<joule_per_kelvin>())
                    .unwrap_or_default()
            }),
        );

        let l_ss = submatrix(&laplacian, &state_indices, &state_indices);
        let l_sa = submatrix(&laplacian, &state_indices, &surface_indices);
        let l_sb = submatrix(&laplacian, &state_indices, &boundary_indices);
        let l_aa = submatrix(&laplacian, &surface_indices, &surface_indices);
        let l_as = submatrix(&laplacian, &surface_indices, &state_indices);
        let l_ab = submatrix(&laplacian, &surface_indices, &boundary_indices);

        let surface_inverse = l_aa
            .try_inverse()
            .ok_or_else(|| Error::divergence(None, "surface conductance matrix is singular"))?;
        let transfer = &l_sa * &surface_inverse;

        let state_coupling = &l_ss - &transfer * &l_as;
        let boundary_coupling = &l_sb - &transfer * &l_ab;
        let surface_injection = -transfer;

        Ok(ReducedNetwork {
            capacities,
            state_coupling,
            boundary_coupling,
            surface_injection,
            surfaces,
            state_indices,
            surface_indices,
            boundary_indices,
            surface_inverse,
            surface_state_coupling: l_as,
            surface_boundary_coupling: l_ab,
        })
    }

    /// Temperatures of the surface nodes for given states, boundaries and surface heat
    /// injections, in the order of `surfaces`.
    pub fn surface_temperatures(
        &self,
        states: &DVector<f64>,
        boundaries: &DVector<f64>,
        surface_gains: &DVector<f64>,
    ) -> DVector<f64> {
        &self.surface_inverse
            * (surface_gains
                - &self.surface_state_coupling * states
                - &self.surface_boundary_coupling * boundaries)
    }

    /// Temperatures of all graph nodes, indexed by graph node index.
    pub fn node_temperatures(
        &self,
        states: &DVector<f64>,
        boundaries: &DVector<f64>,
        surface_gains: &DVector<f64>,
    ) -> DVector<f64> {
        let surfaces = self.surface_temperatures(states, boundaries, surface_gains);
        let n = self.state_indices.len() + self.surface_indices.len() + self.boundary_indices.len();
        let mut all = DVector::zeros(n);
        for (values, indices) in [
            (states, &self.state_indices),
            (&surfaces, &self.surface_indices),
            (boundaries, &self.boundary_indices),
        ] {
            for (value, index) in values.iter().zip(indices.iter()) {
                all[*index] = *value;
            }
        }
        all
    }
}

fn submatrix(matrix: &DMatrix<f64>, rows: &[usize], cols: &[usize]) -> DMatrix<f64> {
    DMatrix::from_fn(rows.len(), cols.len(), |i, j| matrix[(rows[i], cols[j])])
}
