use std::collections::HashMap;
use std::fmt;

use itertools::Itertools;
use nalgebra::DMatrix;
use petgraph::{
    graph::{NodeIndex, UnGraph},
    visit::{EdgeRef, IntoNodeReferences, NodeIndexable},
};
use uom::si::{
    area::square_meter,
    f64::{Area, HeatCapacity, HeatTransfer, ThermalConductance},
    heat_capacity::joule_per_kelvin,
    thermal_conductance::watt_per_kelvin,
};

use crate::model::BuildingParameters;
use crate::ports::PortConfiguration;
use crate::tools::reciprocal_sum;

/// Heat capacity of the zone air.
pub fn air_heat_capacity(params: &BuildingParameters, ports: &PortConfiguration) -> HeatCapacity {
    params.air_volume * ports.air_density * ports.air_specific_heat
}

/// Role of a node in the zone network.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Air,
    ExteriorMass,
    InteriorMass,
    ExteriorWallSurface,
    InteriorWallSurface,
    WindowSurface,
    /// Equivalent outdoor temperature seen by the exterior wall
    ExteriorEquivalent,
    /// Outdoor air, drives the window and the ventilation
    OutdoorAir,
}

impl NodeKind {
    /// Capacitive nodes, in the order of the state vector.
    pub const STATES: [NodeKind; 3] = [
        NodeKind::Air,
        NodeKind::ExteriorMass,
        NodeKind::InteriorMass,
    ];

    /// Fixed temperature nodes, in the order of the boundary vector.
    pub const BOUNDARIES: [NodeKind; 2] = [NodeKind::ExteriorEquivalent, NodeKind::OutdoorAir];
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NodeKind::Air => "air",
            NodeKind::ExteriorMass => "exterior mass",
            NodeKind::InteriorMass => "interior mass",
            NodeKind::ExteriorWallSurface => "exterior wall surface",
            NodeKind::InteriorWallSurface => "interior wall surface",
            NodeKind::WindowSurface => "window surface",
            NodeKind::ExteriorEquivalent => "equivalent outdoor",
            NodeKind::OutdoorAir => "outdoor air",
        };
        write!(f, "{label}")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    /// Zero for massless surface nodes, infinite for boundary nodes.
    pub heat_capacity: HeatCapacity,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Edge {
    pub conductance: ThermalConductance,
}

/// The zone as a network of thermal capacities joined by conductances.
#[derive(Clone, Debug)]
pub struct RcNetwork {
    pub graph: UnGraph<Node, Edge>,

    /// Mapping of node roles to node indices.
    pub node_indices: HashMap<NodeKind, NodeIndex>,

    /// Share of radiative heat (internal gains, transmitted solar) received by each indoor
    /// surface. Shares sum to one.
    pub radiative_shares: Vec<(NodeKind, f64)>,
}

#[derive(Copy, Clone, Debug)]
pub struct DotDisplayer<'a> {
    rc_network: &'a RcNetwork,
}

impl<'a> fmt::Display for DotDisplayer<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let g = &self.rc_network.graph;

        writeln!(f, "graph {{")?;
        for (index, node) in g.node_references() {
            writeln!(
                f,
                "    node_{} [ label = \"{}\" ]",
                g.to_index(index),
                node
            )?;
        }

        for edge in g.edge_references() {
            writeln!(
                f,
                "    node_{} -- node_{} [ label = \"{}\" ]",
                g.to_index(edge.source()),
                g.to_index(edge.target()),
                edge.weight()
            )?
        }

        writeln!(f, "}}")
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\\n", self.kind)?;
        let capacity = self.heat_capacity.get::<joule_per_kelvin>();
        if capacity.is_infinite() {
            write!(f, "boundary")
        } else {
            write!(f, "{} J/K", capacity)
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} W/K", self.conductance.get::<watt_per_kelvin>())
    }
}

impl<'a> RcNetwork {
    pub fn to_dot(&'a self) -> DotDisplayer<'a> {
        DotDisplayer { rc_network: self }
    }
}

impl RcNetwork {
    pub fn index(&self, kind: NodeKind) -> Option<NodeIndex> {
        self.node_indices.get(&kind).copied()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Nodes without heat capacity, in graph order.
    pub fn surface_nodes(&self) -> Vec<NodeIndex> {
        self.graph
            .node_references()
            .filter(|(_, node)| node.heat_capacity.get::<joule_per_kelvin>() == 0.0)
            .map(|(index, _)| index)
            .collect()
    }

    /// Weighted Laplacian of the network in W/K, indexed by graph node index.
    /// Row i holds the heat leaving node i per kelvin of temperature difference.
    pub fn conductance_matrix(&self) -> DMatrix<f64> {
        let n = self.graph.node_count();
        let mut matrix = DMatrix::zeros(n, n);
        for edge in self.graph.edge_references() {
            let i = self.graph.to_index(edge.source());
            let j = self.graph.to_index(edge.target());
            let g = edge.weight().conductance.get::<watt_per_kelvin>();
            matrix[(i, i)] += g;
            matrix[(j, j)] += g;
            matrix[(i, j)] -= g;
            matrix[(j, i)] -= g;
        }
        matrix
    }

    /// Sum of conductances between two nodes, zero if they are not connected.
    pub fn conductance_between(&self, a: NodeKind, b: NodeKind) -> ThermalConductance {
        match (self.index(a), self.index(b)) {
            (Some(a), Some(b)) => self
                .graph
                .edges_connecting(a, b)
                .map(|edge| edge.weight().conductance)
                .sum(),
            _ => ThermalConductance::new::<watt_per_kelvin>(0.0),
        }
    }
}

impl RcNetwork {
    /// Build the network of a zone. The air capacity comes from the port configuration,
    /// see [`air_heat_capacity`].
    pub fn new(params: &BuildingParameters, air_heat_capacity: HeatCapacity) -> Self {
        let mut builder = NetworkBuilder::default();

        builder.add_node(NodeKind::Air, air_heat_capacity);
        builder.add_node(NodeKind::ExteriorMass, params.exterior_heat_capacity);
        builder.add_node(NodeKind::InteriorMass, params.interior_heat_capacity);
        for kind in NodeKind::BOUNDARIES {
            builder.add_node(kind, HeatCapacity::new::<joule_per_kelvin>(f64::INFINITY));
        }

        builder.connect(
            NodeKind::ExteriorEquivalent,
            NodeKind::ExteriorMass,
            reciprocal_sum!(
                params.exterior_surface_heat_transfer * params.exterior_wall_area,
                params.exterior_wall_outer_conductance
            ),
        );

        let mut surfaces = vec![
            IndoorSurface {
                kind: NodeKind::ExteriorWallSurface,
                behind: NodeKind::ExteriorMass,
                layer_conductance: params.exterior_wall_inner_conductance,
                area: params.exterior_wall_area,
                convection: params.exterior_wall_convection,
            },
            IndoorSurface {
                kind: NodeKind::InteriorWallSurface,
                behind: NodeKind::InteriorMass,
                layer_conductance: params.interior_wall_conductance,
                area: params.interior_wall_area,
                convection: params.interior_wall_convection,
            },
        ];
        if params.has_window() {
            surfaces.push(IndoorSurface {
                kind: NodeKind::WindowSurface,
                behind: NodeKind::OutdoorAir,
                layer_conductance: params.window_conductance,
                area: params.window_area,
                convection: params.window_convection,
            });
        }

        for surface in surfaces.iter() {
            builder.add_node(surface.kind, HeatCapacity::new::<joule_per_kelvin>(0.0));
            builder.connect(surface.behind, surface.kind, surface.layer_conductance);
            builder.connect(surface.kind, NodeKind::Air, surface.convection * surface.area);
        }

        for (s1, s2) in surfaces.iter().tuple_combinations() {
            let exchange_area = if s1.area < s2.area { s1.area } else { s2.area };
            builder.connect(s1.kind, s2.kind, params.radiative_exchange * exchange_area);
        }

        let total_area: f64 = surfaces
            .iter()
            .map(|surface| surface.area.get::<square_meter>())
            .sum();
        let radiative_shares = surfaces
            .iter()
            .map(|surface| (surface.kind, surface.area.get::<square_meter>() / total_area))
            .collect();

        RcNetwork {
            graph: builder.graph,
            node_indices: builder.node_indices,
            radiative_shares,
        }
    }
}

/// Indoor surface of a building element, connected to the air by convection and
/// to the node behind it through the element's inner layer.
struct IndoorSurface {
    kind: NodeKind,
    behind: NodeKind,
    layer_conductance: ThermalConductance,
    area: Area,
    convection: HeatTransfer,
}

#[derive(Default)]
struct NetworkBuilder {
    graph: UnGraph<Node, Edge>,
    node_indices: HashMap<NodeKind, NodeIndex>,
}

impl NetworkBuilder {
    fn add_node(&mut self, kind: NodeKind, heat_capacity: HeatCapacity) {
        let index = self.graph.add_node(Node {
            kind,
            heat_capacity,
        });
        self.node_indices.insert(kind, index);
    }

    fn connect(&mut self, a: NodeKind, b: NodeKind, conductance: ThermalConductance) {
        self.graph.add_edge(
            self.node_indices[&a],
            self.node_indices[&b],
            Edge { conductance },
        );
    }
}
