// ===========================================================================
// Path Router: shortest routes through in-path steps
// ===========================================================================
//
// Nothing is cached between calls; the graph is derived from the network
// snapshot handed in, so path edits show up in the very next query.
use crate::network::Network;
use crate::topology::SerializedTopology;
use geo_types::{Geometry, GeometryCollection};
use serde_json::Value;
use tracing::info;

mod dijkstra;
mod graph;
mod request;

#[cfg(test)]
mod router_tests;

pub use dijkstra::{RouteLeg, route_leg};
pub use graph::{Piece, RoutingGraph};
pub use request::{RoutingError, RoutingErrorKind, Step, parse_steps, validate_steps};

#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub legs: Vec<RouteLeg>,
}

impl Route {
    pub fn length(&self) -> f64 {
        self.legs.iter().map(|l| l.length).sum()
    }

    /// One LineString per leg.
    pub fn geometry(&self) -> GeometryCollection {
        GeometryCollection::new_from(
            self.legs
                .iter()
                .map(|l| Geometry::LineString(l.geometry.clone()))
                .collect(),
        )
    }

    /// Per-leg `{paths, positions}`, directly usable as a multi-leg topology.
    pub fn serialized(&self) -> Vec<SerializedTopology> {
        self.legs.iter().map(RouteLeg::serialize).collect()
    }
}

impl RouteLeg {
    pub fn serialize(&self) -> SerializedTopology {
        SerializedTopology {
            offset: 0.0,
            paths: self.pieces.iter().map(|p| p.path).collect(),
            positions: self
                .pieces
                .iter()
                .enumerate()
                .map(|(i, p)| (i, [p.start, p.end]))
                .collect(),
        }
    }
}

/// Route through every step in order.
pub fn route(network: &Network, steps: &[Step], tolerance: f64) -> Result<Route, RoutingError> {
    validate_steps(network, steps)?;
    let graph = RoutingGraph::build(network, tolerance);
    let legs = steps
        .windows(2)
        .map(|w| route_leg(network, &graph, w[0], w[1]))
        .collect::<Result<Vec<_>, _>>()?;
    let route = Route { legs };
    info!(
        steps = steps.len(),
        length = route.length(),
        "route computed"
    );
    Ok(route)
}

/// Validate a JSON request body and route it.
pub fn route_request(
    network: &Network,
    body: &Value,
    tolerance: f64,
) -> Result<Route, RoutingError> {
    let steps = parse_steps(network, body)?;
    route(network, &steps, tolerance)
}
