// ===========================================================================
// Routing graph, rebuilt from the current network on every call
// ===========================================================================
use crate::ids::PathId;
use crate::network::Network;
use crate::path_graph::NodeIndex;

/// A traversal of `path` from `start` to `end` (fractional positions).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Piece {
    pub path: PathId,
    pub start: f64,
    pub end: f64,
}

impl Piece {
    pub fn is_degenerate(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Arc {
    pub to: usize,
    pub cost: f64,
    pub piece: Piece,
}

/// Undirected graph over visible, non-draft paths. Every path yields one arc
/// in each direction between its endpoint nodes, weighted by its length.
pub struct RoutingGraph {
    nodes: NodeIndex,
    adjacency: Vec<Vec<Arc>>,
}

impl RoutingGraph {
    pub fn build(network: &Network, tolerance: f64) -> Self {
        let nodes = NodeIndex::build(network.paths().filter(|p| p.is_routable()), tolerance);
        let mut adjacency = vec![Vec::new(); nodes.len()];
        for path in network.paths().filter(|p| p.is_routable()) {
            let Some((from, to)) = nodes.endpoints(path.id) else {
                continue;
            };
            let length = path.length();
            adjacency[from].push(Arc {
                to,
                cost: length,
                piece: Piece {
                    path: path.id,
                    start: 0.0,
                    end: 1.0,
                },
            });
            adjacency[to].push(Arc {
                to: from,
                cost: length,
                piece: Piece {
                    path: path.id,
                    start: 1.0,
                    end: 0.0,
                },
            });
        }
        Self { nodes, adjacency }
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Endpoint nodes of a routable path.
    pub fn endpoints(&self, path: PathId) -> Option<(usize, usize)> {
        self.nodes.endpoints(path)
    }

    pub fn arcs(&self, node: usize) -> &[Arc] {
        self.adjacency.get(node).map(Vec::as_slice).unwrap_or_default()
    }
}
