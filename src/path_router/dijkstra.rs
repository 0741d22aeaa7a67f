use super::graph::{Arc, Piece, RoutingGraph};
use super::request::{RoutingError, Step};
use crate::geometry_utils::{POSITION_EPSILON, concat_coords, sub_line};
use crate::network::Network;
use ahash::AHashMap;
use geo_types::{Coord, LineString};
use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::debug;

#[derive(Copy, Clone, Eq, PartialEq)]
struct State {
    cost: OrderedFloat<f64>,
    node: usize,
}

// Flip the ordering on cost so the BinaryHeap pops the cheapest state first.
// Ties compare nodes to keep `Ord` consistent with `PartialEq`.
impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| self.node.cmp(&other.node))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One inter-step stretch of a route.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteLeg {
    pub pieces: Vec<Piece>,
    pub geometry: LineString,
    pub length: f64,
}

/// Shortest traversal between two steps.
///
/// The two steps become virtual nodes hanging off the endpoints of their paths,
/// with stub arcs weighted by the remaining part of the path. Two steps on the
/// same path also get a direct arc.
pub fn route_leg(
    network: &Network,
    graph: &RoutingGraph,
    from: Step,
    to: Step,
) -> Result<RouteLeg, RoutingError> {
    let (Some(from_path), Some(to_path)) = (network.path(from.path), network.path(to.path)) else {
        return Err(RoutingError::NoPath);
    };
    let (Some((fa, fb)), Some((ta, tb))) = (graph.endpoints(from.path), graph.endpoints(to.path))
    else {
        debug!(from = %from.path, to = %to.path, "step on a path excluded from routing");
        return Err(RoutingError::NoPath);
    };

    let source = graph.node_count();
    let target = source + 1;
    let stub = |path, start: f64, end: f64, length: f64, to: usize| Arc {
        to,
        cost: (end - start).abs() * length,
        piece: Piece { path, start, end },
    };

    let mut source_arcs = vec![
        stub(from.path, from.position, 0.0, from_path.length(), fa),
        stub(from.path, from.position, 1.0, from_path.length(), fb),
    ];
    if from.path == to.path {
        source_arcs.insert(
            0,
            stub(from.path, from.position, to.position, from_path.length(), target),
        );
    }
    let mut target_arcs: AHashMap<usize, Vec<Arc>> = AHashMap::new();
    target_arcs
        .entry(ta)
        .or_default()
        .push(stub(to.path, 0.0, to.position, to_path.length(), target));
    target_arcs
        .entry(tb)
        .or_default()
        .push(stub(to.path, 1.0, to.position, to_path.length(), target));

    let mut dist = vec![f64::INFINITY; target + 1];
    let mut prev: Vec<Option<(usize, Piece)>> = vec![None; target + 1];
    let mut heap = BinaryHeap::new();
    dist[source] = 0.0;
    heap.push(State {
        cost: OrderedFloat(0.0),
        node: source,
    });

    while let Some(State { cost, node }) = heap.pop() {
        if node == target {
            break;
        }
        if cost.0 > dist[node] {
            continue;
        }
        let arcs: Box<dyn Iterator<Item = &Arc>> = if node == source {
            Box::new(source_arcs.iter())
        } else {
            Box::new(
                graph
                    .arcs(node)
                    .iter()
                    .chain(target_arcs.get(&node).into_iter().flatten()),
            )
        };
        for arc in arcs {
            let next = cost.0 + arc.cost;
            if next < dist[arc.to] {
                dist[arc.to] = next;
                prev[arc.to] = Some((node, arc.piece));
                heap.push(State {
                    cost: OrderedFloat(next),
                    node: arc.to,
                });
            }
        }
    }

    if !dist[target].is_finite() {
        debug!(from = %from.path, to = %to.path, "no route between steps");
        return Err(RoutingError::NoPath);
    }

    let mut pieces = Vec::new();
    let mut node = target;
    while let Some((before, piece)) = prev[node] {
        pieces.push(piece);
        node = before;
    }
    pieces.reverse();
    let pieces = collapse(pieces);
    build_leg(network, pieces)
}

/// Fuse consecutive pieces that continue along the same path.
fn collapse(pieces: Vec<Piece>) -> Vec<Piece> {
    let mut out: Vec<Piece> = Vec::with_capacity(pieces.len());
    for piece in pieces {
        if let Some(last) = out.last_mut() {
            let continues = last.path == piece.path
                && (last.end - piece.start).abs() <= POSITION_EPSILON;
            let same_way = last.is_degenerate()
                || piece.is_degenerate()
                || (last.end - last.start).signum() == (piece.end - piece.start).signum();
            if continues && same_way {
                if !piece.is_degenerate() {
                    if last.is_degenerate() {
                        last.start = piece.start;
                    }
                    last.end = piece.end;
                }
                continue;
            }
        }
        out.push(piece);
    }
    out
}

fn build_leg(network: &Network, pieces: Vec<Piece>) -> Result<RouteLeg, RoutingError> {
    let mut coords: Vec<Coord> = Vec::new();
    let mut length = 0.0;
    for piece in &pieces {
        let path = network
            .path(piece.path)
            .ok_or_else(|| RoutingError::Internal(format!("path {} vanished", piece.path)))?;
        let part = sub_line(path.geom(), piece.start, piece.end)
            .map_err(|e| RoutingError::Internal(e.to_string()))?;
        concat_coords(&mut coords, &part.0, 0.0);
        length += (piece.end - piece.start).abs() * path.length();
    }
    if coords.len() == 1 {
        coords.push(coords[0]);
    }
    Ok(RouteLeg {
        pieces,
        geometry: LineString::new(coords),
        length,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::PathId;

    fn piece(path: u64, start: f64, end: f64) -> Piece {
        Piece {
            path: PathId(path),
            start,
            end,
        }
    }

    #[test]
    fn collapse_fuses_continuations_only() {
        assert_eq!(
            collapse(vec![piece(1, 0.0, 0.0), piece(1, 0.0, 1.0), piece(2, 0.0, 1.0)]),
            vec![piece(1, 0.0, 1.0), piece(2, 0.0, 1.0)]
        );
        // A U-turn on the same path stays two pieces.
        assert_eq!(
            collapse(vec![piece(1, 0.2, 1.0), piece(1, 1.0, 0.5)]),
            vec![piece(1, 0.2, 1.0), piece(1, 1.0, 0.5)]
        );
    }
}
