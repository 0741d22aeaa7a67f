use super::{TopologyError, TopologyGeometry};
use crate::geometry_utils::{concat_coords, coords_close, offset_line, offset_point, sub_line};
use crate::ids::TopologyId;
use crate::network::Network;
use geo_types::{Coord, LineString, MultiLineString};
use tracing::warn;

/// Walk the aggregations in order and build the topology geometry.
///
/// Point topologies project their single position and apply the offset.
/// Line topologies chain sub-lines; a gap wider than `tolerance` starts a new part.
pub fn compute_geometry(
    network: &Network,
    id: TopologyId,
    tolerance: f64,
) -> Result<TopologyGeometry, TopologyError> {
    let topology = network
        .topology(id)
        .ok_or(TopologyError::UnknownTopology(id))?;
    let aggregations = network.aggregations_of(id);
    if aggregations.is_empty() {
        return Ok(TopologyGeometry::Empty);
    }

    if topology.kind.is_point() {
        let agg = aggregations[0];
        let path = network
            .path(agg.path)
            .ok_or(TopologyError::UnknownPath(agg.path))?;
        let coord = offset_point(path.geom(), agg.start_position, topology.offset)?;
        return Ok(TopologyGeometry::Point(coord));
    }

    let mut parts: Vec<Vec<Coord>> = Vec::new();
    for agg in aggregations {
        let path = network
            .path(agg.path)
            .ok_or(TopologyError::UnknownPath(agg.path))?;
        let piece = sub_line(path.geom(), agg.start_position, agg.end_position)?;
        let joins = match (parts.last().and_then(|p| p.last()), piece.0.first()) {
            (Some(tail), Some(head)) => coords_close(*tail, *head, tolerance),
            _ => false,
        };
        match parts.last_mut() {
            Some(current) if joins => concat_coords(current, &piece.0, tolerance),
            _ => parts.push(piece.0),
        }
    }

    let offset = topology.offset;
    let mut lines: Vec<LineString> = parts
        .into_iter()
        .map(|coords| LineString::new(offset_line(&coords, offset)))
        .collect();

    if lines.len() == 1 {
        let line = lines.remove(0);
        // A lone degenerate segment is a point on the path.
        if line.0.len() == 1 {
            return Ok(TopologyGeometry::Point(line.0[0]));
        }
        return Ok(TopologyGeometry::Line(line));
    }
    Ok(TopologyGeometry::MultiLine(MultiLineString::new(lines)))
}

/// Recompute and store the cached geometry and length.
pub fn refresh_geometry(
    network: &mut Network,
    id: TopologyId,
    tolerance: f64,
) -> Result<(), TopologyError> {
    let geom = compute_geometry(network, id, tolerance)?;
    if geom.is_multi_part() {
        warn!(topology = %id, "aggregations do not chain into one line");
    }
    if let Some(topology) = network.topology_mut(id) {
        topology.length = geom.length();
        topology.geom = geom;
    }
    Ok(())
}
