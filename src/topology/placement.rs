// ===========================================================================
// Topology placement: from raw coordinates or from an explicit path list
// ===========================================================================
use super::geometry::refresh_geometry;
use super::serialized::{SerializedTopology, TopologySpec};
use super::{TopologyError, TopologyKind, check_position, create};
use crate::coord_conversion::Projection;
use crate::geometry_utils::POSITION_EPSILON;
use crate::ids::{PathId, TopologyId};
use crate::network::Network;
use crate::path_graph::spatial::closest_path;
use tracing::debug;

/// Create a point topology on the visible path closest to the coordinate.
/// The residual distance becomes the topology offset.
pub fn place_by_coordinate(
    network: &mut Network,
    kind: TopologyKind,
    lat: f64,
    lng: f64,
    projection: &Projection,
    tolerance: f64,
) -> Result<TopologyId, TopologyError> {
    if !lat.is_finite() || !lng.is_finite() {
        return Err(TopologyError::InvalidSpec(format!(
            "invalid coordinate ({lat}, {lng})"
        )));
    }
    let coord = projection.project(lng, lat);
    let (path, reference) =
        closest_path(network, coord, |p| p.visible).ok_or(TopologyError::NoPathNearby)?;

    let id = create(network, kind);
    network.push_aggregation(id, path, reference.position, reference.position);
    if let Some(topology) = network.topology_mut(id) {
        topology.offset = reference.offset;
    }
    refresh_geometry(network, id, tolerance)?;
    debug!(topology = %id, %path, position = reference.position, "placed by coordinate");
    Ok(id)
}

/// Create a topology from one or several `{paths, positions, offset}` blocks.
/// Consecutive contiguous segments on the same path are fused.
pub fn place_by_paths(
    network: &mut Network,
    kind: TopologyKind,
    legs: &[SerializedTopology],
    tolerance: f64,
) -> Result<TopologyId, TopologyError> {
    let is_point = kind.is_point();
    let mut segments: Vec<(PathId, f64, f64)> = Vec::new();
    for leg in legs {
        for segment in leg_segments(network, leg, is_point)? {
            push_fused(&mut segments, segment);
        }
    }
    if segments.is_empty() {
        return Err(TopologyError::NoPaths);
    }
    if is_point && (segments.len() != 1 || segments[0].1 != segments[0].2) {
        return Err(TopologyError::InvalidPoint);
    }
    let offset = legs.first().map(|l| l.offset).unwrap_or(0.0);
    if !offset.is_finite() {
        return Err(TopologyError::InvalidOffset(offset));
    }

    let id = create(network, kind);
    for (path, start, end) in &segments {
        network.push_aggregation(id, *path, *start, *end);
    }
    if let Some(topology) = network.topology_mut(id) {
        topology.offset = offset;
    }
    refresh_geometry(network, id, tolerance)?;
    debug!(topology = %id, segments = segments.len(), "placed by paths");
    Ok(id)
}

fn leg_segments(
    network: &Network,
    leg: &SerializedTopology,
    is_point: bool,
) -> Result<Vec<(PathId, f64, f64)>, TopologyError> {
    if let Some(index) = leg.positions.keys().find(|i| **i >= leg.paths.len()) {
        return Err(TopologyError::InvalidSpec(format!(
            "position index {index} has no matching path"
        )));
    }
    leg.paths
        .iter()
        .enumerate()
        .map(|(i, &path)| {
            if network.path(path).is_none() {
                return Err(TopologyError::UnknownPath(path));
            }
            match leg.positions.get(&i) {
                Some(&[start, end]) => Ok((path, check_position(start)?, check_position(end)?)),
                None if is_point => Err(TopologyError::InvalidPoint),
                None => Ok((path, 0.0, 1.0)),
            }
        })
        .collect()
}

fn push_fused(segments: &mut Vec<(PathId, f64, f64)>, next: (PathId, f64, f64)) {
    if let Some(last) = segments.last_mut() {
        let (path, start, end) = *last;
        if path == next.0 && (end - next.1).abs() <= POSITION_EPSILON {
            let last_dir = end - start;
            let next_dir = next.2 - next.1;
            if next_dir.abs() <= POSITION_EPSILON {
                // Degenerate repeat of the junction.
                return;
            }
            if last_dir.abs() <= POSITION_EPSILON || last_dir.signum() == next_dir.signum() {
                last.2 = next.2;
                return;
            }
        }
    }
    segments.push(next);
}

/// Parse-side entry point: dispatch on the accepted shapes.
pub fn deserialize(
    network: &mut Network,
    kind: TopologyKind,
    spec: &TopologySpec,
    projection: &Projection,
    tolerance: f64,
) -> Result<TopologyId, TopologyError> {
    match spec {
        TopologySpec::Coordinates { lat, lng } => {
            place_by_coordinate(network, kind, *lat, *lng, projection, tolerance)
        }
        TopologySpec::Single(single) => {
            place_by_paths(network, kind, std::slice::from_ref(single), tolerance)
        }
        TopologySpec::Legs(legs) => place_by_paths(network, kind, legs, tolerance),
    }
}
