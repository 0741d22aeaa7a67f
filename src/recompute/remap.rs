use crate::geometry_utils::{POSITION_EPSILON, locate_point, point_at_position};
use crate::ids::{PathId, TopologyId};
use crate::network::Network;
use crate::topology::TopologyError;
use geo_types::LineString;
use std::collections::BTreeSet;

fn pinned(position: f64) -> bool {
    position <= POSITION_EPSILON || position >= 1.0 - POSITION_EPSILON
}

/// Re-project one position: boundaries at a path end stay where they are so the
/// segment keeps touching its neighbour on the adjacent path.
fn remap_position(
    previous: &LineString,
    current: &LineString,
    position: f64,
) -> Result<f64, TopologyError> {
    if pinned(position) {
        return Ok(position.round());
    }
    let coord = point_at_position(previous, position)?;
    Ok(locate_point(current, coord)?.position)
}

/// Move every aggregation on `path` to the same physical place on its new geometry.
pub(super) fn remap_path(
    network: &mut Network,
    path: PathId,
    previous: &LineString,
    current: &LineString,
) -> Result<BTreeSet<TopologyId>, TopologyError> {
    let updates = network
        .aggregations_on(path)
        .iter()
        .map(|agg| {
            let start = remap_position(previous, current, agg.start_position)?;
            let end = if agg.is_point() {
                start
            } else {
                remap_position(previous, current, agg.end_position)?
            };
            Ok((agg.id, agg.topology, start, end))
        })
        .collect::<Result<Vec<_>, TopologyError>>()?;

    let mut touched = BTreeSet::new();
    for (id, topology, start, end) in updates {
        network.set_positions(id, start, end);
        touched.insert(topology);
    }
    Ok(touched)
}
