use crate::ids::{PathId, TopologyId};
use crate::network::Network;
use crate::topology::TopologyGeometry;
use std::collections::BTreeSet;
use tracing::info;

/// Drop the aggregations of a removed path. Topologies left without any
/// aggregation are soft-deleted and unpublished.
///
/// Returns (topologies that lost segments, topologies deleted).
pub(super) fn cascade_delete(
    network: &mut Network,
    path: PathId,
) -> (BTreeSet<TopologyId>, BTreeSet<TopologyId>) {
    let removed: Vec<_> = network
        .aggregations_on(path)
        .iter()
        .map(|a| (a.id, a.topology))
        .collect();
    let mut touched = BTreeSet::new();
    for (id, topology) in removed {
        network.remove_aggregation(id);
        touched.insert(topology);
    }

    let mut deleted = BTreeSet::new();
    for id in &touched {
        if !network.aggregations_of(*id).is_empty() {
            continue;
        }
        if let Some(topology) = network.topology_mut(*id) {
            topology.deleted = true;
            topology.geom = TopologyGeometry::Empty;
            topology.length = 0.0;
            topology.clear_elevation();
            if topology.published.is_some() {
                topology.published = Some(false);
            }
            info!(topology = %id, %path, "topology lost its last path, marked deleted");
        }
        deleted.insert(*id);
    }
    (touched, deleted)
}
