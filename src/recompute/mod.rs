// ===========================================================================
// Topology Recomputation: keep aggregations valid across path edits
// ===========================================================================
//
// Events are applied in the order the path graph produced them. Each handler
// only rewrites aggregations; geometry caches of every touched topology are
// refreshed once at the end.
use crate::ids::TopologyId;
use crate::network::Network;
use crate::path_graph::PathEvent;
use crate::topology::{TopologyError, refresh_geometry};
use std::collections::BTreeSet;
use tracing::debug;

mod cascade;
mod redistribute;
mod remap;
pub mod reorder;

#[cfg(test)]
mod recompute_tests;

pub use reorder::{ReorderFailure, ReorderReport, reorder_topologies};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecomputeOutcome {
    /// Live topologies whose aggregations or geometry changed.
    pub touched: BTreeSet<TopologyId>,
    /// Topologies that lost their last supporting path in this batch.
    pub deleted: BTreeSet<TopologyId>,
}

pub fn apply_events(
    network: &mut Network,
    events: &[PathEvent],
    tolerance: f64,
) -> Result<RecomputeOutcome, TopologyError> {
    let mut outcome = RecomputeOutcome::default();
    for event in events {
        match event {
            PathEvent::GeometryChanged {
                path,
                previous,
                current,
            } => {
                outcome
                    .touched
                    .extend(remap::remap_path(network, *path, previous, current)?);
            }
            PathEvent::Split { original, pieces } => {
                outcome
                    .touched
                    .extend(redistribute::redistribute_split(network, *original, pieces));
            }
            PathEvent::Merged { kept, parts } => {
                outcome
                    .touched
                    .extend(redistribute::redistribute_merge(network, *kept, parts));
            }
            PathEvent::Deleted { path } => {
                let (touched, deleted) = cascade::cascade_delete(network, *path);
                outcome.touched.extend(touched);
                outcome.deleted.extend(deleted);
            }
        }
    }

    outcome.touched.retain(|id| !outcome.deleted.contains(id));
    for id in &outcome.touched {
        network.renumber(*id);
        refresh_geometry(network, *id, tolerance)?;
    }
    debug!(
        events = events.len(),
        touched = outcome.touched.len(),
        deleted = outcome.deleted.len(),
        "recomputed topologies"
    );
    Ok(outcome)
}
