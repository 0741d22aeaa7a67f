// Split and merge redistribution of aggregations.
use crate::geometry_utils::POSITION_EPSILON;
use crate::ids::{PathId, TopologyId};
use crate::network::Network;
use crate::path_graph::{MergedPart, SplitPiece};
use std::collections::BTreeSet;
use tracing::debug;

fn local(piece: &SplitPiece, position: f64) -> f64 {
    let span = piece.to - piece.from;
    if span <= 0.0 {
        return 0.0;
    }
    ((position - piece.from) / span).clamp(0.0, 1.0)
}

/// Pieces an aggregation covers, in traversal order, as (path, start, end).
fn project_on_pieces(pieces: &[SplitPiece], start: f64, end: f64) -> Vec<(PathId, f64, f64)> {
    if (start - end).abs() <= POSITION_EPSILON {
        // The earliest piece wins when the point sits on a cut.
        return pieces
            .iter()
            .find(|p| start >= p.from - POSITION_EPSILON && start <= p.to + POSITION_EPSILON)
            .map(|p| {
                let t = local(p, start);
                vec![(p.path, t, t)]
            })
            .unwrap_or_default();
    }

    let (lo, hi) = (start.min(end), start.max(end));
    let mut covered: Vec<(PathId, f64, f64)> = pieces
        .iter()
        .filter(|p| p.to > lo + POSITION_EPSILON && p.from < hi - POSITION_EPSILON)
        .map(|p| (p.path, local(p, lo.max(p.from)), local(p, hi.min(p.to))))
        .collect();
    if start > end {
        covered.reverse();
        for segment in &mut covered {
            std::mem::swap(&mut segment.1, &mut segment.2);
        }
    }
    covered
}

pub(super) fn redistribute_split(
    network: &mut Network,
    original: PathId,
    pieces: &[SplitPiece],
) -> BTreeSet<TopologyId> {
    let plans: Vec<_> = network
        .aggregations_on(original)
        .iter()
        .map(|agg| {
            (
                agg.id,
                agg.topology,
                project_on_pieces(pieces, agg.start_position, agg.end_position),
            )
        })
        .collect();

    let mut touched = BTreeSet::new();
    for (id, topology, replacement) in plans {
        debug!(aggregation = %id, pieces = replacement.len(), "redistributing over split");
        network.splice_aggregation(id, &replacement);
        touched.insert(topology);
    }
    touched
}

pub(super) fn redistribute_merge(
    network: &mut Network,
    kept: PathId,
    parts: &[MergedPart],
) -> BTreeSet<TopologyId> {
    let plans: Vec<_> = parts
        .iter()
        .flat_map(|part| {
            network
                .aggregations_on(part.source)
                .into_iter()
                .map(move |agg| {
                    (
                        agg.id,
                        agg.topology,
                        part.map(agg.start_position),
                        part.map(agg.end_position),
                    )
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let mut touched = BTreeSet::new();
    for (id, topology, start, end) in plans {
        network.reassign_aggregation(id, kept, start, end);
        touched.insert(topology);
    }
    touched
}
