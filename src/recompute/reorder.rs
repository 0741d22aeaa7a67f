// ===========================================================================
// Reorder sweep: restore traversal order of every line topology
// ===========================================================================
//
// Plans are computed in parallel over an immutable network, then applied in
// topology id order. A topology whose segments cannot be chained is reported
// and left untouched.
use crate::geometry_utils::{coords_close, point_at_position};
use crate::ids::{AggregationId, PathId, TopologyId};
use crate::network::Network;
use crate::topology::refresh_geometry;
use geo_types::Coord;
use rayon::prelude::*;
use tracing::{info, warn};

/// Upper bound on DFS steps per topology.
const MAX_SEARCH_STEPS: usize = 200_000;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReorderIssue {
    #[error("aggregations form a disconnected line")]
    Disconnected,
    #[error("aggregation references missing path {0}")]
    MissingPath(PathId),
    #[error("no ordering found within the search budget")]
    SearchExhausted,
    #[error("{0}")]
    Geometry(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReorderFailure {
    pub topology: TopologyId,
    pub reason: ReorderIssue,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReorderReport {
    pub examined: usize,
    pub reordered: Vec<TopologyId>,
    pub failures: Vec<ReorderFailure>,
}

enum Plan {
    Unchanged,
    Reorder(Vec<AggregationId>),
}

pub fn reorder_topologies(network: &mut Network, tolerance: f64) -> ReorderReport {
    let candidates: Vec<TopologyId> = network
        .topologies()
        .filter(|t| !t.deleted && !t.kind.is_point())
        .map(|t| t.id)
        .collect();

    let shared: &Network = network;
    let plans: Vec<(TopologyId, Result<Plan, ReorderIssue>)> = candidates
        .par_iter()
        .map(|id| (*id, plan_topology(shared, *id, tolerance)))
        .collect();

    let mut report = ReorderReport {
        examined: plans.len(),
        ..Default::default()
    };
    for (id, plan) in plans {
        match plan {
            Ok(Plan::Unchanged) => {}
            Ok(Plan::Reorder(sequence)) => {
                network.set_order(&sequence);
                if let Err(e) = refresh_geometry(network, id, tolerance) {
                    report.failures.push(ReorderFailure {
                        topology: id,
                        reason: ReorderIssue::Geometry(e.to_string()),
                    });
                    continue;
                }
                report.reordered.push(id);
            }
            Err(reason) => {
                warn!(topology = %id, %reason, "topology left as is");
                report.failures.push(ReorderFailure {
                    topology: id,
                    reason,
                });
            }
        }
    }
    info!(
        examined = report.examined,
        reordered = report.reordered.len(),
        failures = report.failures.len(),
        "reorder sweep finished"
    );
    report
}

fn plan_topology(network: &Network, id: TopologyId, tolerance: f64) -> Result<Plan, ReorderIssue> {
    let aggregations = network.aggregations_of(id);
    let dense = aggregations
        .iter()
        .enumerate()
        .all(|(i, a)| a.order == i as u32);
    if aggregations.len() < 2 {
        return Ok(if dense {
            Plan::Unchanged
        } else {
            Plan::Reorder(aggregations.iter().map(|a| a.id).collect())
        });
    }

    let mut ends: Vec<(Coord, Coord)> = Vec::with_capacity(aggregations.len());
    for agg in &aggregations {
        let path = network
            .path(agg.path)
            .ok_or(ReorderIssue::MissingPath(agg.path))?;
        let start = point_at_position(path.geom(), agg.start_position)
            .map_err(|e| ReorderIssue::Geometry(e.to_string()))?;
        let end = point_at_position(path.geom(), agg.end_position)
            .map_err(|e| ReorderIssue::Geometry(e.to_string()))?;
        ends.push((start, end));
    }

    let chained = ends
        .windows(2)
        .all(|w| coords_close(w[0].1, w[1].0, tolerance));
    if chained {
        return Ok(if dense {
            Plan::Unchanged
        } else {
            Plan::Reorder(aggregations.iter().map(|a| a.id).collect())
        });
    }

    let order = find_chain(&ends, tolerance)?;
    Ok(Plan::Reorder(
        order.into_iter().map(|i| aggregations[i].id).collect(),
    ))
}

/// Depth-first search for an ordering where each segment starts where the
/// previous one ends. Free starts are tried first, ties follow the current order.
fn find_chain(ends: &[(Coord, Coord)], tolerance: f64) -> Result<Vec<usize>, ReorderIssue> {
    let n = ends.len();
    let successors: Vec<Vec<usize>> = (0..n)
        .map(|i| {
            (0..n)
                .filter(|&j| j != i && coords_close(ends[i].1, ends[j].0, tolerance))
                .collect()
        })
        .collect();
    let is_free = |i: usize| !successors.iter().enumerate().any(|(k, s)| k != i && s.contains(&i));

    let mut starts: Vec<usize> = (0..n).filter(|&i| is_free(i)).collect();
    starts.extend((0..n).filter(|&i| !is_free(i)));

    let mut budget = MAX_SEARCH_STEPS;
    let mut visited = vec![false; n];
    let mut chain = Vec::with_capacity(n);
    for start in starts {
        visited[start] = true;
        chain.push(start);
        if extend(&successors, &mut visited, &mut chain, &mut budget) {
            return Ok(chain);
        }
        chain.pop();
        visited[start] = false;
        if budget == 0 {
            return Err(ReorderIssue::SearchExhausted);
        }
    }
    Err(ReorderIssue::Disconnected)
}

fn extend(
    successors: &[Vec<usize>],
    visited: &mut [bool],
    chain: &mut Vec<usize>,
    budget: &mut usize,
) -> bool {
    if chain.len() == visited.len() {
        return true;
    }
    if *budget == 0 {
        return false;
    }
    *budget -= 1;
    let Some(&current) = chain.last() else {
        return false;
    };
    for &next in &successors[current] {
        if visited[next] {
            continue;
        }
        visited[next] = true;
        chain.push(next);
        if extend(successors, visited, chain, budget) {
            return true;
        }
        chain.pop();
        visited[next] = false;
    }
    false
}
