// ===========================================================================
// Path save: validation, endpoint snapping, intersection splitting, overlaps
// ===========================================================================
use super::spatial::SegmentIndex;
use super::split::split_path;
use super::{GraphError, Path, PathEvent, PathInput, validate_geometry};
use crate::config::EngineConfig;
use crate::geometry_utils::{
    self, collinear_overlap_length, coords_close, distance,
};
use crate::ids::PathId;
use crate::network::Network;
use ahash::AHashMap;
use geo_types::{Coord, LineString};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// What a save did to the network besides storing the path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveReport {
    pub path_id: PathId,
    pub created: bool,
    /// Endpoints moved onto an existing endpoint or path interior.
    pub snapped_endpoints: usize,
    /// Every path that was cut, with its resulting pieces (first piece keeps the id).
    pub split_paths: Vec<(PathId, Vec<PathId>)>,
    /// Paths sharing a collinear stretch longer than the tolerance with the saved path.
    pub overlaps: Vec<PathId>,
}

enum Snap {
    Endpoint(Coord),
    Interior {
        target: PathId,
        position: f64,
        coord: Coord,
    },
}

/// Find where a free endpoint should land on the rest of the network.
fn snap_target(network: &Network, index: &SegmentIndex, coord: Coord, tolerance: f64) -> Option<Snap> {
    // An endpoint within tolerance implies one of its segments is too.
    let hits = index.paths_within(coord, tolerance);
    let nearest_end = hits
        .iter()
        .filter_map(|(id, _)| network.path(*id))
        .flat_map(|p| [p.start(), p.end()])
        .map(|c| (distance(c, coord), c))
        .filter(|(d, _)| *d <= tolerance)
        .min_by(|a, b| a.0.total_cmp(&b.0));
    if let Some((_, c)) = nearest_end {
        return Some(Snap::Endpoint(c));
    }

    let (target, _) = hits.into_iter().next()?;
    let path = network.path(target)?;
    let reference = geometry_utils::locate_point(path.geom(), coord).ok()?;
    Some(Snap::Interior {
        target,
        position: reference.position,
        coord: reference.projected,
    })
}

/// Store a created or edited path and fold it into the network.
///
/// Returns the report and the events the recomputation layer must apply, in order.
pub fn save_path(
    network: &mut Network,
    input: PathInput,
    config: &EngineConfig,
) -> Result<(SaveReport, Vec<PathEvent>), GraphError> {
    validate_geometry(&input.geom)?;
    let tolerance = config.tolerance;

    let existing = input.id.and_then(|id| network.path(id).cloned());
    let id = match input.id {
        Some(id) => id,
        None => network.allocate_path_id(),
    };
    let mut report = SaveReport {
        path_id: id,
        created: existing.is_none(),
        ..Default::default()
    };
    let mut events = Vec::new();
    let index = SegmentIndex::build(network.paths().filter(|p| p.id != id));

    // Snap both endpoints, remembering the interior cuts they require.
    let mut coords = input.geom.0.clone();
    let mut interior_cuts: BTreeMap<PathId, Vec<f64>> = BTreeMap::new();
    let last = coords.len() - 1;
    for slot in [0, last] {
        match snap_target(network, &index, coords[slot], tolerance) {
            Some(Snap::Endpoint(c)) => {
                if c != coords[slot] {
                    debug!(path = %id, "endpoint snapped to existing node");
                }
                coords[slot] = c;
                report.snapped_endpoints += 1;
            }
            Some(Snap::Interior {
                target,
                position,
                coord,
            }) => {
                debug!(path = %id, %target, position, "endpoint snapped onto path interior");
                coords[slot] = coord;
                interior_cuts.entry(target).or_default().push(position);
                report.snapped_endpoints += 1;
            }
            None => {}
        }
    }
    coords.dedup();
    let geom = LineString::new(coords);
    validate_geometry(&geom)?;

    match existing {
        Some(previous) => {
            if previous.geom() != &geom {
                events.push(PathEvent::GeometryChanged {
                    path: id,
                    previous: previous.geom().clone(),
                    current: geom.clone(),
                });
            }
            if let Some(path) = network.path_mut(id) {
                if path.geom() != &geom {
                    path.set_geom(geom.clone());
                }
                apply_attributes(path, &input);
            }
        }
        None => {
            let mut path = Path::new(id, geom.clone())?;
            apply_attributes(&mut path, &input);
            network.insert_path(path);
            info!(path = %id, "path created");
        }
    }

    // Only paths whose segments reach the saved geometry's box can touch it.
    let nearby = index.paths_near_line(&geom, tolerance);

    // Intersections with the interior of other paths cut both sides.
    let mut own_cuts = Vec::new();
    if config.split_at_intersections {
        for other in nearby.iter().filter_map(|other| network.path(*other)) {
            for point in geometry_utils::intersection_points(&geom, other.geom()) {
                let at_other_end = coords_close(point, other.start(), tolerance)
                    || coords_close(point, other.end(), tolerance);
                let at_own_end = coords_close(point, geom.0[0], tolerance)
                    || coords_close(point, geom.0[geom.0.len() - 1], tolerance);
                if !at_other_end {
                    let reference = geometry_utils::locate_point(other.geom(), point)?;
                    interior_cuts
                        .entry(other.id)
                        .or_default()
                        .push(reference.position);
                }
                if !at_own_end {
                    own_cuts.push(geometry_utils::locate_point(&geom, point)?.position);
                }
            }
        }
    }

    for (target, cuts) in interior_cuts {
        let (pieces, event) = split_path(network, target, &cuts, tolerance)?;
        if let Some(event) = event {
            events.push(event);
            report.split_paths.push((target, pieces));
        }
    }
    let mut own_pieces = vec![id];
    if !own_cuts.is_empty() {
        let (pieces, event) = split_path(network, id, &own_cuts, tolerance)?;
        if let Some(event) = event {
            events.push(event);
            report.split_paths.push((id, pieces.clone()));
        }
        own_pieces = pieces;
    }

    let mut candidates = nearby;
    for (target, pieces) in &report.split_paths {
        if candidates.contains(target) {
            candidates.extend(pieces.iter().copied());
        }
    }
    report.overlaps = find_overlaps(network, &own_pieces, &candidates, tolerance);
    if !report.overlaps.is_empty() {
        warn!(path = %id, overlaps = ?report.overlaps, "path overlaps existing paths");
    }
    Ok((report, events))
}

fn apply_attributes(path: &mut Path, input: &PathInput) {
    path.visible = input.visible;
    path.draft = input.draft;
    path.structure = input.structure.clone();
    path.source = input.source.clone();
    path.stake = input.stake.clone();
}

fn find_overlaps(
    network: &Network,
    pieces: &[PathId],
    candidates: &BTreeSet<PathId>,
    tolerance: f64,
) -> Vec<PathId> {
    let mut shared: AHashMap<PathId, f64> = AHashMap::new();
    for piece in pieces.iter().filter_map(|id| network.path(*id)) {
        for other in candidates
            .iter()
            .filter(|other| !pieces.contains(other))
            .filter_map(|other| network.path(*other))
        {
            let overlap = collinear_overlap_length(piece.geom(), other.geom());
            if overlap > 0.0 {
                *shared.entry(other.id).or_default() += overlap;
            }
        }
    }
    let mut overlaps: Vec<PathId> = shared
        .into_iter()
        .filter(|(_, len)| *len > tolerance)
        .map(|(id, _)| id)
        .collect();
    overlaps.sort();
    overlaps
}
