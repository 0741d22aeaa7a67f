// ===========================================================================
// Merge / unify two paths into one
// ===========================================================================
//
// The first path keeps its id and direction; the second is reversed when needed
// and removed. All checks run before the network is touched.
use super::{MergedPart, Path, PathEvent};
use crate::geometry_utils::{concat_coords, coords_close, distance, polyline_length};
use crate::ids::PathId;
use crate::network::Network;
use geo_types::{Coord, LineString};
use tracing::info;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MergeError {
    #[error("exactly two paths are required, got {0}")]
    WrongPathCount(usize),
    #[error("cannot merge path {0} with itself")]
    SamePath(PathId),
    #[error("unknown path {0}")]
    UnknownPath(PathId),
    #[error("cannot merge a draft path with a non-draft path")]
    DraftMismatch,
    #[error("paths {0} and {1} belong to different structures")]
    StructureMismatch(PathId, PathId),
    #[error("paths {0} and {1} do not share an endpoint")]
    NotTouching(PathId, PathId),
    #[error("paths {0} and {1} touch at both ends")]
    TouchAtBothEnds(PathId, PathId),
    #[error("path {0} also ends at the junction")]
    BranchAtJunction(PathId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    Start,
    End,
}

fn end_coord(path: &Path, end: End) -> Coord {
    match end {
        End::Start => path.start(),
        End::End => path.end(),
    }
}

const ENDS: [(End, End); 4] = [
    (End::End, End::Start),
    (End::End, End::End),
    (End::Start, End::Start),
    (End::Start, End::End),
];

fn lookup(network: &Network, a: PathId, b: PathId) -> Result<(Path, Path), MergeError> {
    if a == b {
        return Err(MergeError::SamePath(a));
    }
    let pa = network.path(a).cloned().ok_or(MergeError::UnknownPath(a))?;
    let pb = network.path(b).cloned().ok_or(MergeError::UnknownPath(b))?;
    if pa.draft != pb.draft {
        return Err(MergeError::DraftMismatch);
    }
    if pa.structure != pb.structure {
        return Err(MergeError::StructureMismatch(a, b));
    }
    Ok((pa, pb))
}

/// Merge two paths sharing exactly one endpoint, with no third path at the junction.
pub fn merge_paths(
    network: &mut Network,
    ids: &[PathId],
    tolerance: f64,
) -> Result<(PathId, PathEvent), MergeError> {
    let &[a, b] = ids else {
        return Err(MergeError::WrongPathCount(ids.len()));
    };
    let (pa, pb) = lookup(network, a, b)?;

    let touching: Vec<(End, End)> = ENDS
        .iter()
        .copied()
        .filter(|&(ea, eb)| coords_close(end_coord(&pa, ea), end_coord(&pb, eb), tolerance))
        .collect();
    let (ea, eb) = match touching.as_slice() {
        [] => return Err(MergeError::NotTouching(a, b)),
        [pair] => *pair,
        _ => return Err(MergeError::TouchAtBothEnds(a, b)),
    };

    let junction = end_coord(&pa, ea);
    if let Some(third) = network.paths().find(|p| {
        p.id != a
            && p.id != b
            && (coords_close(p.start(), junction, tolerance)
                || coords_close(p.end(), junction, tolerance))
    }) {
        return Err(MergeError::BranchAtJunction(third.id));
    }

    Ok(join(network, pa, pb, ea, eb))
}

/// Concatenate two paths at their closest pair of endpoints, which must lie
/// within `tolerance`. Unlike `merge_paths` a branch at the junction is allowed.
pub fn unify_paths(
    network: &mut Network,
    a: PathId,
    b: PathId,
    tolerance: f64,
) -> Result<(PathId, PathEvent), MergeError> {
    let (pa, pb) = lookup(network, a, b)?;
    let mut best: Option<(f64, End, End)> = None;
    for (ea, eb) in ENDS {
        let d = distance(end_coord(&pa, ea), end_coord(&pb, eb));
        if best.is_none_or(|(bd, ..)| d < bd) {
            best = Some((d, ea, eb));
        }
    }
    match best {
        Some((d, ea, eb)) if d <= tolerance => Ok(join(network, pa, pb, ea, eb)),
        _ => Err(MergeError::NotTouching(a, b)),
    }
}

fn join(network: &mut Network, pa: Path, pb: Path, ea: End, eb: End) -> (PathId, PathEvent) {
    let a_coords = pa.geom().0.clone();
    let mut b_coords = pb.geom().0.clone();
    // B is reversed whenever it meets A with the same kind of endpoint.
    let b_reversed = ea == eb;
    if b_reversed {
        b_coords.reverse();
    }
    let a_first = ea == End::End;

    let mut coords: Vec<Coord> = Vec::with_capacity(a_coords.len() + b_coords.len());
    if a_first {
        concat_coords(&mut coords, &a_coords, 0.0);
        concat_coords(&mut coords, &b_coords, 0.0);
    } else {
        concat_coords(&mut coords, &b_coords, 0.0);
        concat_coords(&mut coords, &a_coords, 0.0);
    }

    let total = polyline_length(&coords);
    let (la, lb) = (pa.length(), pb.length());
    let ratio = |len: f64| if total > 0.0 { len / total } else { 0.0 };
    let (a_offset, b_offset) = if a_first {
        (0.0, 1.0 - ratio(lb))
    } else {
        (1.0 - ratio(la), 0.0)
    };
    let parts = vec![
        MergedPart {
            source: pa.id,
            offset: a_offset,
            scale: ratio(la),
            reversed: false,
        },
        MergedPart {
            source: pb.id,
            offset: b_offset,
            scale: ratio(lb),
            reversed: b_reversed,
        },
    ];

    network.remove_path(pb.id);
    if let Some(kept) = network.path_mut(pa.id) {
        kept.set_geom(LineString::new(coords));
    }
    info!(kept = %pa.id, removed = %pb.id, length = total, "paths merged");
    (
        pa.id,
        PathEvent::Merged {
            kept: pa.id,
            parts,
        },
    )
}
