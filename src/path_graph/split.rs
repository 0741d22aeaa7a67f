use super::{GraphError, PathEvent, SplitPiece};
use crate::geometry_utils::{self, sub_line};
use crate::ids::PathId;
use crate::network::Network;
use tracing::{debug, info};

/// Cut a path at fractional positions. The first piece keeps the original id,
/// the following pieces get fresh ids and inherit the path attributes.
///
/// Cuts closer than `tolerance` (in length units) to an end of the path or to a
/// previous cut are dropped. Returns the ids of the resulting pieces in order,
/// and a `Split` event when the path was actually cut.
pub fn split_path(
    network: &mut Network,
    id: PathId,
    positions: &[f64],
    tolerance: f64,
) -> Result<(Vec<PathId>, Option<PathEvent>), GraphError> {
    let path = network.path(id).ok_or(GraphError::UnknownPath(id))?;
    let length = path.length();
    let geom = path.geom().clone();

    let mut cuts: Vec<f64> = vec![0.0];
    for t in geometry_utils::split_positions(positions)? {
        let last = cuts[cuts.len() - 1];
        if (t - last) * length > tolerance && (1.0 - t) * length > tolerance {
            cuts.push(t);
        }
    }
    cuts.push(1.0);

    if cuts.len() == 2 {
        debug!(path = %id, "no cut left after tolerance filtering");
        return Ok((vec![id], None));
    }

    let mut pieces = Vec::with_capacity(cuts.len() - 1);
    let mut ids = Vec::with_capacity(cuts.len() - 1);
    let template = network.path(id).cloned().ok_or(GraphError::UnknownPath(id))?;
    for (i, w) in cuts.windows(2).enumerate() {
        let piece_geom = sub_line(&geom, w[0], w[1])?;
        let piece_id = if i == 0 {
            if let Some(original) = network.path_mut(id) {
                original.set_geom(piece_geom);
            }
            id
        } else {
            let new_id = network.allocate_path_id();
            network.insert_path(template.sibling(new_id, piece_geom)?);
            new_id
        };
        ids.push(piece_id);
        pieces.push(SplitPiece {
            path: piece_id,
            from: w[0],
            to: w[1],
        });
    }

    info!(path = %id, pieces = ids.len(), "path split");
    Ok((
        ids,
        Some(PathEvent::Split {
            original: id,
            pieces,
        }),
    ))
}
