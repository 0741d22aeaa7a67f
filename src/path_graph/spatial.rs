// Segment R-tree over path geometries, for nearest-path lookups.
use crate::geometry_utils::{self, LinearReference};
use crate::ids::PathId;
use crate::network::Network;
use crate::path_graph::Path;
use geo::BoundingRect;
use geo_types::{Coord, LineString};
use std::collections::BTreeSet;
use rstar::primitives::{GeomWithData, Line};
use rstar::{AABB, PointDistance, RTree};

pub struct SegmentIndex {
    tree: RTree<GeomWithData<Line<[f64; 2]>, PathId>>,
}

impl SegmentIndex {
    pub fn build<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Self {
        let segments = paths
            .into_iter()
            .flat_map(|path| {
                path.geom().lines().map(move |l| {
                    GeomWithData::new(
                        Line::new([l.start.x, l.start.y], [l.end.x, l.end.y]),
                        path.id,
                    )
                })
            })
            .collect();
        Self {
            tree: RTree::bulk_load(segments),
        }
    }

    /// Paths with a segment within `radius` of the coordinate, nearest first.
    pub fn paths_within(&self, coord: Coord, radius: f64) -> Vec<(PathId, f64)> {
        let query = [coord.x, coord.y];
        let mut hits: Vec<(PathId, f64)> = Vec::new();
        for seg in self.tree.locate_within_distance(query, radius * radius) {
            let d = seg.geom().distance_2(&query).sqrt();
            match hits.iter_mut().find(|(id, _)| *id == seg.data) {
                Some(hit) => hit.1 = hit.1.min(d),
                None => hits.push((seg.data, d)),
            }
        }
        hits.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        hits
    }

    /// Paths with a segment whose bounding box meets the box around the line, grown by `margin`.
    pub fn paths_near_line(&self, line: &LineString, margin: f64) -> BTreeSet<PathId> {
        let Some(bounds) = line.bounding_rect() else {
            return BTreeSet::new();
        };
        let envelope = AABB::from_corners(
            [bounds.min().x - margin, bounds.min().y - margin],
            [bounds.max().x + margin, bounds.max().y + margin],
        );
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|seg| seg.data)
            .collect()
    }

    pub fn nearest_path(&self, coord: Coord) -> Option<PathId> {
        // Several segments can tie; take the lowest path id among the closest.
        let query = [coord.x, coord.y];
        let mut iter = self.tree.nearest_neighbor_iter_with_distance_2(&query);
        let (first, best) = iter.next()?;
        let mut winner = first.data;
        for (seg, d2) in iter {
            if d2 > best {
                break;
            }
            winner = winner.min(seg.data);
        }
        Some(winner)
    }
}

/// Project a coordinate onto the closest path accepted by `filter`.
pub fn closest_path(
    network: &Network,
    coord: Coord,
    filter: impl Fn(&Path) -> bool,
) -> Option<(PathId, LinearReference)> {
    let index = SegmentIndex::build(network.paths().filter(|p| filter(p)));
    let id = index.nearest_path(coord)?;
    let path = network.path(id)?;
    let reference = geometry_utils::locate_point(path.geom(), coord).ok()?;
    Some((id, reference))
}
