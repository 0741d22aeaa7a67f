// ===========================================================================
// Path Graph: the edge set of the trail network
// ===========================================================================
//
// Every geometry write goes through this module. Mutations return the list of
// PathEvents they caused; recompute::apply_events turns those into aggregation
// updates inside the same staged edit.
use crate::geometry_utils::{self, GeometryError, polyline_length};
use crate::ids::PathId;
use crate::network::Network;
use geo_types::{Coord, LineString};
use serde::{Deserialize, Serialize};
use tracing::info;

pub mod merge;
pub mod nodes;
pub mod snapping;
pub mod spatial;
pub mod split;


pub use merge::{MergeError, merge_paths, unify_paths};
pub use nodes::{NodeIndex, PathGraphNode};
pub use snapping::{SaveReport, save_path};
pub use split::split_path;

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("unknown path {0}")]
    UnknownPath(PathId),
    #[error("invalid path geometry: {0}")]
    InvalidGeometry(String),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// An edge of the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredPath")]
pub struct Path {
    pub id: PathId,
    geom: LineString,
    length: f64,
    valid: bool,
    /// Draped geometry, refreshed whenever a DEM is available.
    pub geom_3d: Option<Vec<[f64; 3]>>,
    pub visible: bool,
    pub draft: bool,
    pub structure: Option<String>,
    pub source: Option<String>,
    pub stake: Option<String>,
}

/// Serialized form, checked again on load.
#[derive(Deserialize)]
struct StoredPath {
    id: PathId,
    geom: LineString,
    length: f64,
    valid: bool,
    geom_3d: Option<Vec<[f64; 3]>>,
    visible: bool,
    draft: bool,
    structure: Option<String>,
    source: Option<String>,
    stake: Option<String>,
}

impl TryFrom<StoredPath> for Path {
    type Error = GraphError;

    fn try_from(stored: StoredPath) -> Result<Self, Self::Error> {
        validate_geometry(&stored.geom)?;
        Ok(Path {
            id: stored.id,
            geom: stored.geom,
            length: stored.length,
            valid: stored.valid,
            geom_3d: stored.geom_3d,
            visible: stored.visible,
            draft: stored.draft,
            structure: stored.structure,
            source: stored.source,
            stake: stored.stake,
        })
    }
}

/// A path needs at least two finite coordinates and a non-zero length.
pub(crate) fn validate_geometry(geom: &LineString) -> Result<(), GraphError> {
    if geom.0.len() < 2 {
        return Err(GraphError::InvalidGeometry(format!(
            "a path needs at least 2 coordinates, got {}",
            geom.0.len()
        )));
    }
    if geom.0.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(GraphError::InvalidGeometry(
            "coordinates must be finite".to_string(),
        ));
    }
    if polyline_length(&geom.0) <= 0.0 {
        return Err(GraphError::InvalidGeometry(
            "a path must have a non-zero length".to_string(),
        ));
    }
    Ok(())
}

impl Path {
    pub fn new(id: PathId, geom: LineString) -> Result<Self, GraphError> {
        validate_geometry(&geom)?;
        let mut path = Self {
            id,
            geom: LineString::new(Vec::new()),
            length: 0.0,
            valid: true,
            geom_3d: None,
            visible: true,
            draft: false,
            structure: None,
            source: None,
            stake: None,
        };
        path.set_geom(geom);
        Ok(path)
    }

    pub fn geom(&self) -> &LineString {
        &self.geom
    }

    /// Always in sync with the geometry.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// False when the geometry intersects itself.
    pub fn valid(&self) -> bool {
        self.valid
    }

    // Construction and loading both reject geometries with fewer than two coordinates.
    pub fn start(&self) -> Coord {
        self.geom.0[0]
    }

    pub fn end(&self) -> Coord {
        self.geom.0[self.geom.0.len() - 1]
    }

    /// Visible, non-draft paths are the only ones the router uses.
    pub fn is_routable(&self) -> bool {
        self.visible && !self.draft
    }

    pub(crate) fn set_geom(&mut self, geom: LineString) {
        self.length = polyline_length(&geom.0);
        self.valid = geometry_utils::is_simple(&geom);
        self.geom = geom;
        self.geom_3d = None;
    }

    /// Copy of the non-geometric attributes onto a new path (used by splits).
    pub(crate) fn sibling(&self, id: PathId, geom: LineString) -> Result<Self, GraphError> {
        let mut path = Path::new(id, geom)?;
        path.visible = self.visible;
        path.draft = self.draft;
        path.structure = self.structure.clone();
        path.source = self.source.clone();
        path.stake = self.stake.clone();
        Ok(path)
    }
}

/// What the upstream collaborator hands over when a path is created or edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathInput {
    /// None creates a new path.
    #[serde(default)]
    pub id: Option<PathId>,
    pub geom: LineString,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub structure: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub stake: Option<String>,
}

fn default_visible() -> bool {
    true
}

impl PathInput {
    pub fn new(geom: LineString) -> Self {
        Self {
            id: None,
            geom,
            visible: true,
            draft: false,
            structure: None,
            source: None,
            stake: None,
        }
    }

    pub fn with_id(mut self, id: PathId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn draft(mut self, draft: bool) -> Self {
        self.draft = draft;
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }
}

/// One piece of a split path, expressed in the original path's position space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitPiece {
    pub path: PathId,
    pub from: f64,
    pub to: f64,
}

/// How one source path lands on a merged path: `new = offset + scale * old`,
/// with `old` flipped to `1 - old` first when the source was reversed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergedPart {
    pub source: PathId,
    pub offset: f64,
    pub scale: f64,
    pub reversed: bool,
}

impl MergedPart {
    pub fn map(&self, position: f64) -> f64 {
        let local = if self.reversed {
            1.0 - position
        } else {
            position
        };
        (self.offset + self.scale * local).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathEvent {
    /// Both geometries travel with the event so that later events in the same
    /// batch (a split of the same path, say) do not disturb the remapping.
    GeometryChanged {
        path: PathId,
        previous: LineString,
        current: LineString,
    },
    Split {
        original: PathId,
        pieces: Vec<SplitPiece>,
    },
    Merged {
        kept: PathId,
        parts: Vec<MergedPart>,
    },
    Deleted {
        path: PathId,
    },
}

pub fn delete_path(network: &mut Network, id: PathId) -> Result<PathEvent, GraphError> {
    network.remove_path(id).ok_or(GraphError::UnknownPath(id))?;
    info!(path = %id, "path deleted");
    Ok(PathEvent::Deleted { path: id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::line_string;

    #[test]
    fn length_follows_geometry() {
        let mut path = Path::new(
            PathId(1),
            line_string![(x: 0.0, y: 0.0), (x: 3.0, y: 4.0)],
        ).unwrap();
        assert_eq!(path.length(), 5.0);
        assert!(path.valid());
        path.set_geom(line_string![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 0.0),
            (x: 10.0, y: 10.0),
            (x: 5.0, y: -5.0)
        ]);
        assert!(!path.valid());
        assert!(path.length() > 20.0);
    }

    #[test]
    fn degenerate_geometry_is_rejected() {
        for geom in [
            LineString::new(Vec::new()),
            line_string![(x: 4.0, y: 4.0)],
            line_string![(x: 4.0, y: 4.0), (x: 4.0, y: 4.0)],
            line_string![(x: 0.0, y: 0.0), (x: f64::NAN, y: 1.0)],
        ] {
            assert!(matches!(
                Path::new(PathId(1), geom),
                Err(GraphError::InvalidGeometry(_))
            ));
        }

        let path = Path::new(PathId(1), line_string![(x: 1.0, y: 2.0), (x: 5.0, y: 2.0)]).unwrap();
        assert_eq!(path.start(), Coord { x: 1.0, y: 2.0 });
        assert_eq!(path.end(), Coord { x: 5.0, y: 2.0 });

        let mut stored = serde_json::to_value(&path).unwrap();
        assert!(serde_json::from_value::<Path>(stored.clone()).is_ok());
        stored["geom"] = serde_json::json!([]);
        assert!(serde_json::from_value::<Path>(stored).is_err());
    }

    #[test]
    fn merged_part_maps_reversed_positions() {
        let part = MergedPart {
            source: PathId(2),
            offset: 0.25,
            scale: 0.75,
            reversed: true,
        };
        assert!((part.map(1.0) - 0.25).abs() < 1e-12);
        assert!((part.map(0.0) - 1.0).abs() < 1e-12);
    }
}
