// ===========================================================================
// Topology Model: located objects as ordered path aggregations
// ===========================================================================
use crate::geometry_utils::{GeometryError, POSITION_EPSILON, polyline_length};
use crate::ids::{AggregationId, PathId, TopologyId};
use crate::network::Network;
use geo_types::{Coord, Geometry, LineString, MultiLineString, Point};
use serde::{Deserialize, Serialize};

pub mod geometry;
pub mod placement;
pub mod serialized;


pub use geometry::{compute_geometry, refresh_geometry};
pub use placement::{deserialize, place_by_coordinate, place_by_paths};
pub use serialized::{SerializedTopology, TopologySpec, serialize};

#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("unknown topology {0}")]
    UnknownTopology(TopologyId),
    #[error("topology {0} is deleted")]
    Deleted(TopologyId),
    #[error("unknown path {0}")]
    UnknownPath(PathId),
    #[error("position {0} is not a number in [0, 1]")]
    InvalidPosition(f64),
    #[error("offset {0} is not a finite number")]
    InvalidOffset(f64),
    #[error("a point topology holds exactly one aggregation with equal start and end")]
    InvalidPoint,
    #[error("no path given")]
    NoPaths,
    #[error("no visible path to project the coordinate on")]
    NoPathNearby,
    #[error("invalid topology description: {0}")]
    InvalidSpec(String),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TopologyShape {
    Point,
    Line,
}

/// Shape plus an opaque domain tag (POI, TREK, INTERVENTION...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopologyKind {
    pub shape: TopologyShape,
    pub domain: String,
}

impl TopologyKind {
    pub fn line(domain: impl Into<String>) -> Self {
        Self {
            shape: TopologyShape::Line,
            domain: domain.into(),
        }
    }

    pub fn point(domain: impl Into<String>) -> Self {
        Self {
            shape: TopologyShape::Point,
            domain: domain.into(),
        }
    }

    pub fn is_point(&self) -> bool {
        self.shape == TopologyShape::Point
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum TopologyGeometry {
    #[default]
    Empty,
    Point(Coord),
    Line(LineString),
    /// Aggregations that do not chain into one line.
    MultiLine(MultiLineString),
}

impl TopologyGeometry {
    pub fn is_empty(&self) -> bool {
        matches!(self, TopologyGeometry::Empty)
    }

    pub fn is_multi_part(&self) -> bool {
        matches!(self, TopologyGeometry::MultiLine(_))
    }

    pub fn length(&self) -> f64 {
        match self {
            TopologyGeometry::Empty | TopologyGeometry::Point(_) => 0.0,
            TopologyGeometry::Line(line) => polyline_length(&line.0),
            TopologyGeometry::MultiLine(lines) => {
                lines.0.iter().map(|l| polyline_length(&l.0)).sum()
            }
        }
    }

    /// Vertex runs, one per part.
    pub fn parts(&self) -> Vec<&[Coord]> {
        match self {
            TopologyGeometry::Empty => Vec::new(),
            TopologyGeometry::Point(c) => vec![std::slice::from_ref(c)],
            TopologyGeometry::Line(line) => vec![&line.0],
            TopologyGeometry::MultiLine(lines) => lines.0.iter().map(|l| l.0.as_slice()).collect(),
        }
    }

    pub fn to_geometry(&self) -> Option<Geometry> {
        match self {
            TopologyGeometry::Empty => None,
            TopologyGeometry::Point(c) => Some(Geometry::Point(Point(*c))),
            TopologyGeometry::Line(line) => Some(Geometry::LineString(line.clone())),
            TopologyGeometry::MultiLine(lines) => Some(Geometry::MultiLineString(lines.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub id: TopologyId,
    pub kind: TopologyKind,
    /// Signed perpendicular offset, positive on the left of the path direction.
    pub offset: f64,
    pub geom: TopologyGeometry,
    pub geom_3d: Vec<[f64; 3]>,
    pub length: f64,
    /// Length along the draped, smoothed profile. 0 until a DEM is configured.
    pub length_3d: f64,
    pub ascent: f64,
    pub descent: f64,
    pub min_elevation: f64,
    pub max_elevation: f64,
    /// Soft deletion; a deleted topology is never re-activated.
    pub deleted: bool,
    /// None for domains without a published state.
    pub published: Option<bool>,
}

impl Topology {
    pub fn new(id: TopologyId, kind: TopologyKind) -> Self {
        Self {
            id,
            kind,
            offset: 0.0,
            geom: TopologyGeometry::Empty,
            geom_3d: Vec::new(),
            length: 0.0,
            length_3d: 0.0,
            ascent: 0.0,
            descent: 0.0,
            min_elevation: 0.0,
            max_elevation: 0.0,
            deleted: false,
            published: None,
        }
    }

    pub(crate) fn clear_elevation(&mut self) {
        self.geom_3d.clear();
        self.length_3d = 0.0;
        self.ascent = 0.0;
        self.descent = 0.0;
        self.min_elevation = 0.0;
        self.max_elevation = 0.0;
    }
}

/// One segment of a topology. `start_position > end_position` is a reversed traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathAggregation {
    pub id: AggregationId,
    pub path: PathId,
    pub topology: TopologyId,
    pub start_position: f64,
    pub end_position: f64,
    pub order: u32,
}

impl PathAggregation {
    pub fn is_point(&self) -> bool {
        (self.start_position - self.end_position).abs() <= POSITION_EPSILON
    }

    pub fn is_reversed(&self) -> bool {
        self.start_position > self.end_position + POSITION_EPSILON
    }
}

pub(crate) fn check_position(position: f64) -> Result<f64, TopologyError> {
    if position.is_finite() && (0.0..=1.0).contains(&position) {
        Ok(position)
    } else {
        Err(TopologyError::InvalidPosition(position))
    }
}

/// Register an empty topology of the given kind.
pub fn create(network: &mut Network, kind: TopologyKind) -> TopologyId {
    let id = network.allocate_topology_id();
    network.insert_topology(Topology::new(id, kind));
    id
}

fn live_topology(network: &Network, id: TopologyId) -> Result<&Topology, TopologyError> {
    let topology = network
        .topology(id)
        .ok_or(TopologyError::UnknownTopology(id))?;
    if topology.deleted {
        return Err(TopologyError::Deleted(id));
    }
    Ok(topology)
}

/// Append a segment after the last one. Point topologies take a single
/// aggregation with equal start and end.
pub fn add_path(
    network: &mut Network,
    topology: TopologyId,
    path: PathId,
    start: f64,
    end: f64,
) -> Result<AggregationId, TopologyError> {
    let is_point = live_topology(network, topology)?.kind.is_point();
    if network.path(path).is_none() {
        return Err(TopologyError::UnknownPath(path));
    }
    let start = check_position(start)?;
    let end = check_position(end)?;
    if is_point && (start != end || !network.aggregations_of(topology).is_empty()) {
        return Err(TopologyError::InvalidPoint);
    }
    Ok(network.push_aggregation(topology, path, start, end))
}

pub fn set_offset(
    network: &mut Network,
    topology: TopologyId,
    offset: f64,
) -> Result<(), TopologyError> {
    live_topology(network, topology)?;
    if !offset.is_finite() {
        return Err(TopologyError::InvalidOffset(offset));
    }
    if let Some(topo) = network.topology_mut(topology) {
        topo.offset = offset;
    }
    Ok(())
}
