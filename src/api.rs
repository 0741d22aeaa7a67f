// ===========================================================================
// JSON contracts of the HTTP surface, independent of the web framework
// ===========================================================================
use crate::elevation::ElevationError;
use crate::engine::{Engine, EngineError, ElevationTarget};
use crate::ids::{PathId, TopologyId};
use crate::path_graph::{GraphError, MergeError, PathInput};
use crate::topology::{TopologyError, TopologyKind, TopologySpec};
use geo::CoordsIter;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn error(status: u16, message: impl std::fmt::Display) -> Self {
        Self {
            status,
            body: json!({ "error": message.to_string() }),
        }
    }

    fn from_engine_error(error: EngineError) -> Self {
        let status = match &error {
            EngineError::Routing(e) => e.status_code(),
            EngineError::Graph(GraphError::UnknownPath(_))
            | EngineError::Topology(TopologyError::UnknownTopology(_))
            | EngineError::Topology(TopologyError::UnknownPath(_))
            | EngineError::Merge(MergeError::UnknownPath(_)) => 404,
            EngineError::Elevation(ElevationError::NoDem)
            | EngineError::Elevation(ElevationError::InvalidRaster(_))
            | EngineError::Elevation(ElevationError::Io { .. }) => 500,
            _ => 400,
        };
        if status >= 500 {
            warn!(error = %error, "request failed");
        }
        Self::error(status, error)
    }
}

fn parse_body<T: DeserializeOwned>(body: &Value) -> Result<T, ApiResponse> {
    T::deserialize(body).map_err(|e| ApiResponse::error(400, format!("invalid request: {e}")))
}

fn geojson_value(geometry: &geo_types::Geometry) -> Value {
    let geometry = geojson::Geometry::new(geojson::Value::from(geometry));
    serde_json::to_value(geometry).unwrap_or(Value::Null)
}

/// Parse a GeoJSON geometry object into planar coordinates.
fn geometry_coords(value: Value) -> Result<Vec<geo_types::Coord>, ApiResponse> {
    let geometry: geojson::Geometry = serde_json::from_value(value)
        .map_err(|e| ApiResponse::error(400, format!("invalid geometry: {e}")))?;
    let geometry = geo_types::Geometry::<f64>::try_from(geometry)
        .map_err(|e| ApiResponse::error(400, format!("invalid geometry: {e}")))?;
    Ok(geometry.coords_iter().collect())
}

/// `POST /api/route`: `{steps: [{path_id, positionOnPath}...]}`.
pub fn route(engine: &Engine, body: &Value) -> ApiResponse {
    match engine.route_request(body) {
        Ok(route) => {
            let collection = geo_types::Geometry::GeometryCollection(route.geometry());
            ApiResponse::ok(json!({
                "geojson": geojson_value(&collection),
                "serialized": route.serialized(),
            }))
        }
        Err(e) => {
            warn!(error = %e, kind = ?e.kind(), "routing failed");
            ApiResponse::error(e.status_code(), e)
        }
    }
}

/// Exactly one of the three sources.
#[derive(Debug, Deserialize)]
struct ElevationRequest {
    topology: Option<TopologyId>,
    path: Option<PathId>,
    geometry: Option<Value>,
}

impl ElevationRequest {
    fn target(self) -> Result<ElevationTarget, ApiResponse> {
        match (self.topology, self.path, self.geometry) {
            (Some(id), None, None) => Ok(ElevationTarget::Topology(id)),
            (None, Some(id), None) => Ok(ElevationTarget::Path(id)),
            (None, None, Some(geometry)) => Ok(ElevationTarget::Geometry(geometry_coords(geometry)?)),
            _ => Err(ApiResponse::error(
                400,
                "give exactly one of topology, path or geometry",
            )),
        }
    }
}

/// `POST /api/elevation/profile`: `[[distance, x, y, z], ...]`.
pub fn elevation_profile(engine: &Engine, body: &Value) -> ApiResponse {
    let target = match parse_body::<ElevationRequest>(body).and_then(ElevationRequest::target) {
        Ok(target) => target,
        Err(response) => return response,
    };
    match engine.elevation_profile(&target) {
        Ok(profile) => ApiResponse::ok(json!(profile.points)),
        Err(e) => ApiResponse::from_engine_error(e),
    }
}

/// `POST /api/elevation/area`: `{size, resolution, altitudes, center, extent}`.
pub fn elevation_area(engine: &Engine, body: &Value) -> ApiResponse {
    let target = match parse_body::<ElevationRequest>(body).and_then(ElevationRequest::target) {
        Ok(target) => target,
        Err(response) => return response,
    };
    match engine.elevation_area(&target) {
        Ok(area) => ApiResponse::ok(json!(area)),
        Err(e) => ApiResponse::from_engine_error(e),
    }
}

#[derive(Debug, Deserialize)]
struct PlacementRequest {
    kind: TopologyKind,
    topology: TopologySpec,
}

/// `POST /api/topologies`: place from a serialized topology or a lat/lng pair.
pub fn place(engine: &mut Engine, body: &Value) -> ApiResponse {
    let request: PlacementRequest = match parse_body(body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    match engine.place(request.kind, &request.topology) {
        Ok(id) => topology(engine, id),
        Err(e) => ApiResponse::from_engine_error(e),
    }
}

/// `GET /api/topologies/{id}`: serialized form, computed geometry and statistics.
pub fn topology(engine: &Engine, id: TopologyId) -> ApiResponse {
    let Some(topology) = engine.topology(id) else {
        return ApiResponse::error(404, TopologyError::UnknownTopology(id));
    };
    let serialized = match engine.serialize_topology(id) {
        Ok(serialized) => serialized,
        Err(e) => return ApiResponse::from_engine_error(e),
    };
    ApiResponse::ok(json!({
        "id": id,
        "kind": topology.kind,
        "deleted": topology.deleted,
        "serialized": serialized,
        "geojson": topology.geom.to_geometry().as_ref().map(geojson_value),
        "length": topology.length,
        "length_3d": topology.length_3d,
        "ascent": topology.ascent,
        "descent": topology.descent,
        "min_elevation": topology.min_elevation,
        "max_elevation": topology.max_elevation,
    }))
}

#[derive(Debug, Deserialize)]
struct PathRequest {
    id: Option<PathId>,
    geometry: Value,
    #[serde(default)]
    draft: bool,
    #[serde(default = "default_visible")]
    visible: bool,
    #[serde(default)]
    structure: Option<String>,
}

fn default_visible() -> bool {
    true
}

/// `POST /api/paths`: the path edit hook. Creates or updates a path.
pub fn save_path(engine: &mut Engine, body: &Value) -> ApiResponse {
    let request: PathRequest = match parse_body(body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let coords = match geometry_coords(request.geometry) {
        Ok(coords) => coords,
        Err(response) => return response,
    };
    let mut input = PathInput::new(geo_types::LineString::new(coords))
        .draft(request.draft)
        .visible(request.visible);
    input.structure = request.structure;
    if let Some(id) = request.id {
        input = input.with_id(id);
    }
    match engine.on_path_saved(input) {
        Ok(outcome) => ApiResponse::ok(json!({
            "id": outcome.report.path_id,
            "created": outcome.report.created,
            "split_paths": outcome.report.split_paths,
            "overlaps": outcome.report.overlaps,
            "touched_topologies": outcome.recompute.touched,
            "deleted_topologies": outcome.recompute.deleted,
        })),
        Err(e) => ApiResponse::from_engine_error(e),
    }
}

/// `DELETE /api/paths/{id}`
pub fn delete_path(engine: &mut Engine, id: PathId) -> ApiResponse {
    match engine.on_path_deleted(id) {
        Ok(outcome) => ApiResponse::ok(json!({
            "touched_topologies": outcome.touched,
            "deleted_topologies": outcome.deleted,
        })),
        Err(e) => ApiResponse::from_engine_error(e),
    }
}

#[derive(Debug, Deserialize)]
struct MergeRequest {
    paths: Vec<PathId>,
}

/// `POST /api/paths/merge`
pub fn merge_paths(engine: &mut Engine, body: &Value) -> ApiResponse {
    let request: MergeRequest = match parse_body(body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    match engine.merge_paths(&request.paths) {
        Ok((kept, outcome)) => ApiResponse::ok(json!({
            "id": kept,
            "touched_topologies": outcome.touched,
        })),
        Err(e) => ApiResponse::from_engine_error(e),
    }
}

/// `POST /api/topologies/reorder`: the global sweep with its per-topology failures.
pub fn reorder(engine: &mut Engine) -> ApiResponse {
    let report = engine.reorder_topologies();
    let failures: Vec<Value> = report
        .failures
        .iter()
        .map(|f| json!({ "topology": f.topology, "reason": f.reason.to_string() }))
        .collect();
    ApiResponse::ok(json!({
        "examined": report.examined,
        "reordered": report.reordered,
        "failures": failures,
    }))
}
