// ===========================================================================
// Network persistence (bincode) and GeoJSON interchange
// ===========================================================================
use crate::engine::{Engine, EngineError};
use crate::ids::PathId;
use crate::network::Network;
use crate::path_graph::PathInput;
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject};
use serde_json::{Value, json};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("could not access '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not encode network: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("could not decode network: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    #[error("invalid GeoJSON: {0}")]
    GeoJson(#[from] geojson::Error),
    #[error("expected a FeatureCollection of LineStrings")]
    NotAFeatureCollection,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SnapshotError + '_ {
    move |source| SnapshotError::Io {
        path: path.display().to_string(),
        source,
    }
}

pub fn write_network(network: &Network, writer: &mut impl Write) -> Result<usize, SnapshotError> {
    let config = bincode::config::legacy();
    Ok(bincode::serde::encode_into_std_write(network, writer, config)?)
}

pub fn read_network(reader: &mut impl Read) -> Result<Network, SnapshotError> {
    let config = bincode::config::legacy();
    Ok(bincode::serde::decode_from_std_read(reader, config)?)
}

/// Write through a temporary file so a crash never leaves a truncated snapshot.
pub fn save_network(network: &Network, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
    let path = path.as_ref();
    let temp = path.with_extension("tmp");
    let file = File::create(&temp).map_err(io_error(&temp))?;
    let mut writer = BufWriter::new(file);
    let bytes = write_network(network, &mut writer)?;
    writer.flush().map_err(io_error(&temp))?;
    std::fs::rename(&temp, path).map_err(io_error(path))?;
    info!(path = %path.display(), bytes, paths = network.path_count(), "network saved");
    Ok(())
}

pub fn load_network(path: impl AsRef<Path>) -> Result<Network, SnapshotError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(io_error(path))?;
    let network = read_network(&mut BufReader::new(file))?;
    info!(path = %path.display(), paths = network.path_count(), "network loaded");
    Ok(network)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub imported: Vec<PathId>,
    /// Index of the feature in the collection and why it was not imported.
    pub failures: Vec<(usize, String)>,
}

fn property_bool(feature: &Feature, key: &str) -> Option<bool> {
    feature.property(key).and_then(Value::as_bool)
}

fn feature_path_id(feature: &Feature) -> Option<PathId> {
    let from_property = feature.property("id").and_then(Value::as_u64);
    let from_feature = match &feature.id {
        Some(geojson::feature::Id::Number(n)) => n.as_u64(),
        Some(geojson::feature::Id::String(s)) => s.parse().ok(),
        None => None,
    };
    from_property.or(from_feature).map(PathId)
}

fn feature_input(feature: &Feature) -> Result<PathInput, String> {
    let geometry = feature
        .geometry
        .as_ref()
        .ok_or_else(|| "feature has no geometry".to_string())?;
    let line = geo_types::LineString::<f64>::try_from(geometry.value.clone())
        .map_err(|e| e.to_string())?;
    let mut input = PathInput::new(line)
        .draft(property_bool(feature, "draft").unwrap_or(false))
        .visible(property_bool(feature, "visible").unwrap_or(true));
    input.structure = feature
        .property("structure")
        .and_then(Value::as_str)
        .map(str::to_string);
    if let Some(id) = feature_path_id(feature) {
        input = input.with_id(id);
    }
    Ok(input)
}

/// Save every LineString feature through the path edit hook, in collection order.
/// A feature that fails is reported and the import goes on.
pub fn import_paths(engine: &mut Engine, source: &str) -> Result<ImportReport, SnapshotError> {
    let GeoJson::FeatureCollection(collection) = source.parse::<GeoJson>()? else {
        return Err(SnapshotError::NotAFeatureCollection);
    };
    let mut report = ImportReport::default();
    for (index, feature) in collection.features.iter().enumerate() {
        let saved = feature_input(feature).and_then(|input| {
            engine
                .on_path_saved(input)
                .map_err(|e: EngineError| e.to_string())
        });
        match saved {
            Ok(outcome) => report.imported.push(outcome.report.path_id),
            Err(reason) => {
                warn!(index, %reason, "skipping feature");
                report.failures.push((index, reason));
            }
        }
    }
    info!(
        imported = report.imported.len(),
        failed = report.failures.len(),
        "paths imported"
    );
    Ok(report)
}

/// Live topologies with their computed geometry and serialized form.
pub fn export_topologies(network: &Network) -> FeatureCollection {
    let features = network
        .topologies()
        .filter(|t| !t.deleted)
        .map(|topology| {
            let serialized = crate::topology::serialize(network, topology.id)
                .ok()
                .and_then(|s| serde_json::to_value(s).ok())
                .unwrap_or(Value::Null);
            let mut properties = JsonObject::new();
            properties.insert("shape".into(), json!(topology.kind.shape));
            properties.insert("domain".into(), json!(topology.kind.domain));
            properties.insert("offset".into(), json!(topology.offset));
            properties.insert("length".into(), json!(topology.length));
            properties.insert("ascent".into(), json!(topology.ascent));
            properties.insert("descent".into(), json!(topology.descent));
            properties.insert("min_elevation".into(), json!(topology.min_elevation));
            properties.insert("max_elevation".into(), json!(topology.max_elevation));
            properties.insert("serialized".into(), serialized);
            Feature {
                bbox: None,
                geometry: topology
                    .geom
                    .to_geometry()
                    .map(|g| geojson::Geometry::new(geojson::Value::from(&g))),
                id: Some(geojson::feature::Id::Number(topology.id.0.into())),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::topology::{SerializedTopology, TopologyKind};

    const PATHS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"id": 10},
             "geometry": {"type": "LineString", "coordinates": [[0, 0], [10, 0]]}},
            {"type": "Feature", "properties": {"draft": true, "structure": "north"},
             "geometry": {"type": "LineString", "coordinates": [[10, 0], [10, 10]]}},
            {"type": "Feature", "properties": {},
             "geometry": {"type": "Point", "coordinates": [3, 3]}}
        ]
    }"#;

    #[test]
    fn import_saves_line_features_and_reports_the_rest() {
        let mut engine = Engine::new(EngineConfig::default());
        let report = import_paths(&mut engine, PATHS).unwrap();
        assert_eq!(report.imported, vec![PathId(10), PathId(11)]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, 2);

        let draft = engine.network().path(PathId(11)).unwrap();
        assert!(draft.draft);
        assert_eq!(draft.structure.as_deref(), Some("north"));
        assert!(matches!(
            import_paths(&mut engine, r#"{"type": "Point", "coordinates": [0, 0]}"#),
            Err(SnapshotError::NotAFeatureCollection)
        ));
    }

    #[test]
    fn bincode_snapshot_restores_the_network() {
        let mut engine = Engine::new(EngineConfig::default());
        import_paths(&mut engine, PATHS).unwrap();
        let trek = engine
            .place_by_paths(
                TopologyKind::line("trek"),
                &[SerializedTopology {
                    paths: vec![PathId(10), PathId(11)],
                    ..Default::default()
                }],
            )
            .unwrap();

        let mut bytes = Vec::new();
        write_network(engine.network(), &mut bytes).unwrap();
        let restored = read_network(&mut bytes.as_slice()).unwrap();
        assert_eq!(restored.path_count(), 2);
        assert_eq!(restored.topology(trek), engine.topology(trek));

        // Id allocation continues after the restored ids.
        let mut engine = Engine::with_network(restored, EngineConfig::default());
        let id = engine.create_topology(TopologyKind::point("poi"));
        assert!(id > trek);
    }

    #[test]
    fn export_skips_deleted_topologies() {
        let mut engine = Engine::new(EngineConfig::default());
        import_paths(&mut engine, PATHS).unwrap();
        let kept = engine
            .place_by_paths(
                TopologyKind::line("trek"),
                &[SerializedTopology {
                    paths: vec![PathId(10)],
                    ..Default::default()
                }],
            )
            .unwrap();
        engine
            .place_by_paths(
                TopologyKind::line("trek"),
                &[SerializedTopology {
                    paths: vec![PathId(11)],
                    ..Default::default()
                }],
            )
            .unwrap();
        engine.on_path_deleted(PathId(11)).unwrap();

        let collection = export_topologies(engine.network());
        assert_eq!(collection.features.len(), 1);
        let feature = &collection.features[0];
        assert_eq!(
            feature.id,
            Some(geojson::feature::Id::Number(kept.0.into()))
        );
        assert_eq!(feature.property("length"), Some(&json!(10.0)));
        assert_eq!(feature.property("domain"), Some(&json!("trek")));
    }
}
