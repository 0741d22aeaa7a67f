// ===========================================================================
// Engine: network + config + DEM, with atomic edits
// ===========================================================================
//
// Every mutation runs against a staged clone of the network and replaces the
// live one only when the whole edit, recomputation included, succeeded.
use crate::config::EngineConfig;
use crate::elevation::{
    self, DemProvider, ElevationArea, ElevationError, ElevationProfile, elevation_area,
    elevation_profile,
};
use crate::ids::{AggregationId, PathId, TopologyId};
use crate::network::Network;
use crate::path_graph::{self, GraphError, MergeError, PathInput, SaveReport};
use crate::path_router::{self, Route, RoutingError, Step};
use crate::recompute::{self, RecomputeOutcome, ReorderReport};
use crate::topology::{
    self, SerializedTopology, Topology, TopologyError, TopologyKind, TopologySpec,
};
use geo_types::Coord;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    Routing(#[from] RoutingError),
    #[error(transparent)]
    Elevation(#[from] ElevationError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathSaveOutcome {
    pub report: SaveReport,
    pub recompute: RecomputeOutcome,
}

/// What an elevation query is computed on.
#[derive(Debug, Clone, PartialEq)]
pub enum ElevationTarget {
    Topology(TopologyId),
    Path(PathId),
    Geometry(Vec<Coord>),
}

pub struct Engine {
    network: Network,
    config: EngineConfig,
    dem: Option<Arc<dyn DemProvider>>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_network(Network::new(), config)
    }

    pub fn with_network(network: Network, config: EngineConfig) -> Self {
        Self {
            network,
            config,
            dem: None,
        }
    }

    pub fn with_dem(mut self, dem: Arc<dyn DemProvider>) -> Self {
        self.dem = Some(dem);
        self
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn into_network(self) -> Network {
        self.network
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn topology(&self, id: TopologyId) -> Option<&Topology> {
        self.network.topology(id)
    }

    fn commit<T>(
        &mut self,
        edit: impl FnOnce(&mut Network, &EngineConfig) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let mut staged = self.network.clone();
        let out = edit(&mut staged, &self.config)?;
        self.network = staged;
        Ok(out)
    }

    /// Refresh the 3D caches of changed paths and topologies, when a DEM is set.
    fn refresh_elevation(
        dem: Option<&Arc<dyn DemProvider>>,
        network: &mut Network,
        config: &EngineConfig,
        paths: &BTreeSet<PathId>,
        topologies: &BTreeSet<TopologyId>,
    ) {
        let Some(dem) = dem else {
            return;
        };
        for id in paths {
            elevation::refresh_path_elevation(network, *id, dem.as_ref(), &config.profile);
        }
        for id in topologies {
            elevation::refresh_topology_elevation(network, *id, dem.as_ref(), &config.profile);
        }
    }

    // --- path edit hooks ---

    pub fn on_path_saved(&mut self, input: PathInput) -> Result<PathSaveOutcome, EngineError> {
        let dem = self.dem.clone();
        self.commit(|network, config| {
            let (report, events) = path_graph::save_path(network, input, config)?;
            let recompute = recompute::apply_events(network, &events, config.tolerance)?;
            let mut paths: BTreeSet<PathId> = BTreeSet::from([report.path_id]);
            paths.extend(report.split_paths.iter().flat_map(|(_, pieces)| pieces.iter().copied()));
            Self::refresh_elevation(dem.as_ref(), network, config, &paths, &recompute.touched);
            info!(
                path = %report.path_id,
                splits = report.split_paths.len(),
                touched = recompute.touched.len(),
                "path saved"
            );
            Ok(PathSaveOutcome { report, recompute })
        })
    }

    pub fn on_path_deleted(&mut self, id: PathId) -> Result<RecomputeOutcome, EngineError> {
        let dem = self.dem.clone();
        self.commit(|network, config| {
            let event = path_graph::delete_path(network, id)?;
            let outcome = recompute::apply_events(network, &[event], config.tolerance)?;
            Self::refresh_elevation(dem.as_ref(), network, config, &BTreeSet::new(), &outcome.touched);
            Ok(outcome)
        })
    }

    pub fn split_path(
        &mut self,
        id: PathId,
        positions: &[f64],
    ) -> Result<(Vec<PathId>, RecomputeOutcome), EngineError> {
        let dem = self.dem.clone();
        self.commit(|network, config| {
            let (pieces, event) = path_graph::split_path(network, id, positions, config.tolerance)?;
            let outcome =
                recompute::apply_events(network, event.as_slice(), config.tolerance)?;
            let paths = pieces.iter().copied().collect();
            Self::refresh_elevation(dem.as_ref(), network, config, &paths, &outcome.touched);
            Ok((pieces, outcome))
        })
    }

    pub fn merge_paths(&mut self, ids: &[PathId]) -> Result<(PathId, RecomputeOutcome), EngineError> {
        let dem = self.dem.clone();
        self.commit(|network, config| {
            let (kept, event) = path_graph::merge_paths(network, ids, config.tolerance)?;
            let outcome = recompute::apply_events(network, &[event], config.tolerance)?;
            Self::refresh_elevation(dem.as_ref(), network, config, &BTreeSet::from([kept]), &outcome.touched);
            Ok((kept, outcome))
        })
    }

    pub fn unify_paths(
        &mut self,
        a: PathId,
        b: PathId,
    ) -> Result<(PathId, RecomputeOutcome), EngineError> {
        let dem = self.dem.clone();
        self.commit(|network, config| {
            let (kept, event) = path_graph::unify_paths(network, a, b, config.tolerance)?;
            let outcome = recompute::apply_events(network, &[event], config.tolerance)?;
            Self::refresh_elevation(dem.as_ref(), network, config, &BTreeSet::from([kept]), &outcome.touched);
            Ok((kept, outcome))
        })
    }

    // --- topologies ---

    fn placed(
        &mut self,
        place: impl FnOnce(&mut Network, &EngineConfig) -> Result<TopologyId, TopologyError>,
    ) -> Result<TopologyId, EngineError> {
        let dem = self.dem.clone();
        self.commit(|network, config| {
            let id = place(network, config)?;
            Self::refresh_elevation(dem.as_ref(), network, config, &BTreeSet::new(), &BTreeSet::from([id]));
            debug!(topology = %id, "topology placed");
            Ok(id)
        })
    }

    pub fn place(&mut self, kind: TopologyKind, spec: &TopologySpec) -> Result<TopologyId, EngineError> {
        self.placed(|network, config| {
            topology::deserialize(network, kind, spec, &config.projection, config.tolerance)
        })
    }

    pub fn place_by_coordinate(
        &mut self,
        kind: TopologyKind,
        lat: f64,
        lng: f64,
    ) -> Result<TopologyId, EngineError> {
        self.placed(|network, config| {
            topology::place_by_coordinate(network, kind, lat, lng, &config.projection, config.tolerance)
        })
    }

    pub fn place_by_paths(
        &mut self,
        kind: TopologyKind,
        legs: &[SerializedTopology],
    ) -> Result<TopologyId, EngineError> {
        self.placed(|network, config| topology::place_by_paths(network, kind, legs, config.tolerance))
    }

    /// Create an empty topology, to be filled with `add_path`.
    pub fn create_topology(&mut self, kind: TopologyKind) -> TopologyId {
        topology::create(&mut self.network, kind)
    }

    /// Append a segment; positions default to the whole path (or to `start` for points).
    pub fn add_path(
        &mut self,
        id: TopologyId,
        path: PathId,
        start: Option<f64>,
        end: Option<f64>,
    ) -> Result<AggregationId, EngineError> {
        let dem = self.dem.clone();
        self.commit(|network, config| {
            let is_point = network
                .topology(id)
                .ok_or(TopologyError::UnknownTopology(id))?
                .kind
                .is_point();
            let start = start.unwrap_or(0.0);
            let end = end.unwrap_or(if is_point { start } else { 1.0 });
            let agg = topology::add_path(network, id, path, start, end)?;
            topology::refresh_geometry(network, id, config.tolerance)?;
            Self::refresh_elevation(dem.as_ref(), network, config, &BTreeSet::new(), &BTreeSet::from([id]));
            Ok(agg)
        })
    }

    pub fn set_offset(&mut self, id: TopologyId, offset: f64) -> Result<(), EngineError> {
        let dem = self.dem.clone();
        self.commit(|network, config| {
            topology::set_offset(network, id, offset)?;
            topology::refresh_geometry(network, id, config.tolerance)?;
            Self::refresh_elevation(dem.as_ref(), network, config, &BTreeSet::new(), &BTreeSet::from([id]));
            Ok(())
        })
    }

    pub fn serialize_topology(&self, id: TopologyId) -> Result<SerializedTopology, EngineError> {
        Ok(topology::serialize(&self.network, id)?)
    }

    /// Global sweep. Failing topologies are reported, the others are still fixed.
    pub fn reorder_topologies(&mut self) -> ReorderReport {
        let report = recompute::reorder_topologies(&mut self.network, self.config.tolerance);
        if let Some(dem) = self.dem.clone() {
            for id in &report.reordered {
                elevation::refresh_topology_elevation(
                    &mut self.network,
                    *id,
                    dem.as_ref(),
                    &self.config.profile,
                );
            }
        }
        report
    }

    // --- queries ---

    pub fn route(&self, steps: &[Step]) -> Result<Route, RoutingError> {
        path_router::route(&self.network, steps, self.config.tolerance)
    }

    pub fn route_request(&self, body: &Value) -> Result<Route, RoutingError> {
        path_router::route_request(&self.network, body, self.config.tolerance)
    }

    fn target_coords(&self, target: &ElevationTarget) -> Result<Vec<Coord>, EngineError> {
        let coords = match target {
            ElevationTarget::Topology(id) => {
                let topology = self
                    .network
                    .topology(*id)
                    .ok_or(TopologyError::UnknownTopology(*id))?;
                elevation::topology_coords(&topology.geom)
            }
            ElevationTarget::Path(id) => self
                .network
                .path(*id)
                .ok_or(GraphError::UnknownPath(*id))?
                .geom()
                .0
                .clone(),
            ElevationTarget::Geometry(coords) => coords.clone(),
        };
        if coords.is_empty() {
            return Err(ElevationError::EmptyGeometry.into());
        }
        Ok(coords)
    }

    fn dem(&self) -> Result<&dyn DemProvider, EngineError> {
        self.dem
            .as_deref()
            .ok_or_else(|| ElevationError::NoDem.into())
    }

    pub fn elevation_profile(&self, target: &ElevationTarget) -> Result<ElevationProfile, EngineError> {
        let coords = self.target_coords(target)?;
        Ok(elevation_profile(&coords, self.dem()?, &self.config.profile))
    }

    pub fn elevation_area(&self, target: &ElevationTarget) -> Result<ElevationArea, EngineError> {
        let coords = self.target_coords(target)?;
        Ok(elevation_area(
            &coords,
            self.dem()?,
            &self.config.area,
            &self.config.projection,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elevation::RasterDem;
    use crate::topology::TopologyGeometry;
    use geo_types::line_string;

    fn engine() -> Engine {
        let config = EngineConfig {
            tolerance: 0.001,
            ..EngineConfig::default()
        };
        Engine::new(config)
    }

    fn save(engine: &mut Engine, geom: geo_types::LineString) -> PathId {
        engine
            .on_path_saved(PathInput::new(geom))
            .unwrap()
            .report
            .path_id
    }

    #[test]
    fn rejected_merge_leaves_network_untouched() {
        let mut engine = engine();
        let a = save(&mut engine, line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)]);
        let b = save(&mut engine, line_string![(x: 1.0, y: 0.0), (x: 4.0, y: 0.0)]);
        save(&mut engine, line_string![(x: 1.0, y: 0.0), (x: 1.0, y: 3.0)]);
        let trek = engine
            .place_by_paths(
                TopologyKind::line("trek"),
                &[SerializedTopology {
                    paths: vec![a, b],
                    ..Default::default()
                }],
            )
            .unwrap();
        let before = engine.serialize_topology(trek).unwrap();

        assert!(matches!(
            engine.merge_paths(&[a, b]),
            Err(EngineError::Merge(MergeError::BranchAtJunction(_)))
        ));
        assert_eq!(engine.network().path_count(), 3);
        assert_eq!(engine.serialize_topology(trek).unwrap(), before);
    }

    #[test]
    fn merge_through_engine_moves_aggregations() {
        let mut engine = engine();
        let a = save(&mut engine, line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)]);
        let b = save(&mut engine, line_string![(x: 4.0, y: 0.0), (x: 1.0, y: 0.0)]);
        let poi = engine.create_topology(TopologyKind::point("poi"));
        engine.add_path(poi, a, Some(0.5), None).unwrap();

        let (kept, outcome) = engine.merge_paths(&[a, b]).unwrap();
        assert_eq!(kept, a);
        assert!(outcome.touched.contains(&poi));
        let serialized = engine.serialize_topology(poi).unwrap();
        assert_eq!(serialized.paths, vec![a]);
        assert!((serialized.positions[&0][0] - 0.125).abs() < 1e-12);
        assert_eq!(
            engine.topology(poi).unwrap().geom,
            TopologyGeometry::Point(geo_types::coord! { x: 0.5, y: 0.0 })
        );
    }

    #[test]
    fn deleting_supporting_path_soft_deletes() {
        let mut engine = engine();
        let a = save(&mut engine, line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)]);
        let trek = engine.create_topology(TopologyKind::line("trek"));
        engine.add_path(trek, a, None, None).unwrap();
        assert_eq!(engine.topology(trek).unwrap().length, 10.0);

        let outcome = engine.on_path_deleted(a).unwrap();
        assert!(outcome.deleted.contains(&trek));
        assert!(engine.topology(trek).unwrap().deleted);
        assert!(matches!(
            engine.add_path(trek, a, None, None),
            Err(EngineError::Topology(TopologyError::Deleted(_)))
        ));
    }

    #[test]
    fn elevation_requires_a_dem() {
        let mut engine = engine();
        let a = save(&mut engine, line_string![(x: 0.0, y: 0.0), (x: 100.0, y: 0.0)]);
        assert!(matches!(
            engine.elevation_profile(&ElevationTarget::Path(a)),
            Err(EngineError::Elevation(ElevationError::NoDem))
        ));

        let dem = RasterDem::from_fn(-50.0, 50.0, 10.0, 20, 10, |x, _| 1000.0 + x).unwrap();
        let engine = Engine::with_network(engine.into_network(), EngineConfig::default())
            .with_dem(Arc::new(dem));
        let profile = engine.elevation_profile(&ElevationTarget::Path(a)).unwrap();
        assert_eq!(profile.points.len(), 5);
        assert!(profile.stats.ascent > 0.0);
        assert_eq!(profile.stats.descent, 0.0);
    }

    #[test]
    fn saved_paths_are_draped_when_a_dem_is_set() {
        let dem = RasterDem::from_fn(-50.0, 50.0, 10.0, 20, 10, |_, _| 300.0).unwrap();
        let mut engine = engine().with_dem(Arc::new(dem));
        let a = save(&mut engine, line_string![(x: 0.0, y: 0.0), (x: 50.0, y: 0.0)]);
        let trek = engine.create_topology(TopologyKind::line("trek"));
        engine.add_path(trek, a, None, None).unwrap();

        let draped = engine.network().path(a).unwrap().geom_3d.clone().unwrap();
        assert!(draped.iter().all(|c| c[2] == 300.0));
        let topology = engine.topology(trek).unwrap();
        assert_eq!(topology.max_elevation, 300.0);
        assert_eq!(topology.ascent, 0.0);
    }
}
