// ===========================================================================
// Elevation Engine
// ===========================================================================
use crate::config::ProfileConfig;
use crate::ids::{PathId, TopologyId};
use crate::network::Network;
use crate::topology::TopologyGeometry;
use geo_types::Coord;

pub mod area;
pub mod dem;
pub mod profile;

pub use area::{ElevationArea, elevation_area};
pub use dem::{DemProvider, RasterDem, elevation_at};
pub use profile::{
    ElevationProfile, ElevationStats, ProfilePoint, compute_stats, drape, elevation_profile,
    sample_profile, smooth,
};

#[derive(Debug, thiserror::Error)]
pub enum ElevationError {
    #[error("no elevation model configured")]
    NoDem,
    #[error("geometry has no coordinates")]
    EmptyGeometry,
    #[error("invalid elevation raster: {0}")]
    InvalidRaster(String),
    #[error("could not read raster '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// All vertices of a topology geometry, parts chained in order.
pub fn topology_coords(geom: &TopologyGeometry) -> Vec<Coord> {
    geom.parts().into_iter().flatten().copied().collect()
}

pub fn refresh_path_elevation(
    network: &mut Network,
    id: PathId,
    dem: &dyn DemProvider,
    config: &ProfileConfig,
) {
    if let Some(path) = network.path_mut(id) {
        path.geom_3d = Some(drape(&path.geom().0, dem, config.precision));
    }
}

/// Refresh `geom_3d` and the elevation statistics of a topology from its cached geometry.
pub fn refresh_topology_elevation(
    network: &mut Network,
    id: TopologyId,
    dem: &dyn DemProvider,
    config: &ProfileConfig,
) {
    let Some(topology) = network.topology_mut(id) else {
        return;
    };
    let coords = topology_coords(&topology.geom);
    if coords.is_empty() {
        topology.clear_elevation();
        return;
    }
    let profile = elevation_profile(&coords, dem, config);
    topology.geom_3d = profile.points.iter().map(|p| [p.x, p.y, p.z]).collect();
    topology.ascent = profile.stats.ascent;
    topology.descent = profile.stats.descent;
    topology.min_elevation = profile.stats.min_elevation;
    topology.max_elevation = profile.stats.max_elevation;
    topology.length_3d = profile.stats.length_3d;
}
