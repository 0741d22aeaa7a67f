// ===========================================================================
// Planar SRID <-> WGS84 conversion
// ===========================================================================
use geo_types::Coord;
use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS: f64 = 6378137.0;

/// The fixed metric projection every stored geometry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Projection {
    /// EPSG:3857
    #[default]
    WebMercator,
    /// Equirectangular plane tangent at (origin_lon, origin_lat).
    /// x = R * cos(lat0) * dlon, y = R * dlat
    LocalTangentPlane { origin_lon: f64, origin_lat: f64 },
}

impl Projection {
    pub fn srid(&self) -> Option<u32> {
        match self {
            Projection::WebMercator => Some(3857),
            Projection::LocalTangentPlane { .. } => None,
        }
    }

    /// (lng, lat) in degrees to planar (x, y).
    pub fn project(&self, lng: f64, lat: f64) -> Coord {
        match *self {
            Projection::WebMercator => {
                let (x, y) = lat_lng_to_web_merc(lng, lat);
                Coord { x, y }
            }
            Projection::LocalTangentPlane {
                origin_lon,
                origin_lat,
            } => {
                let cos_lat0 = origin_lat.to_radians().cos();
                Coord {
                    x: EARTH_RADIUS * cos_lat0 * (lng - origin_lon).to_radians(),
                    y: EARTH_RADIUS * (lat - origin_lat).to_radians(),
                }
            }
        }
    }

    /// Planar (x, y) to (lng, lat) in degrees.
    pub fn unproject(&self, c: Coord) -> (f64, f64) {
        match *self {
            Projection::WebMercator => web_merc_to_lat_lng(c.x, c.y),
            Projection::LocalTangentPlane {
                origin_lon,
                origin_lat,
            } => {
                let cos_lat0 = origin_lat.to_radians().cos();
                let dlon = (c.x / (EARTH_RADIUS * cos_lat0)).to_degrees();
                let dlat = (c.y / EARTH_RADIUS).to_degrees();
                (origin_lon + dlon, origin_lat + dlat)
            }
        }
    }
}

/// Input: (longitude, latitude) in degrees. Output: (x, y) in meters.
pub fn lat_lng_to_web_merc(lon: f64, lat: f64) -> (f64, f64) {
    let x = EARTH_RADIUS * lon.to_radians();
    let y = EARTH_RADIUS * ((std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan()).ln();
    (x, y)
}

/// Input: (x, y) in meters. Output: (longitude, latitude) in degrees.
pub fn web_merc_to_lat_lng(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    (lon, lat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn web_mercator_roundtrip() {
        let p = Projection::WebMercator;
        let c = p.project(6.1432, 46.2044);
        let (lng, lat) = p.unproject(c);
        assert!((lng - 6.1432).abs() < 1e-9);
        assert!((lat - 46.2044).abs() < 1e-9);
    }

    #[test]
    fn ltp_roundtrip() {
        let ltp = Projection::LocalTangentPlane {
            origin_lon: 13.4,
            origin_lat: 52.5,
        };
        let c = ltp.project(13.41, 52.51);
        let (lon, lat) = ltp.unproject(c);
        assert!((lon - 13.41).abs() < 1e-6);
        assert!((lat - 52.51).abs() < 1e-6);
        assert_eq!(ltp.srid(), None);
    }
}
