// ===========================================================================
// Elevation profiles: resampling, DEM draping, smoothing, statistics
// ===========================================================================
use super::dem::{DemProvider, elevation_at};
use crate::config::ProfileConfig;
use crate::geometry_utils::{densify, distance};
use geo_types::Coord;
use serde::{Serialize, Serializer};

/// One sample of a profile, serialised as `[distance, x, y, z]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfilePoint {
    pub distance: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Serialize for ProfilePoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [self.distance, self.x, self.y, self.z].serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ElevationStats {
    pub ascent: f64,
    pub descent: f64,
    /// Raw extrema, before smoothing.
    pub min_elevation: f64,
    pub max_elevation: f64,
    /// Length along the smoothed 3D line.
    pub length_3d: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElevationProfile {
    pub points: Vec<ProfilePoint>,
    pub stats: ElevationStats,
}

/// Vertices of the line with extra ones inserted every `precision` units at most.
pub fn resample(coords: &[Coord], precision: f64) -> Vec<Coord> {
    densify(coords, precision)
}

/// Sample the DEM along the resampled line. A single point yields one sample at distance 0.
pub fn sample_profile(coords: &[Coord], dem: &dyn DemProvider, precision: f64) -> Vec<ProfilePoint> {
    let vertices = resample(coords, precision);
    let mut points = Vec::with_capacity(vertices.len());
    let mut travelled = 0.0;
    let mut previous: Option<Coord> = None;
    for c in vertices {
        if let Some(p) = previous {
            travelled += distance(p, c);
        }
        points.push(ProfilePoint {
            distance: travelled,
            x: c.x,
            y: c.y,
            z: elevation_at(dem, c),
        });
        previous = Some(c);
    }
    points
}

/// Triangular-kernel moving average over `radius` neighbours on each side,
/// truncated at the ends. The first and last samples are kept as is; the
/// others are blended with their average by `strength` (0 keeps raw values).
pub fn smooth(values: &[f64], radius: usize, strength: f64) -> Vec<f64> {
    let strength = strength.clamp(0.0, 1.0);
    let n = values.len();
    if radius == 0 || strength == 0.0 || n < 3 {
        return values.to_vec();
    }
    let mut out = values.to_vec();
    for i in 1..n - 1 {
        let lo = i.saturating_sub(radius);
        let hi = (i + radius).min(n - 1);
        let mut weighted = 0.0;
        let mut total = 0.0;
        for (j, value) in values.iter().enumerate().take(hi + 1).skip(lo) {
            let w = (radius + 1 - i.abs_diff(j)) as f64;
            weighted += w * value;
            total += w;
        }
        out[i] = (1.0 - strength) * values[i] + strength * weighted / total;
    }
    out
}

/// Ascent/descent over the smoothed series, min/max over the raw one.
pub fn compute_stats(points: &[ProfilePoint], config: &ProfileConfig) -> ElevationStats {
    if points.is_empty() {
        return ElevationStats::default();
    }
    let raw: Vec<f64> = points.iter().map(|p| p.z).collect();
    let smoothed = smooth(&raw, config.smoothing_radius, config.smoothing_strength);

    let mut stats = ElevationStats {
        min_elevation: raw.iter().copied().fold(f64::INFINITY, f64::min),
        max_elevation: raw.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        ..Default::default()
    };
    for (i, w) in smoothed.windows(2).enumerate() {
        let dz = w[1] - w[0];
        if dz > 0.0 {
            stats.ascent += dz;
        } else {
            stats.descent -= dz;
        }
        let dd = points[i + 1].distance - points[i].distance;
        stats.length_3d += dd.hypot(dz);
    }
    stats
}

pub fn elevation_profile(
    coords: &[Coord],
    dem: &dyn DemProvider,
    config: &ProfileConfig,
) -> ElevationProfile {
    let points = sample_profile(coords, dem, config.precision);
    let stats = compute_stats(&points, config);
    ElevationProfile { points, stats }
}

/// 3D geometry of the line at the configured precision.
pub fn drape(coords: &[Coord], dem: &dyn DemProvider, precision: f64) -> Vec<[f64; 3]> {
    resample(coords, precision)
        .into_iter()
        .map(|c| [c.x, c.y, elevation_at(dem, c)])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elevation::RasterDem;
    use geo_types::coord;

    struct Slope;

    impl DemProvider for Slope {
        fn value_at(&self, x: f64, _y: f64) -> Option<f64> {
            Some(x / 10.0)
        }

        fn covers_point(&self, x: f64, _y: f64) -> bool {
            (0.0..=1000.0).contains(&x)
        }
    }

    fn straight(length: f64) -> Vec<Coord> {
        vec![coord! { x: 0.0, y: 0.0 }, coord! { x: length, y: 0.0 }]
    }

    #[test]
    fn resampled_count_is_ceil_plus_one() {
        for (length, step, expected) in [
            (100.0, 25.0, 5),
            (101.0, 25.0, 6),
            (10.0, 25.0, 2),
            (75.0, 25.0, 4),
        ] {
            let points = sample_profile(&straight(length), &Slope, step);
            assert_eq!(points.len(), expected, "length {length} step {step}");
            assert!((points.last().unwrap().distance - length).abs() < 1e-9);
        }
    }

    #[test]
    fn duplicate_vertices_are_coalesced() {
        let coords = vec![
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 50.0, y: 0.0 },
        ];
        assert_eq!(sample_profile(&coords, &Slope, 25.0).len(), 3);
    }

    #[test]
    fn single_point_profile() {
        let points = sample_profile(&[coord! { x: 30.0, y: 0.0 }], &Slope, 25.0);
        assert_eq!(
            points,
            vec![ProfilePoint {
                distance: 0.0,
                x: 30.0,
                y: 0.0,
                z: 3.0
            }]
        );
    }

    #[test]
    fn outside_coverage_is_flat_zero() {
        let dem = RasterDem::from_fn(0.0, 100.0, 10.0, 10, 10, |_, _| 500.0).unwrap();
        let coords = vec![coord! { x: 2000.0, y: 0.0 }, coord! { x: 2100.0, y: 50.0 }];
        let profile = elevation_profile(&coords, &dem, &ProfileConfig::default());
        assert!(profile.points.iter().all(|p| p.z == 0.0));
        assert_eq!(profile.stats.ascent, 0.0);
        assert_eq!(profile.stats.descent, 0.0);
        assert_eq!(profile.stats.min_elevation, 0.0);
        assert_eq!(profile.stats.max_elevation, 0.0);
        assert!(drape(&coords, &dem, 25.0).iter().all(|c| c[2] == 0.0));
    }

    #[test]
    fn smoothing_flattens_a_single_spike() {
        let raw = [100.0, 100.0, 130.0, 100.0, 100.0];
        let smoothed = smooth(&raw, 1, 1.0);
        assert_eq!(smoothed[0], 100.0);
        assert_eq!(smoothed[4], 100.0);
        assert!((smoothed[2] - 115.0).abs() < 1e-9);
        assert!((smoothed[1] - 107.5).abs() < 1e-9);
        assert_eq!(smooth(&raw, 1, 0.0), raw.to_vec());
    }

    #[test]
    fn stats_use_smoothed_deltas_and_raw_extrema() {
        let points: Vec<ProfilePoint> = [100.0, 100.0, 130.0, 100.0, 100.0]
            .iter()
            .enumerate()
            .map(|(i, z)| ProfilePoint {
                distance: i as f64 * 10.0,
                x: i as f64 * 10.0,
                y: 0.0,
                z: *z,
            })
            .collect();
        let config = ProfileConfig {
            precision: 10.0,
            smoothing_radius: 1,
            smoothing_strength: 1.0,
        };
        let stats = compute_stats(&points, &config);
        assert!((stats.ascent - 15.0).abs() < 1e-9);
        assert!((stats.descent - 15.0).abs() < 1e-9);
        assert_eq!(stats.max_elevation, 130.0);
        assert_eq!(stats.min_elevation, 100.0);

        let raw = ProfileConfig {
            smoothing_strength: 0.0,
            ..config
        };
        assert!((compute_stats(&points, &raw).ascent - 30.0).abs() < 1e-9);
    }
}
