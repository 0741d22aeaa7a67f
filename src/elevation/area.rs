// ===========================================================================
// Elevation area: altitude matrix around a geometry, for relief rendering
// ===========================================================================
use super::ElevationError;
use super::dem::{DemProvider, elevation_at};
use crate::config::AreaConfig;
use crate::coord_conversion::Projection;
use crate::geometry_utils::POSITION_EPSILON;
use geo::BoundingRect;
use geo_types::{Coord, MultiPoint, Point};
use rayon::prelude::*;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AreaSize {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AreaResolution {
    /// Columns.
    pub x: usize,
    /// Rows.
    pub y: usize,
    pub step: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AreaCenter {
    pub x: f64,
    pub y: f64,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AltitudeRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AreaExtent {
    pub altitudes: AltitudeRange,
    pub northwest: LatLng,
    pub northeast: LatLng,
    pub southeast: LatLng,
    pub southwest: LatLng,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElevationArea {
    pub size: AreaSize,
    pub resolution: AreaResolution,
    /// Row 0 is the northernmost row, column 0 the westernmost.
    pub altitudes: Vec<Vec<f64>>,
    pub center: AreaCenter,
    pub extent: AreaExtent,
}

/// Sampling window: (west, north, columns, rows, step).
fn window(coords: &[Coord], config: &AreaConfig) -> Result<(f64, f64, usize, usize, f64), ElevationError> {
    let bounds = MultiPoint::from(coords.iter().map(|c| Point::from(*c)).collect::<Vec<_>>())
        .bounding_rect()
        .ok_or(ElevationError::EmptyGeometry)?;
    let center = bounds.center();

    let grow = 1.0 + 2.0 * config.margin.max(0.0);
    let mut width = (bounds.width() * grow).max(config.min_extent);
    let mut height = (bounds.height() * grow).max(config.min_extent);
    if width <= 0.0 || height <= 0.0 {
        return Err(ElevationError::EmptyGeometry);
    }

    // Only the short side grows, and only when the window is too elongated.
    let ratio = config.aspect_ratio.max(1.0);
    if width >= height {
        if width / height > ratio {
            height = width / ratio;
        }
    } else if height / width > ratio {
        width = height / ratio;
    }

    // The long side always gets exactly `max_resolution` samples.
    let long_count = config.max_resolution.max(1);
    let step = width.max(height) / long_count as f64;
    let short_count = |side: f64| (((side / step) - POSITION_EPSILON).ceil() as usize).clamp(1, long_count);
    let (cols, rows) = if width >= height {
        (long_count, short_count(height))
    } else {
        (short_count(width), long_count)
    };
    let west = center.x - cols as f64 * step / 2.0;
    let north = center.y + rows as f64 * step / 2.0;
    Ok((west, north, cols, rows, step))
}

pub fn elevation_area(
    coords: &[Coord],
    dem: &dyn DemProvider,
    config: &AreaConfig,
    projection: &Projection,
) -> Result<ElevationArea, ElevationError> {
    let (west, north, cols, rows, step) = window(coords, config)?;

    let altitudes: Vec<Vec<f64>> = (0..rows)
        .into_par_iter()
        .map(|r| {
            let y = north - (r as f64 + 0.5) * step;
            (0..cols)
                .map(|c| {
                    let x = west + (c as f64 + 0.5) * step;
                    elevation_at(dem, Coord { x, y })
                })
                .collect()
        })
        .collect();

    let (min, max) = altitudes
        .iter()
        .flatten()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), z| {
            (lo.min(*z), hi.max(*z))
        });

    let width = cols as f64 * step;
    let height = rows as f64 * step;
    let east = west + width;
    let south = north - height;
    let corner = |x: f64, y: f64| {
        let (lng, lat) = projection.unproject(Coord { x, y });
        LatLng { lat, lng }
    };
    let center = Coord {
        x: west + width / 2.0,
        y: north - height / 2.0,
    };
    let (center_lng, center_lat) = projection.unproject(center);

    Ok(ElevationArea {
        size: AreaSize {
            x: width,
            y: height,
        },
        resolution: AreaResolution {
            x: cols,
            y: rows,
            step,
        },
        altitudes,
        center: AreaCenter {
            x: center.x,
            y: center.y,
            lat: center_lat,
            lng: center_lng,
        },
        extent: AreaExtent {
            altitudes: AltitudeRange { min, max },
            northwest: corner(west, north),
            northeast: corner(east, north),
            southeast: corner(east, south),
            southwest: corner(west, south),
        },
    })
}
