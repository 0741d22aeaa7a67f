// ===========================================================================
// DEM access
// ===========================================================================
use super::ElevationError;
use geo_types::Coord;
use std::path::Path;
use tracing::info;

/// Raster elevation source, queried in the planar SRID.
pub trait DemProvider: Send + Sync {
    /// None stands for NODATA.
    fn value_at(&self, x: f64, y: f64) -> Option<f64>;
    fn covers_point(&self, x: f64, y: f64) -> bool;
}

/// Elevation used by every sampler: 0 outside coverage or on NODATA cells.
pub fn elevation_at(dem: &dyn DemProvider, c: Coord) -> f64 {
    if !dem.covers_point(c.x, c.y) {
        return 0.0;
    }
    dem.value_at(c.x, c.y)
        .filter(|z| z.is_finite())
        .unwrap_or(0.0)
}

/// In-memory north-up grid. `values` is row-major, row 0 is the northernmost.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterDem {
    west: f64,
    north: f64,
    cell_size: f64,
    cols: usize,
    rows: usize,
    values: Vec<f64>,
    nodata: Option<f64>,
}

impl RasterDem {
    pub fn new(
        west: f64,
        north: f64,
        cell_size: f64,
        cols: usize,
        rows: usize,
        values: Vec<f64>,
        nodata: Option<f64>,
    ) -> Result<Self, ElevationError> {
        if cell_size.is_nan() || cell_size <= 0.0 || cols == 0 || rows == 0 {
            return Err(ElevationError::InvalidRaster(format!(
                "{cols}x{rows} grid with cell size {cell_size}"
            )));
        }
        if values.len() != cols * rows {
            return Err(ElevationError::InvalidRaster(format!(
                "expected {} values, got {}",
                cols * rows,
                values.len()
            )));
        }
        Ok(Self {
            west,
            north,
            cell_size,
            cols,
            rows,
            values,
            nodata,
        })
    }

    /// Build a grid by evaluating `f` at every cell center.
    pub fn from_fn(
        west: f64,
        north: f64,
        cell_size: f64,
        cols: usize,
        rows: usize,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<Self, ElevationError> {
        let mut values = Vec::with_capacity(cols * rows);
        for r in 0..rows {
            let y = north - (r as f64 + 0.5) * cell_size;
            for c in 0..cols {
                let x = west + (c as f64 + 0.5) * cell_size;
                values.push(f(x, y));
            }
        }
        Self::new(west, north, cell_size, cols, rows, values, None)
    }

    /// Parse an ESRI ASCII grid (`ncols`, `nrows`, `xllcorner`/`xllcenter`,
    /// `yllcorner`/`yllcenter`, `cellsize`, optional `NODATA_value`, then rows north first).
    pub fn from_ascii_grid(source: &str) -> Result<Self, ElevationError> {
        let mut tokens = source.split_whitespace().peekable();
        let mut ncols = None;
        let mut nrows = None;
        let mut xll = None;
        let mut yll = None;
        let mut centered = false;
        let mut cell_size = None;
        let mut nodata = None;

        while let Some(key) = tokens.peek().copied() {
            if key.parse::<f64>().is_ok() {
                break;
            }
            tokens.next();
            let value = tokens
                .next()
                .ok_or_else(|| ElevationError::InvalidRaster(format!("missing value for {key}")))?;
            let number = value
                .parse::<f64>()
                .map_err(|_| ElevationError::InvalidRaster(format!("bad value for {key}: {value}")))?;
            match key.to_ascii_lowercase().as_str() {
                "ncols" => ncols = Some(number as usize),
                "nrows" => nrows = Some(number as usize),
                "xllcorner" => xll = Some(number),
                "yllcorner" => yll = Some(number),
                "xllcenter" => {
                    xll = Some(number);
                    centered = true;
                }
                "yllcenter" => {
                    yll = Some(number);
                    centered = true;
                }
                "cellsize" => cell_size = Some(number),
                "nodata_value" => nodata = Some(number),
                other => {
                    return Err(ElevationError::InvalidRaster(format!(
                        "unknown header key {other}"
                    )));
                }
            }
        }

        let missing = |name: &str| ElevationError::InvalidRaster(format!("missing {name}"));
        let cols = ncols.ok_or_else(|| missing("ncols"))?;
        let rows = nrows.ok_or_else(|| missing("nrows"))?;
        let cell_size = cell_size.ok_or_else(|| missing("cellsize"))?;
        let mut west = xll.ok_or_else(|| missing("xllcorner"))?;
        let mut south = yll.ok_or_else(|| missing("yllcorner"))?;
        if centered {
            west -= cell_size / 2.0;
            south -= cell_size / 2.0;
        }

        let values = tokens
            .map(|t| {
                t.parse::<f64>()
                    .map_err(|_| ElevationError::InvalidRaster(format!("bad cell value {t}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(
            west,
            south + rows as f64 * cell_size,
            cell_size,
            cols,
            rows,
            values,
            nodata,
        )
    }

    pub fn from_ascii_grid_file(path: impl AsRef<Path>) -> Result<Self, ElevationError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ElevationError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let dem = Self::from_ascii_grid(&source)?;
        info!(path = %path.display(), cols = dem.cols, rows = dem.rows, "loaded DEM");
        Ok(dem)
    }

    fn cell(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        if !self.covers_point(x, y) {
            return None;
        }
        let col = (((x - self.west) / self.cell_size) as usize).min(self.cols - 1);
        let row = (((self.north - y) / self.cell_size) as usize).min(self.rows - 1);
        Some((row, col))
    }
}

impl DemProvider for RasterDem {
    fn value_at(&self, x: f64, y: f64) -> Option<f64> {
        let (row, col) = self.cell(x, y)?;
        let value = self.values[row * self.cols + col];
        match self.nodata {
            Some(nodata) if value == nodata => None,
            _ => Some(value),
        }
    }

    fn covers_point(&self, x: f64, y: f64) -> bool {
        let east = self.west + self.cols as f64 * self.cell_size;
        let south = self.north - self.rows as f64 * self.cell_size;
        x >= self.west && x <= east && y >= south && y <= self.north
    }
}
