use crate::coord_conversion::Projection;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub projection: Projection,
    /// Single tolerance shared by endpoint snapping, overlap detection and merge eligibility.
    pub tolerance: f64,
    /// Split paths where a saved path crosses them.
    pub split_at_intersections: bool,
    pub profile: ProfileConfig,
    pub area: AreaConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            projection: Projection::WebMercator,
            tolerance: 0.01,
            split_at_intersections: true,
            profile: ProfileConfig::default(),
            area: AreaConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Maximum distance between two sampled vertices.
    pub precision: f64,
    /// Number of neighbours on each side used by the smoothing kernel.
    pub smoothing_radius: usize,
    /// 0 keeps raw values, 1 replaces them with the kernel average.
    pub smoothing_strength: f64,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            precision: 25.0,
            smoothing_radius: 2,
            smoothing_strength: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaConfig {
    /// Fraction of the extent added on each side.
    pub margin: f64,
    /// Long side / short side ratio the window is grown toward.
    pub aspect_ratio: f64,
    /// Number of samples along the longest side.
    pub max_resolution: usize,
    pub min_extent: f64,
}

impl Default for AreaConfig {
    fn default() -> Self {
        Self {
            margin: 0.15,
            aspect_ratio: 4.0 / 3.0,
            max_resolution: 150,
            min_extent: 100.0,
        }
    }
}

impl EngineConfig {
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(source)?)
    }

    pub fn from_ron_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_ron_str(&source)?;
        info!(path = %path.display(), "loaded engine config");
        Ok(config)
    }

    /// Load the file if one is given, then apply `SENTIER_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_ron_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup("SENTIER_TOLERANCE") {
            match value.parse::<f64>() {
                Ok(v) if v >= 0.0 => self.tolerance = v,
                _ => warn!(%value, "ignoring invalid SENTIER_TOLERANCE"),
            }
        }
        if let Some(value) = lookup("SENTIER_PROFILE_PRECISION") {
            match value.parse::<f64>() {
                Ok(v) if v > 0.0 => self.profile.precision = v,
                _ => warn!(%value, "ignoring invalid SENTIER_PROFILE_PRECISION"),
            }
        }
        if let Some(value) = lookup("SENTIER_SPLIT_AT_INTERSECTIONS") {
            match value.parse::<bool>() {
                Ok(v) => self.split_at_intersections = v,
                Err(_) => warn!(%value, "ignoring invalid SENTIER_SPLIT_AT_INTERSECTIONS"),
            }
        }
        self
    }
}
