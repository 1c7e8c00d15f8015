//! Tool configuration
//!
//! Parses an optional `ddxml.toml`. Every field has a default, so a missing
//! file or an empty table yields the stock settings.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub heightmap: HeightmapConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub sonar: SonarConfig,
    #[serde(default)]
    pub oogl: OoglConfig,
}

/// Scale factors applied by the heightmap triangulator
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct HeightmapConfig {
    /// Horizontal spacing between samples
    pub xscale: f32,
    /// Vertical spacing between samples
    pub yscale: f32,
    /// Multiplier applied to the bias-centred sample value
    pub height_mult: f32,
    /// Also write the flat triangle list next to the strip
    pub emit_triangle_list: bool,
}

impl Default for HeightmapConfig {
    fn default() -> Self {
        Self {
            xscale: 1.0,
            yscale: 1.0,
            height_mult: 1.0,
            emit_triangle_list: true,
        }
    }
}

/// What to do with a polygon that carries no UVs
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MissingUvs {
    /// Drop the polygon from the export
    #[default]
    Skip,
    /// Keep the polygon, its corners get UV (0, 0)
    Default,
}

/// Scene exporter settings
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ExportConfig {
    /// Per-axis normal difference below which corners merge
    pub merge_tolerance: f32,
    /// Summed absolute pivot delta below which no translation is written
    pub translation_epsilon: f32,
    pub missing_uvs: MissingUvs,
    /// Name of the default material every mesh refers to
    pub material: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            merge_tolerance: 0.0001,
            translation_epsilon: 0.01,
            missing_uvs: MissingUvs::Skip,
            material: "phong1SG".to_string(),
        }
    }
}

/// Sonar simulation inputs that are not apparatus constants
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SonarConfig {
    /// Direction the noise comes from, in degrees
    pub signal_angle: f64,
    /// Frequency of the measured noise, in Hz
    pub noise_freq: f64,
    /// Samples taken over one signal period when measuring peaks
    pub samples: usize,
}

impl Default for SonarConfig {
    fn default() -> Self {
        Self {
            signal_angle: 90.0,
            noise_freq: 1000.0,
            samples: 1000,
        }
    }
}

/// Level-of-detail table for OFF dumps
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct OoglConfig {
    /// Target face percentage of levels 1, 2, ...; level 0 is the unmodified mesh
    pub levels: Vec<u32>,
    /// Simplification error bound, relative to the mesh extents
    pub target_error: f32,
}

impl Default for OoglConfig {
    fn default() -> Self {
        Self {
            levels: vec![125, 100, 75, 20],
            target_error: 0.05,
        }
    }
}

impl Config {
    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse configuration")
    }
}

/// Load configuration, falling back to defaults when no path is given
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {:?}", path))?;
    let config = Config::parse(&content)
        .with_context(|| format!("Failed to parse config: {:?}", path))?;
    tracing::debug!("Loaded config from {:?}: {:?}", path, config);
    Ok(config)
}
