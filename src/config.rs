//! Generator Configuration
//! Chart style, output format, sizes and output location, loadable from JSON.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Rendering style for the numeric charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChartStyle {
    /// 2D histogram, box plot, scatter and correlation heatmap
    #[default]
    Flat,
    /// 3D histogram, box plot, scatter and surface
    #[serde(rename = "3d")]
    #[value(name = "3d")]
    ThreeD,
}

/// Artifact file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    /// Self-contained vector document
    Svg,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Svg => "svg",
        }
    }
}

/// Where a run writes its artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputLocation {
    /// A fresh `run-<uuid>` directory under `root` for every run. Earlier
    /// run directories are never pruned.
    Isolated { root: PathBuf },
    /// One shared directory, removed and recreated at the start of every run.
    /// Concurrent runs on the same directory delete each other's artifacts.
    Fixed(PathBuf),
}

impl Default for OutputLocation {
    fn default() -> Self {
        OutputLocation::Isolated {
            root: std::env::temp_dir().join("databoard"),
        }
    }
}

/// Settings for one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub style: ChartStyle,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    /// Histogram bin count
    pub bins: usize,
    /// Bars/slices shown before folding the rest into "Other"
    pub max_categories: usize,
    /// Column cap for the scatter matrix and correlation heatmap
    pub max_matrix_columns: usize,
    /// Cells per axis of the interpolated surface
    pub surface_grid: usize,
    /// Also produce the scatter matrix and violin plots
    pub extras: bool,
    /// Abort the run on the first failing chart
    pub fail_fast: bool,
    pub output: OutputLocation,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            style: ChartStyle::default(),
            format: OutputFormat::default(),
            width: 1000,
            height: 750,
            bins: 20,
            max_categories: 20,
            max_matrix_columns: 6,
            surface_grid: 24,
            extras: false,
            fail_fast: false,
            output: OutputLocation::default(),
        }
    }
}

impl GeneratorConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = GeneratorConfig::from_json(r#"{ "style": "3d", "bins": 10 }"#).unwrap();
        assert_eq!(config.style, ChartStyle::ThreeD);
        assert_eq!(config.bins, 10);
        assert_eq!(config.width, 1000);
        assert_eq!(config.format, OutputFormat::Png);
        assert!(!config.extras);
    }

    #[test]
    fn fixed_output_location_parses() {
        let config =
            GeneratorConfig::from_json(r#"{ "output": { "fixed": "./figures" } }"#).unwrap();
        assert_eq!(config.output, OutputLocation::Fixed(PathBuf::from("./figures")));
    }

    #[test]
    fn unknown_style_is_rejected() {
        let err = GeneratorConfig::from_json(r#"{ "style": "cubist" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = GeneratorConfig::from_file(Path::new("/nonexistent/databoard.json")).unwrap_err();
        assert!(err.to_string().contains("databoard.json"));
    }
}
