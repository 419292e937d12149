//! Chart Generator Module
//! Runs a full pass: load, classify, select, describe, render and report.

use crate::charts::{ChartData, ChartError, ChartKind, ChartRenderer, ChartSelector, RenderOptions};
use crate::config::{GeneratorConfig, OutputLocation};
use crate::data::{DataLoader, DataProcessor, LoaderError, ProcessorError};
use log::{debug, info, warn};
use polars::prelude::DataFrame;
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error(transparent)]
    Load(#[from] LoaderError),
    #[error("Failed to prepare data: {0}")]
    Process(#[from] ProcessorError),
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Chart '{file_stem}' failed: {source}")]
    Chart {
        file_stem: String,
        source: ChartError,
    },
    #[error("Failed to write manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// A chart written to disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifact {
    pub kind: ChartKind,
    pub title: String,
    pub path: PathBuf,
}

/// A chart that could not be produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartFailure {
    pub kind: ChartKind,
    pub file_stem: String,
    pub columns: Vec<String>,
    pub error: String,
}

/// Outcome of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationReport {
    pub output_dir: PathBuf,
    /// Written charts, in generation order
    pub artifacts: Vec<Artifact>,
    pub failures: Vec<ChartFailure>,
}

impl GenerationReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Produces the chart set for one dataset.
pub struct Generator {
    config: GeneratorConfig,
}

impl Generator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Load `csv_path` and generate every applicable chart.
    ///
    /// A load failure returns before the output location is touched.
    pub fn generate(&self, csv_path: &Path) -> Result<GenerationReport, GenerateError> {
        let mut loader = DataLoader::new();
        let df = loader.load_csv(csv_path)?.clone();
        info!(
            "Loaded {} rows with columns {:?} from {}",
            loader.get_row_count(),
            loader.get_columns(),
            csv_path.display()
        );
        self.generate_frame(&df)
    }

    /// Generate every applicable chart for an already loaded frame.
    pub fn generate_frame(&self, df: &DataFrame) -> Result<GenerationReport, GenerateError> {
        let classes = DataProcessor::classify(df);
        debug!(
            "Columns: numeric={:?} categorical={:?} date={:?}",
            classes.numeric, classes.categorical, classes.date
        );
        let cleaned = DataProcessor::drop_incomplete_rows(df, &classes.numeric)?;
        if cleaned.height() < df.height() {
            info!(
                "Dropped {} rows with missing numeric values",
                df.height() - cleaned.height()
            );
        }

        let output_dir = self.prepare_output()?;
        let specs = ChartSelector::new(&self.config).select(&classes);
        info!(
            "Planned {} charts into {}",
            specs.len(),
            output_dir.display()
        );

        let descriptors: Vec<Result<ChartData, ChartError>> = specs
            .par_iter()
            .map(|spec| ChartData::build(&cleaned, spec, &self.config))
            .collect();

        let options = RenderOptions {
            width: self.config.width,
            height: self.config.height,
            format: self.config.format,
        };
        let extension = self.config.format.extension();

        let mut report = GenerationReport {
            output_dir: output_dir.clone(),
            artifacts: Vec::new(),
            failures: Vec::new(),
        };

        for (spec, descriptor) in specs.iter().zip(descriptors) {
            let path = output_dir.join(format!("{}.{}", spec.file_stem, extension));
            let outcome = descriptor.and_then(|chart| {
                ChartRenderer::render(&chart, &path, &options).map(|()| chart.title)
            });

            match outcome {
                Ok(title) => {
                    debug!("Wrote {}", path.display());
                    report.artifacts.push(Artifact {
                        kind: spec.kind,
                        title,
                        path,
                    });
                }
                Err(source) if self.config.fail_fast => {
                    discard_partial(&path);
                    return Err(GenerateError::Chart {
                        file_stem: spec.file_stem.clone(),
                        source,
                    });
                }
                Err(err) => {
                    warn!("Skipping {}: {}", spec.file_stem, err);
                    discard_partial(&path);
                    report.failures.push(ChartFailure {
                        kind: spec.kind,
                        file_stem: spec.file_stem.clone(),
                        columns: spec.columns.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        self.write_manifest(&report)?;
        info!(
            "Generated {} charts ({} failed) in {}",
            report.artifacts.len(),
            report.failures.len(),
            output_dir.display()
        );
        Ok(report)
    }

    /// Create the directory this run writes into.
    fn prepare_output(&self) -> Result<PathBuf, GenerateError> {
        let dir = match &self.config.output {
            OutputLocation::Isolated { root } => {
                root.join(format!("run-{}", Uuid::new_v4().simple()))
            }
            OutputLocation::Fixed(dir) => {
                match fs::remove_dir_all(dir) {
                    Ok(()) => debug!("Cleared {}", dir.display()),
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(source) => {
                        return Err(GenerateError::Io {
                            path: dir.clone(),
                            source,
                        })
                    }
                }
                dir.clone()
            }
        };

        fs::create_dir_all(&dir).map_err(|source| GenerateError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }

    fn write_manifest(&self, report: &GenerationReport) -> Result<(), GenerateError> {
        let path = report.output_dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(report)?;
        fs::write(&path, json).map_err(|source| GenerateError::Io { path, source })
    }
}

/// Remove whatever a failed render left behind so the directory only holds
/// reported artifacts.
fn discard_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed partial {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove partial {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChartStyle;
    use polars::prelude::df;

    fn frame() -> DataFrame {
        df!(
            "age" => [31i64, 45, 27, 38, 52],
            "income" => [42.0f64, 61.5, 35.2, 50.1, 70.3],
            "city" => ["Paris", "Lyon", "Paris", "Nice", "Lyon"]
        )
        .unwrap()
    }

    fn fixed(dir: &Path) -> GeneratorConfig {
        GeneratorConfig {
            width: 400,
            height: 300,
            output: OutputLocation::Fixed(dir.to_path_buf()),
            ..GeneratorConfig::default()
        }
    }

    #[test]
    fn every_planned_chart_is_accounted_for() {
        let scratch = tempfile::tempdir().unwrap();
        let generator = Generator::new(fixed(&scratch.path().join("out")));
        let report = generator.generate_frame(&frame()).unwrap();

        // 2 histograms, 2 box plots, 1 scatter, 1 bar, 1 pie
        assert_eq!(report.artifacts.len() + report.failures.len(), 7);
        for artifact in &report.artifacts {
            assert!(artifact.path.is_file());
            assert!(artifact.path.starts_with(&report.output_dir));
        }
        assert!(report.output_dir.join(MANIFEST_FILE).is_file());
    }

    #[test]
    fn fixed_directory_is_cleared_between_runs() {
        let scratch = tempfile::tempdir().unwrap();
        let out = scratch.path().join("out");
        fs::create_dir_all(&out).unwrap();
        let stale = out.join("stale.png");
        fs::write(&stale, b"old").unwrap();

        let generator = Generator::new(fixed(&out));
        let first = generator.generate_frame(&frame()).unwrap();
        assert!(!stale.exists());

        let second = generator.generate_frame(&frame()).unwrap();
        assert_eq!(first.output_dir, second.output_dir);
        let paths = |report: &GenerationReport| -> Vec<PathBuf> {
            report.artifacts.iter().map(|a| a.path.clone()).collect()
        };
        assert_eq!(paths(&first), paths(&second));

        let mut listed: Vec<PathBuf> = fs::read_dir(&out)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        listed.sort();
        let mut expected = paths(&second);
        expected.push(out.join(MANIFEST_FILE));
        expected.sort();
        assert_eq!(listed, expected);
    }

    #[test]
    fn isolated_runs_get_distinct_directories() {
        let scratch = tempfile::tempdir().unwrap();
        let config = GeneratorConfig {
            width: 400,
            height: 300,
            style: ChartStyle::ThreeD,
            output: OutputLocation::Isolated {
                root: scratch.path().to_path_buf(),
            },
            ..GeneratorConfig::default()
        };
        let generator = Generator::new(config);
        let a = generator.generate_frame(&frame()).unwrap();
        let b = generator.generate_frame(&frame()).unwrap();

        assert_ne!(a.output_dir, b.output_dir);
        assert!(a.output_dir.starts_with(scratch.path()));
        assert!(a.output_dir.is_dir() && b.output_dir.is_dir());
    }

    #[test]
    fn load_failure_leaves_output_untouched() {
        let scratch = tempfile::tempdir().unwrap();
        let out = scratch.path().join("out");
        let generator = Generator::new(fixed(&out));

        let err = generator
            .generate(&scratch.path().join("missing.csv"))
            .unwrap_err();
        assert!(matches!(err, GenerateError::Load(LoaderError::NotFound(_))));
        assert!(!out.exists());
    }

    #[test]
    fn malformed_csv_fails_before_output_is_created() {
        let scratch = tempfile::tempdir().unwrap();
        let csv = scratch.path().join("ragged.csv");
        fs::write(&csv, "a,b\n1,2\n3,4,5,6\n").unwrap();
        let out = scratch.path().join("out");

        let err = Generator::new(fixed(&out)).generate(&csv).unwrap_err();
        assert!(matches!(err, GenerateError::Load(LoaderError::CsvError(_))));
        assert!(!out.exists());
    }

    #[test]
    fn text_only_frame_still_gets_categorical_charts() {
        let scratch = tempfile::tempdir().unwrap();
        let df = df!("city" => ["Paris", "Lyon", "Paris"]).unwrap();
        let report = Generator::new(fixed(&scratch.path().join("out")))
            .generate_frame(&df)
            .unwrap();
        assert_eq!(report.artifacts.len() + report.failures.len(), 2);
    }

    #[test]
    fn manifest_lists_the_report() {
        let scratch = tempfile::tempdir().unwrap();
        let report = Generator::new(fixed(&scratch.path().join("out")))
            .generate_frame(&frame())
            .unwrap();
        let text = fs::read_to_string(report.output_dir.join(MANIFEST_FILE)).unwrap();
        let manifest: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            manifest["artifacts"].as_array().unwrap().len(),
            report.artifacts.len()
        );
        assert_eq!(
            manifest["failures"].as_array().unwrap().len(),
            report.failures.len()
        );
    }

    #[test]
    fn fail_fast_stops_on_a_broken_chart() {
        let scratch = tempfile::tempdir().unwrap();
        // All values are null, so the histogram cannot be built.
        let df = df!("empty" => [None::<f64>, None]).unwrap();
        let config = GeneratorConfig {
            fail_fast: true,
            ..fixed(&scratch.path().join("out"))
        };
        let err = Generator::new(config).generate_frame(&df).unwrap_err();
        assert!(matches!(err, GenerateError::Chart { ref file_stem, .. } if file_stem == "histogram_empty"));
    }
}
