//! Databoard - CSV to Chart Gallery Generator
//!
//! Reads a CSV file, picks the charts that suit its columns and writes them
//! as PNG or SVG files into a per-run output directory.

mod charts;
mod config;
mod data;
mod gallery;
mod generator;
mod stats;

use anyhow::{Context, Result};
use clap::Parser;
use config::{ChartStyle, GeneratorConfig, OutputFormat, OutputLocation};
use generator::Generator;
use log::{info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tempfile::NamedTempFile;

const EXAMPLE_CSV: &str = include_str!("../demos/example.csv");

/// Databoard: CSV to chart gallery
#[derive(Parser, Debug)]
#[command(name = "databoard")]
#[command(version)]
#[command(about = "Generate a chart gallery from a CSV file", long_about = None)]
struct Cli {
    /// CSV file with a header row
    #[arg(required_unless_present = "example")]
    csv: Option<PathBuf>,

    /// Use the bundled example dataset
    #[arg(long, conflicts_with = "csv")]
    example: bool,

    /// JSON config file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Chart style
    #[arg(long, value_enum)]
    style: Option<ChartStyle>,

    /// Output file format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Write into this directory, clearing it first
    #[arg(long, conflicts_with = "out_root")]
    out_dir: Option<PathBuf>,

    /// Create a fresh run-<id> directory under this root (default: the
    /// system temp dir). Old run directories are kept; remove them yourself
    #[arg(long)]
    out_root: Option<PathBuf>,

    /// Image width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Image height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Histogram bin count
    #[arg(long)]
    bins: Option<usize>,

    /// Also produce the scatter matrix and violin plots
    #[arg(long)]
    extras: bool,

    /// Stop at the first chart that fails
    #[arg(long)]
    fail_fast: bool,

    /// Write an index.html listing the charts
    #[arg(long)]
    gallery: bool,

    /// Open the gallery (or output directory) when done
    #[arg(long)]
    open: bool,
}

impl Cli {
    fn generator_config(&self) -> Result<GeneratorConfig> {
        let mut config = match &self.config {
            Some(path) => GeneratorConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => GeneratorConfig::default(),
        };

        if let Some(style) = self.style {
            config.style = style;
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(bins) = self.bins {
            config.bins = bins;
        }
        if let Some(dir) = &self.out_dir {
            config.output = OutputLocation::Fixed(dir.clone());
        } else if let Some(root) = &self.out_root {
            config.output = OutputLocation::Isolated { root: root.clone() };
        }
        config.extras |= self.extras;
        config.fail_fast |= self.fail_fast;

        Ok(config)
    }

    fn input(&self) -> Result<Input> {
        match &self.csv {
            Some(path) if !self.example => Ok(Input::File(path.clone())),
            _ => {
                let mut file = tempfile::Builder::new()
                    .prefix("databoard-example-")
                    .suffix(".csv")
                    .tempfile()
                    .context("creating example data file")?;
                file.write_all(EXAMPLE_CSV.as_bytes())
                    .with_context(|| format!("writing example data to {}", file.path().display()))?;
                Ok(Input::Example(file))
            }
        }
    }
}

/// The CSV to chart. The example file is deleted when dropped.
enum Input {
    File(PathBuf),
    Example(NamedTempFile),
}

impl Input {
    fn path(&self) -> &Path {
        match self {
            Input::File(path) => path,
            Input::Example(file) => file.path(),
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every chart was generated.
fn run(cli: Cli) -> Result<bool> {
    let config = cli.generator_config()?;
    let input = cli.input()?;
    let input = input.path();

    let generator = Generator::new(config);
    info!(
        "Style {:?}, format {:?}",
        generator.config().style,
        generator.config().format
    );
    let report = generator
        .generate(input)
        .with_context(|| format!("generating charts for {}", input.display()))?;

    for artifact in &report.artifacts {
        println!("{}", artifact.path.display());
    }

    let open_target = if cli.gallery {
        let page = gallery::write_gallery(&report).context("writing gallery index")?;
        info!("Gallery written to {}", page.display());
        page
    } else {
        report.output_dir.clone()
    };

    if !report.is_complete() {
        warn!(
            "{} of {} charts failed",
            report.failures.len(),
            report.failures.len() + report.artifacts.len()
        );
    }

    if cli.open {
        open::that(&open_target).with_context(|| format!("opening {}", open_target.display()))?;
    }

    Ok(report.is_complete())
}
