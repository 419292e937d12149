//! Chart Plotter Module
//! Builds chart descriptors: the pure data each chart is drawn from.
//!
//! Descriptors are independent of each other and of the drawing backend, so
//! they can be prepared in parallel and rendered in a separate final stage.

use crate::charts::{ChartKind, ChartSpec};
use crate::config::GeneratorConfig;
use crate::data::{DataProcessor, ProcessorError};
use crate::stats::{BoxStats, HistogramBin, StatsCalculator, SurfaceGrid};
use chrono::NaiveDateTime;
use polars::prelude::*;
use std::collections::BTreeMap;
use thiserror::Error;

/// Label for the categories folded together past `max_categories`.
pub const OTHER_LABEL: &str = "Other";

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error("Column '{column}' value '{value}' is not a date")]
    DateCoercion { column: String, value: String },
    #[error("Column '{0}' has no values to plot")]
    EmptyColumn(String),
    #[error("{kind} needs at least {needed} columns, got {got}")]
    NotEnoughColumns {
        kind: ChartKind,
        needed: usize,
        got: usize,
    },
    #[error("Render error: {0}")]
    Render(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ProcessorError> for ChartError {
    fn from(err: ProcessorError) -> Self {
        match err {
            ProcessorError::PolarsError(e) => ChartError::Polars(e),
            ProcessorError::DateCoercion { column, value } => {
                ChartError::DateCoercion { column, value }
            }
        }
    }
}

/// One named series of the time-indexed line chart.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    pub name: String,
    /// Sorted by time
    pub points: Vec<(NaiveDateTime, f64)>,
}

/// Drawing-ready content of a chart.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartBody {
    Histogram {
        column: String,
        bins: Vec<HistogramBin>,
    },
    BoxPlot {
        column: String,
        stats: BoxStats,
    },
    Scatter {
        x_label: String,
        y_label: String,
        points: Vec<(f64, f64)>,
    },
    ScatterMatrix {
        columns: Vec<String>,
        /// Row-aligned values, one vector per column
        values: Vec<Vec<f64>>,
        bins: usize,
    },
    Surface {
        labels: [String; 3],
        grid: SurfaceGrid,
        points: Vec<(f64, f64, f64)>,
    },
    Heatmap {
        columns: Vec<String>,
        matrix: Vec<Vec<f64>>,
    },
    /// Shared by bar and pie charts
    Categories {
        column: String,
        counts: Vec<(String, usize)>,
    },
    Violin {
        column: String,
        density: Vec<(f64, f64)>,
        stats: BoxStats,
    },
    Line {
        time_label: String,
        series: Vec<TimeSeries>,
    },
}

/// Descriptor for one chart spec.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartData {
    pub spec: ChartSpec,
    pub title: String,
    pub body: ChartBody,
}

impl ChartData {
    /// Extract and summarise the data this chart needs.
    pub fn build(
        df: &DataFrame,
        spec: &ChartSpec,
        config: &GeneratorConfig,
    ) -> Result<Self, ChartError> {
        let body = match spec.kind {
            ChartKind::Histogram => {
                let column = Self::column(spec, 0)?;
                let values = Self::non_empty(df, column)?;
                ChartBody::Histogram {
                    column: column.to_string(),
                    bins: StatsCalculator::histogram(&values, config.bins),
                }
            }
            ChartKind::BoxPlot => {
                let column = Self::column(spec, 0)?;
                let values = Self::non_empty(df, column)?;
                let stats = StatsCalculator::box_stats(&values)
                    .ok_or_else(|| ChartError::EmptyColumn(column.to_string()))?;
                ChartBody::BoxPlot {
                    column: column.to_string(),
                    stats,
                }
            }
            ChartKind::Scatter => {
                Self::require(spec, 2)?;
                let aligned = Self::aligned(df, &spec.columns[..2])?;
                ChartBody::Scatter {
                    x_label: spec.columns[0].clone(),
                    y_label: spec.columns[1].clone(),
                    points: aligned[0]
                        .iter()
                        .copied()
                        .zip(aligned[1].iter().copied())
                        .collect(),
                }
            }
            ChartKind::ScatterMatrix => {
                Self::require(spec, 2)?;
                ChartBody::ScatterMatrix {
                    columns: spec.columns.clone(),
                    values: Self::aligned(df, &spec.columns)?,
                    bins: config.bins,
                }
            }
            ChartKind::Surface => {
                Self::require(spec, 3)?;
                let aligned = Self::aligned(df, &spec.columns[..3])?;
                let (x, y, z) = (&aligned[0], &aligned[1], &aligned[2]);
                let grid = StatsCalculator::surface_grid(x, y, z, config.surface_grid)
                    .ok_or_else(|| ChartError::EmptyColumn(spec.columns[0].clone()))?;
                ChartBody::Surface {
                    labels: [
                        spec.columns[0].clone(),
                        spec.columns[1].clone(),
                        spec.columns[2].clone(),
                    ],
                    grid,
                    points: x
                        .iter()
                        .zip(y)
                        .zip(z)
                        .map(|((&x, &y), &z)| (x, y, z))
                        .collect(),
                }
            }
            ChartKind::CorrelationHeatmap => {
                Self::require(spec, 2)?;
                let aligned = Self::aligned(df, &spec.columns)?;
                ChartBody::Heatmap {
                    columns: spec.columns.clone(),
                    matrix: StatsCalculator::correlation_matrix(&aligned),
                }
            }
            ChartKind::Bar | ChartKind::Pie => {
                let column = Self::column(spec, 0)?;
                let counts = DataProcessor::category_counts(df, column)?;
                if counts.is_empty() {
                    return Err(ChartError::EmptyColumn(column.to_string()));
                }
                ChartBody::Categories {
                    column: column.to_string(),
                    counts: fold_categories(counts, config.max_categories),
                }
            }
            ChartKind::Violin => {
                let column = Self::column(spec, 0)?;
                let values = Self::non_empty(df, column)?;
                let stats = StatsCalculator::box_stats(&values)
                    .ok_or_else(|| ChartError::EmptyColumn(column.to_string()))?;
                ChartBody::Violin {
                    column: column.to_string(),
                    density: StatsCalculator::kde(&values),
                    stats,
                }
            }
            ChartKind::Line => {
                let time_column = Self::column(spec, 0)?;
                let series = Self::time_series(df, time_column, &spec.columns[1..])?;
                ChartBody::Line {
                    time_label: time_column.to_string(),
                    series,
                }
            }
        };

        Ok(Self {
            spec: spec.clone(),
            title: spec.title(),
            body,
        })
    }

    fn column(spec: &ChartSpec, index: usize) -> Result<&str, ChartError> {
        Self::require(spec, index + 1)?;
        Ok(spec.columns[index].as_str())
    }

    fn require(spec: &ChartSpec, needed: usize) -> Result<(), ChartError> {
        if spec.columns.len() < needed {
            return Err(ChartError::NotEnoughColumns {
                kind: spec.kind,
                needed,
                got: spec.columns.len(),
            });
        }
        Ok(())
    }

    fn non_empty(df: &DataFrame, column: &str) -> Result<Vec<f64>, ChartError> {
        let values = DataProcessor::numeric_values(df, column)?;
        if values.is_empty() {
            return Err(ChartError::EmptyColumn(column.to_string()));
        }
        Ok(values)
    }

    fn aligned(df: &DataFrame, columns: &[String]) -> Result<Vec<Vec<f64>>, ChartError> {
        let aligned = DataProcessor::aligned_values(df, columns)?;
        if aligned.first().map_or(true, |v| v.is_empty()) {
            return Err(ChartError::EmptyColumn(columns.join(", ")));
        }
        Ok(aligned)
    }

    /// One series per value column, or the record count per timestamp when
    /// there are no value columns.
    fn time_series(
        df: &DataFrame,
        time_column: &str,
        value_columns: &[String],
    ) -> Result<Vec<TimeSeries>, ChartError> {
        let times = DataProcessor::date_values(df, time_column)?;
        if times.iter().all(Option::is_none) {
            return Err(ChartError::EmptyColumn(time_column.to_string()));
        }

        if value_columns.is_empty() {
            let mut counts: BTreeMap<NaiveDateTime, usize> = BTreeMap::new();
            for t in times.iter().flatten() {
                *counts.entry(*t).or_default() += 1;
            }
            return Ok(vec![TimeSeries {
                name: "count".to_string(),
                points: counts.into_iter().map(|(t, c)| (t, c as f64)).collect(),
            }]);
        }

        value_columns
            .iter()
            .map(|name| {
                let values = DataProcessor::optional_values(df, name)?;
                let mut points: Vec<(NaiveDateTime, f64)> = times
                    .iter()
                    .zip(values)
                    .filter_map(|(t, v)| Some(((*t)?, v?)))
                    .collect();
                points.sort_by_key(|(t, _)| *t);
                Ok(TimeSeries {
                    name: name.clone(),
                    points,
                })
            })
            .collect()
    }
}

/// Keep the `max` most frequent categories; fold the rest into `Other`.
pub fn fold_categories(counts: Vec<(String, usize)>, max: usize) -> Vec<(String, usize)> {
    let max = max.max(2);
    if counts.len() <= max {
        return counts;
    }

    let mut kept: Vec<(String, usize)> = counts[..max - 1].to_vec();
    let rest: usize = counts[max - 1..].iter().map(|(_, c)| c).sum();
    kept.push((OTHER_LABEL.to_string(), rest));
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;
    use crate::charts::ChartSelector;
    use crate::config::ChartStyle;
    use crate::data::DataProcessor;

    fn frame() -> DataFrame {
        df!(
            "x" => [1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0],
            "y" => [2.0f64, 4.1, 5.9, 8.2, 9.8, 12.1],
            "z" => [0.5f64, 0.1, 0.9, 0.3, 0.7, 0.2],
            "city" => ["Paris", "Lyon", "Paris", "Nice", "Paris", "Lyon"],
            "date" => ["2024-01-03", "2024-01-01", "2024-01-02", "2024-01-05", "2024-01-04", "2024-01-06"]
        )
        .unwrap()
    }

    fn build_all(config: &GeneratorConfig) -> Vec<ChartData> {
        let df = frame();
        let classes = DataProcessor::classify(&df);
        ChartSelector::new(config)
            .select(&classes)
            .iter()
            .map(|spec| ChartData::build(&df, spec, config).unwrap())
            .collect()
    }

    #[test]
    fn every_selected_chart_builds() {
        let config = GeneratorConfig {
            extras: true,
            ..GeneratorConfig::default()
        };
        let charts = build_all(&config);
        assert_eq!(charts.len(), 3 + 3 + 2 + 1 + 1 + 1 + 1 + 3 + 1);

        let config = GeneratorConfig {
            style: ChartStyle::ThreeD,
            ..GeneratorConfig::default()
        };
        let charts = build_all(&config);
        assert!(charts
            .iter()
            .any(|c| matches!(c.body, ChartBody::Surface { .. })));
    }

    #[test]
    fn histogram_descriptor_uses_configured_bins() {
        let config = GeneratorConfig {
            bins: 3,
            ..GeneratorConfig::default()
        };
        let charts = build_all(&config);
        match &charts[0].body {
            ChartBody::Histogram { column, bins } => {
                assert_eq!(column, "x");
                assert_eq!(bins.len(), 3);
                assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 6);
            }
            other => panic!("unexpected body {other:?}"),
        }
        assert_eq!(charts[0].title, "Histogram of x");
    }

    #[test]
    fn scatter_pairs_adjacent_columns() {
        let charts = build_all(&GeneratorConfig::default());
        let scatter = charts
            .iter()
            .find(|c| c.spec.file_stem == "scatter_plot_y_z")
            .unwrap();
        match &scatter.body {
            ChartBody::Scatter {
                x_label,
                y_label,
                points,
            } => {
                assert_eq!((x_label.as_str(), y_label.as_str()), ("y", "z"));
                assert_eq!(points.len(), 6);
                assert_eq!(points[0], (2.0, 0.5));
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn line_series_are_sorted_by_time() {
        let charts = build_all(&GeneratorConfig::default());
        let line = charts.last().unwrap();
        match &line.body {
            ChartBody::Line { time_label, series } => {
                assert_eq!(time_label, "date");
                assert_eq!(series.len(), 3);
                assert!(series[0].points.windows(2).all(|w| w[0].0 <= w[1].0));
                assert_eq!(series[0].points[0].1, 2.0);
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn line_without_value_columns_counts_records() {
        let df = df!("date" => ["2024-01-01", "2024-01-01", "2024-01-02"]).unwrap();
        let config = GeneratorConfig::default();
        let classes = DataProcessor::classify(&df);
        let specs = ChartSelector::new(&config).select(&classes);
        assert_eq!(specs.len(), 1);

        let chart = ChartData::build(&df, &specs[0], &config).unwrap();
        match chart.body {
            ChartBody::Line { series, .. } => {
                assert_eq!(series[0].name, "count");
                let counts: Vec<f64> = series[0].points.iter().map(|p| p.1).collect();
                assert_eq!(counts, vec![2.0, 1.0]);
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn unparseable_date_fails_only_the_line_chart() {
        let df = df!("date" => ["2024-01-01", "soon"], "v" => [1.0f64, 2.0]).unwrap();
        let config = GeneratorConfig::default();
        let classes = DataProcessor::classify(&df);
        let specs = ChartSelector::new(&config).select(&classes);

        let results: Vec<_> = specs
            .iter()
            .map(|spec| ChartData::build(&df, spec, &config))
            .collect();
        assert!(results[..2].iter().all(Result::is_ok));
        assert!(matches!(
            results[2],
            Err(ChartError::DateCoercion { ref value, .. }) if value == "soon"
        ));
    }

    #[test]
    fn empty_numeric_column_is_a_chart_error() {
        let df = df!("v" => [None::<f64>, None]).unwrap();
        let config = GeneratorConfig::default();
        let specs = ChartSelector::new(&config).select(&DataProcessor::classify(&df));
        let err = ChartData::build(&df, &specs[0], &config).unwrap_err();
        assert!(matches!(err, ChartError::EmptyColumn(ref c) if c == "v"));
    }

    #[test]
    fn categories_fold_into_other() {
        let counts = vec![
            ("a".to_string(), 5),
            ("b".to_string(), 4),
            ("c".to_string(), 2),
            ("d".to_string(), 1),
        ];
        let folded = fold_categories(counts.clone(), 3);
        assert_eq!(
            folded,
            vec![
                ("a".to_string(), 5),
                ("b".to_string(), 4),
                (OTHER_LABEL.to_string(), 3)
            ]
        );
        assert_eq!(fold_categories(counts.clone(), 10), counts);
    }
}
