//! Chart Selector Module
//! Column-driven selection of the chart battery.
//!
//! Order of the produced specs is part of the output contract:
//! histograms, box plots, pairwise scatters, scatter matrix, surface or
//! heatmap, bar charts, pie chart, violins, date line chart.

use crate::config::{ChartStyle, GeneratorConfig};
use crate::data::ColumnClassification;
use serde::Serialize;
use std::fmt;

/// Every chart the generator knows how to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Histogram,
    BoxPlot,
    Scatter,
    ScatterMatrix,
    Surface,
    CorrelationHeatmap,
    Bar,
    Pie,
    Violin,
    Line,
}

impl ChartKind {
    fn stem_prefix(self) -> &'static str {
        match self {
            ChartKind::Histogram => "histogram",
            ChartKind::BoxPlot => "boxplot",
            ChartKind::Scatter => "scatter_plot",
            ChartKind::ScatterMatrix => "scatter_matrix",
            ChartKind::Surface => "surface_plot",
            ChartKind::CorrelationHeatmap => "correlation_heatmap",
            ChartKind::Bar => "bar_chart",
            ChartKind::Pie => "pie_chart",
            ChartKind::Violin => "violin_plot",
            ChartKind::Line => "line_chart",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChartKind::Histogram => "Histogram",
            ChartKind::BoxPlot => "Box Plot",
            ChartKind::Scatter => "Scatter Plot",
            ChartKind::ScatterMatrix => "Scatter Matrix",
            ChartKind::Surface => "Surface Plot",
            ChartKind::CorrelationHeatmap => "Correlation Heatmap",
            ChartKind::Bar => "Bar Chart",
            ChartKind::Pie => "Pie Chart",
            ChartKind::Violin => "Violin Plot",
            ChartKind::Line => "Line Chart",
        };
        f.write_str(name)
    }
}

/// One chart to generate: what to draw, from which columns, under which name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub columns: Vec<String>,
    /// Drawn with a 3D projection
    pub three_d: bool,
    /// Deterministic file name without extension
    pub file_stem: String,
}

impl ChartSpec {
    fn new(kind: ChartKind, columns: Vec<String>, three_d: bool) -> Self {
        let mut stem = String::new();
        if three_d {
            stem.push_str("3d_");
        }
        stem.push_str(kind.stem_prefix());

        // Whole-table charts are named by kind alone; the line chart by its
        // time column only.
        let named: &[String] = match kind {
            ChartKind::ScatterMatrix | ChartKind::Surface | ChartKind::CorrelationHeatmap => &[],
            ChartKind::Line => &columns[..columns.len().min(1)],
            _ => &columns,
        };
        for column in named {
            stem.push('_');
            stem.push_str(&sanitize_file_component(column));
        }

        Self {
            kind,
            columns,
            three_d,
            file_stem: stem,
        }
    }

    /// Human readable chart title.
    pub fn title(&self) -> String {
        let kind = if self.three_d {
            format!("3D {}", self.kind)
        } else {
            self.kind.to_string()
        };
        match self.kind {
            ChartKind::Scatter => format!("{} of {}", kind, self.columns.join(" vs ")),
            ChartKind::Line => match self.columns.first() {
                Some(time) => format!("{} over {}", kind, time),
                None => kind,
            },
            ChartKind::ScatterMatrix | ChartKind::CorrelationHeatmap => kind,
            _ => format!("{} of {}", kind, self.columns.join(", ")),
        }
    }
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_file_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Decides which charts a classified dataset gets.
pub struct ChartSelector<'a> {
    config: &'a GeneratorConfig,
}

impl<'a> ChartSelector<'a> {
    pub fn new(config: &'a GeneratorConfig) -> Self {
        Self { config }
    }

    /// Ordered chart specs for the given column classification.
    ///
    /// Charts needing two or three numeric columns are skipped, not failed,
    /// when there are too few.
    pub fn select(&self, classes: &ColumnClassification) -> Vec<ChartSpec> {
        let three_d = self.config.style == ChartStyle::ThreeD;
        let numeric = &classes.numeric;
        let mut specs = Vec::new();

        for column in numeric {
            specs.push(ChartSpec::new(
                ChartKind::Histogram,
                vec![column.clone()],
                three_d,
            ));
        }

        for column in numeric {
            specs.push(ChartSpec::new(
                ChartKind::BoxPlot,
                vec![column.clone()],
                three_d,
            ));
        }

        for pair in numeric.windows(2) {
            specs.push(ChartSpec::new(ChartKind::Scatter, pair.to_vec(), three_d));
        }

        if self.config.extras && numeric.len() >= 2 {
            specs.push(ChartSpec::new(
                ChartKind::ScatterMatrix,
                self.matrix_columns(numeric),
                false,
            ));
        }

        if numeric.len() >= 3 {
            let spec = if three_d {
                ChartSpec::new(ChartKind::Surface, numeric[..3].to_vec(), true)
            } else {
                ChartSpec::new(
                    ChartKind::CorrelationHeatmap,
                    self.matrix_columns(numeric),
                    false,
                )
            };
            specs.push(spec);
        }

        for column in &classes.categorical {
            specs.push(ChartSpec::new(ChartKind::Bar, vec![column.clone()], false));
        }

        if let Some(first) = classes.categorical.first() {
            specs.push(ChartSpec::new(ChartKind::Pie, vec![first.clone()], false));
        }

        if self.config.extras {
            for column in numeric {
                specs.push(ChartSpec::new(ChartKind::Violin, vec![column.clone()], false));
            }
        }

        if let Some(date) = &classes.date {
            // Time column first, then the series to plot against it.
            let mut columns = vec![date.clone()];
            columns.extend(numeric.iter().cloned());
            specs.push(ChartSpec::new(ChartKind::Line, columns, false));
        }

        specs
    }

    fn matrix_columns(&self, numeric: &[String]) -> Vec<String> {
        let cap = self.config.max_matrix_columns.max(2);
        numeric.iter().take(cap).cloned().collect()
    }
}
