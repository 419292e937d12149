//! Static Chart Renderer
//! Draws chart descriptors to PNG or SVG files with plotters.
//!
//! Every chart gets its own backend which is presented (flushed to disk)
//! before the next chart starts.

use crate::charts::{ChartBody, ChartData, ChartError, ChartKind, TimeSeries};
use crate::config::OutputFormat;
use crate::stats::{padded_range, value_range, BoxStats, HistogramBin, StatsCalculator, SurfaceGrid};
use chrono::DateTime;
use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::element::Cubiod;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::FontTransform;
use std::f64::consts::PI;
use std::path::Path;

const FONT: &str = "sans-serif";
const TITLE_SIZE: i32 = 28;
const LABEL_SIZE: i32 = 16;

const CONTROL_COLOR: RGBColor = RGBColor(52, 152, 219); // Blue

const PALETTE: [RGBColor; 10] = [
    RGBColor(231, 76, 60),  // Red
    RGBColor(46, 204, 113), // Green
    RGBColor(155, 89, 182), // Purple
    RGBColor(243, 156, 18), // Orange
    RGBColor(26, 188, 156), // Teal
    RGBColor(233, 30, 99),  // Pink
    RGBColor(0, 188, 212),  // Cyan
    RGBColor(255, 87, 34),  // Deep Orange
    RGBColor(121, 85, 72),  // Brown
    RGBColor(96, 125, 139), // Blue Grey
];

const NEUTRAL: RGBColor = RGBColor(200, 200, 200);

// Viridis anchor colours, evenly spaced from 0 to 1
const VIRIDIS: [(u8, u8, u8); 5] = [
    (68, 1, 84),
    (59, 82, 139),
    (33, 145, 140),
    (94, 201, 98),
    (253, 231, 37),
];

/// Bar charts with more categories than this get rotated labels.
const ROTATE_LABELS_ABOVE: usize = 8;

/// Size and format of rendered artifacts.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
}

/// Writes chart descriptors to disk.
pub struct ChartRenderer;

impl ChartRenderer {
    /// Render one chart to `path` and flush it.
    pub fn render(chart: &ChartData, path: &Path, options: &RenderOptions) -> Result<(), ChartError> {
        let size = (options.width, options.height);
        match options.format {
            OutputFormat::Png => {
                let root = BitMapBackend::new(path, size).into_drawing_area();
                Self::draw(&root, chart)?;
                root.present().map_err(render_error)?;
            }
            OutputFormat::Svg => {
                let root = SVGBackend::new(path, size).into_drawing_area();
                Self::draw(&root, chart)?;
                root.present().map_err(render_error)?;
            }
        }
        Ok(())
    }

    fn draw<DB: DrawingBackend>(
        root: &DrawingArea<DB, Shift>,
        chart: &ChartData,
    ) -> Result<(), ChartError> {
        root.fill(&WHITE).map_err(render_error)?;
        let title = chart.title.as_str();
        let three_d = chart.spec.three_d;

        match &chart.body {
            ChartBody::Histogram { column, bins } if three_d => {
                draw_histogram_3d(root, title, column, bins)
            }
            ChartBody::Histogram { column, bins } => draw_histogram(root, title, column, bins),
            ChartBody::BoxPlot { column, stats } if three_d => {
                draw_box_3d(root, title, column, stats)
            }
            ChartBody::BoxPlot { column, stats } => draw_box(root, title, column, stats),
            ChartBody::Scatter {
                x_label,
                y_label,
                points,
            } if three_d => draw_scatter_3d(root, title, x_label, y_label, points),
            ChartBody::Scatter {
                x_label,
                y_label,
                points,
            } => draw_scatter(root, title, x_label, y_label, points),
            ChartBody::ScatterMatrix {
                columns,
                values,
                bins,
            } => draw_scatter_matrix(root, title, columns, values, *bins),
            ChartBody::Surface {
                labels,
                grid,
                points,
            } => draw_surface(root, title, labels, grid, points),
            ChartBody::Heatmap { columns, matrix } => draw_heatmap(root, title, columns, matrix),
            ChartBody::Categories { column, counts } => match chart.spec.kind {
                ChartKind::Pie => draw_pie(root, title, counts),
                _ => draw_bar(root, title, column, counts),
            },
            ChartBody::Violin {
                column,
                density,
                stats,
            } => draw_violin(root, title, column, density, stats),
            ChartBody::Line { time_label, series } => draw_line(root, title, time_label, series),
        }
    }
}

fn render_error<E: std::error::Error + Send + Sync>(err: DrawingAreaErrorKind<E>) -> ChartError {
    ChartError::Render(err.to_string())
}

fn title_font() -> FontDesc<'static> {
    (FONT, TITLE_SIZE).into_font()
}

fn label_font() -> FontDesc<'static> {
    (FONT, LABEL_SIZE).into_font()
}

fn series_color(index: usize) -> RGBColor {
    if index == 0 {
        CONTROL_COLOR
    } else {
        PALETTE[(index - 1) % PALETTE.len()]
    }
}

fn max_count(bins: &[HistogramBin]) -> f64 {
    bins.iter().map(|b| b.count).max().unwrap_or(0).max(1) as f64
}

fn draw_histogram<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: &str,
    column: &str,
    bins: &[HistogramBin],
) -> Result<(), ChartError> {
    let x_range = padded_range(
        value_range(bins.iter().flat_map(|b| [b.lower, b.upper])),
        0.02,
    );
    let y_max = max_count(bins) * 1.1;

    let mut chart = ChartBuilder::on(root)
        .caption(title, title_font())
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range.0..x_range.1, 0f64..y_max)
        .map_err(render_error)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(column)
        .y_desc("Frequency")
        .label_style(label_font())
        .draw()
        .map_err(render_error)?;

    chart
        .draw_series(bins.iter().map(|b| {
            Rectangle::new(
                [(b.lower, 0.0), (b.upper, b.count as f64)],
                CONTROL_COLOR.mix(0.7).filled(),
            )
        }))
        .map_err(render_error)?;
    chart
        .draw_series(bins.iter().map(|b| {
            Rectangle::new([(b.lower, 0.0), (b.upper, b.count as f64)], BLACK.mix(0.6))
        }))
        .map_err(render_error)?;

    Ok(())
}

/// Bars along the diagonal of a (value, value) grid, like a 2D histogram of
/// a column against itself.
fn draw_histogram_3d<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: &str,
    column: &str,
    bins: &[HistogramBin],
) -> Result<(), ChartError> {
    let (lo, hi) = value_range(bins.iter().flat_map(|b| [b.lower, b.upper]));
    let y_max = max_count(bins) * 1.1;

    let mut chart = ChartBuilder::on(root)
        .caption(format!("{title} (x, z: {column})"), title_font())
        .margin(20)
        .build_cartesian_3d(lo..hi, 0f64..y_max, lo..hi)
        .map_err(render_error)?;
    chart.with_projection(|mut pb| {
        pb.yaw = 0.6;
        pb.pitch = 0.35;
        pb.scale = 0.85;
        pb.into_matrix()
    });
    chart
        .configure_axes()
        .light_grid_style(BLACK.mix(0.1))
        .max_light_lines(3)
        .draw()
        .map_err(render_error)?;

    chart
        .draw_series(bins.iter().filter(|b| b.count > 0).map(|b| {
            let inset = (b.upper - b.lower) * 0.1;
            Cubiod::new(
                [
                    (b.lower + inset, 0.0, b.lower + inset),
                    (b.upper - inset, b.count as f64, b.upper - inset),
                ],
                CONTROL_COLOR.mix(0.8).filled(),
                BLACK.mix(0.6),
            )
        }))
        .map_err(render_error)?;

    Ok(())
}

fn box_range(stats: &BoxStats) -> (f64, f64) {
    let values = [stats.whisker_low, stats.whisker_high]
        .into_iter()
        .chain(stats.outliers.iter().copied());
    padded_range(value_range(values), 0.1)
}

fn draw_box<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: &str,
    column: &str,
    stats: &BoxStats,
) -> Result<(), ChartError> {
    let (y0, y1) = box_range(stats);
    let mut chart = ChartBuilder::on(root)
        .caption(title, title_font())
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(0f64..1f64, y0..y1)
        .map_err(render_error)?;

    let no_labels = |_: &f64| String::new();
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(2)
        .x_label_formatter(&no_labels)
        .x_desc(column)
        .y_desc("Value")
        .label_style(label_font())
        .draw()
        .map_err(render_error)?;

    let (left, right, mid) = (0.3, 0.7, 0.5);
    chart
        .draw_series([
            Rectangle::new(
                [(left, stats.q1), (right, stats.q3)],
                CONTROL_COLOR.mix(0.3).filled(),
            ),
            Rectangle::new(
                [(left, stats.q1), (right, stats.q3)],
                CONTROL_COLOR.stroke_width(2),
            ),
        ])
        .map_err(render_error)?;

    let whiskers = [
        vec![(mid, stats.q3), (mid, stats.whisker_high)],
        vec![(mid, stats.q1), (mid, stats.whisker_low)],
        vec![(0.4, stats.whisker_high), (0.6, stats.whisker_high)],
        vec![(0.4, stats.whisker_low), (0.6, stats.whisker_low)],
    ];
    chart
        .draw_series(
            whiskers
                .into_iter()
                .map(|path| PathElement::new(path, BLACK.stroke_width(2))),
        )
        .map_err(render_error)?;
    chart
        .draw_series(std::iter::once(PathElement::new(
            vec![(left, stats.median), (right, stats.median)],
            PALETTE[0].stroke_width(3),
        )))
        .map_err(render_error)?;
    chart
        .draw_series(std::iter::once(Cross::new((mid, stats.mean), 6, BLACK)))
        .map_err(render_error)?;
    chart
        .draw_series(
            stats
                .outliers
                .iter()
                .map(|&v| Circle::new((mid, v), 4, PALETTE[0].filled())),
        )
        .map_err(render_error)?;

    Ok(())
}

fn draw_box_3d<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: &str,
    column: &str,
    stats: &BoxStats,
) -> Result<(), ChartError> {
    let (y0, y1) = box_range(stats);
    let mut chart = ChartBuilder::on(root)
        .caption(format!("{title} (value: {column})"), title_font())
        .margin(20)
        .build_cartesian_3d(-1f64..1f64, y0..y1, -1f64..1f64)
        .map_err(render_error)?;
    chart.with_projection(|mut pb| {
        pb.yaw = 0.5;
        pb.pitch = 0.25;
        pb.scale = 0.85;
        pb.into_matrix()
    });
    chart
        .configure_axes()
        .light_grid_style(BLACK.mix(0.1))
        .max_light_lines(3)
        .draw()
        .map_err(render_error)?;

    let half = 0.35;
    chart
        .draw_series(std::iter::once(Cubiod::new(
            [(-half, stats.q1, -half), (half, stats.q3, half)],
            CONTROL_COLOR.mix(0.4).filled(),
            CONTROL_COLOR.stroke_width(2),
        )))
        .map_err(render_error)?;

    let median_ring = vec![
        (-half, stats.median, -half),
        (half, stats.median, -half),
        (half, stats.median, half),
        (-half, stats.median, half),
        (-half, stats.median, -half),
    ];
    chart
        .draw_series([
            PathElement::new(median_ring, PALETTE[0].stroke_width(3)),
            PathElement::new(
                vec![(0.0, stats.q3, 0.0), (0.0, stats.whisker_high, 0.0)],
                BLACK.stroke_width(2),
            ),
            PathElement::new(
                vec![(0.0, stats.q1, 0.0), (0.0, stats.whisker_low, 0.0)],
                BLACK.stroke_width(2),
            ),
        ])
        .map_err(render_error)?;
    chart
        .draw_series(
            stats
                .outliers
                .iter()
                .map(|&v| Circle::new((0.0, v, 0.0), 4, PALETTE[0].filled())),
        )
        .map_err(render_error)?;

    Ok(())
}

fn draw_scatter<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: &str,
    x_label: &str,
    y_label: &str,
    points: &[(f64, f64)],
) -> Result<(), ChartError> {
    let (x0, x1) = padded_range(value_range(points.iter().map(|p| p.0)), 0.05);
    let (y0, y1) = padded_range(value_range(points.iter().map(|p| p.1)), 0.05);

    let mut chart = ChartBuilder::on(root)
        .caption(title, title_font())
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(x0..x1, y0..y1)
        .map_err(render_error)?;

    chart
        .configure_mesh()
        .x_desc(x_label)
        .y_desc(y_label)
        .label_style(label_font())
        .draw()
        .map_err(render_error)?;

    chart
        .draw_series(
            points
                .iter()
                .map(|&p| Circle::new(p, 4, CONTROL_COLOR.mix(0.6).filled())),
        )
        .map_err(render_error)?;

    Ok(())
}

/// Points at (a, b, b): the pair's second column drives both depth and height.
fn draw_scatter_3d<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: &str,
    x_label: &str,
    y_label: &str,
    points: &[(f64, f64)],
) -> Result<(), ChartError> {
    let (x0, x1) = padded_range(value_range(points.iter().map(|p| p.0)), 0.05);
    let (y0, y1) = padded_range(value_range(points.iter().map(|p| p.1)), 0.05);

    let mut chart = ChartBuilder::on(root)
        .caption(
            format!("{title} (x: {x_label}, y/z: {y_label})"),
            title_font(),
        )
        .margin(20)
        .build_cartesian_3d(x0..x1, y0..y1, y0..y1)
        .map_err(render_error)?;
    chart.with_projection(|mut pb| {
        pb.yaw = 0.6;
        pb.pitch = 0.3;
        pb.scale = 0.85;
        pb.into_matrix()
    });
    chart
        .configure_axes()
        .light_grid_style(BLACK.mix(0.1))
        .max_light_lines(3)
        .draw()
        .map_err(render_error)?;

    chart
        .draw_series(
            points
                .iter()
                .map(|&(a, b)| Circle::new((a, b, b), 4, CONTROL_COLOR.mix(0.7).filled())),
        )
        .map_err(render_error)?;

    Ok(())
}

/// Grid of pairwise scatters with per-column histograms on the diagonal.
fn draw_scatter_matrix<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: &str,
    columns: &[String],
    values: &[Vec<f64>],
    bins: usize,
) -> Result<(), ChartError> {
    let n = columns.len().min(values.len());
    let body = root.titled(title, title_font()).map_err(render_error)?;
    let cells = body.split_evenly((n, n));
    let ranges: Vec<(f64, f64)> = values
        .iter()
        .map(|v| padded_range(value_range(v.iter().copied()), 0.05))
        .collect();
    let small = (FONT, 11).into_font();

    for (idx, cell) in cells.iter().enumerate() {
        let (row, col) = (idx / n, idx % n);
        let (x0, x1) = ranges[col];

        if row == col {
            let hist = StatsCalculator::histogram(&values[col], bins);
            let y_max = max_count(&hist) * 1.1;
            let mut chart = ChartBuilder::on(cell)
                .margin(4)
                .x_label_area_size(if row == n - 1 { 30 } else { 0 })
                .y_label_area_size(if col == 0 { 40 } else { 0 })
                .build_cartesian_2d(x0..x1, 0f64..y_max)
                .map_err(render_error)?;
            let mut mesh = chart.configure_mesh();
            mesh.x_labels(3).y_labels(3).label_style(small.clone());
            if row == n - 1 {
                mesh.x_desc(columns[col].as_str());
            }
            mesh.draw().map_err(render_error)?;
            chart
                .draw_series(hist.iter().map(|b| {
                    Rectangle::new(
                        [(b.lower, 0.0), (b.upper, b.count as f64)],
                        series_color(col).mix(0.7).filled(),
                    )
                }))
                .map_err(render_error)?;
        } else {
            let (y0, y1) = ranges[row];
            let mut chart = ChartBuilder::on(cell)
                .margin(4)
                .x_label_area_size(if row == n - 1 { 30 } else { 0 })
                .y_label_area_size(if col == 0 { 40 } else { 0 })
                .build_cartesian_2d(x0..x1, y0..y1)
                .map_err(render_error)?;
            let mut mesh = chart.configure_mesh();
            mesh.x_labels(3).y_labels(3).label_style(small.clone());
            if row == n - 1 {
                mesh.x_desc(columns[col].as_str());
            }
            if col == 0 {
                mesh.y_desc(columns[row].as_str());
            }
            mesh.draw().map_err(render_error)?;
            chart
                .draw_series(
                    values[col]
                        .iter()
                        .zip(&values[row])
                        .map(|(&x, &y)| Circle::new((x, y), 2, CONTROL_COLOR.mix(0.5).filled())),
                )
                .map_err(render_error)?;
        }
    }

    Ok(())
}

fn viridis(t: f64) -> RGBColor {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let scaled = t * (VIRIDIS.len() - 1) as f64;
    let idx = (scaled.floor() as usize).min(VIRIDIS.len() - 2);
    let frac = scaled - idx as f64;
    let (a, b) = (VIRIDIS[idx], VIRIDIS[idx + 1]);
    let lerp = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * frac).round() as u8;
    RGBColor(lerp(a.0, b.0), lerp(a.1, b.1), lerp(a.2, b.2))
}

/// Heights at grid nodes: mean of the cells touching each node.
fn node_heights(grid: &SurfaceGrid) -> Vec<Vec<f64>> {
    let cells = grid.heights.len();
    (0..=cells)
        .map(|a| {
            (0..=cells)
                .map(|b| {
                    let mut sum = 0.0;
                    let mut count = 0;
                    for i in a.saturating_sub(1)..(a + 1).min(cells) {
                        for j in b.saturating_sub(1)..(b + 1).min(cells) {
                            sum += grid.heights[i][j];
                            count += 1;
                        }
                    }
                    sum / count.max(1) as f64
                })
                .collect()
        })
        .collect()
}

/// Interpolated surface over the first two columns with the third as height.
fn draw_surface<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: &str,
    labels: &[String; 3],
    grid: &SurfaceGrid,
    points: &[(f64, f64, f64)],
) -> Result<(), ChartError> {
    let (Some(&x0), Some(&x1)) = (grid.x_edges.first(), grid.x_edges.last()) else {
        return Err(ChartError::Render("surface grid has no x edges".to_string()));
    };
    let (Some(&y0), Some(&y1)) = (grid.y_edges.first(), grid.y_edges.last()) else {
        return Err(ChartError::Render("surface grid has no y edges".to_string()));
    };
    let (z_lo, z_hi) = grid.z_range();
    let (z0, z1) = padded_range(
        value_range([z_lo, z_hi].into_iter().chain(points.iter().map(|p| p.2))),
        0.05,
    );
    let z_span = if z_hi > z_lo { z_hi - z_lo } else { 1.0 };

    let mut chart = ChartBuilder::on(root)
        .caption(
            format!("{title} (x: {}, y: {}, z: {})", labels[0], labels[1], labels[2]),
            title_font(),
        )
        .margin(20)
        .build_cartesian_3d(x0..x1, z0..z1, y0..y1)
        .map_err(render_error)?;
    chart.with_projection(|mut pb| {
        pb.yaw = 0.7;
        pb.pitch = 0.4;
        pb.scale = 0.8;
        pb.into_matrix()
    });
    chart
        .configure_axes()
        .light_grid_style(BLACK.mix(0.1))
        .max_light_lines(3)
        .draw()
        .map_err(render_error)?;

    let nodes = node_heights(grid);
    let cells = grid.heights.len();
    let quads = (0..cells).flat_map(|i| (0..cells).map(move |j| (i, j)));
    chart
        .draw_series(quads.map(|(i, j)| {
            let corners = [
                (i, j),
                (i + 1, j),
                (i + 1, j + 1),
                (i, j + 1),
            ];
            let mean = corners.iter().map(|&(a, b)| nodes[a][b]).sum::<f64>() / 4.0;
            let color = viridis((mean - z_lo) / z_span);
            Polygon::new(
                corners
                    .iter()
                    .map(|&(a, b)| (grid.x_edges[a], nodes[a][b], grid.y_edges[b]))
                    .collect::<Vec<_>>(),
                color.mix(0.9).filled(),
            )
        }))
        .map_err(render_error)?;

    chart
        .draw_series(
            points
                .iter()
                .map(|&(px, py, pz)| Circle::new((px, pz, py), 2, BLACK.mix(0.5).filled())),
        )
        .map_err(render_error)?;

    Ok(())
}

/// Diverging blue-white-red scale for correlations in [-1, 1].
fn correlation_color(r: f64) -> RGBColor {
    if !r.is_finite() {
        return NEUTRAL;
    }
    let r = r.clamp(-1.0, 1.0);
    let (target, t) = if r < 0.0 {
        ((59.0, 76.0, 192.0), -r)
    } else {
        ((180.0, 4.0, 38.0), r)
    };
    let mix = |end: f64| (255.0 + (end - 255.0) * t).round() as u8;
    RGBColor(mix(target.0), mix(target.1), mix(target.2))
}

fn segment_label(value: &SegmentValue<u32>, labels: &[String], reversed: bool) -> String {
    match value {
        SegmentValue::CenterOf(i) => {
            let i = *i as usize;
            let idx = if reversed {
                labels.len().checked_sub(i + 1)
            } else {
                Some(i)
            };
            idx.and_then(|k| labels.get(k)).cloned().unwrap_or_default()
        }
        _ => String::new(),
    }
}

fn draw_heatmap<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: &str,
    columns: &[String],
    matrix: &[Vec<f64>],
) -> Result<(), ChartError> {
    let n = columns.len() as u32;
    let mut chart = ChartBuilder::on(root)
        .caption(title, title_font())
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(140)
        .build_cartesian_2d((0u32..n).into_segmented(), (0u32..n).into_segmented())
        .map_err(render_error)?;

    let x_fmt = |v: &SegmentValue<u32>| segment_label(v, columns, false);
    let y_fmt = |v: &SegmentValue<u32>| segment_label(v, columns, true);
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(columns.len())
        .y_labels(columns.len())
        .x_label_formatter(&x_fmt)
        .y_label_formatter(&y_fmt)
        .label_style(label_font())
        .draw()
        .map_err(render_error)?;

    // Row 0 of the matrix is drawn at the top.
    let cells: Vec<(u32, u32, f64)> = matrix
        .iter()
        .enumerate()
        .flat_map(|(i, row)| {
            row.iter()
                .enumerate()
                .map(move |(j, &r)| (j as u32, n - 1 - i as u32, r))
        })
        .collect();

    chart
        .draw_series(cells.iter().map(|&(x, y, r)| {
            Rectangle::new(
                [
                    (SegmentValue::Exact(x), SegmentValue::Exact(y)),
                    (SegmentValue::Exact(x + 1), SegmentValue::Exact(y + 1)),
                ],
                correlation_color(r).filled(),
            )
        }))
        .map_err(render_error)?;

    let centered = TextStyle::from(label_font()).pos(Pos::new(HPos::Center, VPos::Center));
    chart
        .draw_series(cells.iter().map(|&(x, y, r)| {
            let text = if r.is_finite() {
                format!("{r:.2}")
            } else {
                "n/a".to_string()
            };
            Text::new(
                text,
                (SegmentValue::CenterOf(x), SegmentValue::CenterOf(y)),
                centered.clone(),
            )
        }))
        .map_err(render_error)?;

    Ok(())
}

fn draw_bar<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: &str,
    column: &str,
    counts: &[(String, usize)],
) -> Result<(), ChartError> {
    let k = counts.len() as u32;
    let y_max = ((counts.iter().map(|c| c.1).max().unwrap_or(0) as f64 * 1.1).ceil() as u32).max(1);
    let rotate = counts.len() > ROTATE_LABELS_ABOVE;

    let mut chart = ChartBuilder::on(root)
        .caption(title, title_font())
        .margin(20)
        .x_label_area_size(if rotate { 140 } else { 50 })
        .y_label_area_size(60)
        .build_cartesian_2d((0u32..k).into_segmented(), 0u32..y_max)
        .map_err(render_error)?;

    let labels: Vec<String> = counts.iter().map(|(label, _)| label.clone()).collect();
    let x_fmt = |v: &SegmentValue<u32>| segment_label(v, &labels, false);
    let x_style = if rotate {
        label_font().transform(FontTransform::Rotate90)
    } else {
        label_font()
    };
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(counts.len())
        .x_label_formatter(&x_fmt)
        .x_label_style(x_style)
        .x_desc(column)
        .y_desc("Count")
        .draw()
        .map_err(render_error)?;

    chart
        .draw_series(
            Histogram::vertical(&chart)
                .style(CONTROL_COLOR.mix(0.8).filled())
                .margin(8)
                .data(
                    counts
                        .iter()
                        .enumerate()
                        .map(|(i, (_, c))| (i as u32, *c as u32)),
                ),
        )
        .map_err(render_error)?;

    Ok(())
}

/// Sectors drawn clockwise from twelve o'clock with a legend on the right.
fn draw_pie<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: &str,
    counts: &[(String, usize)],
) -> Result<(), ChartError> {
    let body = root.titled(title, title_font()).map_err(render_error)?;
    let (w, h) = body.dim_in_pixel();
    let (w, h) = (w as f64, h as f64);
    let center = (w * 0.38, h * 0.5);
    let radius = (w * 0.3).min(h * 0.42);
    let total = counts.iter().map(|c| c.1).sum::<usize>().max(1) as f64;

    let centered = TextStyle::from(label_font())
        .color(&WHITE)
        .pos(Pos::new(HPos::Center, VPos::Center));
    let mut start = -PI / 2.0;

    for (i, (_, count)) in counts.iter().enumerate() {
        let share = *count as f64 / total;
        let sweep = share * 2.0 * PI;
        let steps = ((sweep / (2.0 * PI)) * 360.0).ceil().max(2.0) as usize;

        let mut sector = vec![(center.0.round() as i32, center.1.round() as i32)];
        sector.extend((0..=steps).map(|s| {
            let angle = start + sweep * s as f64 / steps as f64;
            (
                (center.0 + radius * angle.cos()).round() as i32,
                (center.1 + radius * angle.sin()).round() as i32,
            )
        }));
        body.draw(&Polygon::new(sector, series_color(i).filled()))
            .map_err(render_error)?;

        if share >= 0.04 {
            let mid = start + sweep / 2.0;
            let at = (
                (center.0 + radius * 0.65 * mid.cos()).round() as i32,
                (center.1 + radius * 0.65 * mid.sin()).round() as i32,
            );
            body.draw(&Text::new(
                format!("{:.1}%", share * 100.0),
                at,
                centered.clone(),
            ))
            .map_err(render_error)?;
        }
        start += sweep;
    }

    let legend_x = (w * 0.74).round() as i32;
    let mut legend_y = ((h - counts.len() as f64 * 24.0) / 2.0).max(10.0).round() as i32;
    for (i, (label, count)) in counts.iter().enumerate() {
        body.draw(&Rectangle::new(
            [(legend_x, legend_y), (legend_x + 14, legend_y + 14)],
            series_color(i).filled(),
        ))
        .map_err(render_error)?;
        body.draw(&Text::new(
            format!("{label} ({count})"),
            (legend_x + 20, legend_y),
            label_font(),
        ))
        .map_err(render_error)?;
        legend_y += 24;
    }

    Ok(())
}

fn draw_violin<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: &str,
    column: &str,
    density: &[(f64, f64)],
    stats: &BoxStats,
) -> Result<(), ChartError> {
    let (y0, y1) = padded_range(value_range(density.iter().map(|d| d.0)), 0.02);
    let peak = density
        .iter()
        .map(|d| d.1)
        .fold(0.0f64, f64::max)
        .max(f64::MIN_POSITIVE);

    let mut chart = ChartBuilder::on(root)
        .caption(title, title_font())
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(-1f64..1f64, y0..y1)
        .map_err(render_error)?;

    let no_labels = |_: &f64| String::new();
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(2)
        .x_label_formatter(&no_labels)
        .x_desc(column)
        .y_desc("Value")
        .label_style(label_font())
        .draw()
        .map_err(render_error)?;

    let half_width = 0.8;
    let mut outline: Vec<(f64, f64)> = density
        .iter()
        .map(|&(v, d)| (d / peak * half_width, v))
        .collect();
    outline.extend(density.iter().rev().map(|&(v, d)| (-d / peak * half_width, v)));

    chart
        .draw_series(std::iter::once(Polygon::new(
            outline.clone(),
            PALETTE[2].mix(0.4).filled(),
        )))
        .map_err(render_error)?;
    if let Some(&first) = outline.first() {
        outline.push(first);
    }
    chart
        .draw_series(std::iter::once(PathElement::new(
            outline,
            PALETTE[2].stroke_width(2),
        )))
        .map_err(render_error)?;

    chart
        .draw_series([
            Rectangle::new([(-0.05, stats.q1), (0.05, stats.q3)], BLACK.mix(0.8).filled()),
            Rectangle::new(
                [(-0.01, stats.whisker_low), (0.01, stats.whisker_high)],
                BLACK.mix(0.8).filled(),
            ),
        ])
        .map_err(render_error)?;
    chart
        .draw_series(std::iter::once(Circle::new(
            (0.0, stats.median),
            5,
            WHITE.filled(),
        )))
        .map_err(render_error)?;

    Ok(())
}

fn to_seconds(t: &chrono::NaiveDateTime) -> f64 {
    t.and_utc().timestamp() as f64
}

fn format_timestamp(seconds: f64, date_only: bool) -> String {
    DateTime::from_timestamp(seconds.round() as i64, 0)
        .map(|t| {
            if date_only {
                t.format("%Y-%m-%d").to_string()
            } else {
                t.format("%Y-%m-%d %H:%M").to_string()
            }
        })
        .unwrap_or_default()
}

fn draw_line<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: &str,
    time_label: &str,
    series: &[TimeSeries],
) -> Result<(), ChartError> {
    let all_points = || series.iter().flat_map(|s| s.points.iter());
    let (x0, x1) = padded_range(value_range(all_points().map(|(t, _)| to_seconds(t))), 0.02);
    let (y0, y1) = padded_range(value_range(all_points().map(|p| p.1)), 0.05);
    let date_only = all_points().all(|(t, _)| t.time() == chrono::NaiveTime::MIN);

    let mut chart = ChartBuilder::on(root)
        .caption(title, title_font())
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(x0..x1, y0..y1)
        .map_err(render_error)?;

    let x_fmt = |v: &f64| format_timestamp(*v, date_only);
    chart
        .configure_mesh()
        .x_labels(6)
        .x_label_formatter(&x_fmt)
        .x_desc(time_label)
        .y_desc(if series.len() == 1 {
            series[0].name.as_str()
        } else {
            "Value"
        })
        .label_style(label_font())
        .draw()
        .map_err(render_error)?;

    for (i, s) in series.iter().enumerate() {
        let color = series_color(i);
        chart
            .draw_series(LineSeries::new(
                s.points.iter().map(|(t, v)| (to_seconds(t), *v)),
                color.stroke_width(2),
            ))
            .map_err(render_error)?
            .label(s.name.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    if series.len() > 1 {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.85))
            .border_style(BLACK)
            .label_font(label_font())
            .draw()
            .map_err(render_error)?;
    }

    Ok(())
}
