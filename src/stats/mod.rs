//! Stats module - Summary statistics behind the charts

mod calculator;

pub use calculator::{
    padded_range, value_range, BoxStats, HistogramBin, StatsCalculator, SurfaceGrid,
};
