//! Charts module - Chart selection, descriptors and rendering

mod plotter;
mod renderer;
mod selector;

pub use plotter::{ChartBody, ChartData, ChartError, TimeSeries};
pub use renderer::{ChartRenderer, RenderOptions};
pub use selector::{ChartKind, ChartSelector, ChartSpec};
