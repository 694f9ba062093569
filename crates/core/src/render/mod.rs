//! Rendering backends.
//!
//! Both backends wrap a [`TraceComposer`] and differ only in the
//! [`FigureSurface`](crate::composer::FigureSurface) layers are attached to.

pub mod html;
pub mod raster;

use std::path::PathBuf;

use crate::{
    composer::{DrawFn, StyleFn, TraceComposer},
    config::{BackendKind, OutputConfig, PlaybackConfig},
    layer::{CellKind, TraceParams},
    timeline::Session,
    Result,
};

pub use html::HtmlFigure;
pub use raster::RasterFigure;

/// Result of a finished `show` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowOutcome {
    pub frames_rendered: usize,
    pub output: Option<PathBuf>,
}

pub trait RenderBackend {
    fn name(&self) -> &'static str;

    fn composer(&self) -> &TraceComposer;

    fn composer_mut(&mut self) -> &mut TraceComposer;

    fn set_ticks(&mut self, ticks: Vec<String>) {
        self.composer_mut().set_ticks(ticks);
    }

    fn set_subplot(&mut self, rows: usize, cols: usize, specs: Vec<Vec<CellKind>>) -> Result<()> {
        self.composer_mut().set_layout(rows, cols, specs)
    }

    /// Registers a trace on the 1-based `(row, col)` cell and returns the
    /// cell's flat index.
    fn append_trace(
        &mut self,
        row: usize,
        col: usize,
        draw: DrawFn,
        style: StyleFn,
        params: TraceParams,
    ) -> Result<usize> {
        self.composer_mut()
            .register_trace(row, col, draw, style, params)
    }

    /// Renders the figure and plays it. Blocks until the session ends.
    fn show(&mut self, session: Session) -> Result<ShowOutcome>;
}

/// Builds the backend selected in the configuration.
pub fn create_backend(
    kind: BackendKind,
    output: &OutputConfig,
    playback: &PlaybackConfig,
) -> Box<dyn RenderBackend> {
    match kind {
        BackendKind::Raster => Box::new(RasterFigure::new(output.clone(), *playback)),
        BackendKind::Html => Box::new(HtmlFigure::new(output.path.clone(), *playback)),
    }
}

/// Default location for output that was not given a path.
fn default_output(file_name: &str) -> PathBuf {
    std::env::temp_dir().join(file_name)
}
