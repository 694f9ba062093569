//! Subplot grid and trace registry shared by every backend.

use std::fmt;

use crate::{
    layer::{CellKind, CellStyle, DrawCall, Layer, Layout, TraceParams},
    timeline::{PlaybackController, Session},
    PlayerError, Result,
};

/// Produces a trace's layer, either the placeholder or the one for a packet.
pub type DrawFn = Box<dyn Fn(DrawCall<'_>, &TraceParams) -> Layer>;

/// Produces the fixed axis and camera setup of a trace's cell.
pub type StyleFn = Box<dyn Fn(&TraceParams) -> CellStyle>;

/// One registered visual encoding bound to a grid cell.
pub struct Trace {
    pub row: usize,
    pub col: usize,
    /// Row-major flat index of the cell.
    pub cell: usize,
    draw: DrawFn,
    style: StyleFn,
    params: TraceParams,
}

impl Trace {
    pub fn params(&self) -> &TraceParams {
        &self.params
    }
}

impl fmt::Debug for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trace")
            .field("row", &self.row)
            .field("col", &self.col)
            .field("cell", &self.cell)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Latest layer of a trace together with the cell it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLayer {
    pub cell: usize,
    pub layer: Layer,
}

/// Everything a backend needs to display one frame. Layers are in trace
/// registration order, which is also the draw order.
#[derive(Debug, Clone, Copy)]
pub struct CompositeFrame<'a> {
    /// `None` for the placeholder frame shown before playback starts.
    pub index: Option<usize>,
    pub total: usize,
    pub label: &'a str,
    pub layers: &'a [PlacedLayer],
}

/// Concrete figure a backend attaches layers to.
pub trait FigureSurface {
    /// Constructs the grid. `styles` holds one entry per cell; cells without
    /// traces have no style.
    fn build(&mut self, layout: &Layout, styles: &[Option<CellStyle>]) -> Result<()>;

    fn present(&mut self, frame: &CompositeFrame<'_>) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct TraceComposer {
    ticks: Vec<String>,
    layout: Option<Layout>,
    traces: Vec<Trace>,
    layers: Vec<PlacedLayer>,
    rendering: bool,
}

impl TraceComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ticks(&mut self, ticks: Vec<String>) {
        self.ticks = ticks;
    }

    pub fn ticks(&self) -> &[String] {
        &self.ticks
    }

    pub fn set_layout(&mut self, rows: usize, cols: usize, specs: Vec<Vec<CellKind>>) -> Result<()> {
        if !self.traces.is_empty() {
            return Err(PlayerError::InvalidLayout(
                "the layout is fixed once traces are registered".into(),
            ));
        }
        self.layout = Some(Layout::new(rows, cols, specs)?);
        Ok(())
    }

    pub fn layout(&self) -> Option<&Layout> {
        self.layout.as_ref()
    }

    /// Appends a trace to the `(row, col)` cell (1-based) and returns the
    /// cell's flat index.
    pub fn register_trace(
        &mut self,
        row: usize,
        col: usize,
        draw: DrawFn,
        style: StyleFn,
        params: TraceParams,
    ) -> Result<usize> {
        if self.rendering {
            return Err(PlayerError::InvalidLayout(
                "traces cannot be added once rendering has started".into(),
            ));
        }
        let layout = self.layout.as_ref().ok_or_else(|| {
            PlayerError::InvalidLayout("set the subplot layout before adding traces".into())
        })?;
        let cell = layout.flat_index(row, col)?;
        self.traces.push(Trace {
            row,
            col,
            cell,
            draw,
            style,
            params,
        });
        Ok(cell)
    }

    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }

    pub fn layers(&self) -> &[PlacedLayer] {
        &self.layers
    }

    /// Runs every style function once and every draw function in placeholder
    /// mode. The first trace of a cell decides its style.
    pub fn setup(&mut self) -> Result<Vec<Option<CellStyle>>> {
        let layout = self.layout.as_ref().ok_or_else(|| {
            PlayerError::InvalidLayout("set the subplot layout before rendering".into())
        })?;

        let mut styles: Vec<Option<CellStyle>> = vec![None; layout.len()];
        for trace in &self.traces {
            let style = (trace.style)(&trace.params);
            let expected = layout.kind(trace.cell);
            if expected != Some(style.kind()) {
                return Err(PlayerError::InvalidLayout(format!(
                    "trace at ({}, {}) styles a {} cell but the cell is {}",
                    trace.row,
                    trace.col,
                    style.kind(),
                    expected.map(|kind| kind.to_string()).unwrap_or_default()
                )));
            }
            let slot = &mut styles[trace.cell];
            if slot.is_none() {
                *slot = Some(style);
            }
        }

        self.layers = self
            .traces
            .iter()
            .map(|trace| PlacedLayer {
                cell: trace.cell,
                layer: (trace.draw)(DrawCall::Create, &trace.params),
            })
            .collect();
        self.rendering = true;
        Ok(styles)
    }

    /// Replaces every trace's layer with the one for packet `index`.
    pub fn update(&mut self, index: usize) {
        for (trace, placed) in self.traces.iter().zip(self.layers.iter_mut()) {
            let next = (trace.draw)(
                DrawCall::Update {
                    index,
                    previous: &placed.layer,
                },
                &trace.params,
            );
            placed.layer = next;
        }
    }

    pub fn frame(&self, index: Option<usize>) -> CompositeFrame<'_> {
        let label = index
            .and_then(|i| self.ticks.get(i))
            .map(String::as_str)
            .unwrap_or("");
        CompositeFrame {
            index,
            total: self.ticks.len(),
            label,
            layers: &self.layers,
        }
    }

    /// Two-phase render: sets up the surface, then hands every frame the
    /// controller emits to it. Returns the number of emitted frames.
    pub fn render(
        &mut self,
        surface: &mut dyn FigureSurface,
        mut controller: PlaybackController,
        session: Session,
    ) -> Result<usize> {
        let styles = self.setup()?;
        let layout = self
            .layout
            .clone()
            .ok_or_else(|| PlayerError::InvalidLayout("missing subplot layout".into()))?;
        surface.build(&layout, &styles)?;
        surface.present(&self.frame(None))?;

        tracing::debug!(
            traces = self.traces.len(),
            frames = self.ticks.len(),
            "figure ready"
        );

        controller.run(session, |index| {
            self.update(index);
            let frame = self.frame(Some(index));
            tracing::debug!(index, label = frame.label, "frame");
            surface.present(&frame)
        })
    }
}
