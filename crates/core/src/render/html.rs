//! Plotly backend: one playback pass turned into a standalone HTML animation.

use std::{fs, path::Path, path::PathBuf};

use serde_json::{json, Map, Value};

use super::{default_output, RenderBackend, ShowOutcome};
use crate::{
    composer::{CompositeFrame, FigureSurface, PlacedLayer, TraceComposer},
    config::PlaybackConfig,
    layer::{CellKind, CellStyle, Colormap, Layer, Layout, PointCloudLayer, RasterLayer, SurfaceLayer},
    timeline::{PlaybackController, Session},
    Result,
};

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";
/// Largest surface grid side sent to the browser.
const SURFACE_GRID: u32 = 64;
const CELL_GAP: f64 = 0.02;
const MARKER_SIZE: u32 = 2;
const CAMERA_DISTANCE: f32 = 2.0;

pub struct HtmlFigure {
    composer: TraceComposer,
    path: Option<PathBuf>,
    playback: PlaybackConfig,
}

impl HtmlFigure {
    pub fn new(path: Option<PathBuf>, playback: PlaybackConfig) -> Self {
        Self {
            composer: TraceComposer::new(),
            path,
            playback,
        }
    }
}

impl RenderBackend for HtmlFigure {
    fn name(&self) -> &'static str {
        "html"
    }

    fn composer(&self) -> &TraceComposer {
        &self.composer
    }

    fn composer_mut(&mut self) -> &mut TraceComposer {
        &mut self.composer
    }

    /// Always renders a single forward pass; the browser drives playback.
    fn show(&mut self, session: Session) -> Result<ShowOutcome> {
        if !session.is_export() {
            tracing::info!("html figures are played back in the browser, rendering every frame once");
        }
        let session = Session::export().with_view(session.view);
        let path = self
            .path
            .clone()
            .unwrap_or_else(|| default_output("dvplayer.html"));

        let ticks = self.composer.ticks().to_vec();
        let mut surface = HtmlSurface::new(self.playback.fps);
        let controller = PlaybackController::new(ticks, self.playback.fps);
        tracing::info!(
            backend = self.name(),
            traces = self.composer.traces().len(),
            frames = controller.len(),
            "showing figure"
        );

        let frames_rendered = self.composer.render(&mut surface, controller, session)?;
        surface.write(&path)?;
        tracing::info!(backend = self.name(), frames_rendered, path = %path.display(), "figure written");
        Ok(ShowOutcome {
            frames_rendered,
            output: Some(path),
        })
    }
}

/// Axis references of one cell.
#[derive(Debug, Clone)]
enum CellAxes {
    Plane { x: String, y: String },
    Scene { scene: String },
}

/// Collects plotly traces and frames for one figure.
#[derive(Debug, Default)]
pub struct HtmlSurface {
    frame_ms: u64,
    layout: Map<String, Value>,
    cells: Vec<CellAxes>,
    placeholder: Vec<Value>,
    frames: Vec<Value>,
    labels: Vec<String>,
}

impl HtmlSurface {
    pub fn new(fps: u32) -> Self {
        Self {
            frame_ms: 1000 / u64::from(fps.max(1)),
            ..Self::default()
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Complete plotly figure: initial data, layout with controls, and frames.
    pub fn figure(&self) -> Value {
        let data = self
            .frames
            .first()
            .and_then(|frame| frame.get("data"))
            .cloned()
            .unwrap_or_else(|| Value::Array(self.placeholder.clone()));

        let mut layout = self.layout.clone();
        layout.insert("showlegend".into(), json!(false));
        layout.insert("updatemenus".into(), json!([self.buttons()]));
        layout.insert("sliders".into(), json!([self.slider()]));

        json!({
            "data": data,
            "layout": layout,
            "frames": self.frames,
        })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let figure = serde_json::to_string(&self.figure())?.replace("</", "<\\/");
        fs::write(path, document(&figure))?;
        Ok(())
    }

    fn frame_names(&self) -> Vec<Value> {
        self.frames
            .iter()
            .filter_map(|frame| frame.get("name").cloned())
            .collect()
    }

    fn animation(&self, duration: u64, redraw: bool) -> Value {
        json!({
            "frame": { "duration": duration, "redraw": redraw },
            "mode": "immediate",
            "fromcurrent": true,
            "transition": { "duration": 0 },
        })
    }

    fn buttons(&self) -> Value {
        let mut backward = self.frame_names();
        backward.reverse();
        json!({
            "type": "buttons",
            "direction": "left",
            "showactive": false,
            "x": 0.1,
            "y": 0,
            "xanchor": "right",
            "yanchor": "top",
            "pad": { "r": 10, "t": 70 },
            "buttons": [
                {
                    "label": "\u{25B6}",
                    "method": "animate",
                    "args": [Value::Null, self.animation(self.frame_ms, true)],
                },
                {
                    "label": "\u{25C0}",
                    "method": "animate",
                    "args": [backward, self.animation(self.frame_ms, true)],
                },
                {
                    "label": "\u{23F8}",
                    "method": "animate",
                    "args": [[Value::Null], self.animation(0, false)],
                },
            ],
        })
    }

    fn slider(&self) -> Value {
        let steps: Vec<Value> = self
            .frame_names()
            .into_iter()
            .zip(&self.labels)
            .map(|(name, label)| {
                json!({
                    "label": label,
                    "method": "animate",
                    "args": [[name], self.animation(0, true)],
                })
            })
            .collect();
        json!({
            "active": 0,
            "x": 0.1,
            "len": 0.9,
            "y": 0,
            "xanchor": "left",
            "yanchor": "top",
            "pad": { "b": 10, "t": 50 },
            "currentvalue": { "visible": true, "xanchor": "right" },
            "steps": steps,
        })
    }

    fn trace(&self, placed: &PlacedLayer) -> Value {
        let mut trace = match &placed.layer {
            Layer::Raster(raster) => heatmap(raster),
            Layer::Points(points) => scatter3d(points),
            Layer::Surface(surface) => surface_trace(surface),
        };
        if let (Some(object), Some(axes)) = (trace.as_object_mut(), self.cells.get(placed.cell)) {
            match axes {
                CellAxes::Plane { x, y } => {
                    object.insert("xaxis".into(), json!(x));
                    object.insert("yaxis".into(), json!(y));
                }
                CellAxes::Scene { scene } => {
                    object.insert("scene".into(), json!(scene));
                }
            }
        }
        trace
    }

    /// Per-frame relayout of every scene's time axis.
    fn time_axis_updates(&self, layers: &[PlacedLayer]) -> Map<String, Value> {
        let mut updates = Map::new();
        for placed in layers {
            let axis = match &placed.layer {
                Layer::Points(PointCloudLayer {
                    time_axis: Some(axis),
                    ..
                }) => axis,
                _ => continue,
            };
            let Some(CellAxes::Scene { scene }) = self.cells.get(placed.cell) else {
                continue;
            };
            let (values, labels): (Vec<i64>, Vec<String>) = axis
                .ticks
                .iter()
                .map(|tick| (tick.value, tick.label.clone()))
                .unzip();
            updates.insert(format!("{scene}.xaxis.range"), json!([axis.min, axis.max]));
            updates.insert(format!("{scene}.xaxis.tickvals"), json!(values));
            updates.insert(format!("{scene}.xaxis.ticktext"), json!(labels));
        }
        updates
    }
}

fn suffix(cell: usize) -> String {
    if cell == 0 {
        String::new()
    } else {
        (cell + 1).to_string()
    }
}

fn colorscale(colormap: Colormap) -> Value {
    colormap
        .stops()
        .into_iter()
        .map(|(stop, [r, g, b, a])| json!([stop, format!("rgba({r},{g},{b},{})", a as f32 / 255.0)]))
        .collect()
}

fn heatmap(raster: &RasterLayer) -> Value {
    let z: Vec<&[f32]> = raster.rows().collect();
    json!({
        "type": "heatmap",
        "z": z,
        "x0": 0.5,
        "y0": 0.5,
        "zmin": raster.range.0,
        "zmax": raster.range.1,
        "colorscale": colorscale(raster.colormap),
        "showscale": false,
        "hoverinfo": "skip",
    })
}

fn scatter3d(points: &PointCloudLayer) -> Value {
    json!({
        "type": "scatter3d",
        "mode": "markers",
        "x": points.timestamps,
        "y": points.cols,
        "z": points.rows,
        "marker": {
            "size": MARKER_SIZE,
            "color": points.colors,
            "colorscale": colorscale(points.colormap),
            "cmin": points.color_range.0,
            "cmax": points.color_range.1,
        },
        "hoverinfo": "skip",
    })
}

fn surface_trace(surface: &SurfaceLayer) -> Value {
    let Some(timestamp) = surface.timestamp.filter(|_| surface.width > 0 && surface.height > 0)
    else {
        return json!({
            "type": "surface",
            "visible": false,
            "x": [[0]],
            "y": [[0]],
            "z": [[0]],
            "showscale": false,
        });
    };

    let stride = (surface.width.max(surface.height) + SURFACE_GRID - 1) / SURFACE_GRID;
    let rows: Vec<u32> = (0..surface.height).step_by(stride.max(1) as usize).collect();
    let cols: Vec<u32> = (0..surface.width).step_by(stride.max(1) as usize).collect();

    let mut x = Vec::with_capacity(rows.len());
    let mut y = Vec::with_capacity(rows.len());
    let mut z = Vec::with_capacity(rows.len());
    let mut color = Vec::with_capacity(rows.len());
    for &row in &rows {
        x.push(vec![timestamp; cols.len()]);
        y.push(cols.clone());
        z.push(vec![row; cols.len()]);
        color.push(
            cols.iter()
                .map(|&col| {
                    let [r, g, b, _] = surface.texel(row, col);
                    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round()
                })
                .collect::<Vec<f32>>(),
        );
    }

    json!({
        "type": "surface",
        "x": x,
        "y": y,
        "z": z,
        "surfacecolor": color,
        "colorscale": colorscale(Colormap::Gray),
        "cmin": 0,
        "cmax": 255,
        "showscale": false,
        "hoverinfo": "skip",
    })
}

fn document(figure: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>dvplayer</title>
<script src="{PLOTLY_CDN}"></script>
</head>
<body>
<div id="figure" style="width:100%;height:95vh;"></div>
<script>
const figure = {figure};
Plotly.newPlot("figure", figure.data, figure.layout).then(() => Plotly.addFrames("figure", figure.frames));
</script>
</body>
</html>
"#
    )
}

impl FigureSurface for HtmlSurface {
    fn build(&mut self, layout: &Layout, styles: &[Option<CellStyle>]) -> Result<()> {
        let rows = layout.rows() as f64;
        let cols = layout.cols() as f64;
        self.cells.clear();

        for (cell, kind) in layout.cells().iter().enumerate() {
            let (row, col) = ((cell / layout.cols()) as f64, (cell % layout.cols()) as f64);
            let x_domain = [col / cols + CELL_GAP, (col + 1.0) / cols - CELL_GAP];
            let y_domain = [1.0 - (row + 1.0) / rows + CELL_GAP, 1.0 - row / rows - CELL_GAP];
            let suffix = suffix(cell);
            let style = styles.get(cell).and_then(Option::as_ref);

            match kind {
                CellKind::Plane => {
                    let mut x_axis = json!({ "domain": x_domain, "anchor": format!("y{suffix}") });
                    let mut y_axis = json!({ "domain": y_domain, "anchor": format!("x{suffix}") });
                    if let Some(CellStyle::Plane(plane)) = style {
                        x_axis["range"] = json!([plane.x_range.0, plane.x_range.1]);
                        x_axis["showticklabels"] = json!(plane.show_ticks);
                        y_axis["range"] = json!([plane.y_range.0, plane.y_range.1]);
                        y_axis["showticklabels"] = json!(plane.show_ticks);
                        y_axis["scaleanchor"] = json!(format!("x{suffix}"));
                        y_axis["scaleratio"] = json!(plane.aspect);
                    }
                    self.layout.insert(format!("xaxis{suffix}"), x_axis);
                    self.layout.insert(format!("yaxis{suffix}"), y_axis);
                    self.cells.push(CellAxes::Plane {
                        x: format!("x{suffix}"),
                        y: format!("y{suffix}"),
                    });
                }
                CellKind::Scene => {
                    let mut scene = json!({
                        "domain": { "x": x_domain, "y": y_domain },
                        "xaxis": { "title": { "text": "time" } },
                        "yaxis": { "title": { "text": "x" } },
                        "zaxis": { "title": { "text": "y" } },
                    });
                    if let Some(CellStyle::Scene(style)) = style {
                        let [rows, cols, time] = style.aspect_ratio;
                        let elevation = style.camera.elevation.to_radians();
                        let azimuth = style.camera.azimuth.to_radians();
                        scene["yaxis"]["range"] = json!([style.col_range.0, style.col_range.1]);
                        scene["zaxis"]["range"] = json!([style.row_range.0, style.row_range.1]);
                        scene["aspectmode"] = json!("manual");
                        scene["aspectratio"] = json!({ "x": time, "y": cols, "z": rows });
                        scene["camera"] = json!({
                            "eye": {
                                "x": CAMERA_DISTANCE * elevation.cos() * azimuth.cos(),
                                "y": CAMERA_DISTANCE * elevation.cos() * azimuth.sin(),
                                "z": CAMERA_DISTANCE * elevation.sin(),
                            },
                            "up": { "x": 0, "y": 0, "z": 1 },
                        });
                    }
                    let key = format!("scene{suffix}");
                    self.layout.insert(key.clone(), scene);
                    self.cells.push(CellAxes::Scene { scene: key });
                }
            }
        }
        Ok(())
    }

    fn present(&mut self, frame: &CompositeFrame<'_>) -> Result<()> {
        let traces: Vec<Value> = frame.layers.iter().map(|placed| self.trace(placed)).collect();
        let Some(index) = frame.index else {
            self.placeholder = traces;
            return Ok(());
        };

        let indices: Vec<usize> = (0..traces.len()).collect();
        let relayout = self.time_axis_updates(frame.layers);
        self.frames.push(json!({
            "name": index.to_string(),
            "data": traces,
            "traces": indices,
            "layout": relayout,
        }));
        self.labels.push(frame.label.to_string());
        Ok(())
    }
}
