//! Software raster backend.
//!
//! Cells are laid out side by side on one RGBA canvas with a position strip
//! underneath. Plane cells use a y-up axis; scene cells are projected
//! orthographically with world `x` = time, `y` = column and `z` = row (up).

use image::{Rgba, RgbaImage};

use super::{default_output, RenderBackend, ShowOutcome};
use crate::{
    composer::{CompositeFrame, FigureSurface, TraceComposer},
    config::{OutputConfig, OutputFormat, PlaybackConfig},
    layer::{
        CellStyle, Layer, Layout, PlaneStyle, PointCloudLayer, RasterLayer, SceneStyle,
        SurfaceLayer, TimeAxis,
    },
    record::{FrameSink, Recorder, RecordingSettings},
    timeline::{PlaybackController, Session},
    Result,
};

const MARGIN: u32 = 8;
const STRIP_HEIGHT: u32 = 6;
/// Side of a cell that has no trace, before scaling.
const EMPTY_CELL: u32 = 64;
/// Share of a scene cell covered by the projected box.
const SCENE_FILL: f32 = 0.9;
const MAX_SPLAT: u32 = 8;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BOX_EDGE: [u8; 4] = [190, 190, 190, 255];
const STRIP_TRACK: [u8; 4] = [225, 225, 225, 255];
const STRIP_FILL: [u8; 4] = [46, 102, 153, 255];

/// Interactive figure rendered to PNG previews, or exported as GIF / PNG frames.
pub struct RasterFigure {
    composer: TraceComposer,
    output: OutputConfig,
    playback: PlaybackConfig,
    sink: Option<Box<dyn FrameSink>>,
}

impl RasterFigure {
    pub fn new(output: OutputConfig, playback: PlaybackConfig) -> Self {
        Self {
            composer: TraceComposer::new(),
            output,
            playback,
            sink: None,
        }
    }

    /// Sends the next session's frames to `sink` instead of the configured output.
    pub fn with_sink(mut self, sink: Box<dyn FrameSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    fn recorder(&mut self, export: bool) -> Result<Recorder> {
        if let Some(sink) = self.sink.take() {
            return Ok(Recorder::with_sink(sink));
        }
        if export {
            let output_path = self.output.path.clone().unwrap_or_else(|| {
                default_output(match self.output.format {
                    OutputFormat::Gif => "dvplayer.gif",
                    OutputFormat::Png => "dvplayer-frames",
                })
            });
            Recorder::new(&RecordingSettings {
                output_path,
                fps: self.playback.fps,
                format: self.output.format,
            })
        } else {
            let path = self
                .output
                .path
                .clone()
                .unwrap_or_else(|| default_output("dvplayer-preview.png"));
            Recorder::preview(path)
        }
    }
}

impl RenderBackend for RasterFigure {
    fn name(&self) -> &'static str {
        "raster"
    }

    fn composer(&self) -> &TraceComposer {
        &self.composer
    }

    fn composer_mut(&mut self) -> &mut TraceComposer {
        &mut self.composer
    }

    fn show(&mut self, session: Session) -> Result<ShowOutcome> {
        let export = session.is_export();
        let mut recorder = self.recorder(export)?;
        recorder.start()?;

        let mut surface = RasterSurface::new(self.output.scale, recorder).record_placeholder(!export);
        let controller = PlaybackController::new(self.composer.ticks().to_vec(), self.playback.fps)
            .with_autoplay(self.playback.autoplay);
        tracing::info!(
            backend = self.name(),
            traces = self.composer.traces().len(),
            frames = controller.len(),
            export,
            "showing figure"
        );

        let frames_rendered = self.composer.render(&mut surface, controller, session)?;
        let output = surface.into_recorder().stop()?;
        tracing::info!(backend = self.name(), frames_rendered, ?output, "figure closed");
        Ok(ShowOutcome {
            frames_rendered,
            output,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl Rect {
    fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.x as i64
            && y >= self.y as i64
            && x < (self.x + self.width) as i64
            && y < (self.y + self.height) as i64
    }
}

/// Orthographic projection of a scene cell's normalized box onto its rect.
#[derive(Debug, Clone)]
struct Projector {
    style: SceneStyle,
    right: [f32; 3],
    up: [f32; 3],
    center: [f32; 3],
    roll: (f32, f32),
    screen_center: (f32, f32),
    pixels_per_unit: f32,
    rect: Rect,
}

impl Projector {
    fn new(style: &SceneStyle, rect: Rect) -> Self {
        let elevation = style.camera.elevation.to_radians();
        let azimuth = style.camera.azimuth.to_radians();
        let roll = style.camera.roll.to_radians();
        let [rows, cols, time] = style.aspect_ratio;

        let mut projector = Self {
            style: style.clone(),
            right: [-azimuth.sin(), azimuth.cos(), 0.0],
            up: [
                -elevation.sin() * azimuth.cos(),
                -elevation.sin() * azimuth.sin(),
                elevation.cos(),
            ],
            center: [time / 2.0, cols / 2.0, rows / 2.0],
            roll: (roll.cos(), roll.sin()),
            screen_center: (0.0, 0.0),
            pixels_per_unit: 1.0,
            rect,
        };

        let corners = projector.corners();
        let (mut min_u, mut max_u) = (f32::MAX, f32::MIN);
        let (mut min_v, mut max_v) = (f32::MAX, f32::MIN);
        for corner in corners {
            let (u, v) = projector.view(corner);
            min_u = min_u.min(u);
            max_u = max_u.max(u);
            min_v = min_v.min(v);
            max_v = max_v.max(v);
        }
        let span_u = (max_u - min_u).max(f32::EPSILON);
        let span_v = (max_v - min_v).max(f32::EPSILON);
        projector.pixels_per_unit = (rect.width as f32 * SCENE_FILL / span_u)
            .min(rect.height as f32 * SCENE_FILL / span_v);
        projector.screen_center = ((min_u + max_u) / 2.0, (min_v + max_v) / 2.0);
        projector
    }

    fn corners(&self) -> [[f32; 3]; 8] {
        let [rows, cols, time] = self.style.aspect_ratio;
        let mut corners = [[0.0; 3]; 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            *corner = [
                if i & 1 == 0 { 0.0 } else { time },
                if i & 2 == 0 { 0.0 } else { cols },
                if i & 4 == 0 { 0.0 } else { rows },
            ];
        }
        corners
    }

    /// Camera-plane coordinates, `v` pointing up.
    fn view(&self, point: [f32; 3]) -> (f32, f32) {
        let d = [
            point[0] - self.center[0],
            point[1] - self.center[1],
            point[2] - self.center[2],
        ];
        let u = dot(d, self.right);
        let v = dot(d, self.up);
        let (cos, sin) = self.roll;
        (u * cos - v * sin, u * sin + v * cos)
    }

    fn to_screen(&self, point: [f32; 3]) -> (f32, f32) {
        let (u, v) = self.view(point);
        let x = self.rect.x as f32
            + self.rect.width as f32 / 2.0
            + (u - self.screen_center.0) * self.pixels_per_unit;
        let y = self.rect.y as f32 + self.rect.height as f32 / 2.0
            - (v - self.screen_center.1) * self.pixels_per_unit;
        (x, y)
    }

    /// World position of a `(row, col)` sample at normalized time `t`.
    fn world(&self, row: f32, col: f32, t: f32) -> [f32; 3] {
        let [rows, cols, time] = self.style.aspect_ratio;
        [
            t * time,
            normalize(col, self.style.col_range) * cols,
            normalize(row, self.style.row_range) * rows,
        ]
    }
}

fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn normalize(value: f32, (lo, hi): (f32, f32)) -> f32 {
    if hi > lo {
        (value - lo) / (hi - lo)
    } else {
        0.0
    }
}

fn normalize_time(timestamp: i64, axis: Option<&TimeAxis>) -> f32 {
    match axis {
        Some(axis) if axis.max > axis.min => {
            ((timestamp - axis.min) as f64 / (axis.max - axis.min) as f64).clamp(0.0, 1.0) as f32
        }
        _ => 0.0,
    }
}

#[derive(Debug, Clone)]
struct CellView {
    rect: Rect,
    projector: Option<Projector>,
    time_axis: Option<TimeAxis>,
}

/// Canvas a [`RasterFigure`] presents frames on.
pub struct RasterSurface {
    scale: u32,
    recorder: Recorder,
    record_placeholder: bool,
    canvas: RgbaImage,
    cells: Vec<CellView>,
    strip: Rect,
}

impl RasterSurface {
    pub fn new(scale: u32, recorder: Recorder) -> Self {
        Self {
            scale: scale.max(1),
            recorder,
            record_placeholder: false,
            canvas: RgbaImage::from_pixel(1, 1, BACKGROUND),
            cells: Vec::new(),
            strip: Rect {
                x: 0,
                y: 0,
                width: 0,
                height: 0,
            },
        }
    }

    /// Whether the frame shown before playback starts is recorded too.
    pub fn record_placeholder(mut self, record: bool) -> Self {
        self.record_placeholder = record;
        self
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn into_recorder(self) -> Recorder {
        self.recorder
    }

    fn cell_size(&self, style: Option<&CellStyle>) -> (u32, u32) {
        let scale = self.scale as f32;
        let (width, height) = match style {
            Some(CellStyle::Plane(PlaneStyle {
                x_range,
                y_range,
                aspect,
                ..
            })) => (
                (x_range.1 - x_range.0) * scale,
                (y_range.1 - y_range.0) * aspect * scale,
            ),
            Some(CellStyle::Scene(SceneStyle {
                row_range,
                col_range,
                ..
            })) => (
                (col_range.1 - col_range.0) * scale,
                (row_range.1 - row_range.0) * scale,
            ),
            None => (EMPTY_CELL as f32 * scale, EMPTY_CELL as f32 * scale),
        };
        (
            (width.round() as u32).max(1),
            (height.round() as u32).max(1),
        )
    }

    fn clear(&mut self) {
        for pixel in self.canvas.pixels_mut() {
            *pixel = BACKGROUND;
        }
    }

    fn paint(&mut self, clip: Rect, x: i64, y: i64, color: [u8; 4]) {
        if !clip.contains(x, y) {
            return;
        }
        blend(self.canvas.get_pixel_mut(x as u32, y as u32), color);
    }

    fn fill(&mut self, clip: Rect, x: i64, y: i64, size: u32, color: [u8; 4]) {
        let half = (size / 2) as i64;
        for dy in 0..size as i64 {
            for dx in 0..size as i64 {
                self.paint(clip, x - half + dx, y - half + dy, color);
            }
        }
    }

    fn line(&mut self, clip: Rect, from: (f32, f32), to: (f32, f32), color: [u8; 4]) {
        let steps = (to.0 - from.0).abs().max((to.1 - from.1).abs()).ceil().max(1.0) as usize;
        for step in 0..=steps {
            let t = step as f32 / steps as f32;
            let x = from.0 + (to.0 - from.0) * t;
            let y = from.1 + (to.1 - from.1) * t;
            self.paint(clip, x.round() as i64, y.round() as i64, color);
        }
    }

    fn draw_raster(&mut self, rect: Rect, layer: &RasterLayer) {
        if layer.width == 0 || layer.height == 0 {
            return;
        }
        for cy in 0..rect.height {
            // Row 0 of the layer sits at the bottom of the cell.
            let row = ((rect.height - 1 - cy) as u64 * layer.height as u64 / rect.height as u64) as u32;
            for cx in 0..rect.width {
                let col = (cx as u64 * layer.width as u64 / rect.width as u64) as u32;
                let color = layer.colormap.rgba(layer.value(row, col), layer.range);
                self.paint(rect, (rect.x + cx) as i64, (rect.y + cy) as i64, color);
            }
        }
    }

    fn draw_box(&mut self, rect: Rect, projector: &Projector) {
        let corners = projector.corners();
        for (i, a) in corners.iter().enumerate() {
            for bit in [1, 2, 4] {
                if i & bit == 0 {
                    let b = corners[i | bit];
                    self.line(rect, projector.to_screen(*a), projector.to_screen(b), BOX_EDGE);
                }
            }
        }
    }

    fn draw_points(
        &mut self,
        rect: Rect,
        projector: &Projector,
        axis: Option<&TimeAxis>,
        layer: &PointCloudLayer,
    ) {
        let size = self.scale;
        for i in 0..layer.len() {
            let t = normalize_time(layer.timestamps[i], axis);
            let (x, y) = projector.to_screen(projector.world(layer.rows[i], layer.cols[i], t));
            let color = layer.colormap.rgba(layer.colors[i], layer.color_range);
            self.fill(rect, x.round() as i64, y.round() as i64, size, color);
        }
    }

    fn draw_surface(
        &mut self,
        rect: Rect,
        projector: &Projector,
        axis: Option<&TimeAxis>,
        layer: &SurfaceLayer,
    ) {
        let Some(timestamp) = layer.timestamp else {
            return;
        };
        if layer.width == 0 || layer.height == 0 {
            return;
        }
        let t = normalize_time(timestamp, axis);
        let style = &projector.style;
        let row_step = (style.row_range.1 - style.row_range.0) / layer.height as f32;
        let col_step = (style.col_range.1 - style.col_range.0) / layer.width as f32;

        let origin = projector.to_screen(projector.world(style.row_range.0, style.col_range.0, t));
        let along_row = projector.to_screen(projector.world(style.row_range.0 + row_step, style.col_range.0, t));
        let along_col = projector.to_screen(projector.world(style.row_range.0, style.col_range.0 + col_step, t));
        let spacing = distance(origin, along_row).max(distance(origin, along_col));
        let splat = (spacing.ceil() as u32).clamp(1, MAX_SPLAT);

        for r in 0..layer.height {
            let row = style.row_range.0 + (r as f32 + 0.5) * row_step;
            for c in 0..layer.width {
                let col = style.col_range.0 + (c as f32 + 0.5) * col_step;
                let (x, y) = projector.to_screen(projector.world(row, col, t));
                self.fill(rect, x.round() as i64, y.round() as i64, splat, layer.texel(r, c));
            }
        }
    }

    fn draw_strip(&mut self, index: Option<usize>, total: usize) {
        let strip = self.strip;
        let filled = match index {
            Some(i) if total > 0 => {
                (strip.width as u64 * (i as u64 + 1) / total as u64) as u32
            }
            _ => 0,
        };
        for y in strip.y..strip.y + strip.height {
            for x in strip.x..strip.x + strip.width {
                let color = if x - strip.x < filled {
                    STRIP_FILL
                } else {
                    STRIP_TRACK
                };
                self.paint(strip, x as i64, y as i64, color);
            }
        }
    }
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

fn blend(pixel: &mut Rgba<u8>, color: [u8; 4]) {
    let alpha = color[3] as f32 / 255.0;
    if alpha <= 0.0 {
        return;
    }
    for channel in 0..3 {
        let src = color[channel] as f32;
        let dst = pixel.0[channel] as f32;
        pixel.0[channel] = (src * alpha + dst * (1.0 - alpha)).round() as u8;
    }
    pixel.0[3] = 255;
}

impl FigureSurface for RasterSurface {
    fn build(&mut self, layout: &Layout, styles: &[Option<CellStyle>]) -> Result<()> {
        let sizes: Vec<(u32, u32)> = (0..layout.len())
            .map(|cell| self.cell_size(styles.get(cell).and_then(Option::as_ref)))
            .collect();

        let mut col_widths = vec![0u32; layout.cols()];
        let mut row_heights = vec![0u32; layout.rows()];
        for (cell, (width, height)) in sizes.iter().enumerate() {
            let (row, col) = (cell / layout.cols(), cell % layout.cols());
            col_widths[col] = col_widths[col].max(*width);
            row_heights[row] = row_heights[row].max(*height);
        }

        let width = col_widths.iter().sum::<u32>() + MARGIN * (layout.cols() as u32 + 1);
        let grid_height = row_heights.iter().sum::<u32>() + MARGIN * (layout.rows() as u32 + 1);
        let height = grid_height + STRIP_HEIGHT + MARGIN;
        self.canvas = RgbaImage::from_pixel(width, height, BACKGROUND);
        self.strip = Rect {
            x: MARGIN,
            y: grid_height,
            width: width - 2 * MARGIN,
            height: STRIP_HEIGHT,
        };

        self.cells = sizes
            .iter()
            .enumerate()
            .map(|(cell, (cell_width, cell_height))| {
                let (row, col) = (cell / layout.cols(), cell % layout.cols());
                let x = MARGIN + col_widths[..col].iter().map(|w| w + MARGIN).sum::<u32>();
                let y = MARGIN + row_heights[..row].iter().map(|h| h + MARGIN).sum::<u32>();
                let rect = Rect {
                    x,
                    y,
                    width: *cell_width,
                    height: *cell_height,
                };
                let projector = match styles.get(cell).and_then(Option::as_ref) {
                    Some(CellStyle::Scene(scene)) => Some(Projector::new(scene, rect)),
                    _ => None,
                };
                CellView {
                    rect,
                    projector,
                    time_axis: None,
                }
            })
            .collect();

        tracing::debug!(width, height, cells = self.cells.len(), "raster canvas built");
        Ok(())
    }

    fn present(&mut self, frame: &CompositeFrame<'_>) -> Result<()> {
        self.clear();

        // Time axes come from this frame's point clouds; empty packets keep the
        // previous extents.
        for placed in frame.layers {
            if let Layer::Points(PointCloudLayer {
                time_axis: Some(axis),
                ..
            }) = &placed.layer
            {
                if let Some(cell) = self.cells.get_mut(placed.cell) {
                    cell.time_axis = Some(axis.clone());
                }
            }
        }

        let cells = self.cells.clone();
        for cell in &cells {
            if let Some(projector) = &cell.projector {
                self.draw_box(cell.rect, projector);
            }
        }

        for placed in frame.layers {
            let Some(cell) = cells.get(placed.cell) else {
                continue;
            };
            let axis = cell.time_axis.as_ref();
            match (&placed.layer, &cell.projector) {
                (Layer::Raster(raster), None) => self.draw_raster(cell.rect, raster),
                (Layer::Points(points), Some(projector)) => {
                    self.draw_points(cell.rect, projector, axis, points)
                }
                (Layer::Surface(surface), Some(projector)) => {
                    self.draw_surface(cell.rect, projector, axis, surface)
                }
                _ => tracing::warn!(cell = placed.cell, "layer does not fit its cell"),
            }
        }

        self.draw_strip(frame.index, frame.total);

        if frame.index.is_some() || self.record_placeholder {
            self.recorder.record(&self.canvas)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        layer::{Camera, CellKind, Colormap},
        record::MemoryRecorder,
        composer::PlacedLayer,
    };

    fn plane(width: f32, height: f32) -> CellStyle {
        CellStyle::Plane(PlaneStyle {
            x_range: (0.0, width),
            y_range: (0.0, height),
            aspect: 1.0,
            show_ticks: false,
        })
    }

    fn scene(rows: f32, cols: f32) -> CellStyle {
        CellStyle::Scene(SceneStyle {
            row_range: (0.0, rows),
            col_range: (0.0, cols),
            aspect_ratio: [1.0, 1.0, 1.0],
            camera: Camera {
                elevation: 35.0,
                azimuth: -10.0,
                roll: 0.0,
            },
        })
    }

    fn surface(memory: &MemoryRecorder) -> RasterSurface {
        let mut recorder = Recorder::with_sink(Box::new(memory.clone()));
        recorder.start().unwrap();
        RasterSurface::new(1, recorder)
    }

    fn frame<'a>(layers: &'a [PlacedLayer]) -> CompositeFrame<'a> {
        CompositeFrame {
            index: Some(0),
            total: 1,
            label: "0",
            layers,
        }
    }

    #[test]
    fn lays_cells_out_side_by_side() {
        let memory = MemoryRecorder::new();
        let mut surface = surface(&memory);
        let layout = Layout::new(1, 2, vec![vec![CellKind::Plane, CellKind::Scene]]).unwrap();
        surface
            .build(&layout, &[Some(plane(4.0, 3.0)), Some(scene(3.0, 4.0))])
            .unwrap();

        assert_eq!(surface.cells[0].rect.x, MARGIN);
        assert_eq!(surface.cells[1].rect.x, MARGIN * 2 + 4);
        assert_eq!(surface.canvas().width(), 4 + 4 + MARGIN * 3);
        assert_eq!(
            surface.canvas().height(),
            3 + MARGIN * 2 + STRIP_HEIGHT + MARGIN
        );
    }

    #[test]
    fn plane_rows_grow_upwards() {
        let memory = MemoryRecorder::new();
        let mut surface = surface(&memory);
        surface
            .build(&Layout::single(CellKind::Plane), &[Some(plane(1.0, 2.0))])
            .unwrap();

        let layers = [PlacedLayer {
            cell: 0,
            layer: Layer::Raster(RasterLayer {
                width: 1,
                height: 2,
                values: vec![1.0, 0.0],
                range: (0.0, 1.0),
                colormap: Colormap::Gray,
            }),
        }];
        surface.present(&frame(&layers)).unwrap();

        let canvas = surface.canvas();
        assert_eq!(canvas.get_pixel(MARGIN, MARGIN + 1), &Rgba([255, 255, 255, 255]));
        assert_eq!(canvas.get_pixel(MARGIN, MARGIN), &Rgba([0, 0, 0, 255]));
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn later_layers_composite_over_earlier_ones() {
        let memory = MemoryRecorder::new();
        let mut surface = surface(&memory);
        surface
            .build(&Layout::single(CellKind::Plane), &[Some(plane(2.0, 1.0))])
            .unwrap();

        let layers = [
            PlacedLayer {
                cell: 0,
                layer: Layer::Raster(RasterLayer {
                    width: 2,
                    height: 1,
                    values: vec![100.0, 100.0],
                    range: (0.0, 255.0),
                    colormap: Colormap::Gray,
                }),
            },
            PlacedLayer {
                cell: 0,
                layer: Layer::Raster(RasterLayer {
                    width: 2,
                    height: 1,
                    values: vec![0.0, 1.0],
                    range: (-1.0, 1.0),
                    colormap: Colormap::Polarity,
                }),
            },
        ];
        surface.present(&frame(&layers)).unwrap();

        let canvas = surface.canvas();
        assert_eq!(canvas.get_pixel(MARGIN, MARGIN), &Rgba([100, 100, 100, 255]));
        assert_eq!(canvas.get_pixel(MARGIN + 1, MARGIN), &Rgba([46, 102, 153, 255]));
    }

    #[test]
    fn projected_box_stays_inside_its_cell() {
        let rect = Rect {
            x: 10,
            y: 20,
            width: 100,
            height: 80,
        };
        let CellStyle::Scene(style) = scene(80.0, 100.0) else {
            unreachable!()
        };
        let projector = Projector::new(&style, rect);
        for corner in projector.corners() {
            let (x, y) = projector.to_screen(corner);
            assert!(rect.contains(x.round() as i64, y.round() as i64), "{x}, {y}");
        }
    }

    #[test]
    fn rows_point_up_in_scenes() {
        let rect = Rect {
            x: 0,
            y: 0,
            width: 100,
            height: 100,
        };
        let CellStyle::Scene(style) = scene(10.0, 10.0) else {
            unreachable!()
        };
        let projector = Projector::new(&style, rect);
        let (_, bottom) = projector.to_screen(projector.world(0.0, 5.0, 0.5));
        let (_, top) = projector.to_screen(projector.world(10.0, 5.0, 0.5));
        assert!(top < bottom);
    }

    #[test]
    fn strip_tracks_position() {
        let memory = MemoryRecorder::new();
        let mut surface = surface(&memory);
        surface
            .build(&Layout::single(CellKind::Plane), &[Some(plane(16.0, 4.0))])
            .unwrap();
        let strip = surface.strip;

        surface
            .present(&CompositeFrame {
                index: Some(0),
                total: 2,
                label: "0",
                layers: &[],
            })
            .unwrap();
        let canvas = surface.canvas();
        let last = strip.x + strip.width - 1;
        assert_eq!(canvas.get_pixel(strip.x, strip.y), &Rgba(STRIP_FILL));
        assert_eq!(canvas.get_pixel(last, strip.y), &Rgba(STRIP_TRACK));
    }

    #[test]
    fn placeholder_is_not_exported() {
        let memory = MemoryRecorder::new();
        let mut surface = surface(&memory);
        surface
            .build(&Layout::single(CellKind::Plane), &[Some(plane(2.0, 2.0))])
            .unwrap();
        surface
            .present(&CompositeFrame {
                index: None,
                total: 3,
                label: "",
                layers: &[],
            })
            .unwrap();
        assert!(memory.is_empty());
    }
}
