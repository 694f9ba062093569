//! Backend-neutral drawing descriptors.
//!
//! Presets return [`Layer`] values and [`CellStyle`] values; backends decide how
//! to attach them to their own visual elements. Every update produces a fresh
//! descriptor, nothing here is mutated in place by a backend.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{PlayerError, Result};

/// Fixed keyword parameters attached to a trace at registration.
pub type TraceParams = serde_json::Map<String, serde_json::Value>;

/// Invocation of a trace's draw function.
#[derive(Debug, Clone, Copy)]
pub enum DrawCall<'a> {
    /// Placeholder creation: establishes scale, color map and axis ranges.
    Create,
    /// Refresh for packet `index`; `previous` is the layer the trace last returned.
    Update { index: usize, previous: &'a Layer },
}

/// Kind of a subplot cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellKind {
    #[serde(rename = "2d")]
    Plane,
    #[serde(rename = "3d")]
    Scene,
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellKind::Plane => f.write_str("2d"),
            CellKind::Scene => f.write_str("3d"),
        }
    }
}

impl FromStr for CellKind {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "2d" => Ok(CellKind::Plane),
            "3d" => Ok(CellKind::Scene),
            other => Err(PlayerError::InvalidLayout(format!(
                "unknown cell type `{other}`"
            ))),
        }
    }
}

/// Fixed `rows x cols` grid of typed cells, stored row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    rows: usize,
    cols: usize,
    cells: Vec<CellKind>,
}

impl Layout {
    /// Builds a layout from a row-major grid of cell specs.
    pub fn new(rows: usize, cols: usize, specs: Vec<Vec<CellKind>>) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(PlayerError::InvalidLayout(
                "subplot grid needs at least one row and one column".into(),
            ));
        }
        if specs.len() != rows || specs.iter().any(|row| row.len() != cols) {
            return Err(PlayerError::InvalidLayout(format!(
                "cell specs do not describe a {rows}x{cols} grid"
            )));
        }
        Ok(Self {
            rows,
            cols,
            cells: specs.into_iter().flatten().collect(),
        })
    }

    pub fn single(kind: CellKind) -> Self {
        Self {
            rows: 1,
            cols: 1,
            cells: vec![kind],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[CellKind] {
        &self.cells
    }

    pub fn kind(&self, flat: usize) -> Option<CellKind> {
        self.cells.get(flat).copied()
    }

    /// Row-major flat index of the 1-based `(row, col)` cell.
    pub fn flat_index(&self, row: usize, col: usize) -> Result<usize> {
        if row == 0 || col == 0 || row > self.rows || col > self.cols {
            return Err(PlayerError::InvalidLayout(format!(
                "cell ({row}, {col}) is outside the {}x{} grid",
                self.rows, self.cols
            )));
        }
        Ok((row - 1) * self.cols + (col - 1))
    }

    /// Inverse of [`Layout::flat_index`], returning 1-based coordinates.
    pub fn cell_position(&self, flat: usize) -> Option<(usize, usize)> {
        (flat < self.cells.len()).then(|| (flat / self.cols + 1, flat % self.cols + 1))
    }
}

/// Color scale applied to scalar layer values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colormap {
    /// Black to white.
    Gray,
    /// Red for negative, transparent at the midpoint, blue for positive.
    Polarity,
}

const POLARITY_NEGATIVE: [u8; 4] = [223, 73, 63, 255];
const POLARITY_NEUTRAL: [u8; 4] = [0, 0, 0, 0];
const POLARITY_POSITIVE: [u8; 4] = [46, 102, 153, 255];

impl Colormap {
    /// Maps `value` within `range` to an RGBA color, clamping outside values.
    pub fn rgba(&self, value: f32, range: (f32, f32)) -> [u8; 4] {
        let (lo, hi) = range;
        let t = if hi > lo {
            ((value - lo) / (hi - lo)).clamp(0.0, 1.0)
        } else {
            0.0
        };
        match self {
            Colormap::Gray => {
                let v = (t * 255.0).round() as u8;
                [v, v, v, 255]
            }
            Colormap::Polarity => {
                if t < 0.5 {
                    lerp(POLARITY_NEGATIVE, POLARITY_NEUTRAL, t * 2.0)
                } else {
                    lerp(POLARITY_NEUTRAL, POLARITY_POSITIVE, (t - 0.5) * 2.0)
                }
            }
        }
    }

    /// Plotly colorscale description of this map.
    pub fn stops(&self) -> Vec<(f32, [u8; 4])> {
        match self {
            Colormap::Gray => vec![(0.0, [0, 0, 0, 255]), (1.0, [255, 255, 255, 255])],
            Colormap::Polarity => vec![
                (0.0, POLARITY_NEGATIVE),
                (0.5, POLARITY_NEUTRAL),
                (1.0, POLARITY_POSITIVE),
            ],
        }
    }
}

fn lerp(from: [u8; 4], to: [u8; 4], t: f32) -> [u8; 4] {
    let mut out = [0u8; 4];
    for (channel, slot) in out.iter_mut().enumerate() {
        let a = from[channel] as f32;
        let b = to[channel] as f32;
        *slot = (a + (b - a) * t).round() as u8;
    }
    out
}

/// Scalar image in display orientation: row 0 is drawn at the bottom of a
/// y-up axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterLayer {
    pub width: u32,
    pub height: u32,
    pub values: Vec<f32>,
    pub range: (f32, f32),
    pub colormap: Colormap,
}

impl RasterLayer {
    pub fn zeros(width: u32, height: u32, range: (f32, f32), colormap: Colormap) -> Self {
        Self {
            width,
            height,
            values: vec![0.0; width as usize * height as usize],
            range,
            colormap,
        }
    }

    pub fn value(&self, row: u32, col: u32) -> f32 {
        self.values[row as usize * self.width as usize + col as usize]
    }

    /// Values grouped by row.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.values.chunks(self.width.max(1) as usize)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisTick {
    pub value: i64,
    pub label: String,
}

/// Time axis extents and labels of a 3D cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeAxis {
    pub min: i64,
    pub max: i64,
    pub ticks: Vec<AxisTick>,
}

/// Events placed in `(row, col, time)` space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCloudLayer {
    pub rows: Vec<f32>,
    pub cols: Vec<f32>,
    pub timestamps: Vec<i64>,
    pub colors: Vec<f32>,
    pub color_range: (f32, f32),
    pub colormap: Colormap,
    /// `None` keeps whatever time axis the cell already shows.
    pub time_axis: Option<TimeAxis>,
}

impl PointCloudLayer {
    pub fn empty(color_range: (f32, f32), colormap: Colormap) -> Self {
        Self {
            rows: Vec::new(),
            cols: Vec::new(),
            timestamps: Vec::new(),
            colors: Vec::new(),
            color_range,
            colormap,
            time_axis: None,
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Image texture on the constant-time plane `t = timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceLayer {
    /// `None` for the hidden placeholder.
    pub timestamp: Option<i64>,
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA texels indexed by `(row, col)` of the scene axes.
    pub rgba: Vec<u8>,
}

impl SurfaceLayer {
    pub fn hidden() -> Self {
        Self {
            timestamp: None,
            width: 0,
            height: 0,
            rgba: Vec::new(),
        }
    }

    pub fn texel(&self, row: u32, col: u32) -> [u8; 4] {
        let offset = (row as usize * self.width as usize + col as usize) * 4;
        [
            self.rgba[offset],
            self.rgba[offset + 1],
            self.rgba[offset + 2],
            self.rgba[offset + 3],
        ]
    }
}

/// One drawable layer produced by a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Layer {
    Raster(RasterLayer),
    Points(PointCloudLayer),
    Surface(SurfaceLayer),
}

impl Layer {
    pub fn as_raster(&self) -> Option<&RasterLayer> {
        match self {
            Layer::Raster(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_points(&self) -> Option<&PointCloudLayer> {
        match self {
            Layer::Points(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_surface(&self) -> Option<&SurfaceLayer> {
        match self {
            Layer::Surface(layer) => Some(layer),
            _ => None,
        }
    }
}

/// Axis setup of a 2D cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaneStyle {
    pub x_range: (f32, f32),
    pub y_range: (f32, f32),
    /// Ratio of y units to x units on screen.
    pub aspect: f32,
    pub show_ticks: bool,
}

/// Orthographic camera, angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub elevation: f32,
    pub azimuth: f32,
    pub roll: f32,
}

/// Axis setup of a 3D cell: sensor rows point up, columns run across and
/// time runs in depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneStyle {
    pub row_range: (f32, f32),
    pub col_range: (f32, f32),
    /// Relative box lengths of the row, column and time axes.
    pub aspect_ratio: [f32; 3],
    pub camera: Camera,
}

/// Fixed axis and camera state of one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CellStyle {
    Plane(PlaneStyle),
    Scene(SceneStyle),
}

impl CellStyle {
    pub fn kind(&self) -> CellKind {
        match self {
            CellStyle::Plane(_) => CellKind::Plane,
            CellStyle::Scene(_) => CellKind::Scene,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_index_is_row_major() {
        let layout = Layout::new(1, 2, vec![vec![CellKind::Plane, CellKind::Scene]]).unwrap();
        assert_eq!(layout.flat_index(1, 1).unwrap(), 0);
        assert_eq!(layout.flat_index(1, 2).unwrap(), 1);

        let grid = Layout::new(2, 3, vec![vec![CellKind::Plane; 3]; 2]).unwrap();
        assert_eq!(grid.flat_index(2, 1).unwrap(), 3);
        assert_eq!(grid.cell_position(5), Some((2, 3)));
        assert_eq!(grid.cell_position(6), None);
    }

    #[test]
    fn rejects_cells_outside_grid() {
        let layout = Layout::single(CellKind::Plane);
        assert!(layout.flat_index(0, 1).is_err());
        assert!(layout.flat_index(1, 2).is_err());
        assert!(Layout::new(1, 2, vec![vec![CellKind::Plane]]).is_err());
    }

    #[test]
    fn polarity_map_is_transparent_at_zero() {
        let map = Colormap::Polarity;
        assert_eq!(map.rgba(0.0, (-1.0, 1.0)), [0, 0, 0, 0]);
        assert_eq!(map.rgba(-1.0, (-1.0, 1.0)), POLARITY_NEGATIVE);
        assert_eq!(map.rgba(5.0, (-1.0, 1.0)), POLARITY_POSITIVE);
    }

    #[test]
    fn gray_map_spans_range() {
        let map = Colormap::Gray;
        assert_eq!(map.rgba(0.0, (0.0, 255.0)), [0, 0, 0, 255]);
        assert_eq!(map.rgba(255.0, (0.0, 255.0)), [255, 255, 255, 255]);
    }

    #[test]
    fn parses_cell_kinds() {
        assert_eq!("3d".parse::<CellKind>().unwrap(), CellKind::Scene);
        assert!("4d".parse::<CellKind>().is_err());
    }
}
