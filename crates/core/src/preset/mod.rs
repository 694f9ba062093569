//! Visualization presets for mono camera packets.
//!
//! A [`Preset`] owns the sliced packet sequence and maps one packet (or no
//! packet, for placeholder creation) to a [`Layer`]. Draw functions are pure
//! in the packet index: replaying an index, in either direction, yields the
//! same layer given the same previous layer. Style functions depend only on
//! the configured resolution.

pub mod histogram;

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    config::{Resolution, TickLabels},
    data::{Image, Packet, StreamName},
    layer::{
        Camera, CellStyle, Colormap, DrawCall, Layer, PlaneStyle, PointCloudLayer, RasterLayer,
        SceneStyle, SurfaceLayer, TimeAxis, TraceParams,
    },
    PlayerError, Result,
};

use histogram::{event_histogram, flip_rows, format_wall_clock, time_ticks, TIME_TICKS};

/// Trace parameter selecting the [`EventMode`] of an event raster.
pub const EVENT_MODE_PARAM: &str = "mode";

const EVENT_RANGE: (f32, f32) = (-1.0, 1.0);
const FRAME_RANGE: (f32, f32) = (0.0, 255.0);
const POLARITY_RANGE: (f32, f32) = (0.0, 1.0);
/// Sensor extent that maps to one unit of 3D box length.
const SCENE_UNIT: f32 = 500.0;

/// Weighting applied when binning events into a 2D histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventMode {
    /// Signed sum: `+1` per positive event, `-1` per negative event.
    Polar,
    /// Unsigned count per pixel.
    Monopolar,
    /// Event count per pixel, signed by the most recent polarity there.
    #[default]
    Accumulate,
}

impl fmt::Display for EventMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventMode::Polar => "polar",
            EventMode::Monopolar => "monopolar",
            EventMode::Accumulate => "accumulate",
        })
    }
}

impl FromStr for EventMode {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "polar" => Ok(EventMode::Polar),
            "monopolar" => Ok(EventMode::Monopolar),
            "accumulate" => Ok(EventMode::Accumulate),
            other => Err(PlayerError::UnknownEventMode(other.to_string())),
        }
    }
}

/// Default visualizations for a sliced mono camera recording.
#[derive(Debug, Clone)]
pub struct Preset {
    resolution: Resolution,
    packets: Vec<Packet>,
    ticks: Vec<String>,
    event_mode: EventMode,
    empty: Packet,
}

impl Preset {
    pub fn new(resolution: Resolution, packets: Vec<Packet>) -> Self {
        let ticks = (0..packets.len()).map(|i| i.to_string()).collect();
        Self {
            resolution,
            packets,
            ticks,
            event_mode: EventMode::default(),
            empty: Packet::default(),
        }
    }

    pub fn with_event_mode(mut self, mode: EventMode) -> Self {
        self.event_mode = mode;
        self
    }

    /// Relabels ticks; time labels use the start of each packet's `reference`
    /// stream and fall back to the index for packets where it is empty.
    pub fn with_tick_labels(mut self, labels: TickLabels, reference: StreamName) -> Self {
        self.ticks = self
            .packets
            .iter()
            .enumerate()
            .map(|(i, packet)| match labels {
                TickLabels::Time if packet.size(reference) > 0 => {
                    format_wall_clock(packet.time_window(reference).start)
                }
                _ => i.to_string(),
            })
            .collect();
        self
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn ticks(&self) -> &[String] {
        &self.ticks
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Out-of-range indices read as an empty packet.
    fn packet(&self, index: usize) -> &Packet {
        self.packets.get(index).unwrap_or(&self.empty)
    }

    fn width(&self) -> u32 {
        self.resolution.width
    }

    fn height(&self) -> u32 {
        self.resolution.height
    }

    // ---------------- 2d settings ----------------

    pub fn set_2d_plot(&self, _params: &TraceParams) -> CellStyle {
        CellStyle::Plane(PlaneStyle {
            x_range: (0.0, self.width() as f32),
            y_range: (0.0, self.height() as f32),
            aspect: 1.0,
            show_ticks: false,
        })
    }

    /// Event histogram, flipped into display orientation.
    pub fn plot_2d_event(&self, call: DrawCall<'_>, params: &TraceParams) -> Layer {
        let DrawCall::Update { index, .. } = call else {
            return Layer::Raster(self.blank_raster(EVENT_RANGE, Colormap::Polarity));
        };

        let events = self.packet(index).events();
        if events.is_empty() {
            return Layer::Raster(self.blank_raster(EVENT_RANGE, Colormap::Polarity));
        }

        let mode = params
            .get(EVENT_MODE_PARAM)
            .and_then(|value| value.as_str())
            .and_then(|name| name.parse().ok())
            .unwrap_or(self.event_mode);
        let counts = event_histogram(events, self.resolution, mode);
        Layer::Raster(RasterLayer {
            width: self.width(),
            height: self.height(),
            values: flip_rows(&counts, self.width() as usize, self.height() as usize),
            range: EVENT_RANGE,
            colormap: Colormap::Polarity,
        })
    }

    /// First frame of the packet in grayscale; keeps the previous image when
    /// the packet carries no frame.
    pub fn plot_2d_frame(&self, call: DrawCall<'_>, _params: &TraceParams) -> Layer {
        let DrawCall::Update { index, previous } = call else {
            return Layer::Raster(self.blank_raster(FRAME_RANGE, Colormap::Gray));
        };

        let Some(frame) = self.packet(index).frames().front() else {
            return previous.clone();
        };

        let gray = self.fit_luma(&frame.image);
        Layer::Raster(RasterLayer {
            width: self.width(),
            height: self.height(),
            values: flip_rows(&gray, self.width() as usize, self.height() as usize),
            range: FRAME_RANGE,
            colormap: Colormap::Gray,
        })
    }

    fn blank_raster(&self, range: (f32, f32), colormap: Colormap) -> RasterLayer {
        RasterLayer::zeros(self.width(), self.height(), range, colormap)
    }

    /// Luminance cropped to the sensor grid; pixels the image does not cover stay
    /// black.
    fn fit_luma(&self, image: &Image) -> Vec<f32> {
        let mut values = vec![0.0; self.resolution.pixels()];
        let rows = image.height.min(self.height());
        let cols = image.width.min(self.width());
        for row in 0..rows {
            for col in 0..cols {
                values[(row * self.width() + col) as usize] = image.luma(row, col) as f32;
            }
        }
        values
    }

    // ---------------- 3d settings ----------------

    pub fn set_3d_plot(&self, _params: &TraceParams) -> CellStyle {
        let rows = self.height() as f32;
        let cols = self.width() as f32;
        CellStyle::Scene(SceneStyle {
            row_range: (0.0, rows),
            col_range: (0.0, cols),
            aspect_ratio: [rows / SCENE_UNIT, cols / SCENE_UNIT, 1.0],
            camera: Camera {
                elevation: 35.0,
                azimuth: -10.0,
                roll: 0.0,
            },
        })
    }

    /// Events as `(mirrored row, mirrored col, time)` points colored by
    /// polarity; the time axis spans the current packet only.
    pub fn plot_3d_event(&self, call: DrawCall<'_>, _params: &TraceParams) -> Layer {
        let DrawCall::Update { index, .. } = call else {
            return Layer::Points(PointCloudLayer::empty(POLARITY_RANGE, Colormap::Polarity));
        };

        let events = self.packet(index).events();
        if events.is_empty() {
            return Layer::Points(PointCloudLayer::empty(POLARITY_RANGE, Colormap::Polarity));
        }

        let height = self.height() as f32;
        let width = self.width() as f32;
        let mut layer = PointCloudLayer::empty(POLARITY_RANGE, Colormap::Polarity);
        for event in events {
            layer.rows.push(height - event.y as f32 - 1.0);
            layer.cols.push(width - event.x as f32 - 1.0);
            layer.timestamps.push(event.timestamp);
            layer.colors.push(if event.polarity { 1.0 } else { 0.0 });
        }

        let min = events.lowest_time();
        let max = events.highest_time();
        layer.time_axis = Some(TimeAxis {
            min,
            max,
            ticks: time_ticks(min, max, TIME_TICKS),
        });
        Layer::Points(layer)
    }

    /// Last frame of the packet as an RGBA texture on its time plane; keeps
    /// the previous surface when the packet carries no frame.
    pub fn plot_3d_frame(&self, call: DrawCall<'_>, _params: &TraceParams) -> Layer {
        let DrawCall::Update { index, previous } = call else {
            return Layer::Surface(SurfaceLayer::hidden());
        };

        let Some(frame) = self.packet(index).frames().back() else {
            return previous.clone();
        };

        let image = &frame.image;
        let mut rgba = Vec::with_capacity(image.width as usize * image.height as usize * 4);
        for row in 0..image.height {
            for col in 0..image.width {
                rgba.extend_from_slice(&image.rgba(image.height - row - 1, image.width - col - 1));
            }
        }
        Layer::Surface(SurfaceLayer {
            timestamp: Some(frame.timestamp),
            width: image.width,
            height: image.height,
            rgba,
        })
    }
}
