//! Recording and packet model.
//!
//! A [`MonoCameraData`] bundles the four sub-streams produced by a mono camera
//! recording. The same type serves as the caller-owned recording store and as
//! the per-slice packet handed to presets, so every accessor degrades to an
//! empty stream rather than failing.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};

use crate::{PlayerError, Result};

/// Anything carrying a microsecond timestamp.
pub trait Timestamped {
    fn timestamp(&self) -> i64;
}

/// Half-open `[start, end)` window in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> i64 {
        self.end - self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: i64,
    pub x: u16,
    pub y: u16,
    /// `true` for a positive (ON) event.
    pub polarity: bool,
}

impl Event {
    pub fn new(timestamp: i64, x: u16, y: u16, polarity: bool) -> Self {
        Self {
            timestamp,
            x,
            y,
            polarity,
        }
    }
}

/// Raw 8-bit image, either single channel or interleaved RGB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawImage")]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub pixels: Vec<u8>,
}

impl Image {
    pub fn gray(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        Self::with_channels(width, height, 1, pixels)
    }

    pub fn rgb(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        Self::with_channels(width, height, 3, pixels)
    }

    fn with_channels(width: u32, height: u32, channels: u8, pixels: Vec<u8>) -> Result<Self> {
        if !matches!(channels, 1 | 3) {
            return Err(PlayerError::msg(format!(
                "images have 1 or 3 channels, got {channels}"
            )));
        }
        let expected = width as usize * height as usize * channels as usize;
        if pixels.len() != expected {
            return Err(PlayerError::msg(format!(
                "image buffer holds {} bytes, expected {expected} for {width}x{height}x{channels}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            pixels,
        })
    }

    /// Returns the luminance of the pixel at `(row, col)`.
    pub fn luma(&self, row: u32, col: u32) -> u8 {
        let offset = (row as usize * self.width as usize + col as usize) * self.channels as usize;
        match self.channels {
            3 => {
                let r = self.pixels[offset] as f32;
                let g = self.pixels[offset + 1] as f32;
                let b = self.pixels[offset + 2] as f32;
                (0.299 * r + 0.587 * g + 0.114 * b).round().clamp(0.0, 255.0) as u8
            }
            _ => self.pixels[offset],
        }
    }

    /// Returns the pixel at `(row, col)` as opaque RGBA.
    pub fn rgba(&self, row: u32, col: u32) -> [u8; 4] {
        let offset = (row as usize * self.width as usize + col as usize) * self.channels as usize;
        match self.channels {
            3 => [
                self.pixels[offset],
                self.pixels[offset + 1],
                self.pixels[offset + 2],
                255,
            ],
            _ => {
                let v = self.pixels[offset];
                [v, v, v, 255]
            }
        }
    }
}

#[derive(Deserialize)]
struct RawImage {
    width: u32,
    height: u32,
    channels: u8,
    pixels: Vec<u8>,
}

impl TryFrom<RawImage> for Image {
    type Error = PlayerError;

    fn try_from(raw: RawImage) -> Result<Self> {
        Image::with_channels(raw.width, raw.height, raw.channels, raw.pixels)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub timestamp: i64,
    pub image: Image,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Imu {
    pub timestamp: i64,
    pub accelerometer: [f32; 3],
    pub gyroscope: [f32; 3],
    pub temperature: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    TimestampReset,
    ExternalRisingEdge,
    ExternalFallingEdge,
    ExternalPulse,
    ApsFrameStart,
    ApsFrameEnd,
    ApsExposureStart,
    ApsExposureEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub timestamp: i64,
    pub kind: TriggerKind,
}

impl Timestamped for Event {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

impl Timestamped for Frame {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

impl Timestamped for Imu {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

impl Timestamped for Trigger {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// Time-ordered sequence of elements of one kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Stream<T> {
    elements: Vec<T>,
}

impl<'de, T> Deserialize<'de> for Stream<T>
where
    T: Deserialize<'de> + Timestamped + Clone,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let elements = Vec::<T>::deserialize(deserializer)?;
        Stream::from_sorted(elements).map_err(serde::de::Error::custom)
    }
}

impl<T> Default for Stream<T> {
    fn default() -> Self {
        Self {
            elements: Vec::new(),
        }
    }
}

pub type EventStream = Stream<Event>;
pub type FrameStream = Stream<Frame>;
pub type ImuStream = Stream<Imu>;
pub type TriggerStream = Stream<Trigger>;

impl<T: Timestamped + Clone> Stream<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a stream from elements that must already be in time order.
    pub fn from_sorted(elements: Vec<T>) -> Result<Self> {
        if elements
            .windows(2)
            .any(|pair| pair[0].timestamp() > pair[1].timestamp())
        {
            return Err(PlayerError::msg("stream elements are not in time order"));
        }
        Ok(Self { elements })
    }

    pub fn push(&mut self, element: T) -> Result<()> {
        if self.highest_time() > element.timestamp() {
            return Err(PlayerError::msg("tried adding element to stream out of order"));
        }
        self.elements.push(element);
        Ok(())
    }

    /// Appends another stream that starts no earlier than this one ends.
    pub fn extend(&mut self, other: &Stream<T>) -> Result<()> {
        if other.is_empty() {
            return Ok(());
        }
        if !self.is_empty() && self.highest_time() > other.lowest_time() {
            return Err(PlayerError::msg("tried adding elements to stream out of order"));
        }
        self.elements.extend_from_slice(&other.elements);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.elements.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.elements
    }

    pub fn front(&self) -> Option<&T> {
        self.elements.first()
    }

    pub fn back(&self) -> Option<&T> {
        self.elements.last()
    }

    /// Timestamp of the first element, `0` when empty.
    pub fn lowest_time(&self) -> i64 {
        self.front().map(Timestamped::timestamp).unwrap_or(0)
    }

    /// Timestamp of the last element, `0` when empty.
    pub fn highest_time(&self) -> i64 {
        self.back().map(Timestamped::timestamp).unwrap_or(0)
    }

    /// Half-open window covering every element.
    pub fn time_window(&self) -> TimeWindow {
        if self.is_empty() {
            return TimeWindow::new(0, 0);
        }
        TimeWindow::new(self.lowest_time(), self.highest_time() + 1)
    }

    /// Returns `len` elements starting at `start`; out-of-range requests are
    /// truncated to the available elements.
    pub fn slice(&self, start: usize, len: usize) -> Self {
        let start = start.min(self.elements.len());
        let end = start.saturating_add(len).min(self.elements.len());
        Self {
            elements: self.elements[start..end].to_vec(),
        }
    }

    /// Returns the elements with `start <= timestamp < end`.
    pub fn slice_time(&self, start: i64, end: i64) -> Self {
        let lower = self.elements.partition_point(|e| e.timestamp() < start);
        let upper = self.elements.partition_point(|e| e.timestamp() < end);
        if upper <= lower {
            return Self::default();
        }
        Self {
            elements: self.elements[lower..upper].to_vec(),
        }
    }
}

impl<'a, T> IntoIterator for &'a Stream<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl EventStream {
    pub fn xs(&self) -> Vec<u16> {
        self.elements.iter().map(|e| e.x).collect()
    }

    pub fn ys(&self) -> Vec<u16> {
        self.elements.iter().map(|e| e.y).collect()
    }

    pub fn timestamps(&self) -> Vec<i64> {
        self.elements.iter().map(|e| e.timestamp).collect()
    }

    pub fn polarities(&self) -> Vec<bool> {
        self.elements.iter().map(|e| e.polarity).collect()
    }
}

/// Names of the sub-streams held by [`MonoCameraData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamName {
    #[default]
    Events,
    Frames,
    Imus,
    Triggers,
}

impl StreamName {
    pub const ALL: [StreamName; 4] = [
        StreamName::Events,
        StreamName::Frames,
        StreamName::Imus,
        StreamName::Triggers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamName::Events => "events",
            StreamName::Frames => "frames",
            StreamName::Imus => "imus",
            StreamName::Triggers => "triggers",
        }
    }
}

impl fmt::Display for StreamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamName {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self> {
        StreamName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| PlayerError::UnknownStream(s.to_string()))
    }
}

/// Bundle of the event, frame, IMU and trigger streams of a mono camera.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonoCameraData {
    #[serde(default)]
    pub events: EventStream,
    #[serde(default)]
    pub frames: FrameStream,
    #[serde(default)]
    pub imus: ImuStream,
    #[serde(default)]
    pub triggers: TriggerStream,
}

/// A packet is a time-bounded slice of a recording with the same layout.
pub type Packet = MonoCameraData;

impl MonoCameraData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &EventStream {
        &self.events
    }

    pub fn frames(&self) -> &FrameStream {
        &self.frames
    }

    pub fn imus(&self) -> &ImuStream {
        &self.imus
    }

    pub fn triggers(&self) -> &TriggerStream {
        &self.triggers
    }

    /// Returns `true` when every sub-stream is empty.
    pub fn is_empty(&self) -> bool {
        StreamName::ALL.iter().all(|name| self.size(*name) == 0)
    }

    pub fn size(&self, name: StreamName) -> usize {
        match name {
            StreamName::Events => self.events.len(),
            StreamName::Frames => self.frames.len(),
            StreamName::Imus => self.imus.len(),
            StreamName::Triggers => self.triggers.len(),
        }
    }

    pub fn time_window(&self, name: StreamName) -> TimeWindow {
        match name {
            StreamName::Events => self.events.time_window(),
            StreamName::Frames => self.frames.time_window(),
            StreamName::Imus => self.imus.time_window(),
            StreamName::Triggers => self.triggers.time_window(),
        }
    }

    /// Appends every sub-stream of `other`.
    pub fn add(&mut self, other: &MonoCameraData) -> Result<()> {
        self.events.extend(&other.events)?;
        self.frames.extend(&other.frames)?;
        self.imus.extend(&other.imus)?;
        self.triggers.extend(&other.triggers)?;
        Ok(())
    }

    /// Takes `len` elements of the `name` stream starting at `start`; the other
    /// streams are cut to the time window of that selection.
    pub fn slice_by_number(&self, name: StreamName, start: usize, len: usize) -> Result<Self> {
        if start.saturating_add(len) > self.size(name) {
            return Err(PlayerError::msg(format!(
                "slice of {len} elements at {start} exceeds the {name} stream of {}",
                self.size(name)
            )));
        }
        if len == 0 {
            return Ok(Self::default());
        }

        let window = match name {
            StreamName::Events => self.events.slice(start, len).time_window(),
            StreamName::Frames => self.frames.slice(start, len).time_window(),
            StreamName::Imus => self.imus.slice(start, len).time_window(),
            StreamName::Triggers => self.triggers.slice(start, len).time_window(),
        };
        let mut sliced = self.slice_time_except(name, window);
        match name {
            StreamName::Events => sliced.events = self.events.slice(start, len),
            StreamName::Frames => sliced.frames = self.frames.slice(start, len),
            StreamName::Imus => sliced.imus = self.imus.slice(start, len),
            StreamName::Triggers => sliced.triggers = self.triggers.slice(start, len),
        }
        Ok(sliced)
    }

    /// Returns every stream cut to `start <= timestamp < end`.
    pub fn slice_by_time(&self, start: i64, end: i64) -> Self {
        Self {
            events: self.events.slice_time(start, end),
            frames: self.frames.slice_time(start, end),
            imus: self.imus.slice_time(start, end),
            triggers: self.triggers.slice_time(start, end),
        }
    }

    fn slice_time_except(&self, skip: StreamName, window: TimeWindow) -> Self {
        let mut sliced = Self::default();
        let TimeWindow { start, end } = window;
        for name in StreamName::ALL.into_iter().filter(|name| *name != skip) {
            match name {
                StreamName::Events => sliced.events = self.events.slice_time(start, end),
                StreamName::Frames => sliced.frames = self.frames.slice_time(start, end),
                StreamName::Imus => sliced.imus = self.imus.slice_time(start, end),
                StreamName::Triggers => sliced.triggers = self.triggers.slice_time(start, end),
            }
        }
        sliced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(timestamps: &[i64]) -> EventStream {
        Stream::from_sorted(
            timestamps
                .iter()
                .map(|ts| Event::new(*ts, 0, 0, true))
                .collect(),
        )
        .unwrap()
    }

    fn frame(timestamp: i64) -> Frame {
        Frame {
            timestamp,
            image: Image::gray(1, 1, vec![0]).unwrap(),
        }
    }

    #[test]
    fn rejects_out_of_order_elements() {
        assert!(Stream::from_sorted(vec![frame(5), frame(1)]).is_err());

        let mut stream = events(&[10]);
        assert!(stream.push(Event::new(5, 0, 0, false)).is_err());
        assert!(stream.push(Event::new(10, 0, 0, false)).is_ok());
    }

    #[test]
    fn slices_time_as_half_open_window() {
        let stream = events(&[0, 10, 20, 30]);
        let slice = stream.slice_time(10, 30);
        assert_eq!(slice.timestamps(), vec![10, 20]);
        assert!(stream.slice_time(31, 40).is_empty());
    }

    #[test]
    fn time_window_includes_last_element() {
        let stream = events(&[5, 9]);
        assert_eq!(stream.time_window(), TimeWindow::new(5, 10));
        assert_eq!(EventStream::new().time_window(), TimeWindow::new(0, 0));
    }

    #[test]
    fn number_slice_cuts_other_streams_by_window() {
        let data = MonoCameraData {
            events: events(&[0, 10, 20, 30]),
            frames: Stream::from_sorted(vec![frame(5), frame(15), frame(25)]).unwrap(),
            ..Default::default()
        };

        let packet = data.slice_by_number(StreamName::Events, 1, 2).unwrap();
        assert_eq!(packet.events.timestamps(), vec![10, 20]);
        let frame_times: Vec<i64> = packet.frames.iter().map(|f| f.timestamp).collect();
        assert_eq!(frame_times, vec![15]);

        assert!(data.slice_by_number(StreamName::Events, 3, 2).is_err());
    }

    #[test]
    fn parses_stream_names() {
        assert_eq!("frames".parse::<StreamName>().unwrap(), StreamName::Frames);
        let err = "audio".parse::<StreamName>().unwrap_err();
        assert!(matches!(err, PlayerError::UnknownStream(_)));
    }

    #[test]
    fn loading_rejects_short_image_buffers() {
        let json = r#"{ "frames": [
            { "timestamp": 0, "image": { "width": 4, "height": 4, "channels": 1, "pixels": [1, 2] } }
        ] }"#;
        let err = serde_json::from_str::<MonoCameraData>(json).unwrap_err();
        assert!(err.to_string().contains("image buffer holds 2 bytes"));

        let json = r#"{ "width": 1, "height": 1, "channels": 0, "pixels": [] }"#;
        assert!(serde_json::from_str::<Image>(json).is_err());

        let json = r#"{ "width": 1, "height": 2, "channels": 1, "pixels": [3, 4] }"#;
        let image: Image = serde_json::from_str(json).unwrap();
        assert_eq!(image.luma(1, 0), 4);
    }

    #[test]
    fn loading_rejects_unsorted_streams() {
        let json = r#"{ "events": [
            { "timestamp": 5000, "x": 0, "y": 0, "polarity": true },
            { "timestamp": 0, "x": 0, "y": 0, "polarity": true },
            { "timestamp": 9000, "x": 0, "y": 0, "polarity": false }
        ] }"#;
        let err = serde_json::from_str::<MonoCameraData>(json).unwrap_err();
        assert!(err.to_string().contains("not in time order"));

        let sorted: EventStream = serde_json::from_str(
            r#"[{ "timestamp": 0, "x": 1, "y": 2, "polarity": true },
                { "timestamp": 0, "x": 3, "y": 4, "polarity": false }]"#,
        )
        .unwrap();
        assert_eq!(sorted.len(), 2);
    }

    #[test]
    fn converts_rgb_pixels() {
        let image = Image::rgb(1, 1, vec![255, 0, 0]).unwrap();
        assert_eq!(image.rgba(0, 0), [255, 0, 0, 255]);
        assert_eq!(image.luma(0, 0), 76);
        assert!(Image::gray(2, 2, vec![0; 3]).is_err());
    }
}
