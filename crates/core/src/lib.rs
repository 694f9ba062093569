//! Core library for the DV recording player.
//!
//! A recording is sliced into packets, a [`Preset`] turns each packet into
//! backend-neutral layers, a [`TraceComposer`] arranges those layers on a
//! subplot grid, and a [`PlaybackController`] steps through the packets while
//! a [`RenderBackend`] draws them. [`Player`] wires these together from a
//! [`PlayerConfig`].

pub mod composer;
pub mod config;
pub mod data;
pub mod error;
pub mod layer;
pub mod player;
pub mod preset;
pub mod record;
pub mod render;
pub mod slicing;
pub mod timeline;

pub use composer::{CompositeFrame, DrawFn, FigureSurface, PlacedLayer, StyleFn, TraceComposer};
pub use config::{
    BackendKind, OutputConfig, OutputFormat, PlaybackConfig, PlayerConfig, Resolution,
    SlicingConfig, TickLabels, ViewMode,
};
pub use data::{
    Event, Frame, Image, Imu, MonoCameraData, Packet, Stream, StreamName, TimeWindow, Trigger,
    TriggerKind,
};
pub use error::{PlayerError, Result};
pub use layer::{CellKind, CellStyle, DrawCall, Layer, Layout, TraceParams};
pub use player::Player;
pub use preset::{EventMode, Preset};
pub use record::{FrameSink, MemoryRecorder, Recorder, RecordingSettings};
pub use render::{create_backend, HtmlFigure, RasterFigure, RenderBackend, ShowOutcome};
pub use slicing::{Dispatcher, MonoCameraSlicer, SlicePolicy};
pub use timeline::{Control, PlaybackController, PlaybackState, PlaybackView, Session};
