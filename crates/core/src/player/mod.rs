//! Entry point tying slicing, presets and backends together.

use std::{sync::Arc, time::Duration};

use crate::{
    composer::{DrawFn, StyleFn},
    config::{BackendKind, PlayerConfig, Resolution, ViewMode},
    data::{MonoCameraData, StreamName},
    layer::{CellKind, CellStyle, DrawCall, Layer, TraceParams},
    preset::{Preset, EVENT_MODE_PARAM},
    render::{create_backend, RenderBackend, ShowOutcome},
    slicing::{slice_recording, MonoCameraSlicer, SlicePolicy},
    timeline::Session,
    Result,
};

type PlotFn = fn(&Preset, DrawCall<'_>, &TraceParams) -> Layer;
type SetupFn = fn(&Preset, &TraceParams) -> CellStyle;

/// Plays mono camera recordings with the configured layout and backend.
#[derive(Debug, Clone)]
pub struct Player {
    config: PlayerConfig,
}

impl Player {
    pub fn new(config: PlayerConfig) -> Result<Self> {
        config.validate()?;
        tracing::debug!(
            resolution = %config.resolution,
            mode = %config.mode,
            backend = %config.backend,
            "player configured"
        );
        Ok(Self { config })
    }

    /// Builds a player from raw names, e.g. `(&[346, 260], "hybrid", "raster")`.
    pub fn from_names(resolution: &[u32], mode: &str, backend: &str) -> Result<Self> {
        let resolution = Resolution::try_from(resolution)?;
        let mode: ViewMode = mode.parse()?;
        let backend: BackendKind = backend.parse()?;
        Self::new(PlayerConfig::new(resolution, mode, backend))
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Plays `data` sliced with the configured reference stream and policy.
    pub fn view(&self, data: &MonoCameraData, session: Session) -> Result<ShowOutcome> {
        let slicing = self.config.slicing;
        self.play(data, slicing.reference, slicing.policy, session)
    }

    pub fn view_per_time_interval(
        &self,
        data: &MonoCameraData,
        reference: StreamName,
        interval: Duration,
        session: Session,
    ) -> Result<ShowOutcome> {
        self.play(data, reference, SlicePolicy::every(interval), session)
    }

    pub fn view_per_number_interval(
        &self,
        data: &MonoCameraData,
        reference: StreamName,
        count: usize,
        session: Session,
    ) -> Result<ShowOutcome> {
        self.play(data, reference, SlicePolicy::every_n(count), session)
    }

    fn play(
        &self,
        data: &MonoCameraData,
        reference: StreamName,
        policy: SlicePolicy,
        session: Session,
    ) -> Result<ShowOutcome> {
        let backend = create_backend(self.config.backend, &self.config.output, &self.config.playback);
        self.play_on(backend, data, reference, policy, session)
    }

    /// Same as the `view*` methods, on a caller-built backend.
    pub fn play_on(
        &self,
        mut backend: Box<dyn RenderBackend>,
        data: &MonoCameraData,
        reference: StreamName,
        policy: SlicePolicy,
        session: Session,
    ) -> Result<ShowOutcome> {
        policy.validate()?;
        let mut slicer = MonoCameraSlicer::new();
        let packets = slice_recording(&mut slicer, data, reference, policy)?;
        tracing::info!(%reference, %policy, packets = packets.len(), "recording sliced");

        let preset = Arc::new(
            Preset::new(self.config.resolution, packets)
                .with_event_mode(self.config.events)
                .with_tick_labels(self.config.playback.tick_labels, reference),
        );
        backend.set_ticks(preset.ticks().to_vec());
        self.compose(backend.as_mut(), &preset)?;
        backend.show(session)
    }

    fn compose(&self, backend: &mut dyn RenderBackend, preset: &Arc<Preset>) -> Result<()> {
        let mut event_params = TraceParams::new();
        event_params.insert(
            EVENT_MODE_PARAM.into(),
            self.config.events.to_string().into(),
        );

        let plane = |backend: &mut dyn RenderBackend, col| -> Result<()> {
            backend.append_trace(
                1,
                col,
                draw(preset, Preset::plot_2d_frame),
                style(preset, Preset::set_2d_plot),
                TraceParams::new(),
            )?;
            backend.append_trace(
                1,
                col,
                draw(preset, Preset::plot_2d_event),
                style(preset, Preset::set_2d_plot),
                event_params.clone(),
            )?;
            Ok(())
        };
        let scene = |backend: &mut dyn RenderBackend, col| -> Result<()> {
            backend.append_trace(
                1,
                col,
                draw(preset, Preset::plot_3d_frame),
                style(preset, Preset::set_3d_plot),
                TraceParams::new(),
            )?;
            backend.append_trace(
                1,
                col,
                draw(preset, Preset::plot_3d_event),
                style(preset, Preset::set_3d_plot),
                TraceParams::new(),
            )?;
            Ok(())
        };

        match self.config.mode {
            ViewMode::Hybrid => {
                backend.set_subplot(1, 2, vec![vec![CellKind::Plane, CellKind::Scene]])?;
                plane(backend, 1)?;
                scene(backend, 2)?;
            }
            ViewMode::Planar => {
                backend.set_subplot(1, 1, vec![vec![CellKind::Plane]])?;
                plane(backend, 1)?;
            }
            ViewMode::Spatial => {
                backend.set_subplot(1, 1, vec![vec![CellKind::Scene]])?;
                scene(backend, 1)?;
            }
        }
        Ok(())
    }
}

fn draw(preset: &Arc<Preset>, plot: PlotFn) -> DrawFn {
    let preset = Arc::clone(preset);
    Box::new(move |call, params| plot(&preset, call, params))
}

fn style(preset: &Arc<Preset>, setup: SetupFn) -> StyleFn {
    let preset = Arc::clone(preset);
    Box::new(move |params| setup(&preset, params))
}
