use std::{fs, time::Duration};

use crossbeam::channel::unbounded;
use dvplayer_core::{
    BackendKind, Control, Event, Frame, Image, MonoCameraData, OutputFormat, Player, PlayerConfig,
    Resolution, Session, Stream, StreamName, TickLabels, ViewMode,
};

const WIDTH: u32 = 8;
const HEIGHT: u32 = 6;

/// 40 ms of events sweeping across the sensor with a frame every 10 ms.
fn recording() -> MonoCameraData {
    let events = (0..40i64)
        .map(|i| {
            Event::new(
                i * 1_000,
                (i % WIDTH as i64) as u16,
                (i % HEIGHT as i64) as u16,
                i % 3 != 0,
            )
        })
        .collect();
    let frames = (0..4i64)
        .map(|i| Frame {
            timestamp: i * 10_000,
            image: Image::gray(WIDTH, HEIGHT, vec![(i * 60) as u8; (WIDTH * HEIGHT) as usize])
                .unwrap(),
        })
        .collect();
    MonoCameraData {
        events: Stream::from_sorted(events).unwrap(),
        frames: Stream::from_sorted(frames).unwrap(),
        ..Default::default()
    }
}

fn config(mode: ViewMode, backend: BackendKind) -> PlayerConfig {
    PlayerConfig::new(Resolution::new(WIDTH, HEIGHT).unwrap(), mode, backend)
}

#[test]
fn raster_export_writes_animated_gif() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hybrid.gif");
    let mut config = config(ViewMode::Hybrid, BackendKind::Raster);
    config.output.path = Some(path.clone());
    config.output.scale = 2;

    let outcome = Player::new(config)
        .unwrap()
        .view_per_time_interval(
            &recording(),
            StreamName::Events,
            Duration::from_millis(10),
            Session::export(),
        )
        .unwrap();

    assert_eq!(outcome.frames_rendered, 4);
    assert_eq!(outcome.output.as_deref(), Some(path.as_path()));
    assert!(fs::read(&path).unwrap().starts_with(b"GIF89a"));
}

#[test]
fn raster_export_writes_png_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let frames = dir.path().join("frames");
    let mut config = config(ViewMode::Planar, BackendKind::Raster);
    config.output.path = Some(frames.clone());
    config.output.format = OutputFormat::Png;

    let outcome = Player::new(config)
        .unwrap()
        .view_per_number_interval(&recording(), StreamName::Frames, 2, Session::export())
        .unwrap();

    // Two packets of two frames each, then the trailing events flushed as a third.
    assert_eq!(outcome.frames_rendered, 3);
    let first = image::open(frames.join("frame_00000.png")).unwrap();
    assert!(first.width() >= WIDTH);
    assert!(frames.join("frame_00002.png").exists());
    assert!(!frames.join("frame_00003.png").exists());
}

#[test]
fn html_export_contains_every_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("figure.html");
    let mut config = config(ViewMode::Hybrid, BackendKind::Html);
    config.output.path = Some(path.clone());
    config.playback.tick_labels = TickLabels::Time;

    let outcome = Player::new(config)
        .unwrap()
        .view_per_time_interval(
            &recording(),
            StreamName::Events,
            Duration::from_millis(10),
            Session::export(),
        )
        .unwrap();

    assert_eq!(outcome.frames_rendered, 4);
    let html = fs::read_to_string(&path).unwrap();
    assert!(html.contains("\"heatmap\""));
    assert!(html.contains("\"scatter3d\""));
    assert!(html.contains("\"surface\""));
    assert!(html.contains("00:00:00.030000"));
}

#[test]
fn interactive_raster_session_follows_controls() {
    let dir = tempfile::tempdir().unwrap();
    let preview = dir.path().join("preview.png");
    let mut config = config(ViewMode::Spatial, BackendKind::Raster);
    config.output.path = Some(preview.clone());
    config.playback.autoplay = false;

    let (tx, rx) = unbounded();
    for control in [
        Control::StepForward,
        Control::StepForward,
        Control::StepBack,
        Control::ScrubTo(99),
        Control::Close,
    ] {
        tx.send(control).unwrap();
    }

    let outcome = Player::new(config)
        .unwrap()
        .view(
            &recording(),
            Session::interactive(rx, Box::new(dvplayer_core::timeline::NullView)),
        )
        .unwrap();

    assert_eq!(outcome.frames_rendered, 4);
    assert!(preview.exists());
}

#[test]
fn configuration_errors_surface_before_playback() {
    let err = Player::from_names(&[WIDTH, HEIGHT, 3], "2d", "raster").unwrap_err();
    assert!(err.is_configuration());

    let mut config = config(ViewMode::Planar, BackendKind::Raster);
    config.playback.fps = 0;
    assert!(Player::new(config).unwrap_err().is_configuration());
}
