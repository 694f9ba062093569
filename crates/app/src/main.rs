mod controls;
mod demo;

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    time::Duration,
};

use clap::{Args, Parser, Subcommand};
use dvplayer_core::{
    BackendKind, EventMode, MonoCameraData, OutputFormat, Player, PlayerConfig, PlayerError,
    Session, SlicePolicy, StreamName, TickLabels, ViewMode,
};
use tracing_subscriber::EnvFilter;

use crate::controls::{KeyboardControls, TerminalView};

fn main() -> dvplayer_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::View { recording, options } => run_view(&recording, &options),
        Commands::Demo {
            duration_ms,
            options,
        } => run_demo(Duration::from_millis(duration_ms), &options),
    }
}

fn run_view(path: &Path, options: &PlayerOptions) -> dvplayer_core::Result<()> {
    tracing::info!(?path, "loading recording");
    let data: MonoCameraData = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    tracing::info!(
        events = data.events.len(),
        frames = data.frames.len(),
        imus = data.imus.len(),
        triggers = data.triggers.len(),
        "recording loaded"
    );
    play(&data, options)
}

fn run_demo(duration: Duration, options: &PlayerOptions) -> dvplayer_core::Result<()> {
    let config = options.config()?;
    tracing::info!(?duration, resolution = %config.resolution, "generating demo recording");
    let data = demo::recording(config.resolution, duration)?;
    play(&data, options)
}

fn play(data: &MonoCameraData, options: &PlayerOptions) -> dvplayer_core::Result<()> {
    let config = options.config()?;
    let interactive = options.export.is_none() && config.backend == BackendKind::Raster;
    let player = Player::new(config)?;

    let outcome = if interactive {
        let (controls, keyboard) = KeyboardControls::spawn()?;
        let session = Session::interactive(controls, Box::new(TerminalView::new()));
        let outcome = player.view(data, session);
        keyboard.stop();
        outcome?
    } else {
        player.view(data, Session::export())?
    };

    match &outcome.output {
        Some(output) => tracing::info!(
            frames = outcome.frames_rendered,
            ?output,
            "playback finished"
        ),
        None => tracing::info!(frames = outcome.frames_rendered, "playback finished"),
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Player for DV event camera recordings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a recording stored as JSON.
    View {
        /// Path to the recording file.
        recording: PathBuf,
        #[command(flatten)]
        options: PlayerOptions,
    },
    /// Play a synthetic rotating-bar recording.
    Demo {
        /// Length of the generated recording in milliseconds.
        #[arg(long, default_value_t = 1000)]
        duration_ms: u64,
        #[command(flatten)]
        options: PlayerOptions,
    },
}

#[derive(Args, Debug)]
struct PlayerOptions {
    /// JSON player configuration; flags below override it.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Layout: 2d, 3d or hybrid.
    #[arg(short, long)]
    mode: Option<ViewMode>,
    /// Rendering backend: raster or html.
    #[arg(short, long)]
    backend: Option<BackendKind>,
    /// Sensor resolution as WIDTHxHEIGHT.
    #[arg(long, value_parser = parse_resolution)]
    resolution: Option<[u32; 2]>,
    /// Stream the packets are cut on.
    #[arg(long)]
    reference: Option<StreamName>,
    /// Packet length in milliseconds of reference stream time.
    #[arg(long, conflicts_with = "count")]
    interval_ms: Option<u64>,
    /// Packet length in reference stream elements.
    #[arg(long)]
    count: Option<usize>,
    #[arg(long)]
    fps: Option<u32>,
    /// Event rendering: accumulate, polar or monopolar.
    #[arg(long)]
    events: Option<EventMode>,
    /// Label packets with their wall-clock start time.
    #[arg(long)]
    time_labels: bool,
    /// Render one pass to this file (.gif, .html) or PNG directory and exit.
    #[arg(long)]
    export: Option<PathBuf>,
    /// Integer upscaling of raster output.
    #[arg(long)]
    scale: Option<u32>,
}

impl PlayerOptions {
    fn config(&self) -> dvplayer_core::Result<PlayerConfig> {
        let mut config = match &self.config {
            Some(path) => PlayerConfig::from_json_file(path)?,
            None => PlayerConfig::default(),
        };
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(resolution) = self.resolution {
            config.resolution = resolution.as_slice().try_into()?;
        }
        if let Some(reference) = self.reference {
            config.slicing.reference = reference;
        }
        if let Some(interval_ms) = self.interval_ms {
            config.slicing.policy = SlicePolicy::every(Duration::from_millis(interval_ms));
        }
        if let Some(count) = self.count {
            config.slicing.policy = SlicePolicy::every_n(count);
        }
        if let Some(fps) = self.fps {
            config.playback.fps = fps;
        }
        if let Some(events) = self.events {
            config.events = events;
        }
        if self.time_labels {
            config.playback.tick_labels = TickLabels::Time;
        }
        if let Some(scale) = self.scale {
            config.output.scale = scale;
        }
        if let Some(export) = &self.export {
            if is_html(export) {
                if self.backend == Some(BackendKind::Raster) {
                    return Err(PlayerError::InvalidConfig(format!(
                        "{} is an html document, the raster backend exports gif or png",
                        export.display()
                    )));
                }
                config.backend = BackendKind::Html;
            }
            config.output.format = export_format(export);
            config.output.path = Some(export.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

/// GIF for `.gif` targets, a PNG sequence directory for anything else.
fn export_format(path: &Path) -> OutputFormat {
    if has_extension(path, "gif") {
        OutputFormat::Gif
    } else {
        OutputFormat::Png
    }
}

fn is_html(path: &Path) -> bool {
    has_extension(path, "html") || has_extension(path, "htm")
}

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted))
}

fn parse_resolution(value: &str) -> Result<[u32; 2], String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got `{value}`"))?;
    let parse = |part: &str| {
        part.trim()
            .parse::<u32>()
            .map_err(|err| format!("invalid dimension `{part}`: {err}"))
    };
    Ok([parse(width)?, parse(height)?])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(args: &[&str]) -> PlayerOptions {
        let mut argv = vec!["dvplayer", "demo"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Demo { options, .. } => options,
            Commands::View { .. } => unreachable!(),
        }
    }

    #[test]
    fn flags_override_defaults() {
        let config = options(&[
            "--mode",
            "2d",
            "--backend",
            "html",
            "--resolution",
            "64x48",
            "--count",
            "3",
            "--events",
            "polar",
            "--time-labels",
        ])
        .config()
        .unwrap();

        assert_eq!(config.mode, ViewMode::Planar);
        assert_eq!(config.backend, BackendKind::Html);
        assert_eq!(config.resolution.width, 64);
        assert_eq!(config.resolution.height, 48);
        assert_eq!(config.slicing.policy, SlicePolicy::every_n(3));
        assert_eq!(config.events, EventMode::Polar);
        assert_eq!(config.playback.tick_labels, TickLabels::Time);
    }

    #[test]
    fn rejects_unknown_names_and_conflicting_policies() {
        let argv = ["dvplayer", "demo", "--mode", "4d"];
        assert!(Cli::try_parse_from(argv).is_err());
        let argv = ["dvplayer", "demo", "--count", "2", "--interval-ms", "5"];
        assert!(Cli::try_parse_from(argv).is_err());
        assert!(options(&["--fps", "0"]).config().is_err());
    }

    #[test]
    fn export_target_picks_format() {
        assert_eq!(export_format(Path::new("out/run.GIF")), OutputFormat::Gif);
        assert_eq!(export_format(Path::new("out/frames")), OutputFormat::Png);
        assert_eq!(parse_resolution("346x260"), Ok([346, 260]));
        assert!(parse_resolution("346").is_err());
    }

    #[test]
    fn html_export_selects_html_backend() {
        let config = options(&["--export", "out/run.html"]).config().unwrap();
        assert_eq!(config.backend, BackendKind::Html);
        assert_eq!(config.output.path, Some(PathBuf::from("out/run.html")));

        let err = options(&["--backend", "raster", "--export", "out/run.HTML"])
            .config()
            .unwrap_err();
        assert!(err.is_configuration());

        let config = options(&["--export", "out/run.gif"]).config().unwrap();
        assert_eq!(config.backend, BackendKind::Raster);
        assert_eq!(config.output.format, OutputFormat::Gif);
    }
}
