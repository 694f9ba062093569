use std::{fmt, fs::File, io::BufReader, path::Path, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    data::StreamName, preset::EventMode, slicing::SlicePolicy, PlayerError, Result,
};

/// Top-level configuration structure for the player.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub resolution: Resolution,
    pub mode: ViewMode,
    pub backend: BackendKind,
    pub slicing: SlicingConfig,
    pub playback: PlaybackConfig,
    pub events: EventMode,
    pub output: OutputConfig,
}

impl PlayerConfig {
    pub fn new(resolution: Resolution, mode: ViewMode, backend: BackendKind) -> Self {
        Self {
            resolution,
            mode,
            backend,
            ..Self::default()
        }
    }

    /// Loads and validates a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.resolution.validate()?;
        self.slicing.policy.validate()?;
        if self.playback.fps == 0 {
            return Err(PlayerError::InvalidConfig(
                "playback rate must be at least 1 fps".into(),
            ));
        }
        if self.output.scale == 0 {
            return Err(PlayerError::InvalidConfig(
                "output scale must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Sensor resolution, serialized as `[width, height]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let resolution = Self { width, height };
        resolution.validate()?;
        Ok(resolution)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PlayerError::ZeroResolution);
        }
        Ok(())
    }

    pub fn pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 346,
            height: 260,
        }
    }
}

impl TryFrom<&[u32]> for Resolution {
    type Error = PlayerError;

    fn try_from(value: &[u32]) -> Result<Self> {
        match value {
            [width, height] => Resolution::new(*width, *height),
            other => Err(PlayerError::InvalidResolution { len: other.len() }),
        }
    }
}

impl TryFrom<Vec<u32>> for Resolution {
    type Error = PlayerError;

    fn try_from(value: Vec<u32>) -> Result<Self> {
        Resolution::try_from(value.as_slice())
    }
}

impl From<Resolution> for Vec<u32> {
    fn from(value: Resolution) -> Self {
        vec![value.width, value.height]
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Which cells the player lays out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ViewMode {
    #[serde(rename = "2d")]
    Planar,
    #[serde(rename = "3d")]
    Spatial,
    #[default]
    #[serde(rename = "hybrid")]
    Hybrid,
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ViewMode::Planar => "2d",
            ViewMode::Spatial => "3d",
            ViewMode::Hybrid => "hybrid",
        })
    }
}

impl FromStr for ViewMode {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "2d" => Ok(ViewMode::Planar),
            "3d" => Ok(ViewMode::Spatial),
            "hybrid" => Ok(ViewMode::Hybrid),
            other => Err(PlayerError::UnknownViewMode(other.to_string())),
        }
    }
}

/// Rendering engine used to present the figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Software raster frames with interactive preview or GIF/PNG export.
    #[default]
    Raster,
    /// Self-contained plotly.js animation document.
    Html,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::Raster => "raster",
            BackendKind::Html => "html",
        })
    }
}

impl FromStr for BackendKind {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "raster" => Ok(BackendKind::Raster),
            "html" => Ok(BackendKind::Html),
            other => Err(PlayerError::UnknownBackend(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlicingConfig {
    pub reference: StreamName,
    pub policy: SlicePolicy,
}

/// Label shown for each packet during playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickLabels {
    /// The packet index.
    #[default]
    Index,
    /// Wall-clock start time of the packet's reference stream.
    Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub fps: u32,
    /// Start playing forward as soon as an interactive session opens.
    pub autoplay: bool,
    pub tick_labels: TickLabels,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            fps: 25,
            autoplay: true,
            tick_labels: TickLabels::Index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Gif,
    Png,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Export target; interactive sessions use it as the preview image.
    pub path: Option<PathBuf>,
    /// Integer upscaling of sensor pixels in raster output.
    pub scale: u32,
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: None,
            scale: 1,
            format: OutputFormat::Gif,
        }
    }
}
