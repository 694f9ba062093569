//! Destinations for rendered raster frames.

use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use image::{
    codecs::gif::{GifEncoder, Repeat},
    Delay, Frame, ImageFormat, RgbaImage,
};

use crate::{config::OutputFormat, PlayerError, Result};

/// Configuration options for the recording subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSettings {
    pub output_path: PathBuf,
    pub fps: u32,
    pub format: OutputFormat,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("dvplayer.gif"),
            fps: 25,
            format: OutputFormat::Gif,
        }
    }
}

/// Receives every presented frame in order.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &RgbaImage) -> Result<()>;

    /// Flushes pending output and returns the path it was written to.
    fn finish(&mut self) -> Result<Option<PathBuf>>;
}

/// Animated GIF, looping forever at the configured rate.
pub struct GifRecorder {
    path: PathBuf,
    delay: Delay,
    file: GifFile,
    encoder: Option<GifEncoder<GifFile>>,
}

/// File handle shared with the encoder so the trailer written on drop can
/// still be flushed and checked.
#[derive(Clone)]
struct GifFile {
    inner: Arc<Mutex<GifFileState>>,
}

struct GifFileState {
    writer: BufWriter<File>,
    failed: Option<io::ErrorKind>,
}

impl GifFile {
    fn new(file: File) -> Self {
        Self {
            inner: Arc::new(Mutex::new(GifFileState {
                writer: BufWriter::new(file),
                failed: None,
            })),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut GifFileState) -> io::Result<R>) -> io::Result<R> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("gif file lock poisoned"))?;
        let result = f(&mut state);
        if let Err(err) = &result {
            state.failed.get_or_insert(err.kind());
        }
        result
    }

    /// Flushes buffered bytes, failing if any earlier write failed.
    fn close(&self) -> io::Result<()> {
        self.with_state(|state| {
            if let Some(kind) = state.failed {
                return Err(io::Error::new(kind, "gif write failed"));
            }
            state.writer.flush()
        })
    }
}

impl Write for GifFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with_state(|state| state.writer.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with_state(|state| state.writer.flush())
    }
}

impl GifRecorder {
    pub fn create(path: impl Into<PathBuf>, fps: u32) -> Result<Self> {
        let path = path.into();
        create_parent(&path)?;
        let file = GifFile::new(File::create(&path)?);
        let mut encoder = GifEncoder::new(file.clone());
        encoder.set_repeat(Repeat::Infinite)?;
        Ok(Self {
            path,
            delay: Delay::from_numer_denom_ms(1000, fps.max(1)),
            file,
            encoder: Some(encoder),
        })
    }
}

impl FrameSink for GifRecorder {
    fn write_frame(&mut self, frame: &RgbaImage) -> Result<()> {
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| PlayerError::msg("gif recording already finished"))?;
        encoder.encode_frame(Frame::from_parts(frame.clone(), 0, 0, self.delay))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<PathBuf>> {
        // Dropping the encoder writes the trailer.
        drop(self.encoder.take());
        self.file.close()?;
        Ok(Some(self.path.clone()))
    }
}

/// Numbered PNG files in one directory.
pub struct PngSequenceRecorder {
    directory: PathBuf,
    written: usize,
}

impl PngSequenceRecorder {
    pub fn create(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            written: 0,
        })
    }

    pub fn frame_path(&self, index: usize) -> PathBuf {
        self.directory.join(format!("frame_{index:05}.png"))
    }
}

impl FrameSink for PngSequenceRecorder {
    fn write_frame(&mut self, frame: &RgbaImage) -> Result<()> {
        frame.save_with_format(self.frame_path(self.written), ImageFormat::Png)?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<PathBuf>> {
        Ok(Some(self.directory.clone()))
    }
}

/// Single PNG rewritten on every frame, for viewers that reload on change.
pub struct PreviewRecorder {
    path: PathBuf,
    staging: PathBuf,
}

impl PreviewRecorder {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        create_parent(&path)?;
        let staging = path.with_extension("partial.png");
        Ok(Self { path, staging })
    }
}

impl FrameSink for PreviewRecorder {
    fn write_frame(&mut self, frame: &RgbaImage) -> Result<()> {
        // Write then rename so readers never see a half-written file.
        frame.save_with_format(&self.staging, ImageFormat::Png)?;
        fs::rename(&self.staging, &self.path)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<PathBuf>> {
        Ok(Some(self.path.clone()))
    }
}

/// Keeps frames in memory; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecorder {
    frames: Arc<Mutex<Vec<RgbaImage>>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<RgbaImage> {
        match self.frames.lock() {
            Ok(frames) => frames.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.lock().map(|frames| frames.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FrameSink for MemoryRecorder {
    fn write_frame(&mut self, frame: &RgbaImage) -> Result<()> {
        self.frames
            .lock()
            .map_err(|_| PlayerError::msg("frame buffer lock poisoned"))?
            .push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<PathBuf>> {
        Ok(None)
    }
}

/// Feeds frames into the sink chosen by [`RecordingSettings`], skipping
/// frames outside a recording window.
pub struct Recorder {
    sink: Box<dyn FrameSink>,
    is_recording: bool,
    frames: usize,
}

impl Recorder {
    /// Export recorder writing in the configured format.
    pub fn new(settings: &RecordingSettings) -> Result<Self> {
        let sink: Box<dyn FrameSink> = match settings.format {
            OutputFormat::Gif => Box::new(GifRecorder::create(&settings.output_path, settings.fps)?),
            OutputFormat::Png => Box::new(PngSequenceRecorder::create(&settings.output_path)?),
        };
        Ok(Self::with_sink(sink))
    }

    /// Preview recorder rewriting a single PNG.
    pub fn preview(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::with_sink(Box::new(PreviewRecorder::create(path)?)))
    }

    pub fn with_sink(sink: Box<dyn FrameSink>) -> Self {
        Self {
            sink,
            is_recording: false,
            frames: 0,
        }
    }

    pub fn start(&mut self) -> Result<()> {
        self.is_recording = true;
        Ok(())
    }

    pub fn record(&mut self, frame: &RgbaImage) -> Result<()> {
        if !self.is_recording {
            return Ok(());
        }
        self.sink.write_frame(frame)?;
        self.frames += 1;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<Option<PathBuf>> {
        self.is_recording = false;
        let output = self.sink.finish()?;
        tracing::info!(frames = self.frames, ?output, "recording stopped");
        Ok(output)
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    pub fn frames(&self) -> usize {
        self.frames
    }
}

fn create_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(fs::create_dir_all(parent)?),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(value: u8) -> RgbaImage {
        RgbaImage::from_pixel(4, 3, Rgba([value, value, value, 255]))
    }

    #[test]
    fn recorder_skips_frames_until_started() {
        let memory = MemoryRecorder::new();
        let mut recorder = Recorder::with_sink(Box::new(memory.clone()));

        recorder.record(&solid(1)).unwrap();
        recorder.start().unwrap();
        assert!(recorder.is_recording());
        recorder.record(&solid(2)).unwrap();
        recorder.record(&solid(3)).unwrap();
        assert_eq!(recorder.stop().unwrap(), None);

        assert_eq!(recorder.frames(), 2);
        let frames = memory.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].get_pixel(0, 0), &Rgba([3, 3, 3, 255]));
    }

    #[test]
    fn writes_animated_gif() {
        let dir = tempfile::tempdir().unwrap();
        let settings = RecordingSettings {
            output_path: dir.path().join("out/anim.gif"),
            fps: 10,
            format: OutputFormat::Gif,
        };
        let mut recorder = Recorder::new(&settings).unwrap();
        recorder.start().unwrap();
        recorder.record(&solid(0)).unwrap();
        recorder.record(&solid(255)).unwrap();
        let path = recorder.stop().unwrap().unwrap();

        let bytes = fs::read(path).unwrap();
        assert!(bytes.starts_with(b"GIF89a"));
        assert_eq!(bytes.last(), Some(&0x3b));
    }

    #[test]
    fn gif_write_failure_surfaces_on_finish() {
        let device = Path::new("/dev/full");
        if !device.exists() {
            return;
        }
        let mut recorder = GifRecorder {
            path: device.to_path_buf(),
            delay: Delay::from_numer_denom_ms(100, 1),
            file: GifFile::new(fs::OpenOptions::new().write(true).open(device).unwrap()),
            encoder: None,
        };
        recorder.encoder = Some(GifEncoder::new(recorder.file.clone()));

        let result = recorder
            .write_frame(&solid(9))
            .and_then(|_| recorder.finish());
        assert!(result.is_err());
    }

    #[test]
    fn writes_numbered_pngs() {
        let dir = tempfile::tempdir().unwrap();
        let settings = RecordingSettings {
            output_path: dir.path().join("frames"),
            fps: 10,
            format: OutputFormat::Png,
        };
        let mut recorder = Recorder::new(&settings).unwrap();
        recorder.start().unwrap();
        recorder.record(&solid(0)).unwrap();
        recorder.record(&solid(9)).unwrap();
        recorder.stop().unwrap();

        let second = image::open(dir.path().join("frames/frame_00001.png"))
            .unwrap()
            .to_rgba8();
        assert_eq!(second.get_pixel(3, 2), &Rgba([9, 9, 9, 255]));
    }

    #[test]
    fn preview_keeps_latest_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.png");
        let mut recorder = Recorder::preview(&path).unwrap();
        recorder.start().unwrap();
        recorder.record(&solid(10)).unwrap();
        recorder.record(&solid(20)).unwrap();
        recorder.stop().unwrap();

        let latest = image::open(&path).unwrap().to_rgba8();
        assert_eq!(latest.get_pixel(0, 0), &Rgba([20, 20, 20, 255]));
        assert!(!path.with_extension("partial.png").exists());
    }
}
