//! Synthetic recording of a bar rotating about the sensor centre.

use std::{f32::consts::TAU, time::Duration};

use dvplayer_core::{
    Event, Frame, Image, Imu, MonoCameraData, Resolution, Result, Trigger, TriggerKind,
};

const STEP_US: i64 = 1_000;
const FRAME_PERIOD_US: i64 = 20_000;
const EXPOSURE_US: i64 = 5_000;
const REVOLUTION_US: f32 = 500_000.0;
const BACKGROUND: u8 = 30;
const BAR: u8 = 220;

pub fn recording(resolution: Resolution, duration: Duration) -> Result<MonoCameraData> {
    let bar = Bar::new(resolution);
    let end = duration.as_micros() as i64;
    let degrees_per_second = 360.0 * 1e6 / REVOLUTION_US;

    let mut data = MonoCameraData::new();
    for t in (0..end).step_by(STEP_US as usize) {
        let angle = TAU * t as f32 / REVOLUTION_US;
        for (x, y, polarity) in bar.edges(angle) {
            data.events.push(Event::new(t, x, y, polarity))?;
        }
        data.imus.push(Imu {
            timestamp: t,
            accelerometer: [0.0, 0.0, 1.0],
            gyroscope: [0.0, 0.0, degrees_per_second],
            temperature: 25.0,
        })?;
        if t % FRAME_PERIOD_US == 0 {
            data.frames.push(Frame {
                timestamp: t,
                image: bar.frame(angle)?,
            })?;
            data.triggers.push(Trigger {
                timestamp: t,
                kind: TriggerKind::ApsFrameStart,
            })?;
        }
        if t % FRAME_PERIOD_US == EXPOSURE_US {
            data.triggers.push(Trigger {
                timestamp: t,
                kind: TriggerKind::ApsFrameEnd,
            })?;
        }
    }

    tracing::debug!(
        events = data.events.len(),
        frames = data.frames.len(),
        "demo recording generated"
    );
    Ok(data)
}

struct Bar {
    width: u32,
    height: u32,
    centre: (f32, f32),
    half_length: i32,
}

impl Bar {
    fn new(resolution: Resolution) -> Self {
        let (width, height) = (resolution.width, resolution.height);
        Self {
            width,
            height,
            centre: (width as f32 / 2.0, height as f32 / 2.0),
            half_length: (width.min(height) as f32 * 0.4) as i32,
        }
    }

    /// Pixels on either side of the bar; the leading side brightens.
    fn edges(&self, angle: f32) -> impl Iterator<Item = (u16, u16, bool)> + '_ {
        (-self.half_length..=self.half_length)
            .step_by(2)
            .flat_map(move |along| {
                [(1.0, true), (-1.0, false)]
                    .into_iter()
                    .filter_map(move |(across, polarity)| {
                        self.pixel(angle, along as f32, across)
                            .map(|(x, y)| (x as u16, y as u16, polarity))
                    })
            })
    }

    fn frame(&self, angle: f32) -> Result<Image> {
        let mut pixels = vec![BACKGROUND; self.width as usize * self.height as usize];
        for along in -self.half_length..=self.half_length {
            for across in [-1.0, 0.0, 1.0] {
                if let Some((x, y)) = self.pixel(angle, along as f32, across) {
                    pixels[(y * self.width + x) as usize] = BAR;
                }
            }
        }
        Image::gray(self.width, self.height, pixels)
    }

    fn pixel(&self, angle: f32, along: f32, across: f32) -> Option<(u32, u32)> {
        let (sin, cos) = angle.sin_cos();
        let x = (self.centre.0 + along * cos - across * sin).round();
        let y = (self.centre.1 + along * sin + across * cos).round();
        if x < 0.0 || y < 0.0 || x >= self.width as f32 || y >= self.height as f32 {
            return None;
        }
        Some((x as u32, y as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_every_stream_in_order() {
        let resolution = Resolution::new(64, 48).unwrap();
        let data = recording(resolution, Duration::from_millis(100)).unwrap();

        assert_eq!(data.imus.len(), 100);
        assert_eq!(data.frames.len(), 5);
        assert_eq!(data.triggers.len(), 10);
        assert!(data.events.len() > 100);
        assert!(data
            .events
            .iter()
            .all(|e| u32::from(e.x) < 64 && u32::from(e.y) < 48));
        assert!(data.events.iter().any(|e| e.polarity));
        assert!(data.events.iter().any(|e| !e.polarity));

        let frame = &data.frames.front().unwrap().image;
        assert_eq!((frame.width, frame.height), (64, 48));
        assert!(frame.pixels.contains(&BAR));
    }

    #[test]
    fn empty_duration_yields_empty_recording() {
        let resolution = Resolution::new(16, 16).unwrap();
        let data = recording(resolution, Duration::ZERO).unwrap();
        assert!(data.is_empty());
    }
}
