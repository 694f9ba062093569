//! Numeric helpers shared by the presets.

use chrono::{DateTime, Utc};

use crate::{config::Resolution, data::EventStream, layer::AxisTick};

use super::EventMode;

/// Number of labelled ticks on a 3D time axis.
pub const TIME_TICKS: usize = 5;

/// Bins events into a row-major `height x width` histogram in sensor
/// orientation (`index = y * width + x`).
///
/// Events outside the resolution are dropped.
pub fn event_histogram(events: &EventStream, resolution: Resolution, mode: EventMode) -> Vec<f32> {
    let width = resolution.width as usize;
    let cells = resolution.pixels();
    let mut counts = vec![0.0f32; cells];
    let mut last_sign = match mode {
        EventMode::Accumulate => vec![0.0f32; cells],
        _ => Vec::new(),
    };
    let mut dropped = 0usize;

    for event in events {
        if event.x as u32 >= resolution.width || event.y as u32 >= resolution.height {
            dropped += 1;
            continue;
        }
        let index = event.y as usize * width + event.x as usize;
        let sign = if event.polarity { 1.0 } else { -1.0 };
        match mode {
            EventMode::Polar => counts[index] += sign,
            EventMode::Monopolar => counts[index] += 1.0,
            EventMode::Accumulate => {
                counts[index] += 1.0;
                last_sign[index] = sign;
            }
        }
    }

    if dropped > 0 {
        tracing::warn!(dropped, %resolution, "events outside the sensor resolution were dropped");
    }

    if mode == EventMode::Accumulate {
        for (count, sign) in counts.iter_mut().zip(&last_sign) {
            *count *= sign;
        }
    }
    counts
}

/// Reverses the row order of a row-major buffer.
pub fn flip_rows<T: Copy>(values: &[T], width: usize, height: usize) -> Vec<T> {
    let mut flipped = Vec::with_capacity(values.len());
    for row in (0..height).rev() {
        flipped.extend_from_slice(&values[row * width..(row + 1) * width]);
    }
    flipped
}

fn utc(timestamp: i64) -> Option<DateTime<Utc>> {
    let seconds = timestamp.div_euclid(1_000_000);
    let nanos = (timestamp.rem_euclid(1_000_000) * 1_000) as u32;
    DateTime::<Utc>::from_timestamp(seconds, nanos)
}

/// Formats a microsecond timestamp as `HH:MM:SS.ffffff` (UTC).
pub fn format_wall_clock(timestamp: i64) -> String {
    match utc(timestamp) {
        Some(time) => time.format("%H:%M:%S%.6f").to_string(),
        None => timestamp.to_string(),
    }
}

/// Short `HH:MM:SS.fff` label used on axes.
pub fn format_axis_time(timestamp: i64) -> String {
    match utc(timestamp) {
        Some(time) => time.format("%H:%M:%S%.3f").to_string(),
        None => timestamp.to_string(),
    }
}

/// `count` evenly spaced, labelled ticks over `[min, max]`.
pub fn time_ticks(min: i64, max: i64, count: usize) -> Vec<AxisTick> {
    let span = (max - min) as f64;
    (0..count)
        .map(|i| {
            let fraction = if count > 1 {
                i as f64 / (count - 1) as f64
            } else {
                0.0
            };
            let value = min + (span * fraction).round() as i64;
            AxisTick {
                value,
                label: format_axis_time(value),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::data::{Event, Stream};

    fn stream(events: Vec<Event>) -> EventStream {
        Stream::from_sorted(events).unwrap()
    }

    fn resolution(width: u32, height: u32) -> Resolution {
        Resolution::new(width, height).unwrap()
    }

    #[test]
    fn accumulate_uses_count_and_last_polarity() {
        let events = stream(vec![Event::new(0, 1, 1, true), Event::new(1, 1, 1, false)]);
        let histogram = event_histogram(&events, resolution(4, 4), EventMode::Accumulate);

        assert_eq!(histogram[4 + 1], -2.0);
        let others: f32 = histogram
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != 5)
            .map(|(_, v)| v.abs())
            .sum();
        assert_eq!(others, 0.0);
    }

    #[test]
    fn polar_sums_signed_events() {
        let events = stream(vec![
            Event::new(0, 0, 0, true),
            Event::new(1, 0, 0, true),
            Event::new(2, 0, 0, false),
            Event::new(3, 2, 1, false),
        ]);
        let histogram = event_histogram(&events, resolution(3, 2), EventMode::Polar);
        assert_eq!(histogram, vec![1.0, 0.0, 0.0, 0.0, 0.0, -1.0]);
    }

    #[test]
    fn drops_out_of_range_events() {
        let events = stream(vec![Event::new(0, 9, 0, true), Event::new(1, 0, 9, true)]);
        let histogram = event_histogram(&events, resolution(2, 2), EventMode::Monopolar);
        assert!(histogram.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn flips_rows() {
        let values = [1, 2, 3, 4, 5, 6];
        assert_eq!(flip_rows(&values, 2, 3), vec![5, 6, 3, 4, 1, 2]);
    }

    #[test]
    fn spaces_time_ticks_evenly() {
        let ticks = time_ticks(1_000_000, 1_000_400, TIME_TICKS);
        let values: Vec<i64> = ticks.iter().map(|t| t.value).collect();
        assert_eq!(
            values,
            vec![1_000_000, 1_000_100, 1_000_200, 1_000_300, 1_000_400]
        );
        assert_eq!(ticks[0].label, "00:00:01.000");
    }

    #[test]
    fn formats_wall_clock() {
        assert_eq!(format_wall_clock(3_723_000_123), "01:02:03.000123");
    }

    fn arb_events() -> impl Strategy<Value = Vec<Event>> {
        prop::collection::vec((0u16..6, 0u16..4, any::<bool>()), 0..96).prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, (x, y, polarity))| Event::new(i as i64, x, y, polarity))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn accumulate_magnitude_matches_event_count(events in arb_events()) {
            let count = events.len();
            let histogram = event_histogram(&stream(events), resolution(6, 4), EventMode::Accumulate);
            let total: f32 = histogram.iter().map(|v| v.abs()).sum();
            prop_assert_eq!(total as usize, count);
        }

        #[test]
        fn polar_cells_match_signed_counts(events in arb_events()) {
            let res = resolution(6, 4);
            let mut expected = vec![0i32; res.pixels()];
            for event in &events {
                expected[event.y as usize * 6 + event.x as usize] += if event.polarity { 1 } else { -1 };
            }
            let histogram = event_histogram(&stream(events), res, EventMode::Polar);
            let actual: Vec<i32> = histogram.iter().map(|v| *v as i32).collect();
            prop_assert_eq!(actual, expected);
        }

        #[test]
        fn monopolar_is_non_negative(events in arb_events()) {
            let histogram = event_histogram(&stream(events), resolution(6, 4), EventMode::Monopolar);
            prop_assert!(histogram.iter().all(|v| *v >= 0.0));
        }
    }
}
