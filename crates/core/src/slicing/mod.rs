//! Slicing of a recording into an ordered packet sequence.
//!
//! The player only depends on the [`Dispatcher`] trait. [`MonoCameraSlicer`]
//! is the bundled implementation: each registered job buffers incoming data
//! and emits a packet whenever its reference stream has covered a fixed time
//! interval or accumulated a fixed number of elements.

use std::{collections::BTreeMap, fmt, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    data::{MonoCameraData, Packet, StreamName, TimeWindow},
    PlayerError, Result,
};

/// How a reference stream is cut into packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlicePolicy {
    /// One packet per `interval_ms` of reference stream time.
    Time { interval_ms: u64 },
    /// One packet per `count` reference stream elements.
    Number { count: usize },
}

/// Longest time interval whose microsecond length still fits an `i64`.
pub const MAX_INTERVAL_MS: u64 = i64::MAX as u64 / 1_000;

impl SlicePolicy {
    pub fn every(interval: Duration) -> Self {
        SlicePolicy::Time {
            interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn every_n(count: usize) -> Self {
        SlicePolicy::Number { count }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            SlicePolicy::Time { interval_ms: 0 } => Err(PlayerError::InvalidConfig(
                "slicing time interval must be positive".into(),
            )),
            SlicePolicy::Time { interval_ms } if *interval_ms > MAX_INTERVAL_MS => {
                Err(PlayerError::InvalidConfig(format!(
                    "slicing time interval of {interval_ms} ms exceeds {MAX_INTERVAL_MS} ms"
                )))
            }
            SlicePolicy::Number { count: 0 } => Err(PlayerError::InvalidConfig(
                "slicing element count must be positive".into(),
            )),
            _ => Ok(()),
        }
    }
}

impl Default for SlicePolicy {
    fn default() -> Self {
        SlicePolicy::Time { interval_ms: 33 }
    }
}

impl fmt::Display for SlicePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlicePolicy::Time { interval_ms } => write!(f, "every {interval_ms} ms"),
            SlicePolicy::Number { count } => write!(f, "every {count} elements"),
        }
    }
}

pub type JobId = u32;

/// Receives every emitted packet together with its reference time window.
pub type SliceCallback = Box<dyn FnMut(TimeWindow, Packet)>;

/// Turns a recording into an ordered, gap-free packet sequence.
pub trait Dispatcher {
    /// Registers a slicing job and returns its identifier.
    fn register(
        &mut self,
        reference: StreamName,
        policy: SlicePolicy,
        callback: SliceCallback,
    ) -> Result<JobId>;

    /// Feeds data to every job; callbacks run synchronously in time order.
    fn accept(&mut self, data: &MonoCameraData) -> Result<()>;

    /// Emits whatever every job still buffers as a final packet.
    fn flush(&mut self) -> Result<()>;
}

struct SliceJob {
    reference: StreamName,
    policy: SlicePolicy,
    callback: SliceCallback,
    buffer: MonoCameraData,
    last_call_time: Option<i64>,
}

impl SliceJob {
    fn new(reference: StreamName, policy: SlicePolicy, callback: SliceCallback) -> Self {
        Self {
            reference,
            policy,
            callback,
            buffer: MonoCameraData::default(),
            last_call_time: None,
        }
    }

    fn run(&mut self, data: &MonoCameraData) -> Result<()> {
        if data.size(self.reference) == 0 {
            return Ok(());
        }

        self.buffer.add(data)?;
        let mut last_time = match self.last_call_time {
            Some(time) => time,
            None => self.buffer.time_window(self.reference).start,
        };
        let mut last_number = 0;

        match self.policy {
            SlicePolicy::Number { count } => {
                while self.buffer.size(self.reference) - last_number >= count {
                    let slice = self
                        .buffer
                        .slice_by_number(self.reference, last_number, count)?;
                    let window = slice.time_window(self.reference);
                    last_time = window.end;
                    last_number += count;
                    (self.callback)(window, slice);
                }
            }
            SlicePolicy::Time { interval_ms } => {
                let interval = i64::try_from(interval_ms)
                    .ok()
                    .and_then(|ms| ms.checked_mul(1_000))
                    .ok_or_else(|| {
                        PlayerError::InvalidConfig(format!(
                            "slicing time interval of {interval_ms} ms is too long"
                        ))
                    })?;
                let highest = self.buffer.time_window(self.reference).end - 1;
                while highest - last_time >= interval {
                    let slice = self.buffer.slice_by_time(last_time, last_time + interval);
                    let window = TimeWindow::new(last_time, last_time + interval);
                    last_time += interval;
                    last_number += slice.size(self.reference);
                    (self.callback)(window, slice);
                }
            }
        }

        self.retain_after(last_number, last_time);
        self.last_call_time = Some(last_time);
        Ok(())
    }

    /// Drops everything already emitted from the buffer.
    fn retain_after(&mut self, consumed: usize, last_time: i64) {
        let remaining = self.buffer.size(self.reference) - consumed;
        let mut rest = self.buffer.slice_by_time(last_time, i64::MAX);
        match self.reference {
            StreamName::Events => rest.events = self.buffer.events.slice(consumed, remaining),
            StreamName::Frames => rest.frames = self.buffer.frames.slice(consumed, remaining),
            StreamName::Imus => rest.imus = self.buffer.imus.slice(consumed, remaining),
            StreamName::Triggers => {
                rest.triggers = self.buffer.triggers.slice(consumed, remaining)
            }
        }
        self.buffer = rest;
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let buffer = std::mem::take(&mut self.buffer);
        let reference = buffer.time_window(self.reference);
        let start = self.last_call_time.unwrap_or(reference.start);
        let window = TimeWindow::new(start, reference.end.max(start));
        self.last_call_time = Some(window.end);
        (self.callback)(window, buffer);
    }
}

/// Slicer for [`MonoCameraData`] recordings.
#[derive(Default)]
pub struct MonoCameraSlicer {
    next_id: JobId,
    jobs: BTreeMap<JobId, SliceJob>,
}

impl MonoCameraSlicer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn do_every_time_interval(
        &mut self,
        reference: StreamName,
        interval: Duration,
        callback: impl FnMut(TimeWindow, Packet) + 'static,
    ) -> Result<JobId> {
        self.register(reference, SlicePolicy::every(interval), Box::new(callback))
    }

    pub fn do_every_number_of_elements(
        &mut self,
        reference: StreamName,
        count: usize,
        callback: impl FnMut(TimeWindow, Packet) + 'static,
    ) -> Result<JobId> {
        self.register(reference, SlicePolicy::every_n(count), Box::new(callback))
    }

    pub fn has_job(&self, id: JobId) -> bool {
        self.jobs.contains_key(&id)
    }

    pub fn remove_job(&mut self, id: JobId) {
        self.jobs.remove(&id);
    }

    pub fn modify_time_interval(&mut self, id: JobId, interval: Duration) -> Result<()> {
        let Some(job) = self.jobs.get_mut(&id) else {
            return Ok(());
        };
        let SlicePolicy::Time { .. } = job.policy else {
            return Err(PlayerError::InvalidConfig(
                "setting a time interval on a number based slicing job".into(),
            ));
        };
        let policy = SlicePolicy::every(interval);
        policy.validate()?;
        job.policy = policy;
        Ok(())
    }

    pub fn modify_number_interval(&mut self, id: JobId, count: usize) -> Result<()> {
        let Some(job) = self.jobs.get_mut(&id) else {
            return Ok(());
        };
        let SlicePolicy::Number { .. } = job.policy else {
            return Err(PlayerError::InvalidConfig(
                "setting a number interval on a time based slicing job".into(),
            ));
        };
        let policy = SlicePolicy::every_n(count);
        policy.validate()?;
        job.policy = policy;
        Ok(())
    }
}

impl Dispatcher for MonoCameraSlicer {
    fn register(
        &mut self,
        reference: StreamName,
        policy: SlicePolicy,
        callback: SliceCallback,
    ) -> Result<JobId> {
        policy.validate()?;
        self.next_id += 1;
        self.jobs
            .insert(self.next_id, SliceJob::new(reference, policy, callback));
        tracing::debug!(job = self.next_id, %reference, %policy, "registered slicing job");
        Ok(self.next_id)
    }

    fn accept(&mut self, data: &MonoCameraData) -> Result<()> {
        for job in self.jobs.values_mut() {
            job.run(data)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        for job in self.jobs.values_mut() {
            job.flush();
        }
        Ok(())
    }
}

impl fmt::Debug for MonoCameraSlicer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonoCameraSlicer")
            .field("jobs", &self.jobs.len())
            .finish()
    }
}

/// Slices `data` once with a single job and returns the packets in order.
pub fn slice_recording(
    dispatcher: &mut dyn Dispatcher,
    data: &MonoCameraData,
    reference: StreamName,
    policy: SlicePolicy,
) -> Result<Vec<Packet>> {
    let (tx, rx) = crossbeam::channel::unbounded();
    dispatcher.register(
        reference,
        policy,
        Box::new(move |_window, packet| {
            // The receiver outlives the dispatcher call below.
            let _ = tx.send(packet);
        }),
    )?;
    dispatcher.accept(data)?;
    dispatcher.flush()?;
    Ok(rx.try_iter().collect())
}
