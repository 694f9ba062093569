//! Playback state machine.
//!
//! [`PlaybackController`] owns the frame index. Control messages arrive on a
//! channel and ticks come from the controller's own deadline, so all state
//! changes happen on the thread that calls [`PlaybackController::run`].

use std::{
    fmt,
    ops::ControlFlow,
    time::{Duration, Instant},
};

use crossbeam::channel::{Receiver, RecvTimeoutError};

use crate::Result;

/// Message consumed by the playback loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Forward,
    Backward,
    TogglePause,
    StepForward,
    StepBack,
    ScrubTo(usize),
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    PlayingForward,
    PlayingBackward,
    Paused,
    SteppingForward,
    SteppingBack,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlaybackState::PlayingForward => "playing",
            PlaybackState::PlayingBackward => "playing backward",
            PlaybackState::Paused => "paused",
            PlaybackState::SteppingForward => "step",
            PlaybackState::SteppingBack => "step back",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

/// Widgets mirroring the playback position.
pub trait PlaybackView {
    fn set_position(&mut self, index: usize, len: usize);

    fn set_label(&mut self, label: &str);

    fn set_state(&mut self, _state: PlaybackState) {}

    /// Releases UI resources once the session ends.
    fn close(&mut self) {}
}

/// View that ignores every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullView;

impl PlaybackView for NullView {
    fn set_position(&mut self, _index: usize, _len: usize) {}

    fn set_label(&mut self, _label: &str) {}
}

pub enum SessionMode {
    /// Driven by control messages until `Close` or the sender disconnects.
    Interactive(Receiver<Control>),
    /// One forward pass over every frame.
    Export,
}

/// A playback session: where controls come from and where position updates go.
pub struct Session {
    pub mode: SessionMode,
    pub view: Box<dyn PlaybackView>,
}

impl Session {
    pub fn export() -> Self {
        Self {
            mode: SessionMode::Export,
            view: Box::new(NullView),
        }
    }

    pub fn interactive(controls: Receiver<Control>, view: Box<dyn PlaybackView>) -> Self {
        Self {
            mode: SessionMode::Interactive(controls),
            view,
        }
    }

    pub fn with_view(mut self, view: Box<dyn PlaybackView>) -> Self {
        self.view = view;
        self
    }

    pub fn is_export(&self) -> bool {
        matches!(self.mode, SessionMode::Export)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            SessionMode::Interactive(_) => "interactive",
            SessionMode::Export => "export",
        };
        f.debug_struct("Session").field("mode", &mode).finish()
    }
}

#[derive(Debug, Clone)]
pub struct PlaybackController {
    ticks: Vec<String>,
    interval: Duration,
    /// `None` before the first frame has been shown.
    position: Option<usize>,
    direction: Direction,
    state: PlaybackState,
    autoplay: bool,
    emitted: usize,
}

impl PlaybackController {
    /// One frame per tick label, advancing every `1000 / fps` milliseconds.
    pub fn new(ticks: Vec<String>, fps: u32) -> Self {
        Self {
            ticks,
            interval: Duration::from_millis(1000 / u64::from(fps.max(1))),
            position: None,
            direction: Direction::Forward,
            state: PlaybackState::Paused,
            autoplay: true,
            emitted: 0,
        }
    }

    pub fn with_autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = autoplay;
        self
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Current frame index; `0` before the first frame and for empty sequences.
    pub fn index(&self) -> usize {
        self.position.unwrap_or(0)
    }

    pub fn position(&self) -> Option<usize> {
        self.position
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Number of frames handed to the update callback so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    fn is_degenerate(&self) -> bool {
        self.ticks.len() <= 1
    }

    pub fn is_ticking(&self) -> bool {
        !self.is_degenerate()
            && matches!(
                self.state,
                PlaybackState::PlayingForward | PlaybackState::PlayingBackward
            )
    }

    fn last(&self) -> usize {
        self.ticks.len().saturating_sub(1)
    }

    fn next_index(&self, direction: Direction) -> usize {
        match (direction, self.position) {
            (_, None) => 0,
            (Direction::Forward, Some(i)) => (i + 1).min(self.last()),
            (Direction::Backward, Some(i)) => i.saturating_sub(1),
        }
    }

    fn set_state(&mut self, state: PlaybackState, view: &mut dyn PlaybackView) {
        self.state = state;
        view.set_state(state);
    }

    fn playing_state(&self) -> PlaybackState {
        match self.direction {
            Direction::Forward => PlaybackState::PlayingForward,
            Direction::Backward => PlaybackState::PlayingBackward,
        }
    }

    /// Moves to `index`, refreshes the view and runs the update callback once.
    fn emit(
        &mut self,
        index: usize,
        view: &mut dyn PlaybackView,
        update: &mut dyn FnMut(usize) -> Result<()>,
    ) -> Result<()> {
        if self.ticks.is_empty() {
            self.position = Some(0);
            return Ok(());
        }
        self.position = Some(index);
        view.set_position(index, self.ticks.len());
        view.set_label(&self.ticks[index]);
        update(index)?;
        self.emitted += 1;
        Ok(())
    }

    /// Advances one frame in the current direction when playing.
    ///
    /// Returns `false` when nothing was emitted.
    pub fn tick(
        &mut self,
        view: &mut dyn PlaybackView,
        update: &mut dyn FnMut(usize) -> Result<()>,
    ) -> Result<bool> {
        if !self.is_ticking() {
            return Ok(false);
        }
        let next = self.next_index(self.direction);
        self.emit(next, view, update)?;
        Ok(true)
    }

    /// Applies one control message.
    pub fn apply(
        &mut self,
        control: Control,
        view: &mut dyn PlaybackView,
        update: &mut dyn FnMut(usize) -> Result<()>,
    ) -> Result<ControlFlow<()>> {
        tracing::debug!(?control, position = ?self.position, "playback control");
        match control {
            Control::Forward => {
                self.direction = Direction::Forward;
                if !self.is_degenerate() {
                    self.set_state(PlaybackState::PlayingForward, view);
                }
            }
            Control::Backward => {
                self.direction = Direction::Backward;
                if !self.is_degenerate() {
                    self.set_state(PlaybackState::PlayingBackward, view);
                }
            }
            Control::TogglePause => {
                if self.is_ticking() {
                    self.set_state(PlaybackState::Paused, view);
                } else if !self.is_degenerate() {
                    let state = self.playing_state();
                    self.set_state(state, view);
                }
            }
            Control::StepForward => {
                self.direction = Direction::Forward;
                self.set_state(PlaybackState::SteppingForward, view);
                let next = self.next_index(Direction::Forward);
                self.emit(next, view, update)?;
                self.set_state(PlaybackState::Paused, view);
            }
            Control::StepBack => {
                self.direction = Direction::Backward;
                self.set_state(PlaybackState::SteppingBack, view);
                let next = self.next_index(Direction::Backward);
                self.emit(next, view, update)?;
                self.set_state(PlaybackState::Paused, view);
            }
            Control::ScrubTo(index) => {
                self.set_state(PlaybackState::Paused, view);
                let index = index.min(self.last());
                self.emit(index, view, update)?;
            }
            Control::Close => return Ok(ControlFlow::Break(())),
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Drives a whole session and returns the number of emitted frames.
    ///
    /// Blocks until the export pass completes or the interactive session is
    /// closed.
    pub fn run(
        &mut self,
        session: Session,
        mut update: impl FnMut(usize) -> Result<()>,
    ) -> Result<usize> {
        let Session { mode, mut view } = session;
        self.position = None;
        self.emitted = 0;

        let result = match mode {
            SessionMode::Export => self.run_export(view.as_mut(), &mut update),
            SessionMode::Interactive(controls) => {
                self.run_interactive(&controls, view.as_mut(), &mut update)
            }
        };
        view.close();
        result.map(|()| self.emitted)
    }

    fn run_export(
        &mut self,
        view: &mut dyn PlaybackView,
        update: &mut dyn FnMut(usize) -> Result<()>,
    ) -> Result<()> {
        if self.is_degenerate() {
            return self.show_degenerate(view, update);
        }
        self.direction = Direction::Forward;
        self.set_state(PlaybackState::PlayingForward, view);
        while self.position != Some(self.last()) {
            self.tick(view, update)?;
        }
        self.set_state(PlaybackState::Paused, view);
        Ok(())
    }

    fn run_interactive(
        &mut self,
        controls: &Receiver<Control>,
        view: &mut dyn PlaybackView,
        update: &mut dyn FnMut(usize) -> Result<()>,
    ) -> Result<()> {
        if self.is_degenerate() {
            self.show_degenerate(view, update)?;
        } else if self.autoplay {
            self.direction = Direction::Forward;
            self.set_state(PlaybackState::PlayingForward, view);
        } else {
            self.set_state(PlaybackState::Paused, view);
        }

        let mut deadline = Instant::now();
        loop {
            let message = if self.is_ticking() {
                let wait = deadline.saturating_duration_since(Instant::now());
                match controls.recv_timeout(wait) {
                    Ok(control) => Some(control),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            } else {
                match controls.recv() {
                    Ok(control) => Some(control),
                    Err(_) => break,
                }
            };

            match message {
                Some(control) => {
                    let was_ticking = self.is_ticking();
                    if self.apply(control, view, update)?.is_break() {
                        break;
                    }
                    if !was_ticking && self.is_ticking() {
                        deadline = Instant::now();
                    }
                }
                None => {
                    self.tick(view, update)?;
                    deadline += self.interval;
                }
            }
        }
        Ok(())
    }

    /// Zero or one frame: pin at 0 and never tick.
    fn show_degenerate(
        &mut self,
        view: &mut dyn PlaybackView,
        update: &mut dyn FnMut(usize) -> Result<()>,
    ) -> Result<()> {
        self.set_state(PlaybackState::Paused, view);
        self.emit(0, view, update)
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use crossbeam::channel::unbounded;

    use super::*;

    fn ticks(n: usize) -> Vec<String> {
        (0..n).map(|i| i.to_string()).collect()
    }

    #[derive(Default)]
    struct Recording {
        positions: Vec<(usize, usize)>,
        labels: Vec<String>,
        states: Vec<PlaybackState>,
        closed: bool,
    }

    #[derive(Clone, Default)]
    struct RecordingView(Rc<RefCell<Recording>>);

    impl PlaybackView for RecordingView {
        fn set_position(&mut self, index: usize, len: usize) {
            self.0.borrow_mut().positions.push((index, len));
        }

        fn set_label(&mut self, label: &str) {
            self.0.borrow_mut().labels.push(label.to_string());
        }

        fn set_state(&mut self, state: PlaybackState) {
            self.0.borrow_mut().states.push(state);
        }

        fn close(&mut self) {
            self.0.borrow_mut().closed = true;
        }
    }

    fn drive(controller: &mut PlaybackController, controls: &[Control]) -> Vec<usize> {
        let mut seen = Vec::new();
        let mut update = |i: usize| -> Result<()> {
            seen.push(i);
            Ok(())
        };
        for control in controls {
            controller.apply(*control, &mut NullView, &mut update).unwrap();
        }
        seen
    }

    fn ticks_n(controller: &mut PlaybackController, n: usize) -> Vec<usize> {
        let mut seen = Vec::new();
        let mut update = |i: usize| -> Result<()> {
            seen.push(i);
            Ok(())
        };
        for _ in 0..n {
            controller.tick(&mut NullView, &mut update).unwrap();
        }
        seen
    }

    #[test]
    fn forward_clamps_at_last_frame() {
        let mut controller = PlaybackController::new(ticks(4), 25);
        drive(&mut controller, &[Control::ScrubTo(2), Control::Forward]);
        assert_eq!(controller.index(), 2);

        assert_eq!(ticks_n(&mut controller, 3), vec![3, 3, 3]);
        assert_eq!(controller.index(), 3);
        assert_eq!(controller.state(), PlaybackState::PlayingForward);
    }

    #[test]
    fn backward_clamps_at_first_frame() {
        let mut controller = PlaybackController::new(ticks(4), 25);
        drive(&mut controller, &[Control::ScrubTo(1), Control::Backward]);
        assert_eq!(ticks_n(&mut controller, 3), vec![0, 0, 0]);
    }

    #[test]
    fn first_tick_lands_on_frame_zero_in_either_direction() {
        let mut forward = PlaybackController::new(ticks(3), 25);
        drive(&mut forward, &[Control::Forward]);
        assert_eq!(ticks_n(&mut forward, 1), vec![0]);

        let mut backward = PlaybackController::new(ticks(3), 25);
        drive(&mut backward, &[Control::Backward]);
        assert_eq!(ticks_n(&mut backward, 1), vec![0]);
    }

    #[test]
    fn steps_pause_and_remember_direction() {
        let mut controller = PlaybackController::new(ticks(5), 25);
        let seen = drive(
            &mut controller,
            &[
                Control::StepForward,
                Control::StepForward,
                Control::StepBack,
            ],
        );
        assert_eq!(seen, vec![0, 1, 0]);
        assert_eq!(controller.state(), PlaybackState::Paused);
        assert!(!controller.is_ticking());
        assert!(ticks_n(&mut controller, 2).is_empty());

        drive(&mut controller, &[Control::TogglePause]);
        assert_eq!(controller.state(), PlaybackState::PlayingBackward);
        assert_eq!(ticks_n(&mut controller, 1), vec![0]);
    }

    #[test]
    fn toggle_pauses_and_resumes() {
        let mut controller = PlaybackController::new(ticks(5), 25);
        drive(&mut controller, &[Control::Forward]);
        ticks_n(&mut controller, 2);
        drive(&mut controller, &[Control::TogglePause]);
        assert_eq!(controller.state(), PlaybackState::Paused);
        assert!(ticks_n(&mut controller, 3).is_empty());

        drive(&mut controller, &[Control::TogglePause]);
        assert_eq!(ticks_n(&mut controller, 1), vec![2]);
    }

    #[test]
    fn scrub_is_idempotent_and_clamped() {
        let mut controller = PlaybackController::new(ticks(4), 25);
        let seen = drive(
            &mut controller,
            &[Control::ScrubTo(2), Control::ScrubTo(2), Control::ScrubTo(9)],
        );
        assert_eq!(seen, vec![2, 2, 3]);
        assert_eq!(controller.index(), 3);
        assert_eq!(controller.state(), PlaybackState::Paused);
    }

    #[test]
    fn degenerate_sequences_never_tick() {
        for n in [0, 1] {
            let mut controller = PlaybackController::new(ticks(n), 25);
            drive(&mut controller, &[Control::Forward]);
            assert!(!controller.is_ticking());
            assert!(ticks_n(&mut controller, 3).is_empty());
            assert_eq!(controller.index(), 0);
        }
    }

    #[test]
    fn export_emits_every_frame_once() {
        let view = RecordingView::default();
        let mut controller = PlaybackController::new(ticks(4), 25);
        let mut seen = Vec::new();
        let session = Session::export().with_view(Box::new(view.clone()));
        let emitted = controller
            .run(session, |i| {
                seen.push(i);
                Ok(())
            })
            .unwrap();

        assert_eq!(seen, vec![0, 1, 2, 3]);
        assert_eq!(emitted, 4);
        let recording = view.0.borrow();
        assert_eq!(recording.labels, ticks(4));
        assert_eq!(recording.positions.last(), Some(&(3, 4)));
        assert!(recording.closed);
    }

    #[test]
    fn export_of_single_frame_emits_it_once() {
        let mut controller = PlaybackController::new(ticks(1), 25);
        let mut seen = Vec::new();
        controller
            .run(Session::export(), |i| {
                seen.push(i);
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec![0]);

        let mut empty = PlaybackController::new(Vec::new(), 25);
        let emitted = empty.run(Session::export(), |_| Ok(())).unwrap();
        assert_eq!(emitted, 0);
        assert_eq!(empty.index(), 0);
    }

    #[test]
    fn interactive_session_follows_controls_until_close() {
        let (tx, rx) = unbounded();
        for control in [
            Control::StepForward,
            Control::StepForward,
            Control::ScrubTo(5),
            Control::StepBack,
            Control::Close,
            Control::StepForward,
        ] {
            tx.send(control).unwrap();
        }

        let view = RecordingView::default();
        let mut controller = PlaybackController::new(ticks(8), 25).with_autoplay(false);
        let mut seen = Vec::new();
        controller
            .run(Session::interactive(rx, Box::new(view.clone())), |i| {
                seen.push(i);
                Ok(())
            })
            .unwrap();

        assert_eq!(seen, vec![0, 1, 5, 4]);
        assert!(view.0.borrow().closed);
        assert_eq!(
            view.0.borrow().states.last(),
            Some(&PlaybackState::Paused)
        );
    }

    #[test]
    fn interactive_session_ends_on_disconnect() {
        let (tx, rx) = unbounded();
        tx.send(Control::ScrubTo(1)).unwrap();
        drop(tx);

        let mut controller = PlaybackController::new(ticks(3), 25).with_autoplay(false);
        let emitted = controller
            .run(Session::interactive(rx, Box::new(NullView)), |_| Ok(()))
            .unwrap();
        assert_eq!(emitted, 1);
    }

    #[test]
    fn update_errors_abort_the_session() {
        let mut controller = PlaybackController::new(ticks(3), 25);
        let result = controller.run(Session::export(), |i| {
            if i == 1 {
                Err("boom".into())
            } else {
                Ok(())
            }
        });
        assert!(result.is_err());
        assert_eq!(controller.index(), 1);
    }

    #[test]
    fn interval_follows_fps() {
        let controller = PlaybackController::new(ticks(2), 25);
        assert_eq!(controller.interval(), Duration::from_millis(40));
    }
}
