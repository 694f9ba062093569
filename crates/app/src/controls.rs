//! Terminal front end for interactive sessions: keys in, position bar out.

use std::{
    io::{self, Stdout, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam::channel::{unbounded, Receiver, Sender};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    queue,
    style::Print,
    terminal::{self, ClearType},
};
use dvplayer_core::{Control, PlaybackState, PlaybackView};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const BAR_WIDTH: usize = 30;

const HELP: &str =
    "space pause/resume  f/b play forward/backward  ←/→ step  home/end scrub  q quit";

/// Reads key presses on a background thread while raw mode is enabled.
pub struct KeyboardControls {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl KeyboardControls {
    pub fn spawn() -> io::Result<(Receiver<Control>, Self)> {
        terminal::enable_raw_mode()?;
        let (tx, rx) = unbounded();
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let spawned = thread::Builder::new()
            .name("dvplayer-keys".into())
            .spawn(move || {
                if let Err(err) = read_keys(&tx, &flag) {
                    tracing::warn!(error = %err, "keyboard input stopped");
                    let _ = tx.send(Control::Close);
                }
            });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                let _ = terminal::disable_raw_mode();
                return Err(err);
            }
        };
        Ok((
            rx,
            Self {
                stop,
                handle: Some(handle),
            },
        ))
    }

    /// Stops the reader thread and restores the terminal.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("keyboard thread panicked");
            }
        }
        let _ = terminal::disable_raw_mode();
    }
}

impl Drop for KeyboardControls {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn read_keys(tx: &Sender<Control>, stop: &AtomicBool) -> io::Result<()> {
    while !stop.load(Ordering::Relaxed) {
        if !event::poll(POLL_INTERVAL)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        let Some(control) = control_for(key) else {
            continue;
        };
        if tx.send(control).is_err() || control == Control::Close {
            break;
        }
    }
    Ok(())
}

/// Maps a key press to a playback control.
pub fn control_for(key: KeyEvent) -> Option<Control> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Control::Close);
    }
    match key.code {
        KeyCode::Char(' ') => Some(Control::TogglePause),
        KeyCode::Char('f') => Some(Control::Forward),
        KeyCode::Char('b') => Some(Control::Backward),
        KeyCode::Right | KeyCode::Char('.') => Some(Control::StepForward),
        KeyCode::Left | KeyCode::Char(',') => Some(Control::StepBack),
        KeyCode::Home => Some(Control::ScrubTo(0)),
        // Clamped to the last frame by the controller.
        KeyCode::End => Some(Control::ScrubTo(usize::MAX)),
        KeyCode::Char('q') | KeyCode::Esc => Some(Control::Close),
        _ => None,
    }
}

/// Single status line showing a position bar, the tick label and the state.
pub struct TerminalView {
    out: Stdout,
    index: usize,
    len: usize,
    label: String,
    state: Option<PlaybackState>,
    started: bool,
}

impl TerminalView {
    pub fn new() -> Self {
        Self {
            out: io::stdout(),
            index: 0,
            len: 0,
            label: String::new(),
            state: None,
            started: false,
        }
    }

    fn redraw(&mut self) {
        if !self.started {
            self.started = true;
            let _ = queue!(self.out, Print(HELP), cursor::MoveToNextLine(1));
        }
        let mut line = status_line(self.index, self.len, &self.label);
        if let Some(state) = self.state {
            line.push_str(&format!(" ({state})"));
        }
        let result = queue!(
            self.out,
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::CurrentLine),
            Print(line)
        )
        .and_then(|_| self.out.flush());
        if let Err(err) = result {
            tracing::debug!(error = %err, "failed to draw status line");
        }
    }
}

impl PlaybackView for TerminalView {
    fn set_position(&mut self, index: usize, len: usize) {
        self.index = index;
        self.len = len;
    }

    fn set_label(&mut self, label: &str) {
        self.label = label.to_string();
        self.redraw();
    }

    fn set_state(&mut self, state: PlaybackState) {
        self.state = Some(state);
        self.redraw();
    }

    fn close(&mut self) {
        let _ = queue!(self.out, cursor::MoveToNextLine(1)).and_then(|_| self.out.flush());
    }
}

fn status_line(index: usize, len: usize, label: &str) -> String {
    let filled = if len <= 1 {
        BAR_WIDTH * len
    } else {
        (index * BAR_WIDTH + (len - 1) / 2) / (len - 1)
    }
    .min(BAR_WIDTH);
    format!(
        "[{}{}] {}/{} {}",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        (index + 1).min(len),
        len,
        label
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn maps_playback_keys() {
        assert_eq!(control_for(press(KeyCode::Char(' '))), Some(Control::TogglePause));
        assert_eq!(control_for(press(KeyCode::Right)), Some(Control::StepForward));
        assert_eq!(control_for(press(KeyCode::Left)), Some(Control::StepBack));
        assert_eq!(control_for(press(KeyCode::Home)), Some(Control::ScrubTo(0)));
        assert_eq!(control_for(press(KeyCode::Esc)), Some(Control::Close));
        assert_eq!(
            control_for(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Control::Close)
        );
        assert_eq!(control_for(press(KeyCode::Char('z'))), None);
    }

    #[test]
    fn status_bar_tracks_position() {
        let start = status_line(0, 5, "0");
        assert!(start.starts_with(&format!("[{}]", "-".repeat(BAR_WIDTH))));
        assert!(start.ends_with(" 1/5 0"));

        let end = status_line(4, 5, "4");
        assert!(end.starts_with(&format!("[{}]", "#".repeat(BAR_WIDTH))));
        assert!(end.ends_with(" 5/5 4"));

        assert!(status_line(0, 0, "").contains(" 0/0 "));
    }
}
