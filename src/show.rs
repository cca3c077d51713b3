//! The control loop: one thread owns the model, the menu and the canvas.
//!
//! Everything else talks to it through [`ShowCommand`]s on an `mpsc`
//! channel and reads back a [`ShowStatus`] snapshot. Frames go out through a
//! [`FrameSink`].
//!
//! ## Rust concepts
//! - `try_recv()` so draining commands never blocks a frame
//! - Loop labels (`'show: while`) to leave from inside the drain loop
//! - `Box<dyn Trait>` for the pluggable frame output

use crate::canvas::Canvas;
use crate::input::InputEvent;
use crate::menu::Menu;
use crate::model::PlaylistCollection;
use crate::playlist::PlaybackState;
use crate::{Color, Millis, is_running};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

pub const DEFAULT_FPS: u32 = 25;
pub const DEFAULT_BRIGHTNESS: u8 = 75;
const MAX_ANNOUNCEMENTS: usize = 16;

// ── Commands ─────────────────────────────────────────────────────────

/// Requests for the control loop from other threads.
#[derive(Debug, Clone)]
pub enum ShowCommand {
    /// A controller event, routed through the menu first.
    Input(InputEvent),
    /// Run one effect from the all-effects playlist indefinitely.
    SelectEffect(String),
    /// Start a playlist from the top.
    SelectPlaylist(usize),
    /// Output brightness, 0-100.
    SetBrightness(u8),
    Quit,
}

// ── Status ───────────────────────────────────────────────────────────

/// Snapshot of the show, refreshed every frame.
#[derive(Clone, Debug, Serialize, utoipa::ToSchema)]
pub struct ShowStatus {
    /// Index of the active playlist
    pub active_playlist: Option<usize>,
    pub playlist_name: Option<String>,
    pub playback: Option<PlaybackState>,
    /// Name of the effect on the floor
    pub effect: Option<String>,
    /// Its index within the active playlist
    pub effect_index: Option<usize>,
    /// Milliseconds before the playlist may move on
    pub remaining_ms: Option<i64>,
    pub in_menu: bool,
    /// Output brightness (0-100)
    pub brightness: u8,
    /// Frames produced since start
    pub frames: u64,
    /// Recent live-request acknowledgements, oldest first
    pub announcements: Vec<String>,
    /// Server version
    pub version: String,
}

impl ShowStatus {
    pub fn new() -> Self {
        Self {
            active_playlist: None,
            playlist_name: None,
            playback: None,
            effect: None,
            effect_index: None,
            remaining_ms: None,
            in_menu: false,
            brightness: DEFAULT_BRIGHTNESS,
            frames: 0,
            announcements: Vec::new(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn announce(&mut self, message: impl Into<String>) {
        self.announcements.push(message.into());
        if self.announcements.len() > MAX_ANNOUNCEMENTS {
            let excess = self.announcements.len() - MAX_ANNOUNCEMENTS;
            self.announcements.drain(..excess);
        }
    }
}

impl Default for ShowStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock the shared status. A panic elsewhere never leaves it half-written,
/// so a poisoned lock is still safe to use.
pub fn lock_status(status: &Mutex<ShowStatus>) -> MutexGuard<'_, ShowStatus> {
    status.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Timing ───────────────────────────────────────────────────────────

/// Monotonic millisecond clock, zeroed when the show starts.
#[derive(Debug, Clone, Copy)]
pub struct ShowClock {
    origin: Instant,
}

impl ShowClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> Millis {
        self.origin.elapsed().as_millis() as Millis
    }
}

impl Default for ShowClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Paces the loop to a target frame rate.
///
/// Falling more than two frames behind drops the backlog rather than
/// bursting to catch up.
#[derive(Debug)]
pub struct FrameLimiter {
    frame: Duration,
    next: Option<Instant>,
}

impl FrameLimiter {
    pub fn new(fps: u32) -> Self {
        Self {
            frame: Duration::from_millis(1000 / fps.max(1) as u64),
            next: None,
        }
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame
    }

    /// Book the next frame and return how long to sleep until it.
    pub fn tick(&mut self, now: Instant) -> Duration {
        let mut next = self.next.unwrap_or(now);
        if now > next + self.frame * 2 {
            next = now;
        }
        next += self.frame;
        self.next = Some(next);
        next.saturating_duration_since(now)
    }
}

// ── Output ───────────────────────────────────────────────────────────

/// Destination for finished frames (raw RGB, row-major).
pub trait FrameSink: Send {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()>;
}

/// Discards frames; for running without floor hardware.
#[derive(Debug, Default)]
pub struct HeadlessSink {
    frames: u64,
}

impl HeadlessSink {
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl FrameSink for HeadlessSink {
    fn write_frame(&mut self, _frame: &[u8]) -> io::Result<()> {
        self.frames += 1;
        Ok(())
    }
}

/// Streams frames into a file or named pipe read by the floor driver.
pub struct PipeSink {
    writer: BufWriter<File>,
}

impl PipeSink {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().write(true).create(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl FrameSink for PipeSink {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.writer.write_all(frame)?;
        self.writer.flush()
    }
}

// ── Show ─────────────────────────────────────────────────────────────

pub struct Show {
    model: PlaylistCollection,
    menu: Menu,
    canvas: Canvas,
    brightness: u8,
    frames: u64,
    /// Effect whose draw last failed, so the warning is logged once.
    failing: Option<String>,
}

impl Show {
    pub fn new(model: PlaylistCollection) -> Self {
        let canvas = Canvas::for_floor(model.floor());
        Self {
            model,
            menu: Menu::new(),
            canvas,
            brightness: DEFAULT_BRIGHTNESS,
            frames: 0,
            failing: None,
        }
    }

    pub fn with_brightness(mut self, brightness: u8) -> Self {
        self.brightness = brightness.min(100);
        self
    }

    pub fn model(&self) -> &PlaylistCollection {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut PlaylistCollection {
        &mut self.model
    }

    pub fn menu(&self) -> &Menu {
        &self.menu
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Run one frame at `now`. Returns whether a frame was drawn.
    ///
    /// A failing effect puts the error frame on the floor; the playlist's
    /// position and timers carry on as if it had drawn normally.
    pub fn tick(&mut self, now: Millis, events: impl IntoIterator<Item = InputEvent>) -> bool {
        for event in events {
            self.route_event(event, now);
        }

        let drawn = if self.menu.is_active() {
            self.menu.draw_frame(&self.model, &mut self.canvas)
        } else {
            self.draw_effect(now)
        };

        if drawn {
            self.frames += 1;
        }
        drawn
    }

    fn draw_effect(&mut self, now: Millis) -> bool {
        let Some(effect) = self.model.current_effect(now) else {
            self.canvas.fill(Color::BLACK);
            return false;
        };

        match effect.draw_frame(&mut self.canvas) {
            Ok(drawn) => {
                self.failing = None;
                drawn
            }
            Err(e) => {
                if self.failing.as_deref() != Some(effect.name()) {
                    tracing::warn!("{}", e);
                    self.failing = Some(effect.name().to_string());
                }
                self.canvas.draw_error();
                true
            }
        }
    }

    /// Menu first, then whatever effect is on the floor.
    fn route_event(&mut self, event: InputEvent, now: Millis) {
        let Some(event) = self.menu.handle_event(event, &mut self.model, now) else {
            return;
        };
        if let Some(effect) = self.model.current_effect(now) {
            if let Some(unhandled) = effect.handle_event(event) {
                tracing::trace!("Unhandled event: {:?}", unhandled);
            }
        }
    }

    /// Act on a command from outside the loop. `Quit` is the loop's business
    /// and is ignored here.
    pub fn apply(&mut self, command: ShowCommand, now: Millis) {
        match command {
            ShowCommand::Input(event) => self.route_event(event, now),
            ShowCommand::SelectEffect(name) => {
                self.close_menu(now);
                if self.model.select_effect_by_name(&name, now).is_none() {
                    tracing::warn!("Unable to find requested effect {}", name);
                }
            }
            ShowCommand::SelectPlaylist(index) => {
                self.close_menu(now);
                if let Err(e) = self.model.select_playlist(index) {
                    tracing::warn!("{}", e);
                }
            }
            ShowCommand::SetBrightness(value) => {
                self.brightness = value.min(100);
                tracing::info!("Brightness set to {}", self.brightness);
            }
            ShowCommand::Quit => {}
        }
    }

    fn close_menu(&mut self, now: Millis) {
        if self.menu.is_active() {
            self.menu.exit(&mut self.model, now);
        }
    }

    /// The current canvas as RGB bytes at the current brightness.
    pub fn frame_bytes(&self) -> Vec<u8> {
        self.canvas.to_rgb_bytes(self.brightness)
    }

    pub fn update_status(&self, status: &mut ShowStatus, now: Millis) {
        let playlist = self.model.active_playlist();
        status.active_playlist = self.model.active_index();
        status.playlist_name = playlist.map(|p| p.name().to_string());
        status.playback = playlist.map(|p| p.state());
        status.effect = playlist
            .and_then(|p| p.current())
            .map(|e| e.name().to_string());
        status.effect_index = playlist.and_then(|p| p.current_index());
        status.remaining_ms = playlist.and_then(|p| p.remaining_time(now));
        status.in_menu = self.menu.is_active();
        status.brightness = self.brightness;
        status.frames = self.frames;
    }

    /// Stop whatever is on the floor.
    pub fn shutdown(&mut self) {
        if let Some(playlist) = self.model.active_playlist_mut() {
            playlist.stop_current();
        }
    }
}

// ── Loop ─────────────────────────────────────────────────────────────

/// Run the show until told to quit, the command channel closes, or
/// `running` goes false.
pub fn run_show(
    mut show: Show,
    rx: Receiver<ShowCommand>,
    status: Arc<Mutex<ShowStatus>>,
    mut sink: Box<dyn FrameSink>,
    running: Arc<AtomicBool>,
    fps: u32,
) {
    let clock = ShowClock::new();
    let mut limiter = FrameLimiter::new(fps);
    let mut sink_failed = false;

    tracing::info!(
        "Show thread started at {} fps ({} ms per frame)",
        fps,
        limiter.frame_duration().as_millis()
    );

    'show: while is_running(&running) {
        let now = clock.now_ms();

        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(ShowCommand::Quit) | Ok(ShowCommand::Input(InputEvent::Quit)) => {
                    tracing::info!("Quit requested");
                    break 'show;
                }
                Ok(ShowCommand::Input(event)) => events.push(event),
                Ok(command) => show.apply(command, now),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::info!("Show thread: channel closed, shutting down.");
                    break 'show;
                }
            }
        }

        if show.tick(now, events) {
            match sink.write_frame(&show.frame_bytes()) {
                Ok(()) => sink_failed = false,
                Err(e) if !sink_failed => {
                    tracing::error!("Failed to write frame: {}", e);
                    sink_failed = true;
                }
                Err(_) => {}
            }
        }

        show.update_status(&mut lock_status(&status), now);
        thread::sleep(limiter.tick(Instant::now()));
    }

    show.shutdown();
    tracing::info!("Show thread stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::testing::{Calls, Fault, probe};
    use crate::input::Button;
    use crate::FloorSize;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::sync::mpsc;

    fn show_with(faults: &[(&str, Fault)]) -> (Show, Vec<Arc<Calls>>) {
        let mut model = PlaylistCollection::new(FloorSize::new(4, 6));
        let mut calls = Vec::new();
        for (name, fault) in faults {
            let (factory, c) = probe(*fault);
            model.register_effect(name, factory);
            calls.push(c);
        }
        (Show::new(model), calls)
    }

    fn press(button: Button) -> InputEvent {
        InputEvent::button_down(0, button)
    }

    #[test]
    fn nothing_active_draws_black() {
        let (mut show, _) = show_with(&[("A", Fault::None)]);
        assert!(!show.tick(0, []));
        assert_eq!(show.canvas().pixel(0, 0), Some(Color::BLACK));
    }

    #[test]
    fn tick_draws_the_current_effect() {
        let (mut show, calls) = show_with(&[("A", Fault::None)]);
        show.apply(ShowCommand::SelectEffect("A".into()), 0);
        assert!(show.tick(0, []));
        assert!(show.tick(40, []));
        assert_eq!(calls[0].frames(), 2);
        assert_eq!(show.canvas().pixel(5, 3), Some(Color::BLUE));
    }

    #[test]
    fn failing_effect_shows_error_and_keeps_schedule() {
        let (mut show, _) = show_with(&[("Bad", Fault::Draw), ("Good", Fault::None)]);
        let index = show
            .model_mut()
            .add_playlist_from_definition(&serde_json::json!({
                "effects": [ { "name": "Bad", "duration": 1 }, { "name": "Good" } ]
            }))
            .unwrap();
        show.apply(ShowCommand::SelectPlaylist(index), 0);

        assert!(show.tick(0, []));
        assert_eq!(show.canvas().pixel(0, 0), Some(Color::RED));
        assert!(show.tick(500, []));

        assert!(show.tick(1_001, []));
        let mut status = ShowStatus::new();
        show.update_status(&mut status, 1_001);
        assert_eq!(status.effect.as_deref(), Some("Good"));
        assert_eq!(status.effect_index, Some(1));
        assert_eq!(show.canvas().pixel(0, 0), Some(Color::BLUE));
    }

    #[test]
    fn menu_takes_over_the_floor() {
        let (mut show, calls) = show_with(&[("A", Fault::None)]);
        show.apply(ShowCommand::SelectEffect("A".into()), 0);
        show.tick(0, []);

        assert!(show.tick(40, [press(Button::Select)]));
        assert!(show.menu().is_active());
        assert_eq!(calls[0].frames(), 1);
        assert_eq!(calls[0].pauses(), 1);
        // All-effects splash on top, scrollbar along the bottom.
        assert_eq!(show.canvas().pixel(0, 0), Some(Color::BLUE));
        assert_eq!(show.canvas().pixel(0, 3), Some(Color::YELLOW));

        show.tick(80, [press(Button::B)]);
        assert!(!show.menu().is_active());
        assert_eq!(calls[0].resumes(), 1);
    }

    #[test]
    fn events_reach_the_effect_when_menu_is_closed() {
        let (mut show, _) = show_with(&[("Greedy", Fault::Greedy)]);
        show.apply(ShowCommand::SelectEffect("Greedy".into()), 0);
        show.tick(0, [press(Button::A), press(Button::BumperLeft)]);
        assert!(!show.menu().is_active());
    }

    #[test]
    fn selecting_closes_the_menu() {
        let (mut show, _) = show_with(&[("A", Fault::None), ("B", Fault::None)]);
        show.apply(ShowCommand::SelectEffect("A".into()), 0);
        show.tick(0, [press(Button::Select)]);
        assert!(show.menu().is_active());

        show.apply(ShowCommand::SelectEffect("B".into()), 10);
        assert!(!show.menu().is_active());
        let mut status = ShowStatus::new();
        show.update_status(&mut status, 10);
        assert_eq!(status.effect.as_deref(), Some("B"));
        assert_eq!(status.playback, Some(PlaybackState::Running));
    }

    #[rstest]
    #[case(40, 40)]
    #[case(100, 100)]
    #[case(250, 100)]
    fn brightness_is_capped(#[case] requested: u8, #[case] expected: u8) {
        let (mut show, _) = show_with(&[]);
        show.apply(ShowCommand::SetBrightness(requested), 0);
        assert_eq!(show.brightness(), expected);
    }

    #[test]
    fn frame_bytes_apply_brightness() {
        let (mut show, _) = show_with(&[("A", Fault::None)]);
        show.apply(ShowCommand::SelectEffect("A".into()), 0);
        show.apply(ShowCommand::SetBrightness(50), 0);
        show.tick(0, []);
        let bytes = show.frame_bytes();
        assert_eq!(bytes.len(), FloorSize::new(4, 6).frame_byte_count());
        assert_eq!(&bytes[..3], &[0, 0, 127]);
    }

    #[test]
    fn status_reports_the_floor() {
        let (mut show, _) = show_with(&[("A", Fault::None)]);
        show.apply(ShowCommand::SelectEffect("A".into()), 0);
        show.tick(0, []);

        let mut status = ShowStatus::new();
        show.update_status(&mut status, 1_000);
        assert_eq!(status.active_playlist, Some(0));
        assert_eq!(status.playlist_name.as_deref(), Some("All effects"));
        assert_eq!(status.effect.as_deref(), Some("A"));
        assert_eq!(status.remaining_ms, Some(4_000));
        assert_eq!(status.frames, 1);
        assert!(!status.in_menu);
    }

    #[test]
    fn announcements_are_bounded() {
        let mut status = ShowStatus::new();
        for i in 0..20 {
            status.announce(format!("msg {i}"));
        }
        assert_eq!(status.announcements.len(), MAX_ANNOUNCEMENTS);
        assert_eq!(status.announcements[0], "msg 4");
        assert_eq!(status.announcements.last().map(String::as_str), Some("msg 19"));
    }

    #[test]
    fn limiter_paces_and_drops_backlog() {
        let mut limiter = FrameLimiter::new(25);
        let frame = limiter.frame_duration();
        assert_eq!(frame, Duration::from_millis(40));

        let start = Instant::now();
        assert_eq!(limiter.tick(start), frame);
        // On time: a full frame until the next one.
        assert_eq!(limiter.tick(start + frame), frame);
        // Slightly late: shorter sleep.
        assert_eq!(
            limiter.tick(start + frame * 2 + Duration::from_millis(10)),
            Duration::from_millis(30)
        );
        // Stalled: schedule restarts from now.
        assert_eq!(limiter.tick(start + frame * 20), frame);
    }

    #[test]
    fn pipe_sink_writes_raw_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.rgb");
        let mut sink = PipeSink::open(&path).unwrap();
        sink.write_frame(&[1, 2, 3]).unwrap();
        sink.write_frame(&[4, 5, 6]).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn headless_sink_counts() {
        let mut sink = HeadlessSink::default();
        sink.write_frame(&[0; 3]).unwrap();
        assert_eq!(sink.frames(), 1);
    }

    #[test]
    fn run_show_stops_on_quit() {
        let (show, _) = show_with(&[("A", Fault::None)]);
        let (tx, rx) = mpsc::channel();
        let status = Arc::new(Mutex::new(ShowStatus::new()));
        let running = Arc::new(AtomicBool::new(true));

        tx.send(ShowCommand::SelectEffect("A".into())).unwrap();
        let handle = {
            let status = status.clone();
            let running = running.clone();
            thread::spawn(move || {
                run_show(show, rx, status, Box::new(HeadlessSink::default()), running, 100)
            })
        };

        thread::sleep(Duration::from_millis(100));
        tx.send(ShowCommand::Quit).unwrap();
        handle.join().unwrap();

        let status = lock_status(&status);
        assert_eq!(status.effect.as_deref(), Some("A"));
        assert!(status.frames > 0);
    }

    #[test]
    fn run_show_stops_when_flag_drops() {
        let (show, _) = show_with(&[]);
        let (_tx, rx) = mpsc::channel();
        let status = Arc::new(Mutex::new(ShowStatus::new()));
        let running = Arc::new(AtomicBool::new(false));
        run_show(show, rx, status, Box::new(HeadlessSink::default()), running, 25);
    }
}
