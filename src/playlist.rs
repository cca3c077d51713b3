//! Ordered, time-driven sequences of effects.
//!
//! A playlist is a small state machine:
//!
//! ```text
//! STOPPED ──(first get_current / resume)──> RUNNING <──pause/resume──> PAUSED
//! ```
//!
//! There is no terminal state. Time never comes from a clock in here: every
//! operation that cares takes `now` from the caller, which samples once per
//! frame. That keeps the duration maths deterministic under test.

use crate::canvas::Canvas;
use crate::handle::EffectHandle;
use crate::live::LiveState;
use crate::{Color, Millis};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Stopped,
    Running,
    Paused,
}

/// What happens after the last entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopMode {
    /// Wrap back to the first entry.
    #[default]
    Loop,
    /// Hold on the last entry indefinitely.
    Once,
}

/// Where a playlist came from. The live variant carries the feed's inbox.
pub enum PlaylistKind {
    /// Every catalog entry; manual navigation only.
    AllEffects,
    /// Loaded from a definition or built in code.
    User,
    /// Grows while the show runs.
    Live(LiveState),
}

pub struct Playlist {
    name: String,
    kind: PlaylistKind,
    entries: Vec<EffectHandle>,
    position: Option<usize>,
    state: PlaybackState,
    loop_mode: LoopMode,
    auto_advance: bool,
    started_at: Option<Millis>,
    total_pause_ms: i64,
    paused_at: Option<Millis>,
}

impl Playlist {
    fn with_kind(name: impl Into<String>, kind: PlaylistKind, auto_advance: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            entries: Vec::new(),
            position: None,
            state: PlaybackState::Stopped,
            loop_mode: LoopMode::Loop,
            auto_advance,
            started_at: None,
            total_pause_ms: 0,
            paused_at: None,
        }
    }

    /// The distinguished playlist holding every catalog entry. It never
    /// advances on its own.
    pub fn all_effects() -> Self {
        Self::with_kind("All effects", PlaylistKind::AllEffects, false)
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self::with_kind(name, PlaylistKind::User, true)
    }

    pub(crate) fn live(name: impl Into<String>, state: LiveState) -> Self {
        Self::with_kind(name, PlaylistKind::Live(state), true).with_loop_mode(LoopMode::Once)
    }

    pub fn with_loop_mode(mut self, loop_mode: LoopMode) -> Self {
        self.loop_mode = loop_mode;
        self
    }

    // ── Inspection ───────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &PlaylistKind {
        &self.kind
    }

    pub fn entries(&self) -> &[EffectHandle] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&EffectHandle> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == PlaybackState::Running
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn set_loop_mode(&mut self, loop_mode: LoopMode) {
        self.loop_mode = loop_mode;
    }

    pub fn auto_advance(&self) -> bool {
        self.auto_advance
    }

    /// Index of the current entry, `None` before the playlist has started.
    pub fn current_index(&self) -> Option<usize> {
        self.position
    }

    /// When the current entry was (re)started.
    pub fn started_at(&self) -> Option<Millis> {
        self.started_at
    }

    /// The current entry without advancing anything.
    pub fn current(&self) -> Option<&EffectHandle> {
        self.position.and_then(|p| self.entries.get(p))
    }

    // ── Building ─────────────────────────────────────────────────────

    /// Append an entry and return its index.
    pub fn add(&mut self, handle: EffectHandle) -> usize {
        self.entries.push(handle);
        self.entries.len() - 1
    }

    // ── Playback ─────────────────────────────────────────────────────

    /// The entry that should be on the floor at `now`, advancing first if
    /// the current one has run its course.
    ///
    /// A playlist with a single entry keeps it running indefinitely rather
    /// than restarting it every time its duration lapses.
    pub fn get_current(&mut self, now: Millis) -> Option<&mut EffectHandle> {
        self.sync_inbox();

        if self.entries.is_empty() {
            return None;
        }

        let Some(position) = self.position else {
            tracing::info!("Starting playlist {}", self.name);
            return self.advance(now);
        };

        // Indexing was prepared by resume() but nothing was started yet.
        if self.started_at.is_none() {
            return self.start_at(position, now);
        }

        if self.has_expired(position, now) {
            tracing::info!(
                "{} has exceeded its intended duration in {}",
                self.entries[position].name(),
                self.name
            );
            return self.advance(now);
        }

        self.entries.get_mut(position)
    }

    fn has_expired(&self, position: usize, now: Millis) -> bool {
        let len = self.entries.len();
        let may_move = self.loop_mode == LoopMode::Loop || position + 1 < len;

        self.auto_advance
            && self.state == PlaybackState::Running
            && len > 1
            && may_move
            && self.remaining_time(now).is_some_and(|remaining| remaining < 0)
    }

    /// Move to the next entry in sequence and start it.
    ///
    /// `Loop` wraps to the first entry; `Once` holds on the last one and
    /// leaves it running untouched.
    pub fn advance(&mut self, now: Millis) -> Option<&mut EffectHandle> {
        self.sync_inbox();
        self.total_pause_ms = 0;
        self.paused_at = None;

        if self.entries.is_empty() {
            return None;
        }

        // Decide from the pre-resume position: resume() may prepare index 0.
        let started = self.started_at.is_some();
        let position = self.position;

        if !self.is_running() {
            self.resume(now);
        }

        let next = match (position, started) {
            (Some(p), true) if p + 1 >= self.entries.len() => match self.loop_mode {
                LoopMode::Loop => 0,
                LoopMode::Once => return self.entries.get_mut(p),
            },
            (Some(p), true) => p + 1,
            (Some(p), false) => p,
            (None, _) => 0,
        };

        tracing::debug!("Advancing {} to entry #{}", self.name, next);
        self.start_at(next, now)
    }

    /// Start the entry at `index` directly, regardless of sequence.
    ///
    /// Out-of-range indices leave everything as it was and return `None`.
    pub fn start_at(&mut self, index: usize, now: Millis) -> Option<&mut EffectHandle> {
        self.sync_inbox();

        if index >= self.entries.len() {
            tracing::warn!(
                "Cannot start entry #{} of {}: only {} entries",
                index,
                self.name,
                self.entries.len()
            );
            return None;
        }

        if let Some(previous) = self.position.filter(|_| self.started_at.is_some()) {
            if let Some(entry) = self.entries.get_mut(previous) {
                entry.stop();
            }
        }

        self.total_pause_ms = 0;
        self.paused_at = None;

        if let Err(e) = self.entries[index].reset() {
            tracing::warn!("Reset failed, starting anyway: {}", e);
        }
        self.started_at = Some(now);
        self.resume(now);
        if let Err(e) = self.entries[index].start() {
            tracing::warn!("Start failed: {}", e);
        }
        self.position = Some(index);

        tracing::info!(
            "Started {} (#{}) in {}",
            self.entries[index].name(),
            index,
            self.name
        );
        self.acknowledge(index);
        self.entries.get_mut(index)
    }

    /// Freeze the countdown of the current entry.
    pub fn pause(&mut self, now: Millis) {
        if self.state == PlaybackState::Paused {
            return;
        }
        self.paused_at = Some(now);
        self.state = PlaybackState::Paused;

        if self.started_at.is_some() {
            if let Some(entry) = self.position.and_then(|p| self.entries.get_mut(p)) {
                entry.pause();
            }
        }
    }

    /// Unfreeze the countdown. On a playlist that has never run this only
    /// prepares index 0; the entry starts on the next `get_current`.
    pub fn resume(&mut self, now: Millis) {
        let was_paused = match self.paused_at.take() {
            Some(at) => {
                self.total_pause_ms += now.saturating_sub(at) as i64;
                true
            }
            None => false,
        };
        self.state = PlaybackState::Running;

        if self.position.is_none() && !self.entries.is_empty() {
            self.position = Some(0);
        }

        if was_paused && self.started_at.is_some() {
            if let Some(entry) = self.position.and_then(|p| self.entries.get_mut(p)) {
                entry.resume();
            }
        }
    }

    /// Milliseconds left for the current entry, with paused time excluded
    /// (including a pause still in progress). `None` if nothing is running.
    pub fn remaining_time(&self, now: Millis) -> Option<i64> {
        let entry = self.current()?;
        let started = self.started_at?;

        let mut paused = self.total_pause_ms;
        if let Some(at) = self.paused_at {
            paused += now.saturating_sub(at) as i64;
        }

        let elapsed = now.saturating_sub(started) as i64;
        Some(entry.duration_ms() - elapsed + paused)
    }

    /// Forget the position so the next activation starts from the top.
    pub fn reset_state(&mut self) {
        self.position = None;
        self.state = PlaybackState::Stopped;
        self.started_at = None;
        self.total_pause_ms = 0;
        self.paused_at = None;
    }

    /// Stop the current entry's effect, if one was started.
    pub fn stop_current(&mut self) {
        if self.started_at.is_none() {
            return;
        }
        if let Some(entry) = self.position.and_then(|p| self.entries.get_mut(p)) {
            entry.stop();
        }
    }

    // ── Live feed plumbing ───────────────────────────────────────────

    /// Pull in anything the live feed has queued. The only place entries
    /// are appended while the show runs.
    fn sync_inbox(&mut self) {
        if let PlaylistKind::Live(live) = &mut self.kind {
            live.drain_into(&mut self.entries);
        }
    }

    fn acknowledge(&mut self, index: usize) {
        if let PlaylistKind::Live(live) = &mut self.kind {
            live.acknowledge(index, self.entries[index].name());
        }
    }

    // ── Drawing ──────────────────────────────────────────────────────

    /// Menu splash: one stripe per entry on a blue background.
    pub fn draw_splash(&self, canvas: &mut Canvas) {
        if let PlaylistKind::Live(_) = self.kind {
            crate::live::draw_splash(canvas);
            return;
        }

        canvas.fill(Color::BLUE);
        let right = canvas.width() as i32 - 5;
        for i in 0..self.entries.len() {
            let colour = if i % 2 == 0 { Color::WHITE } else { Color::GREY };
            let y = 4 + i as i32;
            canvas.draw_line(6, y, right, y, colour);
        }
    }
}

impl fmt::Display for Playlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Playlist {} : {:?}", self.name, self.state)?;
        for (idx, entry) in self.entries.iter().enumerate() {
            let marker = if Some(idx) == self.position { '>' } else { ' ' };
            writeln!(f, " {}{}", marker, entry.name())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::testing::{Calls, Fault, probe, seconds};
    use crate::handle::DEFAULT_DURATION_MS;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::sync::Arc;

    fn entry(name: &str, duration_secs: Option<i64>) -> (EffectHandle, Arc<Calls>) {
        let (factory, calls) = probe(Fault::None);
        let handle = EffectHandle::new(name, factory, duration_secs.map(seconds)).unwrap();
        (handle, calls)
    }

    fn user_playlist(durations: &[i64]) -> Playlist {
        let mut playlist = Playlist::user("test");
        for (i, d) in durations.iter().enumerate() {
            playlist.add(entry(&format!("E{i}"), Some(*d)).0);
        }
        playlist
    }

    fn current_name(playlist: &mut Playlist, now: Millis) -> Option<String> {
        playlist.get_current(now).map(|h| h.name().to_string())
    }

    #[test]
    fn empty_playlist_has_no_current_effect() {
        let mut playlist = Playlist::user("empty");
        assert!(playlist.get_current(0).is_none());
        assert!(playlist.advance(10).is_none());
        assert!(playlist.start_at(0, 20).is_none());
        playlist.pause(30);
        playlist.resume(40);
        assert!(playlist.get_current(50).is_none());
        assert_eq!(playlist.remaining_time(50), None);
        assert_eq!(playlist.current_index(), None);
    }

    #[test]
    fn add_returns_new_index() {
        let mut playlist = Playlist::user("p");
        assert_eq!(playlist.add(entry("A", None).0), 0);
        assert_eq!(playlist.add(entry("A", None).0), 1);
        assert_eq!(playlist.len(), 2);
    }

    #[test]
    fn three_entry_loop_timing() {
        let mut playlist = user_playlist(&[1, 2, 2]);
        assert_eq!(playlist.current_index(), None);

        assert_eq!(current_name(&mut playlist, 0).as_deref(), Some("E0"));
        assert_eq!(playlist.started_at(), Some(0));

        assert_eq!(current_name(&mut playlist, 1000).as_deref(), Some("E0"));
        assert_eq!(current_name(&mut playlist, 1001).as_deref(), Some("E1"));
        assert_eq!(playlist.started_at(), Some(1001));

        assert_eq!(current_name(&mut playlist, 3001).as_deref(), Some("E1"));
        assert_eq!(current_name(&mut playlist, 3002).as_deref(), Some("E2"));
        assert_eq!(playlist.current_index(), Some(2));
    }

    #[rstest]
    #[case(2)]
    #[case(3)]
    #[case(5)]
    fn advance_wraps_in_loop_mode(#[case] n: usize) {
        let mut playlist = user_playlist(&vec![5; n]);
        let mut seen = Vec::new();
        for t in 0..=n as u64 {
            playlist.advance(t);
            seen.push(playlist.current_index().unwrap());
        }
        let mut expected: Vec<usize> = (0..n).collect();
        expected.push(0);
        assert_eq!(seen, expected);
    }

    #[test]
    fn once_mode_freezes_on_last_entry() {
        let (first, _) = entry("First", Some(1));
        let (last, last_calls) = entry("Last", Some(1));
        let mut playlist = Playlist::user("once").with_loop_mode(LoopMode::Once);
        playlist.add(first);
        playlist.add(last);

        playlist.advance(0);
        playlist.advance(10);
        assert_eq!(playlist.current_index(), Some(1));
        let configures = last_calls.configures();
        let starts = last_calls.starts();

        assert_eq!(current_name(&mut playlist, 60_000).as_deref(), Some("Last"));
        assert_eq!(playlist.current_index(), Some(1));
        assert_eq!(playlist.started_at(), Some(10));
        assert_eq!(last_calls.configures(), configures);
        assert_eq!(last_calls.starts(), starts);

        // An explicit advance holds as well.
        playlist.advance(70_000);
        assert_eq!(playlist.current_index(), Some(1));
        assert_eq!(last_calls.starts(), starts);
    }

    #[test]
    fn single_entry_is_never_restarted_by_expiry() {
        let (only, calls) = entry("Only", Some(1));
        let mut playlist = Playlist::user("solo");
        playlist.add(only);

        playlist.get_current(0);
        assert_eq!(calls.starts(), 1);
        let configures = calls.configures();

        for now in [1_001, 5_000, 3_600_000] {
            assert_eq!(current_name(&mut playlist, now).as_deref(), Some("Only"));
        }
        assert_eq!(calls.starts(), 1);
        assert_eq!(calls.configures(), configures);
        assert_eq!(playlist.started_at(), Some(0));
    }

    #[test]
    fn single_entry_restarts_when_told_to() {
        let (only, calls) = entry("Only", Some(1));
        let mut playlist = Playlist::user("solo");
        playlist.add(only);
        playlist.get_current(0);

        playlist.advance(2_000);
        assert_eq!(calls.starts(), 2);
        assert_eq!(playlist.started_at(), Some(2_000));
    }

    #[test]
    fn all_effects_playlist_never_auto_advances() {
        let mut playlist = Playlist::all_effects();
        playlist.add(entry("A", Some(1)).0);
        playlist.add(entry("B", Some(1)).0);
        assert!(!playlist.auto_advance());

        assert_eq!(current_name(&mut playlist, 0).as_deref(), Some("A"));
        assert_eq!(current_name(&mut playlist, 100_000).as_deref(), Some("A"));
    }

    #[rstest]
    #[case(1_000, 3_000)]
    #[case(4_999, 1)]
    #[case(0, 10_000)]
    fn pause_excludes_paused_time(#[case] elapsed: u64, #[case] paused_for: u64) {
        let mut playlist = user_playlist(&[5, 5]);
        playlist.get_current(100);

        playlist.pause(100 + elapsed);
        let resumed_at = 100 + elapsed + paused_for;
        playlist.resume(resumed_at);

        assert_eq!(
            playlist.remaining_time(resumed_at),
            Some(5_000 - elapsed as i64)
        );
    }

    #[test]
    fn countdown_is_frozen_while_paused() {
        let mut playlist = user_playlist(&[5, 5]);
        playlist.get_current(0);
        playlist.pause(1_000);
        assert_eq!(playlist.remaining_time(1_000), Some(4_000));
        assert_eq!(playlist.remaining_time(9_000), Some(4_000));
        // And it does not expire while paused.
        assert_eq!(current_name(&mut playlist, 9_000).as_deref(), Some("E0"));
    }

    #[test]
    fn pause_time_accumulates_until_next_start() {
        let mut playlist = user_playlist(&[10, 10]);
        playlist.get_current(0);

        playlist.pause(1_000);
        playlist.resume(3_000);
        playlist.pause(4_000);
        playlist.resume(7_000);
        // 8s wall clock, 5s paused: 3s used of 10.
        assert_eq!(playlist.remaining_time(8_000), Some(7_000));

        // Resumed entry expires on adjusted time, not wall clock.
        assert_eq!(current_name(&mut playlist, 15_000).as_deref(), Some("E0"));
        assert_eq!(current_name(&mut playlist, 15_001).as_deref(), Some("E1"));
        assert_eq!(playlist.remaining_time(15_001), Some(10_000));
    }

    #[test]
    fn double_pause_keeps_first_timestamp() {
        let mut playlist = user_playlist(&[5, 5]);
        playlist.get_current(0);
        playlist.pause(1_000);
        playlist.pause(2_000);
        playlist.resume(3_000);
        assert_eq!(playlist.remaining_time(3_000), Some(4_000));
    }

    #[test]
    fn pause_and_resume_reach_the_effect() {
        let (a, calls) = entry("A", Some(5));
        let mut playlist = Playlist::user("p");
        playlist.add(a);
        playlist.get_current(0);

        playlist.pause(10);
        playlist.resume(20);
        playlist.resume(30);
        assert_eq!(calls.pauses(), 1);
        assert_eq!(calls.resumes(), 1);
        assert_eq!(playlist.state(), PlaybackState::Running);
    }

    #[test]
    fn resume_on_fresh_playlist_prepares_without_starting() {
        let (a, calls) = entry("A", Some(5));
        let mut playlist = Playlist::user("p");
        playlist.add(a);
        playlist.add(entry("B", Some(5)).0);

        playlist.resume(0);
        assert_eq!(playlist.current_index(), Some(0));
        assert_eq!(calls.starts(), 0);
        assert_eq!(playlist.remaining_time(0), None);

        assert_eq!(current_name(&mut playlist, 50).as_deref(), Some("A"));
        assert_eq!(calls.starts(), 1);
        assert_eq!(playlist.started_at(), Some(50));
    }

    #[test]
    fn start_at_resets_and_stops_previous() {
        let (a, a_calls) = entry("A", Some(5));
        let (b, b_calls) = entry("B", Some(5));
        let mut playlist = Playlist::user("p");
        playlist.add(a);
        playlist.add(b);

        playlist.start_at(0, 0);
        let started = playlist.start_at(1, 100).map(|h| h.name().to_string());
        assert_eq!(started.as_deref(), Some("B"));
        assert_eq!(a_calls.stops(), 1);
        // Construction plus the reset in start_at.
        assert_eq!(b_calls.configures(), 2);
        assert_eq!(b_calls.starts(), 1);
        assert_eq!(playlist.started_at(), Some(100));
        assert!(playlist.is_running());
    }

    #[test]
    fn start_at_out_of_range_changes_nothing() {
        let mut playlist = user_playlist(&[5, 5]);
        playlist.start_at(1, 0);
        assert!(playlist.start_at(7, 10).is_none());
        assert_eq!(playlist.current_index(), Some(1));
        assert_eq!(playlist.started_at(), Some(0));
    }

    #[test]
    fn reset_state_restarts_from_the_top() {
        let mut playlist = user_playlist(&[5, 5, 5]);
        playlist.start_at(2, 0);
        playlist.pause(10);

        playlist.reset_state();
        assert_eq!(playlist.current_index(), None);
        assert_eq!(playlist.state(), PlaybackState::Stopped);
        assert_eq!(current_name(&mut playlist, 20).as_deref(), Some("E0"));
        assert_eq!(playlist.remaining_time(20), Some(5_000));
    }

    #[test]
    fn default_duration_drives_expiry() {
        let mut playlist = Playlist::user("defaults");
        playlist.add(entry("A", None).0);
        playlist.add(entry("B", None).0);
        playlist.get_current(0);

        let edge = DEFAULT_DURATION_MS as u64;
        assert_eq!(current_name(&mut playlist, edge).as_deref(), Some("A"));
        assert_eq!(current_name(&mut playlist, edge + 1).as_deref(), Some("B"));
    }

    #[test]
    fn display_marks_current_entry() {
        let mut playlist = user_playlist(&[5, 5]);
        playlist.start_at(1, 0);
        assert_eq!(
            playlist.to_string(),
            "Playlist test : Running\n  E0\n >E1\n"
        );
    }

    #[test]
    fn splash_draws_one_stripe_per_entry() {
        let playlist = user_playlist(&[5, 5, 5]);
        let mut canvas = Canvas::new(24, 18);
        playlist.draw_splash(&mut canvas);
        assert_eq!(canvas.pixel(0, 0), Some(Color::BLUE));
        assert_eq!(canvas.pixel(6, 4), Some(Color::WHITE));
        assert_eq!(canvas.pixel(6, 5), Some(Color::GREY));
        assert_eq!(canvas.pixel(6, 6), Some(Color::WHITE));
        assert_eq!(canvas.pixel(6, 7), Some(Color::BLUE));
    }
}
