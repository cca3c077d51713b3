//! Controller-driven browsing of playlists and their entries.
//!
//! ```text
//! OUT ──Select──> ROOT ──A/Start──> PLAYLIST ──A/Start──> OUT (commit)
//!  ^               │ ^                  │
//!  └──Select / B───┘ └────────B─────────┘
//! ```
//!
//! Bumpers move whichever cursor is in use. While the menu is up the active
//! playlist is paused and every event is swallowed.

use crate::canvas::Canvas;
use crate::input::{Button, InputEvent};
use crate::model::PlaylistCollection;
use crate::{Color, Millis};

#[derive(Debug, Default)]
pub struct Menu {
    active: bool,
    /// The playlist being browsed; `None` at the root.
    browsed: Option<usize>,
    playlist_cursor: usize,
    entry_cursor: usize,
}

impl Menu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn browsed_playlist(&self) -> Option<usize> {
        self.browsed
    }

    pub fn playlist_cursor(&self) -> usize {
        self.playlist_cursor
    }

    pub fn entry_cursor(&self) -> usize {
        self.entry_cursor
    }

    /// Offer an event to the menu. Returns it untouched if the menu has no
    /// interest, `None` if it was consumed.
    pub fn handle_event(
        &mut self,
        event: InputEvent,
        model: &mut PlaylistCollection,
        now: Millis,
    ) -> Option<InputEvent> {
        if !self.active {
            return match event.pressed() {
                Some(button) if button.is_menu_toggle() => {
                    self.enter(model, now);
                    None
                }
                _ => Some(event),
            };
        }

        if let Some(button) = event.pressed() {
            self.press(button, model, now);
        }
        None
    }

    fn press(&mut self, button: Button, model: &mut PlaylistCollection, now: Millis) {
        match button {
            b if b.is_menu_toggle() => self.exit(model, now),
            b if b.is_back() => match self.browsed {
                None => self.exit(model, now),
                Some(_) => self.browsed = None,
            },
            b if b.is_confirm() => match self.browsed {
                None => {
                    tracing::info!("Entering playlist #{}", self.playlist_cursor);
                    self.browsed = Some(self.playlist_cursor);
                    self.entry_cursor = 0;
                }
                Some(playlist) => self.commit(playlist, model, now),
            },
            Button::BumperLeft => {
                let cursor = self.cursor_mut();
                *cursor = cursor.saturating_sub(1);
            }
            Button::BumperRight => {
                let last = self.cursor_len(model).saturating_sub(1);
                let cursor = self.cursor_mut();
                *cursor = (*cursor + 1).min(last);
            }
            _ => {}
        }
        tracing::debug!(
            "Menu at playlist {:?}, cursors {}/{}",
            self.browsed,
            self.playlist_cursor,
            self.entry_cursor
        );
    }

    fn cursor_mut(&mut self) -> &mut usize {
        match self.browsed {
            None => &mut self.playlist_cursor,
            Some(_) => &mut self.entry_cursor,
        }
    }

    fn cursor_len(&self, model: &PlaylistCollection) -> usize {
        match self.browsed {
            None => model.len(),
            Some(index) => model.playlist(index).map_or(0, |p| p.len()),
        }
    }

    /// Open the menu at the root, on the active playlist, and freeze it.
    pub fn enter(&mut self, model: &mut PlaylistCollection, now: Millis) {
        tracing::info!("Entering menu");
        self.active = true;
        self.browsed = None;

        if let Some(active) = model.active_index() {
            self.playlist_cursor = active;
            if let Some(playlist) = model.active_playlist_mut() {
                self.entry_cursor = playlist.current_index().unwrap_or(0);
                playlist.pause(now);
            }
        }
    }

    /// Close the menu and unfreeze whatever is active.
    pub fn exit(&mut self, model: &mut PlaylistCollection, now: Millis) {
        tracing::info!("Leaving menu");
        self.active = false;
        self.browsed = None;
        if let Some(playlist) = model.active_playlist_mut() {
            playlist.resume(now);
        }
    }

    fn commit(&mut self, playlist: usize, model: &mut PlaylistCollection, now: Millis) {
        tracing::info!(
            "Choosing entry #{} in playlist #{}",
            self.entry_cursor,
            playlist
        );
        match model.select_playlist(playlist) {
            Ok(selected) => {
                selected.start_at(self.entry_cursor, now);
            }
            Err(e) => tracing::warn!("{}", e),
        }
        self.exit(model, now);
    }

    // ── Drawing ──────────────────────────────────────────────────────

    /// Draw the splash under the cursor plus a position bar on the bottom
    /// row. Returns `false` when the menu is closed and drew nothing.
    pub fn draw_frame(&self, model: &PlaylistCollection, canvas: &mut Canvas) -> bool {
        if !self.active {
            return false;
        }

        match self.browsed {
            None => {
                match model.playlist(self.playlist_cursor) {
                    Some(playlist) => playlist.draw_splash(canvas),
                    None => canvas.draw_unknown(),
                }
                draw_scrollbar(canvas, self.playlist_cursor, model.len());
            }
            Some(index) => {
                let playlist = model.playlist(index);
                match playlist.and_then(|p| p.entry(self.entry_cursor)) {
                    Some(entry) => {
                        entry.draw_splash(canvas);
                    }
                    None => canvas.draw_unknown(),
                }
                let total = playlist.map_or(0, |p| p.len());
                draw_scrollbar(canvas, self.entry_cursor, total);
            }
        }
        true
    }
}

/// Blank the bottom row and mark `position` out of `total` on it in yellow.
fn draw_scrollbar(canvas: &mut Canvas, position: usize, total: usize) {
    let width = canvas.width() as i32;
    let bottom = canvas.height() as i32 - 1;
    canvas.draw_line(0, bottom, width - 1, bottom, Color::BLACK);

    if total == 0 {
        return;
    }
    let per_entry = width as f32 / total as f32;
    let start = (per_entry * position as f32).floor() as i32;
    let end = (per_entry * position as f32 + per_entry).ceil() as i32;
    canvas.draw_line(start, bottom, end, bottom, Color::YELLOW);
}
