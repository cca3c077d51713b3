//! Playlist and scheduling engine for an interactive LED dance floor.
//!
//! This crate decides, frame by frame, which visual effect is showing on the
//! floor. The pieces, leaf to root:
//! - [`handle::EffectHandle`]: one effect instance plus its configuration
//! - [`playlist::Playlist`]: an ordered, time-driven sequence of handles
//! - [`model::PlaylistCollection`]: the all-effects playlist plus user playlists
//! - [`menu::Menu`]: controller-driven browsing that pauses and commits
//! - [`live`]: a dedicated playlist that grows while the show runs
//!
//! The [`show`] module wraps these in the control loop, and [`server`]
//! exposes an HTTP surface for status, input, and live requests.

pub mod canvas;
pub mod catalog;
pub mod effect;
pub mod effects;
pub mod error;
pub mod handle;
pub mod input;
pub mod live;
pub mod menu;
pub mod model;
pub mod playlist;
pub mod server;
pub mod show;

pub use error::{FloorError, Result};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Monotonic timestamp in milliseconds, sampled once per loop tick and
/// passed explicitly to everything that cares about time.
pub type Millis = u64;

// ── Floor configuration ────────────────────────────────────────────

/// Dimensions of the dance floor in cells.
///
/// # Rust concept: derive macros
/// `Clone, Copy` make this cheaply copyable (it's just two u32s).
/// Configuration is passed explicitly through the system rather than read
/// from global state, so every component can be built in a test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FloorSize {
    pub rows: u32,
    pub cols: u32,
}

impl FloorSize {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self { rows, cols }
    }

    /// Total number of cells on the floor.
    pub fn pixel_count(&self) -> u32 {
        self.rows * self.cols
    }

    /// Number of bytes needed for a raw RGB frame (3 bytes per cell).
    pub fn frame_byte_count(&self) -> usize {
        (self.rows * self.cols * 3) as usize
    }
}

impl Default for FloorSize {
    /// A single stock floor module: 24 cells wide, 18 deep.
    fn default() -> Self {
        Self { rows: 18, cols: 24 }
    }
}

// ── Color ──────────────────────────────────────────────────────────

/// RGB colour of a single floor cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(0xFF, 0xFF, 0xFF);
    pub const RED: Self = Self::new(0xFF, 0, 0);
    pub const YELLOW: Self = Self::new(0xFF, 0xFF, 0);
    pub const BLUE: Self = Self::new(0, 0, 0xFF);
    pub const GREY: Self = Self::new(0x80, 0x80, 0x80);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Create a color from a hue value (0-360), with full saturation and brightness.
    ///
    /// # Rust concept: match expressions
    /// Rust's `match` is exhaustive, so the compiler ensures we handle all cases.
    pub fn from_hue(hue: u16) -> Self {
        let hue = hue % 360;
        let sector = hue / 60;
        let fraction = ((hue % 60) as f32) / 60.0;
        let rising = (fraction * 255.0) as u8;
        let falling = ((1.0 - fraction) * 255.0) as u8;

        match sector {
            0 => Self::new(255, rising, 0),  // Red → Yellow
            1 => Self::new(falling, 255, 0), // Yellow → Green
            2 => Self::new(0, 255, rising),  // Green → Cyan
            3 => Self::new(0, falling, 255), // Cyan → Blue
            4 => Self::new(rising, 0, 255),  // Blue → Magenta
            5 => Self::new(255, 0, falling), // Magenta → Red
            _ => Self::new(255, 0, 0),
        }
    }

    /// Apply brightness scaling (0-100) to this color.
    pub fn apply_brightness(self, brightness: u8) -> Self {
        if brightness >= 100 {
            return self;
        }
        Self {
            r: ((self.r as u16 * brightness as u16) / 100) as u8,
            g: ((self.g as u16 * brightness as u16) / 100) as u8,
            b: ((self.b as u16 * brightness as u16) / 100) as u8,
        }
    }
}

// ── Shutdown signalling ────────────────────────────────────────────

/// Set up a Ctrl+C handler that sets `running` to false.
///
/// # Rust concept: Arc and AtomicBool
/// The flag is shared between the control loop thread, the HTTP server's
/// shutdown future, and the signal handler. `AtomicBool` is a thread-safe
/// boolean, so no mutex is needed for a single bool.
pub fn setup_signal_handler() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .map_err(|e| FloorError::Signal(e.to_string()))?;

    Ok(running)
}

/// Check if the show should keep running.
pub fn is_running(running: &AtomicBool) -> bool {
    running.load(Ordering::SeqCst)
}

/// Ask everything watching `running` to wind down.
pub fn request_shutdown(running: &AtomicBool) {
    running.store(false, Ordering::SeqCst);
}

// ── Tests ──────────────────────────────────────────────────────────
