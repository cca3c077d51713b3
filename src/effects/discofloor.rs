use super::config_u32;
use crate::canvas::Canvas;
use crate::effect::{Effect, EffectConfig};
use crate::error::EffectError;
use crate::input::{Button, InputEvent};
use crate::Color;

const ALL_COLOURS: &[Color] = &[
    Color::RED,
    Color::new(0, 0xFF, 0),
    Color::BLUE,
    Color::new(0, 0xFF, 0xFF),
    Color::new(0xFF, 0, 0xFF),
    Color::YELLOW,
    Color::WHITE,
];
const PRIMARY_COLOURS: &[Color] = &[Color::RED, Color::new(0, 0xFF, 0), Color::BLUE];

const DEFAULT_TILE: u32 = 2;
const MAX_TILE: u32 = 6;
const DEFAULT_PERIOD: u32 = 12;
const MAX_PERIOD: u32 = 50;

/// Classic light-up floor: square tiles that all change colour on the beat.
///
/// Pads can change it live: bumpers resize tiles, A/B pick the palette and
/// X/Y speed the beat up or slow it down.
#[derive(Debug)]
pub struct DiscoFloor {
    tile: u32,
    /// Frames between colour changes.
    period: u32,
    palette: &'static [Color],
    frame: u32,
    seed: u32,
    colours: Vec<Color>,
}

impl Default for DiscoFloor {
    fn default() -> Self {
        Self {
            tile: DEFAULT_TILE,
            period: DEFAULT_PERIOD,
            palette: ALL_COLOURS,
            frame: 0,
            seed: 0x2545_F491,
            colours: Vec::new(),
        }
    }
}

impl DiscoFloor {
    /// xorshift32; good enough to pick party colours.
    fn next_random(&mut self) -> u32 {
        let mut x = self.seed;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.seed = x;
        x
    }

    fn regenerate(&mut self, count: usize) {
        self.colours = (0..count)
            .map(|_| {
                let pick = self.next_random() as usize % self.palette.len();
                self.palette[pick]
            })
            .collect();
    }

    fn paint(&self, canvas: &mut Canvas) {
        let across = canvas.width().div_ceil(self.tile) as usize;
        for y in 0..canvas.height() {
            for x in 0..canvas.width() {
                let tile = (y / self.tile) as usize * across + (x / self.tile) as usize;
                let colour = self.colours.get(tile).copied().unwrap_or(Color::BLACK);
                canvas.set_pixel(x as i32, y as i32, colour);
            }
        }
    }

    fn tile_count(&self, canvas: &Canvas) -> usize {
        (canvas.width().div_ceil(self.tile) * canvas.height().div_ceil(self.tile)) as usize
    }
}

impl Effect for DiscoFloor {
    fn configure(&mut self, config: &EffectConfig) -> Result<(), EffectError> {
        self.tile = config_u32(config, "tile")
            .unwrap_or(DEFAULT_TILE)
            .clamp(1, MAX_TILE);
        self.period = config_u32(config, "period")
            .unwrap_or(DEFAULT_PERIOD)
            .clamp(1, MAX_PERIOD);
        self.frame = 0;
        self.colours.clear();
        Ok(())
    }

    fn handle_event(&mut self, event: InputEvent) -> Option<InputEvent> {
        match event.pressed() {
            Some(Button::BumperLeft) => self.tile = (self.tile - 1).max(1),
            Some(Button::BumperRight) => self.tile = (self.tile + 1).min(MAX_TILE),
            Some(Button::A) => self.palette = ALL_COLOURS,
            Some(Button::B) => self.palette = PRIMARY_COLOURS,
            Some(Button::X) => self.period = (self.period - 1).max(1),
            Some(Button::Y) => self.period = (self.period + 1).min(MAX_PERIOD),
            _ => return Some(event),
        }
        self.colours.clear();
        None
    }

    fn draw_frame(&mut self, canvas: &mut Canvas) -> Result<bool, EffectError> {
        let count = self.tile_count(canvas);
        if self.frame % self.period == 0 || self.colours.len() != count {
            self.regenerate(count);
        }
        self.frame = self.frame.wrapping_add(1);
        self.paint(canvas);
        Ok(true)
    }

    fn draw_splash(&self, canvas: &mut Canvas) -> Result<bool, EffectError> {
        let (w, h) = (canvas.width(), canvas.height());
        for y in 0..h {
            for x in 0..w {
                let colour = ALL_COLOURS[((x / 3 + y / 3) as usize) % ALL_COLOURS.len()];
                canvas.set_pixel(x as i32, y as i32, colour);
            }
        }
        Ok(true)
    }
}
