use super::config_u32;
use crate::canvas::Canvas;
use crate::effect::{Effect, EffectConfig};
use crate::error::EffectError;
use crate::Color;

const DEFAULT_SPEED: u32 = 4;

/// Diagonal hue bands sweeping across the floor.
#[derive(Debug)]
pub struct Rainbow {
    /// Degrees of hue per frame.
    speed: u32,
    offset: u32,
    paused: bool,
}

impl Default for Rainbow {
    fn default() -> Self {
        Self {
            speed: DEFAULT_SPEED,
            offset: 0,
            paused: false,
        }
    }
}

impl Rainbow {
    fn paint(canvas: &mut Canvas, offset: u32) {
        let span = (canvas.width() + canvas.height()).max(1);
        for y in 0..canvas.height() {
            for x in 0..canvas.width() {
                let hue = offset + (x + y) * 360 / span;
                canvas.set_pixel(x as i32, y as i32, Color::from_hue((hue % 360) as u16));
            }
        }
    }
}

impl Effect for Rainbow {
    fn configure(&mut self, config: &EffectConfig) -> Result<(), EffectError> {
        self.speed = config_u32(config, "speed").unwrap_or(DEFAULT_SPEED);
        self.offset = 0;
        Ok(())
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn resume(&mut self) {
        self.paused = false;
    }

    fn stop(&mut self) {
        self.paused = false;
    }

    fn draw_frame(&mut self, canvas: &mut Canvas) -> Result<bool, EffectError> {
        Self::paint(canvas, self.offset);
        if !self.paused {
            self.offset = (self.offset + self.speed) % 360;
        }
        Ok(true)
    }

    fn draw_splash(&self, canvas: &mut Canvas) -> Result<bool, EffectError> {
        Self::paint(canvas, 0);
        Ok(true)
    }
}
