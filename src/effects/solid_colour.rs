use crate::canvas::Canvas;
use crate::effect::{Effect, EffectConfig};
use crate::error::EffectError;
use crate::Color;
use serde_json::Value;

/// The whole floor in one colour, from `colour: [r, g, b]`.
#[derive(Debug)]
pub struct SolidColour {
    colour: Color,
}

impl Default for SolidColour {
    fn default() -> Self {
        Self {
            colour: Color::WHITE,
        }
    }
}

fn parse_colour(value: &Value) -> Result<Color, EffectError> {
    let channels: Vec<u8> = value
        .as_array()
        .ok_or_else(|| EffectError::msg(format!("colour must be [r, g, b], got {value}")))?
        .iter()
        .map(|c| c.as_u64().and_then(|c| u8::try_from(c).ok()))
        .collect::<Option<_>>()
        .ok_or_else(|| EffectError::msg(format!("colour channels must be 0-255, got {value}")))?;

    match channels[..] {
        [r, g, b] => Ok(Color::new(r, g, b)),
        _ => Err(EffectError::msg(format!("colour needs three channels, got {value}"))),
    }
}

impl Effect for SolidColour {
    fn configure(&mut self, config: &EffectConfig) -> Result<(), EffectError> {
        self.colour = match config.get("colour") {
            Some(value) => parse_colour(value)?,
            None => Color::WHITE,
        };
        Ok(())
    }

    fn draw_frame(&mut self, canvas: &mut Canvas) -> Result<bool, EffectError> {
        canvas.fill(self.colour);
        Ok(true)
    }

    fn draw_splash(&self, canvas: &mut Canvas) -> Result<bool, EffectError> {
        canvas.fill(Color::BLACK);
        let (w, h) = (canvas.width() as i32, canvas.height() as i32);
        for y in h / 4..h - h / 4 {
            canvas.draw_line(w / 4, y, w - w / 4 - 1, y, self.colour);
        }
        Ok(true)
    }
}
