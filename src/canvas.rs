//! In-memory pixel grid the effects draw into.
//!
//! Only the primitives the scheduler itself needs live here: fills, single
//! pixels, straight lines, and the two fixed indicator frames the menu and
//! show loop fall back on when an effect misbehaves.

use crate::{Color, FloorSize};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<Color>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color::BLACK; (width * height) as usize],
        }
    }

    pub fn for_floor(floor: FloorSize) -> Self {
        Self::new(floor.cols, floor.rows)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn fill(&mut self, color: Color) {
        self.pixels.fill(color);
    }

    /// Set one pixel. Coordinates outside the canvas are ignored.
    pub fn set_pixel(&mut self, x: i32, y: i32, color: Color) {
        if let Some(idx) = self.index(x, y) {
            self.pixels[idx] = color;
        }
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<Color> {
        self.index(x, y).map(|idx| self.pixels[idx])
    }

    /// Bresenham line, both endpoints inclusive.
    pub fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: Color) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let (mut x, mut y) = (x0, y0);

        loop {
            self.set_pixel(x, y, color);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Red background with a white cross: shown in place of a failed effect.
    pub fn draw_error(&mut self) {
        self.fill(Color::RED);
        let (w, h) = (self.width as i32, self.height as i32);
        let size = w.min(h) / 3;
        let (cx, cy) = (w / 2, h / 2);
        self.draw_line(cx - size, cy - size, cx + size, cy + size, Color::WHITE);
        self.draw_line(cx - size, cy + size, cx + size, cy - size, Color::WHITE);
    }

    /// Black background with a red marker: an effect with no splash.
    pub fn draw_unknown(&mut self) {
        self.fill(Color::BLACK);
        let (cx, cy) = (self.width as i32 / 2, self.height as i32 / 2);
        self.draw_line(cx - 1, cy - 2, cx + 1, cy - 2, Color::RED);
        self.draw_line(cx + 1, cy - 2, cx + 1, cy, Color::RED);
        self.draw_line(cx, cy, cx + 1, cy, Color::RED);
        self.set_pixel(cx, cy + 2, Color::RED);
    }

    /// Flatten into row-major RGB bytes with brightness (0-100) applied.
    pub fn to_rgb_bytes(&self, brightness: u8) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 3);
        for pixel in &self.pixels {
            let c = pixel.apply_brightness(brightness);
            bytes.extend_from_slice(&[c.r, c.g, c.b]);
        }
        bytes
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        Some((y as u32 * self.width + x as u32) as usize)
    }
}
