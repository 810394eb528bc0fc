//! Headless RGBA rasterizer for the field, the cars and their sensor rays.

use std::path::Path;

use image::{ColorType, ImageFormat};

use crate::agent::Car;
use crate::field::ObstacleField;
use crate::geometry::Point;

pub type Rgba = (u8, u8, u8, u8);

pub const TRACK: Rgba = (40, 40, 48, 255);
pub const WALL: Rgba = (255, 255, 255, 255);
pub const BODY: Rgba = (230, 170, 40, 255);
pub const RADAR: Rgba = (0, 255, 0, 255);
pub const HUD_TEXT: Rgba = (230, 230, 230, 255);

const GLYPH_WIDTH: i64 = 5;
const GLYPH_HEIGHT: i64 = 7;

pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        let p = &self.pixels[idx..idx + 4];
        Some((p[0], p[1], p[2], p[3]))
    }

    pub fn clear(&mut self, (r, g, b, a): Rgba) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&[r, g, b, a]);
        }
    }

    /// Alpha-blends onto the frame; off-frame writes are dropped.
    pub fn blend_pixel(&mut self, x: i64, y: i64, (r, g, b, a): Rgba) {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        let alpha = u16::from(a);
        let inv = 255 - alpha;
        for (dst, src) in self.pixels[idx..idx + 3].iter_mut().zip([r, g, b]) {
            *dst = ((u16::from(src) * alpha + u16::from(*dst) * inv) / 255) as u8;
        }
        self.pixels[idx + 3] = 255;
    }

    pub fn draw_line(&mut self, from: Point, to: Point, color: Rgba) {
        let (mut x0, mut y0) = (from.x as i64, from.y as i64);
        let (x1, y1) = (to.x as i64, to.y as i64);
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.blend_pixel(x0, y0, color);
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    pub fn fill_circle(&mut self, center: Point, radius: i64, color: Rgba) {
        let (cx, cy) = (center.x as i64, center.y as i64);
        for y in -radius..=radius {
            for x in -radius..=radius {
                if x * x + y * y <= radius * radius {
                    self.blend_pixel(cx + x, cy + y, color);
                }
            }
        }
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<(), image::ImageError> {
        image::save_buffer_with_format(
            path,
            &self.pixels,
            self.width,
            self.height,
            ColorType::Rgba8,
            ImageFormat::Png,
        )
    }
}

pub fn draw_field(frame: &mut Frame, field: &ObstacleField) {
    frame.clear(TRACK);
    let width = frame.width.min(field.width());
    let height = frame.height.min(field.height());
    for y in 0..height {
        for x in 0..width {
            if field.is_obstacle(x, y) {
                frame.blend_pixel(i64::from(x), i64::from(y), WALL);
            }
        }
    }
}

/// Body outline through the collision corners plus one line and impact dot
/// per sensor reading.
pub fn draw_car(frame: &mut Frame, car: &Car) {
    let corners = car.corners();
    // corners are stored at heading offsets 30, 150, 210, 330
    for (a, b) in [(0, 1), (1, 2), (2, 3), (3, 0)] {
        frame.draw_line(corners[a], corners[b], BODY);
    }
    for reading in car.readings() {
        frame.draw_line(car.center(), reading.impact, RADAR);
        frame.fill_circle(reading.impact, 5, RADAR);
    }
}

/// Field plus the given cars, dead or alive.
pub fn render<'a>(field: &ObstacleField, cars: impl IntoIterator<Item = &'a Car>) -> Frame {
    let mut frame = Frame::new(field.width(), field.height());
    draw_field(&mut frame, field);
    for car in cars {
        draw_car(&mut frame, car);
    }
    frame
}

/// 5x7 bitmap rows, most significant of the low five bits on the left.
fn glyph(ch: char) -> Option<[u8; 7]> {
    let rows = match ch.to_ascii_uppercase() {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'E' => [0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b11111],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01110],
        'I' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        ':' => [0b00000, 0b00100, 0b00000, 0b00000, 0b00100, 0b00000, 0b00000],
        ' ' => [0; 7],
        _ => return None,
    };
    Some(rows)
}

/// Pixel width of `text` at `scale`, without a trailing gap.
pub fn text_width(text: &str, scale: u32) -> i64 {
    let chars = text.chars().count() as i64;
    let scale = i64::from(scale);
    (chars * (GLYPH_WIDTH + 1) * scale - scale).max(0)
}

/// Draws `text` with its top-left corner at (x, y). Characters without a
/// glyph leave a blank cell.
pub fn draw_text(frame: &mut Frame, text: &str, x: i64, y: i64, scale: u32, color: Rgba) {
    let scale = i64::from(scale);
    let mut left = x;
    for ch in text.chars() {
        if let Some(rows) = glyph(ch) {
            for (row, bits) in (0..).zip(rows) {
                for col in 0..GLYPH_WIDTH {
                    if bits >> (GLYPH_WIDTH - 1 - col) & 1 == 0 {
                        continue;
                    }
                    for sy in 0..scale {
                        for sx in 0..scale {
                            frame.blend_pixel(left + col * scale + sx, y + row * scale + sy, color);
                        }
                    }
                }
            }
        }
        left += (GLYPH_WIDTH + 1) * scale;
    }
}

fn draw_text_centered(frame: &mut Frame, text: &str, center_y: i64, scale: u32, color: Rgba) {
    let x = (i64::from(frame.width) - text_width(text, scale)) / 2;
    let y = center_y - GLYPH_HEIGHT * i64::from(scale) / 2;
    draw_text(frame, text, x, y, scale, color);
}

/// Generation counter and live-car count, centered near the top.
pub fn draw_hud(frame: &mut Frame, generation: u64, alive: usize) {
    draw_text_centered(frame, &format!("Generation : {generation}"), 100, 4, RADAR);
    draw_text_centered(frame, &format!("Remaining cars : {alive}"), 200, 2, HUD_TEXT);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CarParams, SensorParams};

    #[test]
    fn walls_are_painted_white() {
        let field = ObstacleField::with_border(30, 20, 2);
        let frame = render(&field, std::iter::empty());
        assert_eq!(frame.pixel(0, 0), Some(WALL));
        assert_eq!(frame.pixel(15, 10), Some(TRACK));
        assert_eq!(frame.pixel(30, 0), None);
    }

    #[test]
    fn car_and_radar_are_drawn() {
        let field = ObstacleField::from_fn(600, 600, |x, _| x >= 450);
        let mut car = Car::new(Point::new(200.0, 200.0), CarParams::default(), SensorParams::default());
        car.scan(&field);
        let frame = render(&field, [&car]);

        // ray straight ahead ends on the wall near (450, 250)
        assert_eq!(frame.pixel(300, 250), Some(RADAR));
        assert_eq!(frame.pixel(450, 250), Some(RADAR));
        let corner = car.corners()[0];
        assert_eq!(frame.pixel(corner.x as u32, corner.y as u32), Some(BODY));
    }

    #[test]
    fn live_filter_is_up_to_the_caller() {
        let field = ObstacleField::from_fn(400, 400, |_, _| true);
        let mut car = Car::new(Point::new(100.0, 100.0), CarParams::default(), SensorParams::default());
        car.check_collision(&field);
        let frame = render(&field, [&car].into_iter().filter(|c| c.is_alive()));
        assert!(frame.pixels().chunks_exact(4).all(|p| p == [255, 255, 255, 255]));
    }

    #[test]
    fn text_follows_glyph_bits() {
        let mut frame = Frame::new(20, 10);
        frame.clear((0, 0, 0, 255));
        draw_text(&mut frame, "1?1", 0, 0, 1, HUD_TEXT);
        // '1' tops out in its middle column and has a three-wide foot
        assert_eq!(frame.pixel(2, 0), Some(HUD_TEXT));
        assert_eq!(frame.pixel(0, 0), Some((0, 0, 0, 255)));
        for x in 1..=3 {
            assert_eq!(frame.pixel(x, 6), Some(HUD_TEXT));
        }
        // unknown glyph leaves its cell blank, the next '1' starts at x = 12
        assert!((6..12).all(|x| (0..7).all(|y| frame.pixel(x, y) == Some((0, 0, 0, 255)))));
        assert_eq!(frame.pixel(14, 0), Some(HUD_TEXT));
        assert_eq!(text_width("1?1", 1), 17);
        assert_eq!(text_width("", 3), 0);
    }

    #[test]
    fn hud_shows_generation_and_survivors() {
        let field = ObstacleField::open(600, 300);
        let mut frame = render(&field, std::iter::empty());
        draw_hud(&mut frame, 12, 3);

        let count_in_rows = |rows: std::ops::Range<u32>, color: Rgba| {
            rows.flat_map(|y| (0..600).map(move |x| (x, y)))
                .filter(|&(x, y)| frame.pixel(x, y) == Some(color))
                .count()
        };
        // 4x glyphs are 28px tall around y = 100, 2x glyphs 14px around y = 200
        assert!(count_in_rows(86..114, RADAR) > 0);
        assert_eq!(count_in_rows(0..86, RADAR) + count_in_rows(114..300, RADAR), 0);
        assert!(count_in_rows(193..207, HUD_TEXT) > 0);
        assert_eq!(count_in_rows(0..193, HUD_TEXT), 0);

        // text is centered horizontally
        let columns: Vec<u32> = (0..600)
            .filter(|&x| (86..114).any(|y| frame.pixel(x, y) == Some(RADAR)))
            .collect();
        let (first, last) = (columns[0], columns[columns.len() - 1]);
        assert!((i64::from(first) - (599 - i64::from(last))).abs() <= 4);
    }

    #[test]
    fn blending_mixes_colors() {
        let mut frame = Frame::new(2, 1);
        frame.clear((0, 0, 0, 255));
        frame.blend_pixel(0, 0, (255, 255, 255, 51));
        frame.blend_pixel(-1, 0, WALL);
        assert_eq!(frame.pixel(0, 0), Some((51, 51, 51, 255)));
        assert_eq!(frame.pixel(1, 0), Some((0, 0, 0, 255)));
    }
}
