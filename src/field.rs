//! Static occupancy field derived from the map bitmap.

use std::path::Path;

use image::{DynamicImage, Rgba};
use tracing::debug;

use crate::error::FieldError;
use crate::geometry::Point;

/// Opaque white marks walls and boundaries on the map.
pub const OBSTACLE_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObstacleField {
    width: u32,
    height: u32,
    cells: Vec<bool>,
}

impl ObstacleField {
    pub fn from_fn(width: u32, height: u32, mut blocked: impl FnMut(u32, u32) -> bool) -> Self {
        let mut cells = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                cells.push(blocked(x, y));
            }
        }
        Self { width, height, cells }
    }

    /// Fully traversable field.
    pub fn open(width: u32, height: u32) -> Self {
        Self::from_fn(width, height, |_, _| false)
    }

    /// Traversable interior framed by a wall `thickness` pixels wide.
    pub fn with_border(width: u32, height: u32, thickness: u32) -> Self {
        Self::from_fn(width, height, |x, y| {
            x < thickness
                || y < thickness
                || x >= width.saturating_sub(thickness)
                || y >= height.saturating_sub(thickness)
        })
    }

    pub fn from_image(image: &DynamicImage) -> Result<Self, FieldError> {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(FieldError::Empty { width, height });
        }
        let field = Self::from_fn(width, height, |x, y| *rgba.get_pixel(x, y) == OBSTACLE_COLOR);
        debug!(width, height, obstacles = field.obstacle_count(), "obstacle field decoded");
        Ok(field)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, FieldError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| FieldError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        let image = image::load_from_memory(&bytes)?;
        Self::from_image(&image)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn obstacle_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// Raw pixel lookup. Callers must stay inside the field; anything outside
    /// reads as an obstacle.
    pub fn is_obstacle(&self, x: u32, y: u32) -> bool {
        debug_assert!(
            x < self.width && y < self.height,
            "query ({x}, {y}) outside {}x{} field",
            self.width,
            self.height
        );
        if x >= self.width || y >= self.height {
            return true;
        }
        self.cells[y as usize * self.width as usize + x as usize]
    }

    /// Pixel that a real-valued sample point falls on, clamped into the field.
    /// `None` when the field has no pixels at all.
    pub fn clamp(&self, point: Point) -> Option<(u32, u32)> {
        if self.is_degenerate() {
            return None;
        }
        let clamp_axis = |v: f64, len: u32| -> u32 {
            // `as` saturates, NaN maps to 0
            let v = v.trunc().max(0.0) as u64;
            v.min(u64::from(len - 1)) as u32
        };
        Some((clamp_axis(point.x, self.width), clamp_axis(point.y, self.height)))
    }

    /// Obstacle test for a sample point after clamping. A degenerate field
    /// counts every sample as a collision.
    pub fn sample(&self, point: Point) -> bool {
        match self.clamp(point) {
            Some((x, y)) => self.is_obstacle(x, y),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[test]
    fn only_opaque_white_blocks() {
        let mut img = RgbaImage::from_pixel(4, 3, Rgba([30, 120, 30, 255]));
        img.put_pixel(1, 1, OBSTACLE_COLOR);
        img.put_pixel(2, 1, Rgba([255, 255, 255, 254]));
        img.put_pixel(3, 2, Rgba([255, 255, 254, 255]));
        let field = ObstacleField::from_image(&DynamicImage::ImageRgba8(img)).unwrap();

        assert_eq!((field.width(), field.height()), (4, 3));
        assert!(field.is_obstacle(1, 1));
        assert!(!field.is_obstacle(2, 1));
        assert!(!field.is_obstacle(3, 2));
        assert_eq!(field.obstacle_count(), 1);
    }

    #[test]
    fn empty_image_is_rejected() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(0, 5));
        assert!(matches!(
            ObstacleField::from_image(&img),
            Err(FieldError::Empty { width: 0, height: 5 })
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ObstacleField::load("/definitely/not/here/map.png").unwrap_err();
        match err {
            FieldError::Load { path, .. } => assert!(path.ends_with("map.png")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn samples_are_clamped_into_bounds() {
        let field = ObstacleField::from_fn(10, 10, |x, y| x == 9 && y == 0);
        assert_eq!(field.clamp(Point::new(-4.2, 3.7)), Some((0, 3)));
        assert_eq!(field.clamp(Point::new(55.0, -1.0)), Some((9, 0)));
        assert!(field.sample(Point::new(120.0, -30.0)));
        assert!(!field.sample(Point::new(5.5, 5.5)));
    }

    #[test]
    fn degenerate_field_always_collides() {
        let field = ObstacleField::open(0, 0);
        assert!(field.is_degenerate());
        assert_eq!(field.clamp(Point::new(0.0, 0.0)), None);
        assert!(field.sample(Point::new(0.0, 0.0)));
    }

    #[test]
    fn border_frames_the_interior() {
        let field = ObstacleField::with_border(20, 10, 2);
        assert!(field.is_obstacle(0, 5));
        assert!(field.is_obstacle(1, 5));
        assert!(field.is_obstacle(18, 5));
        assert!(field.is_obstacle(10, 9));
        assert!(!field.is_obstacle(2, 2));
        assert!(!field.is_obstacle(17, 7));
    }
}
