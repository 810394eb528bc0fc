//! Screen-space geometry shared by kinematics, sensing and drawing.
//!
//! Headings are in degrees and grow clockwise on screen: a heading `h`
//! points along `(cos(rad(360 - h)), sin(rad(360 - h)))` with y pointing down.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Point `len` units away along `heading`.
    pub fn project(self, heading: f64, len: f64) -> Point {
        let (dx, dy) = direction(heading);
        Point::new(self.x + dx * len, self.y + dy * len)
    }

    /// Drops the fractional part of both coordinates (toward zero).
    pub fn truncated(self) -> Point {
        Point::new(self.x.trunc(), self.y.trunc())
    }
}

/// Unit vector for a heading in degrees.
pub fn direction(heading: f64) -> (f64, f64) {
    let rad = (360.0 - heading).to_radians();
    (rad.cos(), rad.sin())
}

pub fn wrap_degrees(angle: f64) -> f64 {
    if angle.is_nan() {
        return 0.0;
    }
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Body corners sampled for collision, `radius` away from `center` at each
/// offset relative to `heading`.
pub fn corner_points(center: Point, heading: f64, radius: f64, offsets: &[f64; 4]) -> [Point; 4] {
    offsets.map(|offset| center.project(heading + offset, radius))
}
