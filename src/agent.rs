//! A single simulated car: pose, kinematics, collision and ray sensors.

use serde::Serialize;

use crate::config::{CarParams, SensorParams};
use crate::field::ObstacleField;
use crate::geometry::{Point, corner_points, wrap_degrees};
use crate::policy::Action;

pub const SENSOR_COUNT: usize = 5;
/// Ray angles relative to the heading, in the order the policy reads them.
pub const SENSOR_SWEEP: [f64; SENSOR_COUNT] = [-90.0, -45.0, 0.0, 45.0, 90.0];

/// Normalized sensor vector handed to a policy.
pub type Observation = [u32; SENSOR_COUNT];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorReading {
    /// Angle relative to the heading.
    pub angle: f64,
    /// Last pixel the ray reached.
    pub impact: Point,
    /// Center-to-impact distance, never above the sensor range.
    pub distance: f64,
    /// An obstacle stopped the ray short of its range.
    pub hit: bool,
}

/// Walks a ray out of `origin` one length unit at a time until it lands on an
/// obstacle pixel or reaches `max_range`.
pub fn cast_ray(field: &ObstacleField, origin: Point, heading: f64, angle: f64, max_range: u32) -> SensorReading {
    let direction = heading + angle;
    let mut len = 0;
    let mut impact = origin.project(direction, 0.0).truncated();
    let mut hit = field.sample(impact);
    while !hit && len < max_range {
        len += 1;
        impact = origin.project(direction, f64::from(len)).truncated();
        hit = field.sample(impact);
    }
    let range = f64::from(max_range);
    let distance = impact.distance(origin).min(range);
    SensorReading {
        angle,
        impact,
        distance,
        // a reading at full range counts as clear
        hit: hit && distance < range,
    }
}

#[derive(Debug, Clone)]
pub struct Car {
    params: CarParams,
    sensor_params: SensorParams,
    pos: Point,
    heading: f64,
    center: Point,
    corners: [Point; 4],
    readings: Vec<SensorReading>,
    distance: f64,
    steps: u64,
    alive: bool,
    goal_reached: bool,
}

impl Car {
    /// New car with its sprite box at `pos`, heading 0.
    pub fn new(pos: Point, params: CarParams, sensor_params: SensorParams) -> Self {
        let mut car = Self {
            params,
            sensor_params,
            pos,
            heading: 0.0,
            center: Point::default(),
            corners: [Point::default(); 4],
            readings: Vec::with_capacity(SENSOR_COUNT),
            distance: 0.0,
            steps: 0,
            alive: true,
            goal_reached: false,
        };
        car.refresh_body();
        car
    }

    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = wrap_degrees(heading);
        self.refresh_body();
        self
    }

    pub fn steer(&mut self, action: Action) {
        let delta = match action {
            Action::SteerLeft => self.params.steer_step,
            Action::SteerRight => -self.params.steer_step,
        };
        self.heading = wrap_degrees(self.heading + delta);
    }

    /// Moves one step along the heading, keeps the sprite box inside the
    /// field and refreshes the collision corners. Dead cars do not move.
    pub fn advance(&mut self, field: &ObstacleField) {
        if !self.alive {
            return;
        }
        let speed = self.params.speed;
        let next = self.pos.project(self.heading, speed);
        let inset = self.params.body_size + self.params.margin;
        self.pos = Point::new(
            clamp_axis(next.x, self.params.margin, f64::from(field.width()) - inset),
            clamp_axis(next.y, self.params.margin, f64::from(field.height()) - inset),
        );
        self.distance += speed;
        self.steps += 1;
        self.refresh_body();
    }

    /// Kills the car if any body corner sits on an obstacle. Returns whether
    /// the car is still alive.
    pub fn check_collision(&mut self, field: &ObstacleField) -> bool {
        if self.alive && self.corners.iter().any(|&c| field.sample(c)) {
            self.alive = false;
        }
        self.alive
    }

    /// Replaces all sensor readings with fresh ray casts over the sweep.
    pub fn scan(&mut self, field: &ObstacleField) {
        self.readings.clear();
        for angle in SENSOR_SWEEP {
            self.readings.push(cast_ray(
                field,
                self.center,
                self.heading,
                angle,
                self.sensor_params.max_range,
            ));
        }
    }

    /// Sensor distances integer-divided by the configured divisor, in sweep
    /// order. Slots without a reading yet are zero.
    pub fn normalized_observation(&self) -> Observation {
        let mut observation = [0; SENSOR_COUNT];
        for (slot, reading) in observation.iter_mut().zip(&self.readings) {
            *slot = reading.distance as u32 / self.sensor_params.divisor;
        }
        observation
    }

    pub fn reward(&self) -> f64 {
        self.distance / self.params.reward_scale
    }

    pub fn pos(&self) -> Point {
        self.pos
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn center(&self) -> Point {
        self.center
    }

    pub fn corners(&self) -> &[Point; 4] {
        &self.corners
    }

    pub fn readings(&self) -> &[SensorReading] {
        &self.readings
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn goal_reached(&self) -> bool {
        self.goal_reached
    }

    fn refresh_body(&mut self) {
        let half = self.params.body_size / 2.0;
        let base = self.pos.truncated();
        self.center = Point::new(base.x + half, base.y + half);
        self.corners = corner_points(
            self.center,
            self.heading,
            self.params.corner_radius,
            &self.params.corner_offsets,
        );
    }
}

// Lower bound wins when the field is too small for the sprite box.
fn clamp_axis(value: f64, lo: f64, hi: f64) -> f64 {
    value.min(hi).max(lo)
}
