//! Simulation and driver settings, loadable from JSON.

use std::path::Path;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::geometry::Point;

/// Car geometry and motion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarParams {
    /// Forward distance covered every step.
    pub speed: f64,
    /// Side of the square sprite box; the center sits half of it past `pos`.
    pub body_size: f64,
    /// Gap kept between the sprite box and the field edge.
    pub margin: f64,
    pub corner_radius: f64,
    pub corner_offsets: [f64; 4],
    /// Heading change per steering action, degrees.
    pub steer_step: f64,
    /// Distance units per unit of reward.
    pub reward_scale: f64,
}

impl Default for CarParams {
    fn default() -> Self {
        Self {
            speed: 10.0,
            body_size: 100.0,
            margin: 20.0,
            corner_radius: 40.0,
            corner_offsets: [30.0, 150.0, 210.0, 330.0],
            steer_step: 10.0,
            reward_scale: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorParams {
    /// Longest ray, in length-counter steps.
    pub max_range: u32,
    /// Raw distances are integer-divided by this before reaching the policy.
    pub divisor: u32,
}

impl Default for SensorParams {
    fn default() -> Self {
        Self {
            max_range: 300,
            divisor: 5,
        }
    }
}

/// Where the cars of a generation are spawned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StartPolicy {
    /// Every car starts at the same point.
    Fixed { x: f64, y: f64 },
    /// Uniform positions inside the given ranges, reseeded every generation
    /// from `seed` and the generation number.
    Random {
        seed: u64,
        x: (f64, f64),
        y: (f64, f64),
    },
}

impl Default for StartPolicy {
    fn default() -> Self {
        Self::Fixed { x: 700.0, y: 650.0 }
    }
}

impl StartPolicy {
    pub fn positions(&self, count: usize, generation: u64) -> Vec<Point> {
        match *self {
            Self::Fixed { x, y } => vec![Point::new(x, y); count],
            Self::Random { seed, x, y } => {
                let mut rng = SmallRng::seed_from_u64(seed.wrapping_add(generation));
                (0..count)
                    .map(|_| Point::new(rng.gen_range(x.0..=x.1), rng.gen_range(y.0..=y.1)))
                    .collect()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SimConfig {
    pub car: CarParams,
    pub sensors: SensorParams,
    pub start: StartPolicy,
    /// Safety valve for runs whose cars never die.
    pub max_steps: Option<u64>,
    /// Advance the live cars of a step on the rayon pool.
    pub parallel: bool,
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let car = &self.car;
        if !(car.speed.is_finite() && car.speed >= 0.0) {
            return Err(ConfigError::Invalid("car.speed must be finite and non-negative"));
        }
        if !(car.body_size.is_finite() && car.body_size > 0.0) {
            return Err(ConfigError::Invalid("car.body_size must be positive"));
        }
        if !(car.margin.is_finite() && car.margin >= 0.0) {
            return Err(ConfigError::Invalid("car.margin must be non-negative"));
        }
        if !(car.corner_radius.is_finite() && car.corner_radius >= 0.0) {
            return Err(ConfigError::Invalid("car.corner_radius must be non-negative"));
        }
        if !car.steer_step.is_finite() {
            return Err(ConfigError::Invalid("car.steer_step must be finite"));
        }
        if !(car.reward_scale.is_finite() && car.reward_scale > 0.0) {
            return Err(ConfigError::Invalid("car.reward_scale must be positive"));
        }
        if self.sensors.divisor == 0 {
            return Err(ConfigError::Invalid("sensors.divisor must be non-zero"));
        }
        if self.max_steps == Some(0) {
            return Err(ConfigError::Invalid("max_steps must be positive when set"));
        }
        if let StartPolicy::Random { x, y, .. } = self.start {
            if !(x.0 <= x.1 && y.0 <= y.1) {
                return Err(ConfigError::Invalid("start ranges must be ordered (min, max)"));
            }
            if !(sampleable(x) && sampleable(y)) {
                return Err(ConfigError::Invalid("start ranges must be finite"));
            }
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

// The uniform sampler needs a finite width as well as finite bounds.
fn sampleable((lo, hi): (f64, f64)) -> bool {
    lo.is_finite() && hi.is_finite() && (hi - lo).is_finite()
}

/// Settings for the bundled evolutionary driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub population: usize,
    pub generations: u64,
    pub hidden: usize,
    pub mutation_sigma: f32,
    pub seed: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population: 30,
            generations: 50,
            hidden: 6,
            mutation_sigma: 0.25,
            seed: None,
        }
    }
}

impl EvolutionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population == 0 {
            return Err(ConfigError::Invalid("evolution.population must be non-zero"));
        }
        if self.hidden == 0 {
            return Err(ConfigError::Invalid("evolution.hidden must be non-zero"));
        }
        if !(self.mutation_sigma.is_finite() && self.mutation_sigma >= 0.0) {
            return Err(ConfigError::Invalid("evolution.mutation_sigma must be non-negative"));
        }
        Ok(())
    }
}

/// Top-level config file layout for the binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RunConfig {
    pub sim: SimConfig,
    pub evolution: EvolutionConfig,
}

impl RunConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sim.validate()?;
        self.evolution.validate()
    }
}
