//! Sensor-driven cars on a bitmap track, evaluated generation by generation
//! for neuro-evolution.

pub mod agent;
pub mod config;
pub mod draw;
pub mod episode;
pub mod error;
pub mod evolution;
pub mod field;
pub mod geometry;
pub mod policy;

pub use agent::{Car, Observation, SENSOR_COUNT, SENSOR_SWEEP, SensorReading};
pub use config::{CarParams, EvolutionConfig, RunConfig, SensorParams, SimConfig, StartPolicy};
pub use episode::{Episode, EpisodeReport, StepStatus, Termination};
pub use error::{CheckpointError, ConfigError, EpisodeError, FieldError, PolicyError};
pub use field::ObstacleField;
pub use geometry::Point;
pub use policy::{Action, FixedPolicy, FnPolicy, PolicyAdapter, select_action};
