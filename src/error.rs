use std::path::PathBuf;

use thiserror::Error;

/// Failures while building the obstacle field from a raster map.
#[derive(Debug, Error)]
pub enum FieldError {
    #[error("failed to read map image {path}")]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode map image")]
    Decode(#[from] image::ImageError),
    #[error("map image has no area ({width}x{height})")]
    Empty { width: u32, height: u32 },
}

/// Contract violations by an externally supplied policy.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PolicyError {
    #[error("policy returned {actual} scores, expected {expected}")]
    WrongCardinality { expected: usize, actual: usize },
    #[error("policy score {index} is not finite ({value})")]
    NonFiniteScore { index: usize, value: f32 },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EpisodeError {
    #[error("policy for agent {agent} violated its contract")]
    Policy {
        agent: usize,
        #[source]
        source: PolicyError,
    },
    #[error("population mismatch: {cars} cars but {policies} policies")]
    PopulationMismatch { cars: usize, policies: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
    #[error("failed to read config {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config")]
    Parse(#[from] serde_json::Error),
}

/// Saving or restoring a trained policy.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint i/o failed")]
    Io(#[from] std::io::Error),
    #[error("failed to encode checkpoint")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("failed to decode checkpoint")]
    Decode(#[from] bincode::error::DecodeError),
}
