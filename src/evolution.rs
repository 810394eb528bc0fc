//! Small neuro-evolution driver: feed-forward policies, one elite parent and
//! mutated copies of it every generation.

use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::agent::{Observation, SENSOR_COUNT};
use crate::config::{EvolutionConfig, SimConfig};
use crate::episode::{Episode, EpisodeReport};
use crate::error::{CheckpointError, EpisodeError};
use crate::field::ObstacleField;
use crate::policy::{Action, PolicyAdapter};

/// One hidden tanh layer between the sensor slots and the action scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedForwardPolicy {
    hidden: usize,
    w_in: Vec<f32>,
    b_in: Vec<f32>,
    w_out: Vec<f32>,
    b_out: Vec<f32>,
}

impl FeedForwardPolicy {
    pub fn random<R: Rng>(rng: &mut R, hidden: usize) -> Self {
        let mut sample = |n: usize| (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect::<Vec<f32>>();
        Self {
            hidden,
            w_in: sample(hidden * SENSOR_COUNT),
            b_in: sample(hidden),
            w_out: sample(Action::ALL.len() * hidden),
            b_out: sample(Action::ALL.len()),
        }
    }

    pub fn mutate<R: Rng>(&mut self, rng: &mut R, sigma: f32) {
        if sigma <= 0.0 {
            return;
        }
        for v in self
            .w_in
            .iter_mut()
            .chain(&mut self.b_in)
            .chain(&mut self.w_out)
            .chain(&mut self.b_out)
        {
            *v += rng.gen_range(-sigma..sigma);
        }
    }

    pub fn hidden(&self) -> usize {
        self.hidden
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CheckpointError> {
        let bytes = bincode::serde::encode_to_vec(self, bincode::config::standard())?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CheckpointError> {
        let bytes = std::fs::read(path)?;
        let (policy, _) = bincode::serde::decode_from_slice(&bytes, bincode::config::standard())?;
        Ok(policy)
    }
}

impl PolicyAdapter for FeedForwardPolicy {
    fn scores(&mut self, observation: &Observation) -> Vec<f32> {
        let hidden: Vec<f32> = (0..self.hidden)
            .map(|h| {
                let row = &self.w_in[h * SENSOR_COUNT..(h + 1) * SENSOR_COUNT];
                let sum: f32 = row
                    .iter()
                    .zip(observation)
                    .map(|(w, &x)| w * x as f32)
                    .sum();
                (sum + self.b_in[h]).tanh()
            })
            .collect();
        (0..Action::ALL.len())
            .map(|o| {
                let row = &self.w_out[o * self.hidden..(o + 1) * self.hidden];
                let sum: f32 = row.iter().zip(&hidden).map(|(w, x)| w * x).sum();
                sum + self.b_out[o]
            })
            .collect()
    }
}

/// Keeps the population between generations and owns the generation counter.
pub struct Population {
    members: Vec<FeedForwardPolicy>,
    generation: u64,
    sigma: f32,
    best_history: Vec<f64>,
    best_fitness: f64,
    champion: Option<FeedForwardPolicy>,
}

impl Population {
    pub fn new<R: Rng>(rng: &mut R, config: &EvolutionConfig) -> Self {
        let members = (0..config.population)
            .map(|_| FeedForwardPolicy::random(rng, config.hidden))
            .collect();
        Self {
            members,
            generation: 0,
            sigma: config.mutation_sigma,
            best_history: Vec::new(),
            best_fitness: f64::NEG_INFINITY,
            champion: None,
        }
    }

    pub fn from_members(members: Vec<FeedForwardPolicy>, sigma: f32) -> Self {
        Self {
            members,
            generation: 0,
            sigma,
            best_history: Vec::new(),
            best_fitness: f64::NEG_INFINITY,
            champion: None,
        }
    }

    /// Runs one episode for the current members and breeds the next
    /// generation from the result.
    pub fn run_generation<R: Rng>(
        &mut self,
        field: &ObstacleField,
        sim: &SimConfig,
        rng: &mut R,
    ) -> Result<EpisodeReport, EpisodeError> {
        self.generation += 1;
        let report = Episode::new(field, sim, self.generation, self.members.iter_mut()).run()?;
        if let Some((_, best)) = report.best() {
            info!(
                generation = self.generation,
                steps = report.steps,
                best,
                mean = report.mean(),
                termination = ?report.termination,
                "generation evaluated"
            );
        }
        self.reproduce(&report.fitness, rng);
        Ok(report)
    }

    /// Keeps the single best member and fills the rest with its mutated copies.
    pub fn reproduce<R: Rng>(&mut self, fitness: &[f64], rng: &mut R) {
        debug_assert_eq!(fitness.len(), self.members.len());
        let mut order: Vec<usize> = (0..self.members.len().min(fitness.len())).collect();
        order.sort_by(|&a, &b| fitness[b].total_cmp(&fitness[a]));
        let Some(&best_idx) = order.first() else {
            return;
        };
        let best = fitness[best_idx];
        self.best_history.push(best);
        let parent = self.members[best_idx].clone();
        if best > self.best_fitness {
            self.best_fitness = best;
            self.champion = Some(parent.clone());
        }

        let size = self.members.len();
        let mut next = Vec::with_capacity(size);
        next.push(parent.clone());
        while next.len() < size {
            let mut child = parent.clone();
            child.mutate(rng, self.sigma);
            next.push(child);
        }
        self.members = next;
        debug!(generation = self.generation, best, "population reproduced");
    }

    pub fn members(&self) -> &[FeedForwardPolicy] {
        &self.members
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Best fitness of every generation so far.
    pub fn best_history(&self) -> &[f64] {
        &self.best_history
    }

    /// Best policy seen over the whole run.
    pub fn champion(&self) -> Option<&FeedForwardPolicy> {
        self.champion.as_ref()
    }
}
