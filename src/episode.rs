//! One generation: every car driven by its policy until none is left alive.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::agent::Car;
use crate::config::SimConfig;
use crate::error::{EpisodeError, PolicyError};
use crate::field::ObstacleField;
use crate::policy::{Action, PolicyAdapter, select_action};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    AllDead,
    /// The optional step ceiling was reached with cars still alive.
    StepLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Running { alive: usize },
    Terminated(Termination),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeReport {
    pub generation: u64,
    pub steps: u64,
    pub termination: Termination,
    /// Accumulated fitness per population member, in population order.
    pub fitness: Vec<f64>,
}

impl EpisodeReport {
    /// Index and fitness of the best member; the earliest one on ties.
    pub fn best(&self) -> Option<(usize, f64)> {
        self.fitness
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best, (i, f)| match best {
                Some((_, b)) if b >= f => best,
                _ => Some((i, f)),
            })
    }

    pub fn mean(&self) -> f64 {
        if self.fitness.is_empty() {
            return 0.0;
        }
        self.fitness.iter().sum::<f64>() / self.fitness.len() as f64
    }
}

struct Entrant<P> {
    car: Car,
    policy: P,
    fitness: f64,
}

impl<P: PolicyAdapter> Entrant<P> {
    /// Asks the policy for this step's action; dead cars are not consulted.
    fn decide(&mut self) -> Result<Option<Action>, PolicyError> {
        if !self.car.is_alive() {
            return Ok(None);
        }
        let observation = self.car.normalized_observation();
        select_action(&self.policy.scores(&observation)).map(Some)
    }

    fn apply(&mut self, action: Action, field: &ObstacleField) {
        self.car.steer(action);
        self.car.advance(field);
        self.car.check_collision(field);
        self.car.scan(field);
        self.fitness += self.car.reward();
    }
}

pub struct Episode<'a, P> {
    field: &'a ObstacleField,
    entrants: Vec<Entrant<P>>,
    generation: u64,
    steps: u64,
    max_steps: Option<u64>,
    parallel: bool,
    termination: Option<Termination>,
    aborted: Option<EpisodeError>,
}

impl<'a, P: PolicyAdapter> Episode<'a, P> {
    /// Spawns one fresh car per policy at the configured start positions.
    pub fn new(
        field: &'a ObstacleField,
        config: &SimConfig,
        generation: u64,
        policies: impl IntoIterator<Item = P>,
    ) -> Self {
        let policies: Vec<P> = policies.into_iter().collect();
        let cars = config
            .start
            .positions(policies.len(), generation)
            .into_iter()
            .map(|pos| Car::new(pos, config.car, config.sensors))
            .collect();
        Self::assemble(field, config, generation, cars, policies)
    }

    /// Runs caller-placed cars; one policy per car.
    pub fn with_cars(
        field: &'a ObstacleField,
        config: &SimConfig,
        generation: u64,
        cars: Vec<Car>,
        policies: impl IntoIterator<Item = P>,
    ) -> Result<Self, EpisodeError> {
        let policies: Vec<P> = policies.into_iter().collect();
        if cars.len() != policies.len() {
            return Err(EpisodeError::PopulationMismatch {
                cars: cars.len(),
                policies: policies.len(),
            });
        }
        Ok(Self::assemble(field, config, generation, cars, policies))
    }

    fn assemble(
        field: &'a ObstacleField,
        config: &SimConfig,
        generation: u64,
        cars: Vec<Car>,
        policies: Vec<P>,
    ) -> Self {
        let entrants = cars
            .into_iter()
            .zip(policies)
            .map(|(mut car, policy)| {
                // first observation comes from real readings
                car.scan(field);
                Entrant { car, policy, fitness: 0.0 }
            })
            .collect();
        Self {
            field,
            entrants,
            generation,
            steps: 0,
            max_steps: config.max_steps,
            parallel: config.parallel,
            termination: None,
            aborted: None,
        }
    }

    /// Advances every live car once, in population order.
    ///
    /// All policies are consulted before any car moves, so a contract
    /// violation leaves the step untaken. The episode is then aborted and
    /// every later call returns the same error.
    pub fn step(&mut self) -> Result<StepStatus, EpisodeError> {
        if let Some(err) = &self.aborted {
            return Err(err.clone());
        }
        if let Some(termination) = self.termination {
            return Ok(StepStatus::Terminated(termination));
        }
        if self.alive_count() == 0 {
            return Ok(StepStatus::Terminated(self.finish(Termination::AllDead)));
        }

        let decisions = match self.decide_all() {
            Ok(decisions) => decisions,
            Err(err) => {
                warn!(
                    generation = self.generation,
                    steps = self.steps,
                    error = %err,
                    "episode aborted"
                );
                self.aborted = Some(err.clone());
                return Err(err);
            }
        };

        let field = self.field;
        if self.parallel {
            self.entrants
                .par_iter_mut()
                .zip(decisions)
                .for_each(|(entrant, decision)| {
                    if let Some(action) = decision {
                        entrant.apply(action, field);
                    }
                });
        } else {
            for (entrant, decision) in self.entrants.iter_mut().zip(decisions) {
                if let Some(action) = decision {
                    entrant.apply(action, field);
                }
            }
        }
        self.steps += 1;

        let alive = self.alive_count();
        if alive == 0 {
            return Ok(StepStatus::Terminated(self.finish(Termination::AllDead)));
        }
        if self.max_steps.is_some_and(|limit| self.steps >= limit) {
            warn!(
                generation = self.generation,
                steps = self.steps,
                alive,
                "episode hit its step ceiling"
            );
            return Ok(StepStatus::Terminated(self.finish(Termination::StepLimit)));
        }
        Ok(StepStatus::Running { alive })
    }

    // The lowest failing index is reported on both paths.
    fn decide_all(&mut self) -> Result<Vec<Option<Action>>, EpisodeError> {
        let outcomes: Vec<Result<Option<Action>, PolicyError>> = if self.parallel {
            self.entrants.par_iter_mut().map(Entrant::decide).collect()
        } else {
            let mut outcomes = Vec::with_capacity(self.entrants.len());
            for entrant in &mut self.entrants {
                let outcome = entrant.decide();
                let failed = outcome.is_err();
                outcomes.push(outcome);
                if failed {
                    break;
                }
            }
            outcomes
        };
        outcomes
            .into_iter()
            .enumerate()
            .map(|(agent, outcome)| outcome.map_err(|source| EpisodeError::Policy { agent, source }))
            .collect()
    }

    /// Steps until the episode terminates.
    pub fn run(&mut self) -> Result<EpisodeReport, EpisodeError> {
        debug!(
            generation = self.generation,
            population = self.entrants.len(),
            "episode started"
        );
        loop {
            if let StepStatus::Terminated(_) = self.step()? {
                break;
            }
        }
        Ok(self.report())
    }

    fn report(&self) -> EpisodeReport {
        EpisodeReport {
            generation: self.generation,
            steps: self.steps,
            termination: self.termination.unwrap_or(Termination::AllDead),
            fitness: self.fitness(),
        }
    }

    fn finish(&mut self, termination: Termination) -> Termination {
        self.termination = Some(termination);
        debug!(
            generation = self.generation,
            steps = self.steps,
            ?termination,
            "episode finished"
        );
        termination
    }

    pub fn fitness(&self) -> Vec<f64> {
        self.entrants.iter().map(|e| e.fitness).collect()
    }

    pub fn cars(&self) -> impl Iterator<Item = &Car> + '_ {
        self.entrants.iter().map(|e| &e.car)
    }

    pub fn alive_count(&self) -> usize {
        self.entrants.iter().filter(|e| e.car.is_alive()).count()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Finished, either normally or by an aborted step.
    pub fn is_terminated(&self) -> bool {
        self.termination.is_some() || self.aborted.is_some()
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    pub fn field(&self) -> &'a ObstacleField {
        self.field
    }
}
