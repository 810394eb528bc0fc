//! Contract between the simulation and whatever decides how a car steers.

use crate::agent::Observation;
use crate::error::PolicyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    SteerLeft,
    SteerRight,
}

impl Action {
    /// Score-vector order expected from every policy.
    pub const ALL: [Action; 2] = [Action::SteerLeft, Action::SteerRight];

    pub fn index(self) -> usize {
        match self {
            Action::SteerLeft => 0,
            Action::SteerRight => 1,
        }
    }
}

/// Maps a car's normalized sensor vector to one score per [`Action`].
///
/// Implemented by the external optimizer's genomes. The simulation picks the
/// highest score; ties go to the lowest index.
pub trait PolicyAdapter: Send {
    fn scores(&mut self, observation: &Observation) -> Vec<f32>;
}

impl<P: PolicyAdapter + ?Sized> PolicyAdapter for &mut P {
    fn scores(&mut self, observation: &Observation) -> Vec<f32> {
        (**self).scores(observation)
    }
}

impl<P: PolicyAdapter + ?Sized> PolicyAdapter for Box<P> {
    fn scores(&mut self, observation: &Observation) -> Vec<f32> {
        (**self).scores(observation)
    }
}

/// Adapts a closure into a policy.
pub struct FnPolicy<F>(pub F);

impl<F> PolicyAdapter for FnPolicy<F>
where
    F: FnMut(&Observation) -> Vec<f32> + Send,
{
    fn scores(&mut self, observation: &Observation) -> Vec<f32> {
        (self.0)(observation)
    }
}

/// Always prefers the same action.
#[derive(Debug, Clone, Copy)]
pub struct FixedPolicy(pub Action);

impl PolicyAdapter for FixedPolicy {
    fn scores(&mut self, _observation: &Observation) -> Vec<f32> {
        let mut scores = vec![0.0; Action::ALL.len()];
        scores[self.0.index()] = 1.0;
        scores
    }
}

/// Picks the action with the highest score, lowest index on ties.
pub fn select_action(scores: &[f32]) -> Result<Action, PolicyError> {
    if scores.len() != Action::ALL.len() {
        return Err(PolicyError::WrongCardinality {
            expected: Action::ALL.len(),
            actual: scores.len(),
        });
    }
    if let Some((index, &value)) = scores.iter().enumerate().find(|(_, s)| !s.is_finite()) {
        return Err(PolicyError::NonFiniteScore { index, value });
    }
    let mut best = 0;
    for (i, &score) in scores.iter().enumerate().skip(1) {
        if score > scores[best] {
            best = i;
        }
    }
    Ok(Action::ALL[best])
}
