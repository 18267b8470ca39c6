//! Linear reward model over next-observation features.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::source::RewardModel;
use crate::env::{Action, Observation};

/// `reward = bias + weights . next_obs`.
///
/// Features beyond `weights.len()` are ignored; missing features count as 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRewardModel {
    pub weights: Vec<f32>,
    #[serde(default)]
    pub bias: f32,
}

impl LinearRewardModel {
    pub fn new(weights: Vec<f32>, bias: f32) -> Self {
        Self { weights, bias }
    }

    fn score(&self, features: &[f32]) -> f32 {
        self.bias
            + self
                .weights
                .iter()
                .zip(features.iter())
                .map(|(w, x)| w * x)
                .sum::<f32>()
    }
}

impl RewardModel for LinearRewardModel {
    fn predict(
        &self,
        _obs: &[Observation],
        _acts: &[Action],
        next_obs: &[Observation],
        _dones: &[bool],
    ) -> Result<Vec<f32>> {
        let rewards: Vec<f32> = next_obs.iter().map(|o| self.score(o)).collect();
        if let Some(i) = rewards.iter().position(|r| !r.is_finite()) {
            bail!("linear reward model produced a non-finite reward for sub-environment {i}");
        }
        Ok(rewards)
    }
}
