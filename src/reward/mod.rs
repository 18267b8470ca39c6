//! Externally supplied rewards and the layer that substitutes them.
//!
//! This module provides:
//! - [`source::RewardFn`], [`source::RewardModel`], [`source::RewardSource`] --
//!   the reward capability and its two variants.
//! - [`linear::LinearRewardModel`] -- a small learned-model stand-in.
//! - [`substitution::RewardSubstitution`] -- the outermost env wrapper that
//!   swaps the environment's reward for the source's.
//! - [`from_config`] -- builds the reward source named in the configuration.

pub mod linear;
pub mod source;
pub mod substitution;

pub use linear::LinearRewardModel;
pub use source::{ModelReward, RewardFn, RewardModel, RewardSource};
pub use substitution::{ReturnMonitor, ReturnStats, RewardSubstitution, ORIGINAL_REWARD_KEY};

use crate::config::RewardConfig;
use crate::env::Observation;

/// Build the reward source selected by the `reward` configuration section.
pub fn from_config(config: &RewardConfig) -> RewardSource {
    match config {
        RewardConfig::Constant { value } => {
            let value = *value;
            RewardSource::function(move |_obs, _acts, next_obs: &[Observation], _dones| {
                Ok(vec![value; next_obs.len()])
            })
        }
        RewardConfig::Position { scale } => {
            let scale = *scale;
            RewardSource::function(move |_obs, _acts, next_obs: &[Observation], _dones| {
                Ok(next_obs
                    .iter()
                    .map(|o| scale * o.first().copied().unwrap_or(0.0))
                    .collect())
            })
        }
        RewardConfig::LinearModel { weights, bias } => {
            RewardSource::model(LinearRewardModel::new(weights.clone(), *bias))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compute(config: &RewardConfig) -> Vec<f32> {
        let next = vec![vec![2.0, 1.0], vec![-1.0, 3.0]];
        from_config(config)
            .into_reward_fn()
            .compute_reward(&next, &[vec![1.0], vec![0.0]], &next, &[false, true])
            .unwrap()
    }

    #[test]
    fn test_constant() {
        assert_eq!(compute(&RewardConfig::Constant { value: 0.5 }), vec![0.5, 0.5]);
    }

    #[test]
    fn test_position() {
        assert_eq!(compute(&RewardConfig::Position { scale: 2.0 }), vec![4.0, -2.0]);
    }

    #[test]
    fn test_linear_model_is_a_model_source() {
        let config = RewardConfig::LinearModel {
            weights: vec![0.0, 1.0],
            bias: 1.0,
        };
        assert!(from_config(&config).is_model());
        assert_eq!(compute(&config), vec![2.0, 4.0]);
    }
}
