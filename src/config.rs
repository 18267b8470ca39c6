use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::reward::substitution::DEFAULT_STATS_WINDOW;

/// Complete configuration for a `rewire` training run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewireConfig {
    pub env: EnvConfig,
    pub training: TrainingConfig,
    pub reward: RewardConfig,
    pub monitor: MonitorConfig,
}

/// Line-walk environment configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Number of parallel sub-environments (default: 8).
    pub num_envs: usize,
    /// Distance from the origin to either edge (default: 4).
    pub half_width: i32,
    /// Steps before an episode is truncated (default: 32).
    pub max_steps: usize,
    /// Seed for start positions and the rollout policy (default: 0).
    pub seed: u64,
}

/// Training loop configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of `train` calls (default: 4).
    pub rounds: usize,
    /// Environment timesteps per `train` call, summed over sub-environments
    /// (default: 2048).
    pub timesteps_per_round: u64,
    /// Probability that the rollout policy steps right (default: 0.6).
    pub move_right_prob: f32,
}

/// Which reward the agent is trained against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RewardConfig {
    /// The same reward on every transition.
    Constant { value: f32 },
    /// `scale * position` of the next observation.
    Position { scale: f32 },
    /// A linear reward model over the next observation.
    LinearModel {
        weights: Vec<f32>,
        #[serde(default)]
        bias: f32,
    },
}

/// Episode-return monitoring configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Finished episodes kept for return statistics (default: 100).
    pub stats_window: usize,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            num_envs: 8,
            half_width: 4,
            max_steps: 32,
            seed: 0,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            rounds: 4,
            timesteps_per_round: 2048,
            move_right_prob: 0.6,
        }
    }
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self::Position { scale: 0.1 }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            stats_window: DEFAULT_STATS_WINDOW,
        }
    }
}

impl RewireConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: RewireConfig =
            serde_json::from_str(r#"{"env": {"num_envs": 2}, "reward": {"kind": "constant", "value": 1.0}}"#)
                .unwrap();

        assert_eq!(config.env.num_envs, 2);
        assert_eq!(config.env.half_width, 4);
        assert_eq!(config.training, TrainingConfig::default());
        assert_eq!(config.reward, RewardConfig::Constant { value: 1.0 });
        assert_eq!(config.monitor.stats_window, DEFAULT_STATS_WINDOW);
    }

    #[test]
    fn test_linear_model_config() {
        let reward: RewardConfig =
            serde_json::from_str(r#"{"kind": "linear_model", "weights": [0.5, 0.0]}"#).unwrap();
        assert_eq!(
            reward,
            RewardConfig::LinearModel {
                weights: vec![0.5, 0.0],
                bias: 0.0
            }
        );
    }

    #[test]
    fn test_unknown_reward_kind_is_rejected() {
        assert!(serde_json::from_str::<RewardConfig>(r#"{"kind": "oracle"}"#).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let tmp = std::env::temp_dir()
            .join(format!("rewire_test_config_{}.json", uuid::Uuid::new_v4()));
        let mut config = RewireConfig::default();
        config.training.rounds = 9;
        std::fs::write(&tmp, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = RewireConfig::load_from_file(&tmp).unwrap();
        assert_eq!(loaded, config);
        std::fs::remove_file(tmp).ok();

        assert!(RewireConfig::load_from_file("/nonexistent/rewire.json").is_err());
    }
}
