//! A collect-only algorithm: drives a fixed stochastic policy through the
//! bound environment without updating it.
//!
//! Used by the CLI and by tests as the simplest [`Algorithm`] that steps an
//! environment the way a real on-policy learner would: reset at the start of
//! `learn`, then step all sub-environments in lockstep until the timestep
//! budget is spent.

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::algorithm::Algorithm;
use crate::env::{Action, VecEnv};

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Picks action `[1]` with probability `move_right_prob`, else `[0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StochasticPolicy {
    move_right_prob: f32,
}

impl StochasticPolicy {
    /// `move_right_prob` is clamped to `[0, 1]`.
    pub fn new(move_right_prob: f32) -> Self {
        Self {
            move_right_prob: move_right_prob.clamp(0.0, 1.0),
        }
    }

    pub fn move_right_prob(&self) -> f32 {
        self.move_right_prob
    }

    pub fn act(&self, rng: &mut impl Rng) -> Action {
        if rng.gen::<f32>() < self.move_right_prob {
            vec![1.0]
        } else {
            vec![0.0]
        }
    }
}

// ---------------------------------------------------------------------------
// Options and stats
// ---------------------------------------------------------------------------

/// Options for [`RolloutAlgorithm::learn`].
#[derive(Debug, Clone, Default)]
pub struct RolloutOptions {
    /// Log progress every this many vectorized steps (0 disables).
    pub log_interval: u64,
}

/// What the last `learn` call saw, in terms of the rewards it was given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RolloutStats {
    pub timesteps: u64,
    pub episodes: usize,
    /// Sum of the rewards returned by the bound environment.
    pub reward_sum: f32,
}

// ---------------------------------------------------------------------------
// Algorithm
// ---------------------------------------------------------------------------

pub struct RolloutAlgorithm {
    env: Option<Box<dyn VecEnv>>,
    policy: StochasticPolicy,
    rng: StdRng,
    /// Total timesteps across all `learn` calls.
    num_timesteps: u64,
    last_rollout: Option<RolloutStats>,
}

impl RolloutAlgorithm {
    /// Create an algorithm with no environment bound.
    pub fn new(policy: StochasticPolicy, seed: u64) -> Self {
        Self {
            env: None,
            policy,
            rng: StdRng::seed_from_u64(seed),
            num_timesteps: 0,
            last_rollout: None,
        }
    }

    /// Bind `env` at construction.
    pub fn with_env(mut self, env: impl VecEnv + 'static) -> Self {
        self.env = Some(Box::new(env));
        self
    }

    pub fn num_timesteps(&self) -> u64 {
        self.num_timesteps
    }

    pub fn last_rollout(&self) -> Option<&RolloutStats> {
        self.last_rollout.as_ref()
    }
}

impl Algorithm for RolloutAlgorithm {
    type Policy = StochasticPolicy;
    type LearnOptions = RolloutOptions;

    fn env(&self) -> Option<&dyn VecEnv> {
        self.env.as_deref()
    }

    fn env_mut(&mut self) -> Option<&mut (dyn VecEnv + 'static)> {
        self.env.as_deref_mut()
    }

    fn take_env(&mut self) -> Option<Box<dyn VecEnv>> {
        self.env.take()
    }

    fn set_env(&mut self, env: Box<dyn VecEnv>) {
        self.env = Some(env);
    }

    fn learn(&mut self, total_timesteps: u64, options: RolloutOptions) -> Result<()> {
        let Some(env) = self.env.as_mut() else {
            bail!("cannot learn without an environment");
        };
        let num_envs = env.num_envs();
        if num_envs == 0 {
            bail!("cannot learn on an environment with no sub-environments");
        }

        let mut obs = env.reset()?;
        let mut stats = RolloutStats::default();
        let mut iteration = 0u64;

        while stats.timesteps < total_timesteps {
            let actions: Vec<Action> = obs.iter().map(|_| self.policy.act(&mut self.rng)).collect();
            let step = env.step(&actions)?;

            stats.reward_sum += step.rewards.iter().sum::<f32>();
            stats.episodes += step.num_done();
            stats.timesteps += num_envs as u64;
            obs = step.observations;
            iteration += 1;

            if options.log_interval > 0 && iteration % options.log_interval == 0 {
                debug!(
                    iteration,
                    timesteps = stats.timesteps,
                    episodes = stats.episodes,
                    "rollout progress"
                );
            }
        }

        self.num_timesteps += stats.timesteps;
        info!(
            timesteps = stats.timesteps,
            episodes = stats.episodes,
            reward_sum = stats.reward_sum,
            "rollout finished"
        );
        self.last_rollout = Some(stats);
        Ok(())
    }

    fn policy(&self) -> &StochasticPolicy {
        &self.policy
    }
}
