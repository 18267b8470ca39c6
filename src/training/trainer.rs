//! Training an algorithm against a substituted reward while recording the
//! episodes it experiences.
//!
//! [`AgentTrainer`] takes the algorithm's environment and rebinds it as
//!
//! ```text
//! algorithm -> RewardSubstitution -> TrajectoryBuffer -> original VecEnv
//! ```
//!
//! The buffer sits below the substitution layer, so it records the rewards the
//! environment paid while the algorithm only ever sees the substituted ones.
//! Each [`AgentTrainer::train`] call resets the chain, runs the algorithm's
//! `learn`, and drains the episodes that finished during the call.

use std::fmt;

use anyhow::{anyhow, Result};
use tracing::{debug, info};

use super::algorithm::Algorithm;
use crate::config::MonitorConfig;
use crate::error::ConfigurationError;
use crate::reward::{ReturnMonitor, ReturnStats, RewardSource, RewardSubstitution};
use crate::trajectory::{TrajectoryBuffer, TrajectoryDrain, TrajectoryWithRew};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Lifecycle state of an [`AgentTrainer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerState {
    /// Ready for the next `train` call.
    Idle,
    /// Inside `train`.
    Training,
}

// ---------------------------------------------------------------------------
// Construction error
// ---------------------------------------------------------------------------

/// Construction failed; carries the algorithm back, untouched.
pub struct TrainerInitError<A> {
    error: ConfigurationError,
    algorithm: A,
}

impl<A> TrainerInitError<A> {
    pub fn error(&self) -> &ConfigurationError {
        &self.error
    }

    /// The algorithm that was passed in, with its environment binding as it
    /// was.
    pub fn into_algorithm(self) -> A {
        self.algorithm
    }

    pub fn into_parts(self) -> (ConfigurationError, A) {
        (self.error, self.algorithm)
    }
}

impl<A> fmt::Debug for TrainerInitError<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainerInitError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<A> fmt::Display for TrainerInitError<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl<A> std::error::Error for TrainerInitError<A> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

// ---------------------------------------------------------------------------
// Trainer
// ---------------------------------------------------------------------------

/// Trains an [`Algorithm`] on an external reward and returns the episodes it
/// experienced with their original environment rewards.
///
/// Owns the algorithm, and through it the whole wrapped environment chain,
/// for its entire lifetime. Calls must be sequential.
pub struct AgentTrainer<A: Algorithm> {
    algorithm: A,
    drain: TrajectoryDrain,
    monitor: ReturnMonitor,
    state: TrainerState,
}

impl<A: Algorithm> AgentTrainer<A> {
    /// Wrap `algorithm`'s environment so that it trains on `reward`.
    ///
    /// Fails with [`ConfigurationError`] if the algorithm has no environment
    /// or its environment has no sub-environments; the algorithm is handed
    /// back unchanged in that case.
    pub fn new(
        algorithm: A,
        reward: impl Into<RewardSource>,
    ) -> Result<Self, TrainerInitError<A>> {
        Self::with_config(algorithm, reward, &MonitorConfig::default())
    }

    /// Like [`AgentTrainer::new`], with explicit monitoring settings.
    pub fn with_config(
        mut algorithm: A,
        reward: impl Into<RewardSource>,
        monitor_config: &MonitorConfig,
    ) -> Result<Self, TrainerInitError<A>> {
        if let Err(error) = Self::check_env(&algorithm) {
            return Err(TrainerInitError { error, algorithm });
        }
        let Some(venv) = algorithm.take_env() else {
            return Err(TrainerInitError {
                error: ConfigurationError::MissingEnvironment,
                algorithm,
            });
        };

        let num_envs = venv.num_envs();
        let reward = reward.into();
        let from_model = reward.is_model();

        let buffer = TrajectoryBuffer::new(venv);
        let drain = buffer.drain_handle();
        let wrapped = RewardSubstitution::with_stats_window(
            buffer,
            reward.into_reward_fn(),
            monitor_config.stats_window,
        );
        let monitor = wrapped.monitor();
        algorithm.set_env(Box::new(wrapped));

        info!(num_envs, from_model, "Bound algorithm to reward-substituted environment");

        Ok(Self {
            algorithm,
            drain,
            monitor,
            state: TrainerState::Idle,
        })
    }

    fn check_env(algorithm: &A) -> Result<(), ConfigurationError> {
        let env = algorithm
            .env()
            .ok_or(ConfigurationError::MissingEnvironment)?;
        let num_envs = env.num_envs();
        if num_envs == 0 {
            return Err(ConfigurationError::NotVectorized { num_envs });
        }
        Ok(())
    }

    /// Train for `total_timesteps` on the substituted reward.
    ///
    /// Resets the environment chain first, which discards any episode still
    /// in progress and any finished trajectory not yet drained. Returns the
    /// trajectories that finished during this call, with their original
    /// environment rewards. Episodes still running at the end stay buffered.
    ///
    /// Errors from `learn` are returned unmodified; whatever was buffered
    /// before the failure can still be drained with
    /// [`AgentTrainer::pop_trajectories`].
    pub fn train(
        &mut self,
        total_timesteps: u64,
        options: A::LearnOptions,
    ) -> Result<Vec<TrajectoryWithRew>> {
        self.state = TrainerState::Training;
        let result = self.run_training(total_timesteps, options);
        self.state = TrainerState::Idle;
        result
    }

    fn run_training(
        &mut self,
        total_timesteps: u64,
        options: A::LearnOptions,
    ) -> Result<Vec<TrajectoryWithRew>> {
        let env = self
            .algorithm
            .env_mut()
            .ok_or_else(|| anyhow!("training algorithm lost its environment binding"))?;
        env.reset()?;

        debug!(total_timesteps, "Starting learn");
        self.algorithm.learn(total_timesteps, options)?;

        let trajectories = self.pop_trajectories();
        info!(
            total_timesteps,
            trajectories = trajectories.len(),
            recorded_transitions = self.drain.n_transitions(),
            "Training call finished"
        );
        if let Some(stats) = self.monitor.stats() {
            info!(
                episodes = stats.episodes,
                mean_original_return = stats.mean_original_return,
                mean_substituted_return = stats.mean_substituted_return,
                "Recent episode returns"
            );
        }
        Ok(trajectories)
    }

    /// Drain every finished trajectory buffered since the last drain.
    pub fn pop_trajectories(&mut self) -> Vec<TrajectoryWithRew> {
        self.drain.pop_finished_trajectories()
    }

    /// Snapshot episodes still in progress as non-terminal trajectories.
    ///
    /// The next `train` call would otherwise discard them when it resets.
    pub fn pop_partial_trajectories(&mut self) -> Result<Vec<TrajectoryWithRew>> {
        self.drain.pop_partial_trajectories()
    }

    /// The algorithm's current policy.
    pub fn policy(&self) -> &A::Policy {
        self.algorithm.policy()
    }

    /// Mean original and substituted returns over recent episodes.
    pub fn reward_stats(&self) -> Option<ReturnStats> {
        self.monitor.stats()
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    pub fn algorithm(&self) -> &A {
        &self.algorithm
    }

    /// Give up the trainer, returning the algorithm still bound to the
    /// wrapped environment.
    pub fn into_algorithm(self) -> A {
        self.algorithm
    }
}

impl<A: Algorithm> fmt::Debug for AgentTrainer<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentTrainer")
            .field("state", &self.state)
            .field("queued_trajectories", &self.drain.queued())
            .finish_non_exhaustive()
    }
}
