//! Core vectorized-environment trait and shared types.
//!
//! Every environment the trainer can drive implements [`VecEnv`]: N
//! sub-environments stepped together as one batch. Wrappers in this crate
//! ([`crate::trajectory::TrajectoryBuffer`],
//! [`crate::reward::RewardSubstitution`]) are themselves `VecEnv`s, so they
//! stack by ownership: each layer owns the layer below it.

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Observation for a single sub-environment.
pub type Observation = Vec<f32>;

/// Action for a single sub-environment. Discrete actions are a one-element
/// vector holding the action index.
pub type Action = Vec<f32>;

/// Auxiliary information returned alongside a single sub-environment step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    /// Final observation of an episode that just ended.
    ///
    /// Sub-environments are auto-reset on `done`, so the observation returned
    /// by `step` already belongs to the next episode; the last observation of
    /// the finished one travels here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_observation: Option<Observation>,
    /// Arbitrary extra information from the environment (env-specific).
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl StepInfo {
    /// Info for a step that ended an episode.
    pub fn terminal(observation: Observation) -> Self {
        Self {
            terminal_observation: Some(observation),
            extra: serde_json::Map::new(),
        }
    }
}

/// Batched result of stepping all sub-environments once.
#[derive(Debug, Clone, Default)]
pub struct VecStep {
    /// Observations after the step, one per sub-environment.
    pub observations: Vec<Observation>,
    /// Scalar rewards, one per sub-environment.
    pub rewards: Vec<f32>,
    /// Episode-end flags (terminal or truncated).
    pub dones: Vec<bool>,
    /// Per-sub-environment info records.
    pub infos: Vec<StepInfo>,
}

impl VecStep {
    /// Number of finished episodes in this step.
    pub fn num_done(&self) -> usize {
        self.dones.iter().filter(|&&d| d).count()
    }

    /// Observation that ended (or continues) each sub-environment's episode.
    ///
    /// For a done sub-environment this is the terminal observation when the
    /// env provided one; otherwise the returned observation.
    pub fn next_observations(&self) -> Vec<Observation> {
        self.observations
            .iter()
            .zip(self.dones.iter())
            .zip(self.infos.iter())
            .map(|((obs, &done), info)| match (&info.terminal_observation, done) {
                (Some(terminal), true) => terminal.clone(),
                _ => obs.clone(),
            })
            .collect()
    }

    /// Check that every batch in this step has `num_envs` entries.
    pub fn validate(&self, num_envs: usize) -> Result<()> {
        let sizes = [
            ("observations", self.observations.len()),
            ("rewards", self.rewards.len()),
            ("dones", self.dones.len()),
            ("infos", self.infos.len()),
        ];
        for (name, len) in sizes {
            if len != num_envs {
                anyhow::bail!(
                    "vectorized step returned {len} {name} for {num_envs} sub-environments"
                );
            }
        }
        Ok(())
    }
}

/// A vectorized environment: `num_envs` sub-environments driven in lockstep.
///
/// Implementations auto-reset a sub-environment as soon as it reports `done`.
/// A `VecEnv` is owned by exactly one holder at a time; it is handed down the
/// wrapper chain by move and never cloned or shared.
pub trait VecEnv: Send {
    /// Number of parallel sub-environments.
    fn num_envs(&self) -> usize;

    /// Reset every sub-environment and return the initial observations.
    fn reset(&mut self) -> Result<Vec<Observation>>;

    /// Step all sub-environments with one action each.
    fn step(&mut self, actions: &[Action]) -> Result<VecStep>;
}

impl<E: VecEnv + ?Sized> VecEnv for Box<E> {
    fn num_envs(&self) -> usize {
        (**self).num_envs()
    }

    fn reset(&mut self) -> Result<Vec<Observation>> {
        (**self).reset()
    }

    fn step(&mut self, actions: &[Action]) -> Result<VecStep> {
        (**self).step(actions)
    }
}
