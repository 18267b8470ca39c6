//! Reward sources: plain functions and learned models behind one interface.
//!
//! The substitution layer only ever talks to a [`RewardFn`]. A
//! [`RewardModel`] is adapted to that shape once, when a [`RewardSource`] is
//! turned into a reward function, never per step.

use anyhow::Result;

use crate::env::{Action, Observation};

/// Maps a batch of transitions to a batch of scalar rewards.
///
/// All slices have one entry per sub-environment. `next_obs` holds the final
/// observation for sub-environments that just finished. Errors are not
/// caught anywhere downstream; they surface from the `step` that triggered
/// them.
pub trait RewardFn: Send {
    fn compute_reward(
        &self,
        obs: &[Observation],
        acts: &[Action],
        next_obs: &[Observation],
        dones: &[bool],
    ) -> Result<Vec<f32>>;
}

impl<F> RewardFn for F
where
    F: Fn(&[Observation], &[Action], &[Observation], &[bool]) -> Result<Vec<f32>> + Send,
{
    fn compute_reward(
        &self,
        obs: &[Observation],
        acts: &[Action],
        next_obs: &[Observation],
        dones: &[bool],
    ) -> Result<Vec<f32>> {
        self(obs, acts, next_obs, dones)
    }
}

/// A learned reward model exposing batch prediction over transitions.
pub trait RewardModel: Send {
    fn predict(
        &self,
        obs: &[Observation],
        acts: &[Action],
        next_obs: &[Observation],
        dones: &[bool],
    ) -> Result<Vec<f32>>;
}

impl<M: RewardModel + ?Sized> RewardModel for Box<M> {
    fn predict(
        &self,
        obs: &[Observation],
        acts: &[Action],
        next_obs: &[Observation],
        dones: &[bool],
    ) -> Result<Vec<f32>> {
        (**self).predict(obs, acts, next_obs, dones)
    }
}

/// Adapts a [`RewardModel`]'s `predict` to the [`RewardFn`] shape.
pub struct ModelReward<M> {
    model: M,
}

impl<M: RewardModel> ModelReward<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

impl<M: RewardModel> RewardFn for ModelReward<M> {
    fn compute_reward(
        &self,
        obs: &[Observation],
        acts: &[Action],
        next_obs: &[Observation],
        dones: &[bool],
    ) -> Result<Vec<f32>> {
        self.model.predict(obs, acts, next_obs, dones)
    }
}

/// Either a reward function or a learned reward model.
pub enum RewardSource {
    Function(Box<dyn RewardFn>),
    Model(Box<dyn RewardModel>),
}

impl RewardSource {
    /// Wrap a closure taking `(obs, acts, next_obs, dones)`.
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&[Observation], &[Action], &[Observation], &[bool]) -> Result<Vec<f32>>
            + Send
            + 'static,
    {
        Self::Function(Box::new(f))
    }

    /// Wrap any type implementing [`RewardFn`].
    pub fn custom(f: impl RewardFn + 'static) -> Self {
        Self::Function(Box::new(f))
    }

    /// Wrap a learned reward model.
    pub fn model(model: impl RewardModel + 'static) -> Self {
        Self::Model(Box::new(model))
    }

    pub fn is_model(&self) -> bool {
        matches!(self, Self::Model(_))
    }

    /// Resolve to the single reward-function capability.
    pub fn into_reward_fn(self) -> Box<dyn RewardFn> {
        match self {
            Self::Function(f) => f,
            Self::Model(model) => Box::new(ModelReward::new(model)),
        }
    }
}

impl std::fmt::Debug for RewardSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Function(_) => f.write_str("RewardSource::Function"),
            Self::Model(_) => f.write_str("RewardSource::Model"),
        }
    }
}
