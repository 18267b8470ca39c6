//! Training module: drives an RL algorithm against a substituted reward.
//!
//! This module provides the [`Algorithm`] seam the trainer needs from a
//! learner, the [`AgentTrainer`] that wires the environment chain and manages
//! trajectory draining across `train` calls, and a collect-only
//! [`RolloutAlgorithm`] used by the CLI.

pub mod algorithm;
pub mod rollout;
pub mod trainer;

pub use algorithm::Algorithm;
pub use rollout::{RolloutAlgorithm, RolloutOptions, RolloutStats, StochasticPolicy};
pub use trainer::{AgentTrainer, TrainerInitError, TrainerState};
