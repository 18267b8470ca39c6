//! Typed errors raised by this crate.
//!
//! Everything else (environment faults, learning failures) travels as
//! [`anyhow::Error`] and is propagated unmodified.

use thiserror::Error;

/// Raised by [`crate::training::AgentTrainer::new`] when the algorithm cannot
/// be wrapped. Nothing on the algorithm is touched before this is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("the environment for the training algorithm must be set")]
    MissingEnvironment,

    #[error("the environment for the training algorithm must be vectorized (it reports {num_envs} sub-environments)")]
    NotVectorized { num_envs: usize },
}

/// Raised when a trajectory's per-step fields disagree on length.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrajectoryError {
    #[error("trajectory has {actions} actions but {field} has {got} entries (expected {expected})")]
    LengthMismatch {
        field: &'static str,
        actions: usize,
        expected: usize,
        got: usize,
    },
}
