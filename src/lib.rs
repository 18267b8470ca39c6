//! Rewire: train reinforcement-learning agents on an external reward.
//!
//! A training algorithm's vectorized environment is wrapped so that the
//! algorithm optimizes a reward supplied from outside (a plain function or a
//! learned reward model), while every episode it experiences is recorded with
//! the environment's *original* rewards for downstream reward learning.

pub mod config;
pub mod env;
pub mod error;
pub mod reward;
pub mod training;
pub mod trajectory;

pub use error::{ConfigurationError, TrajectoryError};
