//! The capability a training algorithm must expose to be driven by
//! [`super::AgentTrainer`].

use anyhow::Result;

use crate::env::VecEnv;

/// A reinforcement-learning algorithm bound to a vectorized environment.
///
/// The algorithm owns its environment. [`super::AgentTrainer`] takes it out,
/// wraps it, and binds the wrapped chain back; afterwards every step the
/// algorithm takes goes through that chain.
pub trait Algorithm {
    /// The policy being optimized.
    type Policy;

    /// Extra options forwarded untouched to [`Algorithm::learn`].
    type LearnOptions: Default;

    /// The currently bound environment, if any.
    fn env(&self) -> Option<&dyn VecEnv>;

    /// Mutable access to the currently bound environment.
    fn env_mut(&mut self) -> Option<&mut (dyn VecEnv + 'static)>;

    /// Unbind and return the current environment.
    fn take_env(&mut self) -> Option<Box<dyn VecEnv>>;

    /// Bind a new environment, replacing any current one.
    fn set_env(&mut self, env: Box<dyn VecEnv>);

    /// Train for `total_timesteps` environment steps (summed over
    /// sub-environments) on the bound environment.
    fn learn(&mut self, total_timesteps: u64, options: Self::LearnOptions) -> Result<()>;

    /// The current policy.
    fn policy(&self) -> &Self::Policy;
}
