//! Vectorized environment abstractions and a bundled demo environment.
//!
//! Every environment implements the [`VecEnv`] trait so that the wrapper
//! chain and the training algorithm can drive it uniformly.
//!
//! Included environments:
//! - **LineWalk** ([`line_walk`]) -- N seeded 1-D random walks with a goal on
//!   the right edge. Small enough to reason about in tests, and used by the
//!   CLI.

pub mod line_walk;
pub mod traits;

// Re-export the core trait and batch types at the module level.
pub use line_walk::LineWalkEnv;
pub use traits::{Action, Observation, StepInfo, VecEnv, VecStep};
