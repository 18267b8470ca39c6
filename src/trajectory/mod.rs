//! Trajectory types and recording for vectorized environments.
//!
//! This module provides:
//! - [`types::TrajectoryWithRew`] -- one finished episode with its original
//!   environment rewards.
//! - [`types::TrajectoryStats`] -- summary statistics over a set of
//!   trajectories.
//! - [`buffer::TrajectoryBuffer`] -- the env wrapper that records episodes as
//!   they happen, and [`buffer::TrajectoryDrain`], drain-only access to what
//!   it recorded.

pub mod buffer;
pub mod types;

// Re-export the most commonly used items at the module level.
pub use buffer::{TrajectoryBuffer, TrajectoryDrain};
pub use types::{TrajectoryStats, TrajectoryWithRew};

use std::path::Path;

use anyhow::{Context, Result};

/// Save trajectories as pretty-printed JSON.
pub fn save_to_file(trajectories: &[TrajectoryWithRew], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let json =
        serde_json::to_string_pretty(trajectories).context("Failed to serialize trajectories")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write trajectories to {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        count = trajectories.len(),
        "Saved trajectories"
    );
    Ok(())
}

/// Load trajectories saved by [`save_to_file`].
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Vec<TrajectoryWithRew>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read trajectories from {}", path.display()))?;
    let trajectories: Vec<TrajectoryWithRew> =
        serde_json::from_str(&text).context("Failed to deserialize trajectories JSON")?;
    tracing::info!(
        path = %path.display(),
        count = trajectories.len(),
        "Loaded trajectories"
    );
    Ok(trajectories)
}
