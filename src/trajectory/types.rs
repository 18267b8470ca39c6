//! Core trajectory data types.
//!
//! A [`TrajectoryWithRew`] records one episode of one sub-environment together
//! with the rewards the *environment* paid, never the substituted ones the
//! training algorithm saw.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::env::{Action, Observation, StepInfo};
use crate::error::TrajectoryError;

// ---------------------------------------------------------------------------
// Trajectory
// ---------------------------------------------------------------------------

/// One recorded episode with its original environment rewards.
///
/// `obs` holds one more entry than `acts`: the observation before the first
/// action through the observation after the last one. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryWithRew {
    /// Unique identifier (UUID v4).
    id: String,
    /// Index of the sub-environment that produced this episode.
    env_index: usize,
    obs: Vec<Observation>,
    acts: Vec<Action>,
    infos: Vec<StepInfo>,
    rews: Vec<f32>,
    /// Whether the episode actually ended (false for flushed partial episodes).
    terminal: bool,
}

impl TrajectoryWithRew {
    /// Build a trajectory, checking that every per-step field lines up with
    /// the actions.
    pub fn new(
        env_index: usize,
        obs: Vec<Observation>,
        acts: Vec<Action>,
        infos: Vec<StepInfo>,
        rews: Vec<f32>,
        terminal: bool,
    ) -> Result<Self, TrajectoryError> {
        let actions = acts.len();
        let checks = [
            ("obs", actions + 1, obs.len()),
            ("infos", actions, infos.len()),
            ("rews", actions, rews.len()),
        ];
        for (field, expected, got) in checks {
            if expected != got {
                return Err(TrajectoryError::LengthMismatch {
                    field,
                    actions,
                    expected,
                    got,
                });
            }
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            env_index,
            obs,
            acts,
            infos,
            rews,
            terminal,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn env_index(&self) -> usize {
        self.env_index
    }

    pub fn obs(&self) -> &[Observation] {
        &self.obs
    }

    pub fn acts(&self) -> &[Action] {
        &self.acts
    }

    pub fn infos(&self) -> &[StepInfo] {
        &self.infos
    }

    /// Original environment rewards, one per action.
    pub fn rews(&self) -> &[f32] {
        &self.rews
    }

    pub fn terminal(&self) -> bool {
        self.terminal
    }

    /// Number of transitions (actions) in the episode.
    pub fn len(&self) -> usize {
        self.acts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.acts.is_empty()
    }

    /// Sum of the original environment rewards.
    pub fn total_reward(&self) -> f32 {
        self.rews.iter().sum()
    }
}

// ---------------------------------------------------------------------------
// Summary statistics
// ---------------------------------------------------------------------------

/// Aggregate statistics over a set of trajectories, computed on the original
/// rewards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryStats {
    pub count: usize,
    pub terminal: usize,
    pub transitions: usize,
    pub mean_return: f32,
    pub min_return: f32,
    pub max_return: f32,
    pub mean_length: f32,
}

impl TrajectoryStats {
    pub fn from_trajectories(trajectories: &[TrajectoryWithRew]) -> Self {
        if trajectories.is_empty() {
            return Self::default();
        }

        let count = trajectories.len();
        let returns: Vec<f32> = trajectories.iter().map(|t| t.total_reward()).collect();
        let transitions: usize = trajectories.iter().map(|t| t.len()).sum();

        Self {
            count,
            terminal: trajectories.iter().filter(|t| t.terminal()).count(),
            transitions,
            mean_return: returns.iter().sum::<f32>() / count as f32,
            min_return: returns.iter().copied().fold(f32::INFINITY, f32::min),
            max_return: returns.iter().copied().fold(f32::NEG_INFINITY, f32::max),
            mean_length: transitions as f32 / count as f32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_trajectory(rews: Vec<f32>, terminal: bool) -> TrajectoryWithRew {
        let n = rews.len();
        TrajectoryWithRew::new(
            0,
            (0..=n).map(|i| vec![i as f32]).collect(),
            vec![vec![1.0]; n],
            vec![StepInfo::default(); n],
            rews,
            terminal,
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_mismatched_lengths() {
        let err = TrajectoryWithRew::new(
            0,
            vec![vec![0.0], vec![1.0]],
            vec![vec![1.0]],
            vec![StepInfo::default()],
            vec![],
            true,
        )
        .unwrap_err();

        assert_eq!(
            err,
            TrajectoryError::LengthMismatch {
                field: "rews",
                actions: 1,
                expected: 1,
                got: 0,
            }
        );

        // Observations must include the final one.
        let err = TrajectoryWithRew::new(
            0,
            vec![vec![0.0]],
            vec![vec![1.0]],
            vec![StepInfo::default()],
            vec![0.5],
            true,
        )
        .unwrap_err();
        assert!(matches!(err, TrajectoryError::LengthMismatch { field: "obs", .. }));
    }

    #[test]
    fn test_ids_are_unique() {
        let a = make_trajectory(vec![0.0], true);
        let b = make_trajectory(vec![0.0], true);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_total_reward_and_len() {
        let t = make_trajectory(vec![0.0, 0.5, 1.0], true);
        assert_eq!(t.len(), 3);
        assert!(!t.is_empty());
        assert!((t.total_reward() - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_stats() {
        let trajs = vec![
            make_trajectory(vec![1.0, 1.0], true),
            make_trajectory(vec![0.0], false),
            make_trajectory(vec![0.0, 0.0, 1.0], true),
        ];

        let stats = TrajectoryStats::from_trajectories(&trajs);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.terminal, 2);
        assert_eq!(stats.transitions, 6);
        assert!((stats.mean_return - 1.0).abs() < 1e-6);
        assert_eq!(stats.min_return, 0.0);
        assert_eq!(stats.max_return, 2.0);
        assert!((stats.mean_length - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_stats_empty() {
        assert_eq!(
            TrajectoryStats::from_trajectories(&[]),
            TrajectoryStats::default()
        );
    }
}
