//! A small vectorized random-walk environment.
//!
//! Each sub-environment is a walker on the integer line
//! `[-half_width, half_width]`. Action `[0]` steps left, `[1]` steps right.
//! Reaching the right edge pays 1.0 and ends the episode; reaching the left
//! edge ends it with 0.0. Episodes are truncated after `max_steps`.
//!
//! Observations are `[position, steps_taken]`. Finished sub-environments are
//! reset immediately, with the final observation carried in
//! [`StepInfo::terminal_observation`].
//!
//! Start positions are drawn from a seeded RNG so runs are reproducible.

use anyhow::{bail, ensure, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::traits::{Action, Observation, StepInfo, VecEnv, VecStep};
use crate::config::EnvConfig;

/// Reward paid for reaching the right edge.
pub const GOAL_REWARD: f32 = 1.0;

#[derive(Debug, Clone, Copy, Default)]
struct Walker {
    position: i32,
    steps: usize,
}

impl Walker {
    fn observation(&self) -> Observation {
        vec![self.position as f32, self.steps as f32]
    }
}

/// N independent line walkers stepped as one batch.
pub struct LineWalkEnv {
    walkers: Vec<Walker>,
    half_width: i32,
    max_steps: usize,
    rng: StdRng,
    /// Whether `reset` has been called since construction.
    started: bool,
}

impl LineWalkEnv {
    /// Create a new environment with `num_envs` walkers.
    pub fn new(num_envs: usize, half_width: i32, max_steps: usize, seed: u64) -> Result<Self> {
        ensure!(num_envs > 0, "LineWalkEnv needs at least one sub-environment");
        ensure!(half_width >= 1, "half_width must be at least 1, got {half_width}");
        ensure!(max_steps >= 1, "max_steps must be at least 1");

        Ok(Self {
            walkers: vec![Walker::default(); num_envs],
            half_width,
            max_steps,
            rng: StdRng::seed_from_u64(seed),
            started: false,
        })
    }

    /// Build from the `env` section of the configuration.
    pub fn from_config(config: &EnvConfig) -> Result<Self> {
        Self::new(
            config.num_envs,
            config.half_width,
            config.max_steps,
            config.seed,
        )
    }

    /// Current position of every walker.
    pub fn positions(&self) -> Vec<i32> {
        self.walkers.iter().map(|w| w.position).collect()
    }

    fn spawn(&mut self) -> Walker {
        // Start strictly inside the line so no episode is over at reset.
        let position = self.rng.gen_range(-self.half_width + 1..self.half_width);
        Walker { position, steps: 0 }
    }
}

impl VecEnv for LineWalkEnv {
    fn num_envs(&self) -> usize {
        self.walkers.len()
    }

    fn reset(&mut self) -> Result<Vec<Observation>> {
        for i in 0..self.walkers.len() {
            self.walkers[i] = self.spawn();
        }
        self.started = true;
        Ok(self.walkers.iter().map(Walker::observation).collect())
    }

    fn step(&mut self, actions: &[Action]) -> Result<VecStep> {
        if !self.started {
            bail!("LineWalkEnv stepped before reset");
        }
        if actions.len() != self.walkers.len() {
            bail!(
                "expected {} actions, got {}",
                self.walkers.len(),
                actions.len()
            );
        }

        let n = self.walkers.len();
        let mut out = VecStep {
            observations: Vec::with_capacity(n),
            rewards: Vec::with_capacity(n),
            dones: Vec::with_capacity(n),
            infos: Vec::with_capacity(n),
        };

        for (i, action) in actions.iter().enumerate() {
            let Some(&choice) = action.first() else {
                bail!("empty action for sub-environment {i}");
            };

            let walker = &mut self.walkers[i];
            walker.position += if choice >= 0.5 { 1 } else { -1 };
            walker.steps += 1;

            let at_goal = walker.position >= self.half_width;
            let at_wall = walker.position <= -self.half_width;
            let truncated = walker.steps >= self.max_steps;
            let done = at_goal || at_wall || truncated;
            let reward = if at_goal { GOAL_REWARD } else { 0.0 };

            let observation = walker.observation();
            if done {
                let mut info = StepInfo::terminal(observation);
                info.extra.insert(
                    "truncated".into(),
                    serde_json::Value::Bool(truncated && !at_goal && !at_wall),
                );
                self.walkers[i] = self.spawn();
                out.observations.push(self.walkers[i].observation());
                out.infos.push(info);
            } else {
                out.observations.push(observation);
                out.infos.push(StepInfo::default());
            }
            out.rewards.push(reward);
            out.dones.push(done);
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn right(n: usize) -> Vec<Action> {
        vec![vec![1.0]; n]
    }

    #[test]
    fn test_reset_spawns_inside_the_line() {
        let mut env = LineWalkEnv::new(16, 3, 50, 7).unwrap();
        let obs = env.reset().unwrap();

        assert_eq!(obs.len(), 16);
        for o in &obs {
            assert!(o[0] > -3.0 && o[0] < 3.0);
            assert_eq!(o[1], 0.0);
        }
    }

    #[test]
    fn test_walking_right_reaches_goal_and_auto_resets() {
        let mut env = LineWalkEnv::new(1, 2, 50, 0).unwrap();
        env.reset().unwrap();

        // half_width 2 means the walker starts in [-1, 1]; three right steps
        // always reach the goal.
        let mut finished = None;
        for _ in 0..3 {
            let step = env.step(&right(1)).unwrap();
            if step.dones[0] {
                finished = Some(step);
                break;
            }
        }

        let step = finished.expect("walker never reached the goal");
        assert_eq!(step.rewards[0], GOAL_REWARD);
        let terminal = step.infos[0].terminal_observation.as_ref().unwrap();
        assert_eq!(terminal[0], 2.0);
        // The returned observation belongs to the next episode.
        assert_eq!(step.observations[0][1], 0.0);
        assert_eq!(step.infos[0].extra["truncated"], serde_json::Value::Bool(false));
    }

    #[test]
    fn test_episodes_truncate_at_max_steps() {
        let mut env = LineWalkEnv::new(1, 100, 2, 3).unwrap();
        env.reset().unwrap();

        // Walk towards the origin so neither edge is reachable.
        fn toward_origin(env: &LineWalkEnv) -> Vec<Action> {
            if env.positions()[0] > 0 {
                vec![vec![0.0]]
            } else {
                vec![vec![1.0]]
            }
        }
        let first = env.step(&toward_origin(&env)).unwrap();
        assert!(!first.dones[0]);
        let second = env.step(&toward_origin(&env)).unwrap();
        assert!(second.dones[0]);
        assert_eq!(second.rewards[0], 0.0);
        assert_eq!(second.infos[0].extra["truncated"], serde_json::Value::Bool(true));
    }

    #[test]
    fn test_same_seed_same_start() {
        let mut a = LineWalkEnv::new(8, 5, 10, 42).unwrap();
        let mut b = LineWalkEnv::new(8, 5, 10, 42).unwrap();
        assert_eq!(a.reset().unwrap(), b.reset().unwrap());
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(LineWalkEnv::new(0, 3, 10, 0).is_err());
        assert!(LineWalkEnv::new(2, 0, 10, 0).is_err());

        let mut env = LineWalkEnv::new(2, 3, 10, 0).unwrap();
        assert!(env.step(&right(2)).is_err(), "step before reset");
        env.reset().unwrap();
        assert!(env.step(&right(1)).is_err());
        assert!(env.step(&[vec![], vec![1.0]]).is_err());
    }
}
