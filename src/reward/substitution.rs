//! Reward substitution: the outermost layer of the training env chain.
//!
//! [`RewardSubstitution`] steps the [`TrajectoryBuffer`] beneath it, computes
//! a reward batch from the true transition via a [`RewardFn`], and hands that
//! batch to its caller in place of the environment's reward. The buffer has
//! already recorded the true reward by then; nothing flows back inward.
//!
//! The constructor only accepts a `TrajectoryBuffer`, so the layer order
//! (record first, substitute outside) cannot be swapped.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::{bail, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::source::RewardFn;
use crate::env::{Action, Observation, VecEnv, VecStep};
use crate::trajectory::TrajectoryBuffer;

/// Key under which the true reward is copied into each outward info record.
pub const ORIGINAL_REWARD_KEY: &str = "original_env_rew";

/// Default number of finished episodes kept for return statistics.
pub const DEFAULT_STATS_WINDOW: usize = 100;

// ---------------------------------------------------------------------------
// Episode return monitoring
// ---------------------------------------------------------------------------

/// Mean episode returns over the most recent finished episodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStats {
    pub episodes: usize,
    pub mean_original_return: f32,
    pub mean_substituted_return: f32,
}

#[derive(Debug)]
struct ReturnWindow {
    capacity: usize,
    /// (original, substituted) return per finished episode.
    episodes: VecDeque<(f32, f32)>,
}

impl ReturnWindow {
    fn push(&mut self, original: f32, substituted: f32) {
        if self.capacity == 0 {
            return;
        }
        if self.episodes.len() == self.capacity {
            self.episodes.pop_front();
        }
        self.episodes.push_back((original, substituted));
    }

    fn stats(&self) -> Option<ReturnStats> {
        if self.episodes.is_empty() {
            return None;
        }
        let n = self.episodes.len() as f32;
        let (orig, sub) = self
            .episodes
            .iter()
            .fold((0.0, 0.0), |(o, s), (eo, es)| (o + eo, s + es));
        Some(ReturnStats {
            episodes: self.episodes.len(),
            mean_original_return: orig / n,
            mean_substituted_return: sub / n,
        })
    }
}

/// Read-only view of a [`RewardSubstitution`]'s return statistics.
#[derive(Debug, Clone)]
pub struct ReturnMonitor {
    window: Arc<Mutex<ReturnWindow>>,
}

impl ReturnMonitor {
    /// Statistics over the window, or `None` before any episode finished.
    pub fn stats(&self) -> Option<ReturnStats> {
        self.window.lock().stats()
    }
}

// ---------------------------------------------------------------------------
// Substitution layer
// ---------------------------------------------------------------------------

/// A [`VecEnv`] wrapper that replaces rewards with those of a [`RewardFn`].
pub struct RewardSubstitution<E> {
    venv: TrajectoryBuffer<E>,
    reward_fn: Box<dyn RewardFn>,
    /// Observations the next actions will be taken from.
    last_obs: Option<Vec<Observation>>,
    /// Running (original, substituted) return per sub-environment; `None`
    /// while an episode is missing a step's substituted reward.
    running: Vec<Option<(f32, f32)>>,
    window: Arc<Mutex<ReturnWindow>>,
}

impl<E: VecEnv> RewardSubstitution<E> {
    pub fn new(venv: TrajectoryBuffer<E>, reward_fn: Box<dyn RewardFn>) -> Self {
        Self::with_stats_window(venv, reward_fn, DEFAULT_STATS_WINDOW)
    }

    pub fn with_stats_window(
        venv: TrajectoryBuffer<E>,
        reward_fn: Box<dyn RewardFn>,
        stats_window: usize,
    ) -> Self {
        let num_envs = venv.num_envs();
        Self {
            venv,
            reward_fn,
            last_obs: None,
            running: vec![Some((0.0, 0.0)); num_envs],
            window: Arc::new(Mutex::new(ReturnWindow {
                capacity: stats_window,
                episodes: VecDeque::with_capacity(stats_window),
            })),
        }
    }

    /// A handle onto the episode return statistics.
    pub fn monitor(&self) -> ReturnMonitor {
        ReturnMonitor {
            window: Arc::clone(&self.window),
        }
    }

    /// The recording layer underneath.
    pub fn buffer(&self) -> &TrajectoryBuffer<E> {
        &self.venv
    }

    /// Consume the layer, returning the recording layer underneath.
    pub fn into_inner(self) -> TrajectoryBuffer<E> {
        self.venv
    }

    fn track_returns(&mut self, original: &[f32], substituted: &[f32], dones: &[bool]) {
        let mut window = self.window.lock();
        for (i, running) in self.running.iter_mut().enumerate() {
            if let Some((orig, sub)) = running.as_mut() {
                *orig += original[i];
                *sub += substituted[i];
            }
            if dones[i] {
                if let Some((orig, sub)) = *running {
                    debug!(
                        env_index = i,
                        original_return = orig,
                        substituted_return = sub,
                        "episode finished"
                    );
                    window.push(orig, sub);
                }
                *running = Some((0.0, 0.0));
            }
        }
    }

    fn compute_rewards(
        &self,
        obs: &[Observation],
        actions: &[Action],
        next_obs: &[Observation],
        step: &VecStep,
    ) -> Result<Vec<f32>> {
        let rewards = self
            .reward_fn
            .compute_reward(obs, actions, next_obs, &step.dones)?;
        if rewards.len() != step.rewards.len() {
            bail!(
                "reward function returned {} rewards for {} sub-environments",
                rewards.len(),
                step.rewards.len()
            );
        }
        Ok(rewards)
    }

    /// Stop tracking the episodes a failed reward computation cut into.
    fn abandon_returns(&mut self, dones: &[bool]) {
        for (running, &done) in self.running.iter_mut().zip(dones) {
            *running = if done { Some((0.0, 0.0)) } else { None };
        }
    }
}

impl<E: VecEnv> VecEnv for RewardSubstitution<E> {
    fn num_envs(&self) -> usize {
        self.venv.num_envs()
    }

    fn reset(&mut self) -> Result<Vec<Observation>> {
        let observations = self.venv.reset()?;
        self.last_obs = Some(observations.clone());
        self.running = vec![Some((0.0, 0.0)); observations.len()];
        Ok(observations)
    }

    fn step(&mut self, actions: &[Action]) -> Result<VecStep> {
        if self.last_obs.is_none() {
            bail!("RewardSubstitution must be reset before stepping");
        }

        let mut step = self.venv.step(actions)?;
        let obs = self
            .last_obs
            .replace(step.observations.clone())
            .unwrap_or_default();
        let next_obs = step.next_observations();

        let rewards = match self.compute_rewards(&obs, actions, &next_obs, &step) {
            Ok(rewards) => rewards,
            Err(err) => {
                self.abandon_returns(&step.dones);
                return Err(err);
            }
        };

        self.track_returns(&step.rewards, &rewards, &step.dones);

        for (info, &original) in step.infos.iter_mut().zip(step.rewards.iter()) {
            info.extra
                .insert(ORIGINAL_REWARD_KEY.into(), serde_json::json!(original));
        }
        step.rewards = rewards;
        Ok(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::StepInfo;
    use crate::reward::RewardSource;

    /// One sub-environment whose observation is `[t]` and true reward is
    /// always 1.0; episodes last `len` steps.
    struct Counter {
        t: usize,
        len: usize,
    }

    impl VecEnv for Counter {
        fn num_envs(&self) -> usize {
            1
        }

        fn reset(&mut self) -> Result<Vec<Observation>> {
            self.t = 0;
            Ok(vec![vec![0.0]])
        }

        fn step(&mut self, _actions: &[Action]) -> Result<VecStep> {
            self.t += 1;
            let done = self.t == self.len;
            let info = if done {
                StepInfo::terminal(vec![self.t as f32])
            } else {
                StepInfo::default()
            };
            if done {
                self.t = 0;
            }
            Ok(VecStep {
                observations: vec![vec![self.t as f32]],
                rewards: vec![1.0],
                dones: vec![done],
                infos: vec![info],
            })
        }
    }

    fn layer(reward_fn: Box<dyn RewardFn>) -> RewardSubstitution<Counter> {
        RewardSubstitution::new(TrajectoryBuffer::new(Counter { t: 0, len: 2 }), reward_fn)
    }

    fn next_obs_reward() -> Box<dyn RewardFn> {
        RewardSource::function(|_o, _a, next: &[Observation], _d| {
            Ok(next.iter().map(|o| 100.0 + o[0]).collect())
        })
        .into_reward_fn()
    }

    #[test]
    fn test_caller_sees_substituted_buffer_sees_true() {
        let mut env = layer(next_obs_reward());
        let drain = env.buffer().drain_handle();
        env.reset().unwrap();

        let first = env.step(&[vec![0.0]]).unwrap();
        assert_eq!(first.rewards, vec![101.0]);
        assert_eq!(first.infos[0].extra[ORIGINAL_REWARD_KEY], serde_json::json!(1.0));

        // Done step: next_obs is the terminal observation [2], not the reset [0].
        let second = env.step(&[vec![0.0]]).unwrap();
        assert_eq!(second.rewards, vec![102.0]);

        let trajs = drain.pop_finished_trajectories();
        assert_eq!(trajs.len(), 1);
        assert_eq!(trajs[0].rews(), &[1.0, 1.0]);
        assert!(trajs[0].infos()[0].extra.get(ORIGINAL_REWARD_KEY).is_none());
    }

    #[test]
    fn test_reward_fn_sees_current_observation() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let recording = move |obs: &[Observation],
                              _a: &[Action],
                              _n: &[Observation],
                              _d: &[bool]|
              -> Result<Vec<f32>> {
            sink.lock().push(obs[0][0]);
            Ok(vec![0.0])
        };

        let mut env = layer(RewardSource::function(recording).into_reward_fn());
        env.reset().unwrap();
        for _ in 0..3 {
            env.step(&[vec![0.0]]).unwrap();
        }

        // Episode 1: t=0, t=1; episode 2 starts from the reset observation.
        assert_eq!(*seen.lock(), vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_step_before_reset_fails() {
        let mut env = layer(next_obs_reward());
        assert!(env.step(&[vec![0.0]]).is_err());
    }

    #[test]
    fn test_wrong_reward_count_fails() {
        let mut env = layer(RewardSource::function(|_o, _a, _n, _d| Ok(vec![])).into_reward_fn());
        env.reset().unwrap();
        let err = env.step(&[vec![0.0]]).unwrap_err();
        assert!(err.to_string().contains("0 rewards for 1"));
    }

    #[test]
    fn test_return_stats() {
        let mut env = layer(next_obs_reward());
        let monitor = env.monitor();
        env.reset().unwrap();
        assert!(monitor.stats().is_none());

        for _ in 0..4 {
            env.step(&[vec![0.0]]).unwrap();
        }

        let stats = monitor.stats().unwrap();
        assert_eq!(stats.episodes, 2);
        assert!((stats.mean_original_return - 2.0).abs() < 1e-6);
        assert!((stats.mean_substituted_return - 203.0).abs() < 1e-6);
    }

    #[test]
    fn test_reward_failure_drops_the_interrupted_episode_from_stats() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = AtomicUsize::new(0);
        let flaky = move |_o: &[Observation],
                          _a: &[Action],
                          next: &[Observation],
                          _d: &[bool]|
              -> Result<Vec<f32>> {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                bail!("reward model warming up");
            }
            Ok(next.iter().map(|o| 100.0 + o[0]).collect())
        };

        let mut env = layer(RewardSource::function(flaky).into_reward_fn());
        let monitor = env.monitor();
        env.reset().unwrap();

        // The first step of episode 1 has no substituted reward.
        assert!(env.step(&[vec![0.0]]).is_err());
        env.step(&[vec![0.0]]).unwrap();
        assert!(monitor.stats().is_none());

        // Episode 2 is tracked in full.
        env.step(&[vec![0.0]]).unwrap();
        env.step(&[vec![0.0]]).unwrap();
        let stats = monitor.stats().unwrap();
        assert_eq!(stats.episodes, 1);
        assert!((stats.mean_original_return - 2.0).abs() < 1e-6);
        assert!((stats.mean_substituted_return - 203.0).abs() < 1e-6);
    }

    #[test]
    fn test_return_window_is_bounded() {
        let mut window = ReturnWindow {
            capacity: 2,
            episodes: VecDeque::new(),
        };
        window.push(1.0, 0.0);
        window.push(2.0, 0.0);
        window.push(3.0, 0.0);

        let stats = window.stats().unwrap();
        assert_eq!(stats.episodes, 2);
        assert!((stats.mean_original_return - 2.5).abs() < 1e-6);
    }
}
