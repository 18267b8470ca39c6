//! Recording wrapper: buffers every episode a vectorized environment runs.
//!
//! [`TrajectoryBuffer`] sits directly on top of the raw environment and
//! forwards `reset`/`step` unchanged. Along the way it accumulates, per
//! sub-environment, the running (observation, action, reward, info) sequence.
//! When a sub-environment reports `done` the episode is finalized into a
//! [`TrajectoryWithRew`] and queued until drained.
//!
//! The buffer itself is handed down the wrapper chain by move. The only way
//! to reach its recordings from outside the chain is a [`TrajectoryDrain`],
//! which can pop trajectories but cannot reset or step anything.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::{bail, Result};
use parking_lot::Mutex;
use tracing::debug;

use crate::env::{Action, Observation, StepInfo, VecEnv, VecStep};
use crate::trajectory::types::TrajectoryWithRew;

// ---------------------------------------------------------------------------
// Per-sub-environment accumulation
// ---------------------------------------------------------------------------

/// The running episode of one sub-environment.
#[derive(Debug, Clone, Default)]
struct EpisodeAccumulator {
    obs: Vec<Observation>,
    acts: Vec<Action>,
    infos: Vec<StepInfo>,
    rews: Vec<f32>,
}

impl EpisodeAccumulator {
    fn starting_at(observation: Observation) -> Self {
        Self {
            obs: vec![observation],
            ..Self::default()
        }
    }

    fn push(&mut self, action: Action, reward: f32, info: StepInfo, next_obs: Observation) {
        self.acts.push(action);
        self.rews.push(reward);
        self.infos.push(info);
        self.obs.push(next_obs);
    }

    fn finish(self, env_index: usize, terminal: bool) -> Result<TrajectoryWithRew> {
        Ok(TrajectoryWithRew::new(
            env_index, self.obs, self.acts, self.infos, self.rews, terminal,
        )?)
    }
}

// ---------------------------------------------------------------------------
// Shared recording state
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Recorder {
    /// One running episode per sub-environment; empty until the first reset.
    running: Vec<EpisodeAccumulator>,
    /// Finalized episodes in order of completion.
    finished: VecDeque<TrajectoryWithRew>,
    /// Transitions recorded since the last reset.
    n_transitions: usize,
}

impl Recorder {
    fn restart(&mut self, observations: Vec<Observation>) {
        self.running = observations
            .into_iter()
            .map(EpisodeAccumulator::starting_at)
            .collect();
        self.finished.clear();
        self.n_transitions = 0;
    }

    fn record(&mut self, actions: &[Action], step: &VecStep) -> Result<()> {
        let num_envs = self.running.len();
        if actions.len() != num_envs {
            bail!("expected {num_envs} actions, got {}", actions.len());
        }
        step.validate(num_envs)?;

        let next_obs = step.next_observations();
        for (i, next) in next_obs.into_iter().enumerate() {
            self.running[i].push(
                actions[i].clone(),
                step.rewards[i],
                step.infos[i].clone(),
                next,
            );
            self.n_transitions += 1;

            if step.dones[i] {
                let restart = EpisodeAccumulator::starting_at(step.observations[i].clone());
                let episode = std::mem::replace(&mut self.running[i], restart);
                let trajectory = episode.finish(i, true)?;
                debug!(
                    env_index = i,
                    steps = trajectory.len(),
                    original_return = trajectory.total_reward(),
                    "finalized trajectory"
                );
                self.finished.push_back(trajectory);
            }
        }
        Ok(())
    }

    fn pop_finished(&mut self) -> Vec<TrajectoryWithRew> {
        self.finished.drain(..).collect()
    }

    fn pop_partial(&mut self) -> Result<Vec<TrajectoryWithRew>> {
        let mut partial = Vec::new();
        for (i, running) in self.running.iter_mut().enumerate() {
            if running.acts.is_empty() {
                continue;
            }
            let last = running.obs.last().cloned().unwrap_or_default();
            let episode = std::mem::replace(running, EpisodeAccumulator::starting_at(last));
            partial.push(episode.finish(i, false)?);
        }
        Ok(partial)
    }
}

// ---------------------------------------------------------------------------
// Trajectory buffer
// ---------------------------------------------------------------------------

/// A [`VecEnv`] wrapper that records every episode with its true rewards.
pub struct TrajectoryBuffer<E> {
    venv: E,
    recorder: Arc<Mutex<Recorder>>,
}

impl<E: VecEnv> TrajectoryBuffer<E> {
    /// Wrap `venv`, taking ownership of it.
    pub fn new(venv: E) -> Self {
        Self {
            venv,
            recorder: Arc::new(Mutex::new(Recorder::default())),
        }
    }

    /// A handle for draining recorded trajectories from outside the chain.
    pub fn drain_handle(&self) -> TrajectoryDrain {
        TrajectoryDrain {
            recorder: Arc::clone(&self.recorder),
        }
    }

    /// Return and clear every finalized trajectory queued so far.
    pub fn pop_finished_trajectories(&mut self) -> Vec<TrajectoryWithRew> {
        self.recorder.lock().pop_finished()
    }

    /// Snapshot every in-progress episode as a non-terminal trajectory.
    ///
    /// See [`TrajectoryDrain::pop_partial_trajectories`].
    pub fn pop_partial_trajectories(&mut self) -> Result<Vec<TrajectoryWithRew>> {
        self.recorder.lock().pop_partial()
    }

    /// Transitions recorded since the last reset.
    pub fn n_transitions(&self) -> usize {
        self.recorder.lock().n_transitions
    }

    /// Consume the buffer, returning the wrapped environment.
    pub fn into_inner(self) -> E {
        self.venv
    }
}

impl<E: VecEnv> VecEnv for TrajectoryBuffer<E> {
    fn num_envs(&self) -> usize {
        self.venv.num_envs()
    }

    /// Reset the wrapped environment.
    ///
    /// Discards every in-progress episode and every finished trajectory that
    /// has not been drained yet.
    fn reset(&mut self) -> Result<Vec<Observation>> {
        let observations = self.venv.reset()?;
        if observations.len() != self.venv.num_envs() {
            bail!(
                "vectorized reset returned {} observations for {} sub-environments",
                observations.len(),
                self.venv.num_envs()
            );
        }

        let mut recorder = self.recorder.lock();
        let discarded_running: usize = recorder.running.iter().map(|r| r.acts.len()).sum();
        if discarded_running > 0 || !recorder.finished.is_empty() {
            debug!(
                discarded_transitions = discarded_running,
                discarded_trajectories = recorder.finished.len(),
                "reset discarded buffered data"
            );
        }
        recorder.restart(observations.clone());
        Ok(observations)
    }

    fn step(&mut self, actions: &[Action]) -> Result<VecStep> {
        let num_envs = self.recorder.lock().running.len();
        if num_envs == 0 {
            bail!("TrajectoryBuffer must be reset before stepping");
        }
        // A rejected batch must not reach the wrapped env.
        if actions.len() != num_envs {
            bail!("expected {num_envs} actions, got {}", actions.len());
        }
        let step = self.venv.step(actions)?;
        self.recorder.lock().record(actions, &step)?;
        Ok(step)
    }
}

// ---------------------------------------------------------------------------
// Drain handle
// ---------------------------------------------------------------------------

/// Drain-only access to a [`TrajectoryBuffer`]'s recordings.
///
/// Cannot reset or step the environment, so holding one does not give a
/// second owner over the wrapped chain.
#[derive(Debug)]
pub struct TrajectoryDrain {
    recorder: Arc<Mutex<Recorder>>,
}

impl TrajectoryDrain {
    /// Return and clear every finalized trajectory queued so far.
    ///
    /// A trajectory is returned by exactly one call.
    pub fn pop_finished_trajectories(&self) -> Vec<TrajectoryWithRew> {
        self.recorder.lock().pop_finished()
    }

    /// Snapshot every in-progress episode that has at least one transition
    /// as a non-terminal trajectory, and continue recording each of them from
    /// its latest observation.
    pub fn pop_partial_trajectories(&self) -> Result<Vec<TrajectoryWithRew>> {
        self.recorder.lock().pop_partial()
    }

    /// Number of finalized trajectories waiting to be drained.
    pub fn queued(&self) -> usize {
        self.recorder.lock().finished.len()
    }

    /// Transitions recorded since the last reset.
    pub fn n_transitions(&self) -> usize {
        self.recorder.lock().n_transitions
    }
}
