//! Rewire: train an agent on a substituted reward and record what it did.
//!
//! Provides subcommands:
//!
//! - `train`    -- Run several training rounds and save the recorded episodes
//! - `inspect`  -- Summarize a saved trajectory file

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rewire::config::RewireConfig;
use rewire::env::LineWalkEnv;
use rewire::reward;
use rewire::training::{AgentTrainer, RolloutAlgorithm, RolloutOptions, StochasticPolicy};
use rewire::trajectory::{self, TrajectoryStats, TrajectoryWithRew};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Rewire: train RL agents on an external reward
#[derive(Parser)]
#[command(name = "rewire", version, about)]
struct Cli {
    /// Path to a JSON configuration file (uses defaults if not provided).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train on the configured reward and save every finished episode.
    Train {
        /// Number of training rounds (overrides the config file).
        #[arg(long)]
        rounds: Option<usize>,

        /// Path to save recorded trajectories.
        #[arg(long, default_value = "data/trajectories.json")]
        output: PathBuf,
    },

    /// Summarize a saved trajectory file.
    Inspect {
        /// Path to the trajectory JSON file.
        #[arg(default_value = "data/trajectories.json")]
        path: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// Entrypoint
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // Initialise tracing (reads RUST_LOG env var, defaults to info).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RewireConfig::load_from_file(path)?,
        None => RewireConfig::default(),
    };

    match cli.command {
        Commands::Train { rounds, output } => {
            if let Some(rounds) = rounds {
                config.training.rounds = rounds;
            }
            cmd_train(&config, &output)
        }
        Commands::Inspect { path } => cmd_inspect(&path),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_train(config: &RewireConfig, output: &Path) -> Result<()> {
    tracing::info!(
        rounds = config.training.rounds,
        num_envs = config.env.num_envs,
        "Starting training"
    );

    let env = LineWalkEnv::from_config(&config.env)?;
    let policy = StochasticPolicy::new(config.training.move_right_prob);
    let algorithm = RolloutAlgorithm::new(policy, config.env.seed).with_env(env);
    let reward = reward::from_config(&config.reward);

    let mut trainer = AgentTrainer::with_config(algorithm, reward, &config.monitor)
        .map_err(|err| err.into_parts().0)
        .context("Failed to set up the trainer")?;

    let mut all: Vec<TrajectoryWithRew> = Vec::new();
    for round in 0..config.training.rounds {
        let trajectories = trainer
            .train(config.training.timesteps_per_round, RolloutOptions::default())
            .with_context(|| format!("Training round {round} failed"))?;

        let stats = TrajectoryStats::from_trajectories(&trajectories);
        tracing::info!(
            round,
            episodes = stats.count,
            mean_original_return = stats.mean_return,
            mean_length = stats.mean_length,
            "Round complete"
        );
        all.extend(trajectories);
    }

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    trajectory::save_to_file(&all, output)?;

    tracing::info!(
        policy_move_right_prob = trainer.policy().move_right_prob(),
        episodes = all.len(),
        "Training finished"
    );
    Ok(())
}

fn cmd_inspect(path: &Path) -> Result<()> {
    let trajectories = trajectory::load_from_file(path)?;
    let stats = TrajectoryStats::from_trajectories(&trajectories);

    println!("Trajectories: {}", path.display());
    println!("  Episodes: {} ({} terminal)", stats.count, stats.terminal);
    println!("  Transitions: {}", stats.transitions);
    if stats.count == 0 {
        return Ok(());
    }
    println!("  Mean length: {:.2}", stats.mean_length);
    println!(
        "  Original return: mean {:.3}, min {:.3}, max {:.3}",
        stats.mean_return, stats.min_return, stats.max_return
    );
    println!();

    println!("Episodes by sub-environment:");
    for (index, count) in episodes_by_env(&trajectories) {
        println!("  env {index}: {count}");
    }

    Ok(())
}

/// Episode count per sub-environment index that occurs in `trajectories`.
fn episodes_by_env(trajectories: &[TrajectoryWithRew]) -> BTreeMap<usize, usize> {
    let mut counts = BTreeMap::new();
    for t in trajectories {
        *counts.entry(t.env_index()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewire::env::StepInfo;

    fn episode(env_index: usize) -> TrajectoryWithRew {
        TrajectoryWithRew::new(
            env_index,
            vec![vec![0.0], vec![1.0]],
            vec![vec![1.0]],
            vec![StepInfo::default()],
            vec![0.0],
            true,
        )
        .unwrap()
    }

    #[test]
    fn test_episodes_by_env_lists_only_seen_indices() {
        let trajectories = vec![
            episode(usize::MAX),
            episode(2),
            episode(2),
            episode(1_000_000_000_000),
        ];

        let counts = episodes_by_env(&trajectories);
        assert_eq!(
            counts.into_iter().collect::<Vec<_>>(),
            vec![(2, 2), (1_000_000_000_000, 1), (usize::MAX, 1)]
        );
    }

    #[test]
    fn test_inspect_handles_extreme_env_index() {
        let tmp = std::env::temp_dir()
            .join(format!("rewire_test_inspect_{}.json", uuid::Uuid::new_v4()));
        trajectory::save_to_file(&[episode(usize::MAX)], &tmp).unwrap();

        assert!(cmd_inspect(&tmp).is_ok());
        std::fs::remove_file(tmp).ok();
    }
}
