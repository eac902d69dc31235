//! Train ACKTR on Pendulum with a linear Gaussian policy
//!
//! Runs entirely in Rust, no libtorch required.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example train_pendulum --release
//! cargo run --example train_pendulum --release -- --logdir ./logs/pendulum --resume 20
//! ```

use std::path::PathBuf;

use acktr_rl::prelude::*;
use anyhow::Result;
use clap::Parser;

/// Train ACKTR on Pendulum
#[derive(Parser)]
#[command(name = "train_pendulum", about)]
struct Args {
    /// JSON training configuration (defaults if omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for logs and checkpoints
    #[arg(long)]
    logdir: Option<PathBuf>,

    /// Resume from this iteration's checkpoint
    #[arg(long)]
    resume: Option<usize>,

    /// Total timesteps to train for
    #[arg(long)]
    num_timesteps: Option<usize>,

    /// Seed for environment and policy
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => LearnConfig::from_json_file(path)?,
        None => LearnConfig::default().agent_name("pendulum"),
    };
    if let Some(logdir) = args.logdir {
        config.logdir = logdir;
    }
    if let Some(resume) = args.resume {
        config.resume = resume;
    }
    if let Some(n) = args.num_timesteps {
        config.num_timesteps = n;
    }

    let env = Pendulum::seeded(args.seed);
    let obs_dim = env.observation_space().flat_dim();
    let act_dim = env.action_space().flat_dim();

    tracing::info!("Environment: Pendulum");
    tracing::info!("  Observation dim: {}", obs_dim);
    tracing::info!("  Action dim: {}", act_dim);
    tracing::info!("  Timesteps per batch: {}", config.timesteps_per_batch);
    tracing::info!("  Total timesteps: {}", config.num_timesteps);

    // The policy sees the current and previous observation
    let policy = LinearGaussianPolicy::seeded(2 * obs_dim, act_dim, NaturalGradientConfig::default(), args.seed)?;
    let vf = LinearValueFunction::new();

    let mut best = f64::NEG_INFINITY;
    learn(env, policy, vf, config, |summary| {
        if summary.ep_rew_mean > best {
            best = summary.ep_rew_mean;
            tracing::info!("New best mean reward: {:.2}", best);
        }
    })?;

    tracing::info!("Training complete, best mean reward {:.2}", best);
    Ok(())
}
