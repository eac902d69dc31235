//! Train ACKTR on Pendulum with MLP policy and value networks
//!
//! # Usage
//!
//! ```bash
//! cargo run --example train_pendulum_mlp --features training --release
//! ```

use std::path::PathBuf;

use acktr_rl::{
    env::{Environment, Pendulum},
    policy::{MlpGaussianPolicy, MlpPolicyConfig},
    train::{LearnConfig, learn},
    value::MlpValueFunction,
};
use anyhow::Result;
use clap::Parser;

/// Train ACKTR on Pendulum with neural networks
#[derive(Parser)]
#[command(name = "train_pendulum_mlp", about)]
struct Args {
    /// Directory for logs and checkpoints
    #[arg(long, default_value = "./logs/pendulum_mlp")]
    logdir: PathBuf,

    /// Resume from this iteration's checkpoint
    #[arg(long, default_value_t = 0)]
    resume: usize,

    /// Total timesteps to train for
    #[arg(long, default_value_t = 1_000_000)]
    num_timesteps: usize,

    /// Hidden layer size
    #[arg(long, default_value_t = 64)]
    hidden_dim: i64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();
    let env = Pendulum::new();
    let obs_dim = env.observation_space().flat_dim() as i64;
    let act_dim = env.action_space().flat_dim() as i64;

    let policy_config = MlpPolicyConfig { hidden_dim: args.hidden_dim, ..Default::default() };
    let policy = MlpGaussianPolicy::with_config(2 * obs_dim, act_dim, policy_config)?;
    let vf = MlpValueFunction::new(2 * obs_dim, act_dim, args.hidden_dim)?;
    tracing::info!("Policy device: {:?}", policy.device());

    let config = LearnConfig::default()
        .agent_name("pendulum_mlp")
        .logdir(args.logdir)
        .resume(args.resume)
        .num_timesteps(args.num_timesteps);

    learn(env, policy, vf, config, |summary| {
        tracing::info!(
            "Iteration {} done: {} timesteps, reward {:.2}",
            summary.iteration,
            summary.timesteps_so_far,
            summary.ep_rew_mean
        );
    })?;
    Ok(())
}
