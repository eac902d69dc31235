//! # acktr-rl
//!
//! Actor-critic reinforcement learning with a natural-gradient optimizer
//! (ACKTR) for continuous control.
//!
//! The training loop alternates between collecting trajectories with a
//! stochastic policy and taking one natural-gradient step per iteration,
//! adapting the step size so the KL divergence between consecutive policies
//! stays near a target. Observations are normalized online, and policy and
//! filter state are checkpointed so runs can be resumed.
//!
//! The core is pure Rust; MLP policies and value functions backed by tch-rs
//! are available with the `training` feature.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use acktr_rl::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let env = Pendulum::new();
//! let obs_dim = env.observation_space().flat_dim();
//! let act_dim = env.action_space().flat_dim();
//!
//! let policy = LinearGaussianPolicy::new(2 * obs_dim, act_dim, NaturalGradientConfig::default())?;
//! let vf = LinearValueFunction::new();
//! let config = LearnConfig::default().num_timesteps(100_000);
//!
//! learn(env, policy, vf, config, |summary| {
//!     println!("iteration {}: reward {:.1}", summary.iteration, summary.ep_rew_mean);
//! })?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Experience storage and advantage estimation
pub mod buffer;

/// Policy/filter checkpointing
pub mod checkpoint;

/// Environment traits and implementations
pub mod env;

/// Tabular and file-based training logs
pub mod metrics;

/// Natural-gradient optimizer
pub mod optim;

/// Policy trait and implementations
pub mod policy;

/// Training loop
pub mod train;

/// Utility functions and helpers
pub mod utils;

/// Value function baselines
pub mod value;

/// Prelude module for convenient imports
///
/// This module re-exports commonly used types and traits for convenience.
pub mod prelude {
    pub use crate::{
        buffer::{Batch, Path},
        checkpoint::Checkpointer,
        env::{Environment, Pendulum, SpaceInfo, StepResult, TimeLimit},
        metrics::TabularLogger,
        optim::{NaturalGradientConfig, NaturalGradientOptimizer},
        policy::{ActionDist, LinearGaussianPolicy, Policy, PolicyOutput},
        train::{IterationSummary, LearnConfig, Learner, learn},
        utils::ZFilter,
        value::{LinearValueFunction, ValueFunction},
    };
}

/// Current version of acktr-rl
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
