//! Policies over continuous actions
//!
//! The training loop only talks to a policy through [`Policy`]. A linear
//! Gaussian policy ships in pure Rust; an MLP Gaussian policy backed by
//! tch-rs is available with the `training` feature.

use anyhow::Result;

use crate::buffer::Batch;

pub mod gaussian;
pub mod linear;

#[cfg(feature = "training")]
pub mod mlp;

pub use gaussian::ActionDist;
pub use linear::LinearGaussianPolicy;

#[cfg(feature = "training")]
pub use mlp::{MlpGaussianPolicy, MlpPolicyConfig};

/// Output of a single policy decision
#[derive(Debug, Clone)]
pub struct PolicyOutput {
    /// Sampled action in the policy's native `[-1, 1]` scale
    pub action: Vec<f32>,

    /// Distribution the action was drawn from
    pub dist: ActionDist,

    /// Log probability of the sampled action
    pub log_prob: f32,
}

/// Diagnostics from one policy update
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateInfo {
    /// Surrogate loss before the step
    pub surrogate_loss: f64,

    /// Whether the optimizer took a cold (unpreconditioned) step
    pub cold: bool,

    /// Trust-region scaling the optimizer applied
    pub scaling: f64,

    /// Norm of the parameter change
    pub step_norm: f64,
}

/// A stochastic policy trained by natural-gradient steps
pub trait Policy {
    /// Sample an action for `state`
    fn act(&mut self, state: &[f32]) -> Result<PolicyOutput>;

    /// Mean `KL(old || new)` over a batch of states
    ///
    /// `old_dists[i]` is the distribution recorded for `observations[i]` at
    /// collection time; `new` is the current policy's distribution.
    fn compute_kl(&self, observations: &[Vec<f32>], old_dists: &[ActionDist]) -> Result<f64>;

    /// Take exactly one natural-gradient step on the batch
    fn update(&mut self, batch: &Batch, stepsize: f64) -> Result<UpdateInfo>;

    /// Persist parameters to `path`
    fn save(&self, path: &std::path::Path) -> Result<()>;

    /// Restore parameters from `path`
    fn load(&mut self, path: &std::path::Path) -> Result<()>;
}

impl<P: Policy + ?Sized> Policy for Box<P> {
    fn act(&mut self, state: &[f32]) -> Result<PolicyOutput> {
        (**self).act(state)
    }

    fn compute_kl(&self, observations: &[Vec<f32>], old_dists: &[ActionDist]) -> Result<f64> {
        (**self).compute_kl(observations, old_dists)
    }

    fn update(&mut self, batch: &Batch, stepsize: f64) -> Result<UpdateInfo> {
        (**self).update(batch, stepsize)
    }

    fn save(&self, path: &std::path::Path) -> Result<()> {
        (**self).save(path)
    }

    fn load(&mut self, path: &std::path::Path) -> Result<()> {
        (**self).load(path)
    }
}
