//! Per-iteration training statistics

use serde::Serialize;

use crate::{buffer::Path, metrics::TabularLogger, utils};

/// Summary of one training iteration
///
/// Passed to the user callback, written to `log_stats.txt` and recorded in
/// the tabular logger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationSummary {
    /// Iteration index
    pub iteration: usize,

    /// Cumulative timesteps collected by this run
    pub timesteps_so_far: usize,

    /// Number of paths collected this iteration
    pub num_paths: usize,

    /// Mean total reward per path
    pub ep_rew_mean: f64,

    /// Standard deviation over paths of `total_reward / sqrt(num_paths)`
    pub ep_rew_sem: f64,

    /// Mean path length
    pub ep_len_mean: f64,

    /// Mean KL between the pre- and post-update policy
    pub kl: f64,

    /// Step size after adaptation, used by the next update
    pub stepsize: f64,

    /// Surrogate loss before the update
    pub surrogate_loss: f64,
}

/// Reward and length statistics over one iteration's paths
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathStats {
    /// Mean total reward
    pub rew_mean: f64,

    /// Standard error proxy of the mean reward
    pub rew_sem: f64,

    /// Mean path length
    pub len_mean: f64,
}

impl PathStats {
    /// Compute statistics for `paths`
    pub fn from_paths(paths: &[Path]) -> Self {
        if paths.is_empty() {
            return Self { rew_mean: 0.0, rew_sem: 0.0, len_mean: 0.0 };
        }

        let totals: Vec<f32> = paths.iter().map(Path::total_reward).collect();
        let sqrt_n = (paths.len() as f32).sqrt();
        let scaled: Vec<f32> = totals.iter().map(|r| r / sqrt_n).collect();
        let lens: Vec<f32> = paths.iter().map(|p| p.len() as f32).collect();

        Self {
            rew_mean: utils::mean(&totals) as f64,
            rew_sem: utils::std(&scaled) as f64,
            len_mean: utils::mean(&lens) as f64,
        }
    }
}

impl IterationSummary {
    /// Record every field in the tabular logger
    pub fn record(&self, logger: &mut TabularLogger) {
        logger.record("EpRewMean", self.ep_rew_mean);
        logger.record("EpRewSEM", self.ep_rew_sem);
        logger.record("EpLenMean", self.ep_len_mean);
        logger.record("KL", self.kl);
        logger.record("StepSize", self.stepsize);
        logger.record("SurrogateLoss", self.surrogate_loss);
        logger.record("TimestepsSoFar", self.timesteps_so_far as f64);
        logger.record("Iteration", self.iteration as f64);
        logger.record("NumPaths", self.num_paths as f64);
    }
}
