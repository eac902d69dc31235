//! Generalized Advantage Estimation (GAE) computation
//!
//! Advantages are computed independently for every path; the recurrence
//! never crosses a path boundary.
//!
//! ```text
//! V_T   = 0 if the path terminated, else V_{T-1}
//! δ_t   = r_t + γ * V_{t+1} - V_t
//! A_t   = δ_t + γ * λ * A_{t+1}
//! Ret_t = r_t + γ * Ret_{t+1}
//! ```

use anyhow::{Result, ensure};

use super::path::Path;
use crate::value::ValueFunction;

/// Reverse discounted cumulative sum
///
/// `y[t] = x[t] + gamma * x[t + 1] + gamma² * x[t + 2] + ...`
pub fn discount(x: &[f32], gamma: f32) -> Vec<f32> {
    let mut out = vec![0.0; x.len()];
    let mut running = 0.0;
    for t in (0..x.len()).rev() {
        running = x[t] + gamma * running;
        out[t] = running;
    }
    out
}

/// Advantage estimate for a single path
///
/// # Arguments
/// * `rewards` - Rewards of the path
/// * `values` - Value predictions, one per step
/// * `terminated` - Whether the path ended by natural termination
/// * `gamma` - Discount factor
/// * `lam` - GAE lambda parameter
///
/// A truncated path bootstraps from its last prediction; a terminated one
/// from zero.
pub fn path_advantages(rewards: &[f32], values: &[f32], terminated: bool, gamma: f32, lam: f32) -> Vec<f32> {
    debug_assert_eq!(rewards.len(), values.len());
    if rewards.is_empty() {
        return Vec::new();
    }

    let last = if terminated { 0.0 } else { values[values.len() - 1] };
    let deltas: Vec<f32> = (0..rewards.len())
        .map(|t| {
            let next = if t + 1 < values.len() { values[t + 1] } else { last };
            rewards[t] + gamma * next - values[t]
        })
        .collect();

    discount(&deltas, gamma * lam)
}

/// Value targets and advantages for a set of paths
#[derive(Debug, Clone, Default)]
pub struct AdvantageEstimates {
    /// Discounted returns per path, the value function's fitting targets
    pub value_targets: Vec<Vec<f32>>,

    /// Advantages per path
    pub advantages: Vec<Vec<f32>>,
}

/// Estimate returns and advantages for every path
///
/// Value predictions come from `vf` as it stands before this iteration's
/// fit.
pub fn estimate_advantages<V: ValueFunction + ?Sized>(
    paths: &[Path],
    vf: &V,
    gamma: f32,
    lam: f32,
) -> Result<AdvantageEstimates> {
    let mut estimates = AdvantageEstimates {
        value_targets: Vec::with_capacity(paths.len()),
        advantages: Vec::with_capacity(paths.len()),
    };

    for path in paths {
        let values = vf.predict(path)?;
        ensure!(
            values.len() == path.len(),
            "Value function returned {} predictions for a path of length {}",
            values.len(),
            path.len()
        );

        estimates.value_targets.push(discount(&path.rewards, gamma));
        estimates.advantages.push(path_advantages(&path.rewards, &values, path.terminated, gamma, lam));
    }

    Ok(estimates)
}

/// Standardize advantages to zero mean and unit variance
///
/// Uses the population standard deviation plus `1e-8` so a constant batch
/// maps to zeros instead of dividing by zero.
pub fn standardize(advantages: &[f32]) -> Vec<f32> {
    if advantages.is_empty() {
        return Vec::new();
    }
    let mean = crate::utils::mean(advantages);
    let std = crate::utils::std(advantages);
    advantages.iter().map(|&a| (a - mean) / (std + 1e-8)).collect()
}
