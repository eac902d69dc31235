//! Linear Gaussian policy in pure Rust
//!
//! The action mean is an affine function of the state; the log standard
//! deviation is a free, state-independent parameter per action dimension.
//!
//! ```text
//! θ = [ W (act_dim × state_dim, row-major) | b (act_dim) | log_std (act_dim) ]
//! μ(s) = W s + b
//! ```
//!
//! Score vectors have closed forms, so the policy feeds exact per-sample
//! Fisher statistics to its [`NaturalGradientOptimizer`].

use std::fs;

use anyhow::{Context, Result, ensure};
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use super::{ActionDist, Policy, PolicyOutput, UpdateInfo, gaussian::standard_normal};
use crate::{
    buffer::Batch,
    optim::{NaturalGradientConfig, NaturalGradientOptimizer},
};

/// Standard deviation of the initial weights
const INIT_WEIGHT_STD: f64 = 0.01;

#[derive(Serialize, Deserialize)]
struct LinearPolicyState {
    state_dim: usize,
    act_dim: usize,
    theta: Vec<f64>,
}

/// Gaussian policy with a linear mean
pub struct LinearGaussianPolicy {
    state_dim: usize,
    act_dim: usize,
    theta: Vec<f64>,
    optimizer: NaturalGradientOptimizer,
    rng: StdRng,
}

impl LinearGaussianPolicy {
    /// Create a policy seeded from system entropy
    pub fn new(state_dim: usize, act_dim: usize, config: NaturalGradientConfig) -> Result<Self> {
        Self::with_rng(state_dim, act_dim, config, StdRng::from_entropy())
    }

    /// Create a policy with a fixed seed
    pub fn seeded(state_dim: usize, act_dim: usize, config: NaturalGradientConfig, seed: u64) -> Result<Self> {
        Self::with_rng(state_dim, act_dim, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(state_dim: usize, act_dim: usize, config: NaturalGradientConfig, mut rng: StdRng) -> Result<Self> {
        ensure!(state_dim > 0 && act_dim > 0, "Policy dimensions must be positive");

        let num_params = act_dim * state_dim + 2 * act_dim;
        let mut theta = vec![0.0; num_params];
        for w in &mut theta[..act_dim * state_dim] {
            *w = INIT_WEIGHT_STD * standard_normal(&mut rng);
        }

        let optimizer = NaturalGradientOptimizer::new(num_params, config)?;
        tracing::debug!("Linear policy: state_dim={}, act_dim={}, params={}", state_dim, act_dim, num_params);

        Ok(Self { state_dim, act_dim, theta, optimizer, rng })
    }

    /// Input dimensionality
    pub fn state_dim(&self) -> usize {
        self.state_dim
    }

    /// Action dimensionality
    pub fn act_dim(&self) -> usize {
        self.act_dim
    }

    /// Flat parameter vector
    pub fn params(&self) -> &[f64] {
        &self.theta
    }

    /// Number of updates applied so far
    pub fn num_updates(&self) -> usize {
        self.optimizer.num_updates()
    }

    fn bias_offset(&self) -> usize {
        self.act_dim * self.state_dim
    }

    fn log_std_offset(&self) -> usize {
        self.act_dim * self.state_dim + self.act_dim
    }

    /// Action distribution at `state`
    pub fn dist(&self, state: &[f32]) -> ActionDist {
        assert_eq!(state.len(), self.state_dim, "State dimension mismatch");

        let b = self.bias_offset();
        let l = self.log_std_offset();
        let mean = (0..self.act_dim)
            .map(|j| {
                let row = &self.theta[j * self.state_dim..(j + 1) * self.state_dim];
                let dot: f64 = row.iter().zip(state).map(|(w, &s)| w * s as f64).sum();
                (dot + self.theta[b + j]) as f32
            })
            .collect();
        let log_std = self.theta[l..l + self.act_dim].iter().map(|&v| v as f32).collect();

        ActionDist::new(mean, log_std)
    }

    /// Gradient of `log π(action | state)` with respect to θ
    fn score(&self, state: &[f32], action: &[f32], dist: &ActionDist) -> Vec<f64> {
        let mut score = vec![0.0; self.theta.len()];
        let b = self.bias_offset();
        let l = self.log_std_offset();

        for j in 0..self.act_dim {
            let std = (dist.log_std[j] as f64).exp();
            let z = (action[j] as f64 - dist.mean[j] as f64) / std;
            let d_mean = z / std;

            for (i, &s) in state.iter().enumerate() {
                score[j * self.state_dim + i] = d_mean * s as f64;
            }
            score[b + j] = d_mean;
            score[l + j] = z * z - 1.0;
        }
        score
    }
}

impl Policy for LinearGaussianPolicy {
    fn act(&mut self, state: &[f32]) -> Result<PolicyOutput> {
        ensure!(
            state.len() == self.state_dim,
            "Expected state of dimension {}, got {}",
            self.state_dim,
            state.len()
        );
        let dist = self.dist(state);
        let action = dist.sample(&mut self.rng);
        let log_prob = dist.log_prob(&action);
        Ok(PolicyOutput { action, dist, log_prob })
    }

    fn compute_kl(&self, observations: &[Vec<f32>], old_dists: &[ActionDist]) -> Result<f64> {
        ensure!(observations.len() == old_dists.len(), "Observation and distribution counts differ");
        if observations.is_empty() {
            return Ok(0.0);
        }
        let total: f64 = observations
            .iter()
            .zip(old_dists)
            .map(|(obs, old)| old.kl(&self.dist(obs)) as f64)
            .sum();
        Ok(total / observations.len() as f64)
    }

    fn update(&mut self, batch: &Batch, stepsize: f64) -> Result<UpdateInfo> {
        ensure!(!batch.is_empty(), "Cannot update on an empty batch");

        let n = batch.len() as f64;
        let mut grad = vec![0.0; self.theta.len()];
        let mut surrogate = 0.0;
        let mut fisher_scores = Vec::with_capacity(batch.len());

        for t in 0..batch.len() {
            let state = &batch.observations[t];
            let dist = self.dist(state);

            // Surrogate: -mean(adv * exp(logp - logp_old))
            let ratio = ((dist.log_prob(&batch.actions[t]) - batch.log_probs[t]) as f64).exp();
            let weight = batch.advantages[t] as f64 * ratio;
            surrogate -= weight / n;

            let score = self.score(state, &batch.actions[t], &dist);
            for (g, s) in grad.iter_mut().zip(&score) {
                *g -= weight * s / n;
            }

            // Fisher samples use actions drawn from the current policy
            let sampled = dist.sample(&mut self.rng);
            fisher_scores.push(self.score(state, &sampled, &dist));
        }

        self.optimizer.accumulate_stats(&fisher_scores)?;
        let report = self.optimizer.step(&mut self.theta, &grad, stepsize)?;

        Ok(UpdateInfo {
            surrogate_loss: surrogate,
            cold: report.cold,
            scaling: report.scaling,
            step_norm: report.step_norm,
        })
    }

    fn save(&self, path: &std::path::Path) -> Result<()> {
        let state = LinearPolicyState { state_dim: self.state_dim, act_dim: self.act_dim, theta: self.theta.clone() };
        let json = serde_json::to_string(&state)?;
        fs::write(path, json).with_context(|| format!("Failed to write policy to {}", path.display()))?;
        Ok(())
    }

    fn load(&mut self, path: &std::path::Path) -> Result<()> {
        let json = fs::read_to_string(path).with_context(|| format!("Failed to read policy from {}", path.display()))?;
        let state: LinearPolicyState =
            serde_json::from_str(&json).with_context(|| format!("Malformed policy checkpoint {}", path.display()))?;
        ensure!(
            state.state_dim == self.state_dim && state.act_dim == self.act_dim,
            "Checkpoint {} has dimensions {}x{}, policy expects {}x{}",
            path.display(),
            state.state_dim,
            state.act_dim,
            self.state_dim,
            self.act_dim
        );
        ensure!(state.theta.len() == self.theta.len(), "Checkpoint {} has wrong parameter count", path.display());
        self.theta = state.theta;
        Ok(())
    }
}

impl std::fmt::Debug for LinearGaussianPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearGaussianPolicy")
            .field("state_dim", &self.state_dim)
            .field("act_dim", &self.act_dim)
            .field("optimizer", &self.optimizer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_policy(state_dim: usize, act_dim: usize) -> LinearGaussianPolicy {
        let config = NaturalGradientConfig::new().async_stats(false);
        LinearGaussianPolicy::seeded(state_dim, act_dim, config, 42).unwrap()
    }

    fn two_sample_batch(policy: &LinearGaussianPolicy) -> Batch {
        let state = vec![1.0];
        let dist = policy.dist(&state);
        let actions = vec![vec![1.0], vec![-1.0]];
        Batch {
            observations: vec![state.clone(), state],
            log_probs: actions.iter().map(|a| dist.log_prob(a)).collect(),
            actions,
            old_dists: vec![dist.clone(), dist],
            advantages: vec![1.0, -1.0],
        }
    }

    #[test]
    fn test_act_shapes() {
        let mut policy = test_policy(4, 2);
        let out = policy.act(&[0.1, 0.2, 0.3, 0.4]).unwrap();

        assert_eq!(out.action.len(), 2);
        assert_eq!(out.dist.dim(), 2);
        assert!((out.log_prob - out.dist.log_prob(&out.action)).abs() < 1e-6);
        assert_eq!(policy.params().len(), 4 * 2 + 2 + 2);
    }

    #[test]
    fn test_act_rejects_wrong_dimension() {
        let mut policy = test_policy(3, 1);
        assert!(policy.act(&[0.0]).is_err());
    }

    #[test]
    fn test_initial_log_std_is_zero() {
        let policy = test_policy(2, 3);
        assert_eq!(policy.dist(&[0.0, 0.0]).log_std, vec![0.0; 3]);
    }

    #[test]
    fn test_score_matches_finite_difference() {
        let policy = test_policy(2, 1);
        let state = [0.5, -1.5];
        let action = [0.7];
        let analytic = policy.score(&state, &action, &policy.dist(&state));

        let eps = 1e-3;
        for k in 0..policy.theta.len() {
            let mut plus = test_policy(2, 1);
            plus.theta = policy.theta.clone();
            plus.theta[k] += eps;
            let mut minus = test_policy(2, 1);
            minus.theta = policy.theta.clone();
            minus.theta[k] -= eps;

            let numeric = (plus.dist(&state).log_prob(&action) as f64 - minus.dist(&state).log_prob(&action) as f64)
                / (2.0 * eps);
            assert!((numeric - analytic[k]).abs() < 1e-2, "param {}: {} vs {}", k, numeric, analytic[k]);
        }
    }

    #[test]
    fn test_update_moves_mean_toward_good_action() {
        let mut policy = test_policy(1, 1);
        let batch = two_sample_batch(&policy);
        let before = policy.dist(&[1.0]).mean[0];

        let info = policy.update(&batch, 0.1).unwrap();

        assert!(info.cold);
        assert!(policy.dist(&[1.0]).mean[0] > before);
        assert_eq!(policy.num_updates(), 1);
    }

    #[test]
    fn test_kl_zero_before_update_positive_after() {
        let mut policy = test_policy(1, 1);
        let batch = two_sample_batch(&policy);

        let kl_before = policy.compute_kl(&batch.observations, &batch.old_dists).unwrap();
        assert!(kl_before.abs() < 1e-9);

        policy.update(&batch, 0.5).unwrap();
        let kl_after = policy.compute_kl(&batch.observations, &batch.old_dists).unwrap();
        assert!(kl_after > 0.0);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acktr-1");

        let policy = test_policy(3, 2);
        policy.save(&path).unwrap();

        let config = NaturalGradientConfig::new().async_stats(false);
        let mut restored = LinearGaussianPolicy::seeded(3, 2, config, 7).unwrap();
        assert_ne!(restored.params(), policy.params());
        restored.load(&path).unwrap();
        assert_eq!(restored.params(), policy.params());
    }

    #[test]
    fn test_load_rejects_mismatched_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acktr-1");
        test_policy(3, 2).save(&path).unwrap();

        let mut other = test_policy(4, 2);
        let err = other.load(&path).unwrap_err();
        assert!(err.to_string().contains("dimensions"));
    }

    #[test]
    fn test_load_missing_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acktr-9");
        let err = test_policy(1, 1).load(&path).unwrap_err();
        assert!(err.to_string().contains("acktr-9"));
    }
}
