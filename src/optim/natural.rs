//! Diagonal natural-gradient optimizer
//!
//! Preconditions the loss gradient with the inverse of a damped diagonal
//! Fisher estimate, limits the step so the predicted KL change stays under
//! a trust-region bound, and applies it with momentum.
//!
//! ```text
//! p     = g / (F + damping)
//! vFv   = lr² * <p, g>
//! coeff = min(1, sqrt(max_grad_norm / vFv))
//! v     = momentum * v + coeff * p
//! θ     = θ - lr * (1 - momentum) * v
//! ```
//!
//! The first `cold_iter` updates (or any update before Fisher statistics
//! exist) take a plain momentum step at `lr * cold_lr_scale` instead.

use anyhow::{Result, anyhow, ensure};
use serde::{Deserialize, Serialize};

use super::stats::{FisherState, ScoreBatch, StatsWorker};

/// Natural-gradient optimizer hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NaturalGradientConfig {
    /// Momentum coefficient
    pub momentum: f64,

    /// Damping added to the Fisher diagonal before inversion
    pub damping: f64,

    /// Decay of the Fisher moving average
    pub stats_decay: f64,

    /// Number of initial updates that skip preconditioning
    pub cold_iter: usize,

    /// Learning-rate multiplier during cold updates
    pub cold_lr_scale: f64,

    /// Trust-region bound on the predicted KL change of one step
    pub max_grad_norm: f64,

    /// Refresh the cached inverse every this many updates
    pub inverse_update_interval: usize,

    /// Accumulate Fisher statistics on a background thread
    pub async_stats: bool,

    /// L2 penalty added to the gradient
    pub weight_decay: f64,
}

impl Default for NaturalGradientConfig {
    fn default() -> Self {
        Self {
            momentum: 0.9,
            damping: 1e-2,
            stats_decay: 0.99,
            cold_iter: 1,
            cold_lr_scale: 0.1,
            max_grad_norm: 1.0,
            inverse_update_interval: 2,
            async_stats: true,
            weight_decay: 0.0,
        }
    }
}

impl NaturalGradientConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.momentum) {
            return Err(anyhow!("Momentum must be in [0, 1)"));
        }
        if self.damping <= 0.0 {
            return Err(anyhow!("Damping must be positive"));
        }
        if !(0.0..1.0).contains(&self.stats_decay) {
            return Err(anyhow!("Stats decay must be in [0, 1)"));
        }
        if self.cold_lr_scale < 0.0 {
            return Err(anyhow!("Cold learning-rate scale must be non-negative"));
        }
        if self.max_grad_norm <= 0.0 {
            return Err(anyhow!("Max grad norm must be positive"));
        }
        if self.inverse_update_interval == 0 {
            return Err(anyhow!("Inverse update interval must be positive"));
        }
        if self.weight_decay < 0.0 {
            return Err(anyhow!("Weight decay must be non-negative"));
        }
        Ok(())
    }

    /// Set momentum
    pub fn momentum(mut self, momentum: f64) -> Self {
        self.momentum = momentum;
        self
    }

    /// Set damping
    pub fn damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    /// Set Fisher moving-average decay
    pub fn stats_decay(mut self, decay: f64) -> Self {
        self.stats_decay = decay;
        self
    }

    /// Set number of cold updates
    pub fn cold_iter(mut self, iters: usize) -> Self {
        self.cold_iter = iters;
        self
    }

    /// Set trust-region bound
    pub fn max_grad_norm(mut self, norm: f64) -> Self {
        self.max_grad_norm = norm;
        self
    }

    /// Enable or disable the background statistics worker
    pub fn async_stats(mut self, enabled: bool) -> Self {
        self.async_stats = enabled;
        self
    }
}

/// What a single optimizer step did
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// Whether the step skipped preconditioning
    pub cold: bool,

    /// Trust-region scaling applied to the preconditioned gradient
    pub scaling: f64,

    /// Euclidean norm of the parameter change
    pub step_norm: f64,
}

enum FisherSource {
    Inline(FisherState),
    Worker(StatsWorker),
}

impl FisherSource {
    fn snapshot(&self) -> FisherState {
        match self {
            FisherSource::Inline(state) => state.clone(),
            FisherSource::Worker(worker) => worker.snapshot(),
        }
    }
}

/// Diagonal natural-gradient optimizer over a flat parameter vector
pub struct NaturalGradientOptimizer {
    config: NaturalGradientConfig,
    num_params: usize,
    fisher: FisherSource,
    inverse: Option<Vec<f64>>,
    velocity: Vec<f64>,
    num_updates: usize,
}

impl NaturalGradientOptimizer {
    /// Create an optimizer for `num_params` parameters
    ///
    /// Spawns the statistics worker when `config.async_stats` is set.
    pub fn new(num_params: usize, config: NaturalGradientConfig) -> Result<Self> {
        config.validate()?;

        let fisher = if config.async_stats {
            FisherSource::Worker(StatsWorker::spawn(num_params, config.stats_decay)?)
        } else {
            FisherSource::Inline(FisherState::new(num_params, config.stats_decay))
        };

        Ok(Self {
            config,
            num_params,
            fisher,
            inverse: None,
            velocity: vec![0.0; num_params],
            num_updates: 0,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &NaturalGradientConfig {
        &self.config
    }

    /// Number of steps taken so far
    pub fn num_updates(&self) -> usize {
        self.num_updates
    }

    /// Feed score vectors sampled from the current policy
    pub fn accumulate_stats(&mut self, scores: &[Vec<f64>]) -> Result<()> {
        ensure!(
            scores.iter().all(|s| s.len() == self.num_params),
            "Score vectors must have {} entries",
            self.num_params
        );
        let batch = ScoreBatch::from_rows(scores);
        match &mut self.fisher {
            FisherSource::Inline(state) => state.fold(&batch),
            FisherSource::Worker(worker) => worker.submit(batch)?,
        }
        Ok(())
    }

    /// Wait for the background worker to fold everything submitted so far
    pub fn sync_stats(&self) -> Result<()> {
        match &self.fisher {
            FisherSource::Inline(_) => Ok(()),
            FisherSource::Worker(worker) => worker.sync(),
        }
    }

    /// Current Fisher diagonal estimate
    pub fn fisher_diag(&self) -> Vec<f64> {
        self.fisher.snapshot().diag().to_vec()
    }

    /// Take one step on `params` against the loss gradient `grad`
    ///
    /// # Arguments
    /// * `params` - Parameters updated in place
    /// * `grad` - Gradient of the loss being minimized
    /// * `lr` - Current step size
    pub fn step(&mut self, params: &mut [f64], grad: &[f64], lr: f64) -> Result<StepReport> {
        ensure!(params.len() == self.num_params, "Expected {} parameters, got {}", self.num_params, params.len());
        ensure!(grad.len() == self.num_params, "Expected {} gradients, got {}", self.num_params, grad.len());

        let grad: Vec<f64> = if self.config.weight_decay > 0.0 {
            grad.iter().zip(params.iter()).map(|(g, p)| g + self.config.weight_decay * p).collect()
        } else {
            grad.to_vec()
        };

        // Worker statistics are only waited on when the inverse is refreshed
        let refresh = self.inverse.is_none() || self.num_updates % self.config.inverse_update_interval == 0;
        if refresh {
            self.sync_stats()?;
        }
        let stats = self.fisher.snapshot();
        let cold = self.num_updates < self.config.cold_iter || stats.batches() == 0;
        let momentum = self.config.momentum;

        let (direction, scaling, step_lr) = if cold {
            (grad, 1.0, lr * self.config.cold_lr_scale)
        } else {
            if refresh {
                let damping = self.config.damping;
                self.inverse = Some(stats.diag().iter().map(|f| 1.0 / (f + damping)).collect());
            }
            let inverse = self.inverse.as_deref().unwrap_or_default();

            let precond: Vec<f64> = grad.iter().zip(inverse).map(|(g, inv)| g * inv).collect();
            let vfv = lr * lr * precond.iter().zip(&grad).map(|(p, g)| p * g).sum::<f64>();
            let scaling = if vfv > 0.0 { (self.config.max_grad_norm / vfv).sqrt().min(1.0) } else { 1.0 };
            let scaled = precond.into_iter().map(|p| p * scaling).collect();
            (scaled, scaling, lr * (1.0 - momentum))
        };

        let mut sq_norm = 0.0;
        for ((p, v), d) in params.iter_mut().zip(self.velocity.iter_mut()).zip(&direction) {
            *v = momentum * *v + d;
            let delta = step_lr * *v;
            *p -= delta;
            sq_norm += delta * delta;
        }
        self.num_updates += 1;

        Ok(StepReport { cold, scaling, step_norm: sq_norm.sqrt() })
    }
}

impl std::fmt::Debug for NaturalGradientOptimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NaturalGradientOptimizer")
            .field("num_params", &self.num_params)
            .field("num_updates", &self.num_updates)
            .field("async_stats", &matches!(self.fisher, FisherSource::Worker(_)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sync_config() -> NaturalGradientConfig {
        NaturalGradientConfig::new().async_stats(false)
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(NaturalGradientConfig::default().validate().is_ok());
        assert!(NaturalGradientConfig::new().momentum(1.0).validate().is_err());
        assert!(NaturalGradientConfig::new().damping(0.0).validate().is_err());
        assert!(NaturalGradientConfig::new().max_grad_norm(-1.0).validate().is_err());

        let stale = NaturalGradientConfig { inverse_update_interval: 0, ..Default::default() };
        let err = stale.validate().unwrap_err();
        assert!(err.to_string().contains("Inverse update interval"), "{}", err);
    }

    #[test]
    fn test_first_step_is_cold() {
        let mut opt = NaturalGradientOptimizer::new(2, sync_config()).unwrap();
        opt.accumulate_stats(&[vec![1.0, 1.0]]).unwrap();

        let mut params = vec![0.0, 0.0];
        let report = opt.step(&mut params, &[1.0, -2.0], 0.5).unwrap();

        assert!(report.cold);
        // Cold step: lr * cold_lr_scale * grad = 0.05 * g
        assert!((params[0] + 0.05).abs() < 1e-12);
        assert!((params[1] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_without_stats_stays_cold() {
        let mut opt = NaturalGradientOptimizer::new(1, sync_config().cold_iter(0)).unwrap();
        let mut params = vec![0.0];
        let report = opt.step(&mut params, &[1.0], 0.1).unwrap();
        assert!(report.cold);
    }

    #[test]
    fn test_preconditioning_scales_by_inverse_fisher() {
        let config = sync_config().cold_iter(0).momentum(0.0).damping(1e-12).max_grad_norm(1e6);
        let mut opt = NaturalGradientOptimizer::new(2, config).unwrap();
        // Fisher diagonal [4, 1]
        opt.accumulate_stats(&[vec![2.0, 1.0]]).unwrap();

        let mut params = vec![0.0, 0.0];
        let report = opt.step(&mut params, &[4.0, 1.0], 0.1).unwrap();

        assert!(!report.cold);
        assert_eq!(report.scaling, 1.0);
        // Natural gradient [1, 1], step lr * (1 - 0) * [1, 1]
        assert!((params[0] + 0.1).abs() < 1e-9);
        assert!((params[1] + 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_trust_region_limits_step() {
        let config = sync_config().cold_iter(0).momentum(0.0).damping(1e-12).max_grad_norm(1e-4);
        let mut opt = NaturalGradientOptimizer::new(1, config).unwrap();
        opt.accumulate_stats(&[vec![1.0]]).unwrap();

        let mut params = vec![0.0];
        let report = opt.step(&mut params, &[10.0], 1.0).unwrap();

        // vFv = 100, coeff = sqrt(1e-4 / 100) = 1e-3
        assert!((report.scaling - 1e-3).abs() < 1e-9);
        assert!((params[0] + 0.01).abs() < 1e-9);
        // Predicted KL of the applied step equals the bound
        let step = params[0];
        assert!((step * step * 1.0 - 1e-4).abs() < 1e-9);
    }

    #[test]
    fn test_momentum_accumulates() {
        let config = sync_config().cold_iter(0).momentum(0.5).damping(1e-12).max_grad_norm(1e6);
        let mut opt = NaturalGradientOptimizer::new(1, config).unwrap();
        opt.accumulate_stats(&[vec![1.0]]).unwrap();

        let mut params = vec![0.0];
        let first = opt.step(&mut params, &[1.0], 1.0).unwrap();
        let second = opt.step(&mut params, &[1.0], 1.0).unwrap();
        assert!(second.step_norm > first.step_norm);
    }

    #[test]
    fn test_dimension_mismatch_is_error() {
        let mut opt = NaturalGradientOptimizer::new(2, sync_config()).unwrap();
        let mut params = vec![0.0];
        assert!(opt.step(&mut params, &[1.0], 0.1).is_err());
        assert!(opt.accumulate_stats(&[vec![1.0]]).is_err());
    }

    #[test]
    fn test_async_stats_reach_optimizer() {
        let config = NaturalGradientConfig::new().async_stats(true).cold_iter(0);
        let mut opt = NaturalGradientOptimizer::new(2, config).unwrap();
        opt.accumulate_stats(&[vec![3.0, 1.0]]).unwrap();
        opt.sync_stats().unwrap();

        assert_eq!(opt.fisher_diag(), vec![9.0, 1.0]);

        let mut params = vec![0.0, 0.0];
        let report = opt.step(&mut params, &[1.0, 1.0], 0.01).unwrap();
        assert!(!report.cold);
    }
}
