//! MLP value baseline
//!
//! Per-step features are the policy input, the recorded action distribution
//! and a time feature:
//!
//! ```text
//! [ state, dist.mean, dist.log_std, t/100, 1 ]
//! ```
//!
//! The network is refit with a fixed number of full-batch Adam steps per
//! iteration; optimizer state carries over between fits.

use anyhow::{Context, Result, ensure};
use tch::{
    Device, Kind, Tensor,
    nn::{self, Module, OptimizerConfig},
};

use super::ValueFunction;
use crate::buffer::Path;

/// Adam learning rate for value fitting
const LEARNING_RATE: f64 = 1e-3;

/// Full-batch steps per fit
const DEFAULT_FIT_STEPS: usize = 25;

/// Value network with ELU hidden layers
pub struct MlpValueFunction {
    vs: nn::VarStore,
    net: nn::Sequential,
    optimizer: nn::Optimizer,
    device: Device,
    feature_dim: i64,
    fit_steps: usize,
}

impl MlpValueFunction {
    /// Create a value network for the given policy input and action sizes
    pub fn new(state_dim: i64, act_dim: i64, hidden_dim: i64) -> Result<Self> {
        let device = Device::cuda_if_available();
        let vs = nn::VarStore::new(device);
        let root = vs.root();
        let feature_dim = state_dim + 2 * act_dim + 2;

        let net = nn::seq()
            .add(nn::linear(&root / "value" / "fc1", feature_dim, hidden_dim, Default::default()))
            .add_fn(|x| x.elu())
            .add(nn::linear(&root / "value" / "fc2", hidden_dim, hidden_dim, Default::default()))
            .add_fn(|x| x.elu())
            .add(nn::linear(&root / "value" / "out", hidden_dim, 1, Default::default()));

        let optimizer = nn::Adam::default()
            .build(&vs, LEARNING_RATE)
            .context("Failed to create value function optimizer")?;

        Ok(Self { vs, net, optimizer, device, feature_dim, fit_steps: DEFAULT_FIT_STEPS })
    }

    /// Set the number of Adam steps per fit
    pub fn with_fit_steps(mut self, steps: usize) -> Self {
        self.fit_steps = steps;
        self
    }

    /// Get reference to variable store
    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    fn features(&self, path: &Path) -> Result<Vec<f32>> {
        let mut flat = Vec::with_capacity(path.len() * self.feature_dim as usize);
        for (t, (obs, dist)) in path.observations.iter().zip(&path.action_dists).enumerate() {
            flat.extend_from_slice(obs);
            flat.extend_from_slice(&dist.mean);
            flat.extend_from_slice(&dist.log_std);
            flat.push(t as f32 / 100.0);
            flat.push(1.0);
        }
        ensure!(
            flat.len() == path.len() * self.feature_dim as usize,
            "Path features do not match value network input size {}",
            self.feature_dim
        );
        Ok(flat)
    }

    fn features_tensor(&self, flat: &[f32]) -> Tensor {
        let rows = flat.len() as i64 / self.feature_dim;
        Tensor::from_slice(flat).view([rows, self.feature_dim]).to_device(self.device)
    }
}

impl ValueFunction for MlpValueFunction {
    fn predict(&self, path: &Path) -> Result<Vec<f32>> {
        if path.is_empty() {
            return Ok(Vec::new());
        }
        let x = self.features_tensor(&self.features(path)?);
        let values = tch::no_grad(|| self.net.forward(&x)).squeeze_dim(-1);
        let values = values.to_device(Device::Cpu).to_kind(Kind::Float).contiguous();
        Ok(Vec::<f32>::try_from(&values)?)
    }

    fn fit(&mut self, paths: &[Path], targets: &[Vec<f32>]) -> Result<()> {
        ensure!(paths.len() == targets.len(), "One target vector per path required");

        let mut flat = Vec::new();
        let mut ys = Vec::new();
        for (path, target) in paths.iter().zip(targets) {
            ensure!(path.len() == target.len(), "Target length must match path length");
            flat.extend(self.features(path)?);
            ys.extend_from_slice(target);
        }
        if ys.is_empty() {
            return Ok(());
        }

        let x = self.features_tensor(&flat);
        let y = Tensor::from_slice(&ys).to_device(self.device);
        for _ in 0..self.fit_steps {
            let pred = self.net.forward(&x).squeeze_dim(-1);
            let loss = (pred - &y).square().mean(Kind::Float);
            self.optimizer.backward_step(&loss);
        }
        Ok(())
    }

    fn save(&self, path: &std::path::Path) -> Result<()> {
        self.vs.save(path).with_context(|| format!("Failed to write value function to {}", path.display()))
    }

    fn load(&mut self, path: &std::path::Path) -> Result<()> {
        self.vs.load(path).with_context(|| format!("Failed to read value function from {}", path.display()))
    }
}
