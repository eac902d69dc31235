//! Multi-Layer Perceptron (MLP) Gaussian policy for continuous actions
//!
//! The network maps the policy input to the action mean; the log standard
//! deviation is a separate state-independent variable. Updates go through
//! the same [`NaturalGradientOptimizer`] as the linear policy, on the
//! network's parameters flattened in variable-name order.
//!
//! # Architecture
//!
//! ```text
//! Input (state)
//!         |
//!     [Dense(64)]
//!         |
//!      Tanh
//!         |
//!     [Dense(64)]
//!         |
//!      Tanh
//!         |
//!    [Dense(act_dim)]      log_std (free variable)
//!         |                      |
//!       mean  ---- N(mean, exp(log_std)²) ----
//! ```

use std::collections::HashMap;

use anyhow::{Context, Result, anyhow, ensure};
use rand::{SeedableRng, rngs::StdRng};
use tch::{
    Device, Kind, Tensor,
    nn::{self, Init, Module},
};

use super::{ActionDist, Policy, PolicyOutput, UpdateInfo};
use crate::{
    buffer::Batch,
    optim::{NaturalGradientConfig, NaturalGradientOptimizer},
};

/// `ln(2π)`
const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// Configuration for MLP policy architecture
#[derive(Debug, Clone)]
pub struct MlpPolicyConfig {
    /// Number of hidden layers (2 or 3)
    pub num_layers: usize,

    /// Size of each hidden layer
    pub hidden_dim: i64,

    /// Orthogonal initialization for hidden layers
    pub use_orthogonal_init: bool,

    /// Samples per score vector when estimating Fisher statistics
    pub fisher_chunk_size: usize,

    /// Optimizer settings
    pub optimizer: NaturalGradientConfig,
}

impl Default for MlpPolicyConfig {
    fn default() -> Self {
        Self {
            num_layers: 2,
            hidden_dim: 64,
            use_orthogonal_init: true,
            fisher_chunk_size: 64,
            optimizer: NaturalGradientConfig::default(),
        }
    }
}

/// Gaussian MLP policy trained with natural-gradient steps
pub struct MlpGaussianPolicy {
    vs: nn::VarStore,
    net: nn::Sequential,
    log_std: Tensor,
    names: Vec<String>,
    optimizer: NaturalGradientOptimizer,
    rng: StdRng,
    device: Device,
    state_dim: i64,
    act_dim: i64,
    config: MlpPolicyConfig,
}

impl MlpGaussianPolicy {
    /// Create a new MLP policy with default architecture
    ///
    /// # Arguments
    ///
    /// * `state_dim` - Policy input dimensionality
    /// * `act_dim` - Action dimensionality
    pub fn new(state_dim: i64, act_dim: i64) -> Result<Self> {
        Self::with_config(state_dim, act_dim, MlpPolicyConfig::default())
    }

    /// Create a new MLP policy with custom configuration
    pub fn with_config(state_dim: i64, act_dim: i64, config: MlpPolicyConfig) -> Result<Self> {
        ensure!(state_dim > 0 && act_dim > 0, "Policy dimensions must be positive");
        ensure!(config.fisher_chunk_size > 0, "Fisher chunk size must be positive");

        let device = Device::cuda_if_available();
        tracing::info!("MlpGaussianPolicy using device: {:?}", device);
        let vs = nn::VarStore::new(device);
        let root = vs.root();

        let hidden_init = if config.use_orthogonal_init {
            Init::Orthogonal { gain: 2.0_f64.sqrt() }
        } else {
            Init::Randn { mean: 0.0, stdev: 0.01 }
        };
        let mut hidden_config = nn::LinearConfig::default();
        hidden_config.ws_init = hidden_init;

        let mut net = nn::seq();
        let mut in_dim = state_dim;
        for layer in 0..config.num_layers.max(1) {
            net = net
                .add(nn::linear(&root / "mean" / format!("fc{}", layer + 1), in_dim, config.hidden_dim, hidden_config))
                .add_fn(|x| x.tanh());
            in_dim = config.hidden_dim;
        }

        // Small output weights keep initial actions near the center of the box
        let mut output_config = nn::LinearConfig::default();
        output_config.ws_init = Init::Randn { mean: 0.0, stdev: 0.01 };
        net = net.add(nn::linear(&root / "mean" / "out", in_dim, act_dim, output_config));

        let log_std = root.var("log_std", &[act_dim], Init::Const(0.0));

        let mut names: Vec<String> = vs.variables().into_keys().collect();
        names.sort();
        let num_params = vs.variables().values().map(Tensor::numel).sum();
        let optimizer = NaturalGradientOptimizer::new(num_params, config.optimizer.clone())?;

        Ok(Self {
            vs,
            net,
            log_std,
            names,
            optimizer,
            rng: StdRng::from_entropy(),
            device,
            state_dim,
            act_dim,
            config,
        })
    }

    /// Get the device this policy is on (CPU or CUDA)
    pub fn device(&self) -> Device {
        self.device
    }

    /// Get the architecture configuration
    pub fn config(&self) -> &MlpPolicyConfig {
        &self.config
    }

    /// Forward pass: action means `[N, act_dim]` and log std `[act_dim]`
    pub fn forward(&self, states: &Tensor) -> (Tensor, Tensor) {
        (self.net.forward(states), self.log_std.shallow_clone())
    }

    fn states_tensor(&self, states: &[Vec<f32>]) -> Result<Tensor> {
        ensure!(
            states.iter().all(|s| s.len() as i64 == self.state_dim),
            "Expected states of dimension {}",
            self.state_dim
        );
        rows_tensor(states, self.state_dim, self.device)
    }

    fn dists(&self, states: &Tensor) -> Result<Vec<ActionDist>> {
        let (mean, log_std) = tch::no_grad(|| self.forward(states));
        let mean = to_vec(&mean)?;
        let log_std = to_vec(&log_std)?;
        Ok(mean
            .chunks_exact(self.act_dim as usize)
            .map(|m| ActionDist::new(m.to_vec(), log_std.clone()))
            .collect())
    }

    fn zero_grad(&self) {
        for mut var in self.vs.trainable_variables() {
            var.zero_grad();
        }
    }

    /// Gradients of all variables, flattened in name order
    fn flat_grad(&self) -> Result<Vec<f64>> {
        let vars = self.vs.variables();
        let mut out = Vec::new();
        for name in &self.names {
            let var = vars.get(name).ok_or_else(|| anyhow!("Missing variable {}", name))?;
            let grad = var.grad();
            if grad.defined() {
                out.extend(to_vec(&grad)?.into_iter().map(f64::from));
            } else {
                out.extend(std::iter::repeat(0.0).take(var.numel()));
            }
        }
        Ok(out)
    }

    fn flat_params(&self) -> Result<Vec<f64>> {
        let vars = self.vs.variables();
        let mut out = Vec::new();
        for name in &self.names {
            let var = vars.get(name).ok_or_else(|| anyhow!("Missing variable {}", name))?;
            out.extend(to_vec(var)?.into_iter().map(f64::from));
        }
        Ok(out)
    }

    fn write_params(&self, params: &[f64]) -> Result<()> {
        let mut vars: HashMap<String, Tensor> = self.vs.variables();
        let mut offset = 0;
        tch::no_grad(|| -> Result<()> {
            for name in &self.names {
                let var = vars.get_mut(name).ok_or_else(|| anyhow!("Missing variable {}", name))?;
                let len = var.numel();
                let values: Vec<f32> = params[offset..offset + len].iter().map(|&p| p as f32).collect();
                let src = Tensor::from_slice(&values).view(var.size().as_slice()).to_device(self.device);
                var.copy_(&src);
                offset += len;
            }
            Ok(())
        })
    }
}

impl Policy for MlpGaussianPolicy {
    fn act(&mut self, state: &[f32]) -> Result<PolicyOutput> {
        let states = self.states_tensor(&[state.to_vec()])?;
        let dist = self.dists(&states)?.into_iter().next().ok_or_else(|| anyhow!("Empty policy output"))?;
        let action = dist.sample(&mut self.rng);
        let log_prob = dist.log_prob(&action);
        Ok(PolicyOutput { action, dist, log_prob })
    }

    fn compute_kl(&self, observations: &[Vec<f32>], old_dists: &[ActionDist]) -> Result<f64> {
        ensure!(observations.len() == old_dists.len(), "Observation and distribution counts differ");
        if observations.is_empty() {
            return Ok(0.0);
        }
        let new_dists = self.dists(&self.states_tensor(observations)?)?;
        let total: f64 = old_dists.iter().zip(&new_dists).map(|(old, new)| old.kl(new) as f64).sum();
        Ok(total / observations.len() as f64)
    }

    fn update(&mut self, batch: &Batch, stepsize: f64) -> Result<UpdateInfo> {
        ensure!(!batch.is_empty(), "Cannot update on an empty batch");

        let n = batch.len() as i64;
        let states = self.states_tensor(&batch.observations)?;
        let actions = rows_tensor(&batch.actions, self.act_dim, self.device)?;
        let advantages = Tensor::from_slice(&batch.advantages).to_device(self.device);
        let old_log_probs = Tensor::from_slice(&batch.log_probs).to_device(self.device);

        // Surrogate loss gradient
        self.zero_grad();
        let (mean, log_std) = self.forward(&states);
        let log_probs = gaussian_log_prob(&mean, &log_std, &actions);
        let surrogate = -(advantages * (log_probs - old_log_probs).exp()).mean(Kind::Float);
        surrogate.backward();
        let grad = self.flat_grad()?;
        let surrogate_loss = f64::try_from(&surrogate.detach())?;

        // Fisher statistics from actions sampled under the current policy;
        // each chunk's mean score is rescaled by sqrt(chunk) to estimate
        // per-sample second moments
        let sampled = tch::no_grad(|| mean.detach() + log_std.detach().exp() * mean.randn_like());
        let chunk = self.config.fisher_chunk_size as i64;
        let mut scores = Vec::with_capacity((n / chunk + 1) as usize);
        let mut start = 0;
        while start < n {
            let len = chunk.min(n - start);
            self.zero_grad();
            let (m, ls) = self.forward(&states.narrow(0, start, len));
            gaussian_log_prob(&m, &ls, &sampled.narrow(0, start, len)).mean(Kind::Float).backward();
            let scale = (len as f64).sqrt();
            scores.push(self.flat_grad()?.into_iter().map(|g| g * scale).collect());
            start += len;
        }
        self.zero_grad();

        self.optimizer.accumulate_stats(&scores)?;
        let mut params = self.flat_params()?;
        let report = self.optimizer.step(&mut params, &grad, stepsize)?;
        self.write_params(&params)?;

        Ok(UpdateInfo { surrogate_loss, cold: report.cold, scaling: report.scaling, step_norm: report.step_norm })
    }

    fn save(&self, path: &std::path::Path) -> Result<()> {
        self.vs.save(path).with_context(|| format!("Failed to write policy to {}", path.display()))
    }

    fn load(&mut self, path: &std::path::Path) -> Result<()> {
        self.vs.load(path).with_context(|| format!("Failed to read policy from {}", path.display()))
    }
}

/// Log density of `actions` under a diagonal Gaussian, summed over the last
/// dimension
fn gaussian_log_prob(mean: &Tensor, log_std: &Tensor, actions: &Tensor) -> Tensor {
    let z = (actions - mean) / log_std.exp();
    ((&z * &z) * -0.5 - log_std - 0.5 * LN_2PI).sum_dim_intlist(-1, false, Kind::Float)
}

/// Stack equal-length rows into a `[rows, cols]` float tensor
fn rows_tensor(rows: &[Vec<f32>], cols: i64, device: Device) -> Result<Tensor> {
    let flat: Vec<f32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    ensure!(flat.len() as i64 == rows.len() as i64 * cols, "Ragged rows");
    Ok(Tensor::from_slice(&flat).view([rows.len() as i64, cols]).to_device(device))
}

fn to_vec(tensor: &Tensor) -> Result<Vec<f32>> {
    let flat = tensor.detach().to_device(Device::Cpu).to_kind(Kind::Float).contiguous().view([-1]);
    Ok(Vec::<f32>::try_from(&flat)?)
}
