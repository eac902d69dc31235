//! Training loop configuration
//!
//! This module defines the hyperparameters of the ACKTR outer loop and
//! provides validation, builder methods and JSON loading.

use std::{fs, path::Path, path::PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// ACKTR training loop parameters
///
/// Defaults follow the continuous-control setting (e.g. Pendulum) of the
/// reference ACKTR implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnConfig {
    /// Discount factor (gamma)
    pub gamma: f64,

    /// GAE lambda parameter
    pub lam: f64,

    /// Minimum timesteps collected per iteration; the last path may overshoot
    pub timesteps_per_batch: usize,

    /// Stop once more than this many timesteps have been collected
    pub num_timesteps: usize,

    /// Target KL divergence per update
    pub desired_kl: f64,

    /// Step size for the first update
    pub initial_stepsize: f64,

    /// Lower bound of the step size
    pub min_stepsize: f64,

    /// Upper bound of the step size
    pub max_stepsize: f64,

    /// Checkpoint every this many iterations (0 disables checkpoints)
    pub save_interval: usize,

    /// Number of policy checkpoints to keep (0 = keep all)
    pub max_to_keep: usize,

    /// Iteration to resume from (0 = fresh start)
    pub resume: usize,

    /// Prefix of policy checkpoint files
    pub agent_name: String,

    /// Directory for logs and checkpoints
    pub logdir: PathBuf,

    /// Render the first path of every 10th iteration
    pub animate: bool,

    /// Maximum steps per path; `None` uses the environment's episode limit
    pub max_pathlength: Option<usize>,

    /// Concatenate the raw previous observation instead of the filtered one
    pub concat_raw_previous: bool,
}

impl Default for LearnConfig {
    fn default() -> Self {
        Self {
            gamma: 0.99,
            lam: 0.97,
            timesteps_per_batch: 2500,
            num_timesteps: 1_000_000,
            desired_kl: 0.002,
            initial_stepsize: 0.03,
            min_stepsize: 1e-8,
            max_stepsize: 1.0,
            save_interval: 10,
            max_to_keep: 10,
            resume: 0,
            agent_name: "acktr".to_string(),
            logdir: PathBuf::from("./logs"),
            animate: false,
            max_pathlength: None,
            concat_raw_previous: false,
        }
    }
}

impl LearnConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file; missing keys take defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self =
            serde_json::from_str(&json).with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(anyhow!("gamma must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.lam) {
            return Err(anyhow!("lam must be in [0, 1]"));
        }
        if self.timesteps_per_batch == 0 {
            return Err(anyhow!("timesteps_per_batch must be positive"));
        }
        if self.desired_kl <= 0.0 {
            return Err(anyhow!("desired_kl must be positive"));
        }
        if self.min_stepsize <= 0.0 || self.min_stepsize > self.max_stepsize {
            return Err(anyhow!("stepsize bounds must satisfy 0 < min_stepsize <= max_stepsize"));
        }
        if !(self.min_stepsize..=self.max_stepsize).contains(&self.initial_stepsize) {
            return Err(anyhow!("initial_stepsize must lie within the stepsize bounds"));
        }
        if self.agent_name.is_empty() {
            return Err(anyhow!("agent_name must not be empty"));
        }
        if self.max_pathlength == Some(0) {
            return Err(anyhow!("max_pathlength must be positive"));
        }
        Ok(())
    }

    /// Set discount factor
    pub fn gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    /// Set GAE lambda
    pub fn lam(mut self, lam: f64) -> Self {
        self.lam = lam;
        self
    }

    /// Set timesteps per batch
    pub fn timesteps_per_batch(mut self, timesteps: usize) -> Self {
        self.timesteps_per_batch = timesteps;
        self
    }

    /// Set total timestep budget
    pub fn num_timesteps(mut self, timesteps: usize) -> Self {
        self.num_timesteps = timesteps;
        self
    }

    /// Set target KL divergence
    pub fn desired_kl(mut self, kl: f64) -> Self {
        self.desired_kl = kl;
        self
    }

    /// Set checkpoint interval
    pub fn save_interval(mut self, interval: usize) -> Self {
        self.save_interval = interval;
        self
    }

    /// Set number of policy checkpoints kept
    pub fn max_to_keep(mut self, n: usize) -> Self {
        self.max_to_keep = n;
        self
    }

    /// Set resume iteration
    pub fn resume(mut self, iteration: usize) -> Self {
        self.resume = iteration;
        self
    }

    /// Set checkpoint prefix
    pub fn agent_name(mut self, name: impl Into<String>) -> Self {
        self.agent_name = name.into();
        self
    }

    /// Set log directory
    pub fn logdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.logdir = dir.into();
        self
    }

    /// Enable rendering
    pub fn animate(mut self, animate: bool) -> Self {
        self.animate = animate;
        self
    }

    /// Set maximum path length
    pub fn max_pathlength(mut self, len: usize) -> Self {
        self.max_pathlength = Some(len);
        self
    }

    /// Concatenate raw rather than filtered previous observations
    pub fn concat_raw_previous(mut self, raw: bool) -> Self {
        self.concat_raw_previous = raw;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LearnConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timesteps_per_batch, 2500);
        assert_eq!(config.desired_kl, 0.002);
        assert_eq!(config.initial_stepsize, 0.03);
        assert_eq!(config.agent_name, "acktr");
        assert_eq!(config.max_pathlength, None);
    }

    #[test]
    fn test_config_validation() {
        assert!(LearnConfig::new().gamma(1.5).validate().is_err());
        assert!(LearnConfig::new().lam(-0.1).validate().is_err());
        assert!(LearnConfig::new().timesteps_per_batch(0).validate().is_err());
        assert!(LearnConfig::new().desired_kl(0.0).validate().is_err());
        assert!(LearnConfig::new().agent_name("").validate().is_err());
        assert!(LearnConfig::new().max_pathlength(0).validate().is_err());

        let mut config = LearnConfig::new();
        config.initial_stepsize = 2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder_pattern() {
        let config = LearnConfig::new().timesteps_per_batch(500).save_interval(3).resume(6).logdir("/tmp/run");
        assert_eq!(config.timesteps_per_batch, 500);
        assert_eq!(config.save_interval, 3);
        assert_eq!(config.resume, 6);
        assert_eq!(config.logdir, PathBuf::from("/tmp/run"));
    }

    #[test]
    fn test_from_json_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "timesteps_per_batch": 1000, "agent_name": "pendulum" }"#).unwrap();

        let config = LearnConfig::from_json_file(&path).unwrap();
        assert_eq!(config.timesteps_per_batch, 1000);
        assert_eq!(config.agent_name, "pendulum");
        assert_eq!(config.gamma, 0.99);
    }

    #[test]
    fn test_from_json_file_rejects_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "gamma": 2.0 }"#).unwrap();
        assert!(LearnConfig::from_json_file(&path).is_err());
        assert!(LearnConfig::from_json_file(dir.path().join("missing.json")).is_err());
    }
}
