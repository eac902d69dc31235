//! Observation normalization for stable RL training
//!
//! [`ZFilter`] keeps running mean and standard deviation statistics of every
//! observation it sees and maps observations to roughly zero mean, unit
//! variance, clipping the result. The filter is persisted next to policy
//! checkpoints so a resumed run normalizes observations exactly as before.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Small constant added to the standard deviation before dividing
const STD_EPSILON: f64 = 1e-8;

/// Running mean and variance of a vector-valued stream
///
/// Tracks statistics using Welford's online algorithm for numerical
/// stability. Variance is the unbiased sample variance (`n - 1`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningStat {
    n: u64,
    mean: Vec<f64>,
    s: Vec<f64>,
}

impl RunningStat {
    /// Create empty statistics for `dim`-dimensional samples
    pub fn new(dim: usize) -> Self {
        Self { n: 0, mean: vec![0.0; dim], s: vec![0.0; dim] }
    }

    /// Fold one sample into the statistics
    ///
    /// # Panics
    /// Panics if the sample dimension does not match.
    pub fn push(&mut self, x: &[f32]) {
        assert_eq!(x.len(), self.mean.len(), "Observation dimension mismatch");

        self.n += 1;
        if self.n == 1 {
            for (m, &v) in self.mean.iter_mut().zip(x) {
                *m = v as f64;
            }
            return;
        }

        let n = self.n as f64;
        for ((m, s), &v) in self.mean.iter_mut().zip(self.s.iter_mut()).zip(x) {
            let v = v as f64;
            let old_mean = *m;
            *m = old_mean + (v - old_mean) / n;
            *s += (v - old_mean) * (v - *m);
        }
    }

    /// Number of samples seen
    pub fn count(&self) -> u64 {
        self.n
    }

    /// Dimension of the samples
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Current mean
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Current variance
    ///
    /// With a single sample the squared mean is reported, so the first
    /// observation is scaled by its own magnitude.
    pub fn var(&self) -> Vec<f64> {
        if self.n > 1 {
            self.s.iter().map(|s| s / (self.n - 1) as f64).collect()
        } else {
            self.mean.iter().map(|m| m * m).collect()
        }
    }

    /// Current standard deviation
    pub fn std(&self) -> Vec<f64> {
        self.var().into_iter().map(f64::sqrt).collect()
    }
}

/// Running z-score filter: `y = clip((x - mean) / std, -clip, clip)`
///
/// # Example
///
/// ```rust
/// use acktr_rl::utils::filter::ZFilter;
///
/// let mut filter = ZFilter::new(2);
/// let normalized = filter.apply(&[1.0, 2.0]);
/// assert_eq!(normalized.len(), 2);
/// assert_eq!(filter.stats().count(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZFilter {
    demean: bool,
    destd: bool,
    clip: Option<f64>,
    rs: RunningStat,
}

impl ZFilter {
    /// Create a filter that demeans, scales and clips to `[-10, 10]`
    pub fn new(dim: usize) -> Self {
        Self::with_options(dim, true, true, Some(10.0))
    }

    /// Create a filter with explicit options
    ///
    /// # Arguments
    /// * `dim` - Dimension of observations
    /// * `demean` - Subtract the running mean
    /// * `destd` - Divide by the running standard deviation
    /// * `clip` - Symmetric clip applied after normalization
    pub fn with_options(dim: usize, demean: bool, destd: bool, clip: Option<f64>) -> Self {
        Self { demean, destd, clip, rs: RunningStat::new(dim) }
    }

    /// Update statistics with `x`, then normalize it
    pub fn apply(&mut self, x: &[f32]) -> Vec<f32> {
        self.rs.push(x);
        self.normalize(x)
    }

    /// Normalize `x` without touching the statistics
    pub fn normalize(&self, x: &[f32]) -> Vec<f32> {
        assert_eq!(x.len(), self.rs.dim(), "Observation dimension mismatch");

        let mean = self.rs.mean();
        let std = self.rs.std();
        x.iter()
            .enumerate()
            .map(|(i, &v)| {
                let mut y = v as f64;
                if self.demean {
                    y -= mean[i];
                }
                if self.destd {
                    y /= std[i] + STD_EPSILON;
                }
                if let Some(clip) = self.clip {
                    y = y.clamp(-clip, clip);
                }
                y as f32
            })
            .collect()
    }

    /// Running statistics behind the filter
    pub fn stats(&self) -> &RunningStat {
        &self.rs
    }

    /// Write the filter state to `path` as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string(self)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write observation filter to {}", path.display()))?;
        Ok(())
    }

    /// Read a filter previously written by [`ZFilter::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read observation filter from {}", path.display()))?;
        let filter = serde_json::from_str(&json)
            .with_context(|| format!("Malformed observation filter in {}", path.display()))?;
        Ok(filter)
    }
}
