//! Diagonal Gaussian action distributions

use std::f64::consts::{E, PI};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Parameters of a diagonal Gaussian over continuous actions
///
/// This is the action-distribution descriptor recorded at every rollout step
/// and later used to measure how far an update moved the policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDist {
    /// Per-dimension mean
    pub mean: Vec<f32>,

    /// Per-dimension log standard deviation
    pub log_std: Vec<f32>,
}

impl ActionDist {
    /// Create a distribution from its mean and log standard deviation
    ///
    /// # Panics
    /// Panics if the two vectors differ in length.
    pub fn new(mean: Vec<f32>, log_std: Vec<f32>) -> Self {
        assert_eq!(mean.len(), log_std.len(), "mean and log_std must have equal length");
        Self { mean, log_std }
    }

    /// Action dimensionality
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Per-dimension standard deviation
    pub fn std(&self) -> Vec<f32> {
        self.log_std.iter().map(|l| l.exp()).collect()
    }

    /// Draw one action
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Vec<f32> {
        self.mean
            .iter()
            .zip(&self.log_std)
            .map(|(&m, &l)| {
                let z = standard_normal(rng);
                m + l.exp() * z as f32
            })
            .collect()
    }

    /// Log density of `x`
    pub fn log_prob(&self, x: &[f32]) -> f32 {
        assert_eq!(x.len(), self.dim(), "Action dimension mismatch");

        let mut quad = 0.0;
        let mut log_std_sum = 0.0;
        for ((&xi, &m), &l) in x.iter().zip(&self.mean).zip(&self.log_std) {
            let z = (xi as f64 - m as f64) / (l as f64).exp();
            quad += z * z;
            log_std_sum += l as f64;
        }
        (-0.5 * quad - log_std_sum - 0.5 * self.dim() as f64 * (2.0 * PI).ln()) as f32
    }

    /// `KL(self || other)`
    pub fn kl(&self, other: &ActionDist) -> f32 {
        assert_eq!(self.dim(), other.dim(), "Distribution dimension mismatch");

        let mut kl = 0.0;
        for i in 0..self.dim() {
            let (m1, l1) = (self.mean[i] as f64, self.log_std[i] as f64);
            let (m2, l2) = (other.mean[i] as f64, other.log_std[i] as f64);
            let (var1, var2) = ((2.0 * l1).exp(), (2.0 * l2).exp());
            kl += l2 - l1 + (var1 + (m1 - m2).powi(2)) / (2.0 * var2) - 0.5;
        }
        kl as f32
    }

    /// Differential entropy
    pub fn entropy(&self) -> f32 {
        let per_dim = 0.5 * (2.0 * PI * E).ln();
        self.log_std.iter().map(|&l| l as f64 + per_dim).sum::<f64>() as f32
    }
}

/// One standard normal sample via the Box-Muller transform
pub(crate) fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    let u1 = rng.gen::<f64>().max(1e-12);
    let u2 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}
