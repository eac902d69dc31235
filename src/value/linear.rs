//! Linear value baseline fit by ridge regression
//!
//! Features of step `t` with observation `o`:
//!
//! ```text
//! [ clip(o, ±10), clip(o, ±10)², t/100, (t/100)², (t/100)³, 1 ]
//! ```

use std::fs;

use anyhow::{Context, Result, bail, ensure};
use serde::{Deserialize, Serialize};

use super::ValueFunction;
use crate::buffer::Path;

/// Initial ridge regularization
const INITIAL_REG: f64 = 1e-5;

/// Regularization is multiplied by ten on each failed solve, at most this
/// many times
const MAX_REG_RETRIES: usize = 5;

/// Observation clipping applied before building features
const FEATURE_CLIP: f32 = 10.0;

/// Linear regression on hand-built per-step features
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearValueFunction {
    coeffs: Option<Vec<f64>>,
}

impl LinearValueFunction {
    /// Create an unfitted baseline; it predicts zeros until the first fit
    pub fn new() -> Self {
        Self::default()
    }

    /// Fitted coefficients, if any
    pub fn coeffs(&self) -> Option<&[f64]> {
        self.coeffs.as_deref()
    }

    fn features(path: &Path) -> Vec<Vec<f64>> {
        path.observations
            .iter()
            .enumerate()
            .map(|(t, obs)| {
                let al = t as f64 / 100.0;
                let clipped: Vec<f64> = obs.iter().map(|&o| o.clamp(-FEATURE_CLIP, FEATURE_CLIP) as f64).collect();

                let mut row = Vec::with_capacity(2 * obs.len() + 4);
                row.extend_from_slice(&clipped);
                row.extend(clipped.iter().map(|o| o * o));
                row.extend_from_slice(&[al, al * al, al * al * al, 1.0]);
                row
            })
            .collect()
    }
}

impl ValueFunction for LinearValueFunction {
    fn predict(&self, path: &Path) -> Result<Vec<f32>> {
        let Some(coeffs) = &self.coeffs else {
            return Ok(vec![0.0; path.len()]);
        };

        Self::features(path)
            .iter()
            .map(|row| {
                ensure!(row.len() == coeffs.len(), "Feature dimension {} does not match fit {}", row.len(), coeffs.len());
                Ok(row.iter().zip(coeffs).map(|(x, w)| x * w).sum::<f64>() as f32)
            })
            .collect()
    }

    fn fit(&mut self, paths: &[Path], targets: &[Vec<f32>]) -> Result<()> {
        ensure!(paths.len() == targets.len(), "One target vector per path required");

        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for (path, target) in paths.iter().zip(targets) {
            ensure!(path.len() == target.len(), "Target length must match path length");
            xs.extend(Self::features(path));
            ys.extend(target.iter().map(|&y| y as f64));
        }
        if xs.is_empty() {
            return Ok(());
        }

        let dim = xs[0].len();
        let mut xtx = vec![0.0; dim * dim];
        let mut xty = vec![0.0; dim];
        for (row, &y) in xs.iter().zip(&ys) {
            for i in 0..dim {
                xty[i] += row[i] * y;
                for j in 0..dim {
                    xtx[i * dim + j] += row[i] * row[j];
                }
            }
        }

        let mut reg = INITIAL_REG;
        for _ in 0..=MAX_REG_RETRIES {
            let mut a = xtx.clone();
            for i in 0..dim {
                a[i * dim + i] += reg;
            }
            if let Some(coeffs) = cholesky_solve(&a, &xty, dim) {
                if coeffs.iter().all(|c| c.is_finite()) {
                    self.coeffs = Some(coeffs);
                    return Ok(());
                }
            }
            reg *= 10.0;
        }
        bail!("Value regression failed to solve even with regularization {:e}", reg / 10.0)
    }

    fn save(&self, path: &std::path::Path) -> Result<()> {
        let json = serde_json::to_string(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write value function to {}", path.display()))?;
        Ok(())
    }

    fn load(&mut self, path: &std::path::Path) -> Result<()> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read value function from {}", path.display()))?;
        *self = serde_json::from_str(&json)
            .with_context(|| format!("Malformed value function checkpoint {}", path.display()))?;
        Ok(())
    }
}

/// Solve `A x = b` for symmetric positive-definite `A` (row-major, `n × n`)
///
/// Returns `None` if `A` is not positive definite.
fn cholesky_solve(a: &[f64], b: &[f64], n: usize) -> Option<Vec<f64>> {
    let mut l = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i * n + j];
            for k in 0..j {
                sum -= l[i * n + k] * l[j * n + k];
            }
            if i == j {
                if sum <= 0.0 {
                    return None;
                }
                l[i * n + i] = sum.sqrt();
            } else {
                l[i * n + j] = sum / l[j * n + j];
            }
        }
    }

    // L y = b
    let mut y = vec![0.0; n];
    for i in 0..n {
        let s: f64 = (0..i).map(|k| l[i * n + k] * y[k]).sum();
        y[i] = (b[i] - s) / l[i * n + i];
    }
    // Lᵀ x = y
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let s: f64 = (i + 1..n).map(|k| l[k * n + i] * x[k]).sum();
        x[i] = (y[i] - s) / l[i * n + i];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ActionDist;

    fn path_from_observations(observations: &[Vec<f32>]) -> Path {
        let mut path = Path::with_capacity(observations.len());
        for obs in observations {
            path.push_decision(obs.clone(), vec![0.0], ActionDist::new(vec![0.0], vec![0.0]), 0.0);
            path.push_reward(0.0);
        }
        path
    }

    #[test]
    fn test_predicts_zero_before_fit() {
        let vf = LinearValueFunction::new();
        let path = path_from_observations(&[vec![1.0], vec![2.0], vec![3.0]]);
        assert_eq!(vf.predict(&path).unwrap(), vec![0.0; 3]);
        assert!(vf.coeffs().is_none());
    }

    #[test]
    fn test_fits_linear_target() {
        let observations: Vec<Vec<f32>> = (0..40).map(|i| vec![(i as f32 * 0.37).sin(), (i % 7) as f32]).collect();
        let path = path_from_observations(&observations);
        let targets: Vec<f32> = observations.iter().map(|o| 2.0 * o[0] - 0.5 * o[1] + 3.0).collect();

        let mut vf = LinearValueFunction::new();
        vf.fit(std::slice::from_ref(&path), std::slice::from_ref(&targets)).unwrap();
        let predicted = vf.predict(&path).unwrap();

        for (p, t) in predicted.iter().zip(&targets) {
            assert!((p - t).abs() < 1e-2, "predicted {} for target {}", p, t);
        }
    }

    #[test]
    fn test_fit_handles_degenerate_features() {
        // Constant observations make the normal equations singular without
        // regularization
        let path = path_from_observations(&vec![vec![1.0, 1.0]; 5]);
        let mut vf = LinearValueFunction::new();
        vf.fit(std::slice::from_ref(&path), &[vec![4.0; 5]]).unwrap();

        let predicted = vf.predict(&path).unwrap();
        assert!(predicted.iter().all(|p| (p - 4.0).abs() < 0.1), "{:?}", predicted);
    }

    #[test]
    fn test_fit_rejects_mismatched_targets() {
        let path = path_from_observations(&[vec![0.0], vec![1.0]]);
        let mut vf = LinearValueFunction::new();
        assert!(vf.fit(std::slice::from_ref(&path), &[vec![1.0]]).is_err());
        assert!(vf.fit(std::slice::from_ref(&path), &[]).is_err());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vf-3");
        let observations: Vec<Vec<f32>> = (0..10).map(|i| vec![i as f32]).collect();
        let p = path_from_observations(&observations);

        let mut vf = LinearValueFunction::new();
        vf.fit(std::slice::from_ref(&p), &[(0..10).map(|i| i as f32).collect()]).unwrap();
        vf.save(&path).unwrap();

        let mut restored = LinearValueFunction::new();
        restored.load(&path).unwrap();
        assert_eq!(restored, vf);
    }

    #[test]
    fn test_cholesky_solve() {
        let a = [4.0, 2.0, 2.0, 3.0];
        let x = cholesky_solve(&a, &[2.0, 1.0], 2).unwrap();
        assert!((4.0 * x[0] + 2.0 * x[1] - 2.0).abs() < 1e-12);
        assert!((2.0 * x[0] + 3.0 * x[1] - 1.0).abs() < 1e-12);

        assert!(cholesky_solve(&[0.0, 0.0, 0.0, 0.0], &[1.0, 1.0], 2).is_none());
    }
}
