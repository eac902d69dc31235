//! State-value baselines
//!
//! A value function predicts the discounted return from every step of a
//! path and is refit once per iteration on the empirical returns.

use anyhow::Result;

use crate::buffer::Path;

pub mod linear;

#[cfg(feature = "training")]
pub mod mlp;

pub use linear::LinearValueFunction;

#[cfg(feature = "training")]
pub use mlp::MlpValueFunction;

/// Value baseline used for advantage estimation
pub trait ValueFunction {
    /// Value prediction for every step of `path`
    fn predict(&self, path: &Path) -> Result<Vec<f32>>;

    /// Fit to `targets`, one vector of discounted returns per path
    fn fit(&mut self, paths: &[Path], targets: &[Vec<f32>]) -> Result<()>;

    /// Persist parameters to `path`
    ///
    /// Baselines without learned state keep the default no-op.
    fn save(&self, _path: &std::path::Path) -> Result<()> {
        Ok(())
    }

    /// Restore parameters from `path`
    fn load(&mut self, _path: &std::path::Path) -> Result<()> {
        Ok(())
    }
}

impl<V: ValueFunction + ?Sized> ValueFunction for Box<V> {
    fn predict(&self, path: &Path) -> Result<Vec<f32>> {
        (**self).predict(path)
    }

    fn fit(&mut self, paths: &[Path], targets: &[Vec<f32>]) -> Result<()> {
        (**self).fit(paths, targets)
    }

    fn save(&self, path: &std::path::Path) -> Result<()> {
        (**self).save(path)
    }

    fn load(&mut self, path: &std::path::Path) -> Result<()> {
        (**self).load(path)
    }
}
