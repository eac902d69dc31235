//! Concatenation of one iteration's paths into a policy-update batch

use super::{gae::standardize, path::Path};
use crate::policy::ActionDist;

/// A batch of rollout data ready for one policy update
#[derive(Debug, Clone, Default)]
pub struct Batch {
    /// Policy inputs \[batch_size, state_dim\]
    pub observations: Vec<Vec<f32>>,

    /// Raw policy actions \[batch_size, act_dim\]
    pub actions: Vec<Vec<f32>>,

    /// Action distributions at collection time \[batch_size\]
    pub old_dists: Vec<ActionDist>,

    /// Log probabilities at collection time \[batch_size\]
    pub log_probs: Vec<f32>,

    /// Standardized advantages \[batch_size\]
    pub advantages: Vec<f32>,
}

impl Batch {
    /// Concatenate `paths` along the time axis
    ///
    /// `advantages` holds one vector per path, in the same order, and is
    /// standardized across the whole batch.
    ///
    /// # Panics
    ///
    /// Panics if the advantage vectors do not line up with the paths.
    pub fn from_paths(paths: &[Path], advantages: &[Vec<f32>]) -> Self {
        assert_eq!(paths.len(), advantages.len(), "One advantage vector per path required");

        let total: usize = paths.iter().map(Path::len).sum();
        let mut batch = Batch {
            observations: Vec::with_capacity(total),
            actions: Vec::with_capacity(total),
            old_dists: Vec::with_capacity(total),
            log_probs: Vec::with_capacity(total),
            advantages: Vec::with_capacity(total),
        };

        let mut raw_advantages = Vec::with_capacity(total);
        for (path, adv) in paths.iter().zip(advantages) {
            assert_eq!(path.len(), adv.len(), "Advantage length must match path length");
            batch.observations.extend(path.observations.iter().cloned());
            batch.actions.extend(path.actions.iter().cloned());
            batch.old_dists.extend(path.action_dists.iter().cloned());
            batch.log_probs.extend_from_slice(&path.log_probs);
            raw_advantages.extend_from_slice(adv);
        }
        batch.advantages = standardize(&raw_advantages);

        batch
    }

    /// Get batch size
    pub fn len(&self) -> usize {
        self.log_probs.len()
    }

    /// Check if batch is empty
    pub fn is_empty(&self) -> bool {
        self.log_probs.is_empty()
    }
}
