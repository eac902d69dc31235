//! Periodic persistence of the policy and observation filter
//!
//! Checkpoints for iteration `i` are files in the log directory:
//! `{agent_name}-{i}` (policy parameters), `obfilter-{i}` (observation
//! filter) and `vf-{i}` (value function). Only the most recent
//! `max_to_keep` policy checkpoints written by this checkpointer are kept.

use std::{
    collections::VecDeque,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};

use crate::{policy::Policy, utils::ZFilter, value::ValueFunction};

/// Saves and restores policy/filter checkpoint pairs
#[derive(Debug)]
pub struct Checkpointer {
    dir: PathBuf,
    agent_name: String,
    save_interval: usize,
    max_to_keep: usize,
    history: VecDeque<PathBuf>,
}

impl Checkpointer {
    /// Create a checkpointer writing to `dir`, creating the directory
    pub fn new(dir: impl Into<PathBuf>, agent_name: impl Into<String>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create checkpoint directory {}", dir.display()))?;
        Ok(Self { dir, agent_name: agent_name.into(), save_interval: 10, max_to_keep: 10, history: VecDeque::new() })
    }

    /// Set the save interval (0 disables checkpointing)
    pub fn with_save_interval(mut self, interval: usize) -> Self {
        self.save_interval = interval;
        self
    }

    /// Set the number of policy checkpoints to keep (0 = keep all)
    pub fn with_max_to_keep(mut self, n: usize) -> Self {
        self.max_to_keep = n;
        self
    }

    /// Checkpoint directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether iteration `iteration` should be checkpointed
    ///
    /// The first iteration is always saved so a run can be resumed early.
    pub fn should_save(&self, iteration: usize) -> bool {
        self.save_interval > 0 && (iteration % self.save_interval == 0 || iteration == 1)
    }

    /// Path of the policy checkpoint for `iteration`
    pub fn policy_path(&self, iteration: usize) -> PathBuf {
        self.dir.join(format!("{}-{}", self.agent_name, iteration))
    }

    /// Path of the observation filter checkpoint for `iteration`
    pub fn filter_path(&self, iteration: usize) -> PathBuf {
        self.dir.join(format!("obfilter-{}", iteration))
    }

    /// Path of the value function checkpoint for `iteration`
    pub fn value_path(&self, iteration: usize) -> PathBuf {
        self.dir.join(format!("vf-{}", iteration))
    }

    /// Write the checkpoint files for `iteration`
    pub fn save<P, V>(&mut self, iteration: usize, policy: &P, vf: &V, filter: &ZFilter) -> Result<PathBuf>
    where
        P: Policy + ?Sized,
        V: ValueFunction + ?Sized,
    {
        let policy_path = self.policy_path(iteration);
        policy
            .save(&policy_path)
            .with_context(|| format!("Failed to save checkpoint for iteration {}", iteration))?;
        filter.save(self.filter_path(iteration))?;
        vf.save(&self.value_path(iteration))?;
        tracing::info!("Saved checkpoint {}", policy_path.display());

        self.history.push_back(policy_path.clone());
        self.cleanup_old_checkpoints();
        Ok(policy_path)
    }

    fn cleanup_old_checkpoints(&mut self) {
        if self.max_to_keep == 0 {
            return;
        }
        while self.history.len() > self.max_to_keep {
            if let Some(old) = self.history.pop_front() {
                if let Err(e) = fs::remove_file(&old) {
                    tracing::warn!("Failed to remove old checkpoint {}: {}", old.display(), e);
                }
            }
        }
    }

    /// Restore the policy and value function and return the filter saved at
    /// `iteration`
    ///
    /// Fails if the policy or filter file is missing. A missing value
    /// function file leaves `vf` untouched.
    pub fn restore<P, V>(&self, iteration: usize, policy: &mut P, vf: &mut V) -> Result<ZFilter>
    where
        P: Policy + ?Sized,
        V: ValueFunction + ?Sized,
    {
        let policy_path = self.policy_path(iteration);
        let filter_path = self.filter_path(iteration);
        if !policy_path.exists() {
            bail!("Cannot resume: policy checkpoint {} not found", policy_path.display());
        }
        if !filter_path.exists() {
            bail!("Cannot resume: observation filter {} not found", filter_path.display());
        }

        policy.load(&policy_path)?;
        let filter = ZFilter::load(&filter_path)?;

        let value_path = self.value_path(iteration);
        if value_path.exists() {
            vf.load(&value_path)?;
        } else {
            tracing::warn!("No value function checkpoint at {}, starting from scratch", value_path.display());
        }
        tracing::info!("Resumed from iteration {} ({})", iteration, policy_path.display());
        Ok(filter)
    }
}
