//! Append-only per-iteration log files
//!
//! - `log.txt`: mean episode reward, one per line
//! - `log_it.txt`: `iteration,mean_reward`
//! - `log_stats.txt`: one JSON object of iteration statistics per line

use std::{
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Serialize;

/// Writer for the scalar reward logs of one run
#[derive(Debug)]
pub struct RewardLog {
    dir: PathBuf,
    rewards: BufWriter<File>,
    iterations: BufWriter<File>,
    stats: BufWriter<File>,
}

fn open_append(path: &Path) -> Result<BufWriter<File>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    Ok(BufWriter::new(file))
}

impl RewardLog {
    /// Open (or create) the log files under `dir`, creating the directory
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).with_context(|| format!("Failed to create log directory {}", dir.display()))?;

        Ok(Self {
            dir: dir.to_path_buf(),
            rewards: open_append(&dir.join("log.txt"))?,
            iterations: open_append(&dir.join("log_it.txt"))?,
            stats: open_append(&dir.join("log_stats.txt"))?,
        })
    }

    /// Directory holding the log files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append one iteration's mean reward and statistics, then flush
    pub fn append<S: Serialize>(&mut self, iteration: usize, mean_reward: f64, stats: &S) -> Result<()> {
        writeln!(self.rewards, "{}", mean_reward)
            .and_then(|_| self.rewards.flush())
            .context("Failed to append to log.txt")?;
        writeln!(self.iterations, "{},{}", iteration, mean_reward)
            .and_then(|_| self.iterations.flush())
            .context("Failed to append to log_it.txt")?;

        let line = serde_json::to_string(stats)?;
        writeln!(self.stats, "{}", line)
            .and_then(|_| self.stats.flush())
            .context("Failed to append to log_stats.txt")?;
        Ok(())
    }
}
