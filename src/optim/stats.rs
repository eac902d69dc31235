//! Fisher statistics accumulation, inline or on a background worker
//!
//! Policies hand per-sample score vectors (gradients of the log-probability
//! of actions drawn from the policy itself) to the optimizer. Their squared
//! mean is folded into an exponential moving average that approximates the
//! diagonal of the Fisher information matrix.

use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

/// How often the worker re-checks the shutdown flag while idle
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A batch of score vectors, `count` rows of `num_params` each, row-major
#[derive(Debug, Clone)]
pub struct ScoreBatch {
    /// Flattened score vectors
    pub scores: Vec<f64>,

    /// Number of rows
    pub count: usize,
}

impl ScoreBatch {
    /// Build a batch from individual score vectors
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        let scores = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Self { scores, count: rows.len() }
    }

    /// Mean of squared scores per parameter
    fn squared_mean(&self, num_params: usize) -> Vec<f64> {
        let mut out = vec![0.0; num_params];
        if self.count == 0 {
            return out;
        }
        for row in self.scores.chunks_exact(num_params) {
            for (o, &s) in out.iter_mut().zip(row) {
                *o += s * s;
            }
        }
        let n = self.count as f64;
        out.iter_mut().for_each(|o| *o /= n);
        out
    }
}

/// Running estimate of the Fisher diagonal
#[derive(Debug, Clone)]
pub struct FisherState {
    diag: Vec<f64>,
    batches: u64,
    decay: f64,
}

impl FisherState {
    /// Empty statistics for `num_params` parameters
    pub fn new(num_params: usize, decay: f64) -> Self {
        Self { diag: vec![0.0; num_params], batches: 0, decay }
    }

    /// Fold a score batch into the moving average
    ///
    /// The first batch initializes the estimate directly.
    pub fn fold(&mut self, batch: &ScoreBatch) {
        if batch.count == 0 {
            return;
        }
        let fresh = batch.squared_mean(self.diag.len());
        if self.batches == 0 {
            self.diag = fresh;
        } else {
            for (d, f) in self.diag.iter_mut().zip(fresh) {
                *d = self.decay * *d + (1.0 - self.decay) * f;
            }
        }
        self.batches += 1;
    }

    /// Current diagonal estimate
    pub fn diag(&self) -> &[f64] {
        &self.diag
    }

    /// Number of batches folded so far
    pub fn batches(&self) -> u64 {
        self.batches
    }
}

enum WorkerMsg {
    Scores(ScoreBatch),
    Sync(Sender<()>),
}

/// Background thread folding score batches into shared Fisher statistics
///
/// Started once per optimizer. The thread exits when the shutdown flag is
/// raised or the sending side is dropped; dropping the worker does both and
/// joins it.
pub struct StatsWorker {
    sender: Option<Sender<WorkerMsg>>,
    state: Arc<Mutex<FisherState>>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl StatsWorker {
    /// Spawn the worker thread
    pub fn spawn(num_params: usize, decay: f64) -> Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let state = Arc::new(Mutex::new(FisherState::new(num_params, decay)));
        let shutdown = Arc::new(AtomicBool::new(false));

        let handle = {
            let state = Arc::clone(&state);
            let shutdown = Arc::clone(&shutdown);
            thread::Builder::new()
                .name("fisher-stats".into())
                .spawn(move || run_worker(receiver, state, shutdown))
                .context("Failed to spawn Fisher statistics worker")?
        };

        tracing::debug!("Fisher statistics worker started for {} parameters", num_params);
        Ok(Self { sender: Some(sender), state, shutdown, handle: Some(handle) })
    }

    /// Queue a score batch; returns immediately
    pub fn submit(&self, batch: ScoreBatch) -> Result<()> {
        self.sender
            .as_ref()
            .ok_or_else(|| anyhow!("Fisher statistics worker is shut down"))?
            .send(WorkerMsg::Scores(batch))
            .map_err(|_| anyhow!("Fisher statistics worker has exited"))
    }

    /// Block until every batch submitted so far has been folded
    pub fn sync(&self) -> Result<()> {
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        self.sender
            .as_ref()
            .ok_or_else(|| anyhow!("Fisher statistics worker is shut down"))?
            .send(WorkerMsg::Sync(ack_tx))
            .map_err(|_| anyhow!("Fisher statistics worker has exited"))?;
        ack_rx.recv().map_err(|_| anyhow!("Fisher statistics worker exited before acknowledging"))
    }

    /// Copy of the statistics as folded so far
    pub fn snapshot(&self) -> FisherState {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Raise the shutdown flag and join the thread
    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Fisher statistics worker panicked");
            }
        }
    }
}

impl Drop for StatsWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for StatsWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsWorker")
            .field("running", &self.handle.is_some())
            .finish()
    }
}

fn run_worker(receiver: Receiver<WorkerMsg>, state: Arc<Mutex<FisherState>>, shutdown: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::SeqCst) {
        match receiver.recv_timeout(POLL_INTERVAL) {
            Ok(WorkerMsg::Scores(batch)) => {
                state.lock().unwrap_or_else(PoisonError::into_inner).fold(&batch);
            }
            Ok(WorkerMsg::Sync(ack)) => {
                let _ = ack.send(());
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    tracing::debug!("Fisher statistics worker stopped");
}
