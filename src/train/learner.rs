//! ACKTR outer training loop
//!
//! Each iteration:
//!
//! 1. Collect paths until more than `timesteps_per_batch` steps were taken
//! 2. Estimate returns and advantages with the current value function
//! 3. Refit the value function on the returns
//! 4. Take one natural-gradient policy step on the standardized batch
//! 5. Adapt the step size from the measured KL
//! 6. Log, checkpoint, call back

use anyhow::{Result, anyhow, ensure};

use super::{
    config::LearnConfig,
    rollout::{RolloutOptions, rollout},
    stats::{IterationSummary, PathStats},
    stepsize::StepSizeController,
};
use crate::{
    buffer::{Batch, estimate_advantages},
    checkpoint::Checkpointer,
    env::Environment,
    metrics::{RewardLog, TabularLogger},
    policy::Policy,
    utils::ZFilter,
    value::ValueFunction,
};

/// Render the first path of every this many iterations when animating
const ANIMATE_EVERY: usize = 10;

/// Training state for one run
pub struct Learner<E, P, V> {
    env: E,
    policy: P,
    vf: V,
    config: LearnConfig,
    obfilter: ZFilter,
    stepsize: StepSizeController,
    checkpointer: Checkpointer,
    reward_log: RewardLog,
    logger: TabularLogger,
    max_pathlength: usize,
    iteration: usize,
    timesteps_so_far: usize,
}

impl<E, P, V> Learner<E, P, V>
where
    E: Environment,
    P: Policy,
    V: ValueFunction,
{
    /// Set up a run: validate the config, open logs, and restore the policy,
    /// value function and observation filter when `config.resume > 0`
    pub fn new(env: E, mut policy: P, mut vf: V, config: LearnConfig) -> Result<Self> {
        config.validate()?;

        let max_pathlength = config
            .max_pathlength
            .or_else(|| env.max_episode_steps())
            .ok_or_else(|| anyhow!("max_pathlength must be set for environments without an episode limit"))?;
        ensure!(max_pathlength > 0, "max_pathlength must be positive, got 0 from the environment's episode limit");

        let checkpointer = Checkpointer::new(&config.logdir, config.agent_name.clone())?
            .with_save_interval(config.save_interval)
            .with_max_to_keep(config.max_to_keep);

        let obs_dim = env.observation_space().flat_dim();
        let obfilter = if config.resume > 0 {
            let filter = checkpointer.restore(config.resume, &mut policy, &mut vf)?;
            ensure!(
                filter.stats().dim() == obs_dim,
                "Observation filter {} has dimension {}, environment observations have {}",
                checkpointer.filter_path(config.resume).display(),
                filter.stats().dim(),
                obs_dim
            );
            filter
        } else {
            ZFilter::new(obs_dim)
        };

        let reward_log = RewardLog::open(&config.logdir)?;
        let stepsize = StepSizeController::new(
            config.initial_stepsize,
            config.desired_kl,
            config.min_stepsize,
            config.max_stepsize,
        );

        tracing::info!(
            "Learner ready: max_pathlength={}, timesteps_per_batch={}, logdir={}",
            max_pathlength,
            config.timesteps_per_batch,
            config.logdir.display()
        );

        Ok(Self {
            env,
            policy,
            vf,
            iteration: config.resume,
            config,
            obfilter,
            stepsize,
            checkpointer,
            reward_log,
            logger: TabularLogger::new(),
            max_pathlength,
            timesteps_so_far: 0,
        })
    }

    /// Current iteration counter
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Timesteps collected by this run
    pub fn timesteps_so_far(&self) -> usize {
        self.timesteps_so_far
    }

    /// Current step size
    pub fn stepsize(&self) -> f64 {
        self.stepsize.stepsize()
    }

    /// Observation filter
    pub fn obfilter(&self) -> &ZFilter {
        &self.obfilter
    }

    /// Policy being trained
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Value function being trained
    pub fn value_function(&self) -> &V {
        &self.vf
    }

    /// Training configuration
    pub fn config(&self) -> &LearnConfig {
        &self.config
    }

    /// Consume the learner, returning the policy, value function and filter
    pub fn into_parts(self) -> (P, V, ZFilter) {
        (self.policy, self.vf, self.obfilter)
    }

    /// Run until more than `num_timesteps` timesteps have been collected
    ///
    /// `callback` is called once per iteration after checkpointing.
    pub fn learn<F>(&mut self, mut callback: F) -> Result<()>
    where
        F: FnMut(&IterationSummary),
    {
        while self.timesteps_so_far <= self.config.num_timesteps {
            let summary = self.run_iteration()?;
            callback(&summary);
            self.logger.dump();
            self.iteration += 1;
        }
        tracing::info!("Training finished after {} timesteps", self.timesteps_so_far);
        Ok(())
    }

    /// Run one iteration without advancing the iteration counter
    pub fn run_iteration(&mut self) -> Result<IterationSummary> {
        let i = self.iteration;
        tracing::info!("********** Iteration {} ************", i);

        let mut paths = Vec::new();
        let mut timesteps_this_batch = 0;
        while timesteps_this_batch <= self.config.timesteps_per_batch {
            let options = RolloutOptions {
                max_pathlength: self.max_pathlength,
                animate: self.config.animate && paths.is_empty() && i % ANIMATE_EVERY == 0,
                concat_raw_previous: self.config.concat_raw_previous,
            };
            let path = rollout(&mut self.env, &mut self.policy, Some(&mut self.obfilter), &options)?;
            timesteps_this_batch += path.len();
            paths.push(path);
        }
        self.timesteps_so_far += timesteps_this_batch;

        // Predictions come from the value function before this iteration's fit
        let estimates = estimate_advantages(&paths, &self.vf, self.config.gamma as f32, self.config.lam as f32)?;
        self.vf.fit(&paths, &estimates.value_targets)?;

        let batch = Batch::from_paths(&paths, &estimates.advantages);
        let update = self.policy.update(&batch, self.stepsize.stepsize())?;

        let kl = self.policy.compute_kl(&batch.observations, &batch.old_dists)?;
        self.stepsize.adjust(kl);

        let path_stats = PathStats::from_paths(&paths);
        let summary = IterationSummary {
            iteration: i,
            timesteps_so_far: self.timesteps_so_far,
            num_paths: paths.len(),
            ep_rew_mean: path_stats.rew_mean,
            ep_rew_sem: path_stats.rew_sem,
            ep_len_mean: path_stats.len_mean,
            kl,
            stepsize: self.stepsize.stepsize(),
            surrogate_loss: update.surrogate_loss,
        };
        summary.record(&mut self.logger);
        self.reward_log.append(i, summary.ep_rew_mean, &summary)?;

        if self.checkpointer.should_save(i) {
            self.checkpointer.save(i, &self.policy, &self.vf, &self.obfilter)?;
        }

        Ok(summary)
    }
}

/// Train `policy` and `vf` on `env` with ACKTR
///
/// Convenience wrapper around [`Learner::new`] and [`Learner::learn`] that
/// returns the trained policy, value function and observation filter.
pub fn learn<E, P, V, F>(env: E, policy: P, vf: V, config: LearnConfig, callback: F) -> Result<(P, V, ZFilter)>
where
    E: Environment,
    P: Policy,
    V: ValueFunction,
    F: FnMut(&IterationSummary),
{
    let mut learner = Learner::new(env, policy, vf, config)?;
    learner.learn(callback)?;
    Ok(learner.into_parts())
}
