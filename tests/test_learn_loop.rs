//! End-to-end tests of the training loop on Pendulum
//!
//! Runs are kept to a handful of iterations with small batches; they check
//! the loop's bookkeeping (logs, checkpoints, resume, step-size bounds)
//! rather than learning progress.

use std::fs;

use acktr_rl::{
    env::{Environment, Pendulum, SpaceInfo, StepInfo, StepResult},
    optim::NaturalGradientConfig,
    policy::{LinearGaussianPolicy, Policy},
    train::{IterationSummary, LearnConfig, Learner, learn},
    utils::ZFilter,
    value::LinearValueFunction,
};
use anyhow::Result;

fn policy(seed: u64) -> LinearGaussianPolicy {
    // Pendulum observations are 3-dimensional; the policy sees two of them
    LinearGaussianPolicy::seeded(6, 1, NaturalGradientConfig::default(), seed).unwrap()
}

fn small_config(logdir: &std::path::Path) -> LearnConfig {
    LearnConfig::default().logdir(logdir).timesteps_per_batch(400).save_interval(2)
}

fn read_lines(path: std::path::PathBuf) -> Vec<String> {
    fs::read_to_string(path).unwrap().lines().map(String::from).collect()
}

#[test]
fn test_learn_writes_logs_and_checkpoints() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path()).num_timesteps(2500);

    let mut summaries: Vec<IterationSummary> = Vec::new();
    learn(Pendulum::seeded(0), policy(0), LinearValueFunction::new(), config, |s| summaries.push(s.clone())).unwrap();

    // 200-step paths: three per iteration (600 timesteps), five iterations to pass 2500
    assert_eq!(summaries.len(), 5);
    for (i, s) in summaries.iter().enumerate() {
        assert_eq!(s.iteration, i);
        assert_eq!(s.num_paths, 3);
        assert_eq!(s.timesteps_so_far, 600 * (i + 1));
        assert_eq!(s.ep_len_mean, 200.0);
        assert!(s.kl.is_finite());
    }

    let rewards = read_lines(dir.path().join("log.txt"));
    assert_eq!(rewards.len(), 5);
    let iterations = read_lines(dir.path().join("log_it.txt"));
    assert_eq!(iterations.len(), 5);
    assert!(iterations[3].starts_with("3,"));
    assert_eq!(read_lines(dir.path().join("log_stats.txt")).len(), 5);

    // save_interval = 2: iterations 0, 1, 2 and 4
    for it in [0, 1, 2, 4] {
        assert!(dir.path().join(format!("acktr-{}", it)).exists(), "missing policy checkpoint {}", it);
        assert!(dir.path().join(format!("obfilter-{}", it)).exists(), "missing filter checkpoint {}", it);
        assert!(dir.path().join(format!("vf-{}", it)).exists(), "missing value checkpoint {}", it);
    }
    assert!(!dir.path().join("acktr-3").exists());
}

#[test]
fn test_stepsize_stays_in_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path()).num_timesteps(3000).save_interval(0);

    let mut count = 0;
    learn(Pendulum::seeded(1), policy(1), LinearValueFunction::new(), config, |s| {
        assert!(s.stepsize >= 1e-8 && s.stepsize <= 1.0, "stepsize {} out of bounds", s.stepsize);
        count += 1;
    })
    .unwrap();

    assert!(count > 0);
    // No checkpoints when disabled
    assert!(!dir.path().join("acktr-0").exists());
}

#[test]
fn test_max_pathlength_overrides_env_limit() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path()).num_timesteps(100).max_pathlength(50);

    let mut lens = Vec::new();
    learn(Pendulum::seeded(2), policy(2), LinearValueFunction::new(), config, |s| lens.push(s.ep_len_mean)).unwrap();

    assert_eq!(lens, vec![50.0]);
}

#[test]
fn test_resume_fails_without_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path()).resume(3);

    let err = Learner::new(Pendulum::seeded(0), policy(0), LinearValueFunction::new(), config.clone())
        .err()
        .expect("resume without checkpoint must fail");
    assert!(err.to_string().contains("acktr-3"), "{}", err);

    // Policy present, filter missing
    policy(0).save(&dir.path().join("acktr-3")).unwrap();
    let err = Learner::new(Pendulum::seeded(0), policy(0), LinearValueFunction::new(), config)
        .err()
        .expect("resume without filter must fail");
    assert!(err.to_string().contains("obfilter-3"), "{}", err);
}

#[test]
fn test_resume_restores_filter_and_iteration() {
    let dir = tempfile::tempdir().unwrap();

    // Two iterations: 0 and 1, checkpointed at both
    let first = small_config(dir.path()).num_timesteps(700);
    let (trained, _, _) = learn(Pendulum::seeded(3), policy(3), LinearValueFunction::new(), first, |_| {}).unwrap();
    let saved_filter = ZFilter::load(dir.path().join("obfilter-1")).unwrap();

    let resumed = small_config(dir.path()).num_timesteps(500).resume(1);
    let mut learner = Learner::new(Pendulum::seeded(4), policy(99), LinearValueFunction::new(), resumed).unwrap();

    assert_eq!(learner.iteration(), 1);
    assert_eq!(learner.timesteps_so_far(), 0);
    assert_eq!(learner.obfilter(), &saved_filter);
    assert_eq!(learner.policy().params(), trained.params());

    let mut iterations = Vec::new();
    learner.learn(|s| iterations.push(s.iteration)).unwrap();
    assert_eq!(iterations, vec![1]);
    assert_eq!(learner.iteration(), 2);

    // Resumed iteration appended after the two earlier ones
    let lines = read_lines(dir.path().join("log_it.txt"));
    assert_eq!(lines.len(), 3);
    assert!(lines[2].starts_with("1,"));
}

/// Environment whose episode limit is whatever it is built with
struct Endless {
    episode_limit: Option<usize>,
}

impl Environment for Endless {
    fn reset(&mut self) -> Result<Vec<f32>> {
        Ok(vec![0.0; 3])
    }

    fn step(&mut self, _action: &[f32]) -> Result<StepResult> {
        Ok(StepResult {
            observation: vec![0.0; 3],
            reward: 0.0,
            terminated: false,
            truncated: false,
            info: StepInfo::default(),
        })
    }

    fn observation_space(&self) -> SpaceInfo {
        SpaceInfo::continuous(3)
    }

    fn action_space(&self) -> SpaceInfo {
        SpaceInfo::bounded(vec![-1.0], vec![1.0])
    }

    fn max_episode_steps(&self) -> Option<usize> {
        self.episode_limit
    }
}

#[test]
fn test_unbounded_env_requires_max_pathlength() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());
    let endless = || Endless { episode_limit: None };
    assert!(Learner::new(endless(), policy(0), LinearValueFunction::new(), config.clone()).is_err());
    assert!(Learner::new(endless(), policy(0), LinearValueFunction::new(), config.max_pathlength(10)).is_ok());
}

#[test]
fn test_zero_episode_limit_is_rejected() {
    // Zero-length paths would never fill a batch
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path()).timesteps_per_batch(10);
    let err = Learner::new(Endless { episode_limit: Some(0) }, policy(0), LinearValueFunction::new(), config)
        .err()
        .expect("zero episode limit must be rejected");
    assert!(err.to_string().contains("max_pathlength"), "{}", err);
}

#[test]
fn test_resume_rejects_filter_of_wrong_dimension() {
    let dir = tempfile::tempdir().unwrap();
    policy(0).save(&dir.path().join("acktr-1")).unwrap();
    ZFilter::new(5).save(dir.path().join("obfilter-1")).unwrap();

    let config = small_config(dir.path()).resume(1);
    let err = Learner::new(Pendulum::seeded(0), policy(0), LinearValueFunction::new(), config)
        .err()
        .expect("filter dimension mismatch must fail");
    assert!(err.to_string().contains("obfilter-1"), "{}", err);
}
