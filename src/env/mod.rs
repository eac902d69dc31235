//! Environment traits and implementations
//!
//! This module defines the environment interface driven by the rollout
//! collector and provides a built-in continuous-control environment.

use anyhow::{Result, bail};

/// Core trait for RL environments
///
/// Observations and actions are flat `f32` vectors. Policies emit actions in
/// `[-1, 1]` which the rollout collector rescales into the bounds reported by
/// [`Environment::action_space`].
pub trait Environment {
    /// Reset the environment and return initial observation
    fn reset(&mut self) -> Result<Vec<f32>>;

    /// Step the environment with an action already rescaled into the action
    /// space bounds
    fn step(&mut self, action: &[f32]) -> Result<StepResult>;

    /// Get the observation space dimensions
    fn observation_space(&self) -> SpaceInfo;

    /// Get the action space dimensions
    fn action_space(&self) -> SpaceInfo;

    /// Maximum number of steps in one episode, if the environment bounds it
    fn max_episode_steps(&self) -> Option<usize> {
        None
    }

    /// Render the current state (no-op unless overridden)
    fn render(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<E: Environment + ?Sized> Environment for Box<E> {
    fn reset(&mut self) -> Result<Vec<f32>> {
        (**self).reset()
    }

    fn step(&mut self, action: &[f32]) -> Result<StepResult> {
        (**self).step(action)
    }

    fn observation_space(&self) -> SpaceInfo {
        (**self).observation_space()
    }

    fn action_space(&self) -> SpaceInfo {
        (**self).action_space()
    }

    fn max_episode_steps(&self) -> Option<usize> {
        (**self).max_episode_steps()
    }

    fn render(&mut self) -> Result<()> {
        (**self).render()
    }
}

/// Result of an environment step
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Next observation
    pub observation: Vec<f32>,

    /// Reward received
    pub reward: f32,

    /// Whether the episode terminated naturally
    pub terminated: bool,

    /// Whether the episode was cut off by a step limit
    pub truncated: bool,

    /// Additional info
    pub info: StepInfo,
}

impl StepResult {
    /// Whether the episode is over for either reason
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Space information for observations and actions
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceInfo {
    /// Shape of the space
    pub shape: Vec<usize>,

    /// Data type
    pub dtype: SpaceType,
}

impl SpaceInfo {
    /// Build a one-dimensional bounded box space
    pub fn bounded(low: Vec<f32>, high: Vec<f32>) -> Self {
        assert_eq!(low.len(), high.len(), "Box bounds must have equal length");
        Self { shape: vec![low.len()], dtype: SpaceType::Box { low, high } }
    }

    /// Build a one-dimensional unbounded continuous space
    pub fn continuous(dim: usize) -> Self {
        Self { shape: vec![dim], dtype: SpaceType::Continuous }
    }

    /// Number of scalar elements in the space
    pub fn flat_dim(&self) -> usize {
        self.shape.iter().product()
    }

    /// Lower and upper bounds of a box space
    ///
    /// Errors for discrete and unbounded spaces, which cannot be used to
    /// rescale policy outputs.
    pub fn bounds(&self) -> Result<(&[f32], &[f32])> {
        match &self.dtype {
            SpaceType::Box { low, high } => Ok((low, high)),
            other => bail!("Expected a bounded box action space, got {:?}", other),
        }
    }
}

/// Space data types
#[derive(Debug, Clone, PartialEq)]
pub enum SpaceType {
    /// Discrete space with n options
    Discrete(usize),

    /// Continuous space without bounds
    Continuous,

    /// Continuous space bounded per dimension
    Box {
        /// Lower bound per dimension
        low: Vec<f32>,
        /// Upper bound per dimension
        high: Vec<f32>,
    },
}

/// Additional step information
#[derive(Debug, Clone, Default)]
pub struct StepInfo {
    /// Steps taken in the current episode, when tracked by a wrapper
    pub elapsed_steps: Option<usize>,
}

pub mod pendulum;
pub mod time_limit;

pub use pendulum::Pendulum;
pub use time_limit::TimeLimit;
