//! Episode length bound for arbitrary environments

use anyhow::Result;

use crate::env::{Environment, SpaceInfo, StepResult};

/// Wrapper that truncates episodes after a fixed number of steps
///
/// Truncation is reported through [`StepResult::truncated`] and never sets
/// `terminated`, so the advantage estimator keeps bootstrapping from the
/// value function at the cut.
#[derive(Debug)]
pub struct TimeLimit<E> {
    env: E,
    max_steps: usize,
    elapsed: usize,
}

impl<E: Environment> TimeLimit<E> {
    /// Wrap `env`, truncating episodes after `max_steps` steps
    pub fn new(env: E, max_steps: usize) -> Self {
        assert!(max_steps > 0, "max_steps must be positive");
        Self { env, max_steps, elapsed: 0 }
    }

    /// Steps taken in the current episode
    pub fn elapsed_steps(&self) -> usize {
        self.elapsed
    }

    /// Borrow the wrapped environment
    pub fn inner(&self) -> &E {
        &self.env
    }

    /// Unwrap into the wrapped environment
    pub fn into_inner(self) -> E {
        self.env
    }
}

impl<E: Environment> Environment for TimeLimit<E> {
    fn reset(&mut self) -> Result<Vec<f32>> {
        self.elapsed = 0;
        self.env.reset()
    }

    fn step(&mut self, action: &[f32]) -> Result<StepResult> {
        let mut result = self.env.step(action)?;
        self.elapsed += 1;
        if self.elapsed >= self.max_steps && !result.terminated {
            result.truncated = true;
        }
        result.info.elapsed_steps = Some(self.elapsed);
        Ok(result)
    }

    fn observation_space(&self) -> SpaceInfo {
        self.env.observation_space()
    }

    fn action_space(&self) -> SpaceInfo {
        self.env.action_space()
    }

    fn max_episode_steps(&self) -> Option<usize> {
        match self.env.max_episode_steps() {
            Some(inner) => Some(inner.min(self.max_steps)),
            None => Some(self.max_steps),
        }
    }

    fn render(&mut self) -> Result<()> {
        self.env.render()
    }
}
