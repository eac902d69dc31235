//! Pendulum swing-up environment
//!
//! A frictionless pendulum starts at a random angle and must be swung up and
//! held upright by applying a bounded torque at the pivot.
//!
//! # Physics
//!
//! - State: [theta, theta_dot] (angle from upright, angular velocity)
//! - Observation: [cos(theta), sin(theta), theta_dot]
//! - Action: torque in [-2, 2]
//! - Reward: -(theta² + 0.1 * theta_dot² + 0.001 * torque²), theta normalized
//!   to [-pi, pi]
//! - Episodes never terminate naturally; they are truncated at 200 steps
//!
//! # Reference
//!
//! Based on OpenAI Gym Pendulum-v0:
//! <https://github.com/openai/gym/blob/master/gym/envs/classic_control/pendulum.py>

use std::f32::consts::PI;

use anyhow::{Result, ensure};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::env::{Environment, SpaceInfo, StepInfo, StepResult};

/// Pendulum swing-up environment
#[derive(Debug)]
pub struct Pendulum {
    theta: f32,
    theta_dot: f32,

    steps: usize,
    max_steps: usize,

    max_speed: f32,
    max_torque: f32,
    dt: f32,
    gravity: f32,
    mass: f32,
    length: f32,

    rng: StdRng,
}

impl Pendulum {
    /// Create a new Pendulum seeded from entropy
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Create a new Pendulum with a fixed seed
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            theta: 0.0,
            theta_dot: 0.0,
            steps: 0,
            max_steps: 200,
            max_speed: 8.0,
            max_torque: 2.0,
            dt: 0.05,
            gravity: 10.0,
            mass: 1.0,
            length: 1.0,
            rng,
        }
    }

    fn observation(&self) -> Vec<f32> {
        vec![self.theta.cos(), self.theta.sin(), self.theta_dot]
    }
}

impl Default for Pendulum {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap an angle into [-pi, pi)
fn angle_normalize(x: f32) -> f32 {
    (x + PI).rem_euclid(2.0 * PI) - PI
}

impl Environment for Pendulum {
    fn reset(&mut self) -> Result<Vec<f32>> {
        self.theta = self.rng.gen_range(-PI..PI);
        self.theta_dot = self.rng.gen_range(-1.0..1.0);
        self.steps = 0;
        Ok(self.observation())
    }

    fn step(&mut self, action: &[f32]) -> Result<StepResult> {
        ensure!(action.len() == 1, "Pendulum expects a 1-dimensional action, got {}", action.len());

        let u = action[0].clamp(-self.max_torque, self.max_torque);
        let cost = angle_normalize(self.theta).powi(2)
            + 0.1 * self.theta_dot.powi(2)
            + 0.001 * u.powi(2);

        // theta is measured from upright, so gravity pushes it away from zero
        let (g, m, l, dt) = (self.gravity, self.mass, self.length, self.dt);
        let theta_acc = -3.0 * g / (2.0 * l) * (self.theta + PI).sin() + 3.0 / (m * l * l) * u;
        self.theta_dot = (self.theta_dot + theta_acc * dt).clamp(-self.max_speed, self.max_speed);
        self.theta += self.theta_dot * dt;
        self.steps += 1;

        Ok(StepResult {
            observation: self.observation(),
            reward: -cost,
            terminated: false,
            truncated: self.steps >= self.max_steps,
            info: StepInfo { elapsed_steps: Some(self.steps) },
        })
    }

    fn observation_space(&self) -> SpaceInfo {
        SpaceInfo::bounded(vec![-1.0, -1.0, -self.max_speed], vec![1.0, 1.0, self.max_speed])
    }

    fn action_space(&self) -> SpaceInfo {
        SpaceInfo::bounded(vec![-self.max_torque], vec![self.max_torque])
    }

    fn max_episode_steps(&self) -> Option<usize> {
        Some(self.max_steps)
    }
}
