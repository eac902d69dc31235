//! Training algorithms
//!
//! This module implements the ACKTR training loop for continuous control:
//! rollout collection, KL-driven step-size adaptation and the outer loop
//! with logging and checkpointing.

pub mod config;
pub mod learner;
pub mod rollout;
pub mod stats;
pub mod stepsize;

pub use config::LearnConfig;
pub use learner::{Learner, learn};
pub use rollout::{RolloutOptions, rescale_action, rollout};
pub use stats::{IterationSummary, PathStats};
pub use stepsize::{KlAdjustment, StepSizeController};
