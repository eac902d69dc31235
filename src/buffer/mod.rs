//! Trajectory storage and advantage estimation
//!
//! This module holds the data collected by rollouts and turns it into
//! training data:
//! - [`Path`]: one episode's observations, actions, distributions and rewards
//! - [`gae`]: discounted returns and generalized advantage estimates
//! - [`Batch`]: one iteration's paths concatenated for a policy update

pub mod batch;
pub mod gae;
pub mod path;

mod tests;

pub use batch::Batch;
pub use gae::{AdvantageEstimates, discount, estimate_advantages, path_advantages, standardize};
pub use path::Path;
