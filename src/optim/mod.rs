//! Natural-gradient optimization
//!
//! A diagonal approximation of the Kronecker-factored natural gradient used
//! by ACKTR. Fisher statistics can be folded on a background thread so the
//! training thread only reads a snapshot when it steps.

pub mod natural;
pub mod stats;

pub use natural::{NaturalGradientConfig, NaturalGradientOptimizer, StepReport};
pub use stats::{FisherState, ScoreBatch, StatsWorker};
