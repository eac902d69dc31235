//! Training metrics output
//!
//! [`TabularLogger`] collects per-iteration key/value diagnostics and dumps
//! them as an aligned table through `tracing`. [`RewardLog`] appends the
//! per-iteration scalar logs to files in the run's log directory.

pub mod logger;
pub mod reward_log;

pub use logger::TabularLogger;
pub use reward_log::RewardLog;
