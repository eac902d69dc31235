//! Utility functions and helpers

pub mod filter;

pub use filter::{RunningStat, ZFilter};

/// Arithmetic mean, `NaN` for an empty slice
pub fn mean(values: &[f32]) -> f32 {
    values.iter().sum::<f32>() / values.len() as f32
}

/// Population standard deviation, `NaN` for an empty slice
pub fn std(values: &[f32]) -> f32 {
    let m = mean(values);
    let var = values.iter().map(|&x| (x - m).powi(2)).sum::<f32>() / values.len() as f32;
    var.sqrt()
}
