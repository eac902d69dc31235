//! KL-driven step-size adaptation
//!
//! ```text
//! kl > 2 * desired_kl   ->  stepsize = max(min, stepsize / 1.5)
//! kl < desired_kl / 2   ->  stepsize = min(max, stepsize * 1.5)
//! otherwise             ->  unchanged
//! ```

/// Multiplicative adjustment factor
const ADJUST_FACTOR: f64 = 1.5;

/// Outcome of one step-size adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KlAdjustment {
    /// KL above twice the target; step size decreased
    TooHigh,
    /// KL below half the target; step size increased
    TooLow,
    /// KL within range; step size unchanged
    JustRight,
}

/// Step-size controller targeting a desired KL per update
#[derive(Debug, Clone)]
pub struct StepSizeController {
    stepsize: f64,
    desired_kl: f64,
    min: f64,
    max: f64,
}

impl StepSizeController {
    /// Create a controller starting at `initial`, clamped into `[min, max]`
    pub fn new(initial: f64, desired_kl: f64, min: f64, max: f64) -> Self {
        Self { stepsize: initial.clamp(min, max), desired_kl, min, max }
    }

    /// Current step size
    pub fn stepsize(&self) -> f64 {
        self.stepsize
    }

    /// Target KL
    pub fn desired_kl(&self) -> f64 {
        self.desired_kl
    }

    /// Adjust the step size given the KL measured after an update
    pub fn adjust(&mut self, kl: f64) -> KlAdjustment {
        if kl > self.desired_kl * 2.0 {
            self.stepsize = (self.stepsize / ADJUST_FACTOR).max(self.min);
            tracing::info!("kl too high");
            KlAdjustment::TooHigh
        } else if kl < self.desired_kl / 2.0 {
            self.stepsize = (self.stepsize * ADJUST_FACTOR).min(self.max);
            tracing::info!("kl too low");
            KlAdjustment::TooLow
        } else {
            tracing::info!("kl just right");
            KlAdjustment::JustRight
        }
    }
}
