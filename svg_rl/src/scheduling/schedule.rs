//! Step-indexed hyperparameter schedules.
//!
//! The learner asks a [`Scheduler`] for the entropy-regularisation coefficient
//! at each policy step; the coefficient is never stored in the losses.
//!
//! # Data Integrity
//!
//! Constructors validate inputs in debug builds and sanitise them in release
//! builds, so a schedule never yields NaN, Inf or a negative value:
//!
//! - **Non-finite or negative values**: debug panic, replaced with 0.0 in release
//! - **`transition_steps = 0`**: debug panic, treated as 1 in release

/// A value that depends only on the training step.
pub trait Scheduler: Send + Sync {
    /// Value at `step`.
    fn value(&self, step: usize) -> f64;
}

fn sanitize(name: &str, value: f64) -> f64 {
    debug_assert!(value.is_finite(), "{}: value must be finite, got {}", name, value);
    debug_assert!(value >= 0.0, "{}: value must be non-negative, got {}", name, value);
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        0.0
    }
}

/// Fixed value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantSchedule {
    value: f64,
}

impl ConstantSchedule {
    /// # Panics (debug only)
    ///
    /// Panics if `value` is NaN, Inf, or negative.
    pub fn new(value: f64) -> Self {
        Self {
            value: sanitize("ConstantSchedule", value),
        }
    }
}

impl Scheduler for ConstantSchedule {
    fn value(&self, _step: usize) -> f64 {
        self.value
    }
}

/// `init * decay_rate^(step / transition_steps)`.
///
/// Continuous by default; with `staircase` the exponent is floored so the
/// value changes once every `transition_steps`. A decay rate of 1 keeps the
/// value constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialDecay {
    init: f64,
    decay_rate: f64,
    transition_steps: usize,
    staircase: bool,
}

impl ExponentialDecay {
    /// # Panics (debug only)
    ///
    /// Panics if `init` or `decay_rate` is non-finite or negative, or if
    /// `transition_steps` is 0.
    pub fn new(init: f64, decay_rate: f64, transition_steps: usize) -> Self {
        debug_assert!(
            transition_steps > 0,
            "ExponentialDecay: transition_steps must be > 0, got {}",
            transition_steps
        );
        Self {
            init: sanitize("ExponentialDecay", init),
            decay_rate: sanitize("ExponentialDecay", decay_rate),
            transition_steps: transition_steps.max(1),
            staircase: false,
        }
    }

    /// Decay in discrete jumps every `transition_steps`.
    pub fn with_staircase(mut self, staircase: bool) -> Self {
        self.staircase = staircase;
        self
    }

    pub fn init(&self) -> f64 {
        self.init
    }

    pub fn decay_rate(&self) -> f64 {
        self.decay_rate
    }

    pub fn transition_steps(&self) -> usize {
        self.transition_steps
    }
}

impl Scheduler for ExponentialDecay {
    fn value(&self, step: usize) -> f64 {
        let mut exponent = step as f64 / self.transition_steps as f64;
        if self.staircase {
            exponent = exponent.floor();
        }
        let value = self.init * self.decay_rate.powf(exponent);

        // Growth (decay_rate > 1) can overflow over long runs.
        if value.is_finite() {
            value
        } else {
            f64::MAX
        }
    }
}
