//! Step schedules for training coefficients.
//!
//! ## Available Schedules
//!
//! - [`ConstantSchedule`]: fixed value
//! - [`ExponentialDecay`]: `init * rate^(step / transition_steps)`, used for
//!   the entropy-regularisation coefficient
//!
//! ## Example
//!
//! ```rust,ignore
//! let schedule = ExponentialDecay::new(1e-3, 0.5, 100);
//! let entropy_reg = schedule.value(step);
//! ```

pub mod schedule;

#[cfg(test)]
mod tests;

pub use schedule::{ConstantSchedule, ExponentialDecay, Scheduler};
