//! Error type shared by the loss engine, configuration and learner.
//!
//! Every failure in this crate is a caller-side contract violation: losses are
//! pure functions of their inputs, so nothing here is retried. Spent-key reuse
//! is also a contract violation but cannot be detected and has no variant.

use std::fmt;

/// Error type for SVG loss construction and evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum SvgError {
    /// Batch, time or feature dimensions of two inputs disagree.
    ShapeMismatch {
        /// Which input pair was being compared.
        context: String,
        /// Shape the operation required.
        expected: Vec<usize>,
        /// Shape it received.
        actual: Vec<usize>,
    },
    /// A hyperparameter is out of range, or the reward source contradicts the config.
    InvalidConfiguration(String),
}

impl SvgError {
    /// Build a shape mismatch error.
    pub fn shape(context: impl Into<String>, expected: &[usize], actual: &[usize]) -> Self {
        SvgError::ShapeMismatch {
            context: context.into(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// Build an invalid configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        SvgError::InvalidConfiguration(msg.into())
    }
}

impl fmt::Display for SvgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SvgError::ShapeMismatch {
                context,
                expected,
                actual,
            } => write!(
                f,
                "Shape mismatch in {}: expected {:?}, got {:?}",
                context, expected, actual
            ),
            SvgError::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for SvgError {}

/// Result alias used across the crate.
pub type SvgResult<T> = Result<T, SvgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_display() {
        let err = SvgError::shape("transition_loss: next_observations", &[4, 1, 3], &[4, 1, 2]);
        let msg = err.to_string();
        assert!(msg.contains("transition_loss: next_observations"));
        assert!(msg.contains("[4, 1, 3]"));
        assert!(msg.contains("[4, 1, 2]"));
    }

    #[test]
    fn test_invalid_configuration_display() {
        let err = SvgError::config("discount must lie in [0, 1], got -0.5");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: discount must lie in [0, 1], got -0.5"
        );
    }
}
