//! Error types for the doekit library.
//!
//! This module provides error handling using the `thiserror` crate, with one
//! variant per failure class of the engine: invalid configuration, singular
//! models, numerical failures in the optimizer and malformed input data.

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The main error type for the doekit library.
#[derive(Error, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Error {
    // ============ Configuration Errors ============
    /// A factor, design, model or goal specification violates a constraint.
    #[error("configuration error: {constraint}")]
    Configuration {
        /// The violated constraint, phrased so it can be shown to a user.
        constraint: String,
    },

    // ============ Model Errors ============
    /// The requested model contains terms that cannot be estimated.
    #[error("singular model for response '{response}': inestimable terms [{}]", terms.join(", "))]
    SingularModel {
        /// Response the model was fitted for.
        response: String,
        /// Names of the inestimable terms.
        terms: Vec<String>,
    },

    /// Too few observations to fit anything.
    #[error("response '{response}' has {observations} observations, at least {required} required")]
    InsufficientData {
        /// Response with missing data.
        response: String,
        /// Number of usable observations.
        observations: usize,
        /// Minimum number of observations.
        required: usize,
    },

    // ============ Numerical Errors ============
    /// A numerical search failed to converge.
    #[error("numerical failure: {message}")]
    Numerical {
        /// Description of the failure.
        message: String,
    },

    // ============ Dimension Errors ============
    /// Input dimensions are inconsistent.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension description.
        expected: String,
        /// Actual dimension description.
        actual: String,
    },
}

/// A specialized `Result` type for doekit operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Create a new `Configuration` error.
    #[must_use]
    pub fn configuration(constraint: impl Into<String>) -> Self {
        Self::Configuration {
            constraint: constraint.into(),
        }
    }

    /// Create a new `Numerical` error.
    #[must_use]
    pub fn numerical(message: impl Into<String>) -> Self {
        Self::Numerical {
            message: message.into(),
        }
    }

    /// Whether this error was caused by the caller's configuration.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::configuration("Box-Behnken requires at least 3 continuous factors, got 2");
        assert!(err.to_string().contains("Box-Behnken"));
        assert!(err.to_string().contains("got 2"));
        assert!(err.is_configuration());

        let err = Error::SingularModel {
            response: "Yield".into(),
            terms: vec!["A*B".into(), "C".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("Yield"));
        assert!(msg.contains("A*B, C"));
        assert!(!err.is_configuration());

        let err = Error::InsufficientData {
            response: "Purity".into(),
            observations: 1,
            required: 2,
        };
        assert!(err.to_string().contains("Purity"));
    }

    #[test]
    fn test_error_equality() {
        let err1 = Error::numerical("simplex diverged");
        let err2 = Error::numerical("simplex diverged");
        let err3 = Error::numerical("objective is NaN");

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }
}
