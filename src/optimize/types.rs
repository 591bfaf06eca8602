//! Optimizer configuration and result types.

use std::collections::BTreeMap;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::analysis::ConfidenceInterval;
use crate::error::{Error, Result};
use crate::factor::FactorValue;

/// Multi-response optimization method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum OptimizationMethod {
    /// Maximize overall desirability.
    #[default]
    Desirability,
}

/// Configuration for the optimizer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OptimizerConfig {
    /// Optimization method (default: desirability).
    pub method: OptimizationMethod,
    /// Local searches per categorical combination (default: 20).
    pub starts: usize,
    /// Iteration cap per local search (default: 500).
    pub max_iterations: usize,
    /// Seed for random starting points (default: fixed).
    pub seed: u64,
    /// Wall-clock budget for the whole search.
    pub timeout: Option<Duration>,
    /// Number of ranked candidates returned (default: 10).
    pub max_solutions: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            method: OptimizationMethod::Desirability,
            starts: 20,
            max_iterations: 500,
            seed: 0x5eed,
            timeout: None,
            max_solutions: 10,
        }
    }
}

impl OptimizerConfig {
    /// Set the number of starts per categorical combination.
    #[must_use]
    pub fn with_starts(mut self, starts: usize) -> Self {
        self.starts = starts;
        self
    }

    /// Set the iteration cap per local search.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the seed for random starts.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Bound the wall-clock time.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the number of returned candidates.
    #[must_use]
    pub fn with_max_solutions(mut self, max_solutions: usize) -> Self {
        self.max_solutions = max_solutions;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.starts == 0 {
            return Err(Error::configuration("optimizer requires at least one start"));
        }
        if self.max_iterations == 0 {
            return Err(Error::configuration("optimizer requires at least one iteration"));
        }
        if self.max_solutions == 0 {
            return Err(Error::configuration("optimizer must return at least one solution"));
        }
        Ok(())
    }
}

/// Predicted value of one response at a candidate.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PredictedResponse {
    /// Response name.
    pub name: String,
    /// Predicted mean.
    pub value: f64,
    /// Prediction interval for a new observation.
    pub interval: Option<ConfidenceInterval>,
}

/// One ranked solution.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Candidate {
    /// Factor settings in natural units.
    pub factor_settings: BTreeMap<String, FactorValue>,
    /// Coded values of continuous factors, in factor order.
    pub coded: Vec<f64>,
    /// Predictions, in goal order.
    pub predicted_responses: Vec<PredictedResponse>,
    /// Individual desirabilities, in goal order.
    pub desirabilities: Vec<f64>,
    /// Weighted geometric mean of the desirabilities.
    pub overall_desirability: f64,
    /// Whether every goal is met (overall desirability > 0).
    pub feasible: bool,
}

impl Candidate {
    /// Numeric setting of a continuous factor.
    #[must_use]
    pub fn numeric(&self, factor: &str) -> Option<f64> {
        self.factor_settings.get(factor)?.as_numeric()
    }
}

/// A local search that failed after its retry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StartFailure {
    /// 0-based start index.
    pub start: usize,
    /// Numerical error describing the failure.
    pub error: Error,
}

/// Ranked optimization result.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OptimizationResult {
    /// Distinct candidates, best first.
    pub candidates: Vec<Candidate>,
    /// Whether the best candidate meets every goal.
    pub feasible: bool,
    /// Unattainable constraints when infeasible.
    pub diagnostics: Vec<String>,
    /// Starts that failed after retry.
    pub failures: Vec<StartFailure>,
    /// Starts that ran to completion.
    pub starts_completed: usize,
    /// Total starts planned.
    pub starts_planned: usize,
    /// Stopped by the cancellation token.
    pub cancelled: bool,
    /// Stopped by the deadline.
    pub truncated: bool,
}

impl OptimizationResult {
    /// Best candidate, if any start completed.
    #[must_use]
    pub fn best(&self) -> Option<&Candidate> {
        self.candidates.first()
    }
}
