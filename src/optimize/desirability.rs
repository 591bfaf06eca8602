//! Derringer-Suich desirability functions.
//!
//! Each response goal maps a predicted value to `d ∈ [0, 1]`; the overall
//! desirability is the weighted geometric mean
//! `D = (∏ d_i^{w_i})^{1/Σw_i}`, so a single `d_i = 0` rejects the candidate.
//!
//! | Goal | d(ŷ) |
//! |------|------|
//! | Maximize | 0 below `lower`, `((ŷ−L)/(U−L))^s` between, 1 above `upper` |
//! | Minimize | 1 below `lower`, `((U−ŷ)/(U−L))^s` between, 0 above `upper` |
//! | Target | rises to 1 at `target`, falls back to 0 at the bounds; `target` may sit on a bound |
//! | InRange | 1 inside `[lower, upper]`, 0 outside |

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Direction of a response goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum Goal {
    /// Larger is better.
    Maximize,
    /// Smaller is better.
    Minimize,
    /// Hit `target`.
    Target,
    /// Anywhere within the bounds.
    InRange,
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Maximize => "maximize",
            Self::Minimize => "minimize",
            Self::Target => "target",
            Self::InRange => "in range",
        })
    }
}

impl std::str::FromStr for Goal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().replace(['-', ' '], "_").as_str() {
            "MAXIMIZE" => Ok(Self::Maximize),
            "MINIMIZE" => Ok(Self::Minimize),
            "TARGET" => Ok(Self::Target),
            "IN_RANGE" => Ok(Self::InRange),
            _ => Err(Error::configuration(format!("unknown goal '{s}'"))),
        }
    }
}

/// Goal for one response.
///
/// # Example
///
/// ```
/// use doekit::optimize::ResponseGoal;
///
/// let goal = ResponseGoal::maximize("Yield", 70.0, 100.0);
/// assert_eq!(goal.desirability(65.0), 0.0);
/// assert_eq!(goal.desirability(85.0), 0.5);
/// assert_eq!(goal.desirability(120.0), 1.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResponseGoal {
    /// Response name.
    pub name: String,
    /// Goal direction.
    pub goal: Goal,
    /// Lower bound.
    pub lower: f64,
    /// Upper bound.
    pub upper: f64,
    /// Target value for [`Goal::Target`].
    #[cfg_attr(feature = "serde", serde(default))]
    pub target: Option<f64>,
    /// Relative importance (default: 1).
    #[cfg_attr(feature = "serde", serde(default = "one"))]
    pub weight: f64,
    /// Ramp shape exponent s (default: 1, linear).
    #[cfg_attr(feature = "serde", serde(default = "one"))]
    pub ramp_exponent: f64,
}

#[cfg(feature = "serde")]
fn one() -> f64 {
    1.0
}

impl ResponseGoal {
    fn with_goal(name: impl Into<String>, goal: Goal, lower: f64, upper: f64) -> Self {
        Self {
            name: name.into(),
            goal,
            lower,
            upper,
            target: None,
            weight: 1.0,
            ramp_exponent: 1.0,
        }
    }

    /// Larger is better between `lower` and `upper`.
    pub fn maximize(name: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self::with_goal(name, Goal::Maximize, lower, upper)
    }

    /// Smaller is better between `lower` and `upper`.
    pub fn minimize(name: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self::with_goal(name, Goal::Minimize, lower, upper)
    }

    /// Best at `target`, unacceptable outside `[lower, upper]`.
    pub fn target(name: impl Into<String>, lower: f64, target: f64, upper: f64) -> Self {
        let mut goal = Self::with_goal(name, Goal::Target, lower, upper);
        goal.target = Some(target);
        goal
    }

    /// Acceptable anywhere in `[lower, upper]`.
    pub fn in_range(name: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self::with_goal(name, Goal::InRange, lower, upper)
    }

    /// Set the relative importance.
    #[must_use]
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Set the ramp exponent.
    #[must_use]
    pub fn with_ramp_exponent(mut self, exponent: f64) -> Self {
        self.ramp_exponent = exponent;
        self
    }

    /// Check bounds, target, weight and exponent.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the goal and the violated
    /// constraint.
    pub fn validate(&self) -> Result<()> {
        let fail = |what: String| {
            Err(Error::configuration(format!(
                "goal for '{}': {what}",
                self.name
            )))
        };
        if !(self.lower.is_finite() && self.upper.is_finite()) || self.lower >= self.upper {
            return fail(format!(
                "lower bound {} must be below upper bound {}",
                self.lower, self.upper
            ));
        }
        if !(self.weight.is_finite() && self.weight > 0.0) {
            return fail(format!("weight must be positive, got {}", self.weight));
        }
        if !(self.ramp_exponent.is_finite() && self.ramp_exponent > 0.0) {
            return fail(format!(
                "ramp exponent must be positive, got {}",
                self.ramp_exponent
            ));
        }
        if self.goal == Goal::Target {
            match self.target {
                Some(t) if (self.lower..=self.upper).contains(&t) => {}
                Some(t) => {
                    return fail(format!(
                        "target {t} must lie within [{}, {}]",
                        self.lower, self.upper
                    ))
                }
                None => return fail("target goal requires a target value".to_string()),
            }
        }
        Ok(())
    }

    /// Individual desirability of a predicted value. NaN stays NaN.
    #[must_use]
    pub fn desirability(&self, y: f64) -> f64 {
        if y.is_nan() {
            return f64::NAN;
        }
        let (lower, upper, s) = (self.lower, self.upper, self.ramp_exponent);
        match self.goal {
            Goal::Maximize => {
                if y <= lower {
                    0.0
                } else if y >= upper {
                    1.0
                } else {
                    ((y - lower) / (upper - lower)).powf(s)
                }
            }
            Goal::Minimize => {
                if y <= lower {
                    1.0
                } else if y >= upper {
                    0.0
                } else {
                    ((upper - y) / (upper - lower)).powf(s)
                }
            }
            Goal::Target => {
                let target = self.target.unwrap_or(0.5 * (lower + upper));
                // a target on a bound leaves only the ramp on the other side
                if y < lower || y > upper {
                    0.0
                } else if y == target {
                    1.0
                } else if y < target {
                    ((y - lower) / (target - lower)).powf(s)
                } else {
                    ((upper - y) / (upper - target)).powf(s)
                }
            }
            Goal::InRange => {
                if (lower..=upper).contains(&y) {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Distance outside the acceptable region, relative to the bound range.
    ///
    /// Zero whenever the value is acceptable. Used to steer searches toward
    /// feasibility where every desirability is zero.
    #[must_use]
    pub fn shortfall(&self, y: f64) -> f64 {
        if y.is_nan() {
            return f64::INFINITY;
        }
        let range = self.upper - self.lower;
        let outside = match self.goal {
            Goal::Maximize => (self.lower - y).max(0.0),
            Goal::Minimize => (y - self.upper).max(0.0),
            Goal::Target | Goal::InRange => (self.lower - y).max(y - self.upper).max(0.0),
        };
        outside / range
    }

    /// Describe why this goal was never met, given the closest prediction.
    pub(crate) fn unattained(&self, closest: f64) -> String {
        let bound = match self.goal {
            Goal::Maximize => format!("above {}", self.lower),
            Goal::Minimize => format!("below {}", self.upper),
            Goal::Target | Goal::InRange => format!("within [{}, {}]", self.lower, self.upper),
        };
        format!(
            "response '{}' ({}) cannot be brought {bound}; closest prediction {closest:.4}",
            self.name, self.goal
        )
    }
}

/// Weighted geometric mean of individual desirabilities.
///
/// Zero if any `d_i` is zero; NaN if any is NaN.
///
/// ```
/// use doekit::optimize::overall_desirability;
///
/// assert_eq!(overall_desirability(&[1.0, 0.0, 0.9], &[1.0, 1.0, 1.0]), 0.0);
/// let d = overall_desirability(&[0.25, 1.0], &[1.0, 1.0]);
/// assert!((d - 0.5).abs() < 1e-12);
/// ```
#[must_use]
pub fn overall_desirability(desirabilities: &[f64], weights: &[f64]) -> f64 {
    if desirabilities.iter().any(|d| d.is_nan()) {
        return f64::NAN;
    }
    if desirabilities.is_empty() || desirabilities.iter().any(|&d| d <= 0.0) {
        return 0.0;
    }
    let total: f64 = weights.iter().sum();
    let log_sum: f64 = desirabilities
        .iter()
        .zip(weights)
        .map(|(d, w)| w * d.ln())
        .sum();
    (log_sum / total).exp()
}
