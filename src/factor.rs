//! Factor definitions and unit coding.
//!
//! A [`Factor`] is either continuous, with physical low/high levels, or
//! categorical, with an ordered list of labels. Designs and models work in
//! *coded* units: continuous levels map linearly so that `low → -1` and
//! `high → +1`, and categorical levels expand into indicator columns with the
//! first category as reference.
//!
//! ```
//! use doekit::Factor;
//!
//! let temp = Factor::continuous("Temperature", 60.0, 80.0);
//! assert_eq!(temp.to_natural(-1.0), 60.0);
//! assert_eq!(temp.to_natural(0.0), 70.0);
//! assert_eq!(temp.to_coded(80.0), 1.0);
//! ```

use std::collections::HashSet;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Kind of a factor and its admissible levels.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum FactorKind {
    /// Numeric factor between two physical levels.
    Continuous {
        /// Physical value coded as -1.
        low: f64,
        /// Physical value coded as +1.
        high: f64,
    },
    /// Factor taking one of a fixed, ordered set of labels.
    Categorical {
        /// Category labels; the first one is the reference level.
        categories: Vec<String>,
    },
}

/// An experimental factor.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Factor {
    /// Factor name, unique within a request.
    pub name: String,
    /// Kind and levels.
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub kind: FactorKind,
    /// Optional physical unit, used only for display.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub unit: Option<String>,
}

/// A factor value in natural units.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum FactorValue {
    /// Physical value of a continuous factor.
    Numeric(f64),
    /// Category label of a categorical factor.
    Label(String),
}

impl FactorValue {
    /// The numeric value, if this is a continuous setting.
    #[must_use]
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            Self::Numeric(v) => Some(*v),
            Self::Label(_) => None,
        }
    }
}

impl fmt::Display for FactorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "{v}"),
            Self::Label(s) => f.write_str(s),
        }
    }
}

impl From<f64> for FactorValue {
    fn from(v: f64) -> Self {
        Self::Numeric(v)
    }
}

impl From<&str> for FactorValue {
    fn from(s: &str) -> Self {
        Self::Label(s.to_string())
    }
}

/// Placement of one factor in one run, in coded and natural units.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum Setting {
    /// Continuous factor setting.
    Continuous {
        /// Coded value (-1..1, beyond for axial points).
        coded: f64,
        /// Physical value.
        natural: f64,
    },
    /// Categorical factor setting.
    Categorical {
        /// Index into the factor's categories.
        index: usize,
        /// Category label.
        label: String,
        /// Indicator coding, one entry per non-reference category.
        indicators: Vec<f64>,
    },
}

impl Setting {
    /// Natural-unit value of this setting.
    #[must_use]
    pub fn value(&self) -> FactorValue {
        match self {
            Self::Continuous { natural, .. } => FactorValue::Numeric(*natural),
            Self::Categorical { label, .. } => FactorValue::Label(label.clone()),
        }
    }

    /// Coded value for continuous settings.
    #[must_use]
    pub fn coded(&self) -> Option<f64> {
        match self {
            Self::Continuous { coded, .. } => Some(*coded),
            Self::Categorical { .. } => None,
        }
    }

    /// Category index for categorical settings.
    #[must_use]
    pub fn category(&self) -> Option<usize> {
        match self {
            Self::Continuous { .. } => None,
            Self::Categorical { index, .. } => Some(*index),
        }
    }
}

impl Factor {
    /// Create a continuous factor.
    #[must_use]
    pub fn continuous(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            kind: FactorKind::Continuous { low, high },
            unit: None,
        }
    }

    /// Create a categorical factor.
    #[must_use]
    pub fn categorical<S: Into<String>>(
        name: impl Into<String>,
        categories: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: FactorKind::Categorical {
                categories: categories.into_iter().map(Into::into).collect(),
            },
            unit: None,
        }
    }

    /// Attach a display unit.
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Check the factor's own invariants.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty name, a continuous factor
    /// without finite `low < high`, or a categorical factor with fewer than two
    /// distinct categories.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::configuration("factor names must not be empty"));
        }
        match &self.kind {
            FactorKind::Continuous { low, high } => {
                if !low.is_finite() || !high.is_finite() || low >= high {
                    return Err(Error::configuration(format!(
                        "continuous factor '{}' requires finite low < high, got low={low}, high={high}",
                        self.name
                    )));
                }
            }
            FactorKind::Categorical { categories } => {
                if categories.len() < 2 {
                    return Err(Error::configuration(format!(
                        "categorical factor '{}' requires at least 2 categories, got {}",
                        self.name,
                        categories.len()
                    )));
                }
                let distinct: HashSet<&String> = categories.iter().collect();
                if distinct.len() != categories.len() {
                    return Err(Error::configuration(format!(
                        "categorical factor '{}' has duplicate categories",
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Whether the factor is continuous.
    #[must_use]
    pub fn is_continuous(&self) -> bool {
        matches!(self.kind, FactorKind::Continuous { .. })
    }

    /// Whether the factor takes exactly two levels in a two-level design.
    #[must_use]
    pub fn is_two_level(&self) -> bool {
        match &self.kind {
            FactorKind::Continuous { .. } => true,
            FactorKind::Categorical { categories } => categories.len() == 2,
        }
    }

    /// Category labels, empty for continuous factors.
    #[must_use]
    pub fn categories(&self) -> &[String] {
        match &self.kind {
            FactorKind::Continuous { .. } => &[],
            FactorKind::Categorical { categories } => categories,
        }
    }

    /// Midpoint of a continuous factor's range.
    #[must_use]
    pub fn center(&self) -> f64 {
        match self.kind {
            FactorKind::Continuous { low, high } => 0.5 * (low + high),
            FactorKind::Categorical { .. } => 0.0,
        }
    }

    /// Half the width of a continuous factor's range.
    #[must_use]
    pub fn half_range(&self) -> f64 {
        match self.kind {
            FactorKind::Continuous { low, high } => 0.5 * (high - low),
            FactorKind::Categorical { .. } => 1.0,
        }
    }

    /// Convert a coded value to natural units.
    ///
    /// `natural = low + (coded + 1)/2 * (high - low)`, extended linearly
    /// beyond ±1. Categorical factors return the coded value unchanged.
    #[must_use]
    pub fn to_natural(&self, coded: f64) -> f64 {
        match self.kind {
            FactorKind::Continuous { low, high } => low + (coded + 1.0) / 2.0 * (high - low),
            FactorKind::Categorical { .. } => coded,
        }
    }

    /// Convert a natural value to coded units.
    #[must_use]
    pub fn to_coded(&self, natural: f64) -> f64 {
        match self.kind {
            FactorKind::Continuous { low, high } => 2.0 * (natural - low) / (high - low) - 1.0,
            FactorKind::Categorical { .. } => natural,
        }
    }

    /// Number of indicator (or coded) columns a main effect of this factor uses.
    #[must_use]
    pub fn column_count(&self) -> usize {
        match &self.kind {
            FactorKind::Continuous { .. } => 1,
            FactorKind::Categorical { categories } => categories.len() - 1,
        }
    }

    /// Indicator vector for a category index (reference = index 0).
    #[must_use]
    pub fn indicators(&self, index: usize) -> Vec<f64> {
        (1..=self.column_count())
            .map(|c| if c == index { 1.0 } else { 0.0 })
            .collect()
    }

    /// Continuous setting at a coded level.
    #[must_use]
    pub fn coded_setting(&self, coded: f64) -> Setting {
        Setting::Continuous {
            coded,
            natural: self.to_natural(coded),
        }
    }

    /// Categorical setting for a category index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range; design strategies only pass indices
    /// taken from the factor itself.
    #[must_use]
    pub fn category_setting(&self, index: usize) -> Setting {
        Setting::Categorical {
            index,
            label: self.categories()[index].clone(),
            indicators: self.indicators(index),
        }
    }

    /// Setting for a two-level design column entry `sign ∈ {-1, +1}`.
    ///
    /// Continuous factors take the coded sign; two-category factors take the
    /// first category for -1 and the second for +1.
    #[must_use]
    pub fn two_level_setting(&self, sign: f64) -> Setting {
        if self.is_continuous() {
            self.coded_setting(sign)
        } else {
            self.category_setting(usize::from(sign > 0.0))
        }
    }

    /// Setting for a natural-unit value, validating its kind.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the value kind does not match the
    /// factor, a numeric value is not finite or a label is unknown.
    pub fn setting_for(&self, value: &FactorValue) -> Result<Setting> {
        match (&self.kind, value) {
            (FactorKind::Continuous { .. }, FactorValue::Numeric(v)) if v.is_finite() => {
                Ok(Setting::Continuous {
                    coded: self.to_coded(*v),
                    natural: *v,
                })
            }
            (FactorKind::Categorical { categories }, FactorValue::Label(label)) => categories
                .iter()
                .position(|c| c == label)
                .map(|index| self.category_setting(index))
                .ok_or_else(|| {
                    Error::configuration(format!(
                        "factor '{}' has no category '{label}'",
                        self.name
                    ))
                }),
            _ => Err(Error::configuration(format!(
                "value '{value}' is not valid for factor '{}'",
                self.name
            ))),
        }
    }
}

/// Validate a factor list: at least one factor, unique names, valid levels.
///
/// # Errors
///
/// Returns a configuration error naming the first violated constraint.
pub fn validate_factors(factors: &[Factor]) -> Result<()> {
    if factors.is_empty() {
        return Err(Error::configuration("at least one factor is required"));
    }
    let mut seen = HashSet::new();
    for factor in factors {
        factor.validate()?;
        if !seen.insert(factor.name.as_str()) {
            return Err(Error::configuration(format!(
                "factor name '{}' is used more than once",
                factor.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coding_round_trip() {
        let f = Factor::continuous("Pressure", 100.0, 200.0);
        let alpha = 2.0_f64.sqrt();
        for coded in [-alpha, -1.0, 0.0, 0.5, 1.0, alpha] {
            let natural = f.to_natural(coded);
            assert!((f.to_coded(natural) - coded).abs() < 1e-12);
        }
        for natural in [100.0, 129.3, 150.0, 200.0, 220.71] {
            assert!((f.to_natural(f.to_coded(natural)) - natural).abs() < 1e-9);
        }
        assert!((f.to_natural(alpha) - (150.0 + 50.0 * alpha)).abs() < 1e-12);
    }

    #[test]
    fn test_validation() {
        assert!(Factor::continuous("A", 1.0, 1.0).validate().is_err());
        assert!(Factor::continuous("A", 2.0, 1.0).validate().is_err());
        assert!(Factor::continuous("A", f64::NAN, 1.0).validate().is_err());
        assert!(Factor::continuous("", 0.0, 1.0).validate().is_err());
        assert!(Factor::categorical("C", ["x"]).validate().is_err());
        assert!(Factor::categorical("C", ["x", "x"]).validate().is_err());
        assert!(Factor::categorical("C", ["x", "y"]).validate().is_ok());

        let dup = vec![Factor::continuous("A", 0.0, 1.0), Factor::continuous("A", 0.0, 2.0)];
        assert!(validate_factors(&dup).unwrap_err().to_string().contains("more than once"));
        assert!(validate_factors(&[]).is_err());
    }

    #[test]
    fn test_indicator_coding() {
        let f = Factor::categorical("Catalyst", ["A", "B", "C"]);
        assert_eq!(f.column_count(), 2);
        assert_eq!(f.indicators(0), vec![0.0, 0.0]);
        assert_eq!(f.indicators(1), vec![1.0, 0.0]);
        assert_eq!(f.indicators(2), vec![0.0, 1.0]);

        let s = f.setting_for(&FactorValue::from("C")).unwrap();
        assert_eq!(s.category(), Some(2));
        assert!(f.setting_for(&FactorValue::from("D")).is_err());
        assert!(f.setting_for(&FactorValue::Numeric(1.0)).is_err());
    }

    #[test]
    fn test_two_level_setting() {
        let c = Factor::categorical("Mode", ["off", "on"]);
        assert_eq!(c.two_level_setting(-1.0).value(), FactorValue::from("off"));
        assert_eq!(c.two_level_setting(1.0).value(), FactorValue::from("on"));

        let t = Factor::continuous("T", 60.0, 80.0);
        assert_eq!(t.two_level_setting(1.0).value(), FactorValue::Numeric(80.0));
    }
}
