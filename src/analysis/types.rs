//! Model analysis types.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::{Array1, Array2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::terms::Term;
use crate::design::DesignType;
use crate::factor::{Factor, FactorValue};

/// Family of model to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AnalysisType {
    /// Intercept and main effects.
    MainEffects,
    /// Main effects and all two-factor interactions.
    TwoFactorInteraction,
    /// Full quadratic model.
    ResponseSurface,
    /// Chosen from the design type.
    #[default]
    Auto,
}

impl AnalysisType {
    /// Resolve [`AnalysisType::Auto`] for a design type.
    #[must_use]
    pub fn resolve(self, design_type: DesignType) -> Self {
        match self {
            Self::Auto => match design_type {
                DesignType::PlackettBurman | DesignType::LatinSquare => Self::MainEffects,
                DesignType::Factorial | DesignType::Fractional => Self::TwoFactorInteraction,
                DesignType::Ccd | DesignType::Bbd => Self::ResponseSurface,
            },
            other => other,
        }
    }
}

/// Treatment of terms whose main effects are missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Hierarchy {
    /// Add missing constituent main effects.
    #[default]
    Enforce,
    /// Keep terms exactly as listed.
    Ignore,
}

/// One observed run: natural-unit factor values and measured responses.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExperimentRun {
    /// Factor values keyed by factor name.
    pub settings: BTreeMap<String, FactorValue>,
    /// Response values keyed by response name; absent means not measured.
    #[cfg_attr(feature = "serde", serde(default))]
    pub responses: BTreeMap<String, f64>,
}

impl ExperimentRun {
    /// Run with the given settings and no responses yet.
    #[must_use]
    pub fn new(settings: BTreeMap<String, FactorValue>) -> Self {
        Self {
            settings,
            responses: BTreeMap::new(),
        }
    }

    /// Record a response value.
    #[must_use]
    pub fn with_response(mut self, name: impl Into<String>, value: f64) -> Self {
        self.responses.insert(name.into(), value);
        self
    }

    /// Record a response value in place.
    pub fn set_response(&mut self, name: impl Into<String>, value: f64) {
        self.responses.insert(name.into(), value);
    }
}

/// Two-sided interval at a confidence level.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConfidenceInterval {
    /// Lower bound.
    pub lower: f64,
    /// Upper bound.
    pub upper: f64,
    /// Confidence level (e.g., 0.95 for 95%).
    pub level: f64,
}

/// Estimated coefficient of one model column.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Coefficient {
    /// Column label, e.g. `Temperature*Solvent[ethanol]`.
    pub name: String,
    /// Name of the term the column belongs to.
    pub term: String,
    /// Estimate in coded units.
    pub estimate: f64,
    /// Standard error, `None` without residual degrees of freedom.
    pub standard_error: Option<f64>,
    /// t statistic.
    pub t_value: Option<f64>,
    /// Two-sided p-value.
    pub p_value: Option<f64>,
    /// Confidence interval of the estimate.
    pub confidence_interval: Option<ConfidenceInterval>,
    /// Variance inflation factor; `None` for the intercept.
    pub vif: Option<f64>,
}

/// Source of variation in an ANOVA row.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AnovaSource {
    /// All non-intercept terms together.
    Model,
    /// One model term, adjusted for all others.
    Term(String),
    /// Residual error.
    Residual,
    /// Residual variation not explained by replication.
    LackOfFit,
    /// Variation among replicated settings.
    PureError,
    /// Total, corrected for the mean.
    CorTotal,
}

impl fmt::Display for AnovaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model => f.write_str("Model"),
            Self::Term(name) => f.write_str(name),
            Self::Residual => f.write_str("Residual"),
            Self::LackOfFit => f.write_str("Lack of Fit"),
            Self::PureError => f.write_str("Pure Error"),
            Self::CorTotal => f.write_str("Cor Total"),
        }
    }
}

/// One row of an ANOVA table.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnovaRow {
    /// Source of variation.
    pub source: AnovaSource,
    /// Sum of squares.
    pub sum_of_squares: f64,
    /// Degrees of freedom.
    pub degrees_of_freedom: usize,
    /// Mean square (SS / df); `None` when df = 0.
    pub mean_square: Option<f64>,
    /// F statistic against the residual (or pure error) mean square.
    pub f_value: Option<f64>,
    /// Upper-tail p-value of the F statistic.
    pub p_value: Option<f64>,
}

/// Summary statistics of a fit.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FitStatistics {
    /// Number of observations used.
    pub observations: usize,
    /// Residual degrees of freedom.
    pub residual_df: usize,
    /// Residual mean square.
    pub mean_squared_error: Option<f64>,
    /// Root of the residual mean square.
    pub std_dev: Option<f64>,
    /// Mean of the response.
    pub mean: f64,
    /// Coefficient of variation, percent.
    pub cv_percent: Option<f64>,
    /// Predicted residual error sum of squares.
    pub press: Option<f64>,
}

/// Per-run regression diagnostics.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunDiagnostic {
    /// 1-based position of the run in the input.
    pub run: usize,
    /// Observed response.
    pub actual: f64,
    /// Fitted response.
    pub predicted: f64,
    /// actual − predicted.
    pub residual: f64,
    /// Diagonal of the hat matrix.
    pub leverage: f64,
    /// Internally studentized residual.
    pub studentized_residual: Option<f64>,
    /// Externally studentized (deleted) residual.
    pub externally_studentized_residual: Option<f64>,
    /// Cook's distance.
    pub cooks_distance: Option<f64>,
    /// Scaled change in fit when the run is deleted.
    pub dffits: Option<f64>,
}

/// Fitted polynomial in coded and natural units.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Equation {
    /// Equation in coded factor units.
    pub coded: String,
    /// Equation in natural factor units.
    pub natural: String,
}

/// Model prediction at one point.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Prediction {
    /// Predicted mean response.
    pub value: f64,
    /// Prediction interval for a new observation, if residual df > 0.
    pub interval: Option<ConfidenceInterval>,
}

/// A fitted response model.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FittedModel {
    /// Response name.
    pub response: String,
    /// Model factors, in term-index order.
    pub factors: Vec<Factor>,
    /// Estimated terms, intercept first.
    pub terms: Vec<Term>,
    /// Names of requested terms that could not be estimated.
    pub dropped_terms: Vec<String>,
    /// Whether terms were dropped.
    pub reduced: bool,
    /// Coefficients, one per model column.
    pub coefficients: Vec<Coefficient>,
    /// ANOVA table.
    pub anova_table: Vec<AnovaRow>,
    /// Coefficient of determination.
    pub r_squared: f64,
    /// R² adjusted for model degrees of freedom.
    pub adjusted_r_squared: Option<f64>,
    /// R² from PRESS.
    pub predicted_r_squared: Option<f64>,
    /// Summary statistics.
    pub statistics: FitStatistics,
    /// Fitted equation.
    pub equation: Equation,
    /// Per-run diagnostics.
    pub diagnostics: Vec<RunDiagnostic>,
    /// Recovered conditions, e.g. terms added for hierarchy.
    pub notes: Vec<String>,
    /// Confidence level for intervals.
    pub confidence_level: f64,
    /// `(XᵀX)⁻¹` over the estimated columns.
    pub unscaled_covariance: Array2<f64>,
}

impl FittedModel {
    /// Coefficient estimates, in column order.
    #[must_use]
    pub fn estimates(&self) -> Array1<f64> {
        self.coefficients.iter().map(|c| c.estimate).collect()
    }

    /// Coefficient by column label.
    #[must_use]
    pub fn coefficient(&self, name: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.name == name)
    }

    /// ANOVA row by source.
    #[must_use]
    pub fn anova_row(&self, source: &AnovaSource) -> Option<&AnovaRow> {
        self.anova_table.iter().find(|row| &row.source == source)
    }
}
