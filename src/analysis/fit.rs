//! Least-squares fitting of one response.

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

use ndarray::{Array1, Array2};
use tracing::{debug, warn};

use super::anova::{anova_table, AnovaInput, SumsOfSquares};
use super::diagnostics::{press, run_diagnostics};
use super::equation;
use super::terms::Term;
use super::types::{
    Coefficient, ConfidenceInterval, FitStatistics, FittedModel, Prediction,
};
use crate::error::{Error, Result};
use crate::factor::{Factor, FactorValue, Setting};
use crate::linalg::{
    gram, least_squares, quadratic_form, select_columns, IncrementalCholesky,
    DEFAULT_PIVOT_TOLERANCE,
};
use crate::stats::{t_distribution_p_value, t_value};

/// Minimum number of observations for a fit.
pub(crate) const MIN_OBSERVATIONS: usize = 2;

/// Requested model for one response.
pub(crate) struct ModelSpec<'a> {
    pub response: &'a str,
    pub factors: &'a [Factor],
    pub terms: &'a [Term],
    pub notes: Vec<String>,
    pub require_exact: bool,
    pub confidence_level: f64,
}

/// Observations of one response.
pub(crate) struct Observations<'a> {
    /// 1-based input position of each observation.
    pub run_ids: Vec<usize>,
    /// Coded settings of each observation, indexed like the model factors.
    pub settings: Vec<&'a [Setting]>,
    pub y: Array1<f64>,
}

/// Fit a model by least squares.
///
/// Terms are admitted in order; a term with any column linearly dependent on
/// the admitted columns is dropped whole.
pub(crate) fn fit(spec: ModelSpec<'_>, data: &Observations<'_>) -> Result<FittedModel> {
    let n = data.y.len();
    if n < MIN_OBSERVATIONS {
        return Err(Error::InsufficientData {
            response: spec.response.to_string(),
            observations: n,
            required: MIN_OBSERVATIONS,
        });
    }

    let full = model_matrix(spec.factors, spec.terms, &data.settings);
    let g = gram(&full.matrix);
    let mut chol = IncrementalCholesky::new(&g, DEFAULT_PIVOT_TOLERANCE);

    let mut kept = Vec::new();
    let mut dropped = Vec::new();
    for (term, columns) in spec.terms.iter().zip(&full.layout) {
        let mark = chol.len();
        if columns.clone().all(|j| chol.try_push(j)) {
            kept.push(term.clone());
        } else {
            chol.truncate(mark);
            dropped.push(term.name(spec.factors));
        }
    }

    if !dropped.is_empty() {
        if spec.require_exact {
            return Err(Error::SingularModel {
                response: spec.response.to_string(),
                terms: dropped,
            });
        }
        warn!(response = spec.response, terms = ?dropped, "inestimable terms dropped");
    }

    let x = select_columns(&full.matrix, chol.columns());
    let covariance = chol.inverse();
    let beta = least_squares(&x, &covariance, &data.y);
    let fitted = x.dot(&beta);

    let p = beta.len();
    let df_residual = n - p;
    let ss = SumsOfSquares::new(&data.y, &fitted);
    let mse = (df_residual > 0).then(|| ss.residual / df_residual as f64);
    let t_crit = t_value(spec.confidence_level, df_residual);

    // Column ranges of kept terms in the reduced matrix.
    let mut layout = Vec::with_capacity(kept.len());
    let mut offset = 0;
    for term in &kept {
        let width = term.column_count(spec.factors);
        layout.push(offset..offset + width);
        offset += width;
    }

    let coefficients = coefficients(&CoefficientInput {
        factors: spec.factors,
        terms: &kept,
        x: &x,
        beta: &beta,
        covariance: &covariance,
        mse,
        df_residual,
        t_crit,
        level: spec.confidence_level,
    });

    let term_rows: Vec<(String, Range<usize>)> = kept
        .iter()
        .zip(&layout)
        .filter(|(t, _)| !t.is_intercept())
        .map(|(t, cols)| (t.name(spec.factors), cols.clone()))
        .collect();
    let groups = replicate_groups(&data.settings);
    let anova = anova_table(&AnovaInput {
        terms: &term_rows,
        beta: &beta,
        covariance: &covariance,
        y: &data.y,
        fitted: &fitted,
        groups: &groups,
    });

    let leverage: Vec<f64> = x
        .outer_iter()
        .map(|row| quadratic_form(&covariance, row))
        .collect();
    let press = press(&data.y, &fitted, &leverage);
    let diagnostics = run_diagnostics(&data.run_ids, &data.y, &fitted, &leverage, p);

    let mean = data.y.mean().unwrap_or(0.0);
    let r_squared = if ss.total > 0.0 {
        ss.model / ss.total
    } else {
        f64::NAN
    };
    let adjusted_r_squared = (df_residual > 0 && ss.total > 0.0).then(|| {
        1.0 - (ss.residual / df_residual as f64) / (ss.total / (n - 1) as f64)
    });
    let predicted_r_squared = press
        .filter(|_| ss.total > 0.0)
        .map(|press| 1.0 - press / ss.total);
    let std_dev = mse.map(f64::sqrt);

    let mut notes = spec.notes;
    if !dropped.is_empty() {
        notes.push(format!("dropped inestimable terms: {}", dropped.join(", ")));
    }
    if df_residual == 0 {
        notes.push("saturated model: no residual degrees of freedom".to_string());
    }

    let equation = equation::build(
        spec.response,
        spec.factors,
        &kept,
        &coefficients.iter().map(|c| c.estimate).collect::<Vec<_>>(),
    );

    debug!(
        response = spec.response,
        observations = n,
        columns = p,
        r_squared,
        "model fitted"
    );

    Ok(FittedModel {
        response: spec.response.to_string(),
        factors: spec.factors.to_vec(),
        terms: kept,
        reduced: !dropped.is_empty(),
        dropped_terms: dropped,
        coefficients,
        anova_table: anova,
        r_squared,
        adjusted_r_squared,
        predicted_r_squared,
        statistics: FitStatistics {
            observations: n,
            residual_df: df_residual,
            mean_squared_error: mse,
            std_dev,
            mean,
            cv_percent: std_dev.filter(|_| mean != 0.0).map(|s| 100.0 * s / mean.abs()),
            press,
        },
        equation,
        diagnostics,
        notes,
        confidence_level: spec.confidence_level,
        unscaled_covariance: covariance,
    })
}

/// Model matrix with the column range of every term.
struct ModelMatrix {
    matrix: Array2<f64>,
    layout: Vec<Range<usize>>,
}

fn model_matrix(factors: &[Factor], terms: &[Term], settings: &[&[Setting]]) -> ModelMatrix {
    let mut layout = Vec::with_capacity(terms.len());
    let mut width = 0;
    for term in terms {
        let count = term.column_count(factors);
        layout.push(width..width + count);
        width += count;
    }

    let mut matrix = Array2::zeros((settings.len(), width));
    for (i, run) in settings.iter().enumerate() {
        for (term, columns) in terms.iter().zip(&layout) {
            for (j, value) in columns.clone().zip(term.columns(factors, run)) {
                matrix[[i, j]] = value;
            }
        }
    }
    ModelMatrix { matrix, layout }
}

struct CoefficientInput<'a> {
    factors: &'a [Factor],
    terms: &'a [Term],
    x: &'a Array2<f64>,
    beta: &'a Array1<f64>,
    covariance: &'a Array2<f64>,
    mse: Option<f64>,
    df_residual: usize,
    t_crit: f64,
    level: f64,
}

fn coefficients(input: &CoefficientInput<'_>) -> Vec<Coefficient> {
    let mut out = Vec::with_capacity(input.beta.len());
    let mut j = 0;
    for term in input.terms {
        let term_name = term.name(input.factors);
        for label in term.column_labels(input.factors) {
            let estimate = input.beta[j];
            let c_jj = input.covariance[[j, j]];
            let standard_error = input
                .mse
                .map(|mse| (mse * c_jj).sqrt())
                .filter(|se| *se > 0.0);
            let t = standard_error.map(|se| estimate / se);
            let vif = (!term.is_intercept()).then(|| {
                let column = input.x.column(j);
                let mean = column.mean().unwrap_or(0.0);
                let sxx: f64 = column.iter().map(|v| (v - mean).powi(2)).sum();
                c_jj * sxx
            });

            out.push(Coefficient {
                name: label,
                term: term_name.clone(),
                estimate,
                standard_error,
                t_value: t,
                p_value: t.map(|t| t_distribution_p_value(t, input.df_residual)),
                confidence_interval: standard_error.map(|se| ConfidenceInterval {
                    lower: estimate - input.t_crit * se,
                    upper: estimate + input.t_crit * se,
                    level: input.level,
                }),
                vif: vif.filter(|v| v.is_finite() && *v > 0.0),
            });
            j += 1;
        }
    }
    out
}

/// Group ids of runs with identical settings.
fn replicate_groups(settings: &[&[Setting]]) -> Vec<usize> {
    let mut ids: HashMap<Vec<i64>, usize> = HashMap::new();
    settings
        .iter()
        .map(|run| {
            let key: Vec<i64> = run
                .iter()
                .map(|s| match s {
                    Setting::Continuous { coded, .. } => (coded * 1e9).round() as i64,
                    Setting::Categorical { index, .. } => *index as i64,
                })
                .collect();
            let next = ids.len();
            *ids.entry(key).or_insert(next)
        })
        .collect()
}

impl FittedModel {
    /// Model-matrix row at coded settings indexed like [`FittedModel::factors`].
    #[must_use]
    pub fn model_row(&self, settings: &[Setting]) -> Array1<f64> {
        self.terms
            .iter()
            .flat_map(|t| t.columns(&self.factors, settings))
            .collect()
    }

    /// Prediction at coded settings indexed like [`FittedModel::factors`].
    #[must_use]
    pub fn predict_settings(&self, settings: &[Setting]) -> Prediction {
        let x0 = self.model_row(settings);
        let value = x0.dot(&self.estimates());
        let interval = self.statistics.mean_squared_error.map(|mse| {
            let variance = mse * (1.0 + quadratic_form(&self.unscaled_covariance, x0.view()));
            let t = t_value(self.confidence_level, self.statistics.residual_df);
            let half_width = t * variance.sqrt();
            ConfidenceInterval {
                lower: value - half_width,
                upper: value + half_width,
                level: self.confidence_level,
            }
        });
        Prediction { value, interval }
    }

    /// Prediction at a point given in natural units, keyed by factor name.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a model factor is missing from
    /// `point` or has an invalid value.
    ///
    /// # Example
    ///
    /// ```
    /// use std::collections::BTreeMap;
    /// use doekit::analysis::{analyze, AnalysisRequest, AnalysisType, ExperimentRun};
    /// use doekit::design::DesignType;
    /// use doekit::{Factor, FactorValue};
    ///
    /// let factors = vec![Factor::continuous("X", 0.0, 10.0)];
    /// let runs: Vec<ExperimentRun> = [(0.0, 1.0), (5.0, 2.1), (10.0, 2.9), (5.0, 1.9)]
    ///     .iter()
    ///     .map(|&(x, y)| {
    ///         ExperimentRun::new(BTreeMap::from([("X".to_string(), FactorValue::Numeric(x))]))
    ///             .with_response("Y", y)
    ///     })
    ///     .collect();
    /// let request = AnalysisRequest::new(DesignType::Factorial, ["Y"])
    ///     .with_analysis_type(AnalysisType::MainEffects);
    /// let models = analyze(&runs, &factors, &request).unwrap();
    ///
    /// let point = BTreeMap::from([("X".to_string(), FactorValue::Numeric(5.0))]);
    /// let prediction = models["Y"].predict(&point).unwrap();
    /// assert!((prediction.value - 1.975).abs() < 1e-9);
    /// let interval = prediction.interval.unwrap();
    /// assert!(interval.lower < prediction.value && prediction.value < interval.upper);
    /// ```
    pub fn predict(&self, point: &BTreeMap<String, FactorValue>) -> Result<Prediction> {
        let settings = self
            .factors
            .iter()
            .map(|f| {
                point
                    .get(&f.name)
                    .ok_or_else(|| {
                        Error::configuration(format!("no value for factor '{}'", f.name))
                    })
                    .and_then(|v| f.setting_for(v))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self.predict_settings(&settings))
    }
}
