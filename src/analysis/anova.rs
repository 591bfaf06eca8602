//! Regression ANOVA.
//!
//! Partitions the corrected total sum of squares into model and residual,
//! gives each term its adjusted (extra) sum of squares
//! `SS_T = β_Tᵀ (C_TT)⁻¹ β_T`, and splits the residual into lack of fit and
//! pure error when settings are replicated.

use std::collections::HashMap;
use std::ops::Range;

use ndarray::{Array1, Array2};

use super::types::{AnovaRow, AnovaSource};
use crate::linalg::IncrementalCholesky;
use crate::stats::f_distribution_p_value;

/// Inputs of an ANOVA over a fitted model.
pub(crate) struct AnovaInput<'a> {
    /// Name and column range of every non-intercept term.
    pub terms: &'a [(String, Range<usize>)],
    /// Coefficient estimates.
    pub beta: &'a Array1<f64>,
    /// `(XᵀX)⁻¹`.
    pub covariance: &'a Array2<f64>,
    /// Observations.
    pub y: &'a Array1<f64>,
    /// Fitted values.
    pub fitted: &'a Array1<f64>,
    /// Replicate group of every observation (equal ids = identical settings).
    pub groups: &'a [usize],
}

/// Sums of squares of a fit.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SumsOfSquares {
    pub model: f64,
    pub residual: f64,
    pub total: f64,
}

impl SumsOfSquares {
    pub(crate) fn new(y: &Array1<f64>, fitted: &Array1<f64>) -> Self {
        let mean = y.mean().unwrap_or(0.0);
        Self {
            model: fitted.iter().map(|f| (f - mean).powi(2)).sum(),
            residual: y.iter().zip(fitted).map(|(a, f)| (a - f).powi(2)).sum(),
            total: y.iter().map(|a| (a - mean).powi(2)).sum(),
        }
    }
}

/// Build the ANOVA table.
pub(crate) fn anova_table(input: &AnovaInput<'_>) -> Vec<AnovaRow> {
    let n = input.y.len();
    let p = input.beta.len();
    let ss = SumsOfSquares::new(input.y, input.fitted);

    let df_model = p.saturating_sub(1);
    let df_residual = n - p;
    let residual = (df_residual > 0).then(|| (ss.residual / df_residual as f64, df_residual));

    let mut table = Vec::with_capacity(input.terms.len() + 5);
    table.push(row(AnovaSource::Model, ss.model, df_model, residual));

    for (name, columns) in input.terms {
        let term_ss = extra_sum_of_squares(input.beta, input.covariance, columns.clone());
        table.push(row(AnovaSource::Term(name.clone()), term_ss, columns.len(), residual));
    }

    table.push(row(AnovaSource::Residual, ss.residual, df_residual, None));

    let (pure_error, df_pure) = pure_error(input.y, input.groups);
    if df_pure > 0 && df_residual > df_pure {
        let df_lack = df_residual - df_pure;
        let lack = (ss.residual - pure_error).max(0.0);
        let pure_ms = pure_error / df_pure as f64;
        table.push(row(AnovaSource::LackOfFit, lack, df_lack, Some((pure_ms, df_pure))));
        table.push(row(AnovaSource::PureError, pure_error, df_pure, None));
    }

    table.push(row(AnovaSource::CorTotal, ss.total, n - 1, None));
    table
}

/// Row with mean square and, given a denominator `(ms, df)`, F and p.
fn row(source: AnovaSource, ss: f64, df: usize, denominator: Option<(f64, usize)>) -> AnovaRow {
    let mean_square = (df > 0).then(|| ss / df as f64);
    let f_value = match (mean_square, denominator) {
        (Some(ms), Some((den, _))) if den > 0.0 => Some(ms / den),
        _ => None,
    };
    let p_value = match (f_value, denominator) {
        (Some(f), Some((_, den_df))) => Some(f_distribution_p_value(f, df, den_df)),
        _ => None,
    };
    AnovaRow {
        source,
        sum_of_squares: ss,
        degrees_of_freedom: df,
        mean_square,
        f_value,
        p_value,
    }
}

/// `β_Tᵀ (C_TT)⁻¹ β_T` for the columns of one term.
fn extra_sum_of_squares(
    beta: &Array1<f64>,
    covariance: &Array2<f64>,
    columns: Range<usize>,
) -> f64 {
    if columns.len() == 1 {
        let j = columns.start;
        return beta[j] * beta[j] / covariance[[j, j]];
    }

    let block = covariance
        .slice(ndarray::s![columns.clone(), columns.clone()])
        .to_owned();
    let mut chol = IncrementalCholesky::new(&block, 0.0);
    for j in 0..block.nrows() {
        chol.try_push(j);
    }
    let b = beta.slice(ndarray::s![columns]).to_owned();
    crate::linalg::quadratic_form(&chol.inverse(), b.view())
}

/// Pure-error sum of squares and degrees of freedom from replicate groups.
fn pure_error(y: &Array1<f64>, groups: &[usize]) -> (f64, usize) {
    let mut by_group: HashMap<usize, Vec<f64>> = HashMap::new();
    for (&g, &v) in groups.iter().zip(y) {
        by_group.entry(g).or_default().push(v);
    }
    let ss = by_group
        .values()
        .map(|values| {
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
        })
        .sum();
    (ss, y.len() - by_group.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg;
    use ndarray::array;

    #[test]
    fn test_sums_of_squares_identity() {
        // straight-line fit: y = -0.5 + 1.4 x
        let x = array![[1.0, 1.0], [1.0, 2.0], [1.0, 3.0], [1.0, 4.0]];
        let y = array![1.0, 2.0, 4.0, 5.0];
        let g = linalg::gram(&x);
        let mut chol = IncrementalCholesky::new(&g, linalg::DEFAULT_PIVOT_TOLERANCE);
        assert!(chol.try_push(0) && chol.try_push(1));
        let beta = linalg::least_squares(&x, &chol.inverse(), &y);
        assert!((beta[0] + 0.5).abs() < 1e-12);
        assert!((beta[1] - 1.4).abs() < 1e-12);

        let fitted = x.dot(&beta);
        let ss = SumsOfSquares::new(&y, &fitted);
        assert!((ss.total - 10.0).abs() < 1e-12);
        assert!((ss.model - 9.8).abs() < 1e-10);
        assert!((ss.residual - 0.2).abs() < 1e-10);
        assert!((ss.model + ss.residual - ss.total).abs() < 1e-10);
    }

    #[test]
    fn test_pure_error() {
        let y = array![10.0, 12.0, 20.0, 30.0, 31.0, 29.0];
        let groups = [0, 0, 1, 2, 2, 2];
        let (ss, df) = pure_error(&y, &groups);
        assert!((ss - 4.0).abs() < 1e-12);
        assert_eq!(df, 3);
    }

    #[test]
    fn test_row_without_denominator() {
        let r = row(AnovaSource::Residual, 6.0, 3, None);
        assert_eq!(r.mean_square, Some(2.0));
        assert!(r.f_value.is_none());
        assert!(r.p_value.is_none());

        let r = row(AnovaSource::Model, 8.0, 2, Some((2.0, 3)));
        assert_eq!(r.f_value, Some(2.0));
        assert!(r.p_value.unwrap() > 0.0 && r.p_value.unwrap() < 1.0);
    }

    #[test]
    fn test_multi_column_extra_ss() {
        // with identity covariance the extra SS is the squared norm
        let beta = array![1.0, 2.0, 3.0];
        let cov = Array2::<f64>::eye(3);
        assert!((extra_sum_of_squares(&beta, &cov, 1..3) - 13.0).abs() < 1e-12);
        assert!((extra_sum_of_squares(&beta, &cov, 0..1) - 1.0).abs() < 1e-12);
    }
}
