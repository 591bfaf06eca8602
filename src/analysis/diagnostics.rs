//! Influence and residual diagnostics.
//!
//! All quantities come from the hat-matrix diagonal `h_i = x_iᵀ C x_i`, so no
//! run needs to be refitted.

use ndarray::Array1;

use super::types::RunDiagnostic;

/// Leverage at or above this value makes deletion statistics undefined.
const MAX_LEVERAGE: f64 = 1.0 - 1e-10;

/// Per-run diagnostics for a fit with `p` estimated columns.
pub(crate) fn run_diagnostics(
    run_ids: &[usize],
    y: &Array1<f64>,
    fitted: &Array1<f64>,
    leverage: &[f64],
    p: usize,
) -> Vec<RunDiagnostic> {
    let n = y.len();
    let df_residual = n - p;
    let sse: f64 = y.iter().zip(fitted).map(|(a, f)| (a - f).powi(2)).sum();
    let mse = (df_residual > 0).then(|| sse / df_residual as f64);

    (0..n)
        .map(|i| {
            let residual = y[i] - fitted[i];
            let h = leverage[i];
            let influential = h < MAX_LEVERAGE;

            let studentized = match mse {
                Some(mse) if influential && mse > 0.0 => Some(residual / (mse * (1.0 - h)).sqrt()),
                _ => None,
            };
            let cooks_distance = studentized.map(|r| r * r * h / (p as f64 * (1.0 - h)));

            // s²(i): residual variance with run i deleted
            let external = (influential && df_residual > 1)
                .then(|| (sse - residual * residual / (1.0 - h)) / (df_residual - 1) as f64)
                .filter(|s2| *s2 > 0.0)
                .map(|s2| residual / (s2 * (1.0 - h)).sqrt());
            let dffits = external.map(|t| t * (h / (1.0 - h)).sqrt());

            RunDiagnostic {
                run: run_ids[i],
                actual: y[i],
                predicted: fitted[i],
                residual,
                leverage: h,
                studentized_residual: studentized,
                externally_studentized_residual: external,
                cooks_distance,
                dffits,
            }
        })
        .collect()
}

/// Predicted residual error sum of squares, `Σ (e_i / (1 − h_i))²`.
///
/// `None` when a run has leverage 1 (its deleted residual is undefined).
pub(crate) fn press(y: &Array1<f64>, fitted: &Array1<f64>, leverage: &[f64]) -> Option<f64> {
    if leverage.iter().any(|&h| h >= MAX_LEVERAGE) {
        return None;
    }
    Some(
        y.iter()
            .zip(fitted)
            .zip(leverage)
            .map(|((a, f), h)| ((a - f) / (1.0 - h)).powi(2))
            .sum(),
    )
}
