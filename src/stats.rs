//! Distribution tails used by model inference.
//!
//! Provides:
//! - F-distribution upper-tail probability (ANOVA F tests)
//! - Student t two-sided tail probability (coefficient tests)
//! - Student t critical values (confidence and prediction intervals)

use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};

/// Upper-tail probability of the F-distribution, P(F > f).
///
/// Returns 1 for non-positive statistics or zero degrees of freedom, and NaN
/// for a NaN statistic.
#[must_use]
pub fn f_distribution_p_value(f: f64, df1: usize, df2: usize) -> f64 {
    if f.is_nan() {
        return f64::NAN;
    }
    if f == f64::INFINITY {
        return 0.0;
    }
    if f <= 0.0 || df1 == 0 || df2 == 0 {
        return 1.0;
    }
    match FisherSnedecor::new(df1 as f64, df2 as f64) {
        Ok(dist) => dist.sf(f),
        Err(_) => f64::NAN,
    }
}

fn students_t(df: usize) -> Option<StudentsT> {
    StudentsT::new(0.0, 1.0, df as f64).ok()
}

/// Two-sided tail probability of Student's t, P(|T| > |t|).
#[must_use]
pub fn t_distribution_p_value(t: f64, df: usize) -> f64 {
    if t.is_nan() || df == 0 {
        return f64::NAN;
    }
    if t.is_infinite() {
        return 0.0;
    }
    students_t(df).map_or(f64::NAN, |dist| (2.0 * dist.sf(t.abs())).min(1.0))
}

/// Critical value t such that P(-t < T < t) = `confidence`.
///
/// Returns NaN for a confidence outside (0, 1) and infinity for zero degrees
/// of freedom.
#[must_use]
pub fn t_value(confidence: f64, df: usize) -> f64 {
    if confidence <= 0.0 || confidence >= 1.0 {
        return f64::NAN;
    }
    if df == 0 {
        return f64::INFINITY;
    }
    let upper = 0.5 + confidence / 2.0;
    students_t(df).map_or(f64::NAN, |dist| dist.inverse_cdf(upper))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f_distribution_critical_value() {
        // F(0.95; 3, 10) = 3.708
        let p = f_distribution_p_value(3.708, 3, 10);
        assert!((p - 0.05).abs() < 1e-3, "got {p}");
        // F(0.99; 2, 20) = 5.849
        let p = f_distribution_p_value(5.849, 2, 20);
        assert!((p - 0.01).abs() < 1e-4, "got {p}");

        assert!((f_distribution_p_value(0.0, 3, 10) - 1.0).abs() < 1e-12);
        assert!(f_distribution_p_value(100.0, 3, 10) < 1e-6);
        assert_eq!(f_distribution_p_value(f64::INFINITY, 1, 5), 0.0);
        assert!(f_distribution_p_value(f64::NAN, 1, 5).is_nan());
    }

    #[test]
    fn test_t_distribution_p_value() {
        // t(0.975; 10) = 2.228
        let p = t_distribution_p_value(2.228, 10);
        assert!((p - 0.05).abs() < 1e-3, "got {p}");
        // Cauchy: P(|T| > 1) = 0.5 exactly
        assert!((t_distribution_p_value(1.0, 1) - 0.5).abs() < 1e-9);
        // t(0.975; 4) = 2.776
        assert!((t_distribution_p_value(2.776, 4) - 0.05).abs() < 1e-3);
        assert!((t_distribution_p_value(0.0, 5) - 1.0).abs() < 1e-12);
        let negative = t_distribution_p_value(-1.5, 7);
        assert!((negative - t_distribution_p_value(1.5, 7)).abs() < 1e-14);
    }

    #[test]
    fn test_slope_test_matches_tables() {
        // slope t = 2.476 on 4 df is significant at 10% but not at 5%
        let p = t_distribution_p_value(2.476, 4);
        assert!((p - 0.0684).abs() < 1e-3, "got {p}");
    }

    #[test]
    fn test_t_value_known() {
        assert!((t_value(0.95, 1) - 12.706).abs() < 1e-3);
        assert!((t_value(0.95, 10) - 2.228).abs() < 1e-3);
        assert!((t_value(0.90, 10) - 1.812).abs() < 1e-3);
        assert!((t_value(0.99, 10) - 3.169).abs() < 1e-3);
        assert!((t_value(0.95, 1000) - 1.962).abs() < 1e-3);
    }

    #[test]
    fn test_t_value_inverts_tail() {
        for df in [2, 5, 17] {
            let t = t_value(0.95, df);
            assert!((t_distribution_p_value(t, df) - 0.05).abs() < 1e-8);
        }
    }

    #[test]
    fn test_t_value_edges() {
        assert!(t_value(1.0, 5).is_nan());
        assert!(t_value(0.0, 5).is_nan());
        assert!(t_value(0.95, 0).is_infinite());
        assert!(t_value(0.95, 12) < t_value(0.95, 10));
    }
}
