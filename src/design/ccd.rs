//! Central composite designs.
//!
//! A two-level core (full factorial, or a fraction when `options.fraction` or
//! `options.resolution` is set), `2k` axial points at `±alpha` on each
//! continuous factor with the others at zero, and center points. Categorical
//! factors are crossed with every point.

use super::fractional::{fraction_for, roman, FractionPlan};
use super::{
    cross_categorical, level_combinations, require_continuous, Alpha, DesignMetadata,
    DesignOptions, DesignPlan, DesignStrategy, PointType,
};
use crate::error::Result;
use crate::factor::Factor;

/// Central composite construction.
///
/// # Example
///
/// ```
/// use doekit::design::{generate, Alpha, DesignOptions, DesignType};
/// use doekit::Factor;
///
/// let factors: Vec<Factor> = ["A", "B", "C"]
///     .iter()
///     .map(|n| Factor::continuous(*n, 0.0, 1.0))
///     .collect();
/// let options = DesignOptions::default().with_center_points(6);
/// let design = generate(DesignType::Ccd, &factors, &options).unwrap();
///
/// assert_eq!(design.len(), 8 + 6 + 6);
/// let alpha = design.metadata.alpha.unwrap();
/// assert!((alpha - 8f64.powf(0.25)).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CentralComposite;

impl CentralComposite {
    /// Axial distance for `k` continuous factors and a core of `core_runs`.
    #[must_use]
    pub fn alpha(choice: Alpha, k: usize, core_runs: usize) -> f64 {
        match choice {
            Alpha::Rotatable => (core_runs as f64).powf(0.25),
            Alpha::FaceCentered => 1.0,
            Alpha::Spherical => (k as f64).sqrt(),
            Alpha::Custom(a) => a,
        }
    }
}

impl DesignStrategy for CentralComposite {
    fn name(&self) -> &'static str {
        "Central composite"
    }

    fn plan(&self, factors: &[Factor], options: &DesignOptions) -> Result<DesignPlan> {
        let continuous = require_continuous(factors, 2, self.name())?;
        let k = continuous.len();
        let mut metadata = DesignMetadata::default();

        let fraction: Option<FractionPlan> = match (options.fraction, options.resolution) {
            (None, None) => None,
            (Some(_), _) => Some(fraction_for(k, options)?),
            (None, Some(r)) => {
                let plan = FractionPlan::for_resolution(k, r).ok();
                if plan.is_none() {
                    metadata.notes.push(format!(
                        "resolution {} needs the full factorial core for {k} factors",
                        roman(r)
                    ));
                }
                plan
            }
        };

        let core: Vec<Vec<f64>> = if let Some(fraction) = fraction {
            fraction.describe(&mut metadata);
            metadata
                .notes
                .push("core labels refer to continuous factors in order".to_string());
            fraction.signs()
        } else {
            level_combinations(&vec![2; k])
                .into_iter()
                .map(|combo| {
                    combo
                        .into_iter()
                        .map(|l| if l == 0 { -1.0 } else { 1.0 })
                        .collect()
                })
                .collect()
        };

        let alpha = Self::alpha(options.alpha, k, core.len());

        let mut coded_points: Vec<(Vec<f64>, PointType)> = core
            .into_iter()
            .map(|row| (row, PointType::Factorial))
            .collect();
        for axis in 0..k {
            for sign in [-1.0, 1.0] {
                let mut point = vec![0.0; k];
                point[axis] = sign * alpha;
                coded_points.push((point, PointType::Axial));
            }
        }
        let center = (vec![0.0; k], PointType::Center);
        coded_points.extend(std::iter::repeat(center).take(options.center_points));

        let mut admissible_levels = vec![-alpha, -1.0, 0.0, 1.0, alpha];
        admissible_levels.sort_by(f64::total_cmp);
        admissible_levels.dedup_by(|a, b| (*a - *b).abs() < 1e-12);

        metadata.admissible_levels = admissible_levels;
        metadata.alpha = Some(alpha);

        Ok(DesignPlan {
            points: cross_categorical(factors, &coded_points),
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::{generate, DesignType};

    fn continuous(k: usize) -> Vec<Factor> {
        (0..k)
            .map(|i| Factor::continuous(format!("X{i}"), 10.0, 20.0))
            .collect()
    }

    #[test]
    fn test_run_count_and_default_alpha() {
        for k in 2..=5 {
            let options = DesignOptions::default().with_center_points(4);
            let design = generate(DesignType::Ccd, &continuous(k), &options).unwrap();
            assert_eq!(design.len(), (1 << k) + 2 * k + 4);
            let expected = ((1u32 << k) as f64).powf(0.25);
            assert!((design.metadata.alpha.unwrap() - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_axial_points() {
        let options = DesignOptions::default().with_randomize(false);
        let design = generate(DesignType::Ccd, &continuous(2), &options).unwrap();
        let alpha = 2f64.sqrt();
        let axial: Vec<_> = design
            .runs
            .iter()
            .filter(|r| r.point_type == PointType::Axial)
            .collect();
        assert_eq!(axial.len(), 4);
        for run in axial {
            let coded: Vec<f64> = run.settings.iter().map(|s| s.coded().unwrap()).collect();
            let nonzero: Vec<&f64> = coded.iter().filter(|c| **c != 0.0).collect();
            assert_eq!(nonzero.len(), 1);
            assert!((nonzero[0].abs() - alpha).abs() < 1e-12);
        }
        // natural units extend past the factor range
        let natural_max = design
            .runs
            .iter()
            .filter_map(|r| match r.settings[0].value() {
                crate::factor::FactorValue::Numeric(v) => Some(v),
                crate::factor::FactorValue::Label(_) => None,
            })
            .fold(f64::MIN, f64::max);
        assert!((natural_max - (15.0 + 5.0 * alpha)).abs() < 1e-9);
    }

    #[test]
    fn test_face_centered_levels() {
        let options = DesignOptions::default()
            .with_alpha(Alpha::FaceCentered)
            .with_center_points(1);
        let design = generate(DesignType::Ccd, &continuous(3), &options).unwrap();
        assert_eq!(design.metadata.admissible_levels, vec![-1.0, 0.0, 1.0]);
        assert_eq!(design.metadata.alpha, Some(1.0));
    }

    #[test]
    fn test_fractional_core() {
        let options = DesignOptions::default().with_fraction(1).with_center_points(2);
        let design = generate(DesignType::Ccd, &continuous(5), &options).unwrap();
        assert_eq!(design.len(), 16 + 10 + 2);
        assert_eq!(design.metadata.resolution, Some(5));
        assert!((design.metadata.alpha.unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_resolution_selects_fractional_core() {
        let options = DesignOptions::default().with_resolution(5).with_center_points(2);
        let design = generate(DesignType::Ccd, &continuous(5), &options).unwrap();
        assert_eq!(design.len(), 16 + 10 + 2);
        assert_eq!(design.metadata.resolution, Some(5));

        let options = DesignOptions::default().with_resolution(4).with_center_points(1);
        let design = generate(DesignType::Ccd, &continuous(6), &options).unwrap();
        assert_eq!(design.len(), 16 + 12 + 1);
        assert_eq!(design.metadata.resolution, Some(4));
    }

    #[test]
    fn test_unreachable_resolution_keeps_full_core() {
        let options = DesignOptions::default().with_resolution(5).with_center_points(1);
        let design = generate(DesignType::Ccd, &continuous(4), &options).unwrap();
        assert_eq!(design.len(), 16 + 8 + 1);
        assert_eq!(design.metadata.resolution, None);
        assert!(design.metadata.notes.iter().any(|n| n.contains("full factorial core")));
    }

    #[test]
    fn test_categorical_crossed() {
        let mut factors = continuous(2);
        factors.push(Factor::categorical("Solvent", ["water", "ethanol"]));
        let options = DesignOptions::default().with_center_points(1);
        let design = generate(DesignType::Ccd, &factors, &options).unwrap();
        assert_eq!(design.len(), 2 * (4 + 4 + 1));
    }

    #[test]
    fn test_requires_two_continuous_factors() {
        let factors = vec![
            Factor::continuous("A", 0.0, 1.0),
            Factor::categorical("B", ["x", "y"]),
        ];
        let err = generate(DesignType::Ccd, &factors, &DesignOptions::default()).unwrap_err();
        assert!(err.to_string().contains("at least 2 continuous"));
    }
}
