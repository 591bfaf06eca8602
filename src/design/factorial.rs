//! Full factorial designs.
//!
//! Every combination of factor levels: two coded levels (-1, +1) per
//! continuous factor and every category of each categorical factor, in
//! standard order with the first factor varying fastest.

use super::{
    center_points, level_combinations, DesignMetadata, DesignOptions, DesignPlan, DesignPoint,
    DesignStrategy, PointType,
};
use crate::error::Result;
use crate::factor::Factor;

/// Full factorial construction.
///
/// # Example
///
/// ```
/// use doekit::design::{generate, DesignOptions, DesignType};
/// use doekit::Factor;
///
/// let factors = vec![
///     Factor::continuous("A", 0.0, 1.0),
///     Factor::continuous("B", 0.0, 1.0),
///     Factor::categorical("Catalyst", ["X", "Y", "Z"]),
/// ];
/// let design = generate(DesignType::Factorial, &factors, &DesignOptions::default()).unwrap();
/// assert_eq!(design.len(), 2 * 2 * 3);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct FullFactorial;

impl DesignStrategy for FullFactorial {
    fn name(&self) -> &'static str {
        "Full factorial"
    }

    fn plan(&self, factors: &[Factor], options: &DesignOptions) -> Result<DesignPlan> {
        let radices: Vec<usize> = factors
            .iter()
            .map(|f| if f.is_continuous() { 2 } else { f.categories().len() })
            .collect();

        let mut points: Vec<DesignPoint> = level_combinations(&radices)
            .into_iter()
            .map(|combo| DesignPoint {
                settings: factors
                    .iter()
                    .zip(combo)
                    .map(|(f, level)| {
                        if f.is_continuous() {
                            f.coded_setting(if level == 0 { -1.0 } else { 1.0 })
                        } else {
                            f.category_setting(level)
                        }
                    })
                    .collect(),
                point_type: PointType::Factorial,
                block: None,
            })
            .collect();

        let centers = center_points(factors, options.center_points, self.name())?;
        let admissible_levels = if centers.is_empty() {
            vec![-1.0, 1.0]
        } else {
            vec![-1.0, 0.0, 1.0]
        };
        points.extend(centers);

        Ok(DesignPlan {
            points,
            metadata: DesignMetadata {
                admissible_levels,
                ..DesignMetadata::default()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::{generate, DesignType};

    fn continuous(k: usize) -> Vec<Factor> {
        (0..k)
            .map(|i| Factor::continuous(format!("X{i}"), 0.0, 10.0))
            .collect()
    }

    #[test]
    fn test_run_count_is_two_to_the_k() {
        for k in 1..=6 {
            let design = generate(DesignType::Factorial, &continuous(k), &DesignOptions::default())
                .unwrap();
            assert_eq!(design.len(), 1 << k);
            for run in &design.runs {
                for s in &run.settings {
                    let c = s.coded().unwrap();
                    assert!(c == -1.0 || c == 1.0);
                }
            }
        }
    }

    #[test]
    fn test_center_points_excluded_from_corner_count() {
        let options = DesignOptions::default().with_center_points(3);
        let design = generate(DesignType::Factorial, &continuous(3), &options).unwrap();
        assert_eq!(design.len(), 8 + 3);
        assert_eq!(design.center_point_count(), 3);
        let corners = design.runs.iter().filter(|r| !r.is_center_point);
        for run in corners {
            assert!(run.settings.iter().all(|s| s.coded().unwrap().abs() == 1.0));
        }
        assert_eq!(design.metadata.admissible_levels, vec![-1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_categorical_center_points_per_combination() {
        let factors = vec![
            Factor::continuous("T", 0.0, 1.0),
            Factor::categorical("Mode", ["a", "b"]),
        ];
        let options = DesignOptions::default().with_center_points(2);
        let design = generate(DesignType::Factorial, &factors, &options).unwrap();
        assert_eq!(design.len(), 4 + 2 * 2);
        let centers: Vec<_> = design.runs.iter().filter(|r| r.is_center_point).collect();
        assert!(centers.iter().any(|r| r.settings[1].category() == Some(0)));
        assert!(centers.iter().any(|r| r.settings[1].category() == Some(1)));
    }

    #[test]
    fn test_center_points_need_continuous_factor() {
        let factors = vec![Factor::categorical("Mode", ["a", "b"])];
        let options = DesignOptions::default().with_center_points(1);
        let err = generate(DesignType::Factorial, &factors, &options).unwrap_err();
        assert!(err.to_string().contains("continuous"));
    }
}
