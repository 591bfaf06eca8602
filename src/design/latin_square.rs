//! Latin square designs.
//!
//! Three factors with n levels each: the first two are blocking dimensions
//! (rows and columns), the third is the treatment. Cell (i, j) receives
//! treatment level (i + j) mod n, so every level appears once in each row and
//! each column. Runs are blocked by row.

use super::{DesignMetadata, DesignOptions, DesignPlan, DesignPoint, DesignStrategy, PointType};
use crate::error::{Error, Result};
use crate::factor::{Factor, Setting};

/// Latin square construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatinSquare;

impl LatinSquare {
    /// Equally spaced coded levels from −1 to +1.
    fn coded_levels(n: usize) -> Vec<f64> {
        (0..n)
            .map(|l| -1.0 + 2.0 * l as f64 / (n - 1) as f64)
            .collect()
    }

    fn level_count(factor: &Factor, options: &DesignOptions) -> usize {
        if factor.is_continuous() {
            options.levels
        } else {
            factor.categories().len()
        }
    }

    fn setting(factor: &Factor, level: usize, coded_levels: &[f64]) -> Setting {
        if factor.is_continuous() {
            factor.coded_setting(coded_levels[level])
        } else {
            factor.category_setting(level)
        }
    }
}

impl DesignStrategy for LatinSquare {
    fn name(&self) -> &'static str {
        "Latin square"
    }

    fn plan(&self, factors: &[Factor], options: &DesignOptions) -> Result<DesignPlan> {
        if factors.len() != 3 {
            return Err(Error::configuration(format!(
                "{} requires exactly 3 factors (row, column, treatment), got {}",
                self.name(),
                factors.len()
            )));
        }
        if options.center_points > 0 {
            return Err(Error::configuration(format!(
                "{} does not support center points",
                self.name()
            )));
        }

        let n = Self::level_count(&factors[0], options);
        if n < 2 {
            return Err(Error::configuration(format!(
                "{} requires at least 2 levels, got {n}",
                self.name()
            )));
        }
        if let Some(f) = factors.iter().find(|f| Self::level_count(f, options) != n) {
            return Err(Error::configuration(format!(
                "{} requires every factor to have {n} levels, but '{}' has {}",
                self.name(),
                f.name,
                Self::level_count(f, options)
            )));
        }

        let coded_levels = Self::coded_levels(n);
        let mut points = Vec::with_capacity(n * n);
        for row in 0..n {
            for col in 0..n {
                let treatment = (row + col) % n;
                points.push(DesignPoint {
                    settings: vec![
                        Self::setting(&factors[0], row, &coded_levels),
                        Self::setting(&factors[1], col, &coded_levels),
                        Self::setting(&factors[2], treatment, &coded_levels),
                    ],
                    point_type: PointType::Latin,
                    block: Some(u32::try_from(row + 1).unwrap_or(u32::MAX)),
                });
            }
        }

        Ok(DesignPlan {
            points,
            metadata: DesignMetadata {
                admissible_levels: coded_levels,
                notes: vec![format!(
                    "rows: {}, columns: {}, treatment: {}",
                    factors[0].name, factors[1].name, factors[2].name
                )],
                ..DesignMetadata::default()
            },
        })
    }
}
