//! Plackett-Burman screening designs.
//!
//! N runs for up to N − 1 two-level factors, where N is the smallest multiple
//! of 4 strictly greater than the factor count. Orders up to 24 come from the
//! classical cyclic generators: row `i` is the generator shifted right by `i`
//! and a final row holds every factor low. Larger orders drop the first column
//! of a normalized Sylvester or Paley Hadamard matrix.

use super::hadamard;
use super::{
    center_points, require_two_level, DesignMetadata, DesignOptions, DesignPlan, DesignPoint,
    DesignStrategy, PointType,
};
use crate::error::{Error, Result};
use crate::factor::Factor;

/// Cyclic generators, indexed by run count.
const CYCLIC_GENERATORS: [(usize, &str); 6] = [
    (4, "++-"),
    (8, "+++-+--"),
    (12, "++-+++---+-"),
    (16, "++++-+-++--+---"),
    (20, "++--++++-+-+----++-"),
    (24, "+++++-+-++--++--+-+----"),
];

/// Plackett-Burman construction.
///
/// # Example
///
/// ```
/// use doekit::design::{generate, DesignOptions, DesignType};
/// use doekit::Factor;
///
/// let factors: Vec<Factor> = (1..=7)
///     .map(|i| Factor::continuous(format!("X{i}"), 0.0, 1.0))
///     .collect();
/// let design = generate(DesignType::PlackettBurman, &factors, &DesignOptions::default()).unwrap();
/// assert_eq!(design.len(), 8);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PlackettBurman;

impl PlackettBurman {
    /// Run count for `k` factors: smallest multiple of 4 that is ≥ k + 1.
    #[must_use]
    pub fn run_count(k: usize) -> usize {
        (k + 1).div_ceil(4).max(1) * 4
    }

    /// Sign matrix with `runs` rows and `runs − 1` columns, if a construction
    /// exists for that order.
    #[must_use]
    pub fn matrix(runs: usize) -> Option<Vec<Vec<f64>>> {
        if let Some((_, generator)) = CYCLIC_GENERATORS.iter().find(|(n, _)| *n == runs) {
            let signs: Vec<f64> = generator
                .bytes()
                .map(|b| if b == b'+' { 1.0 } else { -1.0 })
                .collect();
            let m = signs.len();
            let mut rows: Vec<Vec<f64>> = (0..m)
                .map(|i| (0..m).map(|j| signs[(j + m - i) % m]).collect())
                .collect();
            rows.push(vec![-1.0; m]);
            return Some(rows);
        }

        let h = hadamard::sylvester(runs).or_else(|| hadamard::paley(runs))?;
        Some(
            h.outer_iter()
                .map(|row| row.iter().skip(1).map(|&v| f64::from(v)).collect())
                .collect(),
        )
    }
}

impl DesignStrategy for PlackettBurman {
    fn name(&self) -> &'static str {
        "Plackett-Burman"
    }

    fn plan(&self, factors: &[Factor], options: &DesignOptions) -> Result<DesignPlan> {
        require_two_level(factors, self.name())?;
        let k = factors.len();
        let runs = Self::run_count(k);
        let matrix = Self::matrix(runs).ok_or_else(|| {
            Error::configuration(format!(
                "{} has no construction for {runs} runs ({k} factors)",
                self.name()
            ))
        })?;

        let mut points: Vec<DesignPoint> = matrix
            .into_iter()
            .map(|row| DesignPoint {
                settings: factors
                    .iter()
                    .zip(row)
                    .map(|(f, sign)| f.two_level_setting(sign))
                    .collect(),
                point_type: PointType::Screening,
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

        let mut notes = Vec::new();
        if runs - 1 > k {
            notes.push(format!("{} unused columns available as dummy factors", runs - 1 - k));
        }

        Ok(DesignPlan {
            points,
            metadata: DesignMetadata {
                admissible_levels,
                notes,
                ..DesignMetadata::default()
            },
        })
    }
}
