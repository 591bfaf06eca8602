//! Box-Behnken designs.
//!
//! For every pair of continuous factors, the four `(±1, ±1)` combinations with
//! the remaining continuous factors held at zero, plus center points. No run
//! places every factor at an extreme.

use super::{
    cross_categorical, require_continuous, DesignMetadata, DesignOptions, DesignPlan,
    DesignStrategy, PointType,
};
use crate::error::Result;
use crate::factor::Factor;

/// Box-Behnken construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxBehnken;

impl DesignStrategy for BoxBehnken {
    fn name(&self) -> &'static str {
        "Box-Behnken"
    }

    fn plan(&self, factors: &[Factor], options: &DesignOptions) -> Result<DesignPlan> {
        let k = require_continuous(factors, 3, self.name())?.len();

        let mut coded_points = Vec::with_capacity(2 * k * (k - 1) + options.center_points);
        for i in 0..k {
            for j in (i + 1)..k {
                for (si, sj) in [(-1.0, -1.0), (1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)] {
                    let mut point = vec![0.0; k];
                    point[i] = si;
                    point[j] = sj;
                    coded_points.push((point, PointType::Edge));
                }
            }
        }
        let center = (vec![0.0; k], PointType::Center);
        coded_points.extend(std::iter::repeat(center).take(options.center_points));

        Ok(DesignPlan {
            points: cross_categorical(factors, &coded_points),
            metadata: DesignMetadata {
                admissible_levels: vec![-1.0, 0.0, 1.0],
                ..DesignMetadata::default()
            },
        })
    }
}
