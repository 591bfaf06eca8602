//! Experimental design generation.
//!
//! Every design type is a [`DesignStrategy`] that turns a factor list and
//! [`DesignOptions`] into a [`DesignPlan`]: the base points in standard order
//! plus metadata. [`generate`] then replicates and randomizes the plan into a
//! [`DesignMatrix`].
//!
//! ## Available Designs
//!
//! | Design | Runs | Requirements |
//! |--------|------|--------------|
//! | [`DesignType::Factorial`] | ∏ levels (+ center) | any factors |
//! | [`DesignType::Fractional`] | 2^(k−p) (+ center) | two-level factors, k ≥ 3 |
//! | [`DesignType::Ccd`] | core + 2k + center | ≥ 2 continuous factors |
//! | [`DesignType::Bbd`] | 4·C(k,2) + center | ≥ 3 continuous factors |
//! | [`DesignType::PlackettBurman`] | 4⌈(k+1)/4⌉ | two-level factors |
//! | [`DesignType::LatinSquare`] | n² | 3 factors with n levels |
//!
//! ## Example
//!
//! ```
//! use doekit::design::{generate, DesignOptions, DesignType};
//! use doekit::Factor;
//!
//! let factors = vec![
//!     Factor::continuous("Temperature", 60.0, 80.0),
//!     Factor::continuous("Pressure", 100.0, 200.0),
//! ];
//! let options = DesignOptions::default().with_center_points(1).with_seed(7);
//! let design = generate(DesignType::Factorial, &factors, &options).unwrap();
//!
//! assert_eq!(design.len(), 5);
//! assert_eq!(design.center_point_count(), 1);
//! ```

mod box_behnken;
mod ccd;
mod factorial;
mod fractional;
mod hadamard;
mod latin_square;
mod plackett_burman;

pub use box_behnken::BoxBehnken;
pub use ccd::CentralComposite;
pub use factorial::FullFactorial;
pub use fractional::{FractionPlan, FractionalFactorial};
pub use latin_square::LatinSquare;
pub use plackett_burman::PlackettBurman;

use std::collections::BTreeMap;
use std::fmt;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::context::{RunContext, Stage};
use crate::error::{Error, Result};
use crate::factor::{validate_factors, Factor, FactorValue, Setting};

/// Tolerance for admissible coded level checks.
const LEVEL_TOLERANCE: f64 = 1e-9;

/// Closed set of supported design types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum DesignType {
    /// Full factorial.
    Factorial,
    /// Two-level regular fractional factorial.
    Fractional,
    /// Central composite design.
    Ccd,
    /// Box-Behnken design.
    Bbd,
    /// Plackett-Burman screening design.
    PlackettBurman,
    /// Latin square.
    LatinSquare,
}

impl DesignType {
    /// Strategy implementing this design type.
    #[must_use]
    pub fn strategy(self) -> &'static dyn DesignStrategy {
        match self {
            Self::Factorial => &FullFactorial,
            Self::Fractional => &FractionalFactorial,
            Self::Ccd => &CentralComposite,
            Self::Bbd => &BoxBehnken,
            Self::PlackettBurman => &PlackettBurman,
            Self::LatinSquare => &LatinSquare,
        }
    }

    /// Whether the design supports a full quadratic model.
    #[must_use]
    pub fn is_response_surface(self) -> bool {
        matches!(self, Self::Ccd | Self::Bbd)
    }
}

impl std::str::FromStr for DesignType {
    type Err = Error;

    /// Parse the wire name (`FACTORIAL`, `PLACKETT_BURMAN`, ...), ignoring case.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().replace(['-', ' '], "_").as_str() {
            "FACTORIAL" => Ok(Self::Factorial),
            "FRACTIONAL" => Ok(Self::Fractional),
            "CCD" => Ok(Self::Ccd),
            "BBD" => Ok(Self::Bbd),
            "PLACKETT_BURMAN" => Ok(Self::PlackettBurman),
            "LATIN_SQUARE" => Ok(Self::LatinSquare),
            _ => Err(Error::configuration(format!("unknown design type '{s}'"))),
        }
    }
}

impl fmt::Display for DesignType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.strategy().name())
    }
}

/// Axial distance choice for central composite designs.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Alpha {
    /// (F)^(1/4), F = number of factorial core runs.
    #[default]
    Rotatable,
    /// Axial points on the faces of the cube (alpha = 1).
    FaceCentered,
    /// Axial points on the sphere through the corners (alpha = √k).
    Spherical,
    /// Explicit positive axial distance.
    Custom(f64),
}

/// Options controlling design generation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DesignOptions {
    /// Center points per categorical combination (default: 0).
    pub center_points: usize,
    /// Number of copies of the base design (default: 1).
    pub replicates: usize,
    /// Axial distance for CCD (default: rotatable).
    pub alpha: Alpha,
    /// Number of generators p for 2^(k−p) fractions.
    pub fraction: Option<u32>,
    /// Minimum resolution for fractional designs.
    pub resolution: Option<u32>,
    /// Levels for continuous factors in a Latin square (default: 3).
    pub levels: usize,
    /// Randomize run order (default: true).
    pub randomize: bool,
    /// Seed for run-order randomization.
    pub seed: Option<u64>,
}

impl Default for DesignOptions {
    fn default() -> Self {
        Self {
            center_points: 0,
            replicates: 1,
            alpha: Alpha::Rotatable,
            fraction: None,
            resolution: None,
            levels: 3,
            randomize: true,
            seed: None,
        }
    }
}

impl DesignOptions {
    /// Set the number of center points.
    #[must_use]
    pub fn with_center_points(mut self, center_points: usize) -> Self {
        self.center_points = center_points;
        self
    }

    /// Set the number of replicates.
    #[must_use]
    pub fn with_replicates(mut self, replicates: usize) -> Self {
        self.replicates = replicates;
        self
    }

    /// Set the CCD axial distance.
    #[must_use]
    pub fn with_alpha(mut self, alpha: Alpha) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set the number of fraction generators.
    #[must_use]
    pub fn with_fraction(mut self, p: u32) -> Self {
        self.fraction = Some(p);
        self
    }

    /// Set the minimum resolution of a fraction.
    #[must_use]
    pub fn with_resolution(mut self, resolution: u32) -> Self {
        self.resolution = Some(resolution);
        self
    }

    /// Set the Latin square level count for continuous factors.
    #[must_use]
    pub fn with_levels(mut self, levels: usize) -> Self {
        self.levels = levels;
        self
    }

    /// Enable or disable run-order randomization.
    #[must_use]
    pub fn with_randomize(mut self, randomize: bool) -> Self {
        self.randomize = randomize;
        self
    }

    /// Fix the randomization seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.replicates == 0 {
            return Err(Error::configuration("replicates must be at least 1"));
        }
        if let Alpha::Custom(a) = self.alpha {
            if !a.is_finite() || a <= 0.0 {
                return Err(Error::configuration(format!(
                    "custom alpha must be a positive finite number, got {a}"
                )));
            }
        }
        Ok(())
    }
}

/// Role of a run within its design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PointType {
    /// Corner of the factorial cube (or a categorical combination).
    Factorial,
    /// CCD star point.
    Axial,
    /// Center point.
    Center,
    /// Box-Behnken edge midpoint.
    Edge,
    /// Plackett-Burman screening run.
    Screening,
    /// Latin square cell.
    Latin,
}

/// A single run of a design.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DesignRun {
    /// 1-based position in standard order.
    pub standard_order: usize,
    /// 1-based position in execution order.
    pub run_order: usize,
    /// Setting of every factor, in factor order.
    pub settings: Vec<Setting>,
    /// Block id, if the design is blocked.
    pub block: Option<u32>,
    /// Role of the run.
    pub point_type: PointType,
    /// Whether all continuous factors sit at coded zero.
    pub is_center_point: bool,
}

/// One alias chain of a fractional design.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AliasChain {
    /// Effect, e.g. `A` or `AB`.
    pub effect: String,
    /// Effects confounded with it (up to three-factor interactions).
    pub aliases: Vec<String>,
}

impl fmt::Display for AliasChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] = {}", self.effect, self.effect)?;
        for alias in &self.aliases {
            write!(f, " + {alias}")?;
        }
        Ok(())
    }
}

/// Design-level metadata.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DesignMetadata {
    /// Admissible coded values for continuous factors.
    pub admissible_levels: Vec<f64>,
    /// Axial distance (CCD).
    pub alpha: Option<f64>,
    /// Single-letter labels used in generators and aliases, in factor order.
    pub factor_labels: Vec<String>,
    /// Fraction generators, e.g. `E = ABCD`.
    pub generators: Vec<String>,
    /// Words of the defining relation, e.g. `ABCDE`.
    pub defining_relation: Vec<String>,
    /// Design resolution.
    pub resolution: Option<u32>,
    /// Alias chains of main effects and two-factor interactions.
    pub alias_structure: Vec<AliasChain>,
    /// Seed used for randomization.
    pub seed: Option<u64>,
    /// Free-form notes.
    pub notes: Vec<String>,
}

/// A base point produced by a strategy, before replication.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignPoint {
    /// Setting of every factor.
    pub settings: Vec<Setting>,
    /// Role of the point.
    pub point_type: PointType,
    /// Strategy-assigned block.
    pub block: Option<u32>,
}

/// Base points and metadata of a design.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignPlan {
    /// Points in standard order.
    pub points: Vec<DesignPoint>,
    /// Metadata.
    pub metadata: DesignMetadata,
}

/// Uniform contract implemented by every design type.
pub trait DesignStrategy: Send + Sync {
    /// Display name.
    fn name(&self) -> &'static str;

    /// Build the base plan for already-validated factors.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the factors or options are
    /// incompatible with the design.
    fn plan(&self, factors: &[Factor], options: &DesignOptions) -> Result<DesignPlan>;
}

/// Serialized form of a run: `{factor_name: value, block, is_center_point}`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DesignRow {
    /// 1-based execution order.
    pub run_order: usize,
    /// Natural-unit value per factor name.
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub values: BTreeMap<String, FactorValue>,
    /// Block id.
    pub block: Option<u32>,
    /// Center-point flag.
    pub is_center_point: bool,
}

/// A generated design.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DesignMatrix {
    /// Design type that produced the matrix.
    pub design_type: DesignType,
    /// Factors, in column order.
    pub factors: Vec<Factor>,
    /// Runs in execution order.
    pub runs: Vec<DesignRun>,
    /// Metadata.
    pub metadata: DesignMetadata,
}

impl DesignMatrix {
    /// Number of runs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Whether the design has no runs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Number of center-point runs.
    #[must_use]
    pub fn center_point_count(&self) -> usize {
        self.runs.iter().filter(|r| r.is_center_point).count()
    }

    /// Runs sorted by standard order.
    #[must_use]
    pub fn standard_order(&self) -> Vec<&DesignRun> {
        let mut runs: Vec<&DesignRun> = self.runs.iter().collect();
        runs.sort_by_key(|r| r.standard_order);
        runs
    }

    /// Coded values of one continuous factor across runs, in run order.
    #[must_use]
    pub fn coded_column(&self, factor: usize) -> Vec<Option<f64>> {
        self.runs.iter().map(|r| r.settings[factor].coded()).collect()
    }

    /// Serialized rows in run order.
    #[must_use]
    pub fn rows(&self) -> Vec<DesignRow> {
        self.runs
            .iter()
            .map(|run| DesignRow {
                run_order: run.run_order,
                values: self
                    .factors
                    .iter()
                    .zip(&run.settings)
                    .map(|(f, s)| (f.name.clone(), s.value()))
                    .collect(),
                block: run.block,
                is_center_point: run.is_center_point,
            })
            .collect()
    }

    /// Empty experiment runs (no responses yet), in run order.
    #[must_use]
    pub fn experiment_runs(&self) -> Vec<crate::analysis::ExperimentRun> {
        self.rows()
            .into_iter()
            .map(|row| crate::analysis::ExperimentRun::new(row.values))
            .collect()
    }

    /// Check that every factor has a setting in every run and continuous
    /// coded values lie in the admissible set.
    ///
    /// # Errors
    ///
    /// Returns a dimension mismatch or configuration error describing the
    /// first offending run.
    pub fn validate(&self) -> Result<()> {
        for run in &self.runs {
            if run.settings.len() != self.factors.len() {
                return Err(Error::DimensionMismatch {
                    expected: format!("{} settings", self.factors.len()),
                    actual: format!("{} settings in run {}", run.settings.len(), run.run_order),
                });
            }
            for (factor, setting) in self.factors.iter().zip(&run.settings) {
                if let Some(coded) = setting.coded() {
                    let admissible = self
                        .metadata
                        .admissible_levels
                        .iter()
                        .any(|&level| (level - coded).abs() < LEVEL_TOLERANCE);
                    if !admissible {
                        return Err(Error::configuration(format!(
                            "coded value {coded} of factor '{}' in run {} is not admissible",
                            factor.name, run.run_order
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Generate a design with a default context.
///
/// # Errors
///
/// Returns a configuration error naming the violated constraint when the
/// factors or options are incompatible with the design type.
pub fn generate(
    design_type: DesignType,
    factors: &[Factor],
    options: &DesignOptions,
) -> Result<DesignMatrix> {
    generate_with_context(design_type, factors, options, &RunContext::default())
}

/// Generate a design, reporting progress through `ctx`.
///
/// # Errors
///
/// See [`generate`].
pub fn generate_with_context(
    design_type: DesignType,
    factors: &[Factor],
    options: &DesignOptions,
    ctx: &RunContext,
) -> Result<DesignMatrix> {
    validate_factors(factors)?;
    options.validate()?;

    let strategy = design_type.strategy();
    debug!(design = strategy.name(), factors = factors.len(), "planning design");
    let mut plan = strategy.plan(factors, options)?;

    let mut runs = Vec::with_capacity(plan.points.len() * options.replicates);
    for replicate in 0..options.replicates {
        for point in &plan.points {
            let block = point.block.or_else(|| {
                (options.replicates > 1).then(|| u32::try_from(replicate + 1).unwrap_or(u32::MAX))
            });
            let is_center_point = point.point_type == PointType::Center;
            runs.push(DesignRun {
                standard_order: runs.len() + 1,
                run_order: runs.len() + 1,
                settings: point.settings.clone(),
                block,
                point_type: point.point_type,
                is_center_point,
            });
        }
    }

    if options.randomize {
        let seed = options.seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);
        runs.shuffle(&mut rng);
        for (i, run) in runs.iter_mut().enumerate() {
            run.run_order = i + 1;
        }
        plan.metadata.seed = Some(seed);
    }

    let design = DesignMatrix {
        design_type,
        factors: factors.to_vec(),
        runs,
        metadata: plan.metadata,
    };
    design.validate()?;

    info!(
        design = strategy.name(),
        runs = design.len(),
        center_points = design.center_point_count(),
        "design generated"
    );
    ctx.emit_progress(
        Stage::Design,
        100.0,
        format!("{} design generated with {} runs", strategy.name(), design.len()),
    );
    Ok(design)
}

// ============ Shared helpers for strategies ============

/// Indices of continuous factors.
pub(crate) fn continuous_indices(factors: &[Factor]) -> Vec<usize> {
    (0..factors.len()).filter(|&i| factors[i].is_continuous()).collect()
}

/// Indices of categorical factors.
pub(crate) fn categorical_indices(factors: &[Factor]) -> Vec<usize> {
    (0..factors.len()).filter(|&i| !factors[i].is_continuous()).collect()
}

/// All combinations of mixed-radix digits, first digit varying fastest.
pub(crate) fn level_combinations(radices: &[usize]) -> Vec<Vec<usize>> {
    let total: usize = radices.iter().product();
    (0..total)
        .map(|mut n| {
            radices
                .iter()
                .map(|&r| {
                    let digit = n % r;
                    n /= r;
                    digit
                })
                .collect()
        })
        .collect()
}

/// Require at least `min` continuous factors for `design`.
pub(crate) fn require_continuous(
    factors: &[Factor],
    min: usize,
    design: &str,
) -> Result<Vec<usize>> {
    let continuous = continuous_indices(factors);
    if continuous.len() < min {
        return Err(Error::configuration(format!(
            "{design} requires at least {min} continuous factors, got {}",
            continuous.len()
        )));
    }
    Ok(continuous)
}

/// Require every factor to be two-level.
pub(crate) fn require_two_level(factors: &[Factor], design: &str) -> Result<()> {
    if let Some(f) = factors.iter().find(|f| !f.is_two_level()) {
        return Err(Error::configuration(format!(
            "{design} requires two-level factors, but '{}' has {} categories",
            f.name,
            f.categories().len()
        )));
    }
    Ok(())
}

/// Cross coded continuous points with every categorical level combination.
///
/// `coded` holds one coded value per continuous factor, in factor order.
pub(crate) fn cross_categorical(
    factors: &[Factor],
    coded_points: &[(Vec<f64>, PointType)],
) -> Vec<DesignPoint> {
    let categorical = categorical_indices(factors);
    let radices: Vec<usize> = categorical.iter().map(|&i| factors[i].categories().len()).collect();
    let combinations = level_combinations(&radices);

    let mut points = Vec::with_capacity(combinations.len() * coded_points.len());
    for combo in &combinations {
        for (coded, point_type) in coded_points {
            let mut coded_iter = coded.iter();
            let mut combo_iter = combo.iter();
            let settings = factors
                .iter()
                .map(|f| {
                    if f.is_continuous() {
                        f.coded_setting(coded_iter.next().copied().unwrap_or(0.0))
                    } else {
                        f.category_setting(combo_iter.next().copied().unwrap_or(0))
                    }
                })
                .collect();
            points.push(DesignPoint {
                settings,
                point_type: *point_type,
                block: None,
            });
        }
    }
    points
}

/// Center points for every categorical combination.
pub(crate) fn center_points(
    factors: &[Factor],
    count: usize,
    design: &str,
) -> Result<Vec<DesignPoint>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let continuous = continuous_indices(factors);
    if continuous.is_empty() {
        return Err(Error::configuration(format!(
            "{design} center points require at least one continuous factor"
        )));
    }
    let center = vec![(vec![0.0; continuous.len()], PointType::Center); count];
    Ok(cross_categorical(factors, &center))
}

/// Letters used to label factors in words, skipping `I`.
pub(crate) fn factor_label(index: usize) -> String {
    const LETTERS: &[u8] = b"ABCDEFGHJKLMNOPQRSTUVWXYZ";
    if index < LETTERS.len() {
        (LETTERS[index] as char).to_string()
    } else {
        format!("X{}", index + 1)
    }
}
