//! Regular two-level fractional factorial designs, 2^(k−p).
//!
//! The first `k − p` factors form a full factorial (the *base*); each of the
//! remaining `p` factors is set to the product of a subset of base columns,
//! its *generator*. Multiplying a generated column by its generator gives a
//! *word* of the defining relation; the set of all products of those words is
//! the defining relation, and the length of its shortest word is the design
//! resolution.
//!
//! Generators are chosen to minimize the word length pattern
//! (A₃, A₄, …) lexicographically, which maximizes resolution first and then
//! minimizes aberration.
//!
//! ```
//! use doekit::design::FractionPlan;
//!
//! let plan = FractionPlan::best(5, 1).unwrap();
//! assert_eq!(plan.runs(), 16);
//! assert_eq!(plan.resolution(), 5);
//! assert_eq!(plan.generator_strings(), vec!["E = ABCD".to_string()]);
//! ```

use tracing::debug;

use super::{
    center_points, factor_label, require_two_level, AliasChain, DesignMetadata, DesignOptions,
    DesignPlan, DesignPoint, DesignStrategy, PointType,
};
use crate::error::{Error, Result};
use crate::factor::Factor;

/// Largest factor count with single-letter labels.
pub const MAX_FRACTIONAL_FACTORS: usize = 25;

/// Highest interaction order listed in alias chains.
const MAX_ALIAS_ORDER: u32 = 3;

/// Generator subsets evaluated exhaustively up to this many combinations.
const EXHAUSTIVE_LIMIT: u64 = 20_000;

/// A chosen 2^(k−p) fraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FractionPlan {
    factors: usize,
    base: usize,
    /// Base-column mask per generated factor.
    generators: Vec<u32>,
    /// Defining relation words, sorted by length then mask.
    words: Vec<u32>,
}

impl FractionPlan {
    /// Build a plan from explicit generator masks over the base factors.
    #[must_use]
    pub fn from_generators(factors: usize, generators: Vec<u32>) -> Self {
        let base = factors - generators.len();
        let words = defining_relation(base, &generators);
        Self {
            factors,
            base,
            generators,
            words,
        }
    }

    /// Best 2^(k−p) fraction for `k` factors and `p` generators.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `k < 3`, `p < 1`, fewer than two base
    /// factors remain, `k` exceeds [`MAX_FRACTIONAL_FACTORS`] or the base
    /// factorial has too few interaction columns for `p` generators.
    pub fn best(k: usize, p: usize) -> Result<Self> {
        if k < 3 {
            return Err(Error::configuration(format!(
                "fractional factorial requires at least 3 factors, got {k}"
            )));
        }
        if k > MAX_FRACTIONAL_FACTORS {
            return Err(Error::configuration(format!(
                "fractional factorial supports at most {MAX_FRACTIONAL_FACTORS} factors, got {k}"
            )));
        }
        if p == 0 {
            return Err(Error::configuration(
                "fractional factorial requires at least 1 generator (fraction p >= 1)",
            ));
        }
        if p + 2 > k {
            return Err(Error::configuration(format!(
                "2^({k}-{p}) leaves fewer than 2 base factors"
            )));
        }

        let base = k - p;
        let mut candidates: Vec<u32> = (1u32..(1 << base))
            .filter(|m| m.count_ones() >= 2)
            .collect();
        if p > candidates.len() {
            return Err(Error::configuration(format!(
                "2^({k}-{p}) is impossible: a {base}-factor base supports at most {} generated factors",
                candidates.len()
            )));
        }
        // Prefer high-order interactions as generators.
        candidates.sort_by(|a, b| b.count_ones().cmp(&a.count_ones()).then(a.cmp(b)));

        let generators = if binomial(candidates.len() as u64, p as u64) <= EXHAUSTIVE_LIMIT {
            exhaustive_search(base, &candidates, p)
        } else {
            greedy_search(base, &candidates, p)
        };

        let plan = Self::from_generators(k, generators);
        debug!(k, p, resolution = plan.resolution(), "fraction chosen");
        Ok(plan)
    }

    /// Smallest fraction (largest p) of `k` factors reaching `min_resolution`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no fraction of `k` factors reaches
    /// the requested resolution.
    pub fn for_resolution(k: usize, min_resolution: u32) -> Result<Self> {
        for p in (1..k.saturating_sub(1)).rev() {
            if let Ok(plan) = Self::best(k, p) {
                if plan.resolution() >= min_resolution {
                    return Ok(plan);
                }
            }
        }
        Err(Error::configuration(format!(
            "no 2^(k-p) fraction of {k} factors reaches resolution {}",
            roman(min_resolution)
        )))
    }

    /// Number of factors k.
    #[must_use]
    pub fn factors(&self) -> usize {
        self.factors
    }

    /// Number of generators p.
    #[must_use]
    pub fn generated(&self) -> usize {
        self.generators.len()
    }

    /// Number of runs, 2^(k−p).
    #[must_use]
    pub fn runs(&self) -> usize {
        1 << self.base
    }

    /// Length of the shortest defining word.
    #[must_use]
    pub fn resolution(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).min().unwrap_or(u32::MAX)
    }

    /// Number of defining words of each length, indexed by length.
    #[must_use]
    pub fn word_length_pattern(&self) -> Vec<usize> {
        word_length_pattern(self.factors, &self.words)
    }

    /// ±1 signs for every run (standard order) and factor.
    #[must_use]
    pub fn signs(&self) -> Vec<Vec<f64>> {
        (0..self.runs())
            .map(|run| {
                let base_sign = |j: usize| if (run >> j) & 1 == 1 { 1.0 } else { -1.0 };
                let mut row: Vec<f64> = (0..self.base).map(base_sign).collect();
                for &g in &self.generators {
                    let product = (0..self.base)
                        .filter(|&j| (g >> j) & 1 == 1)
                        .map(base_sign)
                        .product();
                    row.push(product);
                }
                row
            })
            .collect()
    }

    /// Generators rendered as `E = ABCD`.
    #[must_use]
    pub fn generator_strings(&self) -> Vec<String> {
        self.generators
            .iter()
            .enumerate()
            .map(|(i, &g)| format!("{} = {}", factor_label(self.base + i), word_string(g)))
            .collect()
    }

    /// Defining relation words, e.g. `ABCDE`.
    #[must_use]
    pub fn defining_relation_strings(&self) -> Vec<String> {
        self.words.iter().map(|&w| word_string(w)).collect()
    }

    /// Alias chains of main effects and two-factor interactions.
    #[must_use]
    pub fn alias_chains(&self) -> Vec<AliasChain> {
        let k = self.factors;
        let mut effects: Vec<u32> = (0..k).map(|i| 1u32 << i).collect();
        for i in 0..k {
            for j in (i + 1)..k {
                effects.push((1u32 << i) | (1u32 << j));
            }
        }

        let mut covered = std::collections::HashSet::new();
        let mut chains = Vec::new();
        for effect in effects {
            if !covered.insert(effect) {
                continue;
            }
            let mut aliases: Vec<u32> = self
                .words
                .iter()
                .map(|&w| effect ^ w)
                .filter(|a| a.count_ones() <= MAX_ALIAS_ORDER)
                .collect();
            aliases.sort_by(|a, b| a.count_ones().cmp(&b.count_ones()).then(a.cmp(b)));
            covered.extend(aliases.iter().copied().filter(|a| a.count_ones() <= 2));
            chains.push(AliasChain {
                effect: word_string(effect),
                aliases: aliases.into_iter().map(word_string).collect(),
            });
        }
        chains
    }

    /// Metadata entries describing this fraction.
    pub(crate) fn describe(&self, metadata: &mut DesignMetadata) {
        metadata.generators = self.generator_strings();
        metadata.defining_relation = self.defining_relation_strings();
        metadata.resolution = Some(self.resolution());
        metadata.alias_structure = self.alias_chains();
        metadata.factor_labels = (0..self.factors).map(factor_label).collect();
        metadata.notes.push(format!(
            "2^({}-{}) fraction, resolution {}",
            self.factors,
            self.generated(),
            roman(self.resolution())
        ));
    }
}

/// Choose a fraction for `k` two-level factors from the options.
pub(crate) fn fraction_for(k: usize, options: &DesignOptions) -> Result<FractionPlan> {
    let plan = match (options.fraction, options.resolution) {
        (Some(p), _) => FractionPlan::best(k, p as usize)?,
        (None, Some(r)) => FractionPlan::for_resolution(k, r)?,
        (None, None) => {
            return Err(Error::configuration(
                "fractional factorial requires options.fraction or options.resolution",
            ))
        }
    };
    if let Some(required) = options.resolution {
        if plan.resolution() < required {
            return Err(Error::configuration(format!(
                "2^({k}-{}) reaches resolution {}, below the requested {}",
                plan.generated(),
                roman(plan.resolution()),
                roman(required)
            )));
        }
    }
    Ok(plan)
}

/// Fractional factorial construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct FractionalFactorial;

impl DesignStrategy for FractionalFactorial {
    fn name(&self) -> &'static str {
        "Fractional factorial"
    }

    fn plan(&self, factors: &[Factor], options: &DesignOptions) -> Result<DesignPlan> {
        require_two_level(factors, self.name())?;
        let fraction = fraction_for(factors.len(), options)?;

        let mut points: Vec<DesignPoint> = fraction
            .signs()
            .into_iter()
            .map(|row| DesignPoint {
                settings: factors
                    .iter()
                    .zip(row)
                    .map(|(f, sign)| f.two_level_setting(sign))
                    .collect(),
                point_type: PointType::Factorial,
                block: None,
            })
            .collect();

        let centers = center_points(factors, options.center_points, self.name())?;
        let mut metadata = DesignMetadata {
            admissible_levels: if centers.is_empty() {
                vec![-1.0, 1.0]
            } else {
                vec![-1.0, 0.0, 1.0]
            },
            ..DesignMetadata::default()
        };
        points.extend(centers);
        fraction.describe(&mut metadata);

        Ok(DesignPlan { points, metadata })
    }
}

/// Render a mask as factor letters.
fn word_string(mask: u32) -> String {
    (0..32)
        .filter(|&j| (mask >> j) & 1 == 1)
        .map(factor_label)
        .collect()
}

/// Roman numeral for small resolutions.
pub(crate) fn roman(n: u32) -> String {
    const NUMERALS: [&str; 12] = [
        "0", "I", "II", "III", "IV", "V", "VI", "VII", "VIII", "IX", "X", "XI",
    ];
    NUMERALS
        .get(n as usize)
        .map_or_else(|| n.to_string(), |s| (*s).to_string())
}

fn defining_relation(base: usize, generators: &[u32]) -> Vec<u32> {
    let defining: Vec<u32> = generators
        .iter()
        .enumerate()
        .map(|(i, &g)| g | (1u32 << (base + i)))
        .collect();

    let mut words: Vec<u32> = (1u32..(1 << defining.len()))
        .map(|subset| {
            defining
                .iter()
                .enumerate()
                .filter(|(i, _)| (subset >> i) & 1 == 1)
                .fold(0u32, |acc, (_, &w)| acc ^ w)
        })
        .collect();
    words.sort_by(|a, b| a.count_ones().cmp(&b.count_ones()).then(a.cmp(b)));
    words
}

fn word_length_pattern(k: usize, words: &[u32]) -> Vec<usize> {
    let mut pattern = vec![0; k + 1];
    for w in words {
        pattern[w.count_ones() as usize] += 1;
    }
    pattern
}

fn exhaustive_search(base: usize, candidates: &[u32], p: usize) -> Vec<u32> {
    let k = base + p;
    let mut idx: Vec<usize> = (0..p).collect();
    let mut best: Option<(Vec<usize>, Vec<u32>)> = None;

    loop {
        let generators: Vec<u32> = idx.iter().map(|&i| candidates[i]).collect();
        let pattern = word_length_pattern(k, &defining_relation(base, &generators));
        if best.as_ref().map_or(true, |(b, _)| pattern < *b) {
            best = Some((pattern, generators));
        }

        // Advance to the next combination in lexicographic order.
        let mut pos = p;
        while pos > 0 && idx[pos - 1] == candidates.len() - p + pos - 1 {
            pos -= 1;
        }
        if pos == 0 {
            break;
        }
        idx[pos - 1] += 1;
        for j in pos..p {
            idx[j] = idx[j - 1] + 1;
        }
    }

    best.map(|(_, g)| g).unwrap_or_default()
}

fn greedy_search(base: usize, candidates: &[u32], p: usize) -> Vec<u32> {
    let mut chosen: Vec<u32> = Vec::with_capacity(p);
    for _ in 0..p {
        let k = base + chosen.len() + 1;
        let next = candidates
            .iter()
            .filter(|c| !chosen.contains(c))
            .map(|&c| {
                let mut trial = chosen.clone();
                trial.push(c);
                (word_length_pattern(k, &defining_relation(base, &trial)), c)
            })
            .min_by(|a, b| a.0.cmp(&b.0))
            .map(|(_, c)| c);
        match next {
            Some(c) => chosen.push(c),
            None => break,
        }
    }
    chosen
}

fn binomial(n: u64, k: u64) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut result: u64 = 1;
    for i in 0..k {
        result = match result.checked_mul(n - i) {
            Some(v) => v / (i + 1),
            None => return u64::MAX,
        };
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::{generate, DesignType};

    fn factors(k: usize) -> Vec<Factor> {
        (0..k)
            .map(|i| Factor::continuous(format!("F{i}"), -5.0, 5.0))
            .collect()
    }

    #[test]
    fn test_standard_resolutions() {
        assert_eq!(FractionPlan::best(3, 1).unwrap().resolution(), 3);
        assert_eq!(FractionPlan::best(4, 1).unwrap().resolution(), 4);
        assert_eq!(FractionPlan::best(5, 1).unwrap().resolution(), 5);
        assert_eq!(FractionPlan::best(5, 2).unwrap().resolution(), 3);
        assert_eq!(FractionPlan::best(6, 2).unwrap().resolution(), 4);
        assert_eq!(FractionPlan::best(7, 4).unwrap().resolution(), 3);
        assert_eq!(FractionPlan::best(8, 4).unwrap().resolution(), 4);
    }

    #[test]
    fn test_minimum_aberration_six_two() {
        // 2^(6-2) IV: the best design has three words of length 4.
        let plan = FractionPlan::best(6, 2).unwrap();
        let pattern = plan.word_length_pattern();
        assert_eq!(pattern[3], 0);
        assert_eq!(pattern[4], 3);
    }

    #[test]
    fn test_columns_balanced_and_orthogonal() {
        let plan = FractionPlan::best(7, 3).unwrap();
        let signs = plan.signs();
        assert_eq!(signs.len(), 16);
        for a in 0..7 {
            assert_eq!(signs.iter().map(|r| r[a]).sum::<f64>(), 0.0);
            for b in (a + 1)..7 {
                assert_eq!(signs.iter().map(|r| r[a] * r[b]).sum::<f64>(), 0.0);
            }
        }
    }

    #[test]
    fn test_alias_structure_half_fraction() {
        let plan = FractionPlan::best(4, 1).unwrap();
        assert_eq!(plan.defining_relation_strings(), vec!["ABCD".to_string()]);
        let chains = plan.alias_chains();
        let a = chains.iter().find(|c| c.effect == "A").unwrap();
        assert_eq!(a.aliases, vec!["BCD".to_string()]);
        let ab = chains.iter().find(|c| c.effect == "AB").unwrap();
        assert_eq!(ab.aliases, vec!["CD".to_string()]);
        // CD is already reported in the AB chain
        assert!(chains.iter().all(|c| c.effect != "CD"));
    }

    #[test]
    fn test_for_resolution_picks_fewest_runs() {
        let plan = FractionPlan::for_resolution(7, 4).unwrap();
        assert_eq!(plan.runs(), 16);
        assert!(plan.resolution() >= 4);
        assert!(FractionPlan::for_resolution(3, 4).is_err());
    }

    #[test]
    fn test_invalid_fractions() {
        assert!(FractionPlan::best(2, 1).is_err());
        assert!(FractionPlan::best(5, 0).is_err());
        assert!(FractionPlan::best(4, 3).is_err());
        // 3 base factors support only 4 generated factors
        assert!(FractionPlan::best(8, 5).is_err());
        assert!(FractionPlan::best(26, 10).is_err());
    }

    #[test]
    fn test_greedy_search_large_design() {
        let plan = FractionPlan::best(15, 8).unwrap();
        assert_eq!(plan.runs(), 128);
        assert!(plan.resolution() >= 4);
    }

    #[test]
    fn test_generate_records_metadata() {
        let options = DesignOptions::default().with_fraction(1).with_center_points(2);
        let design = generate(DesignType::Fractional, &factors(5), &options).unwrap();
        assert_eq!(design.len(), 16 + 2);
        assert_eq!(design.metadata.resolution, Some(5));
        assert_eq!(design.metadata.generators, vec!["E = ABCD".to_string()]);
        assert!(!design.metadata.alias_structure.is_empty());
        assert_eq!(design.metadata.factor_labels.len(), 5);
    }

    #[test]
    fn test_requested_resolution_enforced() {
        let options = DesignOptions::default().with_fraction(4).with_resolution(4);
        let err = generate(DesignType::Fractional, &factors(7), &options).unwrap_err();
        assert!(err.to_string().contains("resolution"));

        let options = DesignOptions::default();
        assert!(generate(DesignType::Fractional, &factors(5), &options).is_err());
    }

    #[test]
    fn test_multi_level_categorical_rejected() {
        let mut f = factors(3);
        f.push(Factor::categorical("C", ["x", "y", "z"]));
        let options = DesignOptions::default().with_fraction(1);
        let err = generate(DesignType::Fractional, &f, &options).unwrap_err();
        assert!(err.to_string().contains("two-level"));
    }
}
