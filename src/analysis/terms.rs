//! Model terms and their expansion into model-matrix columns.
//!
//! A term is a product of factors, written with `*` between factors and `^`
//! for powers: `Temperature`, `Temperature*Pressure`, `Temperature^2`. The
//! intercept is the empty product. Continuous factors contribute their coded
//! value; a categorical factor contributes one indicator column per
//! non-reference category, so a term containing categorical factors expands
//! into several columns.

use std::fmt::Write as _;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::factor::{Factor, Setting};

/// Name used for the intercept term.
pub const INTERCEPT: &str = "Intercept";

/// A product of factors, stored as sorted factor indices with repetition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Term {
    factors: Vec<usize>,
}

impl Term {
    /// Build a term from factor indices, in any order.
    #[must_use]
    pub fn new(mut factors: Vec<usize>) -> Self {
        factors.sort_unstable();
        Self { factors }
    }

    /// The intercept.
    #[must_use]
    pub fn intercept() -> Self {
        Self { factors: Vec::new() }
    }

    /// Main effect of factor `i`.
    #[must_use]
    pub fn main(i: usize) -> Self {
        Self { factors: vec![i] }
    }

    /// Two-factor interaction.
    #[must_use]
    pub fn interaction(i: usize, j: usize) -> Self {
        Self::new(vec![i, j])
    }

    /// Pure quadratic of factor `i`.
    #[must_use]
    pub fn quadratic(i: usize) -> Self {
        Self { factors: vec![i, i] }
    }

    /// Factor indices with repetition, sorted.
    #[must_use]
    pub fn factors(&self) -> &[usize] {
        &self.factors
    }

    /// Polynomial degree; 0 for the intercept.
    #[must_use]
    pub fn degree(&self) -> usize {
        self.factors.len()
    }

    /// Whether this is the intercept.
    #[must_use]
    pub fn is_intercept(&self) -> bool {
        self.factors.is_empty()
    }

    /// Distinct factors and their powers.
    #[must_use]
    pub fn powers(&self) -> Vec<(usize, u32)> {
        let mut out: Vec<(usize, u32)> = Vec::new();
        for &f in &self.factors {
            match out.last_mut() {
                Some((last, power)) if *last == f => *power += 1,
                _ => out.push((f, 1)),
            }
        }
        out
    }

    /// Main-effect terms this term is built from.
    #[must_use]
    pub fn constituents(&self) -> Vec<Term> {
        if self.degree() <= 1 {
            return Vec::new();
        }
        self.powers().into_iter().map(|(f, _)| Self::main(f)).collect()
    }

    /// Parse `A*B`, `A^2` or `Intercept` against a factor list.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown factor names, malformed
    /// powers or powers above 1 on categorical factors.
    pub fn parse(text: &str, factors: &[Factor]) -> Result<Self> {
        let text = text.trim();
        if text.eq_ignore_ascii_case(INTERCEPT) || text == "1" {
            return Ok(Self::intercept());
        }

        let mut indices = Vec::new();
        for part in text.split('*') {
            let part = part.trim();
            let (name, power) = match part.split_once('^') {
                Some((name, power)) => {
                    let power: u32 = power.trim().parse().map_err(|_| {
                        Error::configuration(format!("invalid power in model term '{text}'"))
                    })?;
                    (name.trim(), power)
                }
                None => (part, 1),
            };
            if power == 0 {
                return Err(Error::configuration(format!(
                    "invalid power in model term '{text}'"
                )));
            }
            let index = factors.iter().position(|f| f.name == name).ok_or_else(|| {
                Error::configuration(format!(
                    "model term '{text}' references unknown factor '{name}'"
                ))
            })?;
            indices.extend(std::iter::repeat(index).take(power as usize));
        }

        let term = Self::new(indices);
        term.validate(factors)?;
        Ok(term)
    }

    /// Check the term against a factor list.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for out-of-range indices or a power above
    /// 1 on a categorical factor.
    pub fn validate(&self, factors: &[Factor]) -> Result<()> {
        for (f, power) in self.powers() {
            let factor = factors.get(f).ok_or_else(|| {
                Error::configuration(format!("model term references factor index {f}"))
            })?;
            if power > 1 && !factor.is_continuous() {
                return Err(Error::configuration(format!(
                    "quadratic term '{}' is not defined for categorical factor '{}'",
                    self.name(factors),
                    factor.name
                )));
            }
        }
        Ok(())
    }

    /// Display name, e.g. `Temperature*Pressure` or `Temperature^2`.
    #[must_use]
    pub fn name(&self, factors: &[Factor]) -> String {
        if self.is_intercept() {
            return INTERCEPT.to_string();
        }
        let mut out = String::new();
        for (i, (f, power)) in self.powers().into_iter().enumerate() {
            if i > 0 {
                out.push('*');
            }
            out.push_str(factors.get(f).map_or("?", |factor| factor.name.as_str()));
            if power > 1 {
                let _ = write!(out, "^{power}");
            }
        }
        out
    }

    /// Number of model-matrix columns.
    #[must_use]
    pub fn column_count(&self, factors: &[Factor]) -> usize {
        self.powers()
            .into_iter()
            .filter(|(f, _)| !factors[*f].is_continuous())
            .map(|(f, _)| factors[f].column_count())
            .product()
    }

    /// Column labels; categorical factors show the indicated category.
    #[must_use]
    pub fn column_labels(&self, factors: &[Factor]) -> Vec<String> {
        if self.is_intercept() {
            return vec![INTERCEPT.to_string()];
        }
        (0..self.column_count(factors))
            .map(|column| {
                let digits = self.categorical_digits(factors, column);
                let mut label = String::new();
                for (i, (f, power)) in self.powers().into_iter().enumerate() {
                    if i > 0 {
                        label.push('*');
                    }
                    let factor = &factors[f];
                    label.push_str(&factor.name);
                    if factor.is_continuous() {
                        if power > 1 {
                            let _ = write!(label, "^{power}");
                        }
                    } else if let Some(category) = digits
                        .iter()
                        .find(|(g, _)| *g == f)
                        .and_then(|(_, d)| factor.categories().get(d + 1))
                    {
                        let _ = write!(label, "[{category}]");
                    }
                }
                label
            })
            .collect()
    }

    /// Column values at one run; `settings` is indexed like `factors`.
    #[must_use]
    pub fn columns(&self, factors: &[Factor], settings: &[Setting]) -> Vec<f64> {
        (0..self.column_count(factors))
            .map(|column| {
                let digits = self.categorical_digits(factors, column);
                self.powers()
                    .into_iter()
                    .map(|(f, power)| match &settings[f] {
                        Setting::Continuous { coded, .. } => coded.powi(power as i32),
                        Setting::Categorical { index, .. } => {
                            let d = digits
                                .iter()
                                .find(|(g, _)| *g == f)
                                .map_or(usize::MAX, |(_, d)| *d);
                            if *index == d + 1 {
                                1.0
                            } else {
                                0.0
                            }
                        }
                    })
                    .product()
            })
            .collect()
    }

    /// Indicator column chosen for each categorical factor of the term at a
    /// given column index, first categorical factor varying fastest.
    pub(crate) fn categorical_digits(
        &self,
        factors: &[Factor],
        mut column: usize,
    ) -> Vec<(usize, usize)> {
        self.powers()
            .into_iter()
            .filter(|(f, _)| !factors[*f].is_continuous())
            .map(|(f, _)| {
                let radix = factors[f].column_count();
                let digit = column % radix;
                column /= radix;
                (f, digit)
            })
            .collect()
    }
}

/// Terms for a main-effects model over `k` factors, intercept first.
#[must_use]
pub fn main_effect_terms(k: usize) -> Vec<Term> {
    std::iter::once(Term::intercept())
        .chain((0..k).map(Term::main))
        .collect()
}

/// Main effects plus every two-factor interaction.
#[must_use]
pub fn interaction_terms(k: usize) -> Vec<Term> {
    let mut terms = main_effect_terms(k);
    for i in 0..k {
        for j in (i + 1)..k {
            terms.push(Term::interaction(i, j));
        }
    }
    terms
}

/// Full quadratic model: interactions plus pure quadratics of continuous factors.
#[must_use]
pub fn response_surface_terms(factors: &[Factor]) -> Vec<Term> {
    let mut terms = interaction_terms(factors.len());
    terms.extend(
        (0..factors.len())
            .filter(|&i| factors[i].is_continuous())
            .map(Term::quadratic),
    );
    terms
}

/// Add missing constituent main effects, returning the names of added terms.
///
/// Terms are then ordered by degree, keeping the given order within a degree,
/// so lower-order terms are admitted into a fit first.
pub fn enforce_hierarchy(terms: &mut Vec<Term>, factors: &[Factor]) -> Vec<String> {
    let mut added = Vec::new();
    let mut i = 0;
    while i < terms.len() {
        for main in terms[i].constituents() {
            if !terms.contains(&main) {
                added.push(main.name(factors));
                terms.push(main);
            }
        }
        i += 1;
    }
    added
}

/// Put the intercept first, remove duplicates and order terms by degree.
pub fn normalize(terms: &mut Vec<Term>) {
    let mut seen = std::collections::HashSet::new();
    terms.retain(|t| !t.is_intercept() && seen.insert(t.clone()));
    terms.sort_by_key(Term::degree);
    terms.insert(0, Term::intercept());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factors() -> Vec<Factor> {
        vec![
            Factor::continuous("Temperature", 60.0, 80.0),
            Factor::continuous("Pressure", 100.0, 200.0),
            Factor::categorical("Solvent", ["water", "ethanol", "acetone"]),
        ]
    }

    #[test]
    fn test_parse_and_name() {
        let f = factors();
        let t = Term::parse("Pressure * Temperature", &f).unwrap();
        assert_eq!(t.factors(), &[0, 1]);
        assert_eq!(t.name(&f), "Temperature*Pressure");

        let q = Term::parse("Temperature^2", &f).unwrap();
        assert_eq!(q, Term::quadratic(0));
        assert_eq!(q.name(&f), "Temperature^2");

        assert!(Term::parse("Intercept", &f).unwrap().is_intercept());
        assert!(Term::parse("Humidity", &f).unwrap_err().is_configuration());
        assert!(Term::parse("Temperature^x", &f).is_err());
    }

    #[test]
    fn test_quadratic_categorical_rejected() {
        let err = Term::parse("Solvent^2", &factors()).unwrap_err();
        assert!(err.to_string().contains("categorical factor 'Solvent'"));
    }

    #[test]
    fn test_categorical_columns() {
        let f = factors();
        let term = Term::parse("Temperature*Solvent", &f).unwrap();
        assert_eq!(term.column_count(&f), 2);
        assert_eq!(
            term.column_labels(&f),
            vec!["Temperature*Solvent[ethanol]", "Temperature*Solvent[acetone]"]
        );

        let settings = vec![
            f[0].coded_setting(0.5),
            f[1].coded_setting(-1.0),
            f[2].category_setting(2),
        ];
        assert_eq!(term.columns(&f, &settings), vec![0.0, 0.5]);
        assert_eq!(Term::quadratic(0).columns(&f, &settings), vec![0.25]);
        assert_eq!(Term::intercept().columns(&f, &settings), vec![1.0]);
    }

    #[test]
    fn test_hierarchy_adds_main_effects() {
        let f = factors();
        let mut terms = vec![Term::interaction(0, 1), Term::quadratic(0)];
        let added = enforce_hierarchy(&mut terms, &f);
        assert_eq!(added, vec!["Temperature", "Pressure"]);
        normalize(&mut terms);
        assert_eq!(
            terms,
            vec![
                Term::intercept(),
                Term::main(0),
                Term::main(1),
                Term::interaction(0, 1),
                Term::quadratic(0),
            ]
        );
    }

    #[test]
    fn test_default_term_sets() {
        assert_eq!(main_effect_terms(3).len(), 4);
        assert_eq!(interaction_terms(3).len(), 7);
        // quadratics only for the two continuous factors
        assert_eq!(response_surface_terms(&factors()).len(), 9);
    }
}
