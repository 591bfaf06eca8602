//! Fitted equations in coded and natural units.
//!
//! The natural-unit equation is obtained by substituting
//! `coded = (x − center) / half_range` into every coded column and collecting
//! like monomials.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use super::terms::Term;
use super::types::Equation;
use crate::factor::Factor;

/// Variable of a natural-unit monomial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Var {
    /// Natural value of a continuous factor.
    Natural(usize),
    /// Indicator of a category (factor, category index).
    Indicator(usize, usize),
}

/// Variable exponents; empty is the constant.
type Monomial = BTreeMap<Var, u32>;

/// Sparse polynomial.
#[derive(Debug, Clone, Default)]
struct Polynomial(BTreeMap<Monomial, f64>);

impl Polynomial {
    fn constant(c: f64) -> Self {
        Self(BTreeMap::from([(Monomial::new(), c)]))
    }

    fn monomial(var: Var, coefficient: f64) -> Self {
        Self(BTreeMap::from([(BTreeMap::from([(var, 1)]), coefficient)]))
    }

    fn add(&mut self, other: &Self, scale: f64) {
        for (m, c) in &other.0 {
            *self.0.entry(m.clone()).or_insert(0.0) += scale * c;
        }
    }

    fn mul(&self, other: &Self) -> Self {
        let mut out = BTreeMap::new();
        for (ma, ca) in &self.0 {
            for (mb, cb) in &other.0 {
                let mut m = ma.clone();
                for (var, exp) in mb {
                    *m.entry(*var).or_insert(0) += exp;
                }
                *out.entry(m).or_insert(0.0) += ca * cb;
            }
        }
        Self(out)
    }
}

/// Build both equations for `response` from estimated terms and coefficients
/// in column order.
pub(crate) fn build(
    response: &str,
    factors: &[Factor],
    terms: &[Term],
    coefficients: &[f64],
) -> Equation {
    let mut coded = format!("{response} =");
    let mut natural = Polynomial::default();
    let mut estimates = coefficients.iter();

    for (position, term) in terms.iter().enumerate() {
        let labels = term.column_labels(factors);
        for (column, label) in labels.iter().enumerate() {
            let Some(&beta) = estimates.next() else {
                break;
            };
            if position == 0 && term.is_intercept() {
                let _ = write!(coded, " {}", format_number(beta));
            } else {
                push_signed(&mut coded, beta, &label.replace('*', " * "));
            }
            natural.add(&natural_column(term, factors, column), beta);
        }
    }

    Equation {
        coded,
        natural: render_natural(response, factors, &natural),
    }
}

/// One coded column expressed in natural units.
fn natural_column(term: &Term, factors: &[Factor], column: usize) -> Polynomial {
    let digits = term.categorical_digits(factors, column);
    let mut poly = Polynomial::constant(1.0);
    for (f, power) in term.powers() {
        let factor = &factors[f];
        if factor.is_continuous() {
            let scale = 1.0 / factor.half_range();
            let mut coded = Polynomial::monomial(Var::Natural(f), scale);
            coded.add(&Polynomial::constant(-factor.center() * scale), 1.0);
            for _ in 0..power {
                poly = poly.mul(&coded);
            }
        } else if let Some((_, d)) = digits.iter().find(|(g, _)| *g == f) {
            poly = poly.mul(&Polynomial::monomial(Var::Indicator(f, d + 1), 1.0));
        }
    }
    poly
}

fn render_natural(response: &str, factors: &[Factor], poly: &Polynomial) -> String {
    let scale = poly.0.values().fold(0.0_f64, |m, c| m.max(c.abs()));
    let mut monomials: Vec<(&Monomial, f64)> = poly
        .0
        .iter()
        .map(|(m, c)| (m, *c))
        .filter(|(m, c)| m.is_empty() || c.abs() > 1e-12 * scale)
        .collect();
    monomials.sort_by_key(|(m, _)| (m.values().sum::<u32>(), (*m).clone()));

    let mut out = format!("{response} =");
    for (i, (monomial, c)) in monomials.into_iter().enumerate() {
        if monomial.is_empty() {
            let _ = write!(out, " {}", format_number(c));
            continue;
        }
        let label = monomial
            .iter()
            .map(|(var, exp)| {
                let base = match *var {
                    Var::Natural(f) => factors[f].name.clone(),
                    Var::Indicator(f, c) => {
                        format!("{}[{}]", factors[f].name, factors[f].categories()[c])
                    }
                };
                if *exp > 1 {
                    format!("{base}^{exp}")
                } else {
                    base
                }
            })
            .collect::<Vec<_>>()
            .join(" * ");
        if i == 0 {
            let _ = write!(out, " {} * {label}", format_number(c));
        } else {
            push_signed(&mut out, c, &label);
        }
    }
    out
}

fn push_signed(out: &mut String, value: f64, label: &str) {
    let sign = if value < 0.0 { '-' } else { '+' };
    let _ = write!(out, " {sign} {} * {label}", format_number(value.abs()));
}

/// Six significant digits without trailing zeros.
pub(crate) fn format_number(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{value}");
    }
    let magnitude = value.abs().log10().floor() as i32;
    let decimals = (5 - magnitude).clamp(0, 12) as usize;
    let text = format!("{value:.decimals$}");
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}
