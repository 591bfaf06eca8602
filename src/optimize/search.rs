//! Bounded Nelder-Mead local search.
//!
//! Wraps `argmin`'s Nelder-Mead solver to maximize an objective over the box
//! `[-1, 1]^n`. The solver works on the negated objective; every trial point is
//! projected onto the box before evaluation, and the best projected point seen
//! is kept so an interrupted search still reports where it got to.

use std::cell::{Cell, RefCell};

use argmin::core::{CostFunction, Error as ArgminError, Executor, State, TerminationReason};
use argmin::solver::neldermead::NelderMead;

use crate::context::{Interrupt, RunContext};

/// Outcome of one local search.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SearchResult {
    /// Best point found, inside the box.
    pub point: Vec<f64>,
    /// Objective at `point`; NaN when nothing was evaluated.
    pub value: f64,
    /// Whether the simplex collapsed before the iteration cap.
    pub converged: bool,
    /// Set when the search stopped early.
    pub interrupted: Option<Interrupt>,
}

impl SearchResult {
    /// Converged to a finite value.
    pub(crate) fn is_success(&self) -> bool {
        self.converged && self.value.is_finite()
    }
}

/// Simplex search settings.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SimplexSearch {
    pub max_iterations: usize,
    /// Initial edge length of the simplex.
    pub step: f64,
    /// Collapse threshold on the standard deviation of vertex costs.
    pub sd_tolerance: f64,
}

impl Default for SimplexSearch {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            step: 0.25,
            sd_tolerance: 1e-12,
        }
    }
}

fn project(point: &[f64]) -> Vec<f64> {
    point.iter().map(|x| x.clamp(-1.0, 1.0)).collect()
}

/// Negated objective on the projected point, tracking the best evaluation.
struct BoxedCost<'a, F> {
    objective: &'a F,
    ctx: &'a RunContext,
    best: &'a RefCell<Option<(Vec<f64>, f64)>>,
    interrupted: &'a Cell<Option<Interrupt>>,
}

impl<F> CostFunction for BoxedCost<'_, F>
where
    F: Fn(&[f64]) -> f64,
{
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, ArgminError> {
        if let Some(reason) = self.ctx.interrupted() {
            self.interrupted.set(Some(reason));
            return Err(ArgminError::msg(format!("search stopped: {reason:?}")));
        }
        let point = project(param);
        let value = (self.objective)(&point);
        let cost = if value.is_nan() { f64::INFINITY } else { -value };

        let mut best = self.best.borrow_mut();
        if best.as_ref().map_or(true, |(_, c)| cost < *c) {
            *best = Some((point, cost));
        }
        Ok(cost)
    }
}

impl SimplexSearch {
    /// Maximize `objective` from `start`, checking `ctx` before every evaluation.
    pub(crate) fn maximize<F>(&self, objective: F, start: &[f64], ctx: &RunContext) -> SearchResult
    where
        F: Fn(&[f64]) -> f64,
    {
        let origin = project(start);
        if let Some(reason) = ctx.interrupted() {
            return SearchResult {
                point: origin,
                value: f64::NAN,
                converged: false,
                interrupted: Some(reason),
            };
        }
        if origin.is_empty() {
            let value = objective(&origin);
            return SearchResult {
                point: origin,
                value,
                converged: true,
                interrupted: None,
            };
        }

        // Start plus one step along each axis, stepping inward on the upper bound.
        let mut simplex = vec![origin.clone()];
        for i in 0..origin.len() {
            let mut vertex = origin.clone();
            let inward = vertex[i] + self.step > 1.0;
            vertex[i] += if inward { -self.step } else { self.step };
            simplex.push(vertex);
        }

        let best = RefCell::new(None);
        let interrupted = Cell::new(None);
        let cost = BoxedCost {
            objective: &objective,
            ctx,
            best: &best,
            interrupted: &interrupted,
        };

        let converged = NelderMead::new(simplex)
            .with_sd_tolerance(self.sd_tolerance)
            .and_then(|solver| {
                Executor::new(cost, solver)
                    .configure(|state| state.max_iters(self.max_iterations as u64))
                    .run()
            })
            .map(|result| {
                matches!(
                    result.state().get_termination_reason(),
                    Some(TerminationReason::SolverConverged)
                )
            })
            .unwrap_or(false);

        let interrupted = interrupted.get();
        let (point, best) = best.into_inner().unwrap_or((origin, f64::NAN));
        SearchResult {
            point,
            value: -best,
            converged: converged && interrupted.is_none(),
            interrupted,
        }
    }
}
