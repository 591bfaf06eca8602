//! Multi-response optimization by desirability.
//!
//! Every response goal turns a model prediction into a desirability in
//! `[0, 1]`; the optimizer searches the factor space for settings maximizing
//! the overall desirability `D`.
//!
//! ## Search
//!
//! For each combination of categorical levels, bounded Nelder-Mead searches
//! run over the coded box `[-1, 1]` of the continuous factors: one from the
//! center, the rest from seeded random points. Where `D = 0` the searches
//! climb the negative weighted shortfall from the goal bounds instead, so they
//! still move toward feasibility. Starts run in parallel with the `parallel`
//! feature.
//!
//! A start that does not converge (or meets a non-finite objective) is retried
//! once from a perturbed point; a second failure is recorded on the result as a
//! numerical error for that start only.
//!
//! ## Example
//!
//! ```
//! use doekit::analysis::{analyze, AnalysisRequest};
//! use doekit::design::{generate, DesignOptions, DesignType};
//! use doekit::optimize::{optimize, OptimizerConfig, ResponseGoal};
//! use doekit::Factor;
//!
//! let factors = vec![
//!     Factor::continuous("Temperature", 60.0, 80.0),
//!     Factor::continuous("Pressure", 100.0, 200.0),
//! ];
//! let options = DesignOptions::default().with_center_points(1).with_randomize(false);
//! let design = generate(DesignType::Factorial, &factors, &options).unwrap();
//! let runs: Vec<_> = design
//!     .experiment_runs()
//!     .into_iter()
//!     .zip([62.0, 70.0, 66.0, 81.0, 70.5])
//!     .map(|(run, y)| run.with_response("Yield", y))
//!     .collect();
//! let request = AnalysisRequest::new(DesignType::Factorial, ["Yield"]);
//! let models = analyze(&runs, &factors, &request).unwrap();
//!
//! let goals = [ResponseGoal::maximize("Yield", 70.0, 100.0)];
//! let result = optimize(&models, &factors, &goals, &OptimizerConfig::default()).unwrap();
//! let best = result.best().unwrap();
//! assert!(result.feasible);
//! assert!(best.overall_desirability > 0.0);
//! ```

mod desirability;
mod search;
mod types;

pub use desirability::{overall_desirability, Goal, ResponseGoal};
pub use types::{
    Candidate, OptimizationMethod, OptimizationResult, OptimizerConfig, PredictedResponse,
    StartFailure,
};

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::analysis::{FittedModel, Prediction};
use crate::context::{Interrupt, RunContext, Stage};
use crate::design::level_combinations;
use crate::error::{Error, Result};
use crate::factor::{validate_factors, Factor, Setting};
use search::{SearchResult, SimplexSearch};

/// Coded distance below which two candidates count as the same solution.
const DUPLICATE_TOLERANCE: f64 = 1e-3;

/// Half-width of the uniform perturbation applied before a retry.
const RETRY_PERTURBATION: f64 = 0.2;

/// Find factor settings maximizing overall desirability.
///
/// # Errors
///
/// Returns a configuration error for an empty or invalid goal list, goals
/// naming responses without a model, and models using factors that are not in
/// `factors`. Infeasibility and failed starts are reported on the result.
pub fn optimize(
    models: &BTreeMap<String, FittedModel>,
    factors: &[Factor],
    goals: &[ResponseGoal],
    config: &OptimizerConfig,
) -> Result<OptimizationResult> {
    optimize_with_context(models, factors, goals, config, &RunContext::default())
}

/// Optimize under a context: cancellation and deadline are checked between
/// starts and between iterations, and a progress event is emitted per start.
///
/// # Errors
///
/// See [`optimize`].
pub fn optimize_with_context(
    models: &BTreeMap<String, FittedModel>,
    factors: &[Factor],
    goals: &[ResponseGoal],
    config: &OptimizerConfig,
    ctx: &RunContext,
) -> Result<OptimizationResult> {
    validate_factors(factors)?;
    config.validate()?;
    match config.method {
        OptimizationMethod::Desirability => {}
    }
    let problem = Problem::new(models, factors, goals)?;
    let ctx = ctx.bounded_by(config.timeout);

    let jobs = problem.jobs(config);
    let total = jobs.len();
    debug!(
        starts = total,
        combinations = problem.combinations.len(),
        dimensions = problem.continuous.len(),
        "optimization started"
    );

    let search = SimplexSearch {
        max_iterations: config.max_iterations,
        ..SimplexSearch::default()
    };
    let done = AtomicUsize::new(0);
    let run = |job: &Job| {
        let outcome = problem.run_job(job, &search, &ctx);
        if !matches!(outcome, JobOutcome::Skipped(_)) {
            let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
            ctx.emit_progress(
                Stage::Optimization,
                100.0 * finished as f64 / total as f64,
                format!("start {finished} of {total} complete"),
            );
        }
        outcome
    };

    #[cfg(feature = "parallel")]
    let outcomes: Vec<JobOutcome> = jobs.par_iter().map(run).collect();
    #[cfg(not(feature = "parallel"))]
    let outcomes: Vec<JobOutcome> = jobs.iter().map(run).collect();

    let mut result = OptimizationResult {
        starts_planned: total,
        ..OptimizationResult::default()
    };
    let mut found = Vec::new();
    for outcome in outcomes {
        match outcome {
            JobOutcome::Found {
                combo,
                point,
                interrupted,
            } => {
                if interrupted.is_none() {
                    result.starts_completed += 1;
                }
                result.flag(interrupted);
                found.push(problem.candidate(&point, combo));
            }
            JobOutcome::Failed(failure) => {
                result.starts_completed += 1;
                warn!(start = failure.start, error = %failure.error, "start failed after retry");
                result.failures.push(failure);
            }
            JobOutcome::Skipped(reason) => result.flag(Some(reason)),
        }
    }

    result.candidates = rank(found, config.max_solutions);
    result.feasible = result.best().is_some_and(|c| c.feasible);
    if !result.feasible {
        result.diagnostics = problem.diagnose(&result.candidates);
    }

    info!(
        candidates = result.candidates.len(),
        feasible = result.feasible,
        best = result.best().map_or(0.0, |c| c.overall_desirability),
        failures = result.failures.len(),
        cancelled = result.cancelled,
        truncated = result.truncated,
        "optimization complete"
    );
    Ok(result)
}

impl OptimizationResult {
    fn flag(&mut self, interrupt: Option<Interrupt>) {
        match interrupt {
            Some(Interrupt::Cancelled) => self.cancelled = true,
            Some(Interrupt::TimedOut) => self.truncated = true,
            None => {}
        }
    }
}

/// How a model factor reads an optimization factor.
enum Link {
    Continuous { source: usize },
    /// `categories[i]` is the model category index of optimizer category `i`.
    Categorical { source: usize, categories: Vec<usize> },
}

/// A goal bound to its model.
struct Binding<'a> {
    goal: &'a ResponseGoal,
    model: &'a FittedModel,
    links: Vec<Link>,
}

/// Values of every goal at one point.
struct Evaluation {
    predictions: Vec<Prediction>,
    desirabilities: Vec<f64>,
    overall: f64,
    shortfall: f64,
}

impl Evaluation {
    /// Search objective: D when positive, otherwise the negative shortfall.
    fn objective(&self) -> f64 {
        if self.overall.is_nan() {
            f64::NAN
        } else if self.overall > 0.0 {
            self.overall
        } else {
            -self.shortfall
        }
    }
}

struct Problem<'a> {
    factors: &'a [Factor],
    continuous: Vec<usize>,
    categorical: Vec<usize>,
    /// Category index per categorical factor, for every combination.
    combinations: Vec<Vec<usize>>,
    bindings: Vec<Binding<'a>>,
    weights: Vec<f64>,
}

struct Job {
    index: usize,
    combo: usize,
    start: Vec<f64>,
    retry_seed: u64,
}

enum JobOutcome {
    Found {
        combo: usize,
        point: Vec<f64>,
        interrupted: Option<Interrupt>,
    },
    Failed(StartFailure),
    Skipped(Interrupt),
}

impl<'a> Problem<'a> {
    fn new(
        models: &'a BTreeMap<String, FittedModel>,
        factors: &'a [Factor],
        goals: &'a [ResponseGoal],
    ) -> Result<Self> {
        if goals.is_empty() {
            return Err(Error::configuration("at least one response goal is required"));
        }
        let mut seen = HashSet::new();
        let mut bindings = Vec::with_capacity(goals.len());
        for goal in goals {
            goal.validate()?;
            if !seen.insert(goal.name.as_str()) {
                return Err(Error::configuration(format!(
                    "response '{}' has more than one goal",
                    goal.name
                )));
            }
            let model = models.get(&goal.name).ok_or_else(|| {
                Error::configuration(format!("goal references unknown response '{}'", goal.name))
            })?;
            let links = model
                .factors
                .iter()
                .map(|mf| link(mf, factors, &goal.name))
                .collect::<Result<Vec<_>>>()?;
            bindings.push(Binding { goal, model, links });
        }

        let continuous = crate::design::continuous_indices(factors);
        let categorical = crate::design::categorical_indices(factors);
        let radices: Vec<usize> = categorical
            .iter()
            .map(|&i| factors[i].categories().len())
            .collect();

        Ok(Self {
            factors,
            continuous,
            categorical,
            combinations: level_combinations(&radices),
            weights: goals.iter().map(|g| g.weight).collect(),
            bindings,
        })
    }

    /// Starting points: the center, then seeded uniform points, per combination.
    fn jobs(&self, config: &OptimizerConfig) -> Vec<Job> {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let n = self.continuous.len();
        let per_combination = if n == 0 { 1 } else { config.starts };

        let mut jobs = Vec::with_capacity(self.combinations.len() * per_combination);
        for combo in 0..self.combinations.len() {
            for s in 0..per_combination {
                let start = if s == 0 {
                    vec![0.0; n]
                } else {
                    (0..n).map(|_| rng.gen_range(-1.0..=1.0)).collect()
                };
                jobs.push(Job {
                    index: jobs.len(),
                    combo,
                    start,
                    retry_seed: rng.gen(),
                });
            }
        }
        jobs
    }

    /// Optimizer-coded settings of every factor.
    fn settings(&self, coded: &[f64], combo: usize) -> Vec<Setting> {
        let mut settings: Vec<Option<Setting>> = vec![None; self.factors.len()];
        for (&i, &c) in self.continuous.iter().zip(coded) {
            settings[i] = Some(self.factors[i].coded_setting(c));
        }
        for (&i, &level) in self.categorical.iter().zip(&self.combinations[combo]) {
            settings[i] = Some(self.factors[i].category_setting(level));
        }
        settings
            .into_iter()
            .zip(self.factors)
            .map(|(s, f)| s.unwrap_or_else(|| f.coded_setting(0.0)))
            .collect()
    }

    fn evaluate(&self, settings: &[Setting]) -> Evaluation {
        let mut predictions = Vec::with_capacity(self.bindings.len());
        let mut desirabilities = Vec::with_capacity(self.bindings.len());
        let mut shortfall = 0.0;
        for binding in &self.bindings {
            let model_settings: Vec<Setting> = binding
                .model
                .factors
                .iter()
                .zip(&binding.links)
                .map(|(mf, link)| match link {
                    Link::Continuous { source } => match &settings[*source] {
                        Setting::Continuous { natural, .. } => {
                            mf.coded_setting(mf.to_coded(*natural))
                        }
                        Setting::Categorical { .. } => mf.coded_setting(f64::NAN),
                    },
                    Link::Categorical { source, categories } => {
                        let index = settings[*source].category().unwrap_or(0);
                        mf.category_setting(categories[index])
                    }
                })
                .collect();
            let prediction = binding.model.predict_settings(&model_settings);
            desirabilities.push(binding.goal.desirability(prediction.value));
            shortfall += binding.goal.weight * binding.goal.shortfall(prediction.value);
            predictions.push(prediction);
        }
        Evaluation {
            overall: overall_desirability(&desirabilities, &self.weights),
            predictions,
            desirabilities,
            shortfall,
        }
    }

    fn objective(&self, coded: &[f64], combo: usize) -> f64 {
        self.evaluate(&self.settings(coded, combo)).objective()
    }

    fn run_job(&self, job: &Job, search: &SimplexSearch, ctx: &RunContext) -> JobOutcome {
        if let Some(reason) = ctx.interrupted() {
            return JobOutcome::Skipped(reason);
        }
        let objective = |x: &[f64]| self.objective(x, job.combo);

        let first = search.maximize(objective, &job.start, ctx);
        if let Some(outcome) = Self::settle(job, first) {
            return outcome;
        }

        let mut rng = StdRng::seed_from_u64(job.retry_seed);
        let perturbed: Vec<f64> = job
            .start
            .iter()
            .map(|x| (x + rng.gen_range(-RETRY_PERTURBATION..=RETRY_PERTURBATION)).clamp(-1.0, 1.0))
            .collect();
        debug!(start = job.index, "retrying start from a perturbed point");

        let second = search.maximize(objective, &perturbed, ctx);
        let message = if second.value.is_finite() {
            format!(
                "start {} did not converge within {} iterations after one retry",
                job.index, search.max_iterations
            )
        } else {
            format!("start {} produced a non-finite objective after one retry", job.index)
        };
        Self::settle(job, second).unwrap_or_else(|| {
            JobOutcome::Failed(StartFailure {
                start: job.index,
                error: Error::numerical(message),
            })
        })
    }

    /// Outcome of a search, or `None` when it should be retried.
    fn settle(job: &Job, result: SearchResult) -> Option<JobOutcome> {
        match result.interrupted {
            Some(reason) if result.value.is_finite() => Some(JobOutcome::Found {
                combo: job.combo,
                point: result.point,
                interrupted: Some(reason),
            }),
            Some(reason) => Some(JobOutcome::Skipped(reason)),
            None if result.is_success() => Some(JobOutcome::Found {
                combo: job.combo,
                point: result.point,
                interrupted: None,
            }),
            None => None,
        }
    }

    fn candidate(&self, coded: &[f64], combo: usize) -> (Candidate, usize, f64) {
        let settings = self.settings(coded, combo);
        let evaluation = self.evaluate(&settings);
        let objective = evaluation.objective();
        let candidate = Candidate {
            factor_settings: self
                .factors
                .iter()
                .zip(&settings)
                .map(|(f, s)| (f.name.clone(), s.value()))
                .collect(),
            coded: coded.to_vec(),
            predicted_responses: self
                .bindings
                .iter()
                .zip(&evaluation.predictions)
                .map(|(b, p)| PredictedResponse {
                    name: b.goal.name.clone(),
                    value: p.value,
                    interval: p.interval,
                })
                .collect(),
            feasible: evaluation.overall > 0.0,
            overall_desirability: evaluation.overall,
            desirabilities: evaluation.desirabilities,
        };
        (candidate, combo, objective)
    }

    /// Goals no candidate satisfies, with the closest prediction for each.
    fn diagnose(&self, candidates: &[Candidate]) -> Vec<String> {
        if candidates.is_empty() {
            return vec!["no start completed".to_string()];
        }
        let mut diagnostics: Vec<String> = self
            .bindings
            .iter()
            .enumerate()
            .filter(|(i, _)| candidates.iter().all(|c| c.desirabilities[*i] <= 0.0))
            .filter_map(|(i, b)| {
                candidates
                    .iter()
                    .map(|c| c.predicted_responses[i].value)
                    .min_by(|x, y| b.goal.shortfall(*x).total_cmp(&b.goal.shortfall(*y)))
                    .map(|closest| b.goal.unattained(closest))
            })
            .collect();
        if diagnostics.is_empty() {
            diagnostics.push("response goals cannot be met simultaneously".to_string());
        }
        diagnostics
    }
}

/// Bind a model factor to the optimization factor of the same name.
fn link(model_factor: &Factor, factors: &[Factor], response: &str) -> Result<Link> {
    let source = factors
        .iter()
        .position(|f| f.name == model_factor.name)
        .ok_or_else(|| {
            Error::configuration(format!(
                "model for '{response}' uses factor '{}', which is not being optimized",
                model_factor.name
            ))
        })?;
    let factor = &factors[source];
    match (model_factor.is_continuous(), factor.is_continuous()) {
        (true, true) => Ok(Link::Continuous { source }),
        (false, false) => {
            let categories = factor
                .categories()
                .iter()
                .map(|label| {
                    model_factor
                        .categories()
                        .iter()
                        .position(|c| c == label)
                        .ok_or_else(|| {
                            Error::configuration(format!(
                                "model for '{response}' has no category '{label}' for factor '{}'",
                                factor.name
                            ))
                        })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Link::Categorical { source, categories })
        }
        _ => Err(Error::configuration(format!(
            "factor '{}' has a different kind in the model for '{response}'",
            factor.name
        ))),
    }
}

/// Best-first distinct candidates.
fn rank(mut found: Vec<(Candidate, usize, f64)>, limit: usize) -> Vec<Candidate> {
    found.sort_by(|a, b| b.2.total_cmp(&a.2));
    let mut kept: Vec<(Candidate, usize)> = Vec::new();
    for (candidate, combo, _) in found {
        let duplicate = kept.iter().any(|(k, kc)| {
            *kc == combo
                && k.coded
                    .iter()
                    .zip(&candidate.coded)
                    .all(|(a, b)| (a - b).abs() < DUPLICATE_TOLERANCE)
        });
        if !duplicate {
            kept.push((candidate, combo));
            if kept.len() == limit {
                break;
            }
        }
    }
    kept.into_iter().map(|(c, _)| c).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze, AnalysisRequest, AnalysisType, ExperimentRun};
    use crate::context::CancellationToken;
    use crate::design::{generate, DesignOptions, DesignType};
    use crate::factor::FactorValue;

    fn factors() -> Vec<Factor> {
        vec![
            Factor::continuous("Temperature", 60.0, 80.0),
            Factor::continuous("Pressure", 100.0, 200.0),
        ]
    }

    /// Models fitted to exact surfaces over a face-centered CCD.
    fn models(surfaces: &[(&str, fn(f64, f64) -> f64)]) -> BTreeMap<String, FittedModel> {
        let options = DesignOptions::default()
            .with_alpha(crate::design::Alpha::FaceCentered)
            .with_center_points(3)
            .with_randomize(false);
        let design = generate(DesignType::Ccd, &factors(), &options).unwrap();
        let runs: Vec<ExperimentRun> = design
            .runs
            .iter()
            .zip(design.experiment_runs())
            .enumerate()
            .map(|(i, (run, mut exp))| {
                let t = run.settings[0].coded().unwrap();
                let p = run.settings[1].coded().unwrap();
                let noise = if i % 2 == 0 { 0.01 } else { -0.01 };
                for (name, f) in surfaces {
                    exp.set_response(*name, f(t, p) + noise);
                }
                exp
            })
            .collect();
        let names: Vec<&str> = surfaces.iter().map(|(n, _)| *n).collect();
        let request = AnalysisRequest::new(DesignType::Ccd, names)
            .with_analysis_type(AnalysisType::ResponseSurface);
        analyze(&runs, &factors(), &request).unwrap()
    }

    fn config() -> OptimizerConfig {
        OptimizerConfig::default().with_starts(6).with_seed(17)
    }

    #[test]
    fn test_single_maximize_finds_interior_peak() {
        let peak: fn(f64, f64) -> f64 =
            |t, p| 80.0 - 4.0 * (t - 0.5).powi(2) - 2.0 * (p + 0.2).powi(2);
        let models = models(&[("Yield", peak)]);
        let goals = [ResponseGoal::maximize("Yield", 70.0, 90.0)];
        let result = optimize(&models, &factors(), &goals, &config()).unwrap();

        assert!(result.feasible);
        let best = result.best().unwrap();
        assert!((best.coded[0] - 0.5).abs() < 0.02);
        assert!((best.coded[1] + 0.2).abs() < 0.02);
        assert!((best.numeric("Temperature").unwrap() - 75.0).abs() < 0.2);
        assert!((best.overall_desirability - 0.5).abs() < 0.01);
        assert!(best.predicted_responses[0].interval.is_some());
        assert_eq!(result.starts_completed, 6);
        assert!(result.failures.is_empty());

        for pair in result.candidates.windows(2) {
            assert!(pair[0].overall_desirability >= pair[1].overall_desirability);
        }
    }

    #[test]
    fn test_trade_off_between_responses() {
        let models = models(&[
            ("Yield", |t, _| 70.0 + 10.0 * t),
            ("Cost", |t, p| 20.0 + 5.0 * t + 5.0 * p),
        ]);
        let goals = [
            ResponseGoal::maximize("Yield", 60.0, 80.0),
            ResponseGoal::minimize("Cost", 10.0, 30.0),
        ];
        let result = optimize(&models, &factors(), &goals, &config()).unwrap();
        let best = result.best().unwrap();
        assert!(result.feasible);
        // Pressure only costs, so it goes to its low bound
        assert!((best.coded[1] + 1.0).abs() < 1e-3);
        assert_eq!(best.desirabilities.len(), 2);
        let d = overall_desirability(&best.desirabilities, &[1.0, 1.0]);
        assert!((d - best.overall_desirability).abs() < 1e-12);
    }

    #[test]
    fn test_infeasible_reports_unattainable_goal() {
        let models = models(&[("Yield", |t, p| 50.0 + t + p)]);
        let goals = [ResponseGoal::maximize("Yield", 70.0, 100.0)];
        let result = optimize(&models, &factors(), &goals, &config()).unwrap();

        assert!(!result.feasible);
        assert!(!result.candidates.is_empty());
        assert!(result.candidates.iter().all(|c| !c.feasible));
        assert_eq!(result.diagnostics.len(), 1);
        assert!(result.diagnostics[0].contains("'Yield'"));
        // the least-infeasible candidate sits at the best corner
        let best = result.best().unwrap();
        assert!((best.predicted_responses[0].value - 52.0).abs() < 0.05);
    }

    #[test]
    fn test_categorical_combinations_searched() {
        let mut all = factors();
        all.push(Factor::categorical("Catalyst", ["A", "B"]));
        let options = DesignOptions::default().with_center_points(2).with_randomize(false);
        let design = generate(DesignType::Factorial, &all, &options).unwrap();
        let runs: Vec<ExperimentRun> = design
            .runs
            .iter()
            .zip(design.experiment_runs())
            .enumerate()
            .map(|(i, (run, exp))| {
                let t = run.settings[0].coded().unwrap();
                let noise = if i % 3 == 0 { 0.02 } else { -0.01 };
                let bonus = if run.settings[2].category() == Some(1) { 8.0 } else { 0.0 };
                exp.with_response("Yield", 70.0 + 3.0 * t + bonus + noise)
            })
            .collect();
        let request = AnalysisRequest::new(DesignType::Factorial, ["Yield"])
            .with_analysis_type(AnalysisType::MainEffects);
        let models = analyze(&runs, &all, &request).unwrap();

        let goals = [ResponseGoal::maximize("Yield", 60.0, 90.0)];
        let result = optimize(&models, &all, &goals, &config()).unwrap();
        let best = result.best().unwrap();
        assert_eq!(best.factor_settings["Catalyst"], FactorValue::Label("B".into()));
        assert!((best.numeric("Temperature").unwrap() - 80.0).abs() < 1e-3);
        assert_eq!(result.starts_planned, 12);
    }

    #[test]
    fn test_configuration_errors() {
        let models = models(&[("Yield", |t, _| 70.0 + t)]);
        let ok = [ResponseGoal::maximize("Yield", 60.0, 80.0)];

        let err = optimize(&models, &factors(), &[], &config()).unwrap_err();
        assert!(err.is_configuration());

        let unknown = [ResponseGoal::maximize("Purity", 60.0, 80.0)];
        let err = optimize(&models, &factors(), &unknown, &config()).unwrap_err();
        assert!(err.to_string().contains("unknown response 'Purity'"));

        let bad = [ResponseGoal::maximize("Yield", 80.0, 60.0)];
        assert!(optimize(&models, &factors(), &bad, &config()).is_err());

        let missing = vec![Factor::continuous("Temperature", 60.0, 80.0)];
        let err = optimize(&models, &missing, &ok, &config()).unwrap_err();
        assert!(err.to_string().contains("'Pressure'"));

        let zero = config().with_starts(0);
        assert!(optimize(&models, &factors(), &ok, &zero).is_err());
    }

    #[test]
    fn test_cancelled_before_start() {
        let models = models(&[("Yield", |t, _| 70.0 + t)]);
        let goals = [ResponseGoal::maximize("Yield", 60.0, 80.0)];
        let token = CancellationToken::new();
        token.cancel();
        let ctx = RunContext::new().with_cancellation(token);
        let result = optimize_with_context(&models, &factors(), &goals, &config(), &ctx).unwrap();
        assert!(result.cancelled);
        assert!(!result.truncated);
        assert!(result.candidates.is_empty());
        assert_eq!(result.starts_completed, 0);
        assert_eq!(result.diagnostics, vec!["no start completed"]);
    }

    #[test]
    fn test_failed_starts_recorded() {
        let models = models(&[("Yield", |t, p| 80.0 - (t - 0.3).powi(2) - (p - 0.1).powi(2))]);
        let goals = [ResponseGoal::maximize("Yield", 70.0, 80.0)];
        let cfg = config().with_max_iterations(2).with_starts(3);
        let result = optimize(&models, &factors(), &goals, &cfg).unwrap();
        assert_eq!(result.failures.len(), 3);
        assert!(result.candidates.is_empty());
        assert!(matches!(result.failures[0].error, Error::Numerical { .. }));
        assert_eq!(result.starts_completed, 3);
    }

    #[test]
    fn test_progress_per_start() {
        let models = models(&[("Yield", |t, _| 70.0 + t)]);
        let goals = [ResponseGoal::maximize("Yield", 60.0, 80.0)];
        let (tx, rx) = std::sync::mpsc::channel();
        let ctx = RunContext::new().with_progress(tx);
        optimize_with_context(&models, &factors(), &goals, &config(), &ctx).unwrap();
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 6);
        assert!(events.iter().all(|e| e.stage == Stage::Optimization));
        assert!(events.iter().any(|e| e.percent == 100.0));
    }

    #[test]
    fn test_seeded_search_is_reproducible() {
        let models = models(&[("Yield", |t, p| 75.0 + 2.0 * t * p)]);
        let goals = [ResponseGoal::maximize("Yield", 70.0, 80.0)];
        let a = optimize(&models, &factors(), &goals, &config()).unwrap();
        let b = optimize(&models, &factors(), &goals, &config()).unwrap();
        assert_eq!(a, b);
    }
}
