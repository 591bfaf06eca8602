//! Response model fitting.
//!
//! [`analyze`] fits one least-squares model per response over observed
//! [`ExperimentRun`]s and returns a [`FittedModel`] for each, with
//! coefficients, ANOVA, fit statistics, per-run diagnostics and the fitted
//! equation.
//!
//! ## Model Terms
//!
//! Terms come from [`AnalysisType`] (resolved from the design type when
//! `Auto`) or from an explicit list such as `["Temperature", "Pressure",
//! "Temperature*Pressure", "Temperature^2"]`. With [`Hierarchy::Enforce`]
//! missing main effects of interaction and quadratic terms are added and noted
//! on the model.
//!
//! ## Inestimable Terms
//!
//! Terms are admitted lowest degree first through a rank-revealing Cholesky
//! factorization. A term aliased with earlier terms (or one the data cannot
//! support) is dropped and the model is flagged `reduced`. Setting
//! `require_exact` turns this into [`Error::SingularModel`].
//!
//! ## Example
//!
//! ```
//! use doekit::analysis::{analyze, AnalysisRequest};
//! use doekit::design::{generate, DesignOptions, DesignType};
//! use doekit::Factor;
//!
//! let factors = vec![
//!     Factor::continuous("Temperature", 60.0, 80.0),
//!     Factor::continuous("Pressure", 100.0, 200.0),
//! ];
//! let options = DesignOptions::default().with_center_points(1).with_randomize(false);
//! let design = generate(DesignType::Factorial, &factors, &options).unwrap();
//!
//! let yields = [62.0, 70.0, 66.0, 81.0, 70.5];
//! let runs: Vec<_> = design
//!     .experiment_runs()
//!     .into_iter()
//!     .zip(yields)
//!     .map(|(run, y)| run.with_response("Yield", y))
//!     .collect();
//!
//! let request = AnalysisRequest::new(DesignType::Factorial, ["Yield"]);
//! let models = analyze(&runs, &factors, &request).unwrap();
//! let model = &models["Yield"];
//!
//! assert_eq!(model.coefficients.len(), 4);
//! assert!(model.r_squared > 0.9);
//! println!("{}", model.equation.natural);
//! ```

mod anova;
mod diagnostics;
mod equation;
mod fit;
mod terms;
mod types;

pub use terms::{Term, INTERCEPT};
pub use types::{
    AnalysisType, AnovaRow, AnovaSource, Coefficient, ConfidenceInterval, Equation,
    ExperimentRun, FitStatistics, FittedModel, Hierarchy, Prediction, RunDiagnostic,
};

use std::collections::{BTreeMap, HashSet};

use ndarray::Array1;
use tracing::{debug, info};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::context::{RunContext, Stage};
use crate::design::DesignType;
use crate::error::{Error, Result};
use crate::factor::{validate_factors, Factor, Setting};
use fit::{fit, ModelSpec, Observations};

/// What to fit.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnalysisRequest {
    /// Design that produced the data; resolves [`AnalysisType::Auto`].
    pub design_type: DesignType,
    /// Factors in the model; empty means every factor.
    #[cfg_attr(feature = "serde", serde(default))]
    pub factor_names: Vec<String>,
    /// Responses to fit.
    pub response_names: Vec<String>,
    /// Model family (default: auto).
    #[cfg_attr(feature = "serde", serde(default))]
    pub analysis_type: AnalysisType,
    /// Explicit terms, overriding `analysis_type`.
    #[cfg_attr(feature = "serde", serde(default))]
    pub model_terms: Option<Vec<String>>,
    /// Hierarchy handling (default: enforce).
    #[cfg_attr(feature = "serde", serde(default))]
    pub hierarchy: Hierarchy,
    /// Fail instead of dropping inestimable terms (default: false).
    #[cfg_attr(feature = "serde", serde(default))]
    pub require_exact: bool,
    /// Confidence level for intervals (default: 0.95).
    #[cfg_attr(feature = "serde", serde(default = "default_confidence_level"))]
    pub confidence_level: f64,
}

fn default_confidence_level() -> f64 {
    0.95
}

impl AnalysisRequest {
    /// Request fitting `responses` from data of `design_type`.
    pub fn new<S: Into<String>>(
        design_type: DesignType,
        responses: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            design_type,
            factor_names: Vec::new(),
            response_names: responses.into_iter().map(Into::into).collect(),
            analysis_type: AnalysisType::Auto,
            model_terms: None,
            hierarchy: Hierarchy::Enforce,
            require_exact: false,
            confidence_level: default_confidence_level(),
        }
    }

    /// Restrict the model to the named factors.
    #[must_use]
    pub fn with_factor_names<S: Into<String>>(
        mut self,
        names: impl IntoIterator<Item = S>,
    ) -> Self {
        self.factor_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set the model family.
    #[must_use]
    pub fn with_analysis_type(mut self, analysis_type: AnalysisType) -> Self {
        self.analysis_type = analysis_type;
        self
    }

    /// Fit exactly these terms (plus the intercept).
    #[must_use]
    pub fn with_model_terms<S: Into<String>>(mut self, terms: impl IntoIterator<Item = S>) -> Self {
        self.model_terms = Some(terms.into_iter().map(Into::into).collect());
        self
    }

    /// Set hierarchy handling.
    #[must_use]
    pub fn with_hierarchy(mut self, hierarchy: Hierarchy) -> Self {
        self.hierarchy = hierarchy;
        self
    }

    /// Fail on inestimable terms.
    #[must_use]
    pub fn with_require_exact(mut self, require_exact: bool) -> Self {
        self.require_exact = require_exact;
        self
    }

    /// Set the confidence level.
    #[must_use]
    pub fn with_confidence_level(mut self, level: f64) -> Self {
        self.confidence_level = level;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.response_names.is_empty() {
            return Err(Error::configuration("at least one response name is required"));
        }
        let mut seen = HashSet::new();
        if let Some(name) = self.response_names.iter().find(|n| !seen.insert(n.as_str())) {
            return Err(Error::configuration(format!(
                "response '{name}' is listed more than once"
            )));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(Error::configuration(format!(
                "confidence level must be in (0, 1), got {}",
                self.confidence_level
            )));
        }
        Ok(())
    }

    /// Factors of the model, in request order.
    fn model_factors(&self, factors: &[Factor]) -> Result<Vec<Factor>> {
        if self.factor_names.is_empty() {
            return Ok(factors.to_vec());
        }
        self.factor_names
            .iter()
            .map(|name| {
                factors
                    .iter()
                    .find(|f| &f.name == name)
                    .cloned()
                    .ok_or_else(|| Error::configuration(format!("unknown factor '{name}'")))
            })
            .collect()
    }

    /// Terms to fit and notes on hierarchy additions.
    fn model_terms(&self, factors: &[Factor]) -> Result<(Vec<Term>, Vec<String>)> {
        let mut terms = match &self.model_terms {
            Some(names) => names
                .iter()
                .map(|name| Term::parse(name, factors))
                .collect::<Result<Vec<_>>>()?,
            None => match self.analysis_type.resolve(self.design_type) {
                AnalysisType::MainEffects => terms::main_effect_terms(factors.len()),
                AnalysisType::ResponseSurface => terms::response_surface_terms(factors),
                AnalysisType::TwoFactorInteraction | AnalysisType::Auto => {
                    terms::interaction_terms(factors.len())
                }
            },
        };

        let mut notes = Vec::new();
        if self.hierarchy == Hierarchy::Enforce {
            for name in terms::enforce_hierarchy(&mut terms, factors) {
                notes.push(format!("added main effect '{name}' for model hierarchy"));
            }
        }
        terms::normalize(&mut terms);
        Ok((terms, notes))
    }
}

/// Fit every requested response with a default context.
///
/// # Errors
///
/// Returns a configuration error for unknown factors or terms and invalid
/// run values, [`Error::InsufficientData`] when a response has fewer than two
/// observations, and [`Error::SingularModel`] when `require_exact` is set and
/// a term cannot be estimated.
pub fn analyze(
    runs: &[ExperimentRun],
    factors: &[Factor],
    request: &AnalysisRequest,
) -> Result<BTreeMap<String, FittedModel>> {
    analyze_with_context(runs, factors, request, &RunContext::default())
}

/// Fit every requested response, reporting progress through `ctx`.
///
/// # Errors
///
/// See [`analyze`].
pub fn analyze_with_context(
    runs: &[ExperimentRun],
    factors: &[Factor],
    request: &AnalysisRequest,
    ctx: &RunContext,
) -> Result<BTreeMap<String, FittedModel>> {
    validate_factors(factors)?;
    request.validate()?;

    let model_factors = request.model_factors(factors)?;
    let (terms, notes) = request.model_terms(&model_factors)?;
    debug!(
        factors = model_factors.len(),
        terms = terms.len(),
        "model terms resolved"
    );

    let coded = encode_runs(runs, &model_factors)?;

    let total = request.response_names.len();
    let mut models = BTreeMap::new();
    for (i, response) in request.response_names.iter().enumerate() {
        let observations = observations(runs, &coded, response);
        let model = fit(
            ModelSpec {
                response,
                factors: &model_factors,
                terms: &terms,
                notes: notes.clone(),
                require_exact: request.require_exact,
                confidence_level: request.confidence_level,
            },
            &observations,
        )?;

        info!(
            response = response.as_str(),
            observations = model.statistics.observations,
            r_squared = model.r_squared,
            reduced = model.reduced,
            "model fit complete"
        );
        ctx.emit_progress(
            Stage::Analysis,
            100.0 * (i + 1) as f64 / total as f64,
            format!("model fit complete for '{response}'"),
        );
        models.insert(response.clone(), model);
    }
    Ok(models)
}

/// Coded settings of every run for the model factors.
fn encode_runs(runs: &[ExperimentRun], factors: &[Factor]) -> Result<Vec<Vec<Setting>>> {
    runs.iter()
        .enumerate()
        .map(|(i, run)| {
            factors
                .iter()
                .map(|f| {
                    let value = run.settings.get(&f.name).ok_or_else(|| {
                        Error::configuration(format!(
                            "run {} has no value for factor '{}'",
                            i + 1,
                            f.name
                        ))
                    })?;
                    f.setting_for(value)
                })
                .collect()
        })
        .collect()
}

/// Runs with a finite value for `response`; others are skipped.
fn observations<'a>(
    runs: &[ExperimentRun],
    coded: &'a [Vec<Setting>],
    response: &str,
) -> Observations<'a> {
    let mut run_ids = Vec::new();
    let mut settings = Vec::new();
    let mut y = Vec::new();
    for (i, (run, setting)) in runs.iter().zip(coded).enumerate() {
        if let Some(&value) = run.responses.get(response).filter(|v| v.is_finite()) {
            run_ids.push(i + 1);
            settings.push(setting.as_slice());
            y.push(value);
        }
    }
    Observations {
        run_ids,
        settings,
        y: Array1::from(y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::{generate, DesignOptions};
    use crate::factor::FactorValue;

    fn two_factors() -> Vec<Factor> {
        vec![
            Factor::continuous("Temperature", 60.0, 80.0),
            Factor::continuous("Pressure", 100.0, 200.0),
        ]
    }

    /// Runs in standard order with a known response surface plus noise.
    fn runs_from(
        design_type: DesignType,
        factors: &[Factor],
        options: &DesignOptions,
        mut response: impl FnMut(&[f64]) -> f64,
    ) -> Vec<ExperimentRun> {
        let design = generate(design_type, factors, options).unwrap();
        design
            .runs
            .iter()
            .zip(design.experiment_runs())
            .map(|(run, exp)| {
                let coded: Vec<f64> = run
                    .settings
                    .iter()
                    .map(|s| s.coded().unwrap_or(0.0))
                    .collect();
                exp.with_response("Y", response(&coded))
            })
            .collect()
    }

    fn assert_ss_identity(model: &FittedModel) {
        let get = |s: AnovaSource| model.anova_row(&s).unwrap().sum_of_squares;
        let (m, r, t) = (
            get(AnovaSource::Model),
            get(AnovaSource::Residual),
            get(AnovaSource::CorTotal),
        );
        assert!((m + r - t).abs() <= 1e-6 * t.max(1.0), "{m} + {r} != {t}");
    }

    #[test]
    fn test_recovers_coefficients() {
        let options = DesignOptions::default().with_center_points(3).with_seed(3);
        let noise = [0.1, -0.2, 0.05, 0.15, -0.1, 0.0, 0.05];
        let mut k = 0;
        let runs = runs_from(DesignType::Factorial, &two_factors(), &options, |x| {
            k += 1;
            50.0 + 4.0 * x[0] - 2.0 * x[1] + 1.5 * x[0] * x[1] + noise[k - 1]
        });
        let request = AnalysisRequest::new(DesignType::Factorial, ["Y"]);
        let models = analyze(&runs, &two_factors(), &request).unwrap();
        let model = &models["Y"];

        assert_eq!(model.terms.len(), 4);
        assert!(!model.reduced);
        assert!((model.coefficient("Temperature").unwrap().estimate - 4.0).abs() < 0.2);
        assert!((model.coefficient("Pressure").unwrap().estimate + 2.0).abs() < 0.2);
        assert!((model.coefficient("Temperature*Pressure").unwrap().estimate - 1.5).abs() < 0.2);
        assert!(model.r_squared > 0.99);
        assert!(model.adjusted_r_squared.unwrap() <= model.r_squared);
        assert!(model.predicted_r_squared.is_some());
        assert_ss_identity(model);

        let p = model.coefficient("Temperature").unwrap().p_value.unwrap();
        assert!(p < 0.01);
        // orthogonal design: no variance inflation
        for c in model.coefficients.iter().skip(1) {
            assert!((c.vif.unwrap() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_lack_of_fit_with_replicated_center() {
        let options = DesignOptions::default().with_center_points(4).with_randomize(false);
        let center = [0.3, -0.2, 0.1, -0.2];
        let mut c = 0;
        let runs = runs_from(DesignType::Factorial, &two_factors(), &options, |x| {
            if x[0] == 0.0 && x[1] == 0.0 {
                c += 1;
                // curvature the first-order model cannot explain
                60.0 + center[c - 1]
            } else {
                50.0 + 3.0 * x[0] + x[1]
            }
        });
        let request = AnalysisRequest::new(DesignType::Factorial, ["Y"])
            .with_analysis_type(AnalysisType::MainEffects);
        let models = analyze(&runs, &two_factors(), &request).unwrap();
        let model = &models["Y"];

        let lof = model.anova_row(&AnovaSource::LackOfFit).unwrap();
        let pe = model.anova_row(&AnovaSource::PureError).unwrap();
        assert_eq!(pe.degrees_of_freedom, 3);
        assert_eq!(lof.degrees_of_freedom, 2);
        assert!(lof.p_value.unwrap() < 0.01);
        assert_ss_identity(model);
    }

    #[test]
    fn test_quadratics_aliased_in_two_level_design() {
        let options = DesignOptions::default().with_randomize(false);
        let runs = runs_from(DesignType::Factorial, &two_factors(), &options, |x| 10.0 + x[0]);
        let request = AnalysisRequest::new(DesignType::Factorial, ["Y"])
            .with_model_terms(["Temperature", "Temperature^2"]);
        let models = analyze(&runs, &two_factors(), &request).unwrap();
        let model = &models["Y"];
        assert!(model.reduced);
        assert_eq!(model.dropped_terms, vec!["Temperature^2"]);
        assert_eq!(model.terms.len(), 2);

        let exact = request.with_require_exact(true);
        match analyze(&runs, &two_factors(), &exact) {
            Err(Error::SingularModel { response, terms }) => {
                assert_eq!(response, "Y");
                assert_eq!(terms, vec!["Temperature^2"]);
            }
            other => panic!("expected singular model, got {other:?}"),
        }
    }

    #[test]
    fn test_fractional_aliases_dropped() {
        let factors: Vec<Factor> = ["A", "B", "C"]
            .iter()
            .map(|n| Factor::continuous(*n, -1.0, 1.0))
            .collect();
        // 2^(3-1) with C = AB: the interaction AB is aliased with C
        let options = DesignOptions::default().with_fraction(1).with_randomize(false);
        let runs = runs_from(DesignType::Fractional, &factors, &options, |x| 1.0 + x[0] - x[2]);
        let request = AnalysisRequest::new(DesignType::Fractional, ["Y"])
            .with_model_terms(["A", "B", "C", "A*B"]);
        let models = analyze(&runs, &factors, &request).unwrap();
        let model = &models["Y"];
        assert_eq!(model.dropped_terms, vec!["A*B"]);
        assert!(model.notes.iter().any(|n| n.contains("A*B")));
    }

    #[test]
    fn test_hierarchy_enforced_and_ignored() {
        let options = DesignOptions::default().with_center_points(2).with_randomize(false);
        let runs = runs_from(DesignType::Factorial, &two_factors(), &options, |x| {
            5.0 + x[0] * x[1] + 0.01 * x[0]
        });

        let request = AnalysisRequest::new(DesignType::Factorial, ["Y"])
            .with_model_terms(["Temperature*Pressure"]);
        let models = analyze(&runs, &two_factors(), &request).unwrap();
        let model = &models["Y"];
        assert_eq!(model.terms.len(), 4);
        assert_eq!(model.notes.len(), 2);

        let ignored = request.with_hierarchy(Hierarchy::Ignore);
        let models = analyze(&runs, &two_factors(), &ignored).unwrap();
        let model = &models["Y"];
        assert_eq!(model.terms, vec![Term::intercept(), Term::interaction(0, 1)]);
        assert!(model.notes.is_empty());
    }

    #[test]
    fn test_response_surface_on_ccd() {
        let options = DesignOptions::default().with_center_points(5).with_seed(11);
        let mut k = 0;
        let runs = runs_from(DesignType::Ccd, &two_factors(), &options, |x| {
            k += 1;
            let wobble = [0.05, -0.05, 0.02, -0.03, 0.04][k % 5];
            80.0 + 2.0 * x[0] + 1.0 * x[1] - 3.0 * x[0] * x[0] - 1.5 * x[1] * x[1] + wobble
        });
        let request = AnalysisRequest::new(DesignType::Ccd, ["Y"]);
        let models = analyze(&runs, &two_factors(), &request).unwrap();
        let model = &models["Y"];

        assert_eq!(model.terms.len(), 6);
        assert!((model.coefficient("Temperature^2").unwrap().estimate + 3.0).abs() < 0.1);
        assert!(model.r_squared > 0.99);
        assert_ss_identity(model);
        assert!(model.equation.natural.contains("Temperature^2"));
    }

    #[test]
    fn test_missing_responses_skipped() {
        let options = DesignOptions::default().with_center_points(2).with_randomize(false);
        let mut runs = runs_from(DesignType::Factorial, &two_factors(), &options, |x| 3.0 + x[0]);
        runs[0].responses.clear();
        runs[5].set_response("Y", f64::NAN);
        let request = AnalysisRequest::new(DesignType::Factorial, ["Y"])
            .with_analysis_type(AnalysisType::MainEffects);
        let models = analyze(&runs, &two_factors(), &request).unwrap();
        let model = &models["Y"];
        assert_eq!(model.statistics.observations, 4);
        let ids: Vec<usize> = model.diagnostics.iter().map(|d| d.run).collect();
        assert_eq!(ids, vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_insufficient_data() {
        let runs = vec![ExperimentRun::new(BTreeMap::from([
            ("Temperature".to_string(), FactorValue::Numeric(60.0)),
            ("Pressure".to_string(), FactorValue::Numeric(100.0)),
        ]))
        .with_response("Y", 1.0)];
        let request = AnalysisRequest::new(DesignType::Factorial, ["Y"]);
        let err = analyze(&runs, &two_factors(), &request).unwrap_err();
        assert!(matches!(err, Error::InsufficientData { observations: 1, .. }));
    }

    #[test]
    fn test_configuration_errors() {
        let runs = runs_from(
            DesignType::Factorial,
            &two_factors(),
            &DesignOptions::default(),
            |_| 1.0,
        );
        let unknown =
            AnalysisRequest::new(DesignType::Factorial, ["Y"]).with_factor_names(["Humidity"]);
        assert!(analyze(&runs, &two_factors(), &unknown).unwrap_err().is_configuration());

        let no_response = AnalysisRequest::new(DesignType::Factorial, Vec::<String>::new());
        assert!(analyze(&runs, &two_factors(), &no_response).is_err());

        let mut factors = two_factors();
        factors.push(Factor::categorical("Line", ["a", "b"]));
        let bad_term = AnalysisRequest::new(DesignType::Factorial, ["Y"])
            .with_factor_names(["Temperature", "Line"])
            .with_model_terms(["Line^2"]);
        assert!(analyze(&runs, &factors, &bad_term).unwrap_err().is_configuration());
    }

    #[test]
    fn test_categorical_factor_model() {
        let factors = vec![
            Factor::continuous("Time", 10.0, 20.0),
            Factor::categorical("Catalyst", ["A", "B", "C"]),
        ];
        let options = DesignOptions::default().with_replicates(2).with_randomize(false);
        let runs = runs_from(DesignType::Factorial, &factors, &options, |_| 0.0)
            .into_iter()
            .enumerate()
            .map(|(i, run)| {
                let offset = match &run.settings["Catalyst"] {
                    FactorValue::Label(l) if l == "B" => 2.0,
                    FactorValue::Label(l) if l == "C" => -1.0,
                    _ => 0.0,
                };
                let time = match run.settings["Time"] {
                    FactorValue::Numeric(t) => (t - 15.0) / 5.0,
                    FactorValue::Label(_) => 0.0,
                };
                let y = 10.0 + offset + 0.5 * time + if i % 2 == 0 { 0.01 } else { -0.01 };
                run.with_response("Y", y)
            })
            .collect::<Vec<_>>();
        let request = AnalysisRequest::new(DesignType::Factorial, ["Y"])
            .with_analysis_type(AnalysisType::MainEffects);
        let models = analyze(&runs, &factors, &request).unwrap();
        let model = &models["Y"];

        assert_eq!(model.coefficients.len(), 4);
        assert!((model.coefficient("Catalyst[B]").unwrap().estimate - 2.0).abs() < 0.05);
        assert!((model.coefficient("Catalyst[C]").unwrap().estimate + 1.0).abs() < 0.05);
        let catalyst = model.anova_row(&AnovaSource::Term("Catalyst".into())).unwrap();
        assert_eq!(catalyst.degrees_of_freedom, 2);
        assert!(model.equation.natural.contains("Catalyst[B]"));
    }

    #[test]
    fn test_progress_per_response() {
        let runs: Vec<ExperimentRun> = runs_from(
            DesignType::Factorial,
            &two_factors(),
            &DesignOptions::default().with_center_points(1),
            |x| 1.0 + x[0],
        )
        .into_iter()
        .map(|r| {
            let y = r.responses["Y"];
            r.with_response("Z", 2.0 * y)
        })
        .collect();
        let (tx, rx) = std::sync::mpsc::channel();
        let ctx = RunContext::new().with_progress(tx);
        let request = AnalysisRequest::new(DesignType::Factorial, ["Y", "Z"])
            .with_analysis_type(AnalysisType::MainEffects);
        let models = analyze_with_context(&runs, &two_factors(), &request, &ctx).unwrap();
        assert_eq!(models.len(), 2);

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].stage, Stage::Analysis);
        assert_eq!(events[0].percent, 50.0);
        assert_eq!(events[1].percent, 100.0);
    }
}
