//! Python bindings for doekit.
//!
//! This module exposes design generation, analysis and optimization to
//! Python using PyO3. Enable the `python` feature to use this.

use std::collections::{BTreeMap, HashMap};

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

use crate::analysis::{analyze, AnalysisRequest, FittedModel};
use crate::design::{generate, DesignMatrix, DesignOptions, DesignType};
use crate::factor::{Factor, FactorValue};
use crate::optimize::{optimize, Goal, OptimizerConfig, ResponseGoal};

fn value_error(e: crate::Error) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn factor_value(py: Python<'_>, value: &FactorValue) -> PyObject {
    match value {
        FactorValue::Numeric(v) => v.into_py(py),
        FactorValue::Label(s) => s.into_py(py),
    }
}

fn settings_dict<'py>(
    py: Python<'py>,
    values: &BTreeMap<String, FactorValue>,
) -> PyResult<&'py PyDict> {
    let dict = PyDict::new(py);
    for (name, value) in values {
        dict.set_item(name, factor_value(py, value))?;
    }
    Ok(dict)
}

/// Python wrapper for Factor
#[pyclass(name = "Factor")]
#[derive(Clone)]
pub struct PyFactor {
    inner: Factor,
}

#[pymethods]
impl PyFactor {
    /// Continuous factor between two levels.
    #[staticmethod]
    fn continuous(name: String, low: f64, high: f64) -> Self {
        Self {
            inner: Factor::continuous(name, low, high),
        }
    }

    /// Categorical factor with named categories.
    #[staticmethod]
    fn categorical(name: String, categories: Vec<String>) -> Self {
        Self {
            inner: Factor::categorical(name, categories),
        }
    }

    /// Factor name.
    #[getter]
    fn name(&self) -> String {
        self.inner.name.clone()
    }
}

/// Python wrapper for DesignMatrix
#[pyclass(name = "Design")]
pub struct PyDesign {
    inner: DesignMatrix,
}

#[pymethods]
impl PyDesign {
    /// Number of runs.
    #[getter]
    fn runs(&self) -> usize {
        self.inner.len()
    }

    /// Design notes.
    #[getter]
    fn notes(&self) -> Vec<String> {
        self.inner.metadata.notes.clone()
    }

    /// Runs as a list of `{factor: value}` dicts in run order.
    fn rows(&self, py: Python<'_>) -> PyResult<PyObject> {
        let list = PyList::empty(py);
        for row in self.inner.rows() {
            list.append(settings_dict(py, &row.values)?)?;
        }
        Ok(list.into())
    }
}

/// Python wrapper for FittedModel
#[pyclass(name = "Model")]
pub struct PyModel {
    inner: FittedModel,
}

#[pymethods]
impl PyModel {
    /// R².
    #[getter]
    fn r_squared(&self) -> f64 {
        self.inner.r_squared
    }

    /// Adjusted R², `None` when the residual has no degrees of freedom.
    #[getter]
    fn adjusted_r_squared(&self) -> Option<f64> {
        self.inner.adjusted_r_squared
    }

    /// Equation in natural units.
    #[getter]
    fn equation(&self) -> String {
        self.inner.equation.natural.clone()
    }

    /// Coefficient estimates as `(term, estimate, p_value)` tuples.
    fn coefficients(&self) -> Vec<(String, f64, Option<f64>)> {
        self.inner
            .coefficients
            .iter()
            .map(|c| (c.name.clone(), c.estimate, c.p_value))
            .collect()
    }

    /// Predict at natural-unit settings given as `{factor: value}`.
    fn predict(&self, settings: HashMap<String, PyObject>, py: Python<'_>) -> PyResult<f64> {
        let mut values = BTreeMap::new();
        for (name, value) in settings {
            let value = match value.extract::<f64>(py) {
                Ok(v) => FactorValue::Numeric(v),
                Err(_) => FactorValue::Label(value.extract::<String>(py)?),
            };
            values.insert(name, value);
        }
        self.inner
            .predict(&values)
            .map(|p| p.value)
            .map_err(value_error)
    }
}

/// Generate a design.
#[pyfunction]
#[pyo3(signature = (design_type, factors, center_points=0, replicates=1, seed=None))]
fn generate_design(
    design_type: &str,
    factors: Vec<PyFactor>,
    center_points: usize,
    replicates: usize,
    seed: Option<u64>,
) -> PyResult<PyDesign> {
    let design_type: DesignType = design_type.parse().map_err(value_error)?;
    let factors: Vec<Factor> = factors.into_iter().map(|f| f.inner).collect();
    let mut options = DesignOptions::default()
        .with_center_points(center_points)
        .with_replicates(replicates);
    if let Some(seed) = seed {
        options = options.with_seed(seed);
    }
    let inner = generate(design_type, &factors, &options).map_err(value_error)?;
    Ok(PyDesign { inner })
}

/// Fit models to responses measured in the design's run order.
#[pyfunction]
fn analyze_design(
    design: &PyDesign,
    responses: HashMap<String, Vec<f64>>,
) -> PyResult<HashMap<String, PyModel>> {
    let mut runs = design.inner.experiment_runs();
    for (name, values) in &responses {
        if values.len() != runs.len() {
            return Err(value_error(crate::Error::DimensionMismatch {
                expected: format!("{} values for every response", runs.len()),
                actual: format!("{} values for response '{name}'", values.len()),
            }));
        }
        for (run, value) in runs.iter_mut().zip(values) {
            run.set_response(name.clone(), *value);
        }
    }
    let request = AnalysisRequest::new(design.inner.design_type, responses.keys().cloned());
    let models = analyze(&runs, &design.inner.factors, &request).map_err(value_error)?;
    Ok(models
        .into_iter()
        .map(|(name, inner)| (name, PyModel { inner }))
        .collect())
}

/// Maximize desirability; goals are `(response, goal, lower, upper, target)`.
///
/// Returns the best candidate's settings and overall desirability.
#[pyfunction]
#[pyo3(signature = (models, factors, goals, seed=None))]
fn optimize_models(
    py: Python<'_>,
    models: HashMap<String, PyRef<'_, PyModel>>,
    factors: Vec<PyFactor>,
    goals: Vec<(String, String, f64, f64, Option<f64>)>,
    seed: Option<u64>,
) -> PyResult<Option<(PyObject, f64)>> {
    let models: BTreeMap<String, FittedModel> = models
        .into_iter()
        .map(|(name, model)| (name, model.inner.clone()))
        .collect();
    let factors: Vec<Factor> = factors.into_iter().map(|f| f.inner).collect();
    let goals = goals
        .into_iter()
        .map(|(name, goal, lower, upper, target)| {
            let goal: Goal = goal.parse()?;
            Ok(match goal {
                Goal::Maximize => ResponseGoal::maximize(name, lower, upper),
                Goal::Minimize => ResponseGoal::minimize(name, lower, upper),
                Goal::InRange => ResponseGoal::in_range(name, lower, upper),
                Goal::Target => {
                    let target = target.ok_or_else(|| {
                        crate::Error::configuration(format!(
                            "target goal for '{name}' needs a target value"
                        ))
                    })?;
                    ResponseGoal::target(name, lower, target, upper)
                }
            })
        })
        .collect::<crate::Result<Vec<_>>>()
        .map_err(value_error)?;
    let mut config = OptimizerConfig::default();
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }
    let result = optimize(&models, &factors, &goals, &config).map_err(value_error)?;
    result
        .best()
        .map(|best| {
            let settings = settings_dict(py, &best.factor_settings)?;
            Ok((settings.into(), best.overall_desirability))
        })
        .transpose()
}

/// The doekit Python module.
#[pymodule]
fn doekit(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyFactor>()?;
    m.add_class::<PyDesign>()?;
    m.add_class::<PyModel>()?;
    m.add_function(wrap_pyfunction!(generate_design, m)?)?;
    m.add_function(wrap_pyfunction!(analyze_design, m)?)?;
    m.add_function(wrap_pyfunction!(optimize_models, m)?)?;
    Ok(())
}
