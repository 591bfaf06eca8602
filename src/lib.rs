//! # doekit
//!
//! A Design of Experiments engine: generate an experimental design, fit
//! polynomial models to the measured responses, and search the fitted models
//! for factor settings that satisfy several response goals at once.
//!
//! ## Overview
//!
//! The workflow has three stages, each a plain function over plain data:
//!
//! - **Design** ([`design::generate`]): full and fractional factorials,
//!   Plackett-Burman screening, central composite, Box-Behnken and Latin
//!   square designs, with center points, replicates and seeded randomization.
//! - **Analysis** ([`analysis::analyze`]): least-squares fits in coded units
//!   with ANOVA, lack of fit, R² statistics, coefficient inference and run
//!   diagnostics.
//! - **Optimization** ([`optimize::optimize`]): Derringer-Suich desirability
//!   maximized by multi-start bounded simplex search.
//!
//! ## Quick Start
//!
//! ```rust
//! use doekit::prelude::*;
//!
//! let factors = vec![
//!     Factor::continuous("Temperature", 60.0, 80.0),
//!     Factor::continuous("Pressure", 100.0, 200.0),
//! ];
//!
//! let options = DesignOptions::default().with_center_points(1).with_randomize(false);
//! let design = generate(DesignType::Factorial, &factors, &options).unwrap();
//! assert_eq!(design.len(), 5);
//!
//! let runs: Vec<ExperimentRun> = design
//!     .experiment_runs()
//!     .into_iter()
//!     .zip([62.0, 70.0, 66.0, 81.0, 70.5])
//!     .map(|(run, y)| run.with_response("Yield", y))
//!     .collect();
//! let request = AnalysisRequest::new(DesignType::Factorial, ["Yield"]);
//! let models = analyze(&runs, &factors, &request).unwrap();
//! assert!(models["Yield"].r_squared > 0.99);
//!
//! let goals = [ResponseGoal::maximize("Yield", 70.0, 100.0)];
//! let result = optimize(&models, &factors, &goals, &OptimizerConfig::default()).unwrap();
//! assert!(result.feasible);
//! ```
//!
//! ## Coding
//!
//! Continuous factors are analyzed in coded units, `-1` at the low level and
//! `+1` at the high level. Categorical factors enter models through
//! treatment-coded indicator columns with the first category as baseline.
//!
//! ## Features
//!
//! - `serde`: Serialization of designs, models and results
//! - `parallel`: Parallel optimizer starts using rayon
//! - `python`: Python bindings via PyO3

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod analysis;
pub mod context;
pub mod design;
pub mod error;
pub mod factor;
pub mod linalg;
pub mod optimize;
#[cfg(feature = "python")]
pub mod python;
pub mod stats;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::analysis::{
        analyze, analyze_with_context, AnalysisRequest, AnalysisType, ExperimentRun, FittedModel,
        Hierarchy, Prediction, Term,
    };
    pub use crate::context::{CancellationToken, ProgressEvent, RunContext, Stage};
    pub use crate::design::{
        generate, generate_with_context, Alpha, DesignMatrix, DesignOptions, DesignType,
    };
    pub use crate::error::{Error, Result};
    pub use crate::factor::{Factor, FactorKind, FactorValue, Setting};
    pub use crate::optimize::{
        optimize, optimize_with_context, Goal, OptimizationResult, OptimizerConfig, ResponseGoal,
    };
}

// Re-export commonly used items at crate root
pub use analysis::{analyze, AnalysisRequest, ExperimentRun, FittedModel};
pub use context::RunContext;
pub use design::{generate, DesignMatrix, DesignOptions, DesignType};
pub use error::{Error, Result};
pub use factor::{Factor, FactorKind, FactorValue, Setting};
pub use optimize::{optimize, OptimizationResult, OptimizerConfig, ResponseGoal};
