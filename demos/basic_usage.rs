//! Basic usage example for the doekit library.
//!
//! Generates a central composite design for a two-factor process, fits a
//! response surface to simulated yield and cost, and searches for settings
//! that keep yield high and cost low.
//!
//! Run with `RUST_LOG=doekit=debug` to see the engine's log output.

use doekit::analysis::{analyze, AnalysisRequest, AnovaSource, ExperimentRun};
use doekit::design::{generate, Alpha, DesignOptions, DesignType};
use doekit::optimize::{optimize, OptimizerConfig, ResponseGoal};
use doekit::Factor;
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("doekit - Basic Usage Example\n");

    let factors = vec![
        Factor::continuous("Temperature", 60.0, 80.0).with_unit("°C"),
        Factor::continuous("Pressure", 100.0, 200.0).with_unit("kPa"),
    ];

    // Face-centered CCD: 4 corners, 4 axial points, 3 center points
    let options = DesignOptions::default()
        .with_alpha(Alpha::FaceCentered)
        .with_center_points(3)
        .with_seed(42);
    let design = generate(DesignType::Ccd, &factors, &options).expect("Failed to generate design");

    println!("Design: {} ({} runs)", design.design_type, design.len());
    for row in design.rows() {
        println!(
            "  run {:>2}: Temperature = {:>6}, Pressure = {:>6}",
            row.run_order, row.values["Temperature"], row.values["Pressure"]
        );
    }
    println!();

    // Simulated measurements
    let runs: Vec<ExperimentRun> = design
        .rows()
        .into_iter()
        .zip(design.experiment_runs())
        .enumerate()
        .map(|(i, (row, run))| {
            let t = factors[0].to_coded(row.values["Temperature"].as_numeric().unwrap_or(70.0));
            let p = factors[1].to_coded(row.values["Pressure"].as_numeric().unwrap_or(150.0));
            let noise = 0.3 * ((i * 7 % 5) as f64 - 2.0) / 2.0;
            let yield_ = 78.0 + 3.0 * t + 1.5 * p - 2.5 * t * t - 1.0 * p * p + 0.8 * t * p + noise;
            let cost = 40.0 + 6.0 * t + 4.0 * p + noise;
            run.with_response("Yield", yield_).with_response("Cost", cost)
        })
        .collect();

    let request = AnalysisRequest::new(DesignType::Ccd, ["Yield", "Cost"]);
    let models = analyze(&runs, &factors, &request).expect("Analysis failed");

    for model in models.values() {
        println!("Model for {}:", model.response);
        let adjusted = model
            .adjusted_r_squared
            .map_or_else(|| "n/a".to_string(), |r| format!("{r:.4}"));
        println!("  R² = {:.4}, adjusted R² = {adjusted}", model.r_squared);
        if let Some(row) = model.anova_row(&AnovaSource::LackOfFit) {
            println!("  lack of fit p = {:?}", row.p_value);
        }
        println!("  {}", model.equation.natural);
        for note in &model.notes {
            println!("  note: {note}");
        }
        println!();
    }

    let goals = [
        ResponseGoal::maximize("Yield", 75.0, 80.0),
        ResponseGoal::minimize("Cost", 30.0, 45.0),
    ];
    let result = optimize(&models, &factors, &goals, &OptimizerConfig::default())
        .expect("Optimization failed");

    if result.feasible {
        println!("✓ Found {} candidate settings", result.candidates.len());
    } else {
        println!("✗ No setting meets every goal");
        for message in &result.diagnostics {
            println!("  {message}");
        }
    }
    if let Some(best) = result.best() {
        println!("Best candidate (D = {:.4}):", best.overall_desirability);
        for (name, value) in &best.factor_settings {
            println!("  {name} = {value}");
        }
        for response in &best.predicted_responses {
            println!("  predicted {} = {:.3}", response.name, response.value);
        }
    }
}
