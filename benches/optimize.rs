use std::collections::BTreeMap;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use doekit::analysis::{analyze, AnalysisRequest, ExperimentRun, FittedModel};
use doekit::design::{generate, Alpha, DesignOptions, DesignType};
use doekit::optimize::{optimize, OptimizerConfig, ResponseGoal};
use doekit::Factor;

fn fitted(factors: &[Factor]) -> BTreeMap<String, FittedModel> {
    let options = DesignOptions::default()
        .with_alpha(Alpha::FaceCentered)
        .with_center_points(4)
        .with_randomize(false);
    let design = generate(DesignType::Ccd, factors, &options).unwrap();
    let runs: Vec<ExperimentRun> = design
        .runs
        .iter()
        .zip(design.experiment_runs())
        .enumerate()
        .map(|(i, (run, exp))| {
            let x: Vec<f64> = run.settings.iter().filter_map(|s| s.coded()).collect();
            let wobble = 0.05 * (i as f64).sin();
            let yield_ = 80.0 - x.iter().map(|v| (v - 0.3).powi(2)).sum::<f64>() + wobble;
            let cost = 20.0 + x.iter().sum::<f64>() + wobble;
            exp.with_response("Yield", yield_).with_response("Cost", cost)
        })
        .collect();
    let request = AnalysisRequest::new(DesignType::Ccd, ["Yield", "Cost"]);
    analyze(&runs, factors, &request).unwrap()
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("Analyze_RSM");
    for k in [2, 3, 4] {
        let factors: Vec<Factor> = (0..k)
            .map(|i| Factor::continuous(format!("X{}", i + 1), 0.0, 1.0))
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(k), &factors, |b, factors| {
            b.iter(|| fitted(factors));
        });
    }
    group.finish();
}

fn bench_desirability(c: &mut Criterion) {
    let mut group = c.benchmark_group("Desirability");
    group.sample_size(20);
    let goals = [
        ResponseGoal::maximize("Yield", 75.0, 82.0),
        ResponseGoal::minimize("Cost", 15.0, 25.0),
    ];
    for k in [2, 3, 4] {
        let factors: Vec<Factor> = (0..k)
            .map(|i| Factor::continuous(format!("X{}", i + 1), 0.0, 1.0))
            .collect();
        let models = fitted(&factors);
        for starts in [5, 20] {
            let config = OptimizerConfig::default().with_starts(starts);
            group.bench_with_input(BenchmarkId::new(format!("k{k}"), starts), &config, |b, config| {
                b.iter(|| optimize(&models, &factors, &goals, config).unwrap());
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_fit, bench_desirability);
criterion_main!(benches);
