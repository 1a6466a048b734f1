//! Monte Carlo confidence intervals over caller-supplied seeds.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::ScenarioConfig,
    engine,
    world::{round_to, SUMMARY_DIGITS},
};

/// Two-sided z-scores for the supported confidence levels.
pub const Z_SCORES: [(f64, f64); 4] = [(0.80, 1.2816), (0.90, 1.6449), (0.95, 1.96), (0.99, 2.5758)];

#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    #[error("Monte Carlo requires at least one seed")]
    EmptySeedSet,

    #[error("Unsupported confidence level {level}. Use one of: {supported}")]
    UnsupportedConfidenceLevel { level: f64, supported: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonteCarloSample {
    pub seed: u64,
    pub average_resilience: f64,
    pub final_resilience: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonteCarloSummary {
    pub scenario_name: String,
    pub runs: usize,
    pub confidence_level: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub margin_of_error: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    pub samples: Vec<MonteCarloSample>,
}

/// Bessel-corrected sample standard deviation; 0 for fewer than two values.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt()
}

pub fn z_score_for(confidence_level: f64) -> Result<f64, AnalysisError> {
    Z_SCORES
        .iter()
        .find(|(level, _)| (level - confidence_level).abs() < f64::EPSILON)
        .map(|&(_, z)| z)
        .ok_or_else(|| AnalysisError::UnsupportedConfidenceLevel {
            level: confidence_level,
            supported: Z_SCORES
                .iter()
                .map(|(level, _)| level.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
}

/// Runs one simulation per seed (named `{name}-mc-{seed}`) and summarizes the
/// spread of average resilience. Both failure cases are detected before any
/// simulation runs.
pub fn monte_carlo(
    base: &ScenarioConfig,
    seeds: &[u64],
    confidence_level: f64,
) -> Result<MonteCarloSummary, AnalysisError> {
    if seeds.is_empty() {
        return Err(AnalysisError::EmptySeedSet);
    }
    let z = z_score_for(confidence_level)?;

    let samples: Vec<MonteCarloSample> = seeds
        .iter()
        .map(|&seed| {
            let scenario = base.derive(format!("{}-mc-{seed}", base.name), seed, base.policy);
            let result = engine::run(&scenario);
            MonteCarloSample {
                seed,
                average_resilience: result.average_resilience,
                final_resilience: result.final_resilience(),
            }
        })
        .collect();

    let values: Vec<f64> = samples.iter().map(|s| s.average_resilience).collect();
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let sample_std_dev = std_dev(&values);
    let margin_of_error = z * (sample_std_dev / n.sqrt());

    tracing::info!(
        scenario = %base.name,
        runs = samples.len(),
        mean,
        std_dev = sample_std_dev,
        "monte carlo complete"
    );

    Ok(MonteCarloSummary {
        scenario_name: base.name.clone(),
        runs: samples.len(),
        confidence_level,
        mean: round_to(mean, SUMMARY_DIGITS),
        std_dev: round_to(sample_std_dev, SUMMARY_DIGITS),
        margin_of_error: round_to(margin_of_error, SUMMARY_DIGITS),
        ci_low: round_to(mean - margin_of_error, SUMMARY_DIGITS),
        ci_high: round_to(mean + margin_of_error, SUMMARY_DIGITS),
        samples,
    })
}
