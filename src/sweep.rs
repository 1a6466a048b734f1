//! Exhaustive policy grid search.

use std::cmp::Ordering;

use crate::{
    config::{InterventionPolicy, ScenarioConfig},
    engine,
    world::SimulationResult,
};

/// One combination of the grid with its derived identity. `slot` is the
/// 1-based enumeration index the name and seed were derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepCandidate {
    pub slot: usize,
    pub scenario: ScenarioConfig,
}

/// Enumerates the Cartesian product (watering outermost, corridor innermost)
/// and derives `{name}-sweep-{k}` / `seed + k` for the k-th combination.
pub fn plan_sweep(
    base: &ScenarioConfig,
    watering_levels: &[f64],
    pesticide_caps: &[f64],
    corridor_levels: &[f64],
) -> Vec<SweepCandidate> {
    let mut plan =
        Vec::with_capacity(watering_levels.len() * pesticide_caps.len() * corridor_levels.len());
    for &watering in watering_levels {
        for &pesticide in pesticide_caps {
            for &corridor in corridor_levels {
                let slot = plan.len() + 1;
                let scenario = base.derive(
                    format!("{}-sweep-{slot}", base.name),
                    base.seed.wrapping_add(slot as u64),
                    InterventionPolicy::new(watering, pesticide, corridor),
                );
                plan.push(SweepCandidate { slot, scenario });
            }
        }
    }
    plan
}

/// Runs every combination and returns results best-first. Ties keep
/// enumeration order.
pub fn sweep(
    base: &ScenarioConfig,
    watering_levels: &[f64],
    pesticide_caps: &[f64],
    corridor_levels: &[f64],
) -> Vec<SimulationResult> {
    let plan = plan_sweep(base, watering_levels, pesticide_caps, corridor_levels);
    let mut results: Vec<SimulationResult> = plan
        .iter()
        .map(|candidate| {
            tracing::debug!(slot = candidate.slot, scenario = %candidate.scenario.name, "sweep run");
            engine::run(&candidate.scenario)
        })
        .collect();
    rank(&mut results);
    tracing::info!(
        scenario = %base.name,
        runs = results.len(),
        best = results.first().map(|r| r.average_resilience),
        "policy sweep complete"
    );
    results
}

/// Stable descending sort by average resilience.
pub fn rank(results: &mut [SimulationResult]) {
    results.sort_by(|a, b| {
        b.average_resilience
            .partial_cmp(&a.average_resilience)
            .unwrap_or(Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ScenarioConfig {
        ScenarioConfig {
            name: "grid".into(),
            days: 10,
            seed: 100,
            ..ScenarioConfig::default()
        }
    }

    #[test]
    fn test_plan_enumeration_order() {
        let plan = plan_sweep(&base(), &[0.2, 0.8], &[0.1, 0.5], &[0.3, 0.7]);
        assert_eq!(plan.len(), 8);
        assert_eq!(plan[0].scenario.policy, InterventionPolicy::new(0.2, 0.1, 0.3));
        assert_eq!(plan[1].scenario.policy, InterventionPolicy::new(0.2, 0.1, 0.7));
        assert_eq!(plan[2].scenario.policy, InterventionPolicy::new(0.2, 0.5, 0.3));
        assert_eq!(plan[4].scenario.policy, InterventionPolicy::new(0.8, 0.1, 0.3));
        assert_eq!(plan[7].slot, 8);
        assert_eq!(plan[7].scenario.name, "grid-sweep-8");
        assert_eq!(plan[7].scenario.seed, 108);
        assert_eq!(plan[0].scenario.days, 10);
    }

    #[test]
    fn test_empty_level_list_yields_nothing() {
        assert!(sweep(&base(), &[0.5], &[], &[0.5]).is_empty());
    }

    #[test]
    fn test_rank_is_stable_for_ties() {
        let template = engine::run(&base());
        let mut results: Vec<_> = ["a", "b", "c"]
            .iter()
            .zip([0.5, 0.7, 0.5])
            .map(|(name, score)| SimulationResult {
                scenario_name: name.to_string(),
                average_resilience: score,
                ..template.clone()
            })
            .collect();
        rank(&mut results);
        let names: Vec<_> = results.iter().map(|r| r.scenario_name.as_str()).collect();
        assert_eq!(names, ["b", "a", "c"]);
    }
}
