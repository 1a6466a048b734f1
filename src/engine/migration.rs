use crate::world::NeighborhoodState;

/// Pests diffuse at this fraction of the pollinator rate.
pub const PEST_MIGRATION_FACTOR: f64 = 0.7;

/// Nudges each neighborhood's pollinators and pests toward the cross-neighborhood
/// mean. No-op for fewer than two neighborhoods or a non-positive rate.
pub fn migrate(states: &mut [NeighborhoodState], migration_rate: f64) {
    if states.len() < 2 || migration_rate <= 0.0 {
        return;
    }
    let count = states.len() as f64;
    let mean_pollinators = states.iter().map(|n| n.pollinators).sum::<f64>() / count;
    let mean_pests = states.iter().map(|n| n.pests).sum::<f64>() / count;

    for state in states.iter_mut() {
        state.pollinators =
            (state.pollinators + (mean_pollinators - state.pollinators) * migration_rate).max(1.0);
        state.pests = (state.pests
            + (mean_pests - state.pests) * migration_rate * PEST_MIGRATION_FACTOR)
            .max(0.0);
    }
}
