use crate::config::InterventionPolicy;
use crate::world::{round_to, NeighborhoodDayState, NeighborhoodState, COUNT_DIGITS, RATIO_DIGITS};

pub(crate) fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Advances one neighborhood by one day using exactly one random draw.
///
/// The running state keeps full precision; only the returned snapshot is
/// rounded (4 decimals for ratios, 3 for counts).
pub fn evolve(
    state: &mut NeighborhoodState,
    policy: &InterventionPolicy,
    weather_volatility: f64,
    draw: f64,
) -> NeighborhoodDayState {
    let weather_stress =
        clamp01(0.5 + (draw * 2.0 - 1.0) * weather_volatility + state.weather_modifier);

    state.soil_moisture = clamp01(
        state.soil_moisture + policy.watering_budget * 0.08 * state.moisture_retention
            - weather_stress * 0.06,
    );

    let pest_growth = (0.03 + weather_stress * 0.05) * (1.0 - policy.pesticide_cap * 0.7);
    let predation = state.pollinators / 2000.0 * 0.2;
    state.pests = (state.pests * (1.0 + pest_growth - predation)).max(0.0);

    let pollinator_growth = 0.01 + policy.corridor_investment * 0.05 + state.soil_moisture * 0.03
        - weather_stress * 0.02
        - state.pests / 5000.0;
    state.pollinators = (state.pollinators * (1.0 + pollinator_growth)).max(1.0);

    state.crop_health = clamp01(
        state.crop_health + 0.02 + state.pollinators / 3000.0 + state.soil_moisture * 0.04
            - weather_stress * 0.06
            - state.pests / 4000.0,
    );

    let resilience_score = clamp01(
        0.45 * state.crop_health
            + 0.25 * clamp01(state.pollinators / 300.0)
            + 0.2 * state.soil_moisture
            + 0.1 * (1.0 - clamp01(state.pests / 300.0)),
    );

    NeighborhoodDayState {
        name: state.name.clone(),
        weather_stress: round_to(weather_stress, RATIO_DIGITS),
        soil_moisture: round_to(state.soil_moisture, RATIO_DIGITS),
        pollinators: round_to(state.pollinators, COUNT_DIGITS),
        pests: round_to(state.pests, COUNT_DIGITS),
        crop_health: round_to(state.crop_health, RATIO_DIGITS),
        resilience_score: round_to(resilience_score, RATIO_DIGITS),
    }
}
