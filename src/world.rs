use serde::{Deserialize, Serialize};

use crate::config::{NeighborhoodConfig, ScenarioConfig};

/// Mutable per-neighborhood working state. Lives only inside one engine run
/// and is never rounded; only snapshots carry display precision.
#[derive(Debug, Clone)]
pub struct NeighborhoodState {
    pub name: String,
    pub weather_modifier: f64,
    pub moisture_retention: f64,
    pub pollinators: f64,
    pub pests: f64,
    pub crop_health: f64,
    pub soil_moisture: f64,
}

impl NeighborhoodState {
    pub fn implicit(config: &ScenarioConfig) -> Self {
        Self {
            name: "default".to_string(),
            weather_modifier: 0.0,
            moisture_retention: 1.0,
            pollinators: config.initial_pollinators,
            pests: config.initial_pests,
            crop_health: config.initial_crop_health,
            soil_moisture: config.initial_soil_moisture,
        }
    }

    pub fn from_config(neighborhood: &NeighborhoodConfig, config: &ScenarioConfig) -> Self {
        Self {
            name: neighborhood.name.clone(),
            weather_modifier: neighborhood.weather_modifier,
            moisture_retention: neighborhood.moisture_retention,
            pollinators: neighborhood
                .initial_pollinators
                .unwrap_or(config.initial_pollinators),
            pests: neighborhood.initial_pests.unwrap_or(config.initial_pests),
            crop_health: neighborhood
                .initial_crop_health
                .unwrap_or(config.initial_crop_health),
            soil_moisture: neighborhood
                .initial_soil_moisture
                .unwrap_or(config.initial_soil_moisture),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborhoodDayState {
    pub name: String,
    pub weather_stress: f64,
    pub soil_moisture: f64,
    pub pollinators: f64,
    pub pests: f64,
    pub crop_health: f64,
    pub resilience_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayState {
    pub day: u32,
    pub weather_stress: f64,
    pub soil_moisture: f64,
    pub pollinators: f64,
    pub pests: f64,
    pub crop_health: f64,
    pub resilience_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighborhoods: Option<Vec<NeighborhoodDayState>>,
}

impl DayState {
    /// Arithmetic mean of each metric across the day's neighborhood snapshots.
    pub fn aggregate(day: u32, snapshots: &[NeighborhoodDayState]) -> Self {
        Self {
            day,
            weather_stress: round_to(mean_of(snapshots, |n| n.weather_stress), RATIO_DIGITS),
            soil_moisture: round_to(mean_of(snapshots, |n| n.soil_moisture), RATIO_DIGITS),
            pollinators: round_to(mean_of(snapshots, |n| n.pollinators), COUNT_DIGITS),
            pests: round_to(mean_of(snapshots, |n| n.pests), COUNT_DIGITS),
            crop_health: round_to(mean_of(snapshots, |n| n.crop_health), RATIO_DIGITS),
            resilience_score: round_to(mean_of(snapshots, |n| n.resilience_score), RATIO_DIGITS),
            neighborhoods: None,
        }
    }
}

fn mean_of(snapshots: &[NeighborhoodDayState], metric: fn(&NeighborhoodDayState) -> f64) -> f64 {
    let count = snapshots.len().max(1) as f64;
    snapshots.iter().map(metric).sum::<f64>() / count
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpatialSummary {
    pub neighborhood_count: usize,
    pub migration_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub scenario_name: String,
    pub seed: u64,
    pub days: u32,
    pub timeline: Vec<DayState>,
    pub average_resilience: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spatial: Option<SpatialSummary>,
}

impl SimulationResult {
    pub fn final_resilience(&self) -> f64 {
        self.timeline
            .last()
            .map(|day| day.resilience_score)
            .unwrap_or(self.average_resilience)
    }
}

pub(crate) const RATIO_DIGITS: usize = 4;
pub(crate) const COUNT_DIGITS: usize = 3;
pub(crate) const SUMMARY_DIGITS: usize = 6;

/// Digits past the rounding position inspected to spot an exact tie. Any
/// double large enough to round to a non-zero value shows its deviation from
/// a tie well within this window.
const TIE_PROBE_DIGITS: usize = 40;

/// Decimal rounding on the exact binary value. Values exactly halfway between
/// two candidates round away from zero; everything else rounds to nearest.
pub fn round_to(value: f64, digits: usize) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let magnitude = value.abs();
    let expanded = format!("{:.*}", digits + TIE_PROBE_DIGITS, magnitude);
    let (kept, rest) = expanded.split_at(expanded.len() - TIE_PROBE_DIGITS);
    let is_tie = rest.starts_with('5') && rest[1..].bytes().all(|b| b == b'0');
    let text = if is_tie {
        increment_decimal(kept.trim_end_matches('.'))
    } else {
        format!("{magnitude:.digits$}")
    };
    let rounded: f64 = text.parse().unwrap_or(magnitude);
    if value.is_sign_negative() {
        -rounded
    } else {
        rounded
    }
}

/// Adds one unit in the last place of a plain decimal string.
fn increment_decimal(text: &str) -> String {
    let mut chars: Vec<char> = text.chars().collect();
    for slot in chars.iter_mut().rev() {
        match *slot {
            '.' => {}
            '9' => *slot = '0',
            digit => {
                *slot = (digit as u8 + 1) as char;
                return chars.into_iter().collect();
            }
        }
    }
    std::iter::once('1').chain(chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(name: &str, resilience: f64, pollinators: f64) -> NeighborhoodDayState {
        NeighborhoodDayState {
            name: name.into(),
            weather_stress: 0.5,
            soil_moisture: 0.6,
            pollinators,
            pests: 10.0,
            crop_health: 0.7,
            resilience_score: resilience,
        }
    }

    #[test]
    fn test_round_to_precision() {
        assert_eq!(round_to(0.123456, 4), 0.1235);
        assert_eq!(round_to(120.00049, 3), 120.0);
        assert_eq!(round_to(1.0, 6), 1.0);
    }

    #[test]
    fn test_exact_ties_round_away_from_zero() {
        assert_eq!(round_to(0.03125, 4), 0.0313);
        assert_eq!(round_to(120.0625, 3), 120.063);
        assert_eq!(round_to(0.09375, 4), 0.0938);
        assert_eq!(round_to(99.99951171875, 10), 99.9995117188);
        assert_eq!(round_to(19.5, 0), 20.0);
        assert_eq!(round_to(-0.03125, 4), -0.0313);
        // binary value of 0.12345 sits just above the tie
        assert_eq!(round_to(0.12345, 4), 0.1235);
    }

    #[test]
    fn test_increment_carries() {
        assert_eq!(increment_decimal("0.0999"), "0.1000");
        assert_eq!(increment_decimal("9.99"), "10.00");
    }

    #[test]
    fn test_aggregate_is_mean() {
        let day = DayState::aggregate(3, &[snapshot("a", 0.4, 100.0), snapshot("b", 0.6, 151.0)]);
        assert_eq!(day.day, 3);
        assert_eq!(day.resilience_score, 0.5);
        assert_eq!(day.pollinators, 125.5);
        assert!(day.neighborhoods.is_none());
    }

    #[test]
    fn test_implicit_neighborhood_uses_scenario_values() {
        let config = ScenarioConfig::default();
        let state = NeighborhoodState::implicit(&config);
        assert_eq!(state.name, "default");
        assert_eq!(state.moisture_retention, 1.0);
        assert_eq!(state.pollinators, config.initial_pollinators);
    }

    #[test]
    fn test_neighborhood_overrides_fall_back() {
        let config = ScenarioConfig::default();
        let mut neighborhood = NeighborhoodConfig::named("north");
        neighborhood.initial_pests = Some(5.0);
        let state = NeighborhoodState::from_config(&neighborhood, &config);
        assert_eq!(state.pests, 5.0);
        assert_eq!(state.crop_health, config.initial_crop_health);
    }
}
