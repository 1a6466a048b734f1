//! Paced, incremental runs for terminals and streaming clients.

use std::{ops::ControlFlow, time::Duration};

use crate::{
    config::ScenarioConfig,
    engine::DayStream,
    world::{DayState, SimulationResult},
};

#[derive(Debug, Clone, Copy)]
pub struct LiveOptions {
    pub interval: Duration,
    /// Overrides `config.days` when set.
    pub max_days: Option<u32>,
}

impl Default for LiveOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(250),
            max_days: None,
        }
    }
}

/// Emits each day to `on_day` as it is produced, pausing between days.
///
/// The day source is the same [`DayStream`] a batch run drains, so the result
/// equals `engine::run_days(config, days)` for the same day count. Returning
/// [`ControlFlow::Break`] from `on_day` stops the run early; the result then
/// covers only the days already emitted.
pub async fn run_live<F>(
    config: &ScenarioConfig,
    options: LiveOptions,
    mut on_day: F,
) -> SimulationResult
where
    F: FnMut(&DayState, &[DayState]) -> ControlFlow<()>,
{
    let days = options.max_days.unwrap_or(config.days);
    let mut timeline = Vec::with_capacity(days as usize);
    for day in DayStream::new(config, days) {
        timeline.push(day);
        if let Some(latest) = timeline.last() {
            if on_day(latest, &timeline).is_break() {
                tracing::debug!(scenario = %config.name, day = latest.day, "live run stopped early");
                break;
            }
        }
        if options.interval.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(options.interval).await;
        }
    }
    SimulationResult::from_timeline(config, timeline)
}

/// Plain-text frame for one live day.
pub fn render_live_frame(
    scenario_name: &str,
    total_days: u32,
    interval_ms: u64,
    day: &DayState,
) -> String {
    let mut lines = vec![
        "Chaos Garden Lab — LIVE".to_string(),
        format!("Scenario: {scenario_name}"),
        format!("Day {}/{} | Tick {}ms", day.day, total_days, interval_ms),
        String::new(),
        format!("Resilience : {:.4}", day.resilience_score),
        format!("Pests      : {:.3}", day.pests),
        format!("Pollinators: {:.3}", day.pollinators),
        format!("Crop health: {:.4}", day.crop_health),
        format!("Soil moist.: {:.4}", day.soil_moisture),
        format!("Weather str: {:.4}", day.weather_stress),
    ];

    if let Some(neighborhoods) = day.neighborhoods.as_ref().filter(|n| !n.is_empty()) {
        lines.push(String::new());
        lines.push("Neighborhood snapshots".to_string());
        for n in neighborhoods {
            lines.push(format!(
                "- {}: res={:.4} pests={:.3} poll={:.3} crop={:.4}",
                n.name, n.resilience_score, n.pests, n.pollinators, n.crop_health
            ));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine;

    #[tokio::test]
    async fn test_on_day_sees_growing_timeline() {
        let config = ScenarioConfig {
            days: 5,
            ..ScenarioConfig::default()
        };
        let mut seen = Vec::new();
        let options = LiveOptions {
            interval: Duration::ZERO,
            max_days: None,
        };
        let result = run_live(&config, options, |day, timeline| {
            seen.push((day.day, timeline.len()));
            ControlFlow::Continue(())
        })
        .await;
        assert_eq!(seen, vec![(1, 1), (2, 2), (3, 3), (4, 4), (5, 5)]);
        assert_eq!(result, engine::run(&config));
    }

    #[tokio::test]
    async fn test_break_stops_after_current_day() {
        let config = ScenarioConfig {
            days: 10,
            ..ScenarioConfig::default()
        };
        let options = LiveOptions {
            interval: Duration::ZERO,
            max_days: None,
        };
        let mut calls = 0;
        let result = run_live(&config, options, |day, _| {
            calls += 1;
            if day.day == 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .await;
        assert_eq!(calls, 3);
        assert_eq!(result.days, 3);
        assert_eq!(result, engine::run_days(&config, 3));
    }

    #[test]
    fn test_uniform_frame_has_no_neighborhood_section() {
        let config = ScenarioConfig {
            days: 3,
            ..ScenarioConfig::default()
        };
        let result = engine::run(&config);
        let frame = render_live_frame("plain", 3, 0, &result.timeline[0]);
        assert!(frame.contains("Day 1/3"));
        assert!(frame.contains("Resilience"));
        assert!(!frame.contains("Neighborhood snapshots"));
    }
}
