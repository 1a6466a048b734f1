//! Day-loop simulation engine.
//!
//! Each run owns its neighborhood states and a single [`LcgStream`]. Per day,
//! every neighborhood is evolved in list order (one draw each), snapshotted,
//! then migration couples the running states. Migration therefore shows up in
//! the next day's snapshot, never the one just produced.

mod evolve;
mod migration;

pub use evolve::evolve;
pub use migration::{migrate, PEST_MIGRATION_FACTOR};

use crate::{
    config::ScenarioConfig,
    rng::LcgStream,
    world::{
        round_to, DayState, NeighborhoodState, SimulationResult, SpatialSummary, SUMMARY_DIGITS,
    },
};

/// Neighborhood layout resolved once at run start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Topology {
    /// One implicit neighborhood; no per-neighborhood breakdown is emitted.
    Uniform,
    Spatial { migration_rate: f64 },
}

impl Topology {
    pub fn resolve(config: &ScenarioConfig) -> (Self, Vec<NeighborhoodState>) {
        match &config.spatial {
            Some(spatial) if !spatial.neighborhoods.is_empty() => {
                let states = spatial
                    .neighborhoods
                    .iter()
                    .map(|neighborhood| NeighborhoodState::from_config(neighborhood, config))
                    .collect();
                (
                    Topology::Spatial {
                        migration_rate: spatial.migration_rate,
                    },
                    states,
                )
            }
            _ => (
                Topology::Uniform,
                vec![NeighborhoodState::implicit(config)],
            ),
        }
    }
}

/// Lazily produces one [`DayState`] per call. Batch and live runs both drain
/// this iterator, so their timelines agree day for day.
pub struct DayStream<'a> {
    config: &'a ScenarioConfig,
    topology: Topology,
    rng: LcgStream,
    states: Vec<NeighborhoodState>,
    day: u32,
    total_days: u32,
}

impl<'a> DayStream<'a> {
    pub fn new(config: &'a ScenarioConfig, total_days: u32) -> Self {
        let (topology, states) = Topology::resolve(config);
        Self {
            config,
            topology,
            rng: LcgStream::new(config.seed),
            states,
            day: 0,
            total_days,
        }
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn total_days(&self) -> u32 {
        self.total_days
    }
}

impl Iterator for DayStream<'_> {
    type Item = DayState;

    fn next(&mut self) -> Option<DayState> {
        if self.day >= self.total_days {
            return None;
        }
        self.day += 1;

        let config = self.config;
        let policy = &config.policy;
        let volatility = config.weather_volatility;
        let mut snapshots = Vec::with_capacity(self.states.len());
        for state in self.states.iter_mut() {
            let draw = self.rng.next_unit();
            snapshots.push(evolve(state, policy, volatility, draw));
        }

        let mut day_state = DayState::aggregate(self.day, &snapshots);
        if let Topology::Spatial { migration_rate } = self.topology {
            migrate(&mut self.states, migration_rate);
            day_state.neighborhoods = Some(snapshots);
        }
        Some(day_state)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total_days.saturating_sub(self.day) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for DayStream<'_> {}

/// Runs the configured number of days. The config must already be validated.
pub fn run(config: &ScenarioConfig) -> SimulationResult {
    run_days(config, config.days)
}

/// Runs `days` days regardless of `config.days`; equivalent to running a copy
/// of the config with `days` set.
pub fn run_days(config: &ScenarioConfig, days: u32) -> SimulationResult {
    let timeline: Vec<DayState> = DayStream::new(config, days).collect();
    let result = SimulationResult::from_timeline(config, timeline);
    tracing::debug!(
        scenario = %result.scenario_name,
        seed = result.seed,
        days = result.days,
        average_resilience = result.average_resilience,
        "simulation finished"
    );
    result
}

impl SimulationResult {
    /// Seals a finished timeline into a result; `days` is the timeline length.
    pub fn from_timeline(config: &ScenarioConfig, timeline: Vec<DayState>) -> Self {
        let average_resilience = if timeline.is_empty() {
            0.0
        } else {
            let total: f64 = timeline.iter().map(|day| day.resilience_score).sum();
            round_to(total / timeline.len() as f64, SUMMARY_DIGITS)
        };
        let spatial = config.spatial.as_ref().map(|spatial| SpatialSummary {
            neighborhood_count: spatial.neighborhoods.len(),
            migration_rate: spatial.migration_rate,
        });
        Self {
            scenario_name: config.name.clone(),
            seed: config.seed,
            days: timeline.len() as u32,
            timeline,
            average_resilience,
            spatial,
        }
    }
}
