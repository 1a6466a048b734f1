pub mod config;
pub mod engine;
pub mod live;
pub mod report;
pub mod rng;
pub mod scenario;
pub mod stats;
pub mod store;
pub mod sweep;
pub mod web;
pub mod world;

pub use config::{InterventionPolicy, ScenarioConfig};
pub use engine::{run, run_days};
pub use stats::{monte_carlo, MonteCarloSummary};
pub use sweep::sweep;
pub use world::{DayState, SimulationResult};
