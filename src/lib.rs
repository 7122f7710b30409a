pub mod agents;
pub mod config;
pub mod engine;
pub mod flock;
pub mod io;
pub mod kernel;
pub mod rng;
pub mod vector;
pub mod web;

pub use config::{ConfigError, ScenarioLoader, SimConfig};
pub use engine::{RoundSummary, RunOutcome, Simulation};
pub use vector::Vec2;
