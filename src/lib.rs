pub mod city;
pub mod config;
pub mod engine;
pub mod power;
pub mod scenario;
pub mod snapshot;
pub mod sources;
pub mod spatial;
pub mod turbine;
pub mod web;
pub mod wind;

pub use city::{CityMap, TileCode};
pub use config::{CityConfig, ConfigError};
pub use engine::{DataManager, DataManagerBuilder, DataSource, Variable};
pub use scenario::{Scenario, ScenarioLoader};
pub use sources::{DistanceComplianceChecker, WakeLossCalculator};
pub use wind::{Compass, WindConditions, WindDirection};
