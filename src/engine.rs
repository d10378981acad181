use std::any::Any;
use std::collections::BTreeMap;
use std::time::Instant;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    city::CityMap,
    config::{CityConfig, ConfigError},
    power::EnergyLoss,
    sources::{SlipstreamData, TileCounter, WindTurbinesData},
    wind::WindConditions,
};

/// A named value a data source publishes to the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Variable {
    Int(i64),
    Float(f64),
    Text(String),
    EnergyLosses(Vec<EnergyLoss>),
}

impl Variable {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Variable::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Variable::Float(value) => Some(*value),
            Variable::Int(value) => Some(*value as f64),
            _ => None,
        }
    }
}

/// A citizen request the dashboard shows while `condition` is false.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Goal {
    pub id: &'static str,
    pub category: &'static str,
    pub priority: u8,
    pub condition: bool,
    /// Share of the way to meeting the goal, 1.0 once met.
    pub progress: f64,
}

pub struct RefreshContext<'a> {
    pub refresh: u64,
    pub revision: u64,
    pub wind: &'a WindConditions,
    pub city_name: &'a str,
}

/// A calculation that is rerun in full whenever the map or the wind changes.
pub trait DataSource: Any + Send {
    fn name(&self) -> &str;

    fn calculate(&mut self, ctx: &RefreshContext, map: &CityMap) -> Result<()>;

    fn variables(&self) -> Vec<(String, Variable)>;

    fn goals(&self) -> Vec<Goal> {
        Vec::new()
    }

    fn as_any(&self) -> &dyn Any;
}

pub struct DataManagerSettings {
    pub city_name: String,
    pub wind: WindConditions,
}

pub struct DataManagerBuilder {
    settings: DataManagerSettings,
    sources: Vec<Box<dyn DataSource>>,
}

impl DataManagerBuilder {
    pub fn new(settings: DataManagerSettings) -> Self {
        Self {
            settings,
            sources: Vec::new(),
        }
    }

    /// Builder preloaded with the slipstream, turbine distance and tile counter sources.
    pub fn standard(city_name: &str, config: &CityConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let codes = config.tile_codes()?;
        let settings = DataManagerSettings {
            city_name: city_name.to_string(),
            wind: WindConditions::from_config(&config.wind),
        };
        Ok(Self::new(settings)
            .with_source(SlipstreamData::new(codes.turbines))
            .with_source(WindTurbinesData::new(codes, config.goals.distances))
            .with_source(TileCounter::new(&config.tile_types, codes.turbines)))
    }

    pub fn with_source(mut self, source: impl DataSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn push_source(&mut self, source: impl DataSource + 'static) {
        self.sources.push(Box::new(source));
    }

    pub fn build(self) -> DataManager {
        DataManager {
            sources: self.sources,
            wind: self.settings.wind,
            city_name: self.settings.city_name,
            refreshes: 0,
            last_revision: None,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SourceRunReport {
    pub name: String,
    pub duration_ms: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct RefreshSummary {
    pub refresh: u64,
    pub revision: u64,
    pub reports: Vec<SourceRunReport>,
}

/// Owns the data sources of one city and recomputes all of them on every trigger.
///
/// Callers must not mutate the map while `calculate` runs; taking `&CityMap` for the
/// duration of the refresh enforces that within one thread.
pub struct DataManager {
    sources: Vec<Box<dyn DataSource>>,
    wind: WindConditions,
    city_name: String,
    refreshes: u64,
    last_revision: Option<u64>,
}

impl DataManager {
    pub fn calculate(&mut self, map: &CityMap) -> Result<RefreshSummary> {
        self.refreshes += 1;
        let ctx = RefreshContext {
            refresh: self.refreshes,
            revision: map.revision(),
            wind: &self.wind,
            city_name: &self.city_name,
        };
        let mut reports = Vec::with_capacity(self.sources.len());
        for source in &mut self.sources {
            let start = Instant::now();
            source.calculate(&ctx, map)?;
            let duration_ms = start.elapsed().as_secs_f64() * 1_000.0;
            debug!(source = source.name(), duration_ms, "data source refreshed");
            reports.push(SourceRunReport {
                name: source.name().to_string(),
                duration_ms,
            });
        }
        self.last_revision = Some(map.revision());
        Ok(RefreshSummary {
            refresh: self.refreshes,
            revision: map.revision(),
            reports,
        })
    }

    /// Recalculate only when the map changed since the last refresh.
    pub fn calculate_if_stale(&mut self, map: &CityMap) -> Result<Option<RefreshSummary>> {
        if self.last_revision == Some(map.revision()) {
            return Ok(None);
        }
        self.calculate(map).map(Some)
    }

    /// Change the wind; the next `calculate_if_stale` always recalculates.
    pub fn set_wind(&mut self, wind: WindConditions) {
        self.wind = wind;
        self.last_revision = None;
    }

    pub fn wind(&self) -> &WindConditions {
        &self.wind
    }

    pub fn city_name(&self) -> &str {
        &self.city_name
    }

    pub fn refreshes(&self) -> u64 {
        self.refreshes
    }

    /// The named variable bundle the dashboard reads.
    pub fn variables(&self) -> BTreeMap<String, Variable> {
        let mut variables = BTreeMap::new();
        variables.insert(
            "wind-direction".to_string(),
            Variable::Text(self.wind.compass.to_string()),
        );
        variables.insert(
            "wind-speed".to_string(),
            Variable::Float(self.wind.speed_kmh),
        );
        for source in &self.sources {
            variables.extend(source.variables());
        }
        variables
    }

    pub fn get(&self, name: &str) -> Option<Variable> {
        self.variables().remove(name)
    }

    pub fn goals(&self) -> Vec<Goal> {
        self.sources.iter().flat_map(|source| source.goals()).collect()
    }

    pub fn source<T: 'static>(&self) -> Option<&T> {
        self.sources
            .iter()
            .find_map(|source| source.as_any().downcast_ref::<T>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wind::Compass;

    #[derive(Default)]
    struct CountingSource {
        calls: u64,
        last_revision: u64,
    }

    impl DataSource for CountingSource {
        fn name(&self) -> &str {
            "counting"
        }

        fn calculate(&mut self, ctx: &RefreshContext, _map: &CityMap) -> Result<()> {
            self.calls += 1;
            self.last_revision = ctx.revision;
            Ok(())
        }

        fn variables(&self) -> Vec<(String, Variable)> {
            vec![("calls".to_string(), Variable::Int(self.calls as i64))]
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn manager() -> DataManager {
        DataManagerBuilder::new(DataManagerSettings {
            city_name: "test".into(),
            wind: WindConditions::new(Compass::S, 18.0),
        })
        .with_source(CountingSource::default())
        .build()
    }

    #[test]
    fn calculate_runs_every_source() {
        let mut manager = manager();
        let map = CityMap::new(2, 2);
        let summary = manager.calculate(&map).unwrap();
        assert_eq!(summary.refresh, 1);
        assert_eq!(summary.reports.len(), 1);
        assert_eq!(summary.reports[0].name, "counting");
        assert_eq!(manager.get("calls"), Some(Variable::Int(1)));
    }

    #[test]
    fn stale_check_skips_unchanged_maps() {
        let mut manager = manager();
        let mut map = CityMap::new(2, 2);
        assert!(manager.calculate_if_stale(&map).unwrap().is_some());
        assert!(manager.calculate_if_stale(&map).unwrap().is_none());

        map.set(crate::spatial::TilePos::new(1, 1), 3).unwrap();
        assert!(manager.calculate_if_stale(&map).unwrap().is_some());
        let source = manager.source::<CountingSource>().unwrap();
        assert_eq!(source.calls, 2);
        assert_eq!(source.last_revision, 1);
    }

    #[test]
    fn wind_change_marks_the_refresh_stale() {
        let mut manager = manager();
        let map = CityMap::new(2, 2);
        assert!(manager.calculate_if_stale(&map).unwrap().is_some());
        assert!(manager.calculate_if_stale(&map).unwrap().is_none());

        manager.set_wind(WindConditions::new(Compass::N, 18.0));
        let summary = manager.calculate_if_stale(&map).unwrap();
        assert_eq!(summary.map(|s| s.refresh), Some(2));
        assert!(manager.calculate_if_stale(&map).unwrap().is_none());
    }

    #[test]
    fn wind_variables_follow_set_wind() {
        let mut manager = manager();
        assert_eq!(
            manager.get("wind-direction"),
            Some(Variable::Text("S".into()))
        );
        manager.set_wind(WindConditions::new(Compass::NW, 7.5));
        assert_eq!(
            manager.get("wind-direction"),
            Some(Variable::Text("NW".into()))
        );
        assert_eq!(manager.get("wind-speed"), Some(Variable::Float(7.5)));
    }
}
