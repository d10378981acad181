use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    city::{CityMap, MapDefinition, EMPTY_TILE},
    config::{CityConfig, ConfigError, GoalsConfig, LoggingConfig, TileTypes, WindConfig},
    engine::{DataManager, DataManagerBuilder},
};

/// A city definition: tile set, rules, wind knobs and the starting map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub seed: u64,
    /// Refreshes between dashboard snapshots, 0 disables them.
    #[serde(default)]
    pub snapshot_interval: u64,
    pub tile_types: TileTypes,
    #[serde(default)]
    pub goals: GoalsConfig,
    #[serde(default)]
    pub wind: WindConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub map: MapDefinition,
}

impl Scenario {
    pub fn config(&self) -> CityConfig {
        CityConfig {
            tile_types: self.tile_types.clone(),
            goals: self.goals.clone(),
            wind: self.wind,
            logging: self.logging.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.config().validate()?;

        let MapDefinition {
            width,
            height,
            cells,
        } = &self.map;
        if *width == 0 || *height == 0 {
            return Err(ConfigError::InvalidMap(format!(
                "map must not be empty, got {width}x{height}"
            )));
        }
        if cells.is_empty() {
            return Ok(());
        }
        if cells.len() != *height {
            return Err(ConfigError::InvalidMap(format!(
                "expected {height} rows, found {}",
                cells.len()
            )));
        }
        for (y, row) in cells.iter().enumerate() {
            if row.len() != *width {
                return Err(ConfigError::InvalidMap(format!(
                    "row {y} has {} cells, expected {width}",
                    row.len()
                )));
            }
            if let Some(code) = row
                .iter()
                .find(|code| **code != EMPTY_TILE && !self.tile_types.0.contains_key(*code))
            {
                return Err(ConfigError::InvalidMap(format!(
                    "row {y} uses unknown tile code {code}"
                )));
            }
        }
        Ok(())
    }

    pub fn build_city(&self) -> CityMap {
        self.map.build()
    }

    pub fn data_manager(&self) -> Result<DataManager, ConfigError> {
        Ok(DataManagerBuilder::standard(&self.name, &self.config())?.build())
    }
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let scenario = Self::parse(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        debug!(
            scenario = %scenario.name,
            width = scenario.map.width,
            height = scenario.map.height,
            "scenario loaded"
        );
        Ok(scenario)
    }

    pub fn parse(data: &str) -> Result<Scenario> {
        let scenario: Scenario = serde_yaml::from_str(data)?;
        scenario.validate()?;
        Ok(scenario)
    }
}
