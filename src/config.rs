//! Static city configuration: tile types, distance goals, wind knobs, logging

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::city::TileCode;
use crate::turbine::{TurbineClass, TurbineIds};
use crate::wind::Compass;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("no tile type named '{0}' is configured")]
    MissingTileType(String),
    #[error("invalid map: {0}")]
    InvalidMap(String),
    #[error("distance goal '{key}' must be at least 1, got {value}")]
    InvalidThreshold { key: &'static str, value: u32 },
    #[error("unknown compass direction '{0}'")]
    UnknownCompass(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileTypeConfig {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub label: Option<String>,
}

/// Tile type table keyed by tile code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileTypes(pub BTreeMap<TileCode, TileTypeConfig>);

impl TileTypes {
    pub fn id_of(&self, type_name: &str) -> Result<TileCode, ConfigError> {
        self.0
            .iter()
            .find(|(_, tile)| tile.type_name == type_name)
            .map(|(code, _)| *code)
            .ok_or_else(|| ConfigError::MissingTileType(type_name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (TileCode, &str)> {
        self.0
            .iter()
            .map(|(code, tile)| (*code, tile.type_name.as_str()))
    }
}

/// Tile codes the wind engine cares about, resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileCodes {
    pub water: TileCode,
    pub road: TileCode,
    pub residential: TileCode,
    pub turbines: TurbineIds,
}

impl TileCodes {
    pub fn resolve(tile_types: &TileTypes) -> Result<Self, ConfigError> {
        Ok(Self {
            water: tile_types.id_of("water")?,
            road: tile_types.id_of("road")?,
            residential: tile_types.id_of("residential")?,
            turbines: TurbineIds {
                small: tile_types.id_of("windTurbineSmall")?,
                big: tile_types.id_of("windTurbineBig")?,
            },
        })
    }
}

fn default_small_water_roads() -> u32 {
    1
}

fn default_small_residentials() -> u32 {
    2
}

fn default_big_water_roads() -> u32 {
    2
}

fn default_big_residentials() -> u32 {
    3
}

/// Minimum distances (in tiles) a turbine must keep, per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistanceGoals {
    #[serde(
        rename = "windTurbineSmall-distance-water-roads",
        default = "default_small_water_roads"
    )]
    pub small_water_roads: u32,
    #[serde(
        rename = "windTurbineSmall-distance-residentials",
        default = "default_small_residentials"
    )]
    pub small_residentials: u32,
    #[serde(
        rename = "windTurbineBig-distance-water-roads",
        default = "default_big_water_roads"
    )]
    pub big_water_roads: u32,
    #[serde(
        rename = "windTurbineBig-distance-residentials",
        default = "default_big_residentials"
    )]
    pub big_residentials: u32,
}

impl Default for DistanceGoals {
    fn default() -> Self {
        Self {
            small_water_roads: default_small_water_roads(),
            small_residentials: default_small_residentials(),
            big_water_roads: default_big_water_roads(),
            big_residentials: default_big_residentials(),
        }
    }
}

impl DistanceGoals {
    pub fn water_roads(&self, class: TurbineClass) -> u32 {
        match class {
            TurbineClass::Small => self.small_water_roads,
            TurbineClass::Big => self.big_water_roads,
        }
    }

    pub fn residentials(&self, class: TurbineClass) -> u32 {
        match class {
            TurbineClass::Small => self.small_residentials,
            TurbineClass::Big => self.big_residentials,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("windTurbineSmall-distance-water-roads", self.small_water_roads),
            ("windTurbineSmall-distance-residentials", self.small_residentials),
            ("windTurbineBig-distance-water-roads", self.big_water_roads),
            ("windTurbineBig-distance-residentials", self.big_residentials),
        ];
        for (key, value) in checks {
            if value == 0 {
                return Err(ConfigError::InvalidThreshold { key, value });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoalsConfig {
    #[serde(default)]
    pub distances: DistanceGoals,
}

fn default_compass() -> Compass {
    Compass::N
}

fn default_divisions() -> u32 {
    8
}

fn default_max_speed() -> f64 {
    100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionKnob {
    #[serde(default = "default_compass")]
    pub default: Compass,
    #[serde(default = "default_divisions")]
    pub divisions: u32,
}

impl Default for DirectionKnob {
    fn default() -> Self {
        Self {
            default: default_compass(),
            divisions: default_divisions(),
        }
    }
}

/// Speeds in km/h.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedKnob {
    #[serde(default)]
    pub default: f64,
    #[serde(default = "default_max_speed")]
    pub max_speed: f64,
}

impl Default for SpeedKnob {
    fn default() -> Self {
        Self {
            default: 0.0,
            max_speed: default_max_speed(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindConfig {
    #[serde(default)]
    pub winddirection: DirectionKnob,
    #[serde(default)]
    pub windspeed: SpeedKnob,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Everything the data sources need besides the map itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityConfig {
    pub tile_types: TileTypes,
    #[serde(default)]
    pub goals: GoalsConfig,
    #[serde(default)]
    pub wind: WindConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CityConfig {
    pub fn tile_codes(&self) -> Result<TileCodes, ConfigError> {
        TileCodes::resolve(&self.tile_types)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tile_codes()?;
        self.goals.distances.validate()
    }

    /// The default tile set of the 16×16 game board.
    pub fn standard() -> Self {
        let names = [
            (1, "water"),
            (2, "road"),
            (3, "residential"),
            (4, "park"),
            (5, "windTurbineSmall"),
            (6, "windTurbineBig"),
        ];
        let tile_types = names
            .into_iter()
            .map(|(code, name)| {
                (
                    code,
                    TileTypeConfig {
                        type_name: name.to_string(),
                        label: None,
                    },
                )
            })
            .collect();
        Self {
            tile_types: TileTypes(tile_types),
            goals: GoalsConfig::default(),
            wind: WindConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
