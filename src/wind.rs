//! Wind direction and speed as the dashboard knobs report them

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, WindConfig};

/// Axis-aligned prevailing wind, named after where it blows from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindDirection {
    North,
    East,
    South,
    West,
}

impl WindDirection {
    pub const ALL: [WindDirection; 4] = [
        WindDirection::North,
        WindDirection::East,
        WindDirection::South,
        WindDirection::West,
    ];

    /// Grid step `(dx, dy)` from a turbine towards the turbines that sit upwind of it.
    /// Rows grow southwards, columns eastwards.
    pub fn upwind_step(self) -> (isize, isize) {
        match self {
            WindDirection::North => (0, -1),
            WindDirection::East => (1, 0),
            WindDirection::South => (0, 1),
            WindDirection::West => (-1, 0),
        }
    }

    /// The direction a quarter turn clockwise.
    pub fn rotated_clockwise(self) -> Self {
        match self {
            WindDirection::North => WindDirection::East,
            WindDirection::East => WindDirection::South,
            WindDirection::South => WindDirection::West,
            WindDirection::West => WindDirection::North,
        }
    }
}

/// Eight-point compass rose with the game's German labels (O = Ost).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Compass {
    N,
    NO,
    O,
    SO,
    S,
    SW,
    W,
    NW,
}

impl Compass {
    const ROSE: [Compass; 8] = [
        Compass::N,
        Compass::NO,
        Compass::O,
        Compass::SO,
        Compass::S,
        Compass::SW,
        Compass::W,
        Compass::NW,
    ];

    /// Sector `index` of a rose divided into `divisions` equal sectors, starting at north
    /// and turning clockwise. Sectors between two compass points round to the nearer one.
    pub fn from_sector(index: u32, divisions: u32) -> Self {
        let divisions = divisions.max(1);
        let point = ((index % divisions) as f64 * 8.0 / divisions as f64).round() as usize;
        Self::ROSE[point % 8]
    }

    /// The wake engine only sweeps along the grid axes.
    pub fn cardinal(self) -> Option<WindDirection> {
        match self {
            Compass::N => Some(WindDirection::North),
            Compass::O => Some(WindDirection::East),
            Compass::S => Some(WindDirection::South),
            Compass::W => Some(WindDirection::West),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Compass::N => "N",
            Compass::NO => "NO",
            Compass::O => "O",
            Compass::SO => "SO",
            Compass::S => "S",
            Compass::SW => "SW",
            Compass::W => "W",
            Compass::NW => "NW",
        }
    }
}

impl From<WindDirection> for Compass {
    fn from(direction: WindDirection) -> Self {
        match direction {
            WindDirection::North => Compass::N,
            WindDirection::East => Compass::O,
            WindDirection::South => Compass::S,
            WindDirection::West => Compass::W,
        }
    }
}

impl FromStr for Compass {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "N" => Ok(Compass::N),
            "NO" | "NE" => Ok(Compass::NO),
            "O" | "E" => Ok(Compass::O),
            "SO" | "SE" => Ok(Compass::SO),
            "S" => Ok(Compass::S),
            "SW" => Ok(Compass::SW),
            "W" => Ok(Compass::W),
            "NW" => Ok(Compass::NW),
            _ => Err(ConfigError::UnknownCompass(value.to_string())),
        }
    }
}

impl TryFrom<String> for Compass {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Compass> for String {
    fn from(value: Compass) -> Self {
        value.label().to_string()
    }
}

impl fmt::Display for Compass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Current wind as forwarded from the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindConditions {
    pub compass: Compass,
    pub speed_kmh: f64,
}

impl WindConditions {
    pub fn new(compass: Compass, speed_kmh: f64) -> Self {
        Self {
            compass,
            speed_kmh: speed_kmh.max(0.0),
        }
    }

    pub fn from_config(config: &WindConfig) -> Self {
        Self::new(config.winddirection.default, config.windspeed.default)
    }

    /// Map raw knob positions to wind. Knobs report unbounded turn counts, only the
    /// fractional part of a turn matters.
    pub fn from_knobs(direction_turns: f64, speed_turns: f64, config: &WindConfig) -> Self {
        let divisions = config.winddirection.divisions.max(1);
        let sector = (direction_turns.rem_euclid(1.0) * divisions as f64).floor() as u32;
        let speed_kmh = speed_turns.rem_euclid(1.0) * config.windspeed.max_speed;
        Self::new(Compass::from_sector(sector, divisions), speed_kmh)
    }

    pub fn speed_m_s(&self) -> f64 {
        self.speed_kmh / 3.6
    }

    pub fn direction(&self) -> Option<WindDirection> {
        self.compass.cardinal()
    }
}
