use serde::{Deserialize, Serialize};

use crate::city::TileCode;

/// Wind turbine size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurbineClass {
    /// Enercon E-70 E4, 71 m rotor, 2.3 MW rated.
    Small,
    /// Enercon E-141 EP4, 141 m rotor, 4.2 MW rated.
    Big,
}

impl TurbineClass {
    pub const ALL: [TurbineClass; 2] = [TurbineClass::Small, TurbineClass::Big];

    pub(crate) fn index(self) -> usize {
        match self {
            TurbineClass::Small => 0,
            TurbineClass::Big => 1,
        }
    }
}

/// Tile codes of the two turbine classes, resolved once from the tile type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurbineIds {
    pub small: TileCode,
    pub big: TileCode,
}

impl TurbineIds {
    pub fn classify(&self, code: TileCode) -> Option<TurbineClass> {
        if code == self.small {
            Some(TurbineClass::Small)
        } else if code == self.big {
            Some(TurbineClass::Big)
        } else {
            None
        }
    }

    pub fn code(&self, class: TurbineClass) -> TileCode {
        match class {
            TurbineClass::Small => self.small,
            TurbineClass::Big => self.big,
        }
    }
}
