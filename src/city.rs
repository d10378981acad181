use rand::{seq::SliceRandom, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::spatial::{Grid, TilePos};

/// Integer tile-type code as configured under `tile_types`.
pub type TileCode = u32;

/// Code of an unbuilt tile.
pub const EMPTY_TILE: TileCode = 0;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MapError {
    #[error("tile ({x}, {y}) is outside the {width}x{height} map")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
}

/// Raw city grid of tile-type codes. The wind engine only ever reads it; every write bumps
/// `revision` so callers can tell a refresh is due.
#[derive(Debug, Clone, PartialEq)]
pub struct CityMap {
    cells: Grid<TileCode>,
    revision: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapDefinition {
    pub width: usize,
    pub height: usize,
    /// Rows top to bottom. Omit to start from an empty map.
    #[serde(default)]
    pub cells: Vec<Vec<TileCode>>,
}

impl CityMap {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            cells: Grid::filled(width, height, EMPTY_TILE),
            revision: 0,
        }
    }

    pub fn from_rows(rows: &[Vec<TileCode>]) -> Self {
        let height = rows.len();
        let width = rows.first().map(Vec::len).unwrap_or(0);
        let mut map = Self::new(width, height);
        for (y, row) in rows.iter().enumerate() {
            for (x, &code) in row.iter().enumerate().take(width) {
                if let Some(cell) = map.cells.get_mut(TilePos::new(x, y)) {
                    *cell = code;
                }
            }
        }
        map
    }

    pub fn width(&self) -> usize {
        self.cells.width()
    }

    pub fn height(&self) -> usize {
        self.cells.height()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get(&self, pos: TilePos) -> Option<TileCode> {
        self.cells.get(pos).copied()
    }

    pub fn set(&mut self, pos: TilePos, code: TileCode) -> Result<(), MapError> {
        let (width, height) = (self.width(), self.height());
        let cell = self.cells.get_mut(pos).ok_or(MapError::OutOfBounds {
            x: pos.x,
            y: pos.y,
            width,
            height,
        })?;
        *cell = code;
        self.revision += 1;
        Ok(())
    }

    /// Every cell in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (TilePos, TileCode)> + '_ {
        self.cells.iter().map(|(pos, code)| (pos, *code))
    }

    pub fn count_of(&self, code: TileCode) -> usize {
        self.cells().filter(|(_, c)| *c == code).count()
    }

    pub fn to_rows(&self) -> Vec<Vec<TileCode>> {
        self.cells.to_rows()
    }

    /// Place up to `count` tiles of `code` on randomly chosen empty cells.
    ///
    /// Deterministic for a given seed and map. Returns the positions that were filled.
    pub fn scatter(&mut self, seed: u64, count: usize, code: TileCode) -> Vec<TilePos> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut free: Vec<TilePos> = self
            .cells()
            .filter(|(_, c)| *c == EMPTY_TILE)
            .map(|(pos, _)| pos)
            .collect();
        free.shuffle(&mut rng);
        free.truncate(count);
        for pos in &free {
            if let Some(cell) = self.cells.get_mut(*pos) {
                *cell = code;
            }
        }
        if !free.is_empty() {
            self.revision += 1;
        }
        free
    }
}

impl MapDefinition {
    pub fn build(&self) -> CityMap {
        let mut map = CityMap::new(self.width, self.height);
        for (y, row) in self.cells.iter().enumerate().take(self.height) {
            for (x, &code) in row.iter().enumerate().take(self.width) {
                if let Some(cell) = map.cells.get_mut(TilePos::new(x, y)) {
                    *cell = code;
                }
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_out_of_bounds_is_rejected() {
        let mut map = CityMap::new(4, 3);
        let err = map.set(TilePos::new(4, 0), 1).unwrap_err();
        assert_eq!(
            err,
            MapError::OutOfBounds {
                x: 4,
                y: 0,
                width: 4,
                height: 3
            }
        );
        assert_eq!(map.revision(), 0);
    }

    #[test]
    fn writes_bump_revision() {
        let mut map = CityMap::new(4, 3);
        map.set(TilePos::new(1, 2), 5).unwrap();
        map.set(TilePos::new(1, 2), 5).unwrap();
        assert_eq!(map.revision(), 2);
        assert_eq!(map.get(TilePos::new(1, 2)), Some(5));
        assert_eq!(map.count_of(5), 1);
    }

    #[test]
    fn from_rows_is_row_major() {
        let map = CityMap::from_rows(&[vec![1, 2, 3], vec![4, 5, 6]]);
        assert_eq!(map.width(), 3);
        assert_eq!(map.height(), 2);
        assert_eq!(map.get(TilePos::new(2, 0)), Some(3));
        assert_eq!(map.get(TilePos::new(0, 1)), Some(4));
    }

    #[test]
    fn definition_without_cells_is_empty() {
        let definition = MapDefinition {
            width: 3,
            height: 2,
            cells: Vec::new(),
        };
        let map = definition.build();
        assert_eq!(map.to_rows(), vec![vec![0, 0, 0], vec![0, 0, 0]]);
    }

    #[test]
    fn scatter_is_deterministic_and_only_fills_empty_cells() {
        let mut a = CityMap::new(8, 8);
        a.set(TilePos::new(0, 0), 3).unwrap();
        let mut b = a.clone();

        let placed_a = a.scatter(11, 10, 7);
        let placed_b = b.scatter(11, 10, 7);

        assert_eq!(placed_a, placed_b);
        assert_eq!(a.count_of(7), 10);
        assert_eq!(a.get(TilePos::new(0, 0)), Some(3));
    }
}
