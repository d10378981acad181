//! Spatial model - grid-shaped matrices and distance transforms over the city map

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::city::{CityMap, TileCode};

/// Tile position in the grid. `x` is the column, `y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TilePos {
    pub x: usize,
    pub y: usize,
}

impl TilePos {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Step by a signed offset, `None` when the result leaves the `width`×`height` grid.
    pub fn offset(self, dx: isize, dy: isize, width: usize, height: usize) -> Option<TilePos> {
        let x = self.x.checked_add_signed(dx)?;
        let y = self.y.checked_add_signed(dy)?;
        (x < width && y < height).then_some(TilePos { x, y })
    }

    /// Manhattan distance between two positions
    pub fn manhattan(self, other: TilePos) -> usize {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

/// Row-major grid-shaped mapping from (x, y) to a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    values: Vec<T>,
}

impl<T: Clone> Grid<T> {
    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            values: vec![value; width * height],
        }
    }

    /// Overwrite every cell with `value`.
    pub fn fill(&mut self, value: T) {
        self.values.iter_mut().for_each(|cell| *cell = value.clone());
    }
}

impl<T> Grid<T> {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn contains(&self, pos: TilePos) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    pub fn get(&self, pos: TilePos) -> Option<&T> {
        self.contains(pos)
            .then(|| &self.values[pos.y * self.width + pos.x])
    }

    pub fn get_mut(&mut self, pos: TilePos) -> Option<&mut T> {
        if self.contains(pos) {
            Some(&mut self.values[pos.y * self.width + pos.x])
        } else {
            None
        }
    }

    /// Rows top to bottom, each row left to right.
    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        self.values.chunks(self.width.max(1))
    }

    pub fn iter(&self) -> impl Iterator<Item = (TilePos, &T)> {
        let width = self.width;
        self.values
            .iter()
            .enumerate()
            .map(move |(index, value)| (TilePos::new(index % width, index / width), value))
    }
}

impl<T: Clone> Grid<T> {
    /// Row-major copy as nested vectors, the shape the dashboard renderer reads.
    pub fn to_rows(&self) -> Vec<Vec<T>> {
        self.rows().map(|row| row.to_vec()).collect()
    }
}

/// Neighbouring tiles (4-connectivity)
pub fn neighbors(pos: TilePos, width: usize, height: usize) -> impl Iterator<Item = TilePos> {
    [(0, -1), (0, 1), (-1, 0), (1, 0)]
        .into_iter()
        .filter_map(move |(dx, dy)| pos.offset(dx, dy, width, height))
}

/// Distance from every cell to the nearest tile whose code is in `codes`.
///
/// Multi-source breadth-first flood over 4-neighbours, so on the open city grid this
/// equals the Manhattan distance to the closest source. Cells are `None` when the map
/// holds no tile of the requested types.
pub fn distances_to_tile_types(map: &CityMap, codes: &[TileCode]) -> Grid<Option<u32>> {
    let (width, height) = (map.width(), map.height());
    let mut distances = Grid::filled(width, height, None);
    let mut queue = VecDeque::new();

    for (pos, code) in map.cells() {
        if codes.contains(&code) {
            if let Some(cell) = distances.get_mut(pos) {
                *cell = Some(0);
            }
            queue.push_back(pos);
        }
    }

    while let Some(pos) = queue.pop_front() {
        let Some(&Some(current)) = distances.get(pos) else {
            continue;
        };
        for next in neighbors(pos, width, height) {
            if let Some(cell) = distances.get_mut(next) {
                if cell.is_none() {
                    *cell = Some(current + 1);
                    queue.push_back(next);
                }
            }
        }
    }

    distances
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_stays_in_bounds() {
        let pos = TilePos::new(0, 3);
        assert_eq!(pos.offset(-1, 0, 4, 4), None);
        assert_eq!(pos.offset(0, 1, 4, 4), None);
        assert_eq!(pos.offset(1, -1, 4, 4), Some(TilePos::new(1, 2)));
    }

    #[test]
    fn test_grid_access() {
        let mut grid = Grid::filled(3, 2, 0_u8);
        *grid.get_mut(TilePos::new(2, 1)).unwrap() = 7;

        assert_eq!(grid.get(TilePos::new(2, 1)), Some(&7));
        assert_eq!(grid.get(TilePos::new(3, 0)), None);
        assert_eq!(grid.to_rows(), vec![vec![0, 0, 0], vec![0, 0, 7]]);

        grid.fill(1);
        assert!(grid.iter().all(|(_, value)| *value == 1));
    }

    #[test]
    fn test_neighbors() {
        let corner: Vec<_> = neighbors(TilePos::new(0, 0), 10, 5).collect();
        assert_eq!(corner.len(), 2);

        let middle: Vec<_> = neighbors(TilePos::new(5, 2), 10, 5).collect();
        assert_eq!(middle.len(), 4);
    }

    #[test]
    fn test_distance_transform_matches_manhattan() {
        let mut map = CityMap::new(6, 5);
        map.set(TilePos::new(1, 1), 4).unwrap();
        map.set(TilePos::new(5, 4), 4).unwrap();

        let distances = distances_to_tile_types(&map, &[4]);
        for (pos, distance) in distances.iter() {
            let expected = pos
                .manhattan(TilePos::new(1, 1))
                .min(pos.manhattan(TilePos::new(5, 4)));
            assert_eq!(*distance, Some(expected as u32), "at {pos:?}");
        }
    }

    #[test]
    fn test_distance_transform_without_sources() {
        let map = CityMap::new(4, 4);
        let distances = distances_to_tile_types(&map, &[9]);
        assert!(distances.iter().all(|(_, d)| d.is_none()));
    }
}
