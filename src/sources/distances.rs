//! Placement distance rules for wind turbines.
//!
//! Turbines must keep class-specific minimum distances to water/road tiles and to
//! residential tiles, and must not be crowded by other turbines. Standing exactly at the
//! minimum (when the minimum is more than one tile) is tolerated with goodwill; anything
//! closer is a hard violation and flags the turbine's tile.

use std::any::Any;

use anyhow::Result;
use serde::Serialize;

use crate::{
    city::CityMap,
    config::{DistanceGoals, TileCodes},
    engine::{DataSource, Goal, RefreshContext, Variable},
    spatial::{distances_to_tile_types, Grid, TilePos},
    turbine::TurbineClass,
};

/// Minimum distance to the nearest turbine for every tile around a small turbine.
const SMALL_KERNEL: [[u32; 3]; 3] = [[1, 1, 1], [1, 0, 1], [1, 1, 1]];

/// Same for big turbines; the diagonal ring must also stay clear of other turbines' reach.
const BIG_KERNEL: [[u32; 5]; 5] = [
    [1, 1, 1, 1, 1],
    [1, 2, 1, 2, 1],
    [1, 1, 0, 1, 1],
    [1, 2, 1, 2, 1],
    [1, 1, 1, 1, 1],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Compliant,
    Goodwill,
    TooClose,
}

fn judge(distance: Option<u32>, minimum: u32) -> Verdict {
    match distance {
        Some(d) if d < minimum => Verdict::TooClose,
        Some(d) if d == minimum => {
            if minimum > 1 {
                Verdict::Goodwill
            } else {
                Verdict::TooClose
            }
        }
        _ => Verdict::Compliant,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ViolationCounts {
    pub goodwill: u32,
    pub hard: u32,
}

impl ViolationCounts {
    fn add(&mut self, verdict: Verdict) -> bool {
        match verdict {
            Verdict::Compliant => false,
            Verdict::Goodwill => {
                self.goodwill += 1;
                false
            }
            Verdict::TooClose => {
                self.hard += 1;
                true
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceState {
    /// `true` on turbine tiles with at least one hard violation.
    pub errors: Grid<bool>,
    pub water_roads: ViolationCounts,
    pub residentials: ViolationCounts,
    /// Crowding has no goodwill band; only `hard` is ever non-zero.
    pub turbines: ViolationCounts,
    pub turbine_count: u32,
    pub distances_index: u8,
}

impl ComplianceState {
    fn empty(width: usize, height: usize) -> Self {
        Self {
            errors: Grid::filled(width, height, false),
            water_roads: ViolationCounts::default(),
            residentials: ViolationCounts::default(),
            turbines: ViolationCounts::default(),
            turbine_count: 0,
            distances_index: 5,
        }
    }

    fn derive_index(&self) -> u8 {
        let mut index = 5_i64
            - i64::from(self.residentials.goodwill)
            - i64::from(self.water_roads.goodwill);
        for hard in [
            self.residentials.hard,
            self.water_roads.hard,
            self.turbines.hard,
        ] {
            if hard > 0 {
                index -= 4;
            }
        }
        index.clamp(1, 5) as u8
    }

    pub fn has_error(&self, pos: TilePos) -> bool {
        self.errors.get(pos).copied().unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DistanceComplianceChecker {
    codes: TileCodes,
    goals: DistanceGoals,
}

impl DistanceComplianceChecker {
    pub fn new(codes: TileCodes, goals: DistanceGoals) -> Self {
        Self { codes, goals }
    }

    pub fn calculate(&self, map: &CityMap) -> ComplianceState {
        let turbines = self.codes.turbines;
        let water_roads = distances_to_tile_types(map, &[self.codes.water, self.codes.road]);
        let residentials = distances_to_tile_types(map, &[self.codes.residential]);
        let neighbours = distances_to_tile_types(map, &[turbines.small, turbines.big]);

        let mut state = ComplianceState::empty(map.width(), map.height());
        for (pos, code) in map.cells() {
            let Some(class) = turbines.classify(code) else {
                continue;
            };
            state.turbine_count += 1;

            let mut flagged = state.water_roads.add(judge(
                water_roads.get(pos).copied().flatten(),
                self.goals.water_roads(class),
            ));
            flagged |= state.residentials.add(judge(
                residentials.get(pos).copied().flatten(),
                self.goals.residentials(class),
            ));
            if !kernel_clear(&neighbours, pos, class) {
                state.turbines.hard += 1;
                flagged = true;
            }
            if flagged {
                if let Some(cell) = state.errors.get_mut(pos) {
                    *cell = true;
                }
            }
        }
        state.distances_index = state.derive_index();
        state
    }
}

/// Whether every tile in the class kernel around `pos` is far enough from any turbine.
fn kernel_clear(distances: &Grid<Option<u32>>, pos: TilePos, class: TurbineClass) -> bool {
    let kernel: Vec<&[u32]> = match class {
        TurbineClass::Small => SMALL_KERNEL.iter().map(|row| row.as_slice()).collect(),
        TurbineClass::Big => BIG_KERNEL.iter().map(|row| row.as_slice()).collect(),
    };
    let radius = (kernel.len() / 2) as isize;
    for (row, minima) in kernel.iter().enumerate() {
        for (column, &minimum) in minima.iter().enumerate() {
            let dx = column as isize - radius;
            let dy = row as isize - radius;
            let Some(probe) = pos.offset(dx, dy, distances.width(), distances.height()) else {
                continue;
            };
            if let Some(&Some(distance)) = distances.get(probe) {
                if distance < minimum {
                    return false;
                }
            }
        }
    }
    true
}

/// Data source for turbine placement rules and the distance goals built on them.
pub struct WindTurbinesData {
    checker: DistanceComplianceChecker,
    state: Option<ComplianceState>,
}

impl WindTurbinesData {
    pub fn new(codes: TileCodes, goals: DistanceGoals) -> Self {
        Self {
            checker: DistanceComplianceChecker::new(codes, goals),
            state: None,
        }
    }

    pub fn state(&self) -> Option<&ComplianceState> {
        self.state.as_ref()
    }

    pub fn distances_index(&self) -> u8 {
        self.state
            .as_ref()
            .map(|state| state.distances_index)
            .unwrap_or(5)
    }

    pub fn has_error(&self, pos: TilePos) -> bool {
        self.state
            .as_ref()
            .map(|state| state.has_error(pos))
            .unwrap_or(false)
    }
}

/// Share of turbines not counted in `violations`.
fn compliant_share(violations: u32, turbines: u32) -> f64 {
    if turbines == 0 {
        return 1.0;
    }
    1.0 - f64::from(violations.min(turbines)) / f64::from(turbines)
}

impl DataSource for WindTurbinesData {
    fn name(&self) -> &str {
        "wind-turbines"
    }

    fn calculate(&mut self, _ctx: &RefreshContext, map: &CityMap) -> Result<()> {
        self.state = Some(self.checker.calculate(map));
        Ok(())
    }

    fn variables(&self) -> Vec<(String, Variable)> {
        let hard = self
            .state
            .as_ref()
            .map(|s| s.water_roads.hard + s.residentials.hard + s.turbines.hard)
            .unwrap_or(0);
        vec![
            (
                "distances-index".to_string(),
                Variable::Int(self.distances_index().into()),
            ),
            ("distance-violations".to_string(), Variable::Int(hard.into())),
        ]
    }

    fn goals(&self) -> Vec<Goal> {
        let Some(state) = &self.state else {
            return Vec::new();
        };
        let goal = |id, counts: ViolationCounts| Goal {
            id,
            category: "distance",
            priority: 1,
            condition: counts.hard == 0,
            progress: compliant_share(counts.hard, state.turbine_count),
        };
        vec![
            goal("wind-turbine-distance-road-water-low", state.water_roads),
            goal("wind-turbine-distance-residential-low", state.residentials),
            goal("wind-turbine-distance-wind-turbines-low", state.turbines),
        ]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CityConfig;

    const WATER: u32 = 1;
    const ROAD: u32 = 2;
    const RESIDENTIAL: u32 = 3;
    const SMALL: u32 = 5;
    const BIG: u32 = 6;

    fn checker() -> DistanceComplianceChecker {
        let codes = CityConfig::standard().tile_codes().unwrap();
        DistanceComplianceChecker::new(codes, DistanceGoals::default())
    }

    fn map_with(tiles: &[(usize, usize, u32)]) -> CityMap {
        let mut map = CityMap::new(16, 16);
        for &(x, y, code) in tiles {
            map.set(TilePos::new(x, y), code).unwrap();
        }
        map
    }

    #[test]
    fn judge_bands() {
        assert_eq!(judge(None, 2), Verdict::Compliant);
        assert_eq!(judge(Some(3), 2), Verdict::Compliant);
        assert_eq!(judge(Some(2), 2), Verdict::Goodwill);
        assert_eq!(judge(Some(1), 2), Verdict::TooClose);
        assert_eq!(judge(Some(1), 1), Verdict::TooClose);
    }

    #[test]
    fn lone_turbine_is_compliant() {
        let state = checker().calculate(&map_with(&[(8, 8, BIG)]));
        assert_eq!(state.turbine_count, 1);
        assert_eq!(state.distances_index, 5);
        assert!(state.errors.iter().all(|(_, e)| !*e));
    }

    #[test]
    fn goodwill_costs_one_point_each() {
        // Big turbine exactly 2 from a road and exactly 3 from a house.
        let state = checker().calculate(&map_with(&[(8, 8, BIG), (10, 8, ROAD), (8, 5, RESIDENTIAL)]));
        assert_eq!(state.water_roads, ViolationCounts { goodwill: 1, hard: 0 });
        assert_eq!(state.residentials, ViolationCounts { goodwill: 1, hard: 0 });
        assert_eq!(state.distances_index, 3);
        assert!(!state.has_error(TilePos::new(8, 8)));
    }

    #[test]
    fn small_turbine_next_to_water_is_a_hard_violation() {
        let state = checker().calculate(&map_with(&[(3, 3, SMALL), (3, 4, WATER)]));
        assert_eq!(state.water_roads, ViolationCounts { goodwill: 0, hard: 1 });
        assert!(state.has_error(TilePos::new(3, 3)));
        assert_eq!(state.distances_index, 1);
    }

    #[test]
    fn crowded_turbines_are_flagged() {
        let state = checker().calculate(&map_with(&[(3, 3, SMALL), (4, 4, SMALL)]));
        assert_eq!(state.turbines.hard, 2);
        assert!(state.has_error(TilePos::new(3, 3)));
        assert!(state.has_error(TilePos::new(4, 4)));
        assert_eq!(state.distances_index, 1);
    }

    #[test]
    fn big_turbines_need_a_wider_berth() {
        // Two apart diagonally: fine for small turbines, too close for a big one.
        let state = checker().calculate(&map_with(&[(3, 3, SMALL), (5, 5, SMALL)]));
        assert_eq!(state.turbines.hard, 0);

        let state = checker().calculate(&map_with(&[(3, 3, BIG), (5, 5, SMALL)]));
        assert_eq!(state.turbines.hard, 1);
        assert!(state.has_error(TilePos::new(3, 3)));
        assert!(!state.has_error(TilePos::new(5, 5)));
    }

    #[test]
    fn index_floors_at_one() {
        let state = checker().calculate(&map_with(&[
            (3, 3, BIG),
            (3, 4, RESIDENTIAL),
            (4, 3, WATER),
            (4, 4, BIG),
        ]));
        assert!(state.residentials.hard > 0);
        assert!(state.water_roads.hard > 0);
        assert!(state.turbines.hard > 0);
        assert_eq!(state.distances_index, 1);
    }

    #[test]
    fn goals_track_hard_violations() {
        let codes = CityConfig::standard().tile_codes().unwrap();
        let mut source = WindTurbinesData::new(codes, DistanceGoals::default());
        assert!(source.goals().is_empty());

        source.state = Some(source.checker.calculate(&map_with(&[
            (2, 2, SMALL),
            (2, 3, ROAD),
            (10, 10, SMALL),
        ])));
        let goals = source.goals();
        assert_eq!(goals.len(), 3);
        assert_eq!(goals[0].id, "wind-turbine-distance-road-water-low");
        assert!(!goals[0].condition);
        assert_eq!(goals[0].progress, 0.5);
        assert!(goals[1].condition);
        assert_eq!(goals[2].progress, 1.0);
    }
}
