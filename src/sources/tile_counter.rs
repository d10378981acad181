use std::any::Any;

use anyhow::Result;

use crate::{
    city::{CityMap, TileCode},
    config::TileTypes,
    engine::{DataSource, RefreshContext, Variable},
    power::naive_fleet_power_kw,
    turbine::TurbineIds,
};

/// Zone counts per tile type and the plain turbine "energy gain" counter.
pub struct TileCounter {
    tile_types: Vec<(TileCode, String)>,
    turbines: TurbineIds,
    counts: Vec<usize>,
    total: usize,
    energy_gain_kw: f64,
}

impl TileCounter {
    pub fn new(tile_types: &TileTypes, turbines: TurbineIds) -> Self {
        let tile_types: Vec<_> = tile_types
            .iter()
            .map(|(code, name)| (code, name.to_string()))
            .collect();
        Self {
            counts: vec![0; tile_types.len()],
            tile_types,
            turbines,
            total: 0,
            energy_gain_kw: 0.0,
        }
    }

    pub fn count(&self, type_name: &str) -> usize {
        self.tile_types
            .iter()
            .zip(&self.counts)
            .find(|((_, name), _)| name == type_name)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    /// Share of all tiles with the given type, in percent.
    pub fn share(&self, type_name: &str) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.count(type_name) as f64 / self.total as f64 * 100.0
    }

    pub fn energy_gain_kw(&self) -> f64 {
        self.energy_gain_kw
    }
}

impl DataSource for TileCounter {
    fn name(&self) -> &str {
        "tile-counter"
    }

    fn calculate(&mut self, ctx: &RefreshContext, map: &CityMap) -> Result<()> {
        self.counts.iter_mut().for_each(|count| *count = 0);
        for (_, code) in map.cells() {
            if let Some(index) = self.tile_types.iter().position(|(c, _)| *c == code) {
                self.counts[index] += 1;
            }
        }
        self.total = map.width() * map.height();

        let small = map.count_of(self.turbines.small);
        let big = map.count_of(self.turbines.big);
        self.energy_gain_kw = naive_fleet_power_kw(small, big, ctx.wind.speed_m_s()).round();
        Ok(())
    }

    fn variables(&self) -> Vec<(String, Variable)> {
        let mut variables: Vec<_> = self
            .tile_types
            .iter()
            .zip(&self.counts)
            .map(|((_, name), count)| {
                (format!("zones-{name}-count"), Variable::Int(*count as i64))
            })
            .collect();
        variables.push((
            "energy-gain".to_string(),
            Variable::Float(self.energy_gain_kw),
        ));
        variables
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CityConfig;
    use crate::spatial::TilePos;
    use crate::wind::{Compass, WindConditions};

    #[test]
    fn counts_tiles_and_energy_gain() {
        let config = CityConfig::standard();
        let codes = config.tile_codes().unwrap();
        let mut counter = TileCounter::new(&config.tile_types, codes.turbines);

        let mut map = CityMap::new(4, 4);
        map.set(TilePos::new(0, 0), codes.turbines.small).unwrap();
        map.set(TilePos::new(1, 0), codes.turbines.big).unwrap();
        map.set(TilePos::new(2, 0), codes.residential).unwrap();

        // 54 km/h = 15 m/s, both classes at rated power.
        let wind = WindConditions::new(Compass::N, 54.0);
        let ctx = RefreshContext {
            refresh: 1,
            revision: map.revision(),
            wind: &wind,
            city_name: "test",
        };
        counter.calculate(&ctx, &map).unwrap();

        assert_eq!(counter.count("windTurbineSmall"), 1);
        assert_eq!(counter.count("residential"), 1);
        assert_eq!(counter.count("water"), 0);
        assert_eq!(counter.share("windTurbineBig"), 6.25);
        assert_eq!(counter.energy_gain_kw(), 6500.0);

        let variables = counter.variables();
        assert!(variables.contains(&("zones-windTurbineBig-count".to_string(), Variable::Int(1))));
        assert!(variables.contains(&("energy-gain".to_string(), Variable::Float(6500.0))));
    }
}
