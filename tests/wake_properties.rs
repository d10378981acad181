use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use windgrid::{
    config::CityConfig,
    engine::DataManagerBuilder,
    sources::{WakeLossCalculator, NO_LOSS},
    spatial::TilePos,
    turbine::TurbineIds,
    wind::{Compass, WindConditions, WindDirection},
    CityMap,
};

const SMALL: u32 = 5;
const BIG: u32 = 6;

fn calculator() -> WakeLossCalculator {
    WakeLossCalculator::new(TurbineIds {
        small: SMALL,
        big: BIG,
    })
}

/// Sparse layout of turbines, roads and houses.
fn random_map(seed: u64, width: usize, height: usize) -> CityMap {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut map = CityMap::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let code = match rng.gen_range(0..10) {
                0 | 1 => SMALL,
                2 | 3 => BIG,
                4 => 2,
                5 => 3,
                _ => 0,
            };
            map.set(TilePos::new(x, y), code).unwrap();
        }
    }
    map
}

/// Quarter turn clockwise: column `x` becomes row `x`, row `y` becomes column `h - 1 - y`.
fn rotate(map: &CityMap) -> CityMap {
    let (width, height) = (map.width(), map.height());
    let mut rotated = CityMap::new(height, width);
    for (pos, code) in map.cells() {
        rotated
            .set(TilePos::new(height - 1 - pos.y, pos.x), code)
            .unwrap();
    }
    rotated
}

#[test]
fn recalculating_is_idempotent() {
    let calculator = calculator();
    for seed in 0..8 {
        let map = random_map(seed, 16, 16);
        for direction in WindDirection::ALL {
            let first = calculator.calculate(&map, direction);
            let second = calculator.calculate(&map, direction);
            assert_eq!(first, second, "seed {seed}, {direction:?}");
        }
    }
}

#[test]
fn rotating_map_and_wind_rotates_the_losses() {
    let calculator = calculator();
    for seed in 0..8 {
        let map = random_map(seed, 10, 14);
        let rotated = rotate(&map);
        for direction in WindDirection::ALL {
            let before = calculator.calculate(&map, direction);
            let turned = calculator.calculate(&rotated, direction.rotated_clockwise());
            for (pos, loss) in before.losses.iter() {
                let target = TilePos::new(map.height() - 1 - pos.y, pos.x);
                assert_eq!(
                    turned.losses.get(target),
                    Some(loss),
                    "seed {seed}, {direction:?}, {pos:?}"
                );
            }
            assert_eq!(before.counts, turned.counts);
            assert_eq!(before.lifespan_index, turned.lifespan_index);
        }
    }
}

#[test]
fn losses_only_land_on_turbines() {
    let calculator = calculator();
    let map = random_map(42, 16, 16);
    for direction in WindDirection::ALL {
        let report = calculator.calculate(&map, direction);
        for (pos, loss) in report.losses.iter() {
            let code = map.get(pos).unwrap();
            if code != SMALL && code != BIG {
                assert_eq!(*loss, NO_LOSS, "{pos:?}");
            }
        }
        let turbines = map.count_of(SMALL) + map.count_of(BIG);
        assert_eq!(report.energy_losses.len(), turbines);
    }
}

#[test]
fn clearing_the_map_resets_every_output() {
    let config = CityConfig::standard();
    let mut manager = DataManagerBuilder::standard("reset", &config).unwrap().build();
    manager.set_wind(WindConditions::new(Compass::S, 50.0));

    let populated = random_map(3, 16, 16);
    manager.calculate(&populated).unwrap();
    assert_ne!(manager.get("lifespan-index").and_then(|v| v.as_int()), Some(5));

    let empty = CityMap::new(16, 16);
    manager.calculate(&empty).unwrap();
    assert_eq!(manager.get("lifespan-index").and_then(|v| v.as_int()), Some(5));
    assert_eq!(manager.get("distances-index").and_then(|v| v.as_int()), Some(5));
    assert_eq!(manager.get("power-output").and_then(|v| v.as_float()), Some(0.0));
    assert_eq!(manager.get("energy-gain").and_then(|v| v.as_float()), Some(0.0));
    assert_eq!(manager.get("slipstream-groupBigA").and_then(|v| v.as_int()), Some(0));
}

#[test]
fn scatter_is_deterministic_per_seed() {
    let mut first = CityMap::new(12, 12);
    let mut second = CityMap::new(12, 12);
    let a = first.scatter(9, 10, BIG);
    let b = second.scatter(9, 10, BIG);
    assert_eq!(a, b);
    assert_eq!(first, second);
    assert_eq!(first.count_of(BIG), 10);
}
