//! Wake (slipstream) losses between turbines standing in line with the wind.
//!
//! Every turbine looks upwind along the wind axis for the nearest turbine at most
//! [`MAX_GAP`] empty tiles away. Only that nearest turbine matters; its class, the
//! target's class and the number of empty tiles between them select a loss factor
//! from a fixed table. Interference is also tallied by blocking class and gap to
//! derive the fleet lifespan index.

use std::any::Any;

use anyhow::Result;
use serde::Serialize;
use tracing::debug;

use crate::{
    city::CityMap,
    engine::{DataSource, RefreshContext, Variable},
    power::{fleet_power_kw, EnergyLoss},
    spatial::{Grid, TilePos},
    turbine::{TurbineClass, TurbineIds},
    wind::{Compass, WindDirection},
};

/// Largest number of empty tiles a wake still reaches across.
pub const MAX_GAP: usize = 3;

/// Loss factor recorded for a turbine without an upwind neighbour.
pub const NO_LOSS: f64 = 1.0;

/// Loss factor for `target` standing `gap` empty tiles behind `blocker`.
///
/// `None` where the table has no entry: small turbines do not reach across three tiles.
pub fn loss_factor(blocker: TurbineClass, target: TurbineClass, gap: usize) -> Option<f64> {
    use TurbineClass::{Big, Small};

    let row: &[f64] = match (blocker, target) {
        (Big, Big) => &[0.50, 0.39, 0.18, 0.05],
        (Big, Small) => &[0.25, 0.195, 0.09, 0.025],
        (Small, Small) => &[0.25, 0.19, 0.09],
        (Small, Big) => &[0.175, 0.08, 0.018],
    };
    row.get(gap).copied()
}

/// Lifespan weight of one interference, by blocking class and gap.
fn lifespan_weight(blocker: TurbineClass, gap: usize) -> Option<f64> {
    let row: &[f64] = match blocker {
        TurbineClass::Big => &[0.5, 0.4, 0.2, 0.1],
        TurbineClass::Small => &[0.5, 0.3, 0.1],
    };
    row.get(gap).copied()
}

/// Interference tallies of one sweep, indexed `[blocker][target][gap]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InterferenceCounts {
    pairs: [[[u32; MAX_GAP + 1]; 2]; 2],
}

impl InterferenceCounts {
    fn record(&mut self, blocker: TurbineClass, target: TurbineClass, gap: usize) {
        self.pairs[blocker.index()][target.index()][gap] += 1;
    }

    pub fn pair(&self, blocker: TurbineClass, target: TurbineClass, gap: usize) -> u32 {
        self.pairs[blocker.index()][target.index()]
            .get(gap)
            .copied()
            .unwrap_or(0)
    }

    /// Interferences caused by `blocker` turbines at `gap`, whatever the target.
    pub fn group(&self, blocker: TurbineClass, gap: usize) -> u32 {
        TurbineClass::ALL
            .iter()
            .map(|target| self.pair(blocker, *target, gap))
            .sum()
    }

    pub fn total(&self) -> u32 {
        self.pairs.iter().flatten().flatten().sum()
    }

    /// Group tallies under their dashboard names, `groupBigA` (adjacent) to `groupSmallC`.
    pub fn named_groups(&self) -> Vec<(String, u32)> {
        let mut groups = Vec::new();
        for (blocker, label) in [(TurbineClass::Big, "Big"), (TurbineClass::Small, "Small")] {
            for gap in 0..=MAX_GAP {
                if lifespan_weight(blocker, gap).is_some() {
                    let letter = char::from(b'A' + gap as u8);
                    groups.push((format!("group{label}{letter}"), self.group(blocker, gap)));
                }
            }
        }
        groups
    }

    /// Weighted average of all interferences, 0.0 when there are none.
    pub fn lifespan(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let mut weighted = 0.0;
        for blocker in TurbineClass::ALL {
            for gap in 0..=MAX_GAP {
                if let Some(weight) = lifespan_weight(blocker, gap) {
                    weighted += weight * self.group(blocker, gap) as f64;
                }
            }
        }
        weighted / total as f64
    }

    /// 5 = no interference, 1 = severe.
    pub fn lifespan_index(&self) -> u8 {
        if self.total() == 0 {
            return 5;
        }
        match self.lifespan() {
            l if l <= 0.2 => 4,
            l if l <= 0.3 => 3,
            l if l <= 0.4 => 2,
            _ => 1,
        }
    }
}

/// Result of one full wake calculation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WakeReport {
    /// `None` when the wind was not axis-aligned and nothing was swept.
    pub direction: Option<WindDirection>,
    pub losses: Grid<f64>,
    pub counts: InterferenceCounts,
    pub lifespan: f64,
    pub lifespan_index: u8,
    /// One entry per turbine, column by column, each column top to bottom.
    pub energy_losses: Vec<EnergyLoss>,
}

#[derive(Debug, Clone, Copy)]
pub struct WakeLossCalculator {
    turbines: TurbineIds,
}

impl WakeLossCalculator {
    pub fn new(turbines: TurbineIds) -> Self {
        Self { turbines }
    }

    /// Recompute every loss from scratch for wind from `direction`.
    pub fn calculate(&self, map: &CityMap, direction: WindDirection) -> WakeReport {
        self.sweep(map, Some(direction))
    }

    /// Like [`calculate`](Self::calculate), but diagonal compass points leave every
    /// turbine at [`NO_LOSS`].
    pub fn calculate_compass(&self, map: &CityMap, compass: Compass) -> WakeReport {
        let direction = compass.cardinal();
        if direction.is_none() {
            debug!(%compass, "no axis-aligned wind, slipstream sweep skipped");
        }
        self.sweep(map, direction)
    }

    fn sweep(&self, map: &CityMap, direction: Option<WindDirection>) -> WakeReport {
        let (width, height) = (map.width(), map.height());
        let mut losses = Grid::filled(width, height, NO_LOSS);
        let mut counts = InterferenceCounts::default();

        if let Some(direction) = direction {
            for (pos, code) in map.cells() {
                let Some(target) = self.turbines.classify(code) else {
                    continue;
                };
                let Some((blocker, gap)) = self.nearest_upwind(map, pos, direction) else {
                    continue;
                };
                if let Some(factor) = loss_factor(blocker, target, gap) {
                    if let Some(cell) = losses.get_mut(pos) {
                        *cell = factor;
                    }
                    counts.record(blocker, target, gap);
                }
            }
        }

        let energy_losses = self.energy_losses(map, &losses);
        WakeReport {
            direction,
            lifespan: counts.lifespan(),
            lifespan_index: counts.lifespan_index(),
            losses,
            counts,
            energy_losses,
        }
    }

    /// Class of and gap to the closest turbine upwind of `pos`, if any within reach.
    /// Positions past the map edge count as empty.
    fn nearest_upwind(
        &self,
        map: &CityMap,
        pos: TilePos,
        direction: WindDirection,
    ) -> Option<(TurbineClass, usize)> {
        let (dx, dy) = direction.upwind_step();
        (0..=MAX_GAP).find_map(|gap| {
            let steps = gap as isize + 1;
            let neighbour = pos.offset(dx * steps, dy * steps, map.width(), map.height())?;
            let class = self.turbines.classify(map.get(neighbour)?)?;
            Some((class, gap))
        })
    }

    fn energy_losses(&self, map: &CityMap, losses: &Grid<f64>) -> Vec<EnergyLoss> {
        let mut records = Vec::new();
        for x in 0..map.width() {
            for y in 0..map.height() {
                let pos = TilePos::new(x, y);
                let Some(class) = map.get(pos).and_then(|code| self.turbines.classify(code))
                else {
                    continue;
                };
                records.push(EnergyLoss {
                    loss_factor: losses.get(pos).copied().unwrap_or(NO_LOSS),
                    class,
                });
            }
        }
        records
    }
}

/// Data source wrapping [`WakeLossCalculator`] with the latest report and fleet power.
pub struct SlipstreamData {
    calculator: WakeLossCalculator,
    report: Option<WakeReport>,
    power_kw: f64,
}

impl SlipstreamData {
    pub fn new(turbines: TurbineIds) -> Self {
        Self {
            calculator: WakeLossCalculator::new(turbines),
            report: None,
            power_kw: 0.0,
        }
    }

    pub fn report(&self) -> Option<&WakeReport> {
        self.report.as_ref()
    }

    /// Loss factor at `pos`, [`NO_LOSS`] before the first calculation.
    pub fn loss_at(&self, pos: TilePos) -> f64 {
        self.report
            .as_ref()
            .and_then(|report| report.losses.get(pos).copied())
            .unwrap_or(NO_LOSS)
    }

    pub fn lifespan_index(&self) -> u8 {
        self.report
            .as_ref()
            .map(|report| report.lifespan_index)
            .unwrap_or(5)
    }

    pub fn energy_losses(&self) -> &[EnergyLoss] {
        self.report
            .as_ref()
            .map(|report| report.energy_losses.as_slice())
            .unwrap_or(&[])
    }

    /// Fleet output at the wind speed of the last refresh.
    pub fn power_kw(&self) -> f64 {
        self.power_kw
    }
}

impl DataSource for SlipstreamData {
    fn name(&self) -> &str {
        "slipstream"
    }

    fn calculate(&mut self, ctx: &RefreshContext, map: &CityMap) -> Result<()> {
        let report = self.calculator.calculate_compass(map, ctx.wind.compass);
        self.power_kw = fleet_power_kw(&report.energy_losses, ctx.wind.speed_m_s());
        self.report = Some(report);
        Ok(())
    }

    fn variables(&self) -> Vec<(String, Variable)> {
        let lifespan = self.report.as_ref().map(|r| r.lifespan).unwrap_or(0.0);
        let mut variables = vec![
            (
                "lifespan-index".to_string(),
                Variable::Int(self.lifespan_index().into()),
            ),
            ("lifespan".to_string(), Variable::Float(lifespan)),
            (
                "energy-losses".to_string(),
                Variable::EnergyLosses(self.energy_losses().to_vec()),
            ),
            ("power-output".to_string(), Variable::Float(self.power_kw)),
        ];
        if let Some(report) = &self.report {
            variables.extend(
                report
                    .counts
                    .named_groups()
                    .into_iter()
                    .map(|(name, count)| (format!("slipstream-{name}"), Variable::Int(count.into()))),
            );
        }
        variables
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
