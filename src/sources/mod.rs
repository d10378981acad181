mod distances;
mod slipstream;
mod tile_counter;

pub use distances::{ComplianceState, DistanceComplianceChecker, ViolationCounts, WindTurbinesData};
pub use slipstream::{
    loss_factor, InterferenceCounts, SlipstreamData, WakeLossCalculator, WakeReport, MAX_GAP,
    NO_LOSS,
};
pub use tile_counter::TileCounter;
