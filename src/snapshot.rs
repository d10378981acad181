//! Periodic JSON dumps of the dashboard state

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::{
    city::{CityMap, TileCode},
    engine::{DataManager, Goal, Variable},
    sources::{SlipstreamData, WindTurbinesData},
    wind::WindConditions,
};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything the dashboard shows after one refresh.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub city: String,
    pub refresh: u64,
    pub revision: u64,
    pub generated_at: String,
    pub wind: WindConditions,
    pub variables: BTreeMap<String, Variable>,
    pub goals: Vec<Goal>,
    pub map: Vec<Vec<TileCode>>,
    /// Wake loss factor per tile, 1.0 where no turbine is blocked.
    pub losses: Vec<Vec<f64>>,
    pub compliance_errors: Vec<Vec<bool>>,
}

impl DashboardSnapshot {
    pub fn capture(manager: &DataManager, map: &CityMap) -> Self {
        let losses = manager
            .source::<SlipstreamData>()
            .and_then(SlipstreamData::report)
            .map(|report| report.losses.to_rows())
            .unwrap_or_default();
        let compliance_errors = manager
            .source::<WindTurbinesData>()
            .and_then(WindTurbinesData::state)
            .map(|state| state.errors.to_rows())
            .unwrap_or_default();
        Self {
            city: manager.city_name().to_string(),
            refresh: manager.refreshes(),
            revision: map.revision(),
            generated_at: chrono::Local::now().to_rfc3339(),
            wind: *manager.wind(),
            variables: manager.variables(),
            goals: manager.goals(),
            map: map.to_rows(),
            losses,
            compliance_errors,
        }
    }
}

pub struct SnapshotWriter {
    output_dir: PathBuf,
    interval: u64,
}

impl SnapshotWriter {
    pub fn new(output_dir: impl AsRef<Path>, interval: u64) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            interval,
        }
    }

    pub fn should_write(&self, refresh: u64) -> bool {
        self.interval != 0 && refresh > 0 && refresh % self.interval == 0
    }

    /// Writes `<dir>/<city>/refresh_NNNNNN.json` when the current refresh is due.
    pub fn maybe_write(
        &self,
        manager: &DataManager,
        map: &CityMap,
    ) -> Result<Option<PathBuf>, SnapshotError> {
        if !self.should_write(manager.refreshes()) {
            return Ok(None);
        }
        self.write(&DashboardSnapshot::capture(manager, map))
            .map(Some)
    }

    pub fn write(&self, snapshot: &DashboardSnapshot) -> Result<PathBuf, SnapshotError> {
        let dir = self.output_dir.join(&snapshot.city);
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("refresh_{:06}.json", snapshot.refresh));
        fs::write(&path, serde_json::to_string_pretty(snapshot)?)?;
        info!(path = %path.display(), "snapshot written");
        Ok(path)
    }
}
