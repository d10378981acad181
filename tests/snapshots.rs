use std::fs;

use tempfile::tempdir;
use windgrid::{
    scenario::ScenarioLoader,
    snapshot::{DashboardSnapshot, SnapshotWriter},
};

#[test]
fn snapshot_writer_respects_interval() {
    let loader = ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"));
    let scenario = loader.load("scenarios/harbor_town.yaml").unwrap();
    let map = scenario.build_city();
    let mut manager = scenario.data_manager().unwrap();

    let dir = tempdir().unwrap();
    let writer = SnapshotWriter::new(dir.path(), 2);

    manager.calculate(&map).unwrap();
    assert!(writer.maybe_write(&manager, &map).unwrap().is_none());

    manager.calculate(&map).unwrap();
    let path = writer.maybe_write(&manager, &map).unwrap().unwrap();
    assert_eq!(path, dir.path().join("harbor_town").join("refresh_000002.json"));

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["city"], "harbor_town");
    assert_eq!(json["refresh"], 2);
    assert_eq!(json["wind"]["compass"], "N");
    assert_eq!(json["variables"]["lifespan-index"], 2);
    assert_eq!(json["losses"][3][6], 0.5);
    assert_eq!(json["compliance_errors"][2][6], true);
    assert_eq!(json["goals"].as_array().map(Vec::len), Some(3));
    assert_eq!(json["map"].as_array().map(Vec::len), Some(16));
}

#[test]
fn captured_snapshot_matches_the_manager() {
    let loader = ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"));
    let scenario = loader.load("scenarios/harbor_town.yaml").unwrap();
    let map = scenario.build_city();
    let mut manager = scenario.data_manager().unwrap();
    manager.calculate(&map).unwrap();

    let snapshot = DashboardSnapshot::capture(&manager, &map);
    assert_eq!(snapshot.refresh, 1);
    assert_eq!(snapshot.revision, map.revision());
    assert_eq!(snapshot.variables, manager.variables());
    assert_eq!(snapshot.map, map.to_rows());
    assert!(!snapshot.generated_at.is_empty());
}
