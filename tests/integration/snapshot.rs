use crate::*;

use std::time::Duration;

use waypoint_services::snapshot::SNAPSHOT_FILE;
use waypoint_services::PeerRegistry;

fn save_dir(registry: &PeerRegistry, dir: &tempfile::TempDir) {
    registry.save_snapshot(dir.path().to_str().unwrap()).unwrap();
}

fn load_dir(registry: &PeerRegistry, dir: &tempfile::TempDir) {
    registry.load_snapshot(dir.path().to_str().unwrap()).unwrap();
}

fn read_doc(dir: &tempfile::TempDir) -> serde_json::Value {
    let text = std::fs::read_to_string(dir.path().join(SNAPSHOT_FILE)).unwrap();
    serde_json::from_str(&text).unwrap()
}

/// Save → load into a fresh registry → save again: the two documents are
/// structurally identical apart from `last_updated`.
#[test]
fn test_snapshot_roundtrip_is_lossless() {
    let (_clock, registry) = frozen_registry();

    let p1 = pid("peer-1");
    registry.update_data_hub_url(&p1, "http://peer1.example:8090");
    registry.update_height(&p1, 800_000, "00000000000000000008a1");
    registry.record_attempt(&p1);
    registry.record_success(&p1, Duration::from_millis(120));
    registry.record_failure(&p1);

    let p2 = pid("peer-2");
    registry.record_attempt(&p2);
    registry.record_malicious(&p2);

    let first_dir = tempfile::tempdir().unwrap();
    save_dir(&registry, &first_dir);

    let restored = PeerRegistry::new();
    load_dir(&restored, &first_dir);

    let second_dir = tempfile::tempdir().unwrap();
    save_dir(&restored, &second_dir);

    let mut first = read_doc(&first_dir);
    let mut second = read_doc(&second_dir);
    first.as_object_mut().unwrap().remove("last_updated");
    second.as_object_mut().unwrap().remove("last_updated");
    assert_eq!(first, second);
}

/// A peer created by add_peer with no further updates never reaches the
/// file.
#[test]
fn test_snapshot_prunes_empty_records() {
    let (_clock, registry) = frozen_registry();

    registry.add_peer(&pid("peer-empty"));
    registry.record_attempt(&pid("peer-active"));

    let dir = tempfile::tempdir().unwrap();
    save_dir(&registry, &dir);

    let doc = read_doc(&dir);
    let peers = doc["peers"].as_object().unwrap();
    assert!(peers.contains_key("peer-active"));
    assert!(!peers.contains_key("peer-empty"));
}

/// Loading merges: counters come back from the file, but a URL the live
/// peer already announced wins over the remembered one.
#[test]
fn test_snapshot_merge_is_non_destructive() {
    let dir = tempfile::tempdir().unwrap();
    let p = pid("peer-1");

    let (_clock, saved) = frozen_registry();
    saved.update_data_hub_url(&p, "http://a.example:8090");
    saved.record_attempt(&p);
    saved.record_success(&p, Duration::from_millis(100));
    save_dir(&saved, &dir);

    let (_clock, live) = frozen_registry();
    live.add_peer(&p);
    live.update_data_hub_url(&p, "http://b.example:8090");
    load_dir(&live, &dir);

    let record = live.get_peer(&p).unwrap();
    assert_eq!(record.data_hub_url, "http://b.example:8090");
    assert_eq!(record.attempts, 1);
    assert_eq!(record.successes, 1);
}

/// The file itself is the documented shape: snake_case keys, RFC3339
/// timestamps, milliseconds for the response average.
#[test]
fn test_snapshot_document_shape() {
    let (_clock, registry) = frozen_registry();
    let p = pid("peer-1");
    registry.record_attempt(&p);
    registry.record_success(&p, Duration::from_millis(150));

    let dir = tempfile::tempdir().unwrap();
    save_dir(&registry, &dir);

    let doc = read_doc(&dir);
    assert_eq!(doc["version"], "1.0");
    assert!(doc["last_updated"].is_string());

    let entry = &doc["peers"]["peer-1"];
    assert_eq!(entry["catchup_attempts"], 1);
    assert_eq!(entry["catchup_successes"], 1);
    assert_eq!(entry["catchup_avg_response_ms"], 150);
    let stamp = entry["catchup_last_success"].as_str().unwrap();
    assert!(stamp.starts_with("2025-06-01T12:00:00"), "not RFC3339: {stamp}");
    // Never-seen events are omitted rather than zeroed
    assert!(entry.get("catchup_last_failure").is_none());
}

/// Version and parse failures leave the registry empty but usable.
#[test]
fn test_unusable_snapshots_leave_registry_usable() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(SNAPSHOT_FILE),
        br#"{"version": "9.9", "last_updated": "2025-06-01T10:00:00Z", "peers": {}}"#,
    )
    .unwrap();

    let registry = PeerRegistry::new();
    assert!(registry.load_snapshot(dir.path().to_str().unwrap()).is_err());

    // Still usable after the failed load
    registry.record_attempt(&pid("peer-1"));
    assert_eq!(registry.peer_count(), 1);
}
