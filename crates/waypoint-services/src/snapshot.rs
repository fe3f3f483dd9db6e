//! Registry snapshots — persistence across restarts.
//!
//! A single pretty-printed JSON document holding the interaction counters
//! and presentation fields worth keeping. Save marshals under the read
//! lock and does file I/O only after releasing it; the bytes then go
//! through a uniquely named temp file, fsync, and an atomic rename, so a
//! concurrent reader sees either the old document or the new one, never a
//! torn one. The nanosecond suffix on the temp name means two racing
//! saves (a shutdown race, typically) cannot stomp each other's temp
//! file.
//!
//! Load merges rather than replaces: counters are restored verbatim, but
//! presentation fields already learned from a live peer win over what the
//! file remembers.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use waypoint_core::{Error, PeerId};

use crate::record::PeerRecord;
use crate::registry::PeerRegistry;

/// Snapshot format version. Bump on any incompatible field change.
pub const SNAPSHOT_VERSION: &str = "1.0";

/// File name within the configured snapshot directory.
pub const SNAPSHOT_FILE: &str = "teranode_peer_registry.json";

#[derive(Debug, Serialize, Deserialize)]
struct RegistrySnapshot {
    version: String,
    last_updated: DateTime<Utc>,
    peers: BTreeMap<String, CachedPeerMetrics>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CachedPeerMetrics {
    catchup_attempts: u64,
    catchup_successes: u64,
    catchup_failures: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    catchup_last_attempt: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    catchup_last_success: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    catchup_last_failure: Option<DateTime<Utc>>,
    catchup_reputation_score: f64,
    catchup_malicious_count: u64,
    catchup_avg_response_ms: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    height: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    block_hash: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    data_hub_url: String,
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

impl CachedPeerMetrics {
    fn from_record(record: &PeerRecord) -> Self {
        Self {
            catchup_attempts: record.attempts,
            catchup_successes: record.successes,
            catchup_failures: record.failures,
            catchup_last_attempt: record.last_attempt,
            catchup_last_success: record.last_success,
            catchup_last_failure: record.last_failure,
            catchup_reputation_score: record.reputation_score,
            catchup_malicious_count: record.malicious_count,
            catchup_avg_response_ms: record.avg_response_time.as_millis() as u64,
            height: record.height,
            block_hash: record.block_hash.clone(),
            data_hub_url: record.data_hub_url.clone(),
        }
    }
}

/// Full path of the snapshot file for a configured directory. Empty
/// directory means the current working directory.
pub fn snapshot_path(dir: &str) -> PathBuf {
    if dir.is_empty() {
        PathBuf::from(SNAPSHOT_FILE)
    } else {
        Path::new(dir).join(SNAPSHOT_FILE)
    }
}

impl PeerRegistry {
    /// Write a snapshot of the registry to `dir`.
    ///
    /// Records with no interaction history, no DataHub URL, and no
    /// advertised height carry nothing worth keeping and are skipped.
    pub fn save_snapshot(&self, dir: &str) -> Result<(), Error> {
        // Marshal while holding the read lock, write after releasing it.
        let data = {
            let peers = self.read_guard();
            let mut doc = RegistrySnapshot {
                version: SNAPSHOT_VERSION.to_owned(),
                last_updated: self.clock().now(),
                peers: BTreeMap::new(),
            };
            for (id, record) in peers.iter() {
                if record.attempts == 0 && record.data_hub_url.is_empty() && record.height == 0 {
                    continue;
                }
                doc.peers
                    .insert(id.as_str().to_owned(), CachedPeerMetrics::from_record(record));
            }
            serde_json::to_vec_pretty(&doc).map_err(|e| Error::Io(e.into()))?
        };

        let target = snapshot_path(dir);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let tmp = PathBuf::from(format!("{}.tmp.{nanos}", target.display()));

        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&data)?;
            file.sync_all()?;
        }

        if let Err(e) = fs::rename(&tmp, &target) {
            let _ = fs::remove_file(&tmp);
            return Err(Error::Io(e));
        }

        tracing::debug!(path = %target.display(), "peer registry snapshot written");
        Ok(())
    }

    /// Merge a snapshot from `dir` into the registry.
    ///
    /// A missing file is not an error. A corrupt or version-mismatched
    /// file returns an error without mutating the registry, which stays
    /// usable.
    pub fn load_snapshot(&self, dir: &str) -> Result<(), Error> {
        let target = snapshot_path(dir);
        if !target.exists() {
            return Ok(());
        }

        let data = fs::read(&target)?;
        let doc: RegistrySnapshot =
            serde_json::from_slice(&data).map_err(|e| Error::Corruption(e.to_string()))?;

        if doc.version != SNAPSHOT_VERSION {
            return Err(Error::VersionMismatch {
                expected: SNAPSHOT_VERSION.to_owned(),
                found: doc.version,
            });
        }

        let mut peers = self.write_guard();
        for (id_str, metrics) in doc.peers {
            let id = match PeerId::parse(&id_str) {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!(peer = %id_str, error = %e, "skipping snapshot entry");
                    continue;
                }
            };

            let record = peers.entry(id.clone()).or_insert_with(|| {
                let mut r = PeerRecord::new(id);
                // A peer we only know from the snapshot hasn't failed a
                // health check yet
                r.is_healthy = true;
                r
            });

            record.attempts = metrics.catchup_attempts;
            record.successes = metrics.catchup_successes;
            record.failures = metrics.catchup_failures;
            record.last_attempt = metrics.catchup_last_attempt;
            record.last_success = metrics.catchup_last_success;
            record.last_failure = metrics.catchup_last_failure;
            record.reputation_score = metrics.catchup_reputation_score;
            record.malicious_count = metrics.catchup_malicious_count;
            record.avg_response_time = Duration::from_millis(metrics.catchup_avg_response_ms);

            // Live data wins over what the file remembers
            if record.data_hub_url.is_empty() && !metrics.data_hub_url.is_empty() {
                record.data_hub_url = metrics.data_hub_url;
            }
            if record.height == 0 && metrics.height > 0 {
                record.height = metrics.height;
                record.block_hash = metrics.block_hash;
            }
        }

        Ok(())
    }
}
