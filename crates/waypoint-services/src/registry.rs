//! Peer registry — concurrent store of peer records.
//!
//! Mutators take the write lock, queries the read lock, and everything
//! returned is a clone, so callers can never race the registry's internal
//! state. Counter mutations refresh the derived reputation score before
//! the lock is released; a reader never observes a record whose score is
//! stale relative to its counters.
//!
//! Mutators create the record for an unknown id on the spot — the first
//! thing we hear about a peer is often an interaction, not a connection
//! event. Reset operations are the exception: resetting an unknown peer
//! is a no-op.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use waypoint_core::{Clock, PeerId, SystemClock};

use crate::record::PeerRecord;
use crate::reputation;

/// Weight of a new sample in the response-time moving average; the
/// remainder keeps the previous average.
const RESPONSE_TIME_SAMPLE_WEIGHT: f64 = 0.8;

pub struct PeerRegistry {
    peers: RwLock<HashMap<PeerId, PeerRecord>>,
    clock: Arc<dyn Clock>,
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub(crate) fn read_guard(&self) -> RwLockReadGuard<'_, HashMap<PeerId, PeerRecord>> {
        self.peers.read().expect("peer registry lock poisoned")
    }

    pub(crate) fn write_guard(&self) -> RwLockWriteGuard<'_, HashMap<PeerId, PeerRecord>> {
        self.peers.write().expect("peer registry lock poisoned")
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Run `f` against the record for `id`, creating it first if needed.
    fn with_record<F>(&self, id: &PeerId, f: F)
    where
        F: FnOnce(&mut PeerRecord, DateTime<Utc>),
    {
        let now = self.clock.now();
        let mut peers = self.write_guard();
        let record = peers
            .entry(id.clone())
            .or_insert_with(|| PeerRecord::new(id.clone()));
        f(record, now);
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Idempotent: adding an already-known peer leaves its record alone.
    pub fn add_peer(&self, id: &PeerId) {
        self.with_record(id, |_, _| {});
    }

    pub fn remove_peer(&self, id: &PeerId) {
        self.write_guard().remove(id);
    }

    // ── Presentation & connectivity ───────────────────────────────────────────

    pub fn update_height(&self, id: &PeerId, height: u32, block_hash: &str) {
        self.with_record(id, |r, _| {
            r.height = height;
            r.block_hash = block_hash.to_owned();
        });
    }

    pub fn update_data_hub_url(&self, id: &PeerId, url: &str) {
        self.with_record(id, |r, _| r.data_hub_url = url.to_owned());
    }

    pub fn update_client_name(&self, id: &PeerId, name: &str) {
        self.with_record(id, |r, _| r.client_name = name.to_owned());
    }

    pub fn set_connected(&self, id: &PeerId, connected: bool, at: DateTime<Utc>) {
        self.with_record(id, |r, _| {
            r.is_connected = connected;
            if connected {
                r.connected_at = Some(at);
            }
        });
    }

    pub fn add_bytes_received(&self, id: &PeerId, n: u64) {
        self.with_record(id, |r, _| r.bytes_received = r.bytes_received.saturating_add(n));
    }

    /// Timestamps only move forward: a late-arriving older event never
    /// rewinds `last_message_time`.
    pub fn note_message(&self, id: &PeerId, at: DateTime<Utc>) {
        self.with_record(id, |r, _| {
            if r.last_message_time.is_none_or(|t| at > t) {
                r.last_message_time = Some(at);
            }
        });
    }

    pub fn note_block(&self, id: &PeerId, at: DateTime<Utc>) {
        self.with_record(id, |r, _| {
            if r.last_block_time.is_none_or(|t| at > t) {
                r.last_block_time = Some(at);
            }
        });
    }

    // ── Health & moderation ───────────────────────────────────────────────────

    pub fn update_health(&self, id: &PeerId, healthy: bool, since_last_check: Duration) {
        self.with_record(id, |r, now| {
            r.is_healthy = healthy;
            r.health_duration = since_last_check;
            r.last_health_check = Some(now);
        });
    }

    pub fn set_url_responsive(&self, id: &PeerId, responsive: bool, at: DateTime<Utc>) {
        self.with_record(id, |r, _| {
            r.url_responsive = responsive;
            r.last_url_check = Some(at);
        });
    }

    /// Banning only affects selection; disconnecting a banned peer is a
    /// collaborator's decision.
    pub fn set_banned(&self, id: &PeerId, banned: bool) {
        self.with_record(id, |r, _| r.is_banned = banned);
    }

    /// Adjust the ban score by `delta`, clamping at zero. Does not flip
    /// `is_banned`.
    pub fn adjust_ban_score(&self, id: &PeerId, delta: i32) {
        self.with_record(id, |r, _| {
            r.ban_score = r.ban_score.saturating_add_signed(delta);
        });
    }

    // ── Interaction counters ──────────────────────────────────────────────────

    /// An attempt has no outcome yet, so the score is left untouched.
    pub fn record_attempt(&self, id: &PeerId) {
        self.with_record(id, |r, now| {
            r.attempts += 1;
            r.last_attempt = Some(now);
        });
    }

    pub fn record_success(&self, id: &PeerId, response_time: Duration) {
        self.with_record(id, |r, now| {
            r.successes += 1;
            r.last_success = Some(now);
            r.avg_response_time = if r.avg_response_time.is_zero() {
                response_time
            } else {
                response_time.mul_f64(RESPONSE_TIME_SAMPLE_WEIGHT)
                    + r.avg_response_time
                        .mul_f64(1.0 - RESPONSE_TIME_SAMPLE_WEIGHT)
            };
            r.reputation_score = reputation::score(r, now);
        });
    }

    pub fn record_failure(&self, id: &PeerId) {
        self.with_record(id, |r, now| {
            r.failures += 1;
            r.last_failure = Some(now);
            r.reputation_score = reputation::score(r, now);
        });
    }

    pub fn record_malicious(&self, id: &PeerId) {
        self.with_record(id, |r, now| {
            r.malicious_count += 1;
            r.reputation_score = reputation::score(r, now);
        });
    }

    /// Administrative override. The stored score is replaced immediately
    /// but the next counter mutation recomputes it from the record, so the
    /// override is transient by design of the derived score.
    pub fn set_reputation(&self, id: &PeerId, score: f64) {
        self.with_record(id, |r, _| {
            r.reputation_score = score.clamp(reputation::MIN_SCORE, reputation::MAX_SCORE);
        });
    }

    /// Zero the interaction history for one peer (`Some(id)`) or all peers
    /// (`None`). Returns how many records were reset. Unknown ids reset
    /// nothing.
    pub fn reset_reputation(&self, target: Option<&PeerId>) -> usize {
        fn reset(r: &mut PeerRecord) {
            r.attempts = 0;
            r.successes = 0;
            r.failures = 0;
            r.malicious_count = 0;
            r.last_attempt = None;
            r.last_success = None;
            r.last_failure = None;
            r.avg_response_time = Duration::ZERO;
            r.reputation_score = 0.0;
        }

        let mut peers = self.write_guard();
        match target {
            Some(id) => match peers.get_mut(id) {
                Some(record) => {
                    reset(record);
                    1
                }
                None => 0,
            },
            None => {
                let count = peers.len();
                for record in peers.values_mut() {
                    reset(record);
                }
                count
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    pub fn get_peer(&self, id: &PeerId) -> Option<PeerRecord> {
        self.read_guard().get(id).cloned()
    }

    pub fn get_all_peers(&self) -> Vec<PeerRecord> {
        self.read_guard().values().cloned().collect()
    }

    pub fn get_connected_peers(&self) -> Vec<PeerRecord> {
        self.read_guard()
            .values()
            .filter(|r| r.is_connected)
            .cloned()
            .collect()
    }

    pub fn peer_count(&self) -> usize {
        self.read_guard().len()
    }
}
