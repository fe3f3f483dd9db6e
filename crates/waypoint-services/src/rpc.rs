//! In-process reputation reporting service.
//!
//! The semantic contract of the reporting surface, minus the transport.
//! Peer ids arrive as strings and are validated here, so the registry
//! itself only ever sees well-formed ids. A deployment can put any
//! transport in front of this; the error kinds map onto the usual
//! invalid-argument / service-unavailable statuses.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use waypoint_core::{Error, PeerId};

use crate::record::PeerRecord;
use crate::recorder::ReputationClient;
use crate::registry::PeerRegistry;
use crate::selector;

/// Slim peer view for catchup selection.
#[derive(Debug, Clone, Serialize)]
pub struct PeerForCatchup {
    pub id: String,
    pub height: u32,
    pub block_hash: String,
    pub data_hub_url: String,
    pub is_healthy: bool,
    pub catchup_reputation_score: f64,
    pub catchup_attempts: u64,
    pub catchup_successes: u64,
    pub catchup_failures: u64,
}

impl PeerForCatchup {
    fn from_record(record: &PeerRecord) -> Self {
        Self {
            id: record.id.as_str().to_owned(),
            height: record.height,
            block_hash: record.block_hash.clone(),
            data_hub_url: record.data_hub_url.clone(),
            is_healthy: record.is_healthy,
            catchup_reputation_score: record.reputation_score,
            catchup_attempts: record.attempts,
            catchup_successes: record.successes,
            catchup_failures: record.failures,
        }
    }
}

/// Full registry view. Timestamps are Unix seconds, 0 meaning never.
#[derive(Debug, Clone, Serialize)]
pub struct PeerRegistryInfo {
    pub id: String,
    pub height: u32,
    pub block_hash: String,
    pub data_hub_url: String,
    pub is_healthy: bool,
    pub health_duration_ms: u64,
    pub last_health_check: i64,
    pub ban_score: u32,
    pub is_banned: bool,
    pub is_connected: bool,
    pub connected_at: i64,
    pub bytes_received: u64,
    pub last_block_time: i64,
    pub last_message_time: i64,
    pub url_responsive: bool,
    pub last_url_check: i64,
    pub catchup_attempts: u64,
    pub catchup_successes: u64,
    pub catchup_failures: u64,
    pub catchup_last_attempt: i64,
    pub catchup_last_success: i64,
    pub catchup_last_failure: i64,
    pub catchup_reputation_score: f64,
    pub catchup_malicious_count: u64,
    pub catchup_avg_response_ms: u64,
}

fn unix_or_zero(t: Option<DateTime<Utc>>) -> i64 {
    t.map_or(0, |t| t.timestamp())
}

impl PeerRegistryInfo {
    fn from_record(record: &PeerRecord) -> Self {
        Self {
            id: record.id.as_str().to_owned(),
            height: record.height,
            block_hash: record.block_hash.clone(),
            data_hub_url: record.data_hub_url.clone(),
            is_healthy: record.is_healthy,
            health_duration_ms: record.health_duration.as_millis() as u64,
            last_health_check: unix_or_zero(record.last_health_check),
            ban_score: record.ban_score,
            is_banned: record.is_banned,
            is_connected: record.is_connected,
            connected_at: unix_or_zero(record.connected_at),
            bytes_received: record.bytes_received,
            last_block_time: unix_or_zero(record.last_block_time),
            last_message_time: unix_or_zero(record.last_message_time),
            url_responsive: record.url_responsive,
            last_url_check: unix_or_zero(record.last_url_check),
            catchup_attempts: record.attempts,
            catchup_successes: record.successes,
            catchup_failures: record.failures,
            catchup_last_attempt: unix_or_zero(record.last_attempt),
            catchup_last_success: unix_or_zero(record.last_success),
            catchup_last_failure: unix_or_zero(record.last_failure),
            catchup_reputation_score: record.reputation_score,
            catchup_malicious_count: record.malicious_count,
            catchup_avg_response_ms: record.avg_response_time.as_millis() as u64,
        }
    }
}

/// Reporting operations over a shared registry.
pub struct PeerService {
    registry: Arc<PeerRegistry>,
}

impl PeerService {
    pub fn new(registry: Arc<PeerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<PeerRegistry> {
        &self.registry
    }

    pub fn record_catchup_attempt(&self, peer_id: &str) -> Result<(), Error> {
        let id = PeerId::parse(peer_id)?;
        self.registry.record_attempt(&id);
        Ok(())
    }

    pub fn record_catchup_success(&self, peer_id: &str, duration: Duration) -> Result<(), Error> {
        let id = PeerId::parse(peer_id)?;
        self.registry.record_success(&id, duration);
        Ok(())
    }

    pub fn record_catchup_failure(&self, peer_id: &str) -> Result<(), Error> {
        let id = PeerId::parse(peer_id)?;
        self.registry.record_failure(&id);
        Ok(())
    }

    pub fn record_catchup_malicious(&self, peer_id: &str) -> Result<(), Error> {
        let id = PeerId::parse(peer_id)?;
        self.registry.record_malicious(&id);
        Ok(())
    }

    /// Administrative override; the score is validated here and replaced
    /// until the peer's next counter event recomputes it.
    pub fn update_catchup_reputation(&self, peer_id: &str, score: f64) -> Result<(), Error> {
        if !(0.0..=100.0).contains(&score) {
            return Err(Error::InvalidArgument(format!(
                "reputation score out of range: {score}"
            )));
        }
        let id = PeerId::parse(peer_id)?;
        self.registry.set_reputation(&id, score);
        Ok(())
    }

    /// Peers eligible for catchup, best first. Height filtering is the
    /// caller's concern — it knows its target; we don't.
    pub fn get_peers_for_catchup(&self) -> Vec<PeerForCatchup> {
        selector::peers_for_catchup(&self.registry, 0)
            .iter()
            .map(PeerForCatchup::from_record)
            .collect()
    }

    /// Every record in the registry, unfiltered.
    pub fn get_peer_registry(&self) -> Vec<PeerRegistryInfo> {
        self.registry
            .get_all_peers()
            .iter()
            .map(PeerRegistryInfo::from_record)
            .collect()
    }

    /// Reset one peer's interaction history, or every peer's when
    /// `peer_id` is empty. Returns how many records were reset.
    pub fn reset_reputation(&self, peer_id: &str) -> Result<u64, Error> {
        if peer_id.is_empty() {
            return Ok(self.registry.reset_reputation(None) as u64);
        }
        let id = PeerId::parse(peer_id)?;
        Ok(self.registry.reset_reputation(Some(&id)) as u64)
    }
}

#[async_trait]
impl ReputationClient for PeerService {
    async fn record_catchup_attempt(&self, peer_id: &str) -> Result<(), Error> {
        PeerService::record_catchup_attempt(self, peer_id)
    }

    async fn record_catchup_success(&self, peer_id: &str, duration: Duration) -> Result<(), Error> {
        PeerService::record_catchup_success(self, peer_id, duration)
    }

    async fn record_catchup_failure(&self, peer_id: &str) -> Result<(), Error> {
        PeerService::record_catchup_failure(self, peer_id)
    }

    async fn record_catchup_malicious(&self, peer_id: &str) -> Result<(), Error> {
        PeerService::record_catchup_malicious(self, peer_id)
    }

    async fn update_catchup_reputation(&self, peer_id: &str, score: f64) -> Result<(), Error> {
        PeerService::update_catchup_reputation(self, peer_id, score)
    }

    async fn get_peers_for_catchup(&self) -> Result<Vec<PeerForCatchup>, Error> {
        Ok(PeerService::get_peers_for_catchup(self))
    }

    async fn reset_reputation(&self, peer_id: &str) -> Result<u64, Error> {
        PeerService::reset_reputation(self, peer_id)
    }
}
