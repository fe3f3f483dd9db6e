//! Peer records — the registry's value type.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use waypoint_core::PeerId;

use crate::reputation;

/// Everything the node knows about one peer.
///
/// Records are plain values: the registry hands out clones, so holding one
/// never observes later mutation. All timestamps are `None` until the
/// corresponding event has been seen at least once.
#[derive(Debug, Clone)]
pub struct PeerRecord {
    pub id: PeerId,

    // Presentation
    pub client_name: String,
    pub height: u32,
    pub block_hash: String,
    pub data_hub_url: String,

    // Connectivity
    pub is_connected: bool,
    pub connected_at: Option<DateTime<Utc>>,
    pub bytes_received: u64,
    pub last_message_time: Option<DateTime<Utc>>,
    pub last_block_time: Option<DateTime<Utc>>,

    // Health
    pub is_healthy: bool,
    pub health_duration: Duration,
    pub last_health_check: Option<DateTime<Utc>>,
    pub url_responsive: bool,
    pub last_url_check: Option<DateTime<Utc>>,

    // Moderation
    pub ban_score: u32,
    pub is_banned: bool,

    // Interaction counters
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub malicious_count: u64,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub avg_response_time: Duration,

    /// Derived from the counters above; refreshed on every counter
    /// mutation.
    pub reputation_score: f64,
}

impl PeerRecord {
    pub fn new(id: PeerId) -> Self {
        Self {
            id,
            client_name: String::new(),
            height: 0,
            block_hash: String::new(),
            data_hub_url: String::new(),
            is_connected: false,
            connected_at: None,
            bytes_received: 0,
            last_message_time: None,
            last_block_time: None,
            is_healthy: false,
            health_duration: Duration::ZERO,
            last_health_check: None,
            url_responsive: false,
            last_url_check: None,
            ban_score: 0,
            is_banned: false,
            attempts: 0,
            successes: 0,
            failures: 0,
            malicious_count: 0,
            last_attempt: None,
            last_success: None,
            last_failure: None,
            avg_response_time: Duration::ZERO,
            reputation_score: reputation::NEUTRAL_SCORE,
        }
    }

    /// Fraction of resolved interactions that succeeded, in [0, 1].
    /// A peer with no resolved interactions rates 0.
    pub fn success_rate(&self) -> f64 {
        let total = self.successes + self.failures;
        if total == 0 {
            0.0
        } else {
            self.successes as f64 / total as f64
        }
    }

    /// Derived status, for display and filtering. Ban dominates, then
    /// connectivity, then health, then URL responsiveness.
    pub fn status(&self) -> PeerStatus {
        if self.is_banned {
            PeerStatus::Banned
        } else if !self.is_connected {
            PeerStatus::Disconnected
        } else if !self.is_healthy {
            PeerStatus::Unhealthy
        } else if !self.url_responsive {
            PeerStatus::UrlDown
        } else {
            PeerStatus::Healthy
        }
    }
}

/// Status rollup computed from a record's flags; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerStatus {
    Healthy,
    Unhealthy,
    Disconnected,
    Banned,
    UrlDown,
}
