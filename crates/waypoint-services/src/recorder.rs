//! Best-effort reporting of catchup outcomes.
//!
//! Block validation reports what it observes through this facade; nothing
//! here may abort the validation pipeline. When the authoritative
//! registry endpoint can't be reached, outcomes land in a local fallback
//! so the node keeps some signal about peer quality.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use waypoint_core::Error;

use crate::rpc::PeerForCatchup;

/// Minimum resolved outcomes before the local fallback will call a peer
/// bad; thin evidence never condemns a peer.
const BAD_MIN_OUTCOMES: u64 = 5;

/// Client side of the reputation reporting contract. Implemented
/// in-process by [`PeerService`](crate::rpc::PeerService) and by whatever
/// transport client a deployment wires in.
#[async_trait]
pub trait ReputationClient: Send + Sync {
    async fn record_catchup_attempt(&self, peer_id: &str) -> Result<(), Error>;
    async fn record_catchup_success(&self, peer_id: &str, duration: Duration)
        -> Result<(), Error>;
    async fn record_catchup_failure(&self, peer_id: &str) -> Result<(), Error>;
    async fn record_catchup_malicious(&self, peer_id: &str) -> Result<(), Error>;
    async fn update_catchup_reputation(&self, peer_id: &str, score: f64) -> Result<(), Error>;
    async fn get_peers_for_catchup(&self) -> Result<Vec<PeerForCatchup>, Error>;
    async fn reset_reputation(&self, peer_id: &str) -> Result<u64, Error>;
}

/// Fallback counters kept when the registry endpoint is unreachable.
/// Keyed by the raw peer id string; attempts are not tracked here, only
/// outcomes.
#[derive(Clone, Default)]
pub struct LocalPeerMetrics {
    peers: Arc<DashMap<String, LocalMetric>>,
}

#[derive(Debug, Default)]
struct LocalMetric {
    successes: u64,
    failures: u64,
    malicious: u64,
}

impl LocalPeerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, peer_id: &str) {
        self.peers.entry(peer_id.to_owned()).or_default().successes += 1;
    }

    pub fn record_failure(&self, peer_id: &str) {
        self.peers.entry(peer_id.to_owned()).or_default().failures += 1;
    }

    pub fn record_malicious(&self, peer_id: &str) {
        self.peers.entry(peer_id.to_owned()).or_default().malicious += 1;
    }

    /// Any observed protocol violation marks the peer malicious.
    pub fn is_malicious(&self, peer_id: &str) -> bool {
        self.peers
            .get(peer_id)
            .map(|m| m.malicious > 0)
            .unwrap_or(false)
    }

    /// A peer is bad once it has enough history and fails more than it
    /// succeeds.
    pub fn is_bad(&self, peer_id: &str) -> bool {
        self.peers
            .get(peer_id)
            .map(|m| m.successes + m.failures >= BAD_MIN_OUTCOMES && m.failures > m.successes)
            .unwrap_or(false)
    }
}

/// Entry point used by block validation to report catchup outcomes.
///
/// Every report is best-effort: errors are logged and swallowed, never
/// returned. An empty peer id is silently ignored — it means the caller
/// had no peer attribution for the event.
pub struct Recorder {
    client: Option<Arc<dyn ReputationClient>>,
    local: Option<LocalPeerMetrics>,
}

impl Recorder {
    pub fn new(client: Option<Arc<dyn ReputationClient>>, local: Option<LocalPeerMetrics>) -> Self {
        Self { client, local }
    }

    /// Report that a catchup toward `peer_id` has started. Called once
    /// per catchup operation.
    pub async fn report_attempt(&self, peer_id: &str) {
        if peer_id.is_empty() {
            return;
        }
        if let Some(client) = &self.client {
            match client.record_catchup_attempt(peer_id).await {
                Ok(()) => return,
                Err(e) => {
                    tracing::warn!(peer = peer_id, error = %e, "failed to report catchup attempt")
                }
            }
        }
        // The local fallback tracks outcomes only, not attempts.
    }

    /// Report one successfully validated block.
    ///
    /// Called per block, not per catchup, so the counters reflect blocks
    /// delivered rather than operations started.
    pub async fn report_success(&self, peer_id: &str, duration: Duration) {
        if peer_id.is_empty() {
            return;
        }
        if let Some(client) = &self.client {
            match client.record_catchup_success(peer_id, duration).await {
                Ok(()) => return,
                Err(e) => {
                    tracing::warn!(peer = peer_id, error = %e, "failed to report catchup success")
                }
            }
        }
        if let Some(local) = &self.local {
            local.record_success(peer_id);
        }
    }

    /// Report that the overall catchup failed.
    pub async fn report_failure(&self, peer_id: &str) {
        if peer_id.is_empty() {
            return;
        }
        if let Some(client) = &self.client {
            match client.record_catchup_failure(peer_id).await {
                Ok(()) => return,
                Err(e) => {
                    tracing::warn!(peer = peer_id, error = %e, "failed to report catchup failure")
                }
            }
        }
        if let Some(local) = &self.local {
            local.record_failure(peer_id);
        }
    }

    /// Report a protocol violation. The reason is for the operator's
    /// eyes; only the count is stored.
    pub async fn report_malicious(&self, peer_id: &str, reason: &str) {
        if peer_id.is_empty() {
            return;
        }
        tracing::warn!(peer = peer_id, reason, "recording malicious behaviour");
        if let Some(client) = &self.client {
            match client.record_catchup_malicious(peer_id).await {
                Ok(()) => return,
                Err(e) => {
                    tracing::warn!(peer = peer_id, error = %e, "failed to report malicious behaviour")
                }
            }
        }
        if let Some(local) = &self.local {
            local.record_malicious(peer_id);
        }
    }

    pub fn is_peer_malicious(&self, peer_id: &str) -> bool {
        if peer_id.is_empty() {
            return false;
        }
        self.local
            .as_ref()
            .map(|l| l.is_malicious(peer_id))
            .unwrap_or(false)
    }

    pub fn is_peer_bad(&self, peer_id: &str) -> bool {
        if peer_id.is_empty() {
            return false;
        }
        self.local
            .as_ref()
            .map(|l| l.is_bad(peer_id))
            .unwrap_or(false)
    }
}
