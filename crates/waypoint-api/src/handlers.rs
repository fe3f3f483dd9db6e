//! HTTP API handlers — registry and catchup state as JSON.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use waypoint_core::Error;
use waypoint_services::record::PeerRecord;
use waypoint_services::{CatchupStatus, CatchupTracker, PeerRegistry, PeerService};

#[derive(Clone)]
pub struct ApiState {
    pub registry: Option<Arc<PeerRegistry>>,
    pub reputation: Option<Arc<PeerService>>,
    pub catchup: Option<Arc<CatchupTracker>>,
}

// ── /peers ────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct PeersResponse {
    pub peers: Vec<PeerInfoResponse>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct PeerInfoResponse {
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

    // Catchup metrics
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

impl PeerInfoResponse {
    fn from_record(record: &PeerRecord) -> Self {
        let unix = |t: Option<chrono::DateTime<chrono::Utc>>| t.map_or(0, |t| t.timestamp());
        Self {
            id: record.id.as_str().to_owned(),
            height: record.height,
            block_hash: record.block_hash.clone(),
            data_hub_url: record.data_hub_url.clone(),
            is_healthy: record.is_healthy,
            health_duration_ms: record.health_duration.as_millis() as u64,
            last_health_check: unix(record.last_health_check),
            ban_score: record.ban_score,
            is_banned: record.is_banned,
            is_connected: record.is_connected,
            connected_at: unix(record.connected_at),
            bytes_received: record.bytes_received,
            last_block_time: unix(record.last_block_time),
            last_message_time: unix(record.last_message_time),
            url_responsive: record.url_responsive,
            last_url_check: unix(record.last_url_check),
            catchup_attempts: record.attempts,
            catchup_successes: record.successes,
            catchup_failures: record.failures,
            catchup_last_attempt: unix(record.last_attempt),
            catchup_last_success: unix(record.last_success),
            catchup_last_failure: unix(record.last_failure),
            catchup_reputation_score: record.reputation_score,
            catchup_malicious_count: record.malicious_count,
            catchup_avg_response_ms: record.avg_response_time.as_millis() as u64,
        }
    }
}

/// Connected peers with their full metrics. No registry yet just means no
/// peers — this endpoint never errors.
pub async fn handle_peers(State(state): State<ApiState>) -> Json<PeersResponse> {
    let Some(registry) = &state.registry else {
        return Json(PeersResponse {
            peers: Vec::new(),
            count: 0,
        });
    };

    let peers: Vec<PeerInfoResponse> = registry
        .get_connected_peers()
        .iter()
        .map(PeerInfoResponse::from_record)
        .collect();

    let count = peers.len();
    Json(PeersResponse { peers, count })
}

// ── /reset-reputation ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ResetReputationRequest {
    /// Empty string means reset every peer.
    #[serde(default)]
    pub peer_id: String,
}

#[derive(Serialize, Debug)]
pub struct ResetReputationResponse {
    pub ok: bool,
    pub peers_reset: u64,
}

pub async fn handle_reset_reputation(
    State(state): State<ApiState>,
    Json(req): Json<ResetReputationRequest>,
) -> Result<Json<ResetReputationResponse>, (StatusCode, String)> {
    let Some(reputation) = &state.reputation else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Error::NotInitialized("peer registry").to_string(),
        ));
    };

    let peers_reset = reputation.reset_reputation(&req.peer_id).map_err(|e| match e {
        Error::InvalidArgument(_) => (StatusCode::BAD_REQUEST, e.to_string()),
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    })?;

    if req.peer_id.is_empty() {
        tracing::info!(peers_reset, "reset reputation for all peers");
    } else {
        tracing::info!(peer = %req.peer_id, "reset reputation");
    }

    Ok(Json(ResetReputationResponse {
        ok: true,
        peers_reset,
    }))
}

// ── /catchup/status ───────────────────────────────────────────────────────────

pub async fn handle_catchup_status(
    State(state): State<ApiState>,
) -> Result<Json<CatchupStatus>, (StatusCode, String)> {
    let Some(catchup) = &state.catchup else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Error::NotInitialized("catchup tracker").to_string(),
        ));
    };

    Ok(Json(catchup.status()))
}
